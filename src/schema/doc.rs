//! Documentation text parsing.
//!
//! Splits an endpoint's documentation into a free-text description and
//! per-parameter descriptions taken from an `Args:` section:
//!
//! ```text
//! Divide two numbers.
//!
//! Args:
//!     a: Dividend
//!     b (float): Divisor, must not be zero.
//!         Continues here.
//!
//! Returns:
//!     The quotient.
//! ```
//!
//! Parsing is best-effort and never fails; unrecognized layout just yields
//! less information.

use serde_json::Map;

/// Description and parameter texts extracted from documentation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocInfo {
    /// Leading free text, whitespace-normalized paragraphs joined by blank lines.
    pub description: String,
    /// Parameter descriptions in the order they appear.
    pub params: Vec<(String, String)>,
}

impl DocInfo {
    /// Description for one parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, text)| text.as_str())
    }

    /// Parameter descriptions as a JSON object.
    pub fn params_json(&self) -> Map<String, serde_json::Value> {
        self.params
            .iter()
            .map(|(n, t)| (n.clone(), serde_json::Value::String(t.clone())))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Description,
    Params,
    Other,
}

fn heading(line: &str) -> Option<Section> {
    let trimmed = line.trim().trim_start_matches('#').trim();
    let word = trimmed.strip_suffix(':').unwrap_or(trimmed).trim();
    // Bare words only count as headings when written with a colon or markdown
    // marker, so ordinary one-word sentences stay in the description.
    if !line.trim().ends_with(':') && !line.trim().starts_with('#') {
        return None;
    }
    match word.to_ascii_lowercase().as_str() {
        "args" | "arguments" | "parameters" | "params" => Some(Section::Params),
        "returns" | "return" | "raises" | "yields" | "examples" | "example" | "notes" | "note" => {
            Some(Section::Other)
        }
        _ => None,
    }
}

/// Split `line` into `(name, text)` if it starts a parameter entry.
fn param_entry(line: &str) -> Option<(&str, &str)> {
    let (head, text) = line.trim().split_once(':')?;
    let name = match head.split_once('(') {
        Some((name, hint)) if hint.trim_end().ends_with(')') => name.trim(),
        Some(_) => return None,
        None => head.trim(),
    };
    let is_ident = !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    is_ident.then_some((name, text.trim()))
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn push_text(target: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

/// Parse documentation text. Never fails.
pub fn parse_doc(text: &str) -> DocInfo {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut params: Vec<(String, String)> = Vec::new();
    let mut section = Section::Description;
    let mut param_indent: Option<usize> = None;

    for line in text.lines() {
        if let Some(next) = heading(line) {
            section = next;
            param_indent = None;
            continue;
        }

        match section {
            Section::Description => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    if !current.is_empty() {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                } else {
                    push_text(&mut current, trimmed);
                }
            }
            Section::Params => {
                if line.trim().is_empty() {
                    continue;
                }
                let indent = indent_of(line);
                let starts_entry = param_indent.map_or(true, |base| indent <= base);
                match param_entry(line) {
                    Some((name, text)) if starts_entry => {
                        param_indent.get_or_insert(indent);
                        params.push((name.to_string(), text.to_string()));
                    }
                    _ => {
                        if let Some((_, last)) = params.last_mut() {
                            push_text(last, line.trim());
                        }
                    }
                }
            }
            Section::Other => {}
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    DocInfo {
        description: paragraphs.join("\n\n"),
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_and_params() {
        let doc = parse_doc(
            "Divide two numbers.\n\
             \n\
             Args:\n\
             \x20   a: Dividend\n\
             \x20   b (float): Divisor, must not be zero.\n\
             \x20       Continues here.\n\
             \n\
             Returns:\n\
             \x20   The quotient.\n",
        );

        assert_eq!(doc.description, "Divide two numbers.");
        assert_eq!(doc.param("a"), Some("Dividend"));
        assert_eq!(
            doc.param("b"),
            Some("Divisor, must not be zero. Continues here.")
        );
        assert_eq!(doc.params.len(), 2);
    }

    #[test]
    fn test_multi_paragraph_description() {
        let doc = parse_doc("First line\ncontinued.\n\nSecond paragraph.");
        assert_eq!(doc.description, "First line continued.\n\nSecond paragraph.");
        assert!(doc.params.is_empty());
    }

    #[test]
    fn test_markdown_headings() {
        let doc = parse_doc("Summary.\n\n# Arguments\n\n* ignored\nname: The name\n");
        assert_eq!(doc.description, "Summary.");
        assert_eq!(doc.param("name"), Some("The name"));
    }

    #[test]
    fn test_raises_section_is_excluded() {
        let doc = parse_doc("Do it.\n\nArgs:\n  x: value\n\nRaises:\n  ValueError: bad x\n");
        assert_eq!(doc.params, vec![("x".to_string(), "value".to_string())]);
        assert_eq!(doc.description, "Do it.");
    }

    #[test]
    fn test_nested_colon_stays_continuation() {
        let doc = parse_doc("Args:\n  mode: One of:\n    fast: quick\n    slow: careful\n");
        assert_eq!(doc.param("mode"), Some("One of: fast: quick slow: careful"));
        assert_eq!(doc.params.len(), 1);
    }

    #[test]
    fn test_garbage_never_fails() {
        for text in ["", ":::", "Args:", "Args:\n  (weird): x", "\n\n\n", "Returns:\nonly"] {
            let doc = parse_doc(text);
            assert!(doc.params.is_empty(), "unexpected params for {text:?}");
        }
        assert_eq!(parse_doc("").description, "");
    }

    #[test]
    fn test_params_json() {
        let doc = parse_doc("Args:\n  a: first\n");
        assert_eq!(doc.params_json()["a"], "first");
    }
}
