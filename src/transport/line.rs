//! Call-and-return transport: one JSON request per line, one JSON reply per line.
//!
//! ```text
//! > {"op":"call","method":"add","params":{"a":2,"b":3}}
//! < {"ok":true,"result":5.0,"done":true}
//! > {"op":"shutdown"}
//! < {"ok":true}
//! ```
//!
//! Replies are the only thing written to the output stream; diagnostics go
//! to stderr through `tracing`.

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::dispatch::{CallOutcome, Dispatcher, ErrorKind};
use crate::error::Result;
use crate::service::ServiceState;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LineRequest {
    Call {
        method: String,
        #[serde(default)]
        params: Value,
    },
    Methods,
    Schema,
    MethodSchema {
        method: String,
    },
    Shutdown,
}

/// Serve requests from `reader` until EOF or a `shutdown` request.
///
/// A `shutdown` request runs the teardown hook before replying.
pub async fn serve_line<S, R, W>(dispatcher: &Dispatcher<S>, reader: R, mut writer: W) -> Result<()>
where
    S: ServiceState,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<LineRequest>(line) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Malformed request line");
                let reply = CallOutcome::error(
                    ErrorKind::ValidationError,
                    format!("Malformed request: {e}"),
                );
                write_reply(&mut writer, &reply.to_json()).await?;
                continue;
            }
        };

        let reply = match request {
            LineRequest::Call { method, params } => {
                dispatcher.call_async(&method, params).await.to_json()
            }
            LineRequest::Methods => CallOutcome::success(json!(dispatcher.list_methods())).to_json(),
            LineRequest::Schema => {
                CallOutcome::success(dispatcher.get_schema().to_json()).to_json()
            }
            LineRequest::MethodSchema { method } => method_schema(dispatcher, &method).to_json(),
            LineRequest::Shutdown => {
                let outcome = dispatcher.shutdown_async().await;
                let reply = if outcome.is_ok() {
                    json!({"ok": true})
                } else {
                    outcome.to_json()
                };
                write_reply(&mut writer, &reply).await?;
                info!("Shutdown requested; closing line transport");
                return Ok(());
            }
        };

        write_reply(&mut writer, &reply).await?;
    }

    debug!("Line transport reached end of input");
    Ok(())
}

pub(crate) fn method_schema<S: ServiceState>(dispatcher: &Dispatcher<S>, method: &str) -> CallOutcome {
    match dispatcher.get_method_schema(method) {
        Some(schema) => CallOutcome::success(schema.to_json()),
        None => CallOutcome::error(ErrorKind::UnknownMethod, format!("Unknown method: {method}")),
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &Value) -> Result<()> {
    let mut line = serde_json::to_vec(reply)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
