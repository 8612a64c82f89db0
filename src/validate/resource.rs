//! External-resource parameters and their decoding backends.
//!
//! A resource parameter arrives as a path string. [`Materializer`] turns it
//! into the value the handler expects: the path itself, decoded audio, or a
//! decoded image. Backends are tried in registration order; the first one
//! that succeeds wins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::schema::{Describe, ResourceKind, TypeShape};

/// Audio backends this crate can provide, in preference order.
pub const KNOWN_AUDIO_BACKENDS: &[&str] = &["hound"];

/// Image backends this crate can provide, in preference order.
pub const KNOWN_IMAGE_BACKENDS: &[&str] = &["image"];

/// A filesystem path passed to the handler unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilePath(PathBuf);

impl FilePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_inner(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for FilePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Decoded audio: interleaved samples normalized to `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioClip {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

/// Decoded image as an RGBA8 pixel buffer, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageFrame {
    /// RGBA value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 4;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Convert into an `image` buffer for further processing.
    #[cfg(feature = "images")]
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

impl Describe for FilePath {
    fn shape() -> TypeShape {
        TypeShape::Resource(ResourceKind::FilePath)
    }
}

impl Describe for AudioClip {
    fn shape() -> TypeShape {
        TypeShape::Resource(ResourceKind::Audio)
    }
}

impl Describe for ImageFrame {
    fn shape() -> TypeShape {
        TypeShape::Resource(ResourceKind::Image)
    }
}

/// Resource materialization failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The source file does not exist.
    #[error("{kind} file not found: {}", .path.display())]
    NotFound { kind: ResourceKind, path: PathBuf },

    /// No decoding backend is installed for this kind.
    #[error("no {kind} backend available (tried: {})", .attempted.join(", "))]
    NoBackend {
        kind: ResourceKind,
        attempted: Vec<String>,
    },

    /// Every installed backend failed to decode the file.
    #[error("could not decode {kind} file {}: {}", .path.display(), .errors.join("; "))]
    Decode {
        kind: ResourceKind,
        path: PathBuf,
        errors: Vec<String>,
    },
}

/// An audio decoding backend.
pub trait AudioBackend: Send + Sync {
    fn name(&self) -> &str;
    fn load(&self, path: &Path) -> Result<AudioClip, String>;
}

/// An image decoding backend.
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &str;
    fn load(&self, path: &Path) -> Result<ImageFrame, String>;
}

/// WAV decoding via `hound`.
#[cfg(feature = "wav")]
#[derive(Debug, Clone, Copy, Default)]
pub struct HoundBackend;

#[cfg(feature = "wav")]
impl AudioBackend for HoundBackend {
    fn name(&self) -> &str {
        "hound"
    }

    fn load(&self, path: &Path) -> Result<AudioClip, String> {
        let mut reader = hound::WavReader::open(path).map_err(|e| e.to_string())?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(format!("unsupported bit depth: {}", spec.bits_per_sample));
                }
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| e.to_string())?
            }
        };

        Ok(AudioClip {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Raster decoding via the `image` crate.
#[cfg(feature = "images")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterBackend;

#[cfg(feature = "images")]
impl ImageBackend for RasterBackend {
    fn name(&self) -> &str {
        "image"
    }

    fn load(&self, path: &Path) -> Result<ImageFrame, String> {
        let img = image::open(path).map_err(|e| e.to_string())?.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(ImageFrame {
            width,
            height,
            pixels: img.into_raw(),
        })
    }
}

/// A materialized resource value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Path(FilePath),
    Audio(AudioClip),
    Image(ImageFrame),
}

/// Turns resource paths into handler values.
///
/// Holds no mutable state, so one instance is shared by every call.
pub struct Materializer {
    audio: Vec<Box<dyn AudioBackend>>,
    image: Vec<Box<dyn ImageBackend>>,
}

impl Materializer {
    /// Materializer with every backend enabled by cargo features.
    pub fn new() -> Self {
        #[allow(unused_mut)]
        let mut materializer = Self::empty();
        #[cfg(feature = "wav")]
        {
            materializer = materializer.with_audio_backend(HoundBackend);
        }
        #[cfg(feature = "images")]
        {
            materializer = materializer.with_image_backend(RasterBackend);
        }
        materializer
    }

    /// Materializer with no decoding backends. Raw paths still work.
    pub fn empty() -> Self {
        Self {
            audio: Vec::new(),
            image: Vec::new(),
        }
    }

    /// Append an audio backend, tried after the existing ones.
    pub fn with_audio_backend(mut self, backend: impl AudioBackend + 'static) -> Self {
        self.audio.push(Box::new(backend));
        self
    }

    /// Append an image backend, tried after the existing ones.
    pub fn with_image_backend(mut self, backend: impl ImageBackend + 'static) -> Self {
        self.image.push(Box::new(backend));
        self
    }

    /// Names of the installed audio backends.
    pub fn audio_backends(&self) -> Vec<&str> {
        self.audio.iter().map(|b| b.name()).collect()
    }

    /// Names of the installed image backends.
    pub fn image_backends(&self) -> Vec<&str> {
        self.image.iter().map(|b| b.name()).collect()
    }

    /// Materialize `raw` as a resource of `kind`. May block on file I/O.
    pub fn materialize(&self, kind: ResourceKind, raw: &str) -> Result<Resource, ResourceError> {
        let path = Path::new(raw);
        if !path.exists() {
            return Err(ResourceError::NotFound {
                kind,
                path: path.to_path_buf(),
            });
        }

        match kind {
            ResourceKind::FilePath => Ok(Resource::Path(FilePath::new(raw))),
            ResourceKind::Audio => {
                load_first(kind, path, &self.audio, KNOWN_AUDIO_BACKENDS, |b| {
                    (b.name(), b.load(path))
                })
                .map(Resource::Audio)
            }
            ResourceKind::Image => {
                load_first(kind, path, &self.image, KNOWN_IMAGE_BACKENDS, |b| {
                    (b.name(), b.load(path))
                })
                .map(Resource::Image)
            }
        }
    }
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materializer")
            .field("audio", &self.audio_backends())
            .field("image", &self.image_backends())
            .finish()
    }
}

fn load_first<B: ?Sized, T>(
    kind: ResourceKind,
    path: &Path,
    backends: &[Box<B>],
    known: &[&str],
    load: impl Fn(&B) -> (&str, Result<T, String>),
) -> Result<T, ResourceError> {
    if backends.is_empty() {
        return Err(ResourceError::NoBackend {
            kind,
            attempted: known.iter().map(|s| s.to_string()).collect(),
        });
    }

    let mut errors = Vec::with_capacity(backends.len());
    for backend in backends {
        match load(backend.as_ref()) {
            (_, Ok(value)) => return Ok(value),
            (name, Err(e)) => {
                debug!(backend = name, path = %path.display(), error = %e, "Backend failed to decode resource");
                errors.push(format!("{name}: {e}"));
            }
        }
    }

    Err(ResourceError::Decode {
        kind,
        path: path.to_path_buf(),
        errors,
    })
}
