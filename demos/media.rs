//! Media worker - audio and image parameters plus the file store.
//!
//! Parameters declared as `AudioClip` or `ImageFrame` arrive as file paths
//! and are decoded before the handler runs. Results that are files go into
//! the host's file store and only their ids travel back.
//!
//! # Running
//!
//! ```text
//! $ RPC_WORKER_TRANSPORT=framed cargo run --example media
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use rpc_worker::filestore::FileStore;
use rpc_worker::{
    Args, AudioClip, Endpoint, FilePath, HandlerError, ImageFrame, Service, ServiceState,
    WorkerConfig,
};
use serde::Serialize;
use serde_json::json;

struct Media {
    store: FileStore,
    scratch: PathBuf,
}

impl ServiceState for Media {
    fn setup(&mut self) -> Result<(), HandlerError> {
        std::fs::create_dir_all(&self.scratch)?;
        Ok(())
    }

    fn teardown(&self) -> Result<(), HandlerError> {
        std::fs::remove_dir_all(&self.scratch)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct Loudness {
    peak: f32,
    rms: f32,
    duration_secs: f64,
}

fn loudness(_: &Media, args: Args) -> Result<Loudness, HandlerError> {
    let clip = args.audio("clip")?;
    if clip.samples.is_empty() {
        return Err(HandlerError::new("EmptyAudio", "clip has no samples"));
    }

    let peak = clip.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let mean_square =
        clip.samples.iter().map(|s| s * s).sum::<f32>() / clip.samples.len() as f32;

    Ok(Loudness {
        peak,
        rms: mean_square.sqrt(),
        duration_secs: clip.duration_secs(),
    })
}

async fn thumbnail(media: Arc<Media>, args: Args) -> Result<String, HandlerError> {
    let size: u32 = args.get("size")?;
    let ttl: u64 = args.get("ttl")?;
    let out = media.scratch.join(format!("thumb-{size}.png"));

    {
        let image = args.image("image")?.to_rgba_image().ok_or_else(|| {
            HandlerError::new("ImageError", "pixel buffer does not match dimensions")
        })?;
        image::imageops::thumbnail(&image, size, size).save(&out)?;
    }
    args.logger().debug(&format!("wrote {}", out.display()));

    let id = media
        .store
        .import_file(&out, Some("thumbnail.png"), ttl)
        .await?;
    std::fs::remove_file(&out)?;
    Ok(id)
}

async fn stored_size(media: Arc<Media>, args: Args) -> Result<u64, HandlerError> {
    let id: String = args.get("file_id")?;
    let path = media.store.get_path(&id).await?;
    Ok(std::fs::metadata(path)?.len())
}

fn describe(_: &Media, args: Args) -> Result<serde_json::Value, HandlerError> {
    let file = args.file("file")?;
    Ok(json!({
        "path": file.as_path(),
        "bytes": std::fs::metadata(file)?.len(),
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = WorkerConfig::from_env()?;
    let state = Media {
        store: FileStore::from_config(&config)?,
        scratch: std::env::temp_dir().join(format!("media-worker-{}", std::process::id())),
    };

    let service = Service::builder(state)
        .version("0.3.0")
        .description("Audio analysis and image thumbnails")
        .endpoint(
            Endpoint::immediate("loudness", loudness)
                .doc("Peak and RMS level of a clip.\n\nArgs:\n    clip: WAV file to analyse")
                .param::<AudioClip>("clip"),
        )
        .endpoint(
            Endpoint::suspending("thumbnail", thumbnail)
                .doc(
                    "Square thumbnail stored in the file store.\n\n\
                     Args:\n    image: Source image\n    size: Edge length in pixels\n    \
                     ttl: Seconds to keep the thumbnail (0 keeps it)\n\n\
                     Returns:\n    File store id",
                )
                .param::<ImageFrame>("image")
                .param_default::<u32>("size", 128)
                .param_default::<u64>("ttl", 3600)
                .returns::<String>(),
        )
        .endpoint(
            Endpoint::suspending("stored_size", stored_size)
                .doc("Size in bytes of a stored file.")
                .param::<String>("file_id")
                .returns::<u64>(),
        )
        .endpoint(
            Endpoint::immediate("describe", describe)
                .doc("Path and size of a local file.")
                .param::<FilePath>("file"),
        )
        .build()?;

    rpc_worker::worker::run(service, &config).await?;
    Ok(())
}
