//! Framed queue transport.
//!
//! Each request frame carries a MsgPack `{method, params}` document. Every
//! request is served on its own task, so several may be in flight at once;
//! replies reuse the request's correlation id and leave through the single
//! writer task. Suspending handlers still run one at a time on the
//! dispatcher's scheduler.
//!
//! Reserved method names:
//!
//! | Name                  | Reply                                   |
//! |-----------------------|-----------------------------------------|
//! | `__methods__`         | endpoint names                          |
//! | `__schema__`          | service schema                          |
//! | `__method_schema__`   | schema of `params.method`               |
//! | `__shutdown__`        | teardown outcome; the read loop stops   |

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::line::method_schema;
use super::writer::{spawn_writer_task, OutboundFrame, WriterHandle};
use crate::codec::MsgPackCodec;
use crate::dispatch::{CallOutcome, Dispatcher, ErrorKind, Failure};
use crate::error::{Result, WorkerError};
use crate::protocol::{FrameBuffer, Header, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::service::ServiceState;

pub const METHODS: &str = "__methods__";
pub const SCHEMA: &str = "__schema__";
pub const METHOD_SCHEMA: &str = "__method_schema__";
pub const SHUTDOWN: &str = "__shutdown__";

#[derive(Debug, Deserialize)]
struct FramedRequest {
    method: String,
    #[serde(default)]
    params: Value,
}

/// Serve framed requests from `reader` until EOF or `__shutdown__`.
///
/// In-flight calls are drained before teardown runs and before returning.
pub async fn serve_framed<S, R, W>(dispatcher: Dispatcher<S>, mut reader: R, writer: W) -> Result<()>
where
    S: ServiceState,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (replies, writer_task) = spawn_writer_task(writer);
    let mut in_flight = JoinSet::new();
    let mut frames = FrameBuffer::new();
    let mut buf = vec![0u8; 64 * 1024];

    let result = 'read: loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break 'read frames.finish(),
            Ok(n) => n,
            Err(e) => break 'read Err(e.into()),
        };
        reap(&mut in_flight);

        let batch = match frames.push(&buf[..n]) {
            Ok(batch) => batch,
            Err(e) => break 'read Err(e),
        };

        for frame in batch {
            let id = frame.correlation_id();
            if frame.is_response() {
                warn!(correlation_id = id, "Ignoring reply frame sent to worker");
                continue;
            }

            let request = match MsgPackCodec::decode::<FramedRequest>(frame.payload()) {
                Ok(request) => request,
                Err(e) => {
                    let outcome = CallOutcome::error(
                        ErrorKind::ValidationError,
                        format!("Malformed request: {e}"),
                    );
                    send_reply(&replies, id, &outcome).await;
                    continue;
                }
            };

            match request.method.as_str() {
                METHODS => {
                    let outcome = CallOutcome::success(json!(dispatcher.list_methods()));
                    send_reply(&replies, id, &outcome).await;
                }
                SCHEMA => {
                    let outcome = CallOutcome::success(dispatcher.get_schema().to_json());
                    send_reply(&replies, id, &outcome).await;
                }
                METHOD_SCHEMA => {
                    let name = request.params.get("method").and_then(Value::as_str).unwrap_or("");
                    send_reply(&replies, id, &method_schema(&dispatcher, name)).await;
                }
                SHUTDOWN => {
                    drain(&mut in_flight).await;
                    let outcome = dispatcher.shutdown_async().await;
                    send_reply(&replies, id, &outcome).await;
                    info!("Shutdown requested; closing framed transport");
                    break 'read Ok(());
                }
                _ => {
                    let dispatcher = dispatcher.clone();
                    let replies = replies.clone();
                    in_flight.spawn(async move {
                        let outcome = dispatcher.call_async(&request.method, request.params).await;
                        send_reply(&replies, id, &outcome).await;
                    });
                }
            }
        }
    };

    drain(&mut in_flight).await;
    drop(replies);
    match writer_task.await {
        Ok(written) => written?,
        Err(e) => error!(error = %e, "Reply writer task failed"),
    }

    debug!("Framed transport stopped");
    result
}

/// Collect finished call tasks without waiting for the rest.
fn reap(tasks: &mut JoinSet<()>) -> usize {
    let mut reaped = 0;
    while let Some(joined) = tasks.try_join_next() {
        reaped += 1;
        if let Err(e) = joined {
            error!(error = %e, "Call task failed");
        }
    }
    reaped
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Call task failed");
        }
    }
}

async fn send_reply(replies: &WriterHandle, id: u32, outcome: &CallOutcome) {
    let frame = match encode_reply(id, outcome, DEFAULT_MAX_PAYLOAD_SIZE) {
        Ok(frame) => frame,
        Err(e) => {
            error!(correlation_id = id, error = %e, "Failed to encode reply");
            return;
        }
    };

    if let Err(e) = replies.send(frame).await {
        warn!(correlation_id = id, error = %e, "Dropping reply");
    }
}

/// Encode `outcome` as a reply frame. A payload over `max_payload` is
/// replaced by a failure outcome naming its size.
fn encode_reply(id: u32, outcome: &CallOutcome, max_payload: u32) -> Result<OutboundFrame> {
    let payload = MsgPackCodec::encode(outcome)?;
    match u32::try_from(payload.len()) {
        Ok(len) if len <= max_payload => {
            let header = Header::reply(id, outcome.is_ok(), len);
            Ok(OutboundFrame::new(&header, Bytes::from(payload)))
        }
        _ => {
            warn!(correlation_id = id, size = payload.len(), "Reply exceeds payload limit");
            let too_large = CallOutcome::failure(Failure {
                category: Some("PayloadTooLarge".to_string()),
                ..Failure::new(
                    ErrorKind::HandlerError,
                    format!(
                        "Reply payload of {} bytes exceeds the {max_payload} byte limit",
                        payload.len()
                    ),
                )
            });
            let payload = MsgPackCodec::encode(&too_large)?;
            let len = u32::try_from(payload.len())
                .ok()
                .filter(|len| *len <= max_payload)
                .ok_or_else(|| WorkerError::Protocol("reply limit too small for an error outcome".into()))?;
            Ok(OutboundFrame::new(&Header::reply(id, false, len), Bytes::from(payload)))
        }
    }
}
