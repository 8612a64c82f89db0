//! Dedicated writer task for framed replies.
//!
//! Reply tasks never share the output stream. They hand finished frames to
//! one task over an mpsc channel, which batches whatever is ready and writes
//! it with a single flush.
//!
//! ```text
//! Call task 1 ─┐
//! Call task 2 ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► stdout
//! Call task N ─┘
//! ```

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, WorkerError};
use crate::protocol::{Header, HEADER_SIZE};

/// Channel capacity between call tasks and the writer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames to batch in a single write.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written.
#[derive(Debug)]
pub struct OutboundFrame {
    pub header: [u8; HEADER_SIZE],
    pub payload: Bytes,
}

impl OutboundFrame {
    #[inline]
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// Header plus payload.
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Cloneable handle for queueing frames to the writer task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame. Fails once the writer task has exited.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx.send(frame).await.map_err(|_| {
            WorkerError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "reply writer has stopped",
            ))
        })
    }
}

/// Spawn the writer task. It ends when every handle has been dropped.
pub fn spawn_writer_task<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = BytesMut::with_capacity(64 * 1024);

    while let Some(first) = rx.recv().await {
        out.clear();
        append(&mut out, &first);

        let mut batched = 1;
        while batched < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => {
                    append(&mut out, &frame);
                    batched += 1;
                }
                Err(_) => break,
            }
        }

        writer.write_all(&out).await?;
        writer.flush().await?;
        tracing::trace!(frames = batched, bytes = out.len(), "Wrote reply batch");
    }

    Ok(())
}

fn append(out: &mut BytesMut, frame: &OutboundFrame) {
    out.reserve(frame.size());
    out.extend_from_slice(&frame.header);
    out.extend_from_slice(&frame.payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameBuffer;
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn test_outbound_frame_size() {
        let header = Header::reply(42, true, 5);
        let frame = OutboundFrame::new(&header, Bytes::from_static(b"hello"));
        assert_eq!(frame.size(), HEADER_SIZE + 5);
    }

    #[tokio::test]
    async fn test_frames_arrive_in_send_order() {
        let (client, mut server) = duplex(64 * 1024);
        let (handle, task) = spawn_writer_task(client);

        for i in 0..10u32 {
            let payload = Bytes::copy_from_slice(&i.to_be_bytes());
            let header = Header::reply(i, i % 2 == 0, 4);
            handle.send(OutboundFrame::new(&header, payload)).await.unwrap();
        }
        drop(handle);
        task.await.unwrap().unwrap();

        let mut bytes = Vec::new();
        server.read_to_end(&mut bytes).await.unwrap();

        let frames = FrameBuffer::new().push(&bytes).unwrap();
        let ids: Vec<u32> = frames.iter().map(|f| f.correlation_id()).collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        assert!(frames[1].is_error());
        assert!(!frames[2].is_error());
    }

    #[tokio::test]
    async fn test_send_after_writer_exit_fails() {
        let (client, server) = duplex(16);
        drop(server);
        let (handle, task) = spawn_writer_task(client);

        let header = Header::reply(1, true, 3);
        // First frame fails to write and ends the task.
        let _ = handle
            .send(OutboundFrame::new(&header, Bytes::from_static(b"abc")))
            .await;
        assert!(task.await.unwrap().is_err());

        let result = handle
            .send(OutboundFrame::new(&header, Bytes::from_static(b"abc")))
            .await;
        assert!(result.is_err());
    }
}
