//! Transport module
//!
//! Turns queued [`EncodedPacket`]s into length-prefixed frames on the socket.
//! Each connection gets one writer task draining the session's outbound queue,
//! so packets reach the client in the order they were queued.

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{NetworkError, PhantomError, Result};
use crate::protocol::packets::EncodedPacket;

/// Most packets coalesced into one socket write
const MAX_BATCH: usize = 64;

/// Writes framed packets to an async sink
pub struct FrameWriter<W> {
    writer: W,
    buffer: BytesMut,
    frames_written: u64,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a frame writer over a sink
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: BytesMut::with_capacity(4096),
            frames_written: 0,
        }
    }

    /// Append one packet's frame to the pending write
    ///
    /// Oversized packets are dropped with a warning.
    pub fn queue(&mut self, packet: &EncodedPacket) {
        match packet.to_frame() {
            Ok(frame) => {
                self.buffer.extend_from_slice(&frame);
                self.frames_written += 1;
            }
            Err(e) => {
                warn!(kind = ?packet.kind, error = %e, "Dropping unframeable packet");
            }
        }
    }

    /// Write everything queued and flush
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let pending = self.buffer.split();
        self.writer
            .write_all(&pending)
            .await
            .map_err(|e| PhantomError::Network(NetworkError::WriteError(e.to_string())))?;
        self.writer
            .flush()
            .await
            .map_err(|e| PhantomError::Network(NetworkError::WriteError(e.to_string())))?;
        trace!(bytes = pending.len(), "Frames flushed");
        Ok(())
    }

    /// Write a single packet immediately
    pub async fn write_packet(&mut self, packet: &EncodedPacket) -> Result<()> {
        self.queue(packet);
        self.flush().await
    }

    /// Drain the outbound queue until every sender is gone
    pub async fn run(mut self, mut rx: mpsc::Receiver<EncodedPacket>) -> Result<W> {
        while let Some(packet) = rx.recv().await {
            self.queue(&packet);

            // Coalesce whatever else is already waiting
            for _ in 1..MAX_BATCH {
                match rx.try_recv() {
                    Ok(packet) => self.queue(&packet),
                    Err(_) => break,
                }
            }

            self.flush().await?;
        }

        debug!(frames = self.frames_written, "Outbound queue closed");
        Ok(self.writer)
    }

    /// Number of frames written so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Consume the writer and return the sink
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::protocol::version::PacketKind;

    fn packet(id: i32, payload: &'static [u8]) -> EncodedPacket {
        EncodedPacket {
            kind: PacketKind::Metadata,
            id,
            payload: Bytes::from_static(payload),
        }
    }

    #[tokio::test]
    async fn test_write_packet_frames() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_packet(&packet(0x44, &[1, 2, 3])).await.unwrap();

        assert_eq!(writer.into_inner(), vec![0x04, 0x44, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_run_preserves_order() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(packet(1, &[0xA])).await.unwrap();
        tx.send(packet(2, &[0xB])).await.unwrap();
        drop(tx);

        let out = FrameWriter::new(Vec::new()).run(rx).await.unwrap();

        assert_eq!(out, vec![0x02, 0x01, 0xA, 0x02, 0x02, 0xB]);
    }
}
