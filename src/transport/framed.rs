//! Exact-length reads and writes of protocol messages over a byte stream.
//!
//! Streams may return fewer bytes than requested on any single read, so
//! [`FramedStream::read_exact`] keeps reading until the buffer is full. A read
//! that makes no progress is retried at most `max_empty_reads` times before
//! giving up with [`WireError::NoProgress`]. With tokio streams an empty
//! read means end of stream, so in practice this reports a peer hang-up.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, ResultExt, WireError};
use crate::protocol::{Header, Message, HEADER_SIZE};

/// Default bound on consecutive zero-byte reads.
pub const DEFAULT_MAX_EMPTY_READS: usize = 100;

/// A byte stream that moves whole protocol messages.
#[derive(Debug)]
pub struct FramedStream<S> {
    stream: S,
    max_empty_reads: usize,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a connected stream.
    pub fn new(stream: S, max_empty_reads: usize) -> Self {
        Self {
            stream,
            max_empty_reads: max_empty_reads.max(1),
        }
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Write all of `buf`.
    ///
    /// Fails with [`WireError::ShortWrite`] when the stream stops accepting
    /// bytes before the whole buffer is written.
    pub async fn write_exact(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.stream.write(&buf[written..]).await?;
            if n == 0 {
                return Err(WireError::ShortWrite {
                    written,
                    expected: buf.len(),
                });
            }
            written += n;
        }
        Ok(())
    }

    /// Read until `buf` is full.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut offset = 0;
        while offset < buf.len() {
            offset += self.read_fill(&mut buf[offset..]).await?;
        }
        Ok(())
    }

    /// Perform reads until at least one byte arrives, up to the empty-read bound.
    async fn read_fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        for _ in 0..self.max_empty_reads {
            let n = self.stream.read(buf).await?;
            if n > 0 {
                return Ok(n);
            }
        }
        Err(WireError::NoProgress {
            attempts: self.max_empty_reads,
        })
    }

    /// Send header, then body (primary then overflow), then flush.
    pub async fn send(&mut self, request: &Message) -> Result<()> {
        self.write_exact(&request.header_bytes())
            .await
            .context("failed to send header")?;

        let (primary, overflow) = request.body_segments();
        self.write_exact(primary)
            .await
            .context("failed to send body")?;
        if let Some(overflow) = overflow {
            self.write_exact(overflow)
                .await
                .context("failed to send body")?;
        }

        self.stream.flush().await.context("failed to send body")?;
        Ok(())
    }

    /// Receive one message into `response`, rejecting bodies over `max_body` bytes.
    pub async fn recv(&mut self, response: &mut Message, max_body: usize) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE];
        self.read_exact(&mut header)
            .await
            .context("failed to receive header")?;
        let header = Header::decode(&header);

        let body = response
            .prepare_recv(header, max_body)
            .context("failed to receive body")?;
        self.read_exact(body)
            .await
            .context("failed to receive body")?;
        Ok(())
    }

    /// Shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, ReadBuf};

    /// Yields its data one byte per read.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
    }

    impl AsyncRead for Trickle {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.pos < self.data.len() && buf.remaining() > 0 {
                let byte = self.data[self.pos];
                buf.put_slice(&[byte]);
                self.pos += 1;
            }
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for Trickle {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Never yields data; counts read attempts. Accepts at most `accept` bytes
    /// in total on the write side.
    struct Stalled {
        reads: Arc<AtomicUsize>,
        accept: usize,
    }

    impl AsyncRead for Stalled {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for Stalled {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            let n = buf.len().min(self.accept);
            self.accept -= n;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_read_exact_tolerates_single_byte_reads() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let mut framed = FramedStream::new(
            Trickle {
                data: data.clone(),
                pos: 0,
            },
            DEFAULT_MAX_EMPTY_READS,
        );

        let mut buf = vec![0u8; data.len()];
        framed.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, data);
    }

    #[tokio::test]
    async fn test_read_exact_fails_after_bounded_empty_reads() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut framed = FramedStream::new(
            Stalled {
                reads: reads.clone(),
                accept: 0,
            },
            100,
        );

        let mut buf = [0u8; 8];
        let err = framed.read_exact(&mut buf).await.unwrap_err();
        assert!(matches!(err, WireError::NoProgress { attempts: 100 }));
        assert!(err.to_string().starts_with("end of stream"));
        assert_eq!(reads.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn test_write_exact_reports_short_write() {
        let mut framed = FramedStream::new(
            Stalled {
                reads: Arc::new(AtomicUsize::new(0)),
                accept: 5,
            },
            DEFAULT_MAX_EMPTY_READS,
        );

        let err = framed.write_exact(&[0u8; 8]).await.unwrap_err();
        assert!(matches!(
            err,
            WireError::ShortWrite {
                written: 5,
                expected: 8
            }
        ));
    }

    #[tokio::test]
    async fn test_send_short_header_has_phase_context() {
        let mut framed = FramedStream::new(
            Stalled {
                reads: Arc::new(AtomicUsize::new(0)),
                accept: 3,
            },
            DEFAULT_MAX_EMPTY_READS,
        );

        let mut request = Message::new(8);
        request.put_u64(1);
        request.put_header(2, 0, 0);

        let err = framed.send(&request).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to send header"));
    }

    #[tokio::test]
    async fn test_send_recv_over_pipe() {
        let (client, server) = duplex(4096);
        let mut tx = FramedStream::new(client, DEFAULT_MAX_EMPTY_READS);
        let mut rx = FramedStream::new(server, DEFAULT_MAX_EMPTY_READS);

        let payload: Vec<u8> = (1..=16).collect();
        let mut request = Message::new(16);
        request.put_bytes(&payload);
        request.put_header(5, 0, 0);
        tx.send(&request).await.unwrap();

        let mut response = Message::new(16);
        rx.recv(&mut response, 1024).await.unwrap();
        assert_eq!(response.header(), Header::new(2, 5, 0, 0));
        assert_eq!(response.body(), &payload[..]);
    }

    #[tokio::test]
    async fn test_send_writes_overflow_segment() {
        let (client, server) = duplex(4096);
        let mut tx = FramedStream::new(client, DEFAULT_MAX_EMPTY_READS);
        let mut rx = FramedStream::new(server, DEFAULT_MAX_EMPTY_READS);

        let mut request = Message::new(8);
        for i in 0..10u64 {
            request.put_u64(i);
        }
        request.put_header(1, 0, 0);
        assert!(request.has_overflow());
        tx.send(&request).await.unwrap();

        // Receive side grows the primary buffer to hold everything.
        let mut response = Message::new(8);
        rx.recv(&mut response, 1024).await.unwrap();
        assert_eq!(response.header().words, 10);
        for i in 0..10u64 {
            assert_eq!(response.get_u64().unwrap(), i);
        }
    }

    #[tokio::test]
    async fn test_recv_rejects_oversized_body() {
        let (client, server) = duplex(4096);
        let mut tx = FramedStream::new(client, DEFAULT_MAX_EMPTY_READS);
        let mut rx = FramedStream::new(server, DEFAULT_MAX_EMPTY_READS);

        let mut request = Message::new(64);
        request.put_bytes(&[7u8; 64]);
        request.put_header(3, 0, 0);
        tx.send(&request).await.unwrap();

        let mut response = Message::new(16);
        let err = rx.recv(&mut response, 32).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to receive body"));
        assert!(matches!(
            err.root(),
            WireError::BodyTooLarge { size: 64, max: 32 }
        ));
    }
}
