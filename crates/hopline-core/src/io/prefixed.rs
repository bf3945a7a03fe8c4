//! Replay of bytes that were read past a protocol head.
//!
//! Handshakes read into a buffer until they find the end of a request or
//! response head. Whatever arrived after it belongs to the tunnelled
//! payload and is handed back through `PrefixedStream` before any new
//! reads reach the socket.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Stream wrapper that yields `prefix` before reading from `inner`.
///
/// Writes always go straight to the inner stream.
pub struct PrefixedStream<S> {
    prefix: Bytes,
    inner: S,
}

impl<S> PrefixedStream<S> {
    pub fn new(prefix: impl Into<Bytes>, inner: S) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PrefixedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if !self.prefix.is_empty() {
            let n = self.prefix.len().min(buf.remaining());
            buf.put_slice(&self.prefix[..n]);
            self.prefix.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PrefixedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, data)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    #[tokio::test]
    async fn yields_prefix_then_inner() {
        let (mut peer, local) = duplex(256);
        let mut stream = PrefixedStream::new(Bytes::from_static(b"body-start;"), local);

        peer.write_all(b"body-rest").await.unwrap();
        drop(peer);

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"body-start;body-rest");
    }

    #[tokio::test]
    async fn small_reads_drain_prefix_in_order() {
        let (_peer, local) = duplex(256);
        let mut stream = PrefixedStream::new(b"abcdef".to_vec(), local);

        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"abcd");

        assert_eq!(stream.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[tokio::test]
    async fn writes_bypass_prefix() {
        let (mut peer, local) = duplex(256);
        let mut stream = PrefixedStream::new(Bytes::from_static(b"unread"), local);

        stream.write_all(b"outbound").await.unwrap();
        let mut buf = [0u8; 8];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"outbound");

        let mut unread = [0u8; 6];
        stream.read_exact(&mut unread).await.unwrap();
        assert_eq!(&unread, b"unread");
    }
}
