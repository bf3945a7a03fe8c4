//! WebSocket byte-stream adapter.
//!
//! `WsIo` turns a `WebSocketStream` into `AsyncRead + AsyncWrite` so a
//! WebSocket dialer can hand it to proxy connectors like any socket.
//! Writes become binary frames; text and binary frames are read back as
//! bytes; pings are answered; a close frame reads as EOF.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Buf, Bytes};
use futures_util::{Sink, Stream};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{Error as WsError, Message},
};

pub struct WsIo<S> {
    ws: WebSocketStream<S>,
    pending: Bytes,
    closed: bool,
}

impl<S> WsIo<S> {
    pub fn new(ws: WebSocketStream<S>) -> Self {
        Self {
            ws,
            pending: Bytes::new(),
            closed: false,
        }
    }

    fn drain_into(&mut self, buf: &mut ReadBuf<'_>) {
        let n = self.pending.len().min(buf.remaining());
        buf.put_slice(&self.pending[..n]);
        self.pending.advance(n);
    }
}

impl<S> AsyncRead for WsIo<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = &mut *self;
        loop {
            if !this.pending.is_empty() {
                this.drain_into(buf);
                return Poll::Ready(Ok(()));
            }
            if this.closed {
                return Poll::Ready(Ok(()));
            }

            let msg = match ready!(Pin::new(&mut this.ws).poll_next(cx)) {
                Some(Ok(msg)) => msg,
                Some(Err(err)) => return Poll::Ready(Err(ws_err(err))),
                None => {
                    this.closed = true;
                    continue;
                }
            };

            match msg {
                Message::Binary(data) => this.pending = Bytes::from(data),
                Message::Text(text) => this.pending = Bytes::from(text.into_bytes()),
                Message::Ping(payload) => {
                    let mut ws = Pin::new(&mut this.ws);
                    ready!(ws.as_mut().poll_ready(cx)).map_err(ws_err)?;
                    ws.start_send(Message::Pong(payload)).map_err(ws_err)?;
                }
                Message::Close(_) => this.closed = true,
                Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}

impl<S> AsyncWrite for WsIo<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        if data.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let mut ws = Pin::new(&mut self.ws);
        ready!(ws.as_mut().poll_ready(cx)).map_err(ws_err)?;
        ws.start_send(Message::Binary(data.to_vec()))
            .map_err(ws_err)?;
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.ws).poll_flush(cx).map_err(ws_err)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.ws).poll_close(cx).map_err(ws_err)
    }
}

fn ws_err(err: WsError) -> std::io::Error {
    match err {
        WsError::Io(e) => e,
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            std::io::Error::from(std::io::ErrorKind::BrokenPipe)
        }
        other => std::io::Error::other(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn pair() -> (WsIo<tokio::io::DuplexStream>, WsIo<tokio::io::DuplexStream>) {
        let (a, b) = duplex(4096);
        let client = WebSocketStream::from_raw_socket(a, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(b, Role::Server, None).await;
        (WsIo::new(client), WsIo::new(server))
    }

    #[tokio::test]
    async fn bytes_cross_as_frames() {
        let (mut client, mut server) = pair().await;

        client.write_all(b"over websocket").await.unwrap();
        client.flush().await.unwrap();

        let mut buf = [0u8; 14];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"over websocket");
    }

    #[tokio::test]
    async fn close_reads_as_eof() {
        let (mut client, mut server) = pair().await;

        client.write_all(b"last").await.unwrap();
        client.shutdown().await.unwrap();

        let mut out = Vec::new();
        server.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"last");
    }
}
