//! Bidirectional byte relay between an accepted client and its upstream.
//!
//! Each direction is a small read → write → flush pump. Both pumps are
//! polled from one future so a stalled writer in one direction never
//! blocks progress in the other, which matters once a connection is
//! tunnelled through several hops.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

/// Byte counts reported when a relay finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from the client towards the upstream.
    pub uploaded: u64,
    /// Bytes copied from the upstream back to the client.
    pub downloaded: u64,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Read,
    Write { pos: usize, end: usize },
    Flush,
    Shutdown,
    Done,
}

enum Step {
    Moved,
    Closed,
}

struct Pump {
    buf: Box<[u8]>,
    stage: Stage,
    total: u64,
}

impl Pump {
    fn new(buffer_size: usize) -> Self {
        Self {
            buf: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
            stage: Stage::Read,
            total: 0,
        }
    }

    fn is_done(&self) -> bool {
        matches!(self.stage, Stage::Done)
    }

    fn poll_step<R, W>(
        &mut self,
        cx: &mut Context<'_>,
        reader: &mut R,
        writer: &mut W,
    ) -> Poll<io::Result<Step>>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        loop {
            match self.stage {
                Stage::Read => {
                    let mut read_buf = ReadBuf::new(&mut self.buf);
                    ready!(Pin::new(&mut *reader).poll_read(cx, &mut read_buf))?;
                    let n = read_buf.filled().len();
                    self.stage = if n == 0 {
                        Stage::Shutdown
                    } else {
                        Stage::Write { pos: 0, end: n }
                    };
                }
                Stage::Write { pos, end } => {
                    let n = ready!(Pin::new(&mut *writer).poll_write(cx, &self.buf[pos..end]))?;
                    if n == 0 {
                        return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                    }
                    self.total += n as u64;
                    self.stage = if pos + n >= end {
                        Stage::Flush
                    } else {
                        Stage::Write { pos: pos + n, end }
                    };
                }
                Stage::Flush => {
                    ready!(Pin::new(&mut *writer).poll_flush(cx))?;
                    self.stage = Stage::Read;
                    return Poll::Ready(Ok(Step::Moved));
                }
                Stage::Shutdown => {
                    // The peer may already be gone; a failed shutdown still ends this direction.
                    let _ = ready!(Pin::new(&mut *writer).poll_shutdown(cx));
                    self.stage = Stage::Done;
                    return Poll::Ready(Ok(Step::Closed));
                }
                Stage::Done => return Poll::Pending,
            }
        }
    }
}

/// Copy bytes both ways until both sides reach EOF or the pair stays idle.
///
/// Half-close is forwarded: EOF from one side shuts down the write half of
/// the other while the opposite direction keeps flowing. The idle timer is
/// reset whenever either direction moves data.
pub async fn relay_bidirectional<A, B>(
    client: A,
    upstream: B,
    idle_timeout: Duration,
    buffer_size: usize,
) -> io::Result<RelayStats>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_r, mut client_w) = tokio::io::split(client);
    let (mut upstream_r, mut upstream_w) = tokio::io::split(upstream);

    let mut upload = Pump::new(buffer_size);
    let mut download = Pump::new(buffer_size);

    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    while !(upload.is_done() && download.is_done()) {
        let step = std::future::poll_fn(|cx| {
            let up = upload.poll_step(cx, &mut client_r, &mut upstream_w);
            let down = download.poll_step(cx, &mut upstream_r, &mut client_w);
            match (up, down) {
                (Poll::Ready(Err(e)), _) | (_, Poll::Ready(Err(e))) => Poll::Ready(Err(e)),
                (Poll::Pending, Poll::Pending) => Poll::Pending,
                (up, down) => Poll::Ready(Ok(moved(&up) || moved(&down))),
            }
        });

        tokio::select! {
            result = step => {
                if result? {
                    idle.as_mut().reset(Instant::now() + idle_timeout);
                }
            }
            () = &mut idle => break,
        }
    }

    Ok(RelayStats {
        uploaded: upload.total,
        downloaded: download.total,
    })
}

fn moved(poll: &Poll<io::Result<Step>>) -> bool {
    matches!(poll, Poll::Ready(Ok(Step::Moved)))
}
