use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hopline_chain::Router;
use hopline_config::HandlerKind;
use hopline_core::io::{PrefixedStream, relay_bidirectional};
use hopline_proto::http::{self, MessageReader, RequestHead};
use hopline_proto::{HttpError, TargetAddr};
use hopline_transport::BoxedStream;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{Handler, RelayOptions};
use crate::error::HandlerError;

/// Write side of the client connection, shared with the response pump.
type ClientWriter = Arc<Mutex<WriteHalf<BoxedStream>>>;

/// HTTP proxy: `CONNECT` tunnels and absolute-URI forwarding.
///
/// Forwarded requests are handled one at a time. Each is rewritten to
/// origin form with the `Proxy-*` headers dropped and sent to its own
/// origin; the upstream connection is reused while consecutive requests
/// name the same target.
pub struct HttpHandler {
    router: Router,
    relay: RelayOptions,
}

impl HttpHandler {
    pub fn new(router: Router, relay: RelayOptions) -> Self {
        Self { router, relay }
    }

    async fn open(
        &self,
        client: &ClientWriter,
        target: &TargetAddr,
    ) -> Result<BoxedStream, HandlerError> {
        match self.router.dial(target).await {
            Ok(upstream) => Ok(upstream),
            Err(e) => {
                reply(client, 502, "Bad Gateway").await;
                Err(e.into())
            }
        }
    }

    /// Next request head; `None` once the client is done or idle too long.
    async fn next_request(
        &self,
        reader: &mut MessageReader<ReadHalf<BoxedStream>>,
        client: &ClientWriter,
    ) -> Result<Option<Bytes>, HandlerError> {
        let next = tokio::time::timeout(
            self.relay.idle_timeout,
            reader.next_head(self.relay.max_header_bytes),
        );
        match next.await {
            Err(_) => Ok(None),
            Ok(Ok(head)) => Ok(head),
            Ok(Err(e @ HttpError::HeadTooLarge(_))) => {
                reply(client, 431, "Request Header Fields Too Large").await;
                Err(e.into())
            }
            Ok(Err(e)) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Handler for HttpHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Http
    }

    async fn handle(&self, stream: BoxedStream, peer: SocketAddr) -> Result<(), HandlerError> {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = MessageReader::new(read_half);
        let client: ClientWriter = Arc::new(Mutex::new(write_half));
        let mut upstream: Option<Upstream> = None;
        let mut requests = 0u64;

        loop {
            // The origin closed and the client has seen end of stream.
            if upstream.as_ref().is_some_and(Upstream::is_closed) {
                break;
            }
            let Some(head) = self.next_request(&mut reader, &client).await? else {
                break;
            };
            let request = match parse_request(&head) {
                Ok(parsed) => parsed,
                Err(e) => {
                    reply(&client, 400, "Bad Request").await;
                    return Err(e.into());
                }
            };

            match request {
                Parsed::Connect(target) => {
                    if let Some(previous) = upstream.take() {
                        previous.close().await;
                    }
                    debug!(peer = %peer, target = %target, "CONNECT");
                    let tunnel = self.open(&client, &target).await?;
                    let Ok(writer) = Arc::try_unwrap(client) else {
                        return Err(std::io::Error::other("client writer still shared").into());
                    };
                    let mut writer = writer.into_inner();
                    writer.write_all(http::CONNECT_ESTABLISHED).await?;

                    let (read_half, buffered) = reader.into_parts();
                    let client = PrefixedStream::new(buffered, read_half.unsplit(writer));
                    let stats = relay_bidirectional(
                        client,
                        tunnel,
                        self.relay.idle_timeout,
                        self.relay.buffer_size,
                    )
                    .await?;
                    debug!(peer = %peer, up = stats.uploaded, down = stats.downloaded, "tunnel closed");
                    return Ok(());
                }
                Parsed::Forward { head, target, path } => {
                    let body = match head.body_length() {
                        Ok(body) => body,
                        Err(e) => {
                            reply(&client, 400, "Bad Request").await;
                            return Err(e.into());
                        }
                    };
                    debug!(peer = %peer, method = %head.method, target = %target, "forward");

                    let current = match upstream.take() {
                        Some(up) if up.target == target => up,
                        stale => {
                            if let Some(previous) = stale {
                                previous.close().await;
                            }
                            let stream = self.open(&client, &target).await?;
                            Upstream::start(target, stream, client.clone(), self.relay.buffer_size)
                        }
                    };
                    let current = upstream.insert(current);
                    current.writer.write_all(&head.to_origin_form(&path)).await?;
                    reader.copy_body(body, &mut current.writer).await?;
                    current.writer.flush().await?;
                    requests += 1;
                }
            }
        }

        if let Some(last) = upstream {
            last.finish(self.relay.idle_timeout).await;
        }
        debug!(peer = %peer, requests, "connection closed");
        Ok(())
    }
}

/// Connection to the origin serving the current run of requests.
///
/// Responses are copied back to the client by a pump task so that the
/// handler can keep reading request bodies while the origin answers.
struct Upstream {
    target: TargetAddr,
    writer: WriteHalf<BoxedStream>,
    stop: Option<oneshot::Sender<()>>,
    pump: JoinHandle<()>,
}

impl Upstream {
    fn start(target: TargetAddr, stream: BoxedStream, client: ClientWriter, buffer_size: usize) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let (stop, stopped) = oneshot::channel();
        let pump = tokio::spawn(pump_responses(reader, client, stopped, buffer_size));
        Self {
            target,
            writer,
            stop: Some(stop),
            pump,
        }
    }

    fn is_closed(&self) -> bool {
        self.pump.is_finished()
    }

    /// Stop relaying responses and drop the origin connection.
    async fn close(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = self.pump.await;
    }

    /// Let the origin finish its last response after the client is done.
    async fn finish(mut self, idle_timeout: Duration) {
        let _ = self.writer.shutdown().await;
        if tokio::time::timeout(idle_timeout, &mut self.pump).await.is_err() {
            self.close().await;
        }
    }
}

async fn pump_responses(
    mut origin: ReadHalf<BoxedStream>,
    client: ClientWriter,
    mut stop: oneshot::Receiver<()>,
    buffer_size: usize,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = tokio::select! {
            biased;
            _ = &mut stop => return,
            read = origin.read(&mut buf) => match read {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            },
        };
        let mut client = client.lock().await;
        if client.write_all(&buf[..n]).await.is_err() || client.flush().await.is_err() {
            return;
        }
    }
    // Close-delimited responses end when the client sees end of stream.
    let _ = client.lock().await.shutdown().await;
}

async fn reply(client: &ClientWriter, status: u16, reason: &str) {
    let mut client = client.lock().await;
    let _ = client.write_all(&http::status_response(status, reason)).await;
    let _ = client.shutdown().await;
}

enum Parsed {
    Connect(TargetAddr),
    Forward {
        head: RequestHead,
        target: TargetAddr,
        path: String,
    },
}

fn parse_request(raw: &[u8]) -> Result<Parsed, HttpError> {
    let head = RequestHead::parse(raw)?;
    if head.is_connect() {
        return Ok(Parsed::Connect(TargetAddr::parse(&head.target)?));
    }
    let (target, path) = http::absolute_target(&head.target)?;
    Ok(Parsed::Forward { head, target, path })
}
