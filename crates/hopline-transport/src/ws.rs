//! WebSocket dialers: `ws`, `wss` and `mwss`.
//!
//! The handshake runs over whatever stream reaches the node, so the same
//! dialer works for the first hop (fresh TCP) and for later hops (a tunnel
//! opened by the previous node). `wss` and `mwss` add a TLS layer first;
//! `mwss` also sends the configured extra headers. Streams are not
//! multiplexed: every dial performs its own WebSocket handshake.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use hopline_core::defaults::DEFAULT_WS_PATH;
use hopline_core::transport::WsIo;
use rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::client_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tracing::debug;

use crate::error::TransportError;
use crate::tcp::TcpDialer;
use crate::tls::{client_connector, extract_host, server_name};
use crate::{BoxedStream, Dialer};

/// Options shared by the WebSocket dialer family.
#[derive(Debug, Clone, Default)]
pub struct WsSettings {
    /// Overrides the `Host` header and the TLS server name.
    pub host: Option<String>,
    pub path: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub insecure: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WsFlavor {
    Ws,
    Wss,
    Mwss,
}

impl WsFlavor {
    fn name(self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Wss => "wss",
            Self::Mwss => "mwss",
        }
    }
}

struct TlsLayer {
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

pub struct WsDialer {
    flavor: WsFlavor,
    tcp: TcpDialer,
    host: Option<String>,
    path: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    tls: Option<TlsLayer>,
}

impl WsDialer {
    /// Build a dialer for the node at `node_addr`.
    ///
    /// Fails when a header name or value is not valid HTTP, or when the TLS
    /// server name derived from `host` (or the node address) is invalid.
    pub fn new(
        flavor: WsFlavor,
        settings: &WsSettings,
        node_addr: &str,
        tcp: TcpDialer,
    ) -> Result<Self, TransportError> {
        let headers = if flavor == WsFlavor::Mwss {
            settings
                .headers
                .iter()
                .map(|(k, v)| parse_header(k, v))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        let tls = match flavor {
            WsFlavor::Ws => None,
            WsFlavor::Wss | WsFlavor::Mwss => {
                let sni_host = settings
                    .host
                    .clone()
                    .unwrap_or_else(|| extract_host(node_addr));
                Some(TlsLayer {
                    connector: client_connector(settings.insecure),
                    server_name: server_name(&sni_host)?,
                })
            }
        };

        Ok(Self {
            flavor,
            tcp,
            host: settings.host.clone(),
            path: settings
                .path
                .clone()
                .unwrap_or_else(|| DEFAULT_WS_PATH.to_string()),
            headers,
            tls,
        })
    }

    fn request_url(&self, addr: &str) -> String {
        let scheme = if self.tls.is_some() { "wss" } else { "ws" };
        let authority = self.host.as_deref().unwrap_or(addr);
        format!("{scheme}://{authority}{}", self.path)
    }

    async fn upgrade(&self, stream: BoxedStream, addr: &str) -> Result<BoxedStream, TransportError> {
        let stream: BoxedStream = match &self.tls {
            Some(tls) => Box::new(
                tls.connector
                    .connect(tls.server_name.clone(), stream)
                    .await?,
            ),
            None => stream,
        };

        let url = self.request_url(addr);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        for (name, value) in &self.headers {
            request.headers_mut().insert(name.clone(), value.clone());
        }

        let (ws, response) = client_async(request, stream)
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        debug!(url = %url, status = %response.status(), "websocket established");
        Ok(Box::new(WsIo::new(ws)))
    }
}

impl fmt::Debug for WsDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsDialer")
            .field("flavor", &self.flavor)
            .field("host", &self.host)
            .field("path", &self.path)
            .field("headers", &self.headers.len())
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), TransportError> {
    let header = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| TransportError::Config(format!("invalid header name {name:?}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| TransportError::Config(format!("invalid value for header {name:?}")))?;
    Ok((header, value))
}

#[async_trait]
impl Dialer for WsDialer {
    fn kind(&self) -> &'static str {
        self.flavor.name()
    }

    async fn dial(&self, addr: &str) -> Result<BoxedStream, TransportError> {
        let tcp = self.tcp.connect(addr).await?;
        self.upgrade(Box::new(tcp), addr).await
    }

    async fn handshake(
        &self,
        stream: BoxedStream,
        addr: &str,
    ) -> Result<BoxedStream, TransportError> {
        self.upgrade(stream, addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    fn settings(host: Option<&str>, path: Option<&str>) -> WsSettings {
        WsSettings {
            host: host.map(str::to_string),
            path: path.map(str::to_string),
            ..WsSettings::default()
        }
    }

    #[test]
    fn url_uses_host_override_and_path() {
        let d = WsDialer::new(
            WsFlavor::Ws,
            &settings(Some("front.example"), Some("/tunnel")),
            "10.0.0.1:80",
            TcpDialer::default(),
        )
        .unwrap();
        assert_eq!(d.request_url("10.0.0.1:80"), "ws://front.example/tunnel");

        let d = WsDialer::new(WsFlavor::Ws, &settings(None, None), "10.0.0.1:80", TcpDialer::default())
            .unwrap();
        assert_eq!(d.request_url("10.0.0.1:80"), "ws://10.0.0.1:80/");
    }

    #[test]
    fn mwss_rejects_bad_headers() {
        let mut s = settings(None, None);
        s.headers.insert("Bad Header".into(), "v".into());
        let err = WsDialer::new(WsFlavor::Mwss, &s, "edge.example:443", TcpDialer::default())
            .unwrap_err();
        assert!(matches!(err, TransportError::Config(_)));
    }

    #[test]
    fn wss_rejects_bad_server_name() {
        let err = WsDialer::new(
            WsFlavor::Wss,
            &settings(Some("not a host"), None),
            "edge.example:443",
            TcpDialer::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TransportError::Config(_)));
    }

    #[tokio::test]
    async fn ws_dial_carries_bytes_and_path() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut seen_path = String::new();
            let callback = |req: &Request, resp: Response| {
                seen_path = req.uri().path().to_string();
                Ok::<_, ErrorResponse>(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(tcp, callback).await.unwrap();
            let msg = ws.next().await.unwrap().unwrap();
            let mut reply = b"echo:".to_vec();
            reply.extend_from_slice(&msg.into_data());
            ws.send(Message::Binary(reply)).await.unwrap();
            seen_path
        });

        let dialer = WsDialer::new(
            WsFlavor::Ws,
            &settings(None, Some("/chain")),
            &addr,
            TcpDialer::default(),
        )
        .unwrap();
        let mut stream = dialer.dial(&addr).await.unwrap();
        stream.write_all(b"hello").await.unwrap();
        stream.flush().await.unwrap();

        let mut buf = [0u8; 10];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"echo:hello");
        assert_eq!(server.await.unwrap(), "/chain");
    }
}
