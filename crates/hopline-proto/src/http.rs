//! HTTP/1.1 proxy message heads.
//!
//! Only the parts a forward proxy needs: reading a head off the wire,
//! parsing request/status lines and headers, issuing CONNECT as a client,
//! and rewriting absolute-form requests to origin form.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::Credentials;
use crate::addr::{TargetAddr, split_host_port};
use crate::error::HttpError;

const HEAD_END: &[u8; 4] = b"\r\n\r\n";

/// Headers a proxy consumes and never forwards.
const HOP_BY_HOP_PROXY_HEADERS: &[&str] = &["proxy-authorization", "proxy-connection"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

/// Offset just past the blank line ending a head, if present.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_END.len())
        .position(|w| w == HEAD_END)
        .map(|pos| pos + HEAD_END.len())
}

/// Read until a complete head is buffered.
///
/// Returns the head (including the blank line) and any bytes read past it.
pub async fn read_head<S>(stream: &mut S, max_bytes: usize) -> Result<(Bytes, Bytes), HttpError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(1024);
    let mut scanned = 0usize;
    loop {
        if stream.read_buf(&mut buf).await? == 0 {
            return Err(HttpError::UnexpectedEof);
        }
        // Resume a few bytes back in case the terminator straddles two reads.
        let from = scanned.saturating_sub(HEAD_END.len() - 1);
        if let Some(end) = find_head_end(&buf[from..]) {
            let mut head = buf.freeze();
            let rest = head.split_off(from + end);
            if head.len() > max_bytes {
                return Err(HttpError::HeadTooLarge(max_bytes));
            }
            return Ok((head, rest));
        }
        if buf.len() > max_bytes {
            return Err(HttpError::HeadTooLarge(max_bytes));
        }
        scanned = buf.len();
    }
}

/// Longest chunk-size or trailer line accepted in a chunked body.
const MAX_CHUNK_LINE: usize = 4096;

/// How the body following a request head is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    Empty,
    Fixed(u64),
    Chunked,
}

/// Reads successive messages off one connection.
///
/// Bytes read past the current message stay buffered for the next one, so
/// pipelined or kept-alive requests are never lost between heads.
pub struct MessageReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Next message head, or `None` when the peer closed between messages.
    pub async fn next_head(&mut self, max_bytes: usize) -> Result<Option<Bytes>, HttpError> {
        let mut scanned = 0usize;
        loop {
            let from = scanned.saturating_sub(HEAD_END.len() - 1);
            if let Some(end) = find_head_end(&self.buf[from..]) {
                let end = from + end;
                if end > max_bytes {
                    return Err(HttpError::HeadTooLarge(max_bytes));
                }
                return Ok(Some(self.buf.split_to(end).freeze()));
            }
            if self.buf.len() > max_bytes {
                return Err(HttpError::HeadTooLarge(max_bytes));
            }
            scanned = self.buf.len();
            self.buf.reserve(4096);
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                return if self.buf.is_empty() {
                    Ok(None)
                } else {
                    Err(HttpError::UnexpectedEof)
                };
            }
        }
    }

    /// Copy the body announced by `body` to `out`, framing included.
    pub async fn copy_body<W>(&mut self, body: BodyLength, out: &mut W) -> Result<(), HttpError>
    where
        W: AsyncWrite + Unpin,
    {
        match body {
            BodyLength::Empty => Ok(()),
            BodyLength::Fixed(len) => self.copy_exact(len, out).await,
            BodyLength::Chunked => loop {
                let line = self.read_line().await?;
                out.write_all(&line).await?;
                let size = chunk_size(&line)?;
                if size == 0 {
                    // Trailer section ends with an empty line.
                    loop {
                        let trailer = self.read_line().await?;
                        out.write_all(&trailer).await?;
                        if trailer.as_ref() == b"\r\n" {
                            return Ok(());
                        }
                    }
                }
                self.copy_exact(size + 2, out).await?;
            },
        }
    }

    /// Give back the stream and whatever is still buffered.
    pub fn into_parts(self) -> (R, Bytes) {
        (self.inner, self.buf.freeze())
    }

    async fn fill(&mut self) -> Result<(), HttpError> {
        self.buf.reserve(8192);
        if self.inner.read_buf(&mut self.buf).await? == 0 {
            return Err(HttpError::UnexpectedEof);
        }
        Ok(())
    }

    async fn copy_exact<W>(&mut self, mut remaining: u64, out: &mut W) -> Result<(), HttpError>
    where
        W: AsyncWrite + Unpin,
    {
        while remaining > 0 {
            if self.buf.is_empty() {
                self.fill().await?;
            }
            let take = remaining.min(self.buf.len() as u64) as usize;
            let chunk = self.buf.split_to(take);
            out.write_all(&chunk).await?;
            remaining -= take as u64;
        }
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Bytes, HttpError> {
        loop {
            if let Some(pos) = self.buf.windows(2).position(|w| w == b"\r\n") {
                return Ok(self.buf.split_to(pos + 2).freeze());
            }
            if self.buf.len() > MAX_CHUNK_LINE {
                return Err(HttpError::Malformed("chunk line too long"));
            }
            self.fill().await?;
        }
    }
}

fn chunk_size(line: &[u8]) -> Result<u64, HttpError> {
    let text = std::str::from_utf8(line).map_err(|_| HttpError::Malformed("chunk size"))?;
    let digits = text.trim_end().split(';').next().unwrap_or_default().trim();
    u64::from_str_radix(digits, 16).map_err(|_| HttpError::Malformed("chunk size"))
}

fn parse_lines(head: &[u8]) -> Result<(&str, Vec<(String, String)>), HttpError> {
    let text = std::str::from_utf8(head).map_err(|_| HttpError::Malformed("non-UTF-8 head"))?;
    let mut lines = text.split("\r\n");
    let first = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or(HttpError::Malformed("empty start line"))?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or(HttpError::Malformed("header without colon"))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok((first, headers))
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

impl RequestHead {
    pub fn parse(head: &[u8]) -> Result<Self, HttpError> {
        let (line, headers) = parse_lines(head)?;
        let mut parts = line.split_whitespace();
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(HttpError::Malformed("request line"));
        };
        if !version.starts_with("HTTP/") {
            return Err(HttpError::Malformed("request version"));
        }
        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            headers,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }

    /// Body framing announced by the headers. `Transfer-Encoding` wins over
    /// `Content-Length`; only `chunked` as the final coding can be framed.
    pub fn body_length(&self) -> Result<BodyLength, HttpError> {
        if let Some(codings) = self.header("transfer-encoding") {
            let last = codings.rsplit(',').next().unwrap_or_default().trim();
            if last.eq_ignore_ascii_case("chunked") {
                return Ok(BodyLength::Chunked);
            }
            return Err(HttpError::Malformed("request body length cannot be determined"));
        }
        match self.header("content-length") {
            None => Ok(BodyLength::Empty),
            Some(value) => match value.parse::<u64>() {
                Ok(0) => Ok(BodyLength::Empty),
                Ok(len) => Ok(BodyLength::Fixed(len)),
                Err(_) => Err(HttpError::Malformed("content-length")),
            },
        }
    }

    /// Serialize with `path` as the request target and proxy headers dropped.
    pub fn to_origin_form(&self, path: &str) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.method, path, self.version);
        for (name, value) in &self.headers {
            let lower = name.to_ascii_lowercase();
            if HOP_BY_HOP_PROXY_HEADERS.contains(&lower.as_str()) {
                continue;
            }
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.into_bytes()
    }
}

impl ResponseHead {
    pub fn parse(head: &[u8]) -> Result<Self, HttpError> {
        let (line, headers) = parse_lines(head)?;
        let mut parts = line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/") {
            return Err(HttpError::Malformed("status version"));
        }
        let status = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or(HttpError::Malformed("status code"))?;
        Ok(Self {
            version: version.to_string(),
            status,
            reason: parts.next().unwrap_or_default().trim().to_string(),
            headers,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Split an absolute-form URI into its target and origin-form path.
pub fn absolute_target(uri: &str) -> Result<(TargetAddr, String), HttpError> {
    let rest = uri
        .strip_prefix("http://")
        .ok_or(HttpError::Malformed("only absolute http:// URIs can be forwarded"))?;
    let (authority, path) = match rest.find(['/', '?']) {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    let path = if path.starts_with('?') {
        format!("/{path}")
    } else {
        path.to_string()
    };
    let target = if split_host_port(authority).is_ok() {
        TargetAddr::parse(authority)?
    } else {
        TargetAddr::parse(&format!("{authority}:80"))?
    };
    Ok((target, path))
}

/// `Basic <base64(user:pass)>`.
pub fn basic_auth(creds: &Credentials) -> String {
    let raw = format!("{}:{}", creds.username, creds.password);
    format!("Basic {}", STANDARD.encode(raw))
}

/// Minimal response with an empty body.
pub fn status_response(status: u16, reason: &str) -> Vec<u8> {
    format!("HTTP/1.1 {status} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
        .into_bytes()
}

/// Tunnel established reply sent to CONNECT clients.
pub const CONNECT_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";

/// Ask the HTTP proxy on `stream` to CONNECT to `target`.
///
/// Returns bytes the proxy sent after its response head; callers replay
/// them before reading from the tunnel.
pub async fn connect<S>(
    stream: &mut S,
    target: &TargetAddr,
    credentials: Option<&Credentials>,
    max_head_bytes: usize,
) -> Result<Bytes, HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n");
    if let Some(creds) = credentials {
        request.push_str("Proxy-Authorization: ");
        request.push_str(&basic_auth(creds));
        request.push_str("\r\n");
    }
    request.push_str("Proxy-Connection: keep-alive\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let (head, rest) = read_head(stream, max_head_bytes).await?;
    let response = ResponseHead::parse(&head)?;
    if !(200..300).contains(&response.status) {
        return Err(HttpError::Rejected {
            status: response.status,
            reason: response.reason,
        });
    }
    Ok(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn parses_connect_request() {
        let req = RequestHead::parse(
            b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\nProxy-Authorization: Basic eA==\r\n\r\n",
        )
        .unwrap();
        assert!(req.is_connect());
        assert_eq!(req.target, "example.com:443");
        assert_eq!(req.header("proxy-authorization"), Some("Basic eA=="));
    }

    #[test]
    fn rejects_garbage_request_line() {
        assert!(RequestHead::parse(b"\r\n\r\n").is_err());
        assert!(RequestHead::parse(b"GET /\r\n\r\n").is_err());
        assert!(RequestHead::parse(b"GET / SPDY/3\r\n\r\n").is_err());
        assert!(RequestHead::parse(b"GET / HTTP/1.1\r\nbroken header\r\n\r\n").is_err());
    }

    #[test]
    fn parses_status_line() {
        let resp = ResponseHead::parse(b"HTTP/1.0 407 Proxy Authentication Required\r\n\r\n")
            .unwrap();
        assert_eq!(resp.status, 407);
        assert_eq!(resp.reason, "Proxy Authentication Required");
    }

    #[test]
    fn absolute_uri_targets() {
        let (target, path) = absolute_target("http://example.com/a/b?c=d").unwrap();
        assert_eq!(target.to_string(), "example.com:80");
        assert_eq!(path, "/a/b?c=d");

        let (target, path) = absolute_target("http://127.0.0.1:8080").unwrap();
        assert_eq!(target.to_string(), "127.0.0.1:8080");
        assert_eq!(path, "/");

        let (_, path) = absolute_target("http://h?q=1").unwrap();
        assert_eq!(path, "/?q=1");

        assert!(absolute_target("/relative").is_err());
    }

    #[test]
    fn origin_form_drops_proxy_headers() {
        let req = RequestHead::parse(
            b"GET http://h/x HTTP/1.1\r\nHost: h\r\nProxy-Connection: keep-alive\r\nAccept: */*\r\n\r\n",
        )
        .unwrap();
        let out = String::from_utf8(req.to_origin_form("/x")).unwrap();
        assert_eq!(out, "GET /x HTTP/1.1\r\nHost: h\r\nAccept: */*\r\n\r\n");
    }

    #[test]
    fn basic_auth_encoding() {
        let creds = Credentials::new("user", "pass");
        assert_eq!(basic_auth(&creds), "Basic dXNlcjpwYXNz");
    }

    #[tokio::test]
    async fn read_head_returns_trailing_bytes() {
        let (mut a, mut b) = duplex(256);
        a.write_all(b"HTTP/1.1 200 OK\r\n\r\nearly").await.unwrap();
        let (head, rest) = read_head(&mut b, 1024).await.unwrap();
        assert_eq!(&head[..], b"HTTP/1.1 200 OK\r\n\r\n");
        assert_eq!(&rest[..], b"early");
    }

    #[tokio::test]
    async fn read_head_handles_split_terminator() {
        let (mut a, mut b) = duplex(256);
        let reader = tokio::spawn(async move { read_head(&mut b, 1024).await });
        a.write_all(b"GET / HTTP/1.1\r\n\r").await.unwrap();
        tokio::task::yield_now().await;
        a.write_all(b"\n").await.unwrap();
        let (head, rest) = reader.await.unwrap().unwrap();
        assert_eq!(&head[..], b"GET / HTTP/1.1\r\n\r\n");
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn read_head_enforces_limit_and_eof() {
        let (mut a, mut b) = duplex(256);
        a.write_all(&[b'x'; 64]).await.unwrap();
        assert!(matches!(
            read_head(&mut b, 32).await,
            Err(HttpError::HeadTooLarge(32))
        ));

        let (a, mut b) = duplex(256);
        drop(a);
        assert!(matches!(
            read_head(&mut b, 32).await,
            Err(HttpError::UnexpectedEof)
        ));
    }

    #[test]
    fn body_length_from_headers() {
        let len = |raw: &[u8]| RequestHead::parse(raw).unwrap().body_length();
        assert_eq!(len(b"GET / HTTP/1.1\r\n\r\n").unwrap(), BodyLength::Empty);
        assert_eq!(
            len(b"POST / HTTP/1.1\r\nContent-Length: 12\r\n\r\n").unwrap(),
            BodyLength::Fixed(12)
        );
        assert_eq!(
            len(b"POST / HTTP/1.1\r\nContent-Length: 3\r\nTransfer-Encoding: gzip, chunked\r\n\r\n")
                .unwrap(),
            BodyLength::Chunked
        );
        assert!(len(b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n").is_err());
        assert!(len(b"POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n").is_err());
    }

    #[tokio::test]
    async fn message_reader_keeps_bytes_between_requests() {
        let (mut a, b) = duplex(1024);
        a.write_all(
            b"POST /one HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET /two HTTP/1.1\r\n\r\n",
        )
        .await
        .unwrap();
        drop(a);

        let mut reader = MessageReader::new(b);
        let head = reader.next_head(1024).await.unwrap().unwrap();
        let req = RequestHead::parse(&head).unwrap();
        let mut body = Vec::new();
        reader.copy_body(req.body_length().unwrap(), &mut body).await.unwrap();
        assert_eq!(body, b"hello");

        let head = reader.next_head(1024).await.unwrap().unwrap();
        assert_eq!(RequestHead::parse(&head).unwrap().target, "/two");
        assert!(reader.next_head(1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn message_reader_copies_chunked_body_verbatim() {
        let chunked = b"4;ext=1\r\nWiki\r\n5\r\npedia\r\n0\r\nX-Trailer: y\r\n\r\n";
        let (mut a, b) = duplex(1024);
        a.write_all(chunked).await.unwrap();
        a.write_all(b"NEXT").await.unwrap();
        drop(a);

        let mut reader = MessageReader::new(b);
        let mut body = Vec::new();
        reader.copy_body(BodyLength::Chunked, &mut body).await.unwrap();
        assert_eq!(body, chunked);
        let (_, rest) = reader.into_parts();
        assert_eq!(&rest[..], b"NEXT");
    }

    #[tokio::test]
    async fn message_reader_reports_truncated_head() {
        let (mut a, b) = duplex(256);
        a.write_all(b"GET / HTTP/1.1\r\nHost").await.unwrap();
        drop(a);
        let mut reader = MessageReader::new(b);
        assert!(matches!(
            reader.next_head(1024).await,
            Err(HttpError::UnexpectedEof)
        ));
    }

    #[tokio::test]
    async fn client_connect_sends_credentials() {
        let (mut client, mut proxy) = duplex(1024);
        let proxy_side = tokio::spawn(async move {
            let (head, _) = read_head(&mut proxy, 1024).await.unwrap();
            proxy.write_all(CONNECT_ESTABLISHED).await.unwrap();
            RequestHead::parse(&head).unwrap()
        });

        let target = TargetAddr::parse("db.internal:5432").unwrap();
        let creds = Credentials::new("user", "pass");
        let rest = connect(&mut client, &target, Some(&creds), 1024)
            .await
            .unwrap();
        assert!(rest.is_empty());

        let req = proxy_side.await.unwrap();
        assert!(req.is_connect());
        assert_eq!(req.target, "db.internal:5432");
        assert_eq!(req.header("Proxy-Authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[tokio::test]
    async fn client_connect_surfaces_rejection() {
        let (mut client, mut proxy) = duplex(1024);
        tokio::spawn(async move {
            let _ = read_head(&mut proxy, 1024).await;
            proxy
                .write_all(&status_response(407, "Proxy Authentication Required"))
                .await
                .unwrap();
        });

        let target = TargetAddr::parse("db.internal:5432").unwrap();
        let err = connect(&mut client, &target, None, 1024).await.unwrap_err();
        assert!(matches!(err, HttpError::Rejected { status: 407, .. }));
    }
}
