//! SOCKS5 (RFC 1928) with username/password auth (RFC 1929).
//!
//! Server side: [`negotiate`], [`read_request`], [`send_reply`].
//! Client side: [`connect`].

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::Credentials;
use crate::addr::{MAX_DOMAIN_LEN, TargetAddr};
use crate::error::Socks5Error;

pub const SOCKS5_VERSION: u8 = 0x05;
const AUTH_VERSION: u8 = 0x01;

pub const METHOD_NO_AUTH: u8 = 0x00;
pub const METHOD_USER_PASS: u8 = 0x02;
pub const METHOD_NO_ACCEPTABLE: u8 = 0xFF;

pub const CMD_CONNECT: u8 = 0x01;
pub const CMD_BIND: u8 = 0x02;
pub const CMD_UDP_ASSOCIATE: u8 = 0x03;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;

pub const REPLY_SUCCEEDED: u8 = 0x00;
pub const REPLY_GENERAL_FAILURE: u8 = 0x01;
pub const REPLY_CONNECTION_NOT_ALLOWED: u8 = 0x02;
pub const REPLY_NETWORK_UNREACHABLE: u8 = 0x03;
pub const REPLY_HOST_UNREACHABLE: u8 = 0x04;
pub const REPLY_CONNECTION_REFUSED: u8 = 0x05;
pub const REPLY_TTL_EXPIRED: u8 = 0x06;
pub const REPLY_COMMAND_NOT_SUPPORTED: u8 = 0x07;
pub const REPLY_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

/// Parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Request {
    pub command: u8,
    pub target: TargetAddr,
}

// ── Address encoding ──

/// Append `ATYP | ADDR | PORT` for `target`.
pub fn encode_addr(buf: &mut Vec<u8>, target: &TargetAddr) -> Result<(), Socks5Error> {
    match target {
        TargetAddr::Ip(SocketAddr::V4(v4)) => {
            buf.push(ATYP_IPV4);
            buf.extend_from_slice(&v4.ip().octets());
        }
        TargetAddr::Ip(SocketAddr::V6(v6)) => {
            buf.push(ATYP_IPV6);
            buf.extend_from_slice(&v6.ip().octets());
        }
        TargetAddr::Domain(host, _) => {
            if host.len() > MAX_DOMAIN_LEN {
                return Err(crate::AddrError::DomainTooLong.into());
            }
            buf.push(ATYP_DOMAIN);
            buf.push(host.len() as u8);
            buf.extend_from_slice(host.as_bytes());
        }
    }
    buf.extend_from_slice(&target.port().to_be_bytes());
    Ok(())
}

/// Read `ADDR | PORT` for an already consumed `atyp`.
pub async fn read_addr<S>(stream: &mut S, atyp: u8) -> Result<TargetAddr, Socks5Error>
where
    S: AsyncRead + Unpin,
{
    match atyp {
        ATYP_IPV4 => {
            let mut buf = [0u8; 6];
            stream.read_exact(&mut buf).await?;
            let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
            let port = u16::from_be_bytes([buf[4], buf[5]]);
            Ok(TargetAddr::Ip(SocketAddr::from((ip, port))))
        }
        ATYP_IPV6 => {
            let mut buf = [0u8; 18];
            stream.read_exact(&mut buf).await?;
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&buf[..16]);
            let port = u16::from_be_bytes([buf[16], buf[17]]);
            Ok(TargetAddr::Ip(SocketAddr::from((Ipv6Addr::from(octets), port))))
        }
        ATYP_DOMAIN => {
            let len = stream.read_u8().await? as usize;
            let mut buf = vec![0u8; len + 2];
            stream.read_exact(&mut buf).await?;
            let port = u16::from_be_bytes([buf[len], buf[len + 1]]);
            buf.truncate(len);
            let host = String::from_utf8(buf)
                .map_err(|_| Socks5Error::UnsupportedAddressType(atyp))?;
            Ok(TargetAddr::Domain(host, port))
        }
        other => Err(Socks5Error::UnsupportedAddressType(other)),
    }
}

// ── Server side ──

/// Method negotiation. With `required` set, only username/password is
/// accepted and checked against it; otherwise NO AUTH is selected.
pub async fn negotiate<S>(stream: &mut S, required: Option<&Credentials>) -> Result<(), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;
    if header[0] != SOCKS5_VERSION {
        return Err(Socks5Error::InvalidVersion(header[0]));
    }
    let mut methods = vec![0u8; header[1] as usize];
    stream.read_exact(&mut methods).await?;

    let wanted = if required.is_some() {
        METHOD_USER_PASS
    } else {
        METHOD_NO_AUTH
    };
    if !methods.contains(&wanted) {
        // Best effort: the client is about to be dropped either way.
        let _ = stream
            .write_all(&[SOCKS5_VERSION, METHOD_NO_ACCEPTABLE])
            .await;
        return Err(Socks5Error::NoAcceptableMethods);
    }
    stream.write_all(&[SOCKS5_VERSION, wanted]).await?;

    let Some(expected) = required else {
        return Ok(());
    };

    let version = stream.read_u8().await?;
    if version != AUTH_VERSION {
        return Err(Socks5Error::InvalidVersion(version));
    }
    let username = read_short_field(stream).await?;
    let password = read_short_field(stream).await?;
    let ok = username == expected.username.as_bytes() && password == expected.password.as_bytes();
    stream
        .write_all(&[AUTH_VERSION, if ok { 0x00 } else { 0x01 }])
        .await?;
    if ok { Ok(()) } else { Err(Socks5Error::AuthFailed) }
}

async fn read_short_field<S>(stream: &mut S) -> Result<Vec<u8>, Socks5Error>
where
    S: AsyncRead + Unpin,
{
    let len = stream.read_u8().await? as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Read `VER CMD RSV ATYP ADDR PORT`.
pub async fn read_request<S>(stream: &mut S) -> Result<Socks5Request, Socks5Error>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    if header[0] != SOCKS5_VERSION {
        return Err(Socks5Error::InvalidVersion(header[0]));
    }
    let target = read_addr(stream, header[3]).await?;
    Ok(Socks5Request {
        command: header[1],
        target,
    })
}

/// Send a reply; `bind` defaults to `0.0.0.0:0`.
pub async fn send_reply<S>(
    stream: &mut S,
    reply: u8,
    bind: Option<SocketAddr>,
) -> Result<(), Socks5Error>
where
    S: AsyncWrite + Unpin,
{
    let bind = bind.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
    let mut buf = Vec::with_capacity(22);
    buf.extend_from_slice(&[SOCKS5_VERSION, reply, 0x00]);
    encode_addr(&mut buf, &TargetAddr::Ip(bind))?;
    stream.write_all(&buf).await?;
    Ok(())
}

// ── Client side ──

/// Ask the SOCKS5 server on `stream` to CONNECT to `target`.
///
/// Offers username/password only when `credentials` is set. Returns the
/// bound address reported by the server.
pub async fn connect<S>(
    stream: &mut S,
    target: &TargetAddr,
    credentials: Option<&Credentials>,
) -> Result<TargetAddr, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let greeting: &[u8] = if credentials.is_some() {
        &[SOCKS5_VERSION, 2, METHOD_NO_AUTH, METHOD_USER_PASS]
    } else {
        &[SOCKS5_VERSION, 1, METHOD_NO_AUTH]
    };
    stream.write_all(greeting).await?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice[0] != SOCKS5_VERSION {
        return Err(Socks5Error::InvalidVersion(choice[0]));
    }
    match (choice[1], credentials) {
        (METHOD_NO_AUTH, _) => {}
        (METHOD_USER_PASS, Some(creds)) => authenticate(stream, creds).await?,
        _ => return Err(Socks5Error::NoAcceptableMethods),
    }

    let mut request = Vec::with_capacity(8 + MAX_DOMAIN_LEN);
    request.extend_from_slice(&[SOCKS5_VERSION, CMD_CONNECT, 0x00]);
    encode_addr(&mut request, target)?;
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    if reply[0] != SOCKS5_VERSION {
        return Err(Socks5Error::InvalidVersion(reply[0]));
    }
    if reply[1] != REPLY_SUCCEEDED {
        return Err(Socks5Error::Rejected(reply[1]));
    }
    read_addr(stream, reply[3]).await
}

async fn authenticate<S>(stream: &mut S, creds: &Credentials) -> Result<(), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let user = creds.username.as_bytes();
    let pass = creds.password.as_bytes();
    if user.len() > 255 || pass.len() > 255 {
        return Err(Socks5Error::AuthFailed);
    }
    let mut buf = Vec::with_capacity(3 + user.len() + pass.len());
    buf.push(AUTH_VERSION);
    buf.push(user.len() as u8);
    buf.extend_from_slice(user);
    buf.push(pass.len() as u8);
    buf.extend_from_slice(pass);
    stream.write_all(&buf).await?;

    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await?;
    if status[1] != 0x00 {
        return Err(Socks5Error::AuthFailed);
    }
    Ok(())
}
