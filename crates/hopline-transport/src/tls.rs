//! TLS client setup for the `wss` and `mwss` dialers.
//!
//! Certificates are verified against the bundled webpki roots unless the
//! node opts out with `insecure`, which is meant for self-signed edges.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::TlsConnector;

use crate::error::TransportError;

/// Build a connector, skipping certificate checks when `insecure`.
pub fn client_connector(insecure: bool) -> TlsConnector {
    let config = if insecure {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };
    TlsConnector::from(Arc::new(config))
}

/// Server name for the TLS handshake, from a host override or the node address.
pub fn server_name(host: &str) -> Result<ServerName<'static>, TransportError> {
    ServerName::try_from(host.to_string())
        .map_err(|e| TransportError::Config(format!("invalid TLS server name {host:?}: {e}")))
}

/// Host part of `host:port`, without IPv6 brackets.
pub fn extract_host(addr: &str) -> String {
    if let Some(stripped) = addr.strip_prefix('[')
        && let Some(end) = stripped.find(']')
    {
        return stripped[..end].to_string();
    }
    if addr.chars().filter(|&c| c == ':').count() == 1 {
        return addr
            .rsplit_once(':')
            .map(|(h, _)| h.to_string())
            .unwrap_or_else(|| addr.to_string());
    }
    addr.to_string()
}

/// Accepts any server certificate.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_host_handles_ipv6_and_plain() {
        assert_eq!(extract_host("[::1]:443"), "::1");
        assert_eq!(extract_host("edge.example.com:443"), "edge.example.com");
        assert_eq!(extract_host("edge.example.com"), "edge.example.com");
    }

    #[test]
    fn server_name_accepts_dns_and_ip() {
        server_name("edge.example.com").unwrap();
        server_name("127.0.0.1").unwrap();
        server_name("::1").unwrap();
    }

    #[test]
    fn server_name_rejects_garbage() {
        assert!(matches!(
            server_name("bad host!"),
            Err(TransportError::Config(_))
        ));
    }
}
