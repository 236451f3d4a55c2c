//! TLS client configuration and handshake reporting.

use std::sync::Arc;

use rustls::client::ClientConnection;
use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, ProtocolVersion, RootCertStore};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::observability::trace::{CertificateSummary, TlsHandshakeInfo};

/// ALPN ids offered to servers, most preferred first.
pub const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

/// Build the client TLS configuration: webpki roots, ring provider, ALPN.
pub fn client_config() -> Result<Arc<ClientConfig>, rustls::Error> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    client_config_with_roots(roots)
}

/// Same as [`client_config`], trusting only `roots`.
pub fn client_config_with_roots(roots: RootCertStore) -> Result<Arc<ClientConfig>, rustls::Error> {
    let mut config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
    config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();
    Ok(Arc::new(config))
}

/// Summarize the negotiated session of a finished handshake.
pub fn handshake_info(conn: &ClientConnection) -> TlsHandshakeInfo {
    let version = conn
        .protocol_version()
        .map(version_name)
        .unwrap_or_else(|| "unknown".to_string());
    let cipher_suite = conn
        .negotiated_cipher_suite()
        .map(|suite| format!("{:?}", suite.suite()))
        .unwrap_or_else(|| "unknown".to_string());
    let certificate = conn
        .peer_certificates()
        .and_then(|certs| certs.first())
        .and_then(summarize_certificate);
    let alpn = conn
        .alpn_protocol()
        .map(|p| String::from_utf8_lossy(p).into_owned());

    TlsHandshakeInfo {
        version,
        cipher_suite,
        certificate,
        complete: !conn.is_handshaking(),
        alpn,
    }
}

fn version_name(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_0 => "TLS 1.0".to_string(),
        ProtocolVersion::TLSv1_1 => "TLS 1.1".to_string(),
        ProtocolVersion::TLSv1_2 => "TLS 1.2".to_string(),
        ProtocolVersion::TLSv1_3 => "TLS 1.3".to_string(),
        other => format!("{:?}", other),
    }
}

/// Subject, issuer and validity window of a DER certificate.
pub fn summarize_certificate(der: &CertificateDer<'_>) -> Option<CertificateSummary> {
    match X509Certificate::from_der(der.as_ref()) {
        Ok((_, cert)) => {
            let validity = cert.validity();
            Some(CertificateSummary {
                subject: cert.subject().to_string(),
                issuer: cert.issuer().to_string(),
                not_before: validity.not_before.to_string(),
                not_after: validity.not_after.to_string(),
            })
        }
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse peer certificate");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_offers_h2_first() {
        let config = client_config().unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[test]
    fn version_names() {
        assert_eq!(version_name(ProtocolVersion::TLSv1_3), "TLS 1.3");
        assert_eq!(version_name(ProtocolVersion::TLSv1_2), "TLS 1.2");
    }

    #[test]
    fn garbage_certificate_is_skipped() {
        let der = CertificateDer::from(vec![0x30, 0x03, 0x01, 0x01, 0xff]);
        assert!(summarize_certificate(&der).is_none());
    }
}
