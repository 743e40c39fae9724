//! TLS client setup for HTTPS probes.

use std::sync::Arc;

use tokio_rustls::TlsConnector;

/// Build a connector that trusts the Mozilla root certificate store.
pub fn connector_with_webpki_roots() -> Result<TlsConnector, rustls::Error> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(
        rustls::crypto::ring::default_provider().into(),
    )
    .with_safe_default_protocol_versions()?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}
