use std::{path::Path, time::Duration};

use rustls::{ClientConfig, RootCertStore};
use webpki_roots::TLS_SERVER_ROOTS;

use crate::http::{client::http_client_version::HttpClientVersion, crypto::Crypto};

pub struct HttpClientConfig {
    pub http_version: HttpClientVersion,
    pub tls_config: ClientConfig,
    pub connect_timeout: Duration,
}

impl HttpClientConfig {
    /// Creates a new instance with a default set of trusted root CAs.
    ///
    /// By default, the client trusts the system native root certs in addition to Mozilla root certificates provided by the
    /// [`webpki_roots`](https://docs.rs/webpki-roots) crate. Connecting gives up after two seconds.
    pub fn new() -> Self {
        let mut root_cert_store = RootCertStore::empty();
        root_cert_store.extend(TLS_SERVER_ROOTS.iter().cloned());
        let native_certs = rustls_native_certs::load_native_certs();
        for cert in native_certs.certs {
            if let Err(error) = root_cert_store.add(cert) {
                tracing::warn!("failed to add native cert: {:?}", error);
            }
        }
        for error in native_certs.errors {
            tracing::warn!("failed to load native cert: {:?}", error);
        }

        HttpClientConfig {
            http_version: HttpClientVersion::default(),
            tls_config: Self::tls_config(root_cert_store),
            connect_timeout: Duration::from_secs(2),
        }
    }

    pub fn http_version(mut self, version: HttpClientVersion) -> Self {
        self.http_version = version;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Trusts only the certificates in the given PEM file, replacing the default roots.
    pub fn root_ca(mut self, root_ca_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut root_cert_store = RootCertStore::empty();
        for cert in Crypto::pem_load_certs(root_ca_path)? {
            root_cert_store.add(cert)?;
        }
        self.tls_config = Self::tls_config(root_cert_store);
        Ok(self)
    }

    fn tls_config(root_cert_store: RootCertStore) -> ClientConfig {
        Crypto::install_crypto_provider();
        ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth()
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        HttpClientConfig::new()
    }
}
