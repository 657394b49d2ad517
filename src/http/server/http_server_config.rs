use std::path::Path;

use rustls::ServerConfig;

use crate::http::crypto::Crypto;

/// Largest request body read by default, 8 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

pub struct HttpServerConfig {
    pub ip: String,
    pub port: u16,
    pub max_body_size: usize,
    pub tls_config: Option<ServerConfig>,
}

impl HttpServerConfig {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        HttpServerConfig {
            ip: ip.into(),
            port,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            tls_config: None,
        }
    }

    /// Bodies larger than `bytes` are answered with 413 before any route runs.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Serves HTTPS with a PEM certificate chain and private key.
    ///
    /// ALPN offers `h2` first, then `http/1.1`.
    pub fn tls(mut self, cert_chain_path: impl AsRef<Path>, private_key_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Crypto::install_crypto_provider();
        let cert_chain = Crypto::pem_load_certs(cert_chain_path)?;
        if cert_chain.is_empty() {
            anyhow::bail!("no certificate found in PEM file");
        }
        let private_key = Crypto::pem_load_private_key(private_key_path)?;

        let mut tls_config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(cert_chain, private_key)?;
        tls_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        self.tls_config = Some(tls_config);
        Ok(self)
    }

    pub fn host(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}
