use std::path::Path;

use rustls_pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject};

pub struct Crypto;

impl Crypto {
    /// Installs ring as the process-wide rustls provider. Later calls are no-ops.
    pub fn install_crypto_provider() {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            tracing::trace!("crypto provider already installed");
        }
    }

    pub fn pem_load_certs<T: AsRef<Path>>(file_name: T) -> anyhow::Result<Vec<CertificateDer<'static>>> {
        let certs = CertificateDer::pem_file_iter(file_name)?.collect::<Result<Vec<_>, _>>()?;
        Ok(certs)
    }

    pub fn pem_load_private_key<T: AsRef<Path>>(file_name: T) -> anyhow::Result<PrivateKeyDer<'static>> {
        Ok(PrivateKeyDer::from_pem_file(file_name)?)
    }
}
