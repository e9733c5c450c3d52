//! Manifest signing.
//!
//! [`ManifestSigner`] is the seam between the generation pipeline and the
//! cryptography. [`KeyStore`] is the stock implementation: it loads the
//! signing material for a pass type from a key directory and produces a
//! detached CMS signature with OpenSSL.

pub mod assets;
pub mod cms;

pub use assets::SigningAssets;

use crate::Result;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key directory used when a template does not name one.
pub const DEFAULT_KEY_DIR: &str = "keys";

/// Produces the detached signature over a serialized manifest.
///
/// Implementations run on a blocking thread and may do file I/O.
pub trait ManifestSigner: Send + Sync {
    /// Signs `manifest` with the identity registered for `pass_type_identifier`.
    fn sign(&self, manifest: &[u8], pass_type_identifier: &str) -> Result<Vec<u8>>;
}

impl<T: ManifestSigner + ?Sized> ManifestSigner for Arc<T> {
    fn sign(&self, manifest: &[u8], pass_type_identifier: &str) -> Result<Vec<u8>> {
        (**self).sign(manifest, pass_type_identifier)
    }
}

/// Key directory plus the password of the private keys inside it.
///
/// The directory holds one `<identifier>.pem` per pass type (certificate and
/// private key, identifier without the `pass.` prefix) and a shared
/// `wwdr.pem` intermediate certificate.
#[derive(Clone, Debug)]
pub struct KeyStore {
    path: PathBuf,
    password: Option<SecretString>,
}

impl KeyStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            password: None,
        }
    }

    /// Set the private key password.
    ///
    /// The password is stored securely and will be zeroized when dropped.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::new(password.into()));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_DIR)
    }
}

impl ManifestSigner for KeyStore {
    fn sign(&self, manifest: &[u8], pass_type_identifier: &str) -> Result<Vec<u8>> {
        let assets =
            SigningAssets::from_key_dir(&self.path, pass_type_identifier, self.password.as_ref())?;
        tracing::debug!(
            key_dir = %self.path.display(),
            chain = assets.cert_chain.len(),
            "loaded signing assets"
        );
        cms::sign_detached(manifest, &assets)
    }
}
