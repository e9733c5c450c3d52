//! Detached CMS signing of the manifest
//!
//! Uses OpenSSL's CMS API to build a binary signed-data structure with the
//! content left out. The DER encoding is written to the package as-is.

use crate::crypto::SigningAssets;
use crate::{Error, Result};
use openssl::cms::{CMSOptions, CmsContentInfo};
use openssl::stack::Stack;
use openssl::x509::X509;

/// Generate a detached CMS signature over `data`
///
/// The signer certificate and every certificate of the intermediate chain
/// are embedded in the signed-data structure. Content is signed in binary
/// mode, so the exact bytes of `data` are what a verifier must present.
///
/// # Arguments
///
/// * `data` - The manifest bytes to sign
/// * `assets` - Certificate, private key and intermediate chain
pub fn sign_detached(data: &[u8], assets: &SigningAssets) -> Result<Vec<u8>> {
    let mut chain = Stack::<X509>::new().map_err(signing_error)?;
    for cert in &assets.cert_chain {
        chain.push(cert.clone()).map_err(signing_error)?;
    }

    let cms = CmsContentInfo::sign(
        Some(&*assets.certificate),
        Some(&*assets.private_key),
        Some(&*chain),
        Some(data),
        CMSOptions::BINARY | CMSOptions::DETACHED,
    )
    .map_err(|e| Error::Signing(format!("Failed to build CMS signature: {}", e)))?;

    cms.to_der()
        .map_err(|e| Error::Signing(format!("Failed to encode CMS signature: {}", e)))
}

fn signing_error(e: openssl::error::ErrorStack) -> Error {
    Error::Signing(e.to_string())
}
