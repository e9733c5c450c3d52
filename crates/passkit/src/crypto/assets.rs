//! Signing certificate, private key, and intermediate certificate loading

use crate::{Error, Result};
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::path::Path;

/// Shared intermediate certificate file inside the key directory.
pub const WWDR_CERT_FILE: &str = "wwdr.pem";

/// Reverse-domain prefix stripped from the pass type identifier to name its key file.
pub const PASS_TYPE_PREFIX: &str = "pass.";

/// Key file name for a pass type: `pass.com.acme.demo` signs with `com.acme.demo.pem`.
pub fn key_file_name(pass_type_identifier: &str) -> String {
    let identifier = pass_type_identifier
        .strip_prefix(PASS_TYPE_PREFIX)
        .unwrap_or(pass_type_identifier);
    format!("{}.pem", identifier)
}

/// Signing assets: pass type certificate, its private key, and the intermediate chain
pub struct SigningAssets {
    /// Pass type certificate
    pub certificate: X509,
    /// Private key matching `certificate`
    pub private_key: PKey<Private>,
    /// Intermediate certificates included in the signature
    pub cert_chain: Vec<X509>,
}

impl SigningAssets {
    /// Load the assets for a pass type from a key directory.
    ///
    /// Reads `<identifier>.pem` (certificate and private key) and `wwdr.pem`
    /// from `key_dir`.
    pub fn from_key_dir(
        key_dir: impl AsRef<Path>,
        pass_type_identifier: &str,
        password: Option<&SecretString>,
    ) -> Result<Self> {
        let key_dir = key_dir.as_ref();
        let signer_path = key_dir.join(key_file_name(pass_type_identifier));
        let wwdr_path = key_dir.join(WWDR_CERT_FILE);

        let signer_pem = read(&signer_path)?;
        let wwdr_pem = read(&wwdr_path)?;

        Self::from_pem(&signer_pem, &wwdr_pem, password)
    }

    /// Load from PEM data.
    ///
    /// `signer_pem` holds the certificate and the (optionally encrypted)
    /// private key; `wwdr_pem` holds one or more intermediate certificates.
    /// The password, if provided, stays inside `SecretString` until the key is
    /// decrypted. Without a password an empty passphrase is used, which
    /// unlocks unencrypted keys only.
    pub fn from_pem(
        signer_pem: &[u8],
        wwdr_pem: &[u8],
        password: Option<&SecretString>,
    ) -> Result<Self> {
        let certificate = X509::from_pem(signer_pem)
            .map_err(|e| Error::Signing(format!("Failed to load certificate: {}", e)))?;

        let passphrase = password.map(|p| p.expose_secret().as_bytes()).unwrap_or(b"");
        let private_key = PKey::private_key_from_pem_passphrase(signer_pem, passphrase)
            .map_err(|e| Error::Signing(format!("Failed to load private key: {}", e)))?;

        Self::validate_key_pair(&certificate, &private_key)?;

        let cert_chain = X509::stack_from_pem(wwdr_pem).map_err(|e| {
            Error::Signing(format!("Failed to load intermediate certificate: {}", e))
        })?;
        if cert_chain.is_empty() {
            return Err(Error::Signing(format!(
                "No certificate in {}",
                WWDR_CERT_FILE
            )));
        }

        Ok(Self {
            certificate,
            private_key,
            cert_chain,
        })
    }

    /// Validate that the private key matches the certificate's public key
    fn validate_key_pair(cert: &X509, private_key: &PKey<Private>) -> Result<()> {
        let cert_public_key = cert.public_key().map_err(|e| {
            Error::Signing(format!(
                "Failed to extract public key from certificate: {}",
                e
            ))
        })?;

        if !private_key.public_eq(&cert_public_key) {
            return Err(Error::Signing(
                "Private key does not match certificate public key".into(),
            ));
        }

        Ok(())
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::Signing(format!("Failed to read {}: {}", path.display(), e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::symm::Cipher;
    use openssl::x509::{X509Builder, X509NameBuilder};
    use tempfile::TempDir;

    /// Helper to generate a test EC key pair
    pub(crate) fn generate_test_ec_key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let ec_key = EcKey::generate(&group).unwrap();
        PKey::from_ec_key(ec_key).unwrap()
    }

    /// Helper to generate a self-signed certificate for a given private key
    pub(crate) fn generate_test_cert(private_key: &PKey<Private>, common_name: &str) -> X509 {
        let mut name_builder = X509NameBuilder::new().unwrap();
        name_builder.append_entry_by_text("CN", common_name).unwrap();
        let name = name_builder.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();

        let serial = BigNum::from_u32(1).unwrap();
        builder.set_serial_number(&serial.to_asn1_integer().unwrap()).unwrap();

        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(private_key).unwrap();

        let not_before = Asn1Time::days_from_now(0).unwrap();
        let not_after = Asn1Time::days_from_now(365).unwrap();
        builder.set_not_before(&not_before).unwrap();
        builder.set_not_after(&not_after).unwrap();

        builder.sign(private_key, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    /// Writes `<identifier>.pem` and `wwdr.pem` into `dir`, key encrypted with `password`.
    pub(crate) fn write_key_dir(dir: &Path, pass_type_identifier: &str, password: &str) {
        let key = generate_test_ec_key();
        let cert = generate_test_cert(&key, "Pass Type ID: test");
        let wwdr_key = generate_test_ec_key();
        let wwdr = generate_test_cert(&wwdr_key, "Test WWDR");

        let mut signer_pem = cert.to_pem().unwrap();
        signer_pem.extend(
            key.private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), password.as_bytes())
                .unwrap(),
        );
        fs::write(dir.join(key_file_name(pass_type_identifier)), signer_pem).unwrap();
        fs::write(dir.join(WWDR_CERT_FILE), wwdr.to_pem().unwrap()).unwrap();
    }

    #[test]
    fn test_key_file_name_strips_prefix() {
        assert_eq!(key_file_name("pass.com.acme.demo"), "com.acme.demo.pem");
        assert_eq!(key_file_name("com.acme.demo"), "com.acme.demo.pem");
        assert_eq!(key_file_name("passport.demo"), "passport.demo.pem");
    }

    #[test]
    fn test_from_key_dir_with_password() {
        let temp_dir = TempDir::new().unwrap();
        write_key_dir(temp_dir.path(), "pass.com.acme.demo", "secret");

        let password = SecretString::new("secret".into());
        let assets =
            SigningAssets::from_key_dir(temp_dir.path(), "pass.com.acme.demo", Some(&password))
                .unwrap();
        assert_eq!(assets.cert_chain.len(), 1);
    }

    #[test]
    fn test_from_key_dir_wrong_password() {
        let temp_dir = TempDir::new().unwrap();
        write_key_dir(temp_dir.path(), "pass.com.acme.demo", "secret");

        let password = SecretString::new("wrong".into());
        let result =
            SigningAssets::from_key_dir(temp_dir.path(), "pass.com.acme.demo", Some(&password));
        match result {
            Err(Error::Signing(msg)) => assert!(msg.contains("private key"), "{}", msg),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("wrong password accepted"),
        }
    }

    #[test]
    fn test_from_key_dir_missing_key_file() {
        let temp_dir = TempDir::new().unwrap();
        write_key_dir(temp_dir.path(), "pass.com.acme.demo", "secret");

        let result = SigningAssets::from_key_dir(temp_dir.path(), "pass.com.acme.other", None);
        match result {
            Err(Error::Signing(msg)) => assert!(msg.contains("com.acme.other.pem"), "{}", msg),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("missing key file accepted"),
        }
    }

    #[test]
    fn test_from_pem_malformed_certificate() {
        let result = SigningAssets::from_pem(b"not a cert", b"not a cert", None);
        assert!(matches!(result, Err(Error::Signing(_))));
    }

    #[test]
    fn test_from_pem_empty_chain() {
        let key = generate_test_ec_key();
        let cert = generate_test_cert(&key, "test");
        let mut signer_pem = cert.to_pem().unwrap();
        signer_pem.extend(key.private_key_to_pem_pkcs8().unwrap());

        let result = SigningAssets::from_pem(&signer_pem, b"", None);
        assert!(matches!(result, Err(Error::Signing(_))));
    }

    #[test]
    fn test_validate_key_pair_matching() {
        let private_key = generate_test_ec_key();
        let certificate = generate_test_cert(&private_key, "test");

        let result = SigningAssets::validate_key_pair(&certificate, &private_key);
        assert!(result.is_ok(), "Matching key pair should validate successfully");
    }

    #[test]
    fn test_validate_key_pair_mismatched() {
        let key1 = generate_test_ec_key();
        let key2 = generate_test_ec_key();
        let certificate = generate_test_cert(&key1, "test");

        let result = SigningAssets::validate_key_pair(&certificate, &key2);
        assert!(result.is_err(), "Mismatched key pair should fail validation");

        let err_msg = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(
            err_msg.contains("does not match"),
            "Error message should indicate key mismatch: {}",
            err_msg
        );
    }
}
