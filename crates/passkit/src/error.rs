//! Error types for pass generation.
//!
//! This module defines the [`enum@Error`] enum covering every way a pass
//! generation can fail. Each stage of the pipeline reports exactly one
//! variant and stops, so callers always see the first failure encountered.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use thiserror::Error;

/// Boxed error produced by a deferred image source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for pass operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// Match on variants to handle specific failure cases.
///
/// # Examples
///
/// ```no_run
/// use passkit::{Error, FieldMap, PassStyle, Template, ValidationError};
///
/// # async fn run() {
/// let template = Template::new(PassStyle::Generic, FieldMap::new());
/// let pass = template.create_pass(FieldMap::new());
/// match pass.generate().await {
///     Ok(bytes) => println!("{} bytes", bytes.len()),
///     Err(Error::Validation(ValidationError::MissingField(name))) => eprintln!("fill in {name}"),
///     Err(Error::Signing(msg)) => eprintln!("signing failed: {msg}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// A required field or image is missing.
    ///
    /// Raised before any image is read, so no I/O has happened when
    /// this is returned.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An image source could not be turned into bytes.
    ///
    /// Covers unreadable files, failing deferred producers, and image
    /// values of an unsupported shape. `key` names the image slot
    /// (`icon`, `logo2x`, ...).
    #[error("Cannot load image {key}: {source}")]
    ImageResolution {
        key: String,
        #[source]
        source: BoxError,
    },

    /// Producing the detached signature failed.
    ///
    /// Carries the diagnostic text of the cryptographic library verbatim:
    /// missing key file, wrong password, malformed certificate.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Writing or finalizing the zip container failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// The requested pass style is not one of the supported styles.
    #[error("Unsupported pass style {0}")]
    UnsupportedStyle(String),

    /// Invalid template definition or option value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed outside of image resolution.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn image(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::ImageResolution {
            key: key.into(),
            source: source.into(),
        }
    }
}

/// A mandatory piece of the pass is absent.
///
/// Reported with the specific field or image name, one at a time, in the
/// order the validator checks them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required top-level field is absent, `null`, or empty.
    #[error("Missing field {0}")]
    MissingField(&'static str),

    /// A required image has no base-resolution source.
    #[error("Missing image {0}.png")]
    MissingImage(&'static str),

    /// A field that must be a string holds another JSON type.
    #[error("Field {0} must be a string")]
    NotAString(&'static str),
}
