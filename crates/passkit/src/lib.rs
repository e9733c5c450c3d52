pub mod archive;
pub mod config;
pub mod crypto;
pub mod error;
pub mod images;
pub mod manifest;
pub mod pass;
pub mod validate;

pub use archive::{ArchiveOptions, CompressionLevel};
pub use config::TemplateDefinition;
pub use crypto::{KeyStore, ManifestSigner};
pub use error::{Error, ValidationError};
pub use images::{ImageKey, ImageRole, ImageSet, ImageSource, Resolution};
pub use manifest::{DigestAlgorithm, Manifest};
pub use pass::fields::FieldMap;
pub use pass::{GenerationStage, Pass, PassStyle, Template};

pub type Result<T> = std::result::Result<T, Error>;
