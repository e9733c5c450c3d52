//! Template definition files.
//!
//! A template can be described by a JSON document instead of code:
//!
//! ```json
//! {
//!   "style": "coupon",
//!   "fields": { "organizationName": "Acme", "passTypeIdentifier": "pass.com.acme.demo" },
//!   "keys": { "path": "keys", "password": "secret" },
//!   "images": { "logo": "images/logo.png", "logo2x": "images/logo@2x.png" }
//! }
//! ```
//!
//! Relative paths (key directory and images) are resolved against the
//! directory of the definition file.

use crate::crypto::DEFAULT_KEY_DIR;
use crate::images::{ImageKey, ImageSource};
use crate::pass::fields::FieldMap;
use crate::pass::{PassStyle, Template};
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key directory section of a template definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KeyDefinition {
    pub path: PathBuf,
    #[serde(default)]
    pub password: Option<String>,
}

/// Serialized form of a [`Template`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TemplateDefinition {
    pub style: PassStyle,
    #[serde(default)]
    pub fields: FieldMap,
    #[serde(default)]
    pub keys: Option<KeyDefinition>,
    /// Slot key (`icon`, `logo2x`, ...) to a path string or a byte array.
    #[serde(default)]
    pub images: BTreeMap<String, Value>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl TemplateDefinition {
    /// Read a definition from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| {
            Error::Config(format!("Failed to read template {}: {}", path.display(), e))
        })?;

        let mut definition = Self::from_json(&data)?;
        definition.base_dir = path.parent().map(Path::to_path_buf);
        Ok(definition)
    }

    /// Parse a definition from JSON bytes. Relative paths stay relative to
    /// the working directory.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| Error::Config(format!("Invalid template: {}", e)))
    }

    /// Set the private key password, keeping the key directory of the
    /// definition (or the default `keys` directory if it names none).
    pub fn password(mut self, password: impl Into<String>) -> Self {
        let password = Some(password.into());
        match self.keys {
            Some(ref mut keys) => keys.password = password,
            None => {
                self.keys = Some(KeyDefinition {
                    path: PathBuf::from(DEFAULT_KEY_DIR),
                    password,
                })
            }
        }
        self
    }

    /// Replace the key directory, keeping any password of the definition.
    pub fn key_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match self.keys {
            Some(ref mut keys) => keys.path = path,
            None => self.keys = Some(KeyDefinition { path, password: None }),
        }
        self
    }

    /// Build the template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown image slot key, and
    /// [`Error::ImageResolution`] for an image value that is neither a path
    /// nor a byte array.
    pub fn into_template(self) -> Result<Template> {
        let mut template = Template::new(self.style, self.fields);

        if let Some(keys) = self.keys {
            let path = resolve(self.base_dir.as_deref(), keys.path);
            template = template.keys(path, keys.password.as_deref());
        }

        for (key, value) in &self.images {
            let image_key = ImageKey::parse_key(key)
                .ok_or_else(|| Error::Config(format!("Unknown image {}", key)))?;
            let source = match ImageSource::from_json(key, value)? {
                ImageSource::Path(path) => {
                    ImageSource::Path(resolve(self.base_dir.as_deref(), path))
                }
                source => source,
            };
            template.set_image(image_key, source);
        }

        Ok(template)
    }
}

fn resolve(base_dir: Option<&Path>, path: PathBuf) -> PathBuf {
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}
