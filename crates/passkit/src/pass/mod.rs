//! Pass instances and the generation pipeline.
//!
//! A [`Pass`] is stamped out of a [`Template`], adjusted through its
//! accessors, and finally consumed by [`Pass::generate`], which walks the
//! stages of [`GenerationStage`] in order:
//!
//! ```text
//! Built -> Validated -> ManifestComputed -> Signed -> Archived -> Done
//! ```
//!
//! Any stage may fail, which ends the pipeline with that stage's error.

pub mod fields;
pub mod style;
pub mod template;

pub use style::PassStyle;
pub use template::Template;

use crate::archive::{pack, ArchiveOptions, PackageMember};
use crate::crypto::ManifestSigner;
use crate::images::{ImageKey, ImageSet, ImageSource};
use crate::manifest::{DigestAlgorithm, Manifest, MANIFEST_FILE, PASS_FILE, SIGNATURE_FILE};
use crate::validate::validate;
use crate::{Error, Result};
use fields::{
    FieldMap, StructureField, TemplateField, TopLevelField, FORMAT_VERSION, FORMAT_VERSION_KEY,
};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;

/// Stage of a pass generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Built,
    Validated,
    ManifestComputed,
    Signed,
    Archived,
    Done,
    Failed,
}

impl GenerationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStage::Built => "built",
            GenerationStage::Validated => "validated",
            GenerationStage::ManifestComputed => "manifest_computed",
            GenerationStage::Signed => "signed",
            GenerationStage::Archived => "archived",
            GenerationStage::Done => "done",
            GenerationStage::Failed => "failed",
        }
    }
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issued pass: merged fields, images, and the signer inherited from its
/// template.
#[derive(Clone)]
pub struct Pass {
    style: PassStyle,
    fields: FieldMap,
    images: ImageSet,
    signer: Arc<dyn ManifestSigner>,
    archive_options: ArchiveOptions,
    digest: DigestAlgorithm,
}

impl Pass {
    pub(crate) fn new(
        style: PassStyle,
        mut fields: FieldMap,
        images: ImageSet,
        signer: Arc<dyn ManifestSigner>,
    ) -> Self {
        match fields.get(style.as_str()) {
            Some(Value::Object(_)) => {}
            Some(other) => {
                tracing::warn!(style = %style, value = %other, "replacing non-object structure");
                fields.insert(style.as_str().to_string(), Value::Object(FieldMap::new()));
            }
            None => {
                fields.insert(style.as_str().to_string(), Value::Object(FieldMap::new()));
            }
        }

        Self {
            style,
            fields,
            images,
            signer,
            archive_options: ArchiveOptions::default(),
            digest: DigestAlgorithm::default(),
        }
    }

    pub fn style(&self) -> PassStyle {
        self.style
    }

    /// Merged fields, without `formatVersion`.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn field(&self, key: TopLevelField) -> Option<&Value> {
        self.fields.get(key.as_str())
    }

    pub fn set_field(&mut self, key: TopLevelField, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.as_str().to_string(), value.into());
        self
    }

    /// The style-keyed structure object (`"coupon": { ... }`).
    pub fn structure(&self) -> Option<&FieldMap> {
        self.fields.get(self.style.as_str()).and_then(Value::as_object)
    }

    pub fn structure_field(&self, key: StructureField) -> Option<&Value> {
        self.structure().and_then(|s| s.get(key.as_str()))
    }

    pub fn set_structure_field(
        &mut self,
        key: StructureField,
        value: impl Into<Value>,
    ) -> &mut Self {
        let style = self.style.as_str();
        match self.fields.get_mut(style) {
            Some(Value::Object(structure)) => {
                structure.insert(key.as_str().to_string(), value.into());
            }
            _ => {
                let mut structure = FieldMap::new();
                structure.insert(key.as_str().to_string(), value.into());
                self.fields.insert(style.to_string(), Value::Object(structure));
            }
        }
        self
    }

    pub fn images(&self) -> &ImageSet {
        &self.images
    }

    pub fn image(&self, key: impl Into<ImageKey>) -> Option<&ImageSource> {
        self.images.get(key)
    }

    pub fn set_image(
        &mut self,
        key: impl Into<ImageKey>,
        source: impl Into<ImageSource>,
    ) -> &mut Self {
        self.images.set(key, source);
        self
    }

    /// Register every `<role>[@2x|@3x].png` file in `dir`, overriding any
    /// image inherited from the template.
    pub fn load_images_from(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        self.images.load_from(dir)
    }

    /// Set zip container options (default: fast compression, current time).
    pub fn archive_options(mut self, options: ArchiveOptions) -> Self {
        self.archive_options = options;
        self
    }

    /// Set the manifest digest (default: SHA-1).
    pub fn digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest = algorithm;
        self
    }

    /// Replace the signer inherited from the template.
    pub fn signer(mut self, signer: impl ManifestSigner + 'static) -> Self {
        self.signer = Arc::new(signer);
        self
    }

    /// The document written as `pass.json`: the merged fields with
    /// `formatVersion` forced to 1.
    pub fn pass_json(&self) -> FieldMap {
        let mut document = self.fields.clone();
        document.insert(FORMAT_VERSION_KEY.to_string(), Value::from(FORMAT_VERSION));
        document
    }

    /// Validate, resolve images, build the manifest, sign it, and pack
    /// everything into a `.pkpass` archive.
    ///
    /// Consumes the pass: a pass is generated at most once.
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that failed:
    /// - [`Error::Validation`] before any image is read
    /// - [`Error::ImageResolution`] once every image task has finished
    /// - [`Error::Signing`] from the signer
    /// - [`Error::Archive`] from the zip writer
    pub async fn generate(self) -> Result<Vec<u8>> {
        let serial = self
            .field(TopLevelField::SerialNumber)
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .unwrap_or_default();
        let span = tracing::info_span!("generate", serial = %serial, style = %self.style);

        async move {
            let mut stage = GenerationStage::Built;
            let result = self.run(&mut stage).await;
            match &result {
                Ok(bytes) => tracing::info!(bytes = bytes.len(), "pass generated"),
                Err(e) => {
                    tracing::debug!(after = %stage, error = %e, "generation failed");
                    advance(&mut stage, GenerationStage::Failed);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(mut self, stage: &mut GenerationStage) -> Result<Vec<u8>> {
        validate(&self.fields, &self.images)?;
        advance(stage, GenerationStage::Validated);

        let resolved = self.images.resolve_all().await?;
        tracing::debug!(images = resolved.len(), "images resolved");

        let mut members = Vec::with_capacity(resolved.len() + 3);
        members.push(PackageMember::new(PASS_FILE, serde_json::to_vec(&self.pass_json())?));
        members.extend(
            resolved
                .into_iter()
                .map(|(key, bytes)| PackageMember::new(key.file_name(), bytes)),
        );

        let manifest = Manifest::build(&members, self.digest);
        let manifest_json = manifest.to_json()?;
        tracing::debug!(entries = manifest.len(), digest = %manifest.algorithm(), "manifest built");
        advance(stage, GenerationStage::ManifestComputed);

        let pass_type_identifier = self
            .fields
            .get(TemplateField::PassTypeIdentifier.as_str())
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default();
        let signer = Arc::clone(&self.signer);
        let to_sign = manifest_json.clone();
        let signature = tokio::task::spawn_blocking(move || {
            signer.sign(&to_sign, &pass_type_identifier)
        })
        .await
        .map_err(|e| Error::Signing(format!("Signing task failed: {}", e)))??;
        advance(stage, GenerationStage::Signed);

        members.push(PackageMember::new(MANIFEST_FILE, manifest_json));
        members.push(PackageMember::new(SIGNATURE_FILE, signature));

        let archive = pack(&members, &self.archive_options)?;
        advance(stage, GenerationStage::Archived);

        advance(stage, GenerationStage::Done);
        Ok(archive)
    }
}

fn advance(stage: &mut GenerationStage, next: GenerationStage) {
    tracing::debug!(from = %stage, to = %next, "stage transition");
    *stage = next;
}

impl fmt::Debug for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("style", &self.style)
            .field("fields", &self.fields)
            .field("images", &self.images)
            .field("archive_options", &self.archive_options)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}
