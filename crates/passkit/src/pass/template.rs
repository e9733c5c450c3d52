//! Reusable pass templates.

use crate::crypto::{KeyStore, ManifestSigner};
use crate::images::{ImageKey, ImageSet, ImageSource};
use crate::pass::fields::{merge, FieldMap, TemplateField};
use crate::pass::style::PassStyle;
use crate::pass::Pass;
use crate::Result;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Defaults shared by many passes: style, branding fields, images, and the
/// signer used for every pass created from it.
///
/// A template is never changed by the passes stamped out of it, so one
/// template can feed concurrent generations.
///
/// # Example
///
/// ```no_run
/// use passkit::{FieldMap, PassStyle, Template};
/// use passkit::images::ImageRole;
/// use passkit::pass::fields::TemplateField;
///
/// let mut template = Template::new(PassStyle::Coupon, FieldMap::new())
///     .keys("keys", Some("secret"));
/// template
///     .set_field(TemplateField::OrganizationName, "Acme")
///     .set_field(TemplateField::PassTypeIdentifier, "pass.com.acme.demo");
/// template.set_image(ImageRole::Logo, "images/logo.png");
///
/// let mut fields = FieldMap::new();
/// fields.insert("serialNumber".into(), "0001".into());
/// let pass = template.create_pass(fields);
/// ```
#[derive(Clone)]
pub struct Template {
    style: PassStyle,
    fields: FieldMap,
    images: ImageSet,
    signer: Arc<dyn ManifestSigner>,
}

impl Template {
    /// Create a template signing with the default `keys` directory.
    pub fn new(style: PassStyle, fields: FieldMap) -> Self {
        Self {
            style,
            fields,
            images: ImageSet::new(),
            signer: Arc::new(KeyStore::default()),
        }
    }

    /// Create a template from a style name such as `"eventTicket"`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnsupportedStyle`] for an unknown style name.
    pub fn from_style_name(style: &str, fields: FieldMap) -> Result<Self> {
        Ok(Self::new(style.parse()?, fields))
    }

    /// Set the key directory and the password of the keys inside it.
    pub fn keys(mut self, path: impl AsRef<Path>, password: Option<&str>) -> Self {
        let mut store = KeyStore::new(path);
        if let Some(password) = password {
            store = store.password(password);
        }
        self.signer = Arc::new(store);
        self
    }

    /// Replace the signer used by passes created from now on.
    pub fn signer(mut self, signer: impl ManifestSigner + 'static) -> Self {
        self.signer = Arc::new(signer);
        self
    }

    pub fn style(&self) -> PassStyle {
        self.style
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn field(&self, key: TemplateField) -> Option<&Value> {
        self.fields.get(key.as_str())
    }

    pub fn set_field(&mut self, key: TemplateField, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.as_str().to_string(), value.into());
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

    /// Register every `<role>[@2x|@3x].png` file in `dir` as a template image.
    pub fn load_images_from(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        self.images.load_from(dir)
    }

    /// Stamp out a pass.
    ///
    /// `fields` override the template fields key by key. The pass starts with
    /// a copy of the template images and shares the template signer.
    pub fn create_pass(&self, fields: FieldMap) -> Pass {
        Pass::new(
            self.style,
            merge(&self.fields, &fields),
            self.images.clone(),
            Arc::clone(&self.signer),
        )
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("style", &self.style)
            .field("fields", &self.fields)
            .field("images", &self.images)
            .finish_non_exhaustive()
    }
}
