//! Field model for templates and passes.
//!
//! Fields are opaque JSON values keyed by name. A template supplies
//! defaults, a pass supplies overrides, and [`merge`] combines the two with a
//! shallow key-wise override. The enumerations in this module name the keys
//! the pipeline and the typed accessors know about; any other key still
//! passes through to `pass.json` untouched.

use serde_json::{Map, Value};

/// Map of field name to JSON value, as written to `pass.json`.
pub type FieldMap = Map<String, Value>;

/// Reserved key that is always overwritten when `pass.json` is serialized.
pub const FORMAT_VERSION_KEY: &str = "formatVersion";

/// Value of `formatVersion` in every generated pass.
pub const FORMAT_VERSION: u64 = 1;

/// Combines template defaults with instance overrides.
///
/// Instance values replace template values for identical keys, template-only
/// keys pass through unchanged. Nested objects are replaced whole, never
/// merged.
pub fn merge(template_fields: &FieldMap, instance_fields: &FieldMap) -> FieldMap {
    let mut combined = template_fields.clone();
    for (key, value) in instance_fields {
        combined.insert(key.clone(), value.clone());
    }
    combined
}

macro_rules! field_keys {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $key:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every key in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// JSON key as it appears in `pass.json`.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

field_keys! {
    /// Fields a template typically carries for all of its passes.
    TemplateField {
        PassTypeIdentifier => "passTypeIdentifier",
        TeamIdentifier => "teamIdentifier",
        BackgroundColor => "backgroundColor",
        ForegroundColor => "foregroundColor",
        LabelColor => "labelColor",
        LogoText => "logoText",
        OrganizationName => "organizationName",
        SuppressStripShine => "suppressStripShine",
        WebServiceUrl => "webServiceURL",
    }
}

field_keys! {
    /// Top-level fields of an individual pass.
    TopLevelField {
        AuthenticationToken => "authenticationToken",
        BackgroundColor => "backgroundColor",
        Barcode => "barcode",
        Description => "description",
        ForegroundColor => "foregroundColor",
        LabelColor => "labelColor",
        Locations => "locations",
        LogoText => "logoText",
        OrganizationName => "organizationName",
        RelevantDate => "relevantDate",
        SerialNumber => "serialNumber",
        SuppressStripShine => "suppressStripShine",
        WebServiceUrl => "webServiceURL",
    }
}

field_keys! {
    /// Keys of the style-scoped structure object.
    StructureField {
        AuxiliaryFields => "auxiliaryFields",
        BackFields => "backFields",
        HeaderFields => "headerFields",
        PrimaryFields => "primaryFields",
        SecondaryFields => "secondaryFields",
        TransitType => "transitType",
    }
}

/// Fields that must be present before a pass can be generated.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "description",
    "organizationName",
    "passTypeIdentifier",
    "serialNumber",
    "teamIdentifier",
];

/// Returns `true` if the value counts as "not filled in".
pub(crate) fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> FieldMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_instance_wins() {
        let template = map(json!({ "organizationName": "Acme", "logoText": "Acme" }));
        let instance = map(json!({ "logoText": "Acme Deals", "serialNumber": "0001" }));

        let combined = merge(&template, &instance);

        assert_eq!(combined["organizationName"], "Acme");
        assert_eq!(combined["logoText"], "Acme Deals");
        assert_eq!(combined["serialNumber"], "0001");
        assert_eq!(combined.len(), 3);
    }

    #[test]
    fn test_merge_is_shallow() {
        let template = map(json!({ "coupon": { "primaryFields": [1], "backFields": [2] } }));
        let instance = map(json!({ "coupon": { "primaryFields": [3] } }));

        let combined = merge(&template, &instance);

        assert_eq!(combined["coupon"], json!({ "primaryFields": [3] }));
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let template = map(json!({ "a": 1 }));
        let instance = map(json!({ "a": 2 }));
        let _ = merge(&template, &instance);
        assert_eq!(template["a"], 1);
    }

    #[test]
    fn test_key_names() {
        assert_eq!(TemplateField::WebServiceUrl.as_str(), "webServiceURL");
        assert_eq!(TopLevelField::SerialNumber.to_string(), "serialNumber");
        assert_eq!(StructureField::ALL.len(), 6);
        assert_eq!(TopLevelField::ALL.len(), 13);
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&Value::Null)));
        assert!(is_blank(Some(&json!(""))));
        assert!(!is_blank(Some(&json!("x"))));
        assert!(!is_blank(Some(&json!(false))));
    }
}
