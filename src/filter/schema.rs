//! Attribute schema
//!
//! Per-attribute metadata the compiler needs to pick clause shapes: the
//! native field name, nesting, geometry storage, text analysis and date
//! formatting.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Value binding of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binding {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Geometry,
}

/// How a geometry attribute is indexed by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryStorage {
    /// Not a geometry
    #[default]
    None,
    /// Indexed as a point (`geo_point`)
    Point,
    /// Indexed as a shape (`geo_shape`)
    Shape,
}

/// Metadata for one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    /// Name used in predicates
    pub name: String,
    /// Field name in the backend, defaults to `name`
    #[serde(default)]
    pub native_name: Option<String>,
    #[serde(default)]
    pub binding: Binding,
    /// Lives inside a nested document
    #[serde(default)]
    pub nested: bool,
    #[serde(default)]
    pub geometry: GeometryStorage,
    /// Full-text analyzed field
    #[serde(default)]
    pub analyzed: bool,
    /// chrono `strftime` pattern for date literals
    #[serde(default)]
    pub date_format: Option<String>,
    /// Longitude/latitude coordinates rather than planar ones
    #[serde(default = "default_true")]
    pub geographic: bool,
    #[serde(default = "default_true", rename = "use")]
    pub use_attribute: bool,
    /// Served from stored fields rather than `_source`
    #[serde(default)]
    pub stored: bool,
}

fn default_true() -> bool {
    true
}

impl AttributeSchema {
    /// A plain attribute: no nesting, no geometry, no analysis
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_name: None,
            binding: Binding::String,
            nested: false,
            geometry: GeometryStorage::None,
            analyzed: false,
            date_format: None,
            geographic: true,
            use_attribute: true,
            stored: false,
        }
    }

    pub fn with_native_name(mut self, native_name: impl Into<String>) -> Self {
        self.native_name = Some(native_name.into());
        self
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = binding;
        self
    }

    pub fn nested(mut self) -> Self {
        self.nested = true;
        self
    }

    pub fn analyzed(mut self) -> Self {
        self.analyzed = true;
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.binding = Binding::Date;
        self.date_format = Some(format.into());
        self
    }

    /// Geometry attribute with the given storage
    pub fn geometry(name: impl Into<String>, storage: GeometryStorage) -> Self {
        let mut attribute = Self::new(name).with_binding(Binding::Geometry);
        attribute.geometry = storage;
        attribute
    }

    pub fn planar(mut self) -> Self {
        self.geographic = false;
        self
    }

    /// Backend field name
    pub fn field(&self) -> &str {
        self.native_name.as_deref().unwrap_or(&self.name)
    }

    /// Path of the enclosing nested document, if any
    pub fn nested_path(&self) -> Option<&str> {
        if !self.nested {
            return None;
        }
        let field = self.field();
        field.rfind('.').map(|idx| &field[..idx])
    }
}

/// The attributes of one feature type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Feature type name, also the prefix of qualified identifiers
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeSchema>,
    #[serde(default)]
    pub default_geometry: Option<String>,
}

impl FeatureSchema {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Vec::new(),
            default_geometry: None,
        }
    }

    /// Add an attribute; the first geometry becomes the default geometry
    pub fn with_attribute(mut self, attribute: AttributeSchema) -> Self {
        if self.default_geometry.is_none() && attribute.geometry != GeometryStorage::None {
            self.default_geometry = Some(attribute.name.clone());
        }
        self.attributes.push(attribute);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attribute metadata, or a plain attribute for unknown names
    pub fn resolve(&self, name: &str) -> Cow<'_, AttributeSchema> {
        match self.attribute(name) {
            Some(attribute) => Cow::Borrowed(attribute),
            None => Cow::Owned(AttributeSchema::new(name)),
        }
    }

    /// Attributes marked for use
    pub fn used(&self) -> impl Iterator<Item = &AttributeSchema> {
        self.attributes.iter().filter(|a| a.use_attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_defaults_to_name() {
        let attr = AttributeSchema::new("age");
        assert_eq!(attr.field(), "age");
        let attr = attr.with_native_name("props.age");
        assert_eq!(attr.field(), "props.age");
    }

    #[test]
    fn test_nested_path() {
        let attr = AttributeSchema::new("tag")
            .with_native_name("tags.name")
            .nested();
        assert_eq!(attr.nested_path(), Some("tags"));

        let flat = AttributeSchema::new("tag").with_native_name("tags.name");
        assert_eq!(flat.nested_path(), None);

        let deep = AttributeSchema::new("x").with_native_name("a.b.c").nested();
        assert_eq!(deep.nested_path(), Some("a.b"));
    }

    #[test]
    fn test_resolve_unknown_is_plain() {
        let schema = FeatureSchema::new("roads");
        let attr = schema.resolve("missing");
        assert_eq!(attr.field(), "missing");
        assert!(!attr.nested);
        assert_eq!(attr.geometry, GeometryStorage::None);
    }

    #[test]
    fn test_default_geometry_is_first_geometry() {
        let schema = FeatureSchema::new("roads")
            .with_attribute(AttributeSchema::new("name"))
            .with_attribute(AttributeSchema::geometry("geom", GeometryStorage::Shape))
            .with_attribute(AttributeSchema::geometry("centroid", GeometryStorage::Point));
        assert_eq!(schema.default_geometry.as_deref(), Some("geom"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let schema: FeatureSchema = serde_json::from_str(
            r#"{"type_name": "roads", "attributes": [
                {"name": "geom", "geometry": "point"},
                {"name": "note", "use": false, "analyzed": true}
            ]}"#,
        )
        .unwrap();
        let geom = schema.attribute("geom").unwrap();
        assert_eq!(geom.geometry, GeometryStorage::Point);
        assert!(geom.geographic);
        assert!(!schema.attribute("note").unwrap().use_attribute);
        assert_eq!(schema.used().count(), 1);
    }
}
