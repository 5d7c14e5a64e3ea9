//! Extracted documents.
//!
//! A [`Document`] holds the values extracted from one build, keyed by
//! [`Field`]. Fields whose value is absent are simply not present.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::build::BuildRecord;
use crate::field::Field;

/// A single extracted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(u64),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Identity of a document: project full name plus build number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub project: String,
    pub number: u64,
}

impl DocumentKey {
    pub fn new(project: impl Into<String>, number: u64) -> Self {
        Self {
            project: project.into(),
            number,
        }
    }
}

impl fmt::Display for DocumentKey {
    // The number is always the suffix after the last '#', so the form is
    // unambiguous even if a project name contains '#'.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.project, self.number)
    }
}

/// Field values extracted from one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    values: BTreeMap<Field, FieldValue>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract every schema field from a build.
    ///
    /// Fields that cannot be extracted are left out; one field's failure
    /// never affects the others.
    pub fn from_build(build: &dyn BuildRecord) -> Self {
        let mut document = Self::new();
        for field in Field::ALL {
            if let Some(value) = field.descriptor().extract(build) {
                document.values.insert(field, value);
            }
        }
        document
    }

    pub fn insert(&mut self, field: Field, value: FieldValue) {
        self.values.insert(field, value);
    }

    pub fn with(mut self, field: Field, value: FieldValue) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    pub fn number(&self) -> Option<u64> {
        self.get(Field::BuildNumber).and_then(FieldValue::as_u64)
    }

    /// Key derived from the project name and build number, if both are present.
    pub fn key(&self) -> Option<DocumentKey> {
        let project = self.text(Field::ProjectName)?;
        let number = self.number()?;
        Some(DocumentKey::new(project, number))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in &self.values {
            map.serialize_entry(field.name(), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildParameter, StoredBuild};

    #[test]
    fn test_from_build_all_fields() {
        let build = StoredBuild::new("app", 3)
            .with_display_name("release-3")
            .with_parameters(vec![BuildParameter::new("ENV", "prod")])
            .with_log_text("deploying to prod");

        let doc = Document::from_build(&build);
        assert_eq!(doc.len(), 5);
        assert_eq!(doc.text(Field::ProjectName), Some("app"));
        assert_eq!(doc.number(), Some(3));
        assert_eq!(doc.text(Field::BuildDisplayName), Some("release-3"));
        assert_eq!(doc.text(Field::BuildParameter), Some("prod "));
        assert_eq!(doc.text(Field::Console), Some("deploying to prod"));
    }

    #[test]
    fn test_partial_extraction_keeps_other_fields() {
        // No parameters and no readable log.
        let build = StoredBuild::new("app", 9);
        let doc = Document::from_build(&build);

        assert_eq!(doc.len(), 3);
        assert!(doc.get(Field::BuildParameter).is_none());
        assert!(doc.get(Field::Console).is_none());
        assert_eq!(doc.key(), Some(DocumentKey::new("app", 9)));
    }

    #[test]
    fn test_key_requires_project_and_number() {
        let doc = Document::new().with(Field::ProjectName, FieldValue::Text("app".into()));
        assert!(doc.key().is_none());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(DocumentKey::new("a#b", 12).to_string(), "a#b#12");
    }

    #[test]
    fn test_serialize_uses_short_names() {
        let doc = Document::new()
            .with(Field::ProjectName, FieldValue::Text("app".into()))
            .with(Field::BuildNumber, FieldValue::Number(4));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json, serde_json::json!({"j": "app", "n": 4}));
    }
}
