//! Tantivy schema for build documents.
//!
//! Every schema field maps to one Tantivy field of the same short name:
//! - text fields: TEXT (STORED when the descriptor persists the value)
//! - numeric fields: u64 INDEXED | FAST (STORED when persisted)
//!
//! Two hidden STRING fields support exact lookups: `_key` holds
//! `<project>#<number>` for upserts and `_project` holds the untokenized
//! project name for project filters.

use std::collections::BTreeMap;

use tantivy::schema::{
    FieldType, NumericOptions, Schema, TextOptions, FAST, INDEXED, STORED, STRING, TEXT,
};

use buildsearch_types::{all_fields, Field, FieldDescriptor};

use crate::backend::ensure_schema_complete;
use crate::error::BackendError;

/// Name of the hidden upsert key field.
pub const KEY_FIELD: &str = "_key";

/// Name of the hidden exact project name field.
pub const PROJECT_FIELD: &str = "_project";

/// Schema field handles for efficient access
#[derive(Debug, Clone)]
pub struct BuildSchema {
    schema: Schema,
    fields: BTreeMap<Field, tantivy::schema::Field>,
    /// Upsert key: `<project>#<number>` (STRING)
    pub key: tantivy::schema::Field,
    /// Untokenized project name (STRING)
    pub project: tantivy::schema::Field,
}

impl BuildSchema {
    /// Get the underlying Tantivy schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Tantivy handle of a schema field.
    pub fn field(&self, field: Field) -> tantivy::schema::Field {
        // Construction guarantees every field is mapped.
        self.fields[&field]
    }

    pub fn is_mapped(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    /// Create a BuildSchema from an existing Tantivy Schema
    ///
    /// Fails if any schema field is missing or has the wrong value type.
    pub fn from_schema(schema: Schema) -> Result<Self, BackendError> {
        let mut fields = BTreeMap::new();
        for descriptor in all_fields() {
            let Ok(handle) = schema.get_field(descriptor.name) else {
                continue;
            };
            let entry = schema.get_field_entry(handle);
            let type_ok = match entry.field_type() {
                FieldType::U64(_) => descriptor.numeric,
                FieldType::Str(_) => !descriptor.numeric,
                _ => false,
            };
            if !type_ok {
                return Err(BackendError::SchemaMismatch(format!(
                    "field {} has unexpected type {:?}",
                    descriptor.name,
                    entry.field_type().value_type()
                )));
            }
            fields.insert(descriptor.field, handle);
        }

        ensure_schema_complete("tantivy", |f| fields.contains_key(&f))?;

        let key = schema
            .get_field(KEY_FIELD)
            .map_err(|_| BackendError::SchemaMismatch(format!("missing {} field", KEY_FIELD)))?;
        let project = schema.get_field(PROJECT_FIELD).map_err(|_| {
            BackendError::SchemaMismatch(format!("missing {} field", PROJECT_FIELD))
        })?;

        Ok(Self {
            schema,
            fields,
            key,
            project,
        })
    }
}

fn text_options(descriptor: &FieldDescriptor) -> TextOptions {
    if descriptor.persist {
        TEXT | STORED
    } else {
        TEXT
    }
}

fn numeric_options(descriptor: &FieldDescriptor) -> NumericOptions {
    if descriptor.persist {
        (INDEXED | STORED | FAST).into()
    } else {
        (INDEXED | FAST).into()
    }
}

/// Build the Tantivy schema for build documents.
pub fn build_schema() -> BuildSchema {
    let mut schema_builder = Schema::builder();
    let mut fields = BTreeMap::new();

    for descriptor in all_fields() {
        let handle = if descriptor.numeric {
            schema_builder.add_u64_field(descriptor.name, numeric_options(descriptor))
        } else {
            schema_builder.add_text_field(descriptor.name, text_options(descriptor))
        };
        fields.insert(descriptor.field, handle);
    }

    let key = schema_builder.add_text_field(KEY_FIELD, STRING);
    let project = schema_builder.add_text_field(PROJECT_FIELD, STRING);

    BuildSchema {
        schema: schema_builder.build(),
        fields,
        key,
        project,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_fields_are_mapped() {
        let schema = build_schema();
        for field in Field::ALL {
            assert!(schema.is_mapped(field), "Field {} not mapped", field);
            assert!(schema.schema().get_field(field.name()).is_ok());
        }
    }

    #[test]
    fn test_build_number_is_numeric() {
        let schema = build_schema();
        let entry = schema
            .schema()
            .get_field_entry(schema.field(Field::BuildNumber));
        assert!(matches!(entry.field_type(), FieldType::U64(_)));
        assert!(entry.is_stored());
    }

    #[test]
    fn test_from_schema() {
        let original = build_schema();
        let rebuilt = BuildSchema::from_schema(original.schema().clone()).unwrap();
        assert_eq!(rebuilt.key, original.key);
        assert_eq!(rebuilt.project, original.project);
        for field in Field::ALL {
            assert_eq!(rebuilt.field(field), original.field(field));
        }
    }

    #[test]
    fn test_from_schema_rejects_missing_field() {
        let mut builder = Schema::builder();
        builder.add_text_field("j", TEXT | STORED);
        builder.add_text_field(KEY_FIELD, STRING);
        builder.add_text_field(PROJECT_FIELD, STRING);
        let result = BuildSchema::from_schema(builder.build());
        assert!(matches!(result, Err(BackendError::SchemaMismatch(_))));
    }

    #[test]
    fn test_from_schema_rejects_wrong_type() {
        let mut builder = Schema::builder();
        for descriptor in all_fields() {
            // Every field as text, including the numeric build number.
            builder.add_text_field(descriptor.name, TEXT | STORED);
        }
        builder.add_text_field(KEY_FIELD, STRING);
        builder.add_text_field(PROJECT_FIELD, STRING);
        let result = BuildSchema::from_schema(builder.build());
        assert!(matches!(result, Err(BackendError::SchemaMismatch(_))));
    }
}
