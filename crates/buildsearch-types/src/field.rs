//! Field schema registry.
//!
//! The schema is a fixed table of indexable fields. Each entry pairs a
//! [`FieldDescriptor`] (storage and search attributes) with the function that
//! extracts the field's value from a build. The short names are part of the
//! on-disk format of existing indexes and must not change.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::build::BuildRecord;
use crate::document::FieldValue;
use crate::extract;

/// Extraction function stored alongside each descriptor.
pub type Extractor = fn(&dyn BuildRecord) -> Option<FieldValue>;

/// An indexable field of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    ProjectName,
    BuildNumber,
    BuildDisplayName,
    BuildParameter,
    Console,
}

impl Field {
    /// Every field, in schema order.
    pub const ALL: [Field; 5] = [
        Field::ProjectName,
        Field::BuildNumber,
        Field::BuildDisplayName,
        Field::BuildParameter,
        Field::Console,
    ];

    /// Descriptor for this field.
    pub fn descriptor(self) -> &'static FieldDescriptor {
        &FIELDS[self as usize]
    }

    /// Short stable name ("j", "n", ...).
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Look up a field by its short name.
    pub fn from_name(name: &str) -> Option<Field> {
        describe(name).map(|d| d.field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown field: {}", s))
    }
}

/// Storage and search attributes of a field.
#[derive(Clone, Copy)]
pub struct FieldDescriptor {
    /// The field this descriptor belongs to.
    pub field: Field,
    /// Short stable identifier used as the index field name.
    pub name: &'static str,
    /// Whether unqualified search terms match this field.
    pub default_searchable: bool,
    /// Whether values are parsed and sorted as numbers.
    pub numeric: bool,
    /// Whether the raw value is stored for retrieval.
    pub persist: bool,
    extract: Extractor,
}

impl FieldDescriptor {
    const fn new(
        field: Field,
        name: &'static str,
        default_searchable: bool,
        numeric: bool,
        persist: bool,
        extract: Extractor,
    ) -> Self {
        Self {
            field,
            name,
            default_searchable,
            numeric,
            persist,
            extract,
        }
    }

    /// Extract this field's value from a build.
    ///
    /// Returns `None` when the value does not apply to the build or cannot be
    /// read; never fails.
    pub fn extract(&self, build: &dyn BuildRecord) -> Option<FieldValue> {
        (self.extract)(build)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("default_searchable", &self.default_searchable)
            .field("numeric", &self.numeric)
            .field("persist", &self.persist)
            .finish()
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
    }
}

impl Eq for FieldDescriptor {}

// Order must follow the `Field` discriminants.
static FIELDS: [FieldDescriptor; 5] = [
    FieldDescriptor::new(
        Field::ProjectName,
        "j",
        true,
        false,
        true,
        extract::project_name,
    ),
    FieldDescriptor::new(
        Field::BuildNumber,
        "n",
        false,
        true,
        true,
        extract::build_number,
    ),
    FieldDescriptor::new(
        Field::BuildDisplayName,
        "d",
        true,
        false,
        true,
        extract::display_name,
    ),
    FieldDescriptor::new(
        Field::BuildParameter,
        "p",
        true,
        false,
        true,
        extract::parameters,
    ),
    FieldDescriptor::new(Field::Console, "c", true, false, true, extract::console),
];

static BY_NAME: OnceLock<HashMap<&'static str, &'static FieldDescriptor>> = OnceLock::new();

/// All field descriptors in schema order.
pub fn all_fields() -> &'static [FieldDescriptor] {
    &FIELDS
}

/// Look up a descriptor by its short name.
pub fn describe(name: &str) -> Option<&'static FieldDescriptor> {
    BY_NAME
        .get_or_init(|| FIELDS.iter().map(|d| (d.name, d)).collect())
        .get(name)
        .copied()
}

/// Fields that unqualified search terms are matched against.
pub fn default_searchable_fields() -> impl Iterator<Item = &'static FieldDescriptor> {
    FIELDS.iter().filter(|d| d.default_searchable)
}
