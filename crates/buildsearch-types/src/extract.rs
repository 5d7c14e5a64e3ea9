//! Per-field extraction rules.
//!
//! Every rule is a pure function of the build. Missing optional data and
//! console read failures yield `None` for that field only.

use tracing::debug;

use crate::build::BuildRecord;
use crate::document::FieldValue;
use crate::field::Field;

/// Extract one field's value from a build.
pub fn extract(build: &dyn BuildRecord, field: Field) -> Option<FieldValue> {
    field.descriptor().extract(build)
}

pub(crate) fn project_name(build: &dyn BuildRecord) -> Option<FieldValue> {
    Some(FieldValue::Text(build.project_full_name().to_string()))
}

pub(crate) fn build_number(build: &dyn BuildRecord) -> Option<FieldValue> {
    Some(FieldValue::Number(build.number()))
}

pub(crate) fn display_name(build: &dyn BuildRecord) -> Option<FieldValue> {
    Some(FieldValue::Text(build.display_name().to_string()))
}

/// Parameter values, each followed by a single space.
pub(crate) fn parameters(build: &dyn BuildRecord) -> Option<FieldValue> {
    let parameters = build.parameters()?;
    let mut joined = String::new();
    for parameter in parameters {
        joined.push_str(&parameter.value);
        joined.push(' ');
    }
    Some(FieldValue::Text(joined))
}

pub(crate) fn console(build: &dyn BuildRecord) -> Option<FieldValue> {
    let mut buffer = Vec::new();
    match build.write_log_to(&mut buffer) {
        Ok(_) => Some(FieldValue::Text(
            String::from_utf8_lossy(&buffer).into_owned(),
        )),
        Err(e) => {
            debug!(
                project = build.project_full_name(),
                number = build.number(),
                error = %e,
                "Console log unavailable"
            );
            None
        }
    }
}
