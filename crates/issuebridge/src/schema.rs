//! Target table schema and mapping validation.

use crate::error::ConfigurationError;
use crate::mapping::{FieldMapping, logical};

/// Schema of the target table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    pub id: String,
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

/// One field of the target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub id: String,
    pub name: String,
    /// Store type name, e.g. `singleLineText`, `singleSelect`.
    pub field_type: String,
    /// Allowed choice names, for select fields.
    pub choices: Vec<String>,
}

impl FieldSchema {
    /// Whether the field only accepts values from a list of choices.
    #[must_use]
    pub fn is_select(&self) -> bool {
        matches!(self.field_type.as_str(), "singleSelect" | "multipleSelects")
    }

    #[must_use]
    pub fn has_choice(&self, choice: &str) -> bool {
        self.choices.iter().any(|c| c == choice)
    }
}

impl TableSchema {
    /// Look up a field by id.
    pub fn field(&self, id: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Display name of a field, falling back to the id itself.
    pub fn field_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.field(id).map_or(id, |f| f.name.as_str())
    }

    /// `name (id)` for every field, for operator diagnostics.
    pub fn describe_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| format!("{} ({})", f.name, f.id))
            .collect()
    }
}

/// Confirms a [`FieldMapping`] against the target schema before any fetch.
pub struct SchemaValidator;

impl SchemaValidator {
    /// Validate that every target field the sync will touch exists.
    ///
    /// Checked: every non-skipped entry, plus the last-updated entry even
    /// when skipped (it is read). The identity key must be mapped and
    /// written. Missing fields are reported together.
    pub fn validate(schema: &TableSchema, mapping: &FieldMapping) -> Result<(), ConfigurationError> {
        match mapping.get(logical::KEY) {
            None => {
                return Err(ConfigurationError::InvalidFieldMap(format!(
                    "'{}' must be mapped to the field holding the issue key",
                    logical::KEY
                )));
            }
            Some(entry) if entry.skip => {
                return Err(ConfigurationError::InvalidFieldMap(format!(
                    "'{}' cannot be skipped: records are matched by the issue key",
                    logical::KEY
                )));
            }
            Some(_) => {}
        }

        let missing: Vec<String> = mapping
            .iter()
            .filter(|(source, entry)| {
                !entry.skip || *source == logical::UPDATED
            })
            .filter(|(_, entry)| schema.field(&entry.target_field_id).is_none())
            .map(|(source, entry)| format!("{} -> {}", source, entry.target_field_id))
            .collect();

        if !missing.is_empty() {
            return Err(ConfigurationError::UnknownFields {
                missing,
                available: schema.describe_fields(),
            });
        }

        tracing::info!(
            table = %schema.name,
            fields = mapping.len(),
            "Validated field mapping against target schema"
        );
        Ok(())
    }
}
