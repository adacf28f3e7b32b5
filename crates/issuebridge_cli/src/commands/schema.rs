//! The schema command: show the target table and check the field mapping.

use console::style;
use serde::Serialize;
use tabled::Tabled;

use issuebridge::retry::retry_platform;
use issuebridge::{
    ConfigurationError, FieldMapping, FieldSchema, RecordStore, SchemaValidator, SyncConfig,
    TableSchema,
};

use super::{OutputFormat, airtable_client};
use crate::config::Config;

#[derive(Debug, Clone, Serialize, Tabled)]
struct FieldRow {
    #[tabled(rename = "Field ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    field_type: String,
    #[tabled(rename = "Mapped From")]
    mapped_from: String,
    #[tabled(rename = "Choices")]
    choices: String,
}

impl FieldRow {
    fn new(field: &FieldSchema, mapping: &FieldMapping) -> Self {
        let mapped_from = mapping
            .iter()
            .filter(|(_, entry)| entry.target_field_id == field.id)
            .map(|(source, entry)| {
                if entry.skip {
                    format!("{source} (computed)")
                } else {
                    source.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            id: field.id.clone(),
            name: field.name.clone(),
            field_type: field.field_type.clone(),
            mapped_from,
            choices: field.choices.join(", "),
        }
    }
}

fn field_rows(schema: &TableSchema, mapping: &FieldMapping) -> Vec<FieldRow> {
    schema
        .fields
        .iter()
        .map(|field| FieldRow::new(field, mapping))
        .collect()
}

/// Only the Airtable connection is needed to read a schema.
fn check_airtable(config: &SyncConfig) -> Result<(), ConfigurationError> {
    let missing: Vec<String> = [
        ("airtable.api_key", &config.airtable.api_key),
        ("airtable.base_id", &config.airtable.base_id),
        ("airtable.table_name", &config.airtable.table_name),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name.to_string())
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigurationError::MissingParameters(missing))
    }
}

/// Handle the schema command.
pub(crate) async fn handle_schema(
    validate: bool,
    output: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let sync_config = config.to_sync_config();
    check_airtable(&sync_config)?;

    let airtable = airtable_client(&sync_config)?;
    let schema = retry_platform(
        || airtable.fetch_schema(),
        "read target schema",
        &sync_config.retry,
        None,
    )
    .await?;

    let rows = field_rows(&schema, &sync_config.field_map);
    match output {
        OutputFormat::Table => {
            println!("{} ({})", style(&schema.name).bold(), schema.id);
            let mut table = tabled::Table::new(&rows);
            table.with(tabled::settings::Style::rounded());
            println!("{}", table);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }

    if validate {
        SchemaValidator::validate(&schema, &sync_config.field_map)?;
        println!(
            "{} Field mapping matches table '{}'",
            style("✓").green(),
            schema.name
        );
    }

    Ok(())
}
