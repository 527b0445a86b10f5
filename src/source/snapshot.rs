//! Metadata snapshot source.
//!
//! Reads the JSON returned by a "retrieve all entities" call (the Web API
//! `EntityDefinitions?$expand=Attributes` shape, either wrapped in `value` or
//! as a bare array) and maps it into descriptors. Missing names, labels and
//! attribute lists are replaced by defaults rather than rejected.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::model::{
    AttributeDescriptor, AttributeKind, DateFormat, EntityDescriptor, IntegerFormat, OptionValue,
    StringFormat,
};
use crate::traits::{MetadataSource, SourceError};

/// Metadata source backed by a JSON snapshot on disk.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
    id: String,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path.display().to_string();
        Self { path, id }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetadataSource for SnapshotSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    #[instrument(skip(self), fields(source = %self.id))]
    async fn retrieve_all_entities(&self) -> Result<Vec<EntityDescriptor>, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.id.clone(),
                source,
            })?;

        let entities = parse_snapshot(&bytes).map_err(|source| SourceError::Malformed {
            path: self.id.clone(),
            source,
        })?;

        info!(entities = entities.len(), "Metadata snapshot loaded");
        Ok(entities)
    }
}

/// Parses a snapshot document into entity descriptors, preserving source order.
pub fn parse_snapshot(bytes: &[u8]) -> Result<Vec<EntityDescriptor>, serde_json::Error> {
    let document: SnapshotDocument = serde_json::from_slice(bytes)?;
    let entities = match document {
        SnapshotDocument::Collection { value } => value,
        SnapshotDocument::List(list) => list,
    };
    Ok(entities.into_iter().map(EntityDto::into_descriptor).collect())
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    Collection { value: Vec<EntityDto> },
    List(Vec<EntityDto>),
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct EntityDto {
    logical_name: Option<String>,
    schema_name: Option<String>,
    display_name: Option<LabelDto>,
    is_custom_entity: Option<bool>,
    attributes: Option<Vec<AttributeDto>>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct AttributeDto {
    logical_name: Option<String>,
    schema_name: Option<String>,
    display_name: Option<LabelDto>,
    description: Option<LabelDto>,
    attribute_type: Option<String>,
    attribute_type_name: Option<TypeNameDto>,
    max_length: Option<i32>,
    format: Option<String>,
    format_name: Option<TypeNameDto>,
    targets: Option<Vec<String>>,
    option_set: Option<OptionSetDto>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct LabelDto {
    user_localized_label: Option<LocalizedLabelDto>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct LocalizedLabelDto {
    label: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct TypeNameDto {
    value: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct OptionSetDto {
    options: Option<Vec<OptionDto>>,
    true_option: Option<OptionDto>,
    false_option: Option<OptionDto>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct OptionDto {
    value: Option<i32>,
    label: Option<LabelDto>,
}

// ============================================================================
// Mapping
// ============================================================================

fn label_text(label: Option<LabelDto>) -> Option<String> {
    label
        .and_then(|l| l.user_localized_label)
        .and_then(|l| l.label)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn name_of(logical: Option<String>, schema: Option<String>) -> String {
    logical
        .filter(|n| !n.is_empty())
        .or(schema)
        .unwrap_or_default()
}

impl EntityDto {
    fn into_descriptor(self) -> EntityDescriptor {
        let schema_name = name_of(self.logical_name, self.schema_name);
        let attributes: Vec<AttributeDescriptor> = self
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(AttributeDto::into_descriptor)
            .collect();

        debug!(entity = %schema_name, attributes = attributes.len(), "Mapped entity");

        EntityDescriptor {
            schema_name,
            display_label: label_text(self.display_name),
            is_custom: self.is_custom_entity.unwrap_or(false),
            attributes,
        }
    }
}

impl OptionDto {
    fn into_option(self) -> OptionValue {
        OptionValue {
            label: label_text(self.label),
            value: self.value,
        }
    }
}

impl AttributeDto {
    fn into_descriptor(mut self) -> AttributeDescriptor {
        let kind = self.resolve_kind();
        AttributeDescriptor {
            schema_name: name_of(self.logical_name, self.schema_name),
            display_label: label_text(self.display_name),
            description: label_text(self.description).unwrap_or_default(),
            kind,
        }
    }

    /// Type name from `AttributeTypeName` (minus its `Type` suffix), else `AttributeType`.
    fn raw_type_name(&self) -> Option<String> {
        self.attribute_type_name
            .as_ref()
            .and_then(|t| non_blank(t.value.as_deref()))
            .map(|v| v.strip_suffix("Type").unwrap_or(v))
            .or_else(|| non_blank(self.attribute_type.as_deref()))
            .map(str::to_string)
    }

    fn options(&mut self) -> Vec<OptionValue> {
        self.option_set
            .as_mut()
            .and_then(|set| set.options.take())
            .unwrap_or_default()
            .into_iter()
            .map(OptionDto::into_option)
            .collect()
    }

    fn resolve_kind(&mut self) -> AttributeKind {
        let Some(type_name) = self.raw_type_name() else {
            return AttributeKind::Other { type_name: None };
        };
        let format = self.format.clone();
        let format = non_blank(format.as_deref());

        match type_name.to_ascii_lowercase().as_str() {
            "string" => {
                let sub_format = self
                    .format_name
                    .as_ref()
                    .and_then(|f| non_blank(f.value.as_deref()))
                    .or(format)
                    .map(StringFormat::parse);
                AttributeKind::Text {
                    format: sub_format,
                    max_length: self.max_length,
                }
            }
            "memo" => AttributeKind::Memo,
            "integer" => AttributeKind::Integer {
                format: format
                    .filter(|f| !f.eq_ignore_ascii_case("none"))
                    .map(IntegerFormat::parse),
            },
            "bigint" => AttributeKind::BigInt,
            "decimal" => AttributeKind::Decimal,
            "double" => AttributeKind::Double,
            "money" => AttributeKind::Money,
            "boolean" => {
                let set = self.option_set.take().unwrap_or_default();
                AttributeKind::Boolean {
                    true_option: set.true_option.map(OptionDto::into_option),
                    false_option: set.false_option.map(OptionDto::into_option),
                }
            }
            "datetime" => AttributeKind::DateTime {
                format: format.and_then(DateFormat::parse),
            },
            "picklist" => AttributeKind::Picklist {
                options: self.options(),
            },
            "multiselectpicklist" => AttributeKind::MultiSelectPicklist {
                options: self.options(),
            },
            "state" => AttributeKind::State {
                options: self.options(),
            },
            "status" => AttributeKind::Status {
                options: self.options(),
            },
            "lookup" => AttributeKind::Lookup {
                targets: self.targets.take().unwrap_or_default(),
            },
            "image" => AttributeKind::Image,
            "file" => AttributeKind::File,
            "uniqueidentifier" => AttributeKind::UniqueIdentifier,
            "entityname" => AttributeKind::EntityName,
            _ => AttributeKind::Other {
                type_name: Some(type_name),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
