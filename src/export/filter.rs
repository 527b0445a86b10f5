//! Entity and attribute selection.
//!
//! Decides which (entity, attribute) pairs end up in the report and which
//! selected publisher prefix claims each attribute.
//!
//! Rules, per entity:
//! - a blank prefix matches non-custom entities, a prefix `p` matches names
//!   starting with `p_` (case-insensitive); any match includes the entity
//! - non-custom entities are dropped unless system entities are requested or
//!   the blank prefix is selected
//!
//! Per attribute of an included entity, when only owned attributes are
//! requested: a blank entity prefix keeps unprefixed names, a prefix `p`
//! keeps names starting with `p_`.

use std::convert::Infallible;

use tracing::{debug, info, instrument};

use crate::export::format::{classify, render_options};
use crate::export::traits::{ExportStage, SelectionCriteria};
use crate::model::{AttributeDescriptor, EntityDescriptor, ReportRecord};

/// Platform-owned attribute stems that never count as a publisher prefix.
const SYSTEM_ATTRIBUTE_STEMS: [&str; 6] = [
    "ownerid",
    "owningbusinessunit",
    "owningteam",
    "owninguser",
    "statecode",
    "statuscode",
];

/// Standard audit columns skipped when system attributes are not requested.
const AUDIT_ATTRIBUTES: [&str; 14] = [
    "createdon",
    "createdby",
    "modifiedon",
    "modifiedby",
    "ownerid",
    "statecode",
    "statuscode",
    "versionnumber",
    "importsequencenumber",
    "overriddencreatedon",
    "timezoneruleversionnumber",
    "utcconversiontimezonecode",
    "createdonbehalfby",
    "modifiedonbehalfby",
];

/// Result of a selection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub records: Vec<ReportRecord>,
    pub entities_scanned: usize,
    pub entities_selected: usize,
}

/// Selects the report records for `entities`, in source order.
pub fn select(entities: &[EntityDescriptor], criteria: &SelectionCriteria) -> Vec<ReportRecord> {
    select_with_stats(entities, criteria).records
}

#[instrument(skip_all, fields(entities = entities.len(), prefixes = ?criteria.prefixes()))]
pub fn select_with_stats(entities: &[EntityDescriptor], criteria: &SelectionCriteria) -> Selection {
    let mut selection = Selection {
        entities_scanned: entities.len(),
        ..Selection::default()
    };

    for entity in entities {
        let Some(entity_prefix) = matching_prefix(entity, criteria) else {
            continue;
        };
        selection.entities_selected += 1;

        let before = selection.records.len();
        for attr in &entity.attributes {
            if !criteria.include_system_attributes && is_audit_attribute(&attr.schema_name) {
                continue;
            }
            if criteria.exclude_non_owned_attributes && !is_owned_by(&attr.schema_name, entity_prefix)
            {
                continue;
            }

            let prefix = claiming_prefix(&attr.schema_name, entity_prefix, criteria);
            selection.records.push(build_record(entity, attr, prefix));
        }

        debug!(
            entity = %entity.schema_name,
            prefix = entity_prefix,
            records = selection.records.len() - before,
            "Entity selected"
        );
    }

    info!(
        scanned = selection.entities_scanned,
        selected = selection.entities_selected,
        records = selection.records.len(),
        "Selection completed"
    );
    selection
}

/// First selected prefix matching the entity, or `None` when it is excluded.
fn matching_prefix<'a>(entity: &EntityDescriptor, criteria: &'a SelectionCriteria) -> Option<&'a str> {
    let matched = criteria.prefixes().iter().find(|p| {
        if p.is_empty() {
            !entity.is_custom
        } else {
            has_prefix(&entity.schema_name, p)
        }
    })?;

    if !entity.is_custom && !criteria.include_system_entities && !criteria.selects_out_of_the_box()
    {
        return None;
    }
    Some(matched.as_str())
}

fn is_owned_by(name: &str, entity_prefix: &str) -> bool {
    if entity_prefix.is_empty() {
        !has_any_prefix(name)
    } else {
        has_prefix(name, entity_prefix)
    }
}

/// An attribute keeps its entity's prefix unless its own name carries a
/// different selected prefix, in which case the first such prefix wins.
fn claiming_prefix<'a>(name: &str, entity_prefix: &'a str, criteria: &'a SelectionCriteria) -> &'a str {
    if has_prefix(name, entity_prefix) {
        return entity_prefix;
    }
    criteria
        .prefixes()
        .iter()
        .find(|p| has_prefix(name, p))
        .map_or(entity_prefix, String::as_str)
}

fn build_record(entity: &EntityDescriptor, attr: &AttributeDescriptor, prefix: &str) -> ReportRecord {
    let format = classify(attr);

    if attr.kind.is_choice() {
        debug!(
            attribute = %attr.schema_name,
            options = %render_options(&attr.kind),
            "Choice attribute"
        );
    }

    ReportRecord {
        entity_schema_name: entity.schema_name.clone(),
        entity_display_name: entity.display_name().to_string(),
        attribute_schema_name: attr.schema_name.clone(),
        attribute_display_name: attr.display_name().to_string(),
        attribute_type: attr.kind.type_tag().to_string(),
        dataverse_format: format.dataverse_format,
        format_details: format.format_details,
        attribute_description: attr.description.clone(),
        publisher_prefix: prefix.to_string(),
    }
}

/// `name` starts with `prefix_`, ignoring ASCII case. Blank prefixes never match.
fn has_prefix(name: &str, prefix: &str) -> bool {
    !prefix.is_empty()
        && starts_with_ignore_case(name, prefix)
        && name.as_bytes().get(prefix.len()) == Some(&b'_')
}

/// Whether the name looks publisher-prefixed rather than platform-owned.
fn has_any_prefix(name: &str) -> bool {
    name.contains('_')
        && !SYSTEM_ATTRIBUTE_STEMS
            .iter()
            .any(|stem| starts_with_ignore_case(name, stem))
}

fn is_audit_attribute(name: &str) -> bool {
    AUDIT_ATTRIBUTES.iter().any(|a| a.eq_ignore_ascii_case(name))
}

fn starts_with_ignore_case(name: &str, prefix: &str) -> bool {
    name.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

// ============================================================================
// Pipeline stage
// ============================================================================

/// Selection as a pipeline stage.
#[derive(Debug, Clone)]
pub struct EntityFilter {
    criteria: SelectionCriteria,
}

impl EntityFilter {
    pub fn new(criteria: SelectionCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &SelectionCriteria {
        &self.criteria
    }
}

impl ExportStage for EntityFilter {
    type Input = Vec<EntityDescriptor>;
    type Output = Selection;
    type Error = Infallible;

    fn execute(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        Ok(select_with_stats(&input, &self.criteria))
    }

    fn stage_name(&self) -> &'static str {
        "selection"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeKind;

    fn text_attr(name: &str) -> AttributeDescriptor {
        AttributeDescriptor::new(
            name,
            AttributeKind::Text {
                format: None,
                max_length: Some(100),
            },
        )
    }

    fn entity(name: &str, is_custom: bool, attrs: &[&str]) -> EntityDescriptor {
        EntityDescriptor {
            schema_name: name.to_string(),
            display_label: None,
            is_custom,
            attributes: attrs.iter().map(|a| text_attr(a)).collect(),
        }
    }

    fn names(records: &[ReportRecord]) -> Vec<(&str, &str, &str)> {
        records
            .iter()
            .map(|r| {
                (
                    r.entity_schema_name.as_str(),
                    r.attribute_schema_name.as_str(),
                    r.publisher_prefix.as_str(),
                )
            })
            .collect()
    }

    #[test]
    fn test_has_prefix_requires_separator() {
        assert!(has_prefix("contoso_invoice", "contoso"));
        assert!(has_prefix("Contoso_Invoice", "CONTOSO"));
        assert!(!has_prefix("contosoinvoice", "contoso"));
        assert!(!has_prefix("contoso", "contoso"));
        assert!(!has_prefix("contoso_invoice", ""));
        assert!(!has_prefix("é_x", "e"));
    }

    #[test]
    fn test_has_any_prefix_ignores_system_stems() {
        assert!(!has_any_prefix("name"));
        assert!(!has_any_prefix("owninguser_name"));
        assert!(!has_any_prefix("StateCode_x"));
        assert!(has_any_prefix("contoso_custom"));
        assert!(has_any_prefix("_private"));
    }

    #[test]
    fn test_entity_union_over_prefixes() {
        let entities = vec![
            entity("contoso_invoice", true, &["contoso_amount"]),
            entity("fabrikam_order", true, &["fabrikam_total"]),
            entity("other_thing", true, &["other_x"]),
        ];
        let criteria = SelectionCriteria::new(["contoso", "fabrikam"]);
        let records = select(&entities, &criteria);
        assert_eq!(
            names(&records),
            vec![
                ("contoso_invoice", "contoso_amount", "contoso"),
                ("fabrikam_order", "fabrikam_total", "fabrikam"),
            ]
        );
    }

    #[test]
    fn test_system_entities_excluded_without_blank_prefix() {
        let entities = vec![entity("contoso_systemish", false, &["name"])];

        let criteria = SelectionCriteria::new(["contoso"]);
        assert!(select(&entities, &criteria).is_empty());

        let criteria = SelectionCriteria::new(["contoso"]).with_system_entities(true);
        assert_eq!(select(&entities, &criteria).len(), 1);

        // Blank selection wins for non-custom entities.
        let criteria = SelectionCriteria::new(["contoso", ""]);
        assert_eq!(
            names(&select(&entities, &criteria)),
            vec![("contoso_systemish", "name", "contoso")]
        );
    }

    #[test]
    fn test_blank_prefix_ignores_custom_entities() {
        let entities = vec![
            entity("account", false, &["name"]),
            entity("contoso_invoice", true, &["contoso_amount"]),
        ];
        let criteria = SelectionCriteria::new([""]);
        assert_eq!(names(&select(&entities, &criteria)), vec![("account", "name", "")]);
    }

    #[test]
    fn test_owned_attributes_for_blank_prefix() {
        let entities = vec![entity(
            "account",
            false,
            &["name", "contoso_custom", "ownerid", "statuscode_extra", "fabrikam_x"],
        )];
        let criteria = SelectionCriteria::new([""]).with_owned_attributes_only(true);
        let records = select(&entities, &criteria);
        assert_eq!(
            names(&records),
            vec![
                ("account", "name", ""),
                ("account", "ownerid", ""),
                ("account", "statuscode_extra", ""),
            ]
        );
    }

    #[test]
    fn test_attribute_prefix_overrides_entity_prefix() {
        let entities = vec![
            entity("account", false, &["name", "contoso_custom"]),
            entity("fabrikam_order", true, &["fabrikam_total", "contoso_link", "createdon"]),
        ];
        let criteria = SelectionCriteria::new(["", "fabrikam", "contoso"]);
        let records = select(&entities, &criteria);
        assert_eq!(
            names(&records),
            vec![
                ("account", "name", ""),
                ("account", "contoso_custom", "contoso"),
                ("fabrikam_order", "fabrikam_total", "fabrikam"),
                ("fabrikam_order", "contoso_link", "contoso"),
                ("fabrikam_order", "createdon", "fabrikam"),
            ]
        );
    }

    #[test]
    fn test_audit_attributes_skipped_on_request() {
        let entities = vec![entity(
            "contoso_invoice",
            true,
            &["contoso_amount", "CreatedOn", "modifiedby", "ownerid"],
        )];
        let criteria = SelectionCriteria::new(["contoso"]).with_system_attributes(false);
        assert_eq!(
            names(&select(&entities, &criteria)),
            vec![("contoso_invoice", "contoso_amount", "contoso")]
        );
    }

    #[test]
    fn test_empty_and_malformed_entities() {
        let entities = vec![
            entity("contoso_empty", true, &[]),
            entity("", true, &["contoso_x"]),
            entity("", false, &[""]),
        ];
        let criteria = SelectionCriteria::new(["contoso", ""]);
        let selection = select_with_stats(&entities, &criteria);
        assert_eq!(selection.entities_scanned, 3);
        assert_eq!(selection.entities_selected, 2);
        assert_eq!(names(&selection.records), vec![("", "", "")]);
    }

    #[test]
    fn test_display_names_fall_back() {
        let entities = vec![entity("contoso_invoice", true, &["contoso_amount"])];
        let records = select(&entities, &SelectionCriteria::new(["contoso"]));
        assert_eq!(records[0].entity_display_name, "contoso_invoice");
        assert_eq!(records[0].attribute_display_name, "contoso_amount");
        assert_eq!(records[0].attribute_type, "String");
        assert_eq!(records[0].dataverse_format, "String");
    }

    #[test]
    fn test_stage_execution() {
        let filter = EntityFilter::new(SelectionCriteria::new(["contoso"]));
        let selection = filter
            .execute(vec![entity("contoso_invoice", true, &["contoso_amount"])])
            .unwrap();
        assert_eq!(selection.records.len(), 1);
        assert_eq!(filter.stage_name(), "selection");
    }
}
