//! Format classification for attribute descriptors.
//!
//! [`classify`] turns an attribute's type and sub-fields into the coarse
//! "Dataverse Format" and the finer "Format Details" columns of the report.
//! It is total: types without a dedicated rule fall back to their raw type
//! name. [`render_options`] renders the label/value pairs of choice columns.

use crate::model::{
    AttributeDescriptor, AttributeKind, DateFormat, IntegerFormat, OptionValue, StringFormat,
};

/// Text columns longer than this are reported as multiple lines.
const SINGLE_LINE_MAX_LENGTH: i32 = 100;

/// Two-part format classification of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatClassification {
    pub dataverse_format: String,
    pub format_details: String,
}

impl FormatClassification {
    fn new(dataverse_format: impl Into<String>, format_details: impl Into<String>) -> Self {
        Self {
            dataverse_format: dataverse_format.into(),
            format_details: format_details.into(),
        }
    }
}

/// Classifies an attribute's storage format.
pub fn classify(attr: &AttributeDescriptor) -> FormatClassification {
    classify_kind(&attr.kind)
}

pub fn classify_kind(kind: &AttributeKind) -> FormatClassification {
    match kind {
        AttributeKind::Text {
            format: None,
            max_length,
        } => {
            let details = match max_length {
                Some(len) if *len > SINGLE_LINE_MAX_LENGTH => "Multiple Lines of Text",
                _ => "Single Line of Text",
            };
            FormatClassification::new("String", details)
        }
        AttributeKind::Text {
            format: Some(format),
            ..
        } => FormatClassification::new(format.name(), string_format_details(format)),
        AttributeKind::Memo => FormatClassification::new("Memo", "Multiple Lines of Text"),
        AttributeKind::Integer { format } => {
            let details = match format {
                Some(IntegerFormat::Duration) => "Duration",
                Some(IntegerFormat::TimeZone) => "Time Zone",
                Some(IntegerFormat::Language) => "Language",
                Some(IntegerFormat::Locale) => "Locale",
                Some(IntegerFormat::Other(_)) | None => "Whole Number",
            };
            FormatClassification::new("Integer", details)
        }
        AttributeKind::BigInt => FormatClassification::new("BigInt", "Whole Number (Big Integer)"),
        AttributeKind::Decimal => FormatClassification::new("Decimal", "Decimal Number"),
        AttributeKind::Double => FormatClassification::new("Double", "Floating Point Number"),
        AttributeKind::Money => FormatClassification::new("Money", "Currency"),
        AttributeKind::Boolean { .. } => FormatClassification::new("Boolean", "Yes/No"),
        AttributeKind::DateTime { format } => {
            let details = match format {
                Some(DateFormat::DateOnly) => "Date Only",
                Some(DateFormat::DateAndTime) | None => "Date and Time",
            };
            FormatClassification::new("DateTime", details)
        }
        AttributeKind::Picklist { .. } => FormatClassification::new("Picklist", "Choice"),
        AttributeKind::MultiSelectPicklist { .. } => {
            FormatClassification::new("MultiSelectPicklist", "Choices")
        }
        AttributeKind::Lookup { targets } => {
            let target = targets
                .first()
                .map(String::as_str)
                .filter(|t| !t.is_empty())
                .unwrap_or("Unknown");
            FormatClassification::new("Lookup", format!("Lookup ({target})"))
        }
        AttributeKind::Image => FormatClassification::new("Image", "Image"),
        AttributeKind::File => FormatClassification::new("File", "File"),
        AttributeKind::UniqueIdentifier => {
            FormatClassification::new("UniqueIdentifier", "Unique Identifier")
        }
        AttributeKind::EntityName => FormatClassification::new("EntityName", "Entity Name"),
        AttributeKind::State { .. } | AttributeKind::Status { .. } | AttributeKind::Other { .. } => {
            let raw = kind.type_tag();
            FormatClassification::new(raw, raw)
        }
    }
}

fn string_format_details(format: &StringFormat) -> &str {
    match format {
        StringFormat::Email => "Email",
        StringFormat::Url => "URL",
        StringFormat::Phone => "Phone",
        StringFormat::Text => "Single Line of Text",
        StringFormat::TextArea => "Multiple Lines of Text",
        StringFormat::RichText => "Rich Text",
        StringFormat::Json => "JSON",
        StringFormat::Other(name) => name,
    }
}

/// Renders the options of a choice attribute as `"Label (Value); ..."`.
///
/// Non-choice attributes and empty option sets render as an empty string.
pub fn render_options(kind: &AttributeKind) -> String {
    match kind {
        AttributeKind::Picklist { options }
        | AttributeKind::MultiSelectPicklist { options }
        | AttributeKind::State { options }
        | AttributeKind::Status { options } => join_options(options.iter().map(|o| {
            (
                o.label.clone().unwrap_or_else(|| "Unknown".to_string()),
                o.value
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "Unknown".to_string()),
            )
        })),
        AttributeKind::Boolean {
            true_option,
            false_option,
        } => {
            let entries = [
                true_option.as_ref().map(|o| boolean_entry(o, "True", "1")),
                false_option.as_ref().map(|o| boolean_entry(o, "False", "0")),
            ];
            join_options(entries.into_iter().flatten())
        }
        _ => String::new(),
    }
}

fn boolean_entry(option: &OptionValue, label: &str, value: &str) -> (String, String) {
    (
        option.label.clone().unwrap_or_else(|| label.to_string()),
        option
            .value
            .map(|v| v.to_string())
            .unwrap_or_else(|| value.to_string()),
    )
}

fn join_options(entries: impl Iterator<Item = (String, String)>) -> String {
    entries
        .map(|(label, value)| format!("{label} ({value})"))
        .collect::<Vec<_>>()
        .join("; ")
}
