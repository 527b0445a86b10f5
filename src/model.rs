use serde::{Deserialize, Serialize};

/// A table definition as reported by the metadata source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub schema_name: String,
    pub display_label: Option<String>,
    pub is_custom: bool,
    pub attributes: Vec<AttributeDescriptor>,
}

impl EntityDescriptor {
    /// Display label, falling back to the schema name when the source has none.
    pub fn display_name(&self) -> &str {
        non_blank(self.display_label.as_deref()).unwrap_or(&self.schema_name)
    }
}

/// A column definition belonging to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub schema_name: String,
    pub display_label: Option<String>,
    pub description: String,
    pub kind: AttributeKind,
}

impl AttributeDescriptor {
    pub fn new(schema_name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            schema_name: schema_name.into(),
            display_label: None,
            description: String::new(),
            kind,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.display_label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Display label, falling back to the schema name when the source has none.
    pub fn display_name(&self) -> &str {
        non_blank(self.display_label.as_deref()).unwrap_or(&self.schema_name)
    }
}

/// Attribute type with only the sub-fields relevant to that type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    Text {
        format: Option<StringFormat>,
        max_length: Option<i32>,
    },
    Memo,
    Integer {
        format: Option<IntegerFormat>,
    },
    BigInt,
    Decimal,
    Double,
    Money,
    Boolean {
        true_option: Option<OptionValue>,
        false_option: Option<OptionValue>,
    },
    DateTime {
        format: Option<DateFormat>,
    },
    Picklist {
        options: Vec<OptionValue>,
    },
    MultiSelectPicklist {
        options: Vec<OptionValue>,
    },
    State {
        options: Vec<OptionValue>,
    },
    Status {
        options: Vec<OptionValue>,
    },
    Lookup {
        targets: Vec<String>,
    },
    Image,
    File,
    UniqueIdentifier,
    EntityName,
    /// Anything the exporter has no dedicated rule for; keeps the raw type name.
    Other {
        type_name: Option<String>,
    },
}

impl AttributeKind {
    /// The raw type tag as the platform names it.
    pub fn type_tag(&self) -> &str {
        match self {
            Self::Text { .. } => "String",
            Self::Memo => "Memo",
            Self::Integer { .. } => "Integer",
            Self::BigInt => "BigInt",
            Self::Decimal => "Decimal",
            Self::Double => "Double",
            Self::Money => "Money",
            Self::Boolean { .. } => "Boolean",
            Self::DateTime { .. } => "DateTime",
            Self::Picklist { .. } => "Picklist",
            Self::MultiSelectPicklist { .. } => "MultiSelectPicklist",
            Self::State { .. } => "State",
            Self::Status { .. } => "Status",
            Self::Lookup { .. } => "Lookup",
            Self::Image => "Image",
            Self::File => "File",
            Self::UniqueIdentifier => "UniqueIdentifier",
            Self::EntityName => "EntityName",
            Self::Other { type_name } => non_blank(type_name.as_deref()).unwrap_or("Unknown"),
        }
    }

    /// Whether the attribute holds enumerated choice values.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            Self::Boolean { .. }
                | Self::Picklist { .. }
                | Self::MultiSelectPicklist { .. }
                | Self::State { .. }
                | Self::Status { .. }
        )
    }
}

/// Sub-format of a text attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringFormat {
    Email,
    Url,
    Phone,
    Text,
    TextArea,
    RichText,
    Json,
    Other(String),
}

impl StringFormat {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "email" => Self::Email,
            "url" => Self::Url,
            "phone" => Self::Phone,
            "text" => Self::Text,
            "textarea" => Self::TextArea,
            "richtext" => Self::RichText,
            "json" => Self::Json,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Email => "Email",
            Self::Url => "Url",
            Self::Phone => "Phone",
            Self::Text => "Text",
            Self::TextArea => "TextArea",
            Self::RichText => "RichText",
            Self::Json => "Json",
            Self::Other(name) => name,
        }
    }
}

/// Sub-format of a whole-number attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegerFormat {
    Duration,
    TimeZone,
    Language,
    Locale,
    Other(String),
}

impl IntegerFormat {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "duration" => Self::Duration,
            "timezone" => Self::TimeZone,
            "language" => Self::Language,
            "locale" => Self::Locale,
            _ => Self::Other(raw.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    DateAndTime,
    DateOnly,
}

impl DateFormat {
    /// Unknown date formats yield `None` and are reported as date and time.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dateandtime" => Some(Self::DateAndTime),
            "dateonly" => Some(Self::DateOnly),
            _ => None,
        }
    }
}

/// One label/value pair of an option set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValue {
    pub label: Option<String>,
    pub value: Option<i32>,
}

impl OptionValue {
    pub fn new(label: impl Into<String>, value: i32) -> Self {
        Self {
            label: Some(label.into()),
            value: Some(value),
        }
    }
}

/// One output row of the CSV report.
///
/// Field order is the column order of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRecord {
    #[serde(rename = "Entity Schema Name")]
    pub entity_schema_name: String,
    #[serde(rename = "Entity Display Name")]
    pub entity_display_name: String,
    #[serde(rename = "Attribute Schema Name")]
    pub attribute_schema_name: String,
    #[serde(rename = "Attribute Display Name")]
    pub attribute_display_name: String,
    #[serde(rename = "Attribute Type")]
    pub attribute_type: String,
    #[serde(rename = "Dataverse Format")]
    pub dataverse_format: String,
    #[serde(rename = "Format Details")]
    pub format_details: String,
    #[serde(rename = "Attribute Description")]
    pub attribute_description: String,
    /// Selection prefix that claims the attribute; empty for out-of-the-box.
    #[serde(rename = "Publisher Prefix")]
    pub publisher_prefix: String,
}

/// Column headers of the report, in output order.
pub const REPORT_HEADERS: [&str; 9] = [
    "Entity Schema Name",
    "Entity Display Name",
    "Attribute Schema Name",
    "Attribute Display Name",
    "Attribute Type",
    "Dataverse Format",
    "Format Details",
    "Attribute Description",
    "Publisher Prefix",
];

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_schema_name() {
        let entity = EntityDescriptor {
            schema_name: "contoso_invoice".to_string(),
            display_label: None,
            is_custom: true,
            attributes: vec![],
        };
        assert_eq!(entity.display_name(), "contoso_invoice");

        let attr = AttributeDescriptor::new("contoso_amount", AttributeKind::Money).with_label("  ");
        assert_eq!(attr.display_name(), "contoso_amount");

        let attr = attr.with_label("Amount");
        assert_eq!(attr.display_name(), "Amount");
    }

    #[test]
    fn test_type_tag_for_other() {
        let kind = AttributeKind::Other {
            type_name: Some("Virtual".to_string()),
        };
        assert_eq!(kind.type_tag(), "Virtual");

        let kind = AttributeKind::Other { type_name: None };
        assert_eq!(kind.type_tag(), "Unknown");
    }

    #[test]
    fn test_sub_format_parsing_is_case_insensitive() {
        assert_eq!(StringFormat::parse("TEXTAREA"), StringFormat::TextArea);
        assert_eq!(
            StringFormat::parse("TickerSymbol"),
            StringFormat::Other("TickerSymbol".to_string())
        );
        assert_eq!(IntegerFormat::parse("timezone"), IntegerFormat::TimeZone);
        assert_eq!(DateFormat::parse("DateOnly"), Some(DateFormat::DateOnly));
        assert_eq!(DateFormat::parse("Inactive"), None);
    }

    #[test]
    fn test_csv_header_follows_field_order() {
        let record = ReportRecord {
            entity_schema_name: "a".to_string(),
            entity_display_name: "b".to_string(),
            attribute_schema_name: "c".to_string(),
            attribute_display_name: "d".to_string(),
            attribute_type: "e".to_string(),
            dataverse_format: "f".to_string(),
            format_details: "g".to_string(),
            attribute_description: "h".to_string(),
            publisher_prefix: "i".to_string(),
        };
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&record).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(REPORT_HEADERS.join(",").as_str()));
        assert_eq!(lines.next(), Some("a,b,c,d,e,f,g,h,i"));
    }
}
