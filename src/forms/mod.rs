//! Declarative intake forms: field descriptors, record parsing, validation
//! and the submission state machine.

pub mod catalog;
pub mod fields;
pub mod submission;
pub mod validation;

use std::collections::BTreeMap;

use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

pub use fields::{
    Control, FieldDescriptor, FieldKind, FieldType, FieldValue, FileHandle, RenderedField,
    SelectOption, SkeletonRender, ValueKind,
};
pub use submission::{FormSubmission, SubmissionState, Submitted};
pub use validation::{Rule, ValidationErrors};

use crate::store::UploadPayload;

/// Values collected from one form, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntakeRecord {
    values: BTreeMap<String, FieldValue>,
}

impl IntakeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn with(mut self, name: &str, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn date(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.get(name) {
            Some(FieldValue::Date(dt)) => Some(*dt),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.get(name), Some(FieldValue::Bool(true)))
    }

    /// Removes a file field and repackages its first file as an upload payload.
    pub fn take_upload(&mut self, name: &str) -> Option<UploadPayload> {
        match self.values.remove(name) {
            Some(FieldValue::Files(files)) => files.into_iter().next().map(|file| UploadPayload {
                blob_file: file.content,
                file_name: file.file_name,
            }),
            Some(other) => {
                self.values.insert(name.to_string(), other);
                None
            }
            None => None,
        }
    }

    /// Document data for the record. File fields are left out.
    pub fn to_data(&self) -> Map<String, Value> {
        self.values
            .iter()
            .filter_map(|(name, value)| {
                let json = match value {
                    FieldValue::Text(s) => Value::String(s.clone()),
                    FieldValue::Bool(b) => Value::Bool(*b),
                    FieldValue::Date(dt) => Value::String(dt.to_rfc3339()),
                    FieldValue::Files(_) => return None,
                };
                Some((name.clone(), json))
            })
            .collect()
    }
}

/// An ordered set of field descriptors with the validation schema bound to it.
#[derive(Debug, Clone)]
pub struct Form {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl Form {
    pub fn new(name: &str, fields: Vec<FieldDescriptor>) -> Self {
        debug_assert!(
            {
                let mut names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
                names.sort_unstable();
                names.windows(2).all(|w| w[0] != w[1])
            },
            "field names must be unique within a form"
        );
        Self {
            name: name.to_string(),
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn render(&self, values: &IntakeRecord) -> Vec<RenderedField> {
        self.fields
            .iter()
            .map(|field| field.render(values.get(&field.name)))
            .collect()
    }

    /// Coerces raw JSON into typed field values. Unknown keys are ignored and
    /// blank text is treated as absent.
    pub fn parse(&self, raw: &Map<String, Value>) -> Result<IntakeRecord, ValidationErrors> {
        let mut record = IntakeRecord::new();
        let mut errors = ValidationErrors::new();

        for field in &self.fields {
            let Some(value) = raw.get(&field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            match parse_value(field.kind.value_kind(), value) {
                Ok(Some(parsed)) => record.insert(&field.name, parsed),
                Ok(None) => {}
                Err(message) => errors.add(&field.name, message),
            }
        }

        errors.into_result().map(|_| record)
    }

    pub fn validate(&self, record: &IntakeRecord) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for field in &self.fields {
            let value = record.get(&field.name);
            if let Some(message) = field.rules.iter().find_map(|rule| rule.check(value)) {
                errors.add(&field.name, message);
            }
        }
        errors.into_result()
    }

    pub fn parse_and_validate(
        &self,
        raw: &Map<String, Value>,
    ) -> Result<IntakeRecord, ValidationErrors> {
        let record = self.parse(raw)?;
        self.validate(&record)?;
        Ok(record)
    }
}

fn parse_value(kind: ValueKind, value: &Value) -> Result<Option<FieldValue>, &'static str> {
    match kind {
        ValueKind::Text => match value {
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => Ok(Some(FieldValue::Text(s.trim().to_string()))),
            _ => Err("Expected text"),
        },
        ValueKind::Bool => value
            .as_bool()
            .map(|b| Some(FieldValue::Bool(b)))
            .ok_or("Expected true or false"),
        ValueKind::Date => match value {
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => parse_date(s.trim())
                .map(|dt| Some(FieldValue::Date(dt)))
                .ok_or("Invalid date"),
            _ => Err("Invalid date"),
        },
        ValueKind::Files => parse_files(value).map(|files| Some(FieldValue::Files(files))),
    }
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Files arrive as `[{"fileName": ..., "content": <base64>}]`.
fn parse_files(value: &Value) -> Result<Vec<FileHandle>, &'static str> {
    let items = value.as_array().ok_or("Invalid file upload")?;
    items
        .iter()
        .map(|item| {
            let file_name = item["fileName"].as_str().filter(|n| !n.is_empty());
            let content = item["content"].as_str();
            match (file_name, content) {
                (Some(file_name), Some(content)) => base64::engine::general_purpose::STANDARD
                    .decode(content)
                    .map(|content| FileHandle {
                        file_name: file_name.to_string(),
                        content,
                    })
                    .map_err(|_| "Invalid file upload"),
                _ => Err("Invalid file upload"),
            }
        })
        .collect()
}
