use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::validation::Rule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Input,
    Textarea,
    PhoneInput,
    Checkbox,
    DatePicker,
    Select,
    Skeleton,
}

/// The shape a field's value is parsed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Bool,
    Date,
    Files,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl SelectOption {
    pub fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Icon {
    pub src: String,
    pub alt: String,
}

/// A file received through an upload field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHandle {
    pub file_name: String,
    #[serde(skip)]
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Date(DateTime<Utc>),
    Files(Vec<FileHandle>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Files(files) => files.is_empty(),
            FieldValue::Bool(_) | FieldValue::Date(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// The control a field renders to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum Control {
    TextInput {
        placeholder: Option<String>,
        icon: Option<Icon>,
        value: String,
    },
    TextArea {
        placeholder: Option<String>,
        value: String,
    },
    PhoneInput {
        default_country: String,
        international: bool,
        placeholder: Option<String>,
        value: String,
    },
    Checkbox {
        label: String,
        checked: bool,
    },
    DatePicker {
        show_time_select: bool,
        date_format: String,
        value: Option<DateTime<Utc>>,
    },
    Select {
        placeholder: Option<String>,
        options: Vec<SelectOption>,
        selected: Option<String>,
    },
    RadioGroup {
        options: Vec<SelectOption>,
        selected: Option<String>,
    },
    FileUpload {
        files: Vec<String>,
    },
}

pub type RenderFn = dyn Fn(&FieldDescriptor, Option<&FieldValue>) -> Control + Send + Sync;

/// Caller-supplied rendering for fields outside the built-in set.
#[derive(Clone)]
pub struct SkeletonRender {
    render: Arc<RenderFn>,
    value_kind: ValueKind,
}

impl SkeletonRender {
    pub fn new<F>(value_kind: ValueKind, render: F) -> Self
    where
        F: Fn(&FieldDescriptor, Option<&FieldValue>) -> Control + Send + Sync + 'static,
    {
        Self {
            render: Arc::new(render),
            value_kind,
        }
    }
}

impl fmt::Debug for SkeletonRender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkeletonRender")
            .field("value_kind", &self.value_kind)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Input,
    Textarea,
    PhoneInput,
    Checkbox,
    DatePicker {
        show_time_select: bool,
        date_format: String,
    },
    Select {
        options: Vec<SelectOption>,
    },
    Skeleton(SkeletonRender),
}

impl FieldKind {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::Input => FieldType::Input,
            FieldKind::Textarea => FieldType::Textarea,
            FieldKind::PhoneInput => FieldType::PhoneInput,
            FieldKind::Checkbox => FieldType::Checkbox,
            FieldKind::DatePicker { .. } => FieldType::DatePicker,
            FieldKind::Select { .. } => FieldType::Select,
            FieldKind::Skeleton(_) => FieldType::Skeleton,
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldKind::Checkbox => ValueKind::Bool,
            FieldKind::DatePicker { .. } => ValueKind::Date,
            FieldKind::Skeleton(skeleton) => skeleton.value_kind,
            _ => ValueKind::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub icon: Option<Icon>,
    pub kind: FieldKind,
    pub rules: Vec<Rule>,
}

impl FieldDescriptor {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            placeholder: None,
            icon: None,
            kind,
            rules: Vec::new(),
        }
    }

    pub fn input(name: &str) -> Self {
        Self::new(name, FieldKind::Input)
    }

    pub fn textarea(name: &str) -> Self {
        Self::new(name, FieldKind::Textarea)
    }

    pub fn phone(name: &str) -> Self {
        Self::new(name, FieldKind::PhoneInput)
    }

    pub fn checkbox(name: &str) -> Self {
        Self::new(name, FieldKind::Checkbox)
    }

    pub fn date_picker(name: &str, show_time_select: bool, date_format: &str) -> Self {
        Self::new(
            name,
            FieldKind::DatePicker {
                show_time_select,
                date_format: date_format.to_string(),
            },
        )
    }

    /// Select fields reject values outside their option list.
    pub fn select(name: &str, options: Vec<SelectOption>) -> Self {
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        let one_of = Rule::one_of(&values, "Select a valid option");
        Self::new(name, FieldKind::Select { options }).rule(one_of)
    }

    pub fn skeleton(name: &str, render: SkeletonRender) -> Self {
        Self::new(name, FieldKind::Skeleton(render))
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn icon(mut self, src: &str, alt: &str) -> Self {
        self.icon = Some(Icon {
            src: src.to_string(),
            alt: alt.to_string(),
        });
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    pub fn render(&self, value: Option<&FieldValue>) -> RenderedField {
        let text = || value.and_then(FieldValue::as_text).unwrap_or_default().to_string();

        let control = match &self.kind {
            FieldKind::Input => Control::TextInput {
                placeholder: self.placeholder.clone(),
                icon: self.icon.clone(),
                value: text(),
            },
            FieldKind::Textarea => Control::TextArea {
                placeholder: self.placeholder.clone(),
                value: text(),
            },
            FieldKind::PhoneInput => Control::PhoneInput {
                default_country: "US".to_string(),
                international: true,
                placeholder: self.placeholder.clone(),
                value: text(),
            },
            FieldKind::Checkbox => Control::Checkbox {
                label: self.label.clone().unwrap_or_default(),
                checked: matches!(value, Some(FieldValue::Bool(true))),
            },
            FieldKind::DatePicker {
                show_time_select,
                date_format,
            } => Control::DatePicker {
                show_time_select: *show_time_select,
                date_format: date_format.clone(),
                value: match value {
                    Some(FieldValue::Date(dt)) => Some(*dt),
                    _ => None,
                },
            },
            FieldKind::Select { options } => Control::Select {
                placeholder: self.placeholder.clone(),
                options: options.clone(),
                selected: value.and_then(FieldValue::as_text).map(str::to_string),
            },
            FieldKind::Skeleton(skeleton) => (skeleton.render)(self, value),
        };

        RenderedField {
            name: self.name.clone(),
            field_type: self.field_type(),
            // Checkboxes carry their label inside the control.
            label: match self.kind {
                FieldKind::Checkbox => None,
                _ => self.label.clone(),
            },
            control,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedField {
    pub name: String,
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub control: Control,
}
