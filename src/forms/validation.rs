use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::FieldValue;

// Dots only between local-part runs; domain labels start alphanumeric.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9_'+\-]+(?:\.[A-Za-z0-9_'+\-]+)*@(?:[A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$",
    )
    .expect("email pattern compiles")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[0-9]{10,15}$").expect("phone pattern compiles"));

/// A single constraint on a field's value. Every rule except `Required` and
/// `Accepted` passes when the field is absent.
#[derive(Debug, Clone)]
pub enum Rule {
    Required(String),
    MinLength(usize, String),
    MaxLength(usize, String),
    Pattern(Regex, String),
    OneOf(Vec<String>, String),
    Accepted(String),
}

impl Rule {
    pub fn required() -> Self {
        Rule::Required("Required".to_string())
    }

    pub fn min_length(n: usize, message: &str) -> Self {
        Rule::MinLength(n, message.to_string())
    }

    pub fn max_length(n: usize, message: &str) -> Self {
        Rule::MaxLength(n, message.to_string())
    }

    pub fn pattern(regex: Regex, message: &str) -> Self {
        Rule::Pattern(regex, message.to_string())
    }

    pub fn email() -> Self {
        Rule::pattern(EMAIL_RE.clone(), "Invalid email address")
    }

    /// `+` followed by 10 to 15 digits.
    pub fn phone() -> Self {
        Rule::pattern(PHONE_RE.clone(), "Invalid phone number")
    }

    pub fn one_of<S: AsRef<str>>(values: &[S], message: &str) -> Self {
        Rule::OneOf(
            values.iter().map(|v| v.as_ref().to_string()).collect(),
            message.to_string(),
        )
    }

    pub fn accepted(message: &str) -> Self {
        Rule::Accepted(message.to_string())
    }

    /// Returns the rule's message when `value` violates it.
    pub fn check(&self, value: Option<&FieldValue>) -> Option<&str> {
        let failed = match (self, value) {
            (Rule::Required(_), None) => true,
            (Rule::Required(_), Some(v)) => v.is_empty(),
            (Rule::Accepted(_), v) => !matches!(v, Some(FieldValue::Bool(true))),
            (_, None) => false,
            (Rule::MinLength(n, _), Some(FieldValue::Text(s))) => s.chars().count() < *n,
            (Rule::MaxLength(n, _), Some(FieldValue::Text(s))) => s.chars().count() > *n,
            (Rule::Pattern(regex, _), Some(FieldValue::Text(s))) => !regex.is_match(s),
            (Rule::OneOf(values, _), Some(FieldValue::Text(s))) => !values.iter().any(|v| v == s),
            // Length and format rules only constrain text.
            (_, Some(_)) => false,
        };
        failed.then(|| self.message())
    }

    fn message(&self) -> &str {
        match self {
            Rule::Required(m)
            | Rule::MinLength(_, m)
            | Rule::MaxLength(_, m)
            | Rule::Pattern(_, m)
            | Rule::OneOf(_, m)
            | Rule::Accepted(m) => m,
        }
    }
}

/// Field-level validation failures, keyed by field name. One message per field.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the first message reported for a field.
    pub fn add(&mut self, field: &str, message: &str) {
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn passes(rule: &Rule, s: &str) -> bool {
        rule.check(Some(&text(s))).is_none()
    }

    #[test]
    fn test_phone_format() {
        let phone = Rule::phone();
        assert!(passes(&phone, "+15551234567"));
        assert!(passes(&phone, "+441234567890123"));
        assert!(!passes(&phone, "5551234567"));
        assert!(!passes(&phone, "+1555"));
        assert!(!passes(&phone, "+1555123456a"));
        assert!(!passes(&phone, "+1234567890123456"));
        assert!(!passes(&phone, "+1555 123 4567"));
    }

    #[test]
    fn test_email_format() {
        let email = Rule::email();
        assert!(passes(&email, "jane@example.com"));
        assert!(passes(&email, "jane.doe+clinic@mail.example.co.uk"));
        assert!(!passes(&email, "jane.example.com"));
        assert!(!passes(&email, "@example.com"));
        assert!(!passes(&email, "jane@example"));
        assert!(!passes(&email, "jane doe@example.com"));
        assert_eq!(email.check(Some(&text("nope"))), Some("Invalid email address"));
    }

    #[test]
    fn test_email_rejects_malformed_dots_and_domains() {
        let email = Rule::email();
        assert!(!passes(&email, "jane@example..com"));
        assert!(!passes(&email, "jane@example.c"));
        assert!(!passes(&email, "jane..doe@example.com"));
        assert!(!passes(&email, ".jane@example.com"));
        assert!(!passes(&email, "jane.@example.com"));
        assert!(!passes(&email, "jane@-example.com"));
    }

    #[test]
    fn test_custom_pattern() {
        let rule = Rule::pattern(Regex::new(r"^[A-Z]{3}[0-9]+$").unwrap(), "Invalid policy number");
        assert!(passes(&rule, "ABC123"));
        assert_eq!(rule.check(Some(&text("abc"))), Some("Invalid policy number"));
        assert_eq!(rule.check(None), None);
    }

    #[test]
    fn test_optional_rules_pass_when_absent() {
        let rule = Rule::min_length(2, "too short");
        assert_eq!(rule.check(None), None);
        assert_eq!(rule.check(Some(&text("a"))), Some("too short"));
        assert_eq!(rule.check(Some(&text("ab"))), None);
    }

    #[test]
    fn test_required_and_accepted() {
        assert_eq!(Rule::required().check(None), Some("Required"));
        assert_eq!(Rule::required().check(Some(&FieldValue::Files(vec![]))), Some("Required"));

        let consent = Rule::accepted("must consent");
        assert_eq!(consent.check(None), Some("must consent"));
        assert_eq!(consent.check(Some(&FieldValue::Bool(false))), Some("must consent"));
        assert_eq!(consent.check(Some(&FieldValue::Bool(true))), None);
    }

    #[test]
    fn test_errors_keep_first_message() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "first");
        errors.add("name", "second");
        assert_eq!(errors.get("name"), Some("first"));
        assert_eq!(errors.to_string(), "name: first");
        assert!(errors.into_result().is_err());
    }
}
