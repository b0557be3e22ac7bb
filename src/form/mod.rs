//! Declarative form validation.
//!
//! A [`Ruleset`] mirrors the shape of the data it validates. Applying it
//! produces a [`FormResult`] whose errors mirror the same shape, down to a
//! map of rule name to "failed" flag for every declared field.

pub mod rules;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

pub use rules::{email, min_length, pattern, required, Rule};

#[derive(Debug, Clone)]
pub enum Ruleset {
    Rules(Vec<Rule>),
    Fields(FieldRules),
}

#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    fields: Vec<(String, Ruleset)>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rules: impl Into<Ruleset>) -> Self {
        self.fields.push((name.into(), rules.into()));
        self
    }
}

impl From<Rule> for Ruleset {
    fn from(rule: Rule) -> Self {
        Ruleset::Rules(vec![rule])
    }
}

impl From<Vec<Rule>> for Ruleset {
    fn from(rules: Vec<Rule>) -> Self {
        Ruleset::Rules(rules)
    }
}

impl From<FieldRules> for Ruleset {
    fn from(fields: FieldRules) -> Self {
        Ruleset::Fields(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldErrors {
    Rules(BTreeMap<String, bool>),
    Fields(BTreeMap<String, FieldErrors>),
    Items(Vec<FieldErrors>),
}

impl FieldErrors {
    /// Whether `rule` failed on this node. Always false for composite nodes.
    pub fn failed(&self, rule: &str) -> bool {
        match self {
            FieldErrors::Rules(rules) => rules.get(rule).copied().unwrap_or(false),
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldErrors> {
        match self {
            FieldErrors::Fields(fields) => fields.get(key),
            FieldErrors::Items(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            FieldErrors::Rules(_) => None,
        }
    }

    /// Looks up a dotted path such as `options.2.label`. An empty path is `self`.
    pub fn at(&self, path: &str) -> Option<&FieldErrors> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.get(segment))
    }

    pub fn has_failures(&self) -> bool {
        match self {
            FieldErrors::Rules(rules) => rules.values().any(|failed| *failed),
            FieldErrors::Fields(fields) => fields.values().any(FieldErrors::has_failures),
            FieldErrors::Items(items) => items.iter().any(FieldErrors::has_failures),
        }
    }

    pub fn failed_rules(&self) -> Vec<&str> {
        match self {
            FieldErrors::Rules(rules) => rules
                .iter()
                .filter(|(_, failed)| **failed)
                .map(|(name, _)| name.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResult {
    is_valid: bool,
    errors: FieldErrors,
}

impl FormResult {
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn failed(&self, path: &str, rule: &str) -> bool {
        self.errors.at(path).is_some_and(|node| node.failed(rule))
    }
}

pub fn validate(ruleset: &Ruleset, data: &Value) -> FormResult {
    let errors = apply(ruleset, Some(data));
    FormResult {
        is_valid: !errors.has_failures(),
        errors,
    }
}

fn apply(ruleset: &Ruleset, value: Option<&Value>) -> FieldErrors {
    match ruleset {
        Ruleset::Rules(rules) => {
            let mut failures = BTreeMap::new();
            for rule in rules {
                let failed = !value.is_some_and(|value| rule.check(value));
                *failures.entry(rule.name().to_owned()).or_insert(false) |= failed;
            }
            FieldErrors::Rules(failures)
        }
        Ruleset::Fields(fields) => match value {
            Some(Value::Array(items)) => {
                FieldErrors::Items(items.iter().map(|item| apply(ruleset, Some(item))).collect())
            }
            Some(Value::Object(object)) => FieldErrors::Fields(
                fields
                    .fields
                    .iter()
                    .map(|(name, rules)| (name.clone(), apply(rules, object.get(name))))
                    .collect(),
            ),
            _ => FieldErrors::Fields(
                fields
                    .fields
                    .iter()
                    .map(|(name, rules)| (name.clone(), apply(rules, None)))
                    .collect(),
            ),
        },
    }
}

#[derive(Debug, Clone)]
pub struct Form {
    ruleset: Ruleset,
    current: Option<FormResult>,
}

impl Form {
    pub fn new(ruleset: impl Into<Ruleset>) -> Self {
        Self {
            ruleset: ruleset.into(),
            current: None,
        }
    }

    pub fn validate(&mut self, data: &Value) -> FormResult {
        let result = validate(&self.ruleset, data);
        self.current = Some(result.clone());
        result
    }

    /// Validates any serialisable value; one that fails to serialise counts as null.
    pub fn validate_fields<T: Serialize>(&mut self, data: &T) -> FormResult {
        let value = serde_json::to_value(data).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "form data is not serialisable, validating as null");
            Value::Null
        });
        self.validate(&value)
    }

    pub fn form(&self) -> Option<&FormResult> {
        self.current.as_ref()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn signup() -> Ruleset {
        FieldRules::new()
            .field("username", required())
            .field("email", vec![required(), email()])
            .field("password", vec![required(), min_length(6)])
            .into()
    }

    #[test]
    fn signup_with_bad_fields_reports_each_failure() {
        let result = validate(
            &signup(),
            &json!({ "username": "", "email": "bad", "password": "abc" }),
        );

        assert!(!result.is_valid());
        assert!(result.failed("username", "required"));
        assert!(result.failed("email", "email"));
        assert!(!result.failed("email", "required"));
        assert!(result.failed("password", "minLength"));
        assert!(!result.failed("password", "required"));
    }

    #[test]
    fn empty_field_fails_every_rule() {
        let result = validate(&signup(), &json!({ "username": "a", "email": "", "password": "" }));

        assert!(result.failed("password", "required"));
        assert!(result.failed("password", "minLength"));
        assert!(result.failed("email", "required"));
        assert!(result.failed("email", "email"));
    }

    #[test]
    fn absent_or_malformed_fields_fail_all_rules() {
        let result = validate(&signup(), &json!({ "email": 42 }));
        assert!(result.failed("username", "required"));
        assert!(result.failed("email", "email"));
        assert!(result.failed("password", "minLength"));

        let result = validate(&signup(), &json!("not an object"));
        assert_eq!(
            result.errors().at("password").map(FieldErrors::failed_rules),
            Some(vec!["minLength", "required"])
        );
    }

    #[test]
    fn validation_is_repeatable() {
        let data = json!({ "username": "kim", "email": "kim@quiz.io", "password": "secret1" });
        let first = validate(&signup(), &data);
        let second = validate(&signup(), &data);
        assert!(first.is_valid());
        assert_eq!(first, second);
    }

    #[test]
    fn nested_rules_apply_per_item() {
        let ruleset: Ruleset = FieldRules::new()
            .field("label", required())
            .field("options", FieldRules::new().field("label", required()))
            .into();

        let result = validate(
            &ruleset,
            &json!({ "label": "2 + 2?", "options": [{ "label": "4" }, { "label": "" }, {}] }),
        );

        assert!(!result.is_valid());
        assert!(!result.failed("options.0.label", "required"));
        assert!(result.failed("options.1.label", "required"));
        assert!(result.failed("options.2.label", "required"));
        assert!(result.errors().at("options.3").is_none());
    }

    #[test]
    fn bare_rules_validate_a_scalar() {
        let mut form = Form::new(required());
        assert!(!form.validate(&json!("")).is_valid());
        assert!(form.form().is_some_and(|r| r.errors().failed("required")));

        assert!(form.validate(&json!("Geography")).is_valid());
        form.reset();
        assert!(form.form().is_none());
    }

    #[test]
    fn serialisable_data_is_validated_by_field_name() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Draft {
            right_answer: String,
        }

        let mut form = Form::new(FieldRules::new().field("rightAnswer", required()));
        let result = form.validate_fields(&Draft {
            right_answer: String::new(),
        });
        assert!(result.failed("rightAnswer", "required"));
    }
}
