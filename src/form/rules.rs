use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// A single validation rule. `check` returns `true` when the value satisfies it.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    MinLength(usize),
    Email,
    Pattern(Regex),
}

pub fn required() -> Rule {
    Rule::Required
}

pub fn min_length(len: usize) -> Rule {
    Rule::MinLength(len)
}

pub fn email() -> Rule {
    Rule::Email
}

pub fn pattern(re: &str) -> Result<Rule, regex::Error> {
    Ok(Rule::Pattern(Regex::new(re)?))
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"))
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::MinLength(_) => "minLength",
            Rule::Email => "email",
            Rule::Pattern(_) => "pattern",
        }
    }

    pub fn check(&self, value: &Value) -> bool {
        match self {
            Rule::Required => match value {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Object(fields) => !fields.is_empty(),
                Value::Bool(_) | Value::Number(_) => true,
            },
            Rule::MinLength(len) => match value {
                Value::String(s) => s.chars().count() >= *len,
                Value::Array(items) => items.len() >= *len,
                _ => false,
            },
            Rule::Email => value.as_str().is_some_and(|s| email_regex().is_match(s)),
            Rule::Pattern(re) => value.as_str().is_some_and(|s| re.is_match(s)),
        }
    }
}
