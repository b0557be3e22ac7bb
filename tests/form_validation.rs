use quizdesk::form::{email, min_length, pattern, required, validate, FieldRules, Form, Ruleset};
use serde::Serialize;
use serde_json::json;

fn signup() -> Ruleset {
    FieldRules::new()
        .field("username", required())
        .field("email", vec![required(), email()])
        .field("password", vec![required(), min_length(6)])
        .into()
}

#[test]
fn every_declared_rule_is_reported() {
    let result = validate(
        &signup(),
        &json!({ "username": "", "email": "bad", "password": "abc" }),
    );

    assert!(!result.is_valid());
    let password = result.errors().at("password").unwrap();
    assert!(password.failed("minLength"));
    assert!(!password.failed("required"));
    assert_eq!(result.errors().at("email").unwrap().failed_rules(), vec!["email"]);
}

#[test]
fn empty_password_fails_required_and_min_length() {
    let result = validate(
        &signup(),
        &json!({ "username": "kim", "email": "kim@quiz.io", "password": "" }),
    );
    assert_eq!(
        result.errors().at("password").unwrap().failed_rules(),
        vec!["minLength", "required"]
    );
}

#[test]
fn validation_is_pure() {
    let data = json!({ "username": "kim", "email": "kim@quiz", "password": "secret1" });
    let ruleset = signup();
    assert_eq!(validate(&ruleset, &data), validate(&ruleset, &data));
}

#[test]
fn nested_lists_are_validated_per_item() {
    let rules: Ruleset = FieldRules::new()
        .field("options", FieldRules::new().field("label", required()))
        .into();
    let result = validate(
        &rules,
        &json!({ "options": [{ "label": "Lima" }, { "label": " " }, {}] }),
    );

    assert!(!result.failed("options.0.label", "required"));
    assert!(result.failed("options.1.label", "required"));
    assert!(result.failed("options.2.label", "required"));
}

#[test]
fn pattern_rules_match_strings_only() {
    let rules: Ruleset = FieldRules::new()
        .field("right", pattern("^[1-4]$").unwrap())
        .into();
    assert!(validate(&rules, &json!({ "right": "3" })).is_valid());
    assert!(!validate(&rules, &json!({ "right": "5" })).is_valid());
    assert!(!validate(&rules, &json!({ "right": 3 })).is_valid());
}

#[derive(Serialize)]
struct Login<'a> {
    email: &'a str,
    password: &'a str,
}

#[test]
fn form_keeps_last_result_until_reset() {
    let mut form = Form::new(FieldRules::new().field("email", email()));
    assert!(form.form().is_none());

    let result = form.validate_fields(&Login {
        email: "nope",
        password: "",
    });
    assert_eq!(form.form(), Some(&result));
    assert!(result.failed("email", "email"));

    form.reset();
    assert!(form.form().is_none());
}
