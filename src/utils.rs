// This file is part of the terraform-provider-edge project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::borrow::Cow;
use std::ops::RangeInclusive;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueBool, ValueList, ValueNumber, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::error::Error;

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

pub(crate) trait WithValidate {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

/// Validate every known item of a list of blocks
pub(crate) fn validate_list<T: WithValidate>(
    diags: &mut Diagnostics,
    list: &ValueList<Value<T>>,
    attr_path: AttributePath,
) {
    for (i, item) in list.iter().flatten().enumerate() {
        if let Value::Value(item) = item {
            item.validate(diags, attr_path.clone().index(i as i64));
        }
    }
}

/// `Some(())` if no error has been recorded
pub(crate) fn no_errors(diags: &Diagnostics) -> Option<()> {
    if diags.errors.is_empty() {
        Some(())
    } else {
        None
    }
}

/// Record an error for a string attribute that must be given and not empty
pub(crate) fn check_not_empty(diags: &mut Diagnostics, value: &ValueString, attr_path: AttributePath) {
    match value {
        Value::Value(s) if s.is_empty() => {
            diags.error_short(format!("`{attr_path}` should not be empty"), attr_path)
        }
        Value::Null => diags.error_short(format!("`{attr_path}` should not be null"), attr_path),
        _ => (),
    }
}

/// Record an error if a known string is not one of the allowed values
pub(crate) fn check_one_of(
    diags: &mut Diagnostics,
    value: &ValueString,
    allowed: &[&str],
    attr_path: AttributePath,
) {
    if let Value::Value(s) = value {
        if !allowed.contains(&s.as_ref()) {
            diags.error(
                format!("Invalid `{attr_path}`"),
                format!("`{s}` is not one of: {}", allowed.join(", ")),
                attr_path,
            );
        }
    }
}

/// Record an error if a known number is outside the range
pub(crate) fn check_range(
    diags: &mut Diagnostics,
    value: &ValueNumber,
    range: RangeInclusive<i64>,
    attr_path: AttributePath,
) {
    if let Value::Value(n) = value {
        if !range.contains(n) {
            diags.error(
                format!("Invalid `{attr_path}`"),
                format!(
                    "{n} is out of range, it should be between {} and {}",
                    range.start(),
                    range.end()
                ),
                attr_path,
            );
        }
    }
}

/// Report a client error as a root error
pub(crate) fn report(diags: &mut Diagnostics, summary: &'static str, err: Error) {
    diags.root_error(summary, err.to_string());
}

/// Turn a client result into an option, reporting the error
pub(crate) fn or_report<T>(
    diags: &mut Diagnostics,
    summary: &'static str,
    result: Result<T, Error>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            report(diags, summary, err);
            None
        }
    }
}

/// Push `attr_path` into `triggers` when the attribute changed between two states
pub(crate) fn replace_on_change<T: PartialEq>(
    triggers: &mut Vec<AttributePath>,
    prior: &T,
    proposed: &T,
    name: &'static str,
) {
    if prior != proposed {
        triggers.push(AttributePath::new(name));
    }
}

/// Replace a null value by its default, unknown values are kept
pub(crate) fn set_default<T>(value: &mut Value<T>, default: T) {
    if value.is_null() {
        *value = Value::Value(default);
    }
}

/// Known number, or the given default
pub(crate) fn number_or(value: &ValueNumber, default: i64) -> i64 {
    value.as_ref_option().copied().unwrap_or(default)
}

/// Known boolean, or the given default
pub(crate) fn bool_or(value: &ValueBool, default: bool) -> bool {
    value.as_ref_option().copied().unwrap_or(default)
}

/// Known string content, or the given default
pub(crate) fn string_or<'b>(value: &'b ValueString, default: &'b str) -> &'b str {
    value.as_deref_option().unwrap_or(default)
}

/// Known string content as an owned optional
pub(crate) fn opt_string(value: &ValueString) -> Option<String> {
    value.as_deref_option().map(str::to_owned)
}

/// Non empty string from the API, or null
pub(crate) fn string_value<'a>(value: impl Into<String>) -> ValueString<'a> {
    let value = value.into();
    if value.is_empty() {
        Value::Null
    } else {
        Value::Value(Cow::Owned(value))
    }
}

/// Optional string from the API
pub(crate) fn optional_string<'a>(value: Option<String>) -> ValueString<'a> {
    value.map(Cow::Owned).into()
}

/// Known items of a list of strings
pub(crate) fn list_strings(value: &ValueList<ValueString>) -> Vec<String> {
    value
        .iter()
        .flatten()
        .filter_map(|s| s.as_deref_option().map(str::to_owned))
        .collect()
}

/// Build a Terraform list of strings
pub(crate) fn strings_list<'a, I>(items: I) -> ValueList<ValueString<'a>>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    Value::Value(
        items
            .into_iter()
            .map(|s| Value::Value(Cow::Owned(s.into())))
            .collect(),
    )
}

/// List of strings from the API
///
/// An empty list is null, unless the prior attribute was set to a list.
pub(crate) fn strings_or_null<'a>(
    items: &[String],
    prior: Option<&ValueList<ValueString>>,
) -> ValueList<ValueString<'a>> {
    if items.is_empty() && !matches!(prior, Some(Value::Value(_))) {
        Value::Null
    } else {
        strings_list(items.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_rejected() {
        let mut diags = Diagnostics::default();
        check_not_empty(&mut diags, &Value::Value("".into()), AttributePath::new("domain"));
        check_not_empty(&mut diags, &Value::Null, AttributePath::new("name"));
        check_not_empty(&mut diags, &Value::Unknown, AttributePath::new("other"));
        check_not_empty(&mut diags, &"ok".into(), AttributePath::new("fine"));
        assert_eq!(diags.errors.len(), 2);
        assert_eq!(diags.errors[0].attribute, AttributePath::new("domain"));
    }

    #[test]
    fn one_of_ignores_unknown() {
        let mut diags = Diagnostics::default();
        check_one_of(&mut diags, &Value::Unknown, &["a"], AttributePath::new("x"));
        check_one_of(&mut diags, &"b".into(), &["a", "b"], AttributePath::new("x"));
        assert!(diags.errors.is_empty());
        check_one_of(&mut diags, &"c".into(), &["a", "b"], AttributePath::new("x"));
        assert_eq!(diags.errors.len(), 1);
        assert!(diags.errors[0].detail.starts_with("`c` is not one of: a, b"));
    }

    #[test]
    fn range_is_inclusive() {
        let mut diags = Diagnostics::default();
        check_range(&mut diags, &Value::Value(0), 0..=10, AttributePath::new("n"));
        check_range(&mut diags, &Value::Value(10), 0..=10, AttributePath::new("n"));
        assert!(diags.errors.is_empty());
        check_range(&mut diags, &Value::Value(11), 0..=10, AttributePath::new("n"));
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn replace_triggers_only_on_change() {
        let mut triggers = Vec::new();
        let a: ValueString = "a".into();
        let b: ValueString = "b".into();
        replace_on_change(&mut triggers, &a, &a, "same");
        replace_on_change(&mut triggers, &a, &b, "changed");
        assert_eq!(triggers, vec![AttributePath::new("changed")]);
    }

    #[test]
    fn defaults_only_replace_null() {
        let mut null: ValueNumber = Value::Null;
        let mut unknown: ValueNumber = Value::Unknown;
        let mut set: ValueNumber = Value::Value(3);
        set_default(&mut null, 1);
        set_default(&mut unknown, 1);
        set_default(&mut set, 1);
        assert_eq!(null, Value::Value(1));
        assert!(unknown.is_unknown());
        assert_eq!(set, Value::Value(3));
        assert_eq!(number_or(&Value::Null, 7), 7);
        assert!(bool_or(&Value::Unknown, true));
    }

    #[test]
    fn errors_are_reported_at_root() {
        let mut diags = Diagnostics::default();
        assert_eq!(or_report(&mut diags, "ok", Ok(3)), Some(3));
        let failed: Option<()> =
            or_report(&mut diags, "Could not read", Err(Error::NotFound("x".into())));
        assert!(failed.is_none());
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(diags.errors[0].summary, "Could not read");
        assert!(diags.errors[0].detail.starts_with("Resource not found: x"));
    }

    #[test]
    fn empty_api_string_becomes_null() {
        assert!(string_value("").is_null());
        assert_eq!(string_value("x"), Value::Value(Cow::Borrowed("x")));
        assert!(optional_string(None).is_null());
        assert_eq!(optional_string(Some("".into())), Value::Value(Cow::Borrowed("")));
    }

    #[test]
    fn string_lists() {
        let list = strings_list(vec!["a", "b"]);
        assert_eq!(list_strings(&list), vec!["a".to_owned(), "b".to_owned()]);
        let partial: ValueList<ValueString> =
            Value::Value(vec![Value::Unknown, Value::Value("c".into())]);
        assert_eq!(list_strings(&partial), vec!["c".to_owned()]);
    }

    #[test]
    fn empty_api_list_keeps_prior_shape() {
        let empty: ValueList<ValueString> = Value::Value(Vec::new());
        let set = strings_list(vec!["a"]);
        assert!(strings_or_null(&[], None).is_null());
        assert!(strings_or_null(&[], Some(&Value::Null)).is_null());
        assert_eq!(strings_or_null(&[], Some(&empty)), empty);
        assert_eq!(strings_or_null(&[], Some(&set)), empty);
        assert_eq!(strings_or_null(&["a".to_owned()], None), set);
    }
}
