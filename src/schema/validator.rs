//! Declarative structural validation over JSON values.
//!
//! Rules are declared per object and evaluated all-or-nothing: the first
//! violation found is reported with the full path of the offending field.

use crate::core::{Error, Result};
use serde_json::{Map, Value};

/// Expected type of a field.
#[derive(Clone, Debug)]
pub enum FieldType {
    /// Any string
    String,
    /// String with at least `n` non-whitespace-trimmed characters
    NonEmptyString(usize),
    /// One of a closed set of strings
    OneOf(&'static [&'static str]),
    /// Finite number within an inclusive range
    Number { min: f64, max: f64 },
    /// Integer within an inclusive range
    Integer { min: i64, max: i64 },
    /// Boolean
    Bool,
    /// ISO-8601 / RFC 3339 datetime string
    Timestamp,
    /// Array of strings
    StringArray { min_items: usize },
    /// Array of objects, each checked against the same rules
    ObjectArray { rules: ObjectRules, min_items: usize },
    /// Nested object
    Object(ObjectRules),
}

/// A single field rule.
#[derive(Clone, Debug)]
pub struct FieldRule {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
}

/// Rules for one JSON object.
#[derive(Clone, Debug)]
pub struct ObjectRules {
    /// Display path of the object (empty for the request root)
    pub path: String,
    pub fields: Vec<FieldRule>,
    /// Reject fields not declared in `fields`
    pub strict: bool,
}

impl ObjectRules {
    /// Create rules for an object at `path`.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            fields: Vec::new(),
            strict: false,
        }
    }

    /// Add a required field.
    pub fn required(mut self, name: &'static str, field_type: FieldType) -> Self {
        self.fields.push(FieldRule {
            name,
            field_type,
            required: true,
        });
        self
    }

    /// Add an optional field.
    pub fn optional(mut self, name: &'static str, field_type: FieldType) -> Self {
        self.fields.push(FieldRule {
            name,
            field_type,
            required: false,
        });
        self
    }

    /// Reject undeclared fields.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Names of declared fields.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Validate `value` against these rules.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let label = if self.path.is_empty() { "input" } else { self.path.as_str() };
        let map = value
            .as_object()
            .ok_or_else(|| Error::invalid(label, format!("{} must be an object", label)))?;

        if self.strict {
            self.reject_unknown(map, label)?;
        }

        for rule in &self.fields {
            let path = self.child_path(rule.name);
            match map.get(rule.name) {
                None | Some(Value::Null) if rule.required => {
                    return Err(Error::invalid(&path, format!("{} is required", path)));
                }
                None | Some(Value::Null) => {}
                Some(v) => check_type(&path, &rule.field_type, v)?,
            }
        }

        Ok(())
    }

    fn reject_unknown(&self, map: &Map<String, Value>, label: &str) -> Result<()> {
        let mut unknown: Vec<&String> = map
            .keys()
            .filter(|k| !self.fields.iter().any(|f| f.name == k.as_str()))
            .collect();
        unknown.sort();

        if let Some(first) = unknown.first() {
            let path = self.child_path(first);
            return Err(Error::invalid(
                &path,
                format!("{} contains unknown field: {}", label, first),
            ));
        }
        Ok(())
    }

    fn child_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        }
    }
}

fn check_type(path: &str, field_type: &FieldType, value: &Value) -> Result<()> {
    match field_type {
        FieldType::String => {
            if !value.is_string() {
                return Err(Error::invalid(path, format!("{} must be a string", path)));
            }
        }
        FieldType::NonEmptyString(min) => {
            let ok = value.as_str().map(|s| s.trim().chars().count() >= *min).unwrap_or(false);
            if !ok {
                let msg = if *min <= 1 {
                    format!("{} must be a non-empty string", path)
                } else {
                    format!("{} must be at least {} chars", path, min)
                };
                return Err(Error::invalid(path, msg));
            }
        }
        FieldType::OneOf(allowed) => {
            let ok = value.as_str().map(|s| allowed.contains(&s)).unwrap_or(false);
            if !ok {
                return Err(Error::invalid(
                    path,
                    format!("{} must be one of {}", path, allowed.join("|")),
                ));
            }
        }
        FieldType::Number { min, max } => {
            let ok = value
                .as_f64()
                .map(|n| n.is_finite() && n >= *min && n <= *max)
                .unwrap_or(false);
            if !ok {
                return Err(Error::invalid(
                    path,
                    format!("{} must be a number in {}..{}", path, min, max),
                ));
            }
        }
        FieldType::Integer { min, max } => {
            let ok = value.as_i64().map(|n| n >= *min && n <= *max).unwrap_or(false);
            if !ok {
                return Err(Error::invalid(
                    path,
                    format!("{} must be an integer in {}..{}", path, min, max),
                ));
            }
        }
        FieldType::Bool => {
            if !value.is_boolean() {
                return Err(Error::invalid(path, format!("{} must be boolean", path)));
            }
        }
        FieldType::Timestamp => {
            let ok = value.as_str().map(is_iso_datetime).unwrap_or(false);
            if !ok {
                return Err(Error::invalid(path, format!("{} must be ISO datetime", path)));
            }
        }
        FieldType::StringArray { min_items } => {
            let items = value
                .as_array()
                .ok_or_else(|| Error::invalid(path, format!("{} must be an array", path)))?;
            if items.len() < *min_items {
                return Err(Error::invalid(
                    path,
                    format!("{} must have at least {} item(s)", path, min_items),
                ));
            }
            if items.iter().any(|v| !v.is_string()) {
                return Err(Error::invalid(path, format!("{} must contain only strings", path)));
            }
        }
        FieldType::ObjectArray { rules, min_items } => {
            let items = value
                .as_array()
                .ok_or_else(|| Error::invalid(path, format!("{} must be an array", path)))?;
            if items.len() < *min_items {
                return Err(Error::invalid(
                    path,
                    format!("{} must have at least {} item(s)", path, min_items),
                ));
            }
            let mut item_rules = rules.clone();
            item_rules.path = format!("{}[]", path);
            for item in items {
                item_rules.validate(item)?;
            }
        }
        FieldType::Object(rules) => {
            let mut nested = rules.clone();
            nested.path = path.to_string();
            nested.validate(value)?;
        }
    }
    Ok(())
}

/// Whether `s` is an ISO-8601 datetime with a `T` separator.
pub fn is_iso_datetime(s: &str) -> bool {
    if chrono::DateTime::parse_from_rfc3339(s).is_ok() {
        return true;
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .any(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subject_rules() -> ObjectRules {
        ObjectRules::new("subject")
            .required("type", FieldType::OneOf(&["user", "role"]))
            .required("id", FieldType::NonEmptyString(1))
            .strict()
    }

    #[test]
    fn test_required_field_missing() {
        let rules = ObjectRules::new("").required("board_id", FieldType::NonEmptyString(1));
        let err = rules.validate(&json!({})).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "board_id is required");
    }

    #[test]
    fn test_null_counts_as_missing() {
        let rules = ObjectRules::new("").required("board_id", FieldType::String);
        assert!(rules.validate(&json!({"board_id": null})).is_err());
    }

    #[test]
    fn test_strict_rejects_unknown() {
        let rules = ObjectRules::new("").required("a", FieldType::Bool).strict();
        let err = rules.validate(&json!({"a": true, "zzz": 1})).unwrap_err();
        assert_eq!(err.to_string(), "input contains unknown field: zzz");
    }

    #[test]
    fn test_lenient_allows_unknown() {
        let rules = ObjectRules::new("").required("a", FieldType::Bool);
        assert!(rules.validate(&json!({"a": true, "zzz": 1})).is_ok());
    }

    #[test]
    fn test_nested_path_in_message() {
        let rules = ObjectRules::new("proposal").required("subject", FieldType::Object(subject_rules()));
        let err = rules
            .validate(&json!({"subject": {"type": "robot", "id": "x"}}))
            .unwrap_err();
        assert_eq!(err.to_string(), "proposal.subject.type must be one of user|role");
    }

    #[test]
    fn test_number_range() {
        let rules = ObjectRules::new("v").required("confidence", FieldType::Number { min: 0.0, max: 1.0 });
        assert!(rules.validate(&json!({"confidence": 0.5})).is_ok());
        assert!(rules.validate(&json!({"confidence": 1.5})).is_err());
        assert!(rules.validate(&json!({"confidence": "high"})).is_err());
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let rules = ObjectRules::new("").required("n", FieldType::Integer { min: 3, max: 9 });
        assert!(rules.validate(&json!({"n": 4})).is_ok());
        assert!(rules.validate(&json!({"n": 4.5})).is_err());
        assert!(rules.validate(&json!({"n": 12})).is_err());
    }

    #[test]
    fn test_object_array_items() {
        let item = ObjectRules::new("vote").required("persona_id", FieldType::NonEmptyString(1));
        let rules = ObjectRules::new("").required(
            "votes",
            FieldType::ObjectArray { rules: item, min_items: 0 },
        );
        let err = rules.validate(&json!({"votes": [{"persona_id": ""}]})).unwrap_err();
        assert_eq!(err.to_string(), "votes[].persona_id must be a non-empty string");
    }

    #[test]
    fn test_string_array() {
        let rules = ObjectRules::new("").required("perms", FieldType::StringArray { min_items: 1 });
        assert!(rules.validate(&json!({"perms": ["a"]})).is_ok());
        assert!(rules.validate(&json!({"perms": []})).is_err());
        assert!(rules.validate(&json!({"perms": [1]})).is_err());
    }

    #[test]
    fn test_iso_datetime() {
        assert!(is_iso_datetime("2026-01-02T03:04:05Z"));
        assert!(is_iso_datetime("2026-01-02T03:04:05.123+02:00"));
        assert!(is_iso_datetime("2026-01-02T03:04:05"));
        assert!(!is_iso_datetime("2026-01-02"));
        assert!(!is_iso_datetime("yesterday"));
    }
}
