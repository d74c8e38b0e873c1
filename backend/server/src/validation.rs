//! # Validation
//!
//! Untrusted write payloads arrive as raw JSON so that a missing field, an
//! explicit `null` and a value of the wrong type can each be told apart.
//!
//! Every rule runs and every violation is reported, ordered by field:
//! title, description, status, priority, assignee, reporter.
use serde_json::{Map, Value};

use crate::{
    models::{Bug, BugFields, FieldError, Priority, Status},
    sanitize::sanitize_value,
};

pub const TITLE: TextRule = TextRule {
    field: "title",
    label: "Title",
    required: true,
    min: 3,
    max: 100,
};
pub const DESCRIPTION: TextRule = TextRule {
    field: "description",
    label: "Description",
    required: true,
    min: 10,
    max: 1000,
};
pub const ASSIGNEE: TextRule = TextRule {
    field: "assignee",
    label: "Assignee name",
    required: false,
    min: 0,
    max: 50,
};
pub const REPORTER: TextRule = TextRule {
    field: "reporter",
    label: "Reporter name",
    required: true,
    min: 2,
    max: 50,
};

pub struct TextRule {
    pub field: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub min: usize,
    pub max: usize,
}

/// Writable fields as they came off the wire. `None` is absent,
/// `Some(Value::Null)` is an explicit null.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BugInput {
    pub title: Option<Value>,
    pub description: Option<Value>,
    pub status: Option<Value>,
    pub priority: Option<Value>,
    pub assignee: Option<Value>,
    pub reporter: Option<Value>,
}

impl BugInput {
    /// Unknown keys are ignored.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        Self {
            title: map.remove("title"),
            description: map.remove("description"),
            status: map.remove("status"),
            priority: map.remove("priority"),
            assignee: map.remove("assignee"),
            reporter: map.remove("reporter"),
        }
    }

    pub fn sanitized(self) -> Self {
        Self {
            title: self.title.map(sanitize_value),
            description: self.description.map(sanitize_value),
            assignee: self.assignee.map(sanitize_value),
            reporter: self.reporter.map(sanitize_value),
            ..self
        }
    }

    /// Fields absent here fall back to the stored record.
    pub fn merged_over(self, bug: &Bug) -> Self {
        let text = |value: &str| Value::String(value.to_string());

        Self {
            title: self.title.or_else(|| Some(text(&bug.title))),
            description: self.description.or_else(|| Some(text(&bug.description))),
            status: self.status.or_else(|| Some(text(bug.status.as_str()))),
            priority: self.priority.or_else(|| Some(text(bug.priority.as_str()))),
            assignee: self.assignee.or_else(|| bug.assignee.as_deref().map(text)),
            reporter: self.reporter.or_else(|| Some(text(&bug.reporter))),
        }
    }
}

pub fn validate(input: &BugInput) -> Result<BugFields, Vec<FieldError>> {
    let mut errors = Vec::new();

    let title = check_text(&TITLE, input.title.as_ref(), &mut errors);
    let description = check_text(&DESCRIPTION, input.description.as_ref(), &mut errors);
    let status = check_status(input.status.as_ref(), &mut errors);
    let priority = check_priority(input.priority.as_ref(), &mut errors);
    let assignee = check_text(&ASSIGNEE, input.assignee.as_ref(), &mut errors);
    let reporter = check_text(&REPORTER, input.reporter.as_ref(), &mut errors);

    match (title, description, status, priority, reporter) {
        (Some(title), Some(description), Some(status), Some(priority), Some(reporter))
            if errors.is_empty() =>
        {
            Ok(BugFields {
                title,
                description,
                status,
                priority,
                assignee,
                reporter,
            })
        }
        _ => Err(errors),
    }
}

pub fn status_message() -> String {
    enum_message("Status", Status::ALL.map(Status::as_str))
}

pub fn priority_message() -> String {
    enum_message("Priority", Priority::ALL.map(Priority::as_str))
}

/// Parses a standalone status, as sent to the status endpoint.
pub fn validate_status(value: Option<&Value>) -> Result<Status, Vec<FieldError>> {
    match value {
        None | Some(Value::Null) => Err(vec![FieldError::new("status", "Status is required")]),
        Some(value) => value
            .as_str()
            .and_then(Status::parse)
            .ok_or_else(|| vec![FieldError::new("status", status_message())]),
    }
}

/// `None` with no error pushed means an optional field was left empty.
fn check_text(rule: &TextRule, value: Option<&Value>, errors: &mut Vec<FieldError>) -> Option<String> {
    let text = match value {
        None | Some(Value::Null) => "",
        Some(Value::String(s)) => s.trim(),
        Some(_) => {
            errors.push(FieldError::new(rule.field, format!("{} must be a string", rule.label)));
            return None;
        }
    };

    let length = text.chars().count();

    if length == 0 {
        if rule.required {
            errors.push(FieldError::new(rule.field, format!("{} is required", rule.label)));
        }
        return None;
    }

    if length < rule.min {
        errors.push(FieldError::new(
            rule.field,
            format!("{} must be at least {} characters long", rule.label, rule.min),
        ));
        return None;
    }

    if length > rule.max {
        errors.push(FieldError::new(
            rule.field,
            format!("{} cannot exceed {} characters", rule.label, rule.max),
        ));
        return None;
    }

    Some(text.to_string())
}

fn check_status(value: Option<&Value>, errors: &mut Vec<FieldError>) -> Option<Status> {
    check_enum(value, Status::parse, status_message, "status", errors)
}

fn check_priority(value: Option<&Value>, errors: &mut Vec<FieldError>) -> Option<Priority> {
    check_enum(value, Priority::parse, priority_message, "priority", errors)
}

fn check_enum<T: Default>(
    value: Option<&Value>,
    parse: fn(&str) -> Option<T>,
    message: fn() -> String,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    match value {
        None | Some(Value::Null) => Some(T::default()),
        Some(value) => {
            let parsed = value.as_str().and_then(parse);
            if parsed.is_none() {
                errors.push(FieldError::new(field, message()));
            }
            parsed
        }
    }
}

fn enum_message<const N: usize>(label: &str, values: [&str; N]) -> String {
    format!("{label} must be one of {}", values.join(", "))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn input(value: Value) -> BugInput {
        match value {
            Value::Object(map) => BugInput::from_map(map),
            _ => panic!("test input must be an object"),
        }
    }

    fn valid() -> Value {
        json!({
            "title": "Test Bug",
            "description": "This is a test bug description that is long enough",
            "status": "open",
            "priority": "medium",
            "assignee": "John Doe",
            "reporter": "Jane Smith"
        })
    }

    fn messages(errors: &[FieldError]) -> Vec<(&str, &str)> {
        errors
            .iter()
            .map(|e| (e.field.as_str(), e.message.as_str()))
            .collect()
    }

    #[test]
    fn test_valid_bug() {
        let fields = validate(&input(valid())).unwrap();

        assert_eq!(fields.title, "Test Bug");
        assert_eq!(fields.assignee.as_deref(), Some("John Doe"));
        assert_eq!(fields.priority, Priority::Medium);
    }

    #[test]
    fn test_defaults_applied() {
        let fields = validate(&input(json!({
            "title": "Crash on save",
            "description": "Saving a draft crashes the app",
            "reporter": "Al"
        })))
        .unwrap();

        assert_eq!(fields.status, Status::Open);
        assert_eq!(fields.priority, Priority::Medium);
        assert_eq!(fields.assignee, None);
    }

    #[test]
    fn test_short_title() {
        let mut value = valid();
        value["title"] = json!("AB");
        let errors = validate(&input(value)).unwrap_err();

        assert_eq!(
            messages(&errors),
            vec![("title", "Title must be at least 3 characters long")]
        );
    }

    #[test]
    fn test_long_fields() {
        let mut value = valid();
        value["title"] = json!("a".repeat(101));
        value["description"] = json!("d".repeat(1001));
        value["assignee"] = json!("x".repeat(51));
        value["reporter"] = json!("r".repeat(51));
        let errors = validate(&input(value)).unwrap_err();

        assert_eq!(
            messages(&errors),
            vec![
                ("title", "Title cannot exceed 100 characters"),
                ("description", "Description cannot exceed 1000 characters"),
                ("assignee", "Assignee name cannot exceed 50 characters"),
                ("reporter", "Reporter name cannot exceed 50 characters"),
            ]
        );
    }

    #[test]
    fn test_bounds_inclusive() {
        let mut value = valid();
        value["title"] = json!("a".repeat(100));
        value["description"] = json!("d".repeat(10));
        value["reporter"] = json!("rr");
        value["assignee"] = json!("x".repeat(50));

        assert!(validate(&input(value)).is_ok());
    }

    #[test]
    fn test_lengths_count_characters() {
        let mut value = valid();
        value["title"] = json!("é".repeat(100));

        assert!(validate(&input(value)).is_ok());
    }

    #[test]
    fn test_all_errors_reported_in_order() {
        let errors = validate(&input(json!({
            "title": "   ",
            "status": "closed",
            "priority": "urgent",
            "reporter": 7
        })))
        .unwrap_err();

        assert_eq!(
            messages(&errors),
            vec![
                ("title", "Title is required"),
                ("description", "Description is required"),
                ("status", "Status must be one of open, in-progress, resolved"),
                ("priority", "Priority must be one of low, medium, high, critical"),
                ("reporter", "Reporter name must be a string"),
            ]
        );
    }

    #[test]
    fn test_empty_assignee_is_absent() {
        let mut value = valid();
        value["assignee"] = json!("   ");
        assert_eq!(validate(&input(value)).unwrap().assignee, None);

        let mut value = valid();
        value["assignee"] = Value::Null;
        assert_eq!(validate(&input(value)).unwrap().assignee, None);
    }

    #[test]
    fn test_sanitized_before_validation() {
        let mut value = valid();
        value["title"] = json!("<script>alert(1)</script>AB");
        let errors = validate(&input(value).sanitized()).unwrap_err();

        assert_eq!(errors[0].field, "title");
        assert_eq!(errors[0].message, "Title must be at least 3 characters long");
    }

    #[test]
    fn test_merge_keeps_stored_fields() {
        let stored = Bug::create(validate(&input(valid())).unwrap(), Utc::now());
        let merged = input(json!({ "status": "resolved", "assignee": null })).merged_over(&stored);
        let fields = validate(&merged).unwrap();

        assert_eq!(fields.title, stored.title);
        assert_eq!(fields.reporter, stored.reporter);
        assert_eq!(fields.status, Status::Resolved);
        assert_eq!(fields.assignee, None);
    }

    #[test]
    fn test_standalone_status() {
        assert_eq!(validate_status(Some(&json!("in-progress"))), Ok(Status::InProgress));

        let missing = validate_status(None).unwrap_err();
        assert_eq!(missing[0].message, "Status is required");

        let invalid = validate_status(Some(&json!("done"))).unwrap_err();
        assert_eq!(invalid[0].message, status_message());
    }
}
