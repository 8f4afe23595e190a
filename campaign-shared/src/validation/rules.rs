/// Rule descriptors and the field values they run against
///
/// Every rule except [`Rule::Required`] passes on an absent or empty value, so
/// optional fields are written by leaving `Required` out.

use chrono::NaiveDateTime;
use validator::ValidateEmail;

/// Chrono format for `YYYY-MM-DD HH:MM:SS` timestamps
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Row excluded from a uniqueness check, typically the record being updated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub column: &'static str,
    pub value: i64,
}

impl Exclusion {
    /// Excludes the row whose `id` equals `id`
    pub fn id(id: i64) -> Self {
        Self { column: "id", value: id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,

    /// Minimum length in characters
    MinLength(usize),

    /// Maximum length in characters
    MaxLength(usize),

    /// Inclusive lower bound for integers
    Min(i64),

    /// Inclusive upper bound for integers
    Max(i64),

    Email,

    /// Must parse with the given chrono format
    DateTime(&'static str),

    /// Must equal one of the listed values (integers compare by their decimal form)
    OneOf(&'static [&'static str]),

    /// No other row of `table` may hold the same value in `column`
    Unique {
        table: &'static str,
        column: &'static str,
        except: Option<Exclusion>,
    },
}

impl Rule {
    /// Uniqueness on `table.column`
    pub fn unique(table: &'static str, column: &'static str) -> Self {
        Rule::Unique { table, column, except: None }
    }

    /// Uniqueness on `table.column`, ignoring the row with the given id
    pub fn unique_except_id(table: &'static str, column: &'static str, id: i64) -> Self {
        Rule::Unique {
            table,
            column,
            except: Some(Exclusion::id(id)),
        }
    }
}

/// Value under validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Missing,
}

impl FieldValue {
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Integer(_) => false,
        }
    }

    /// Textual form used for formats, enumerations and storage lookups
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Integer(n) => Some(n.to_string()),
            FieldValue::Missing => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Text(value.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Missing)
    }
}

impl From<&Option<String>> for FieldValue {
    fn from(value: &Option<String>) -> Self {
        value.as_deref().map(FieldValue::from).unwrap_or(FieldValue::Missing)
    }
}

/// One named input and the rules it must satisfy, in evaluation order
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub value: FieldValue,
    pub rules: Vec<Rule>,
}

impl Field {
    pub fn new(name: &'static str, value: impl Into<FieldValue>) -> Self {
        Self {
            name,
            value: value.into(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }
}

/// Outcome of a rule that needs no storage access
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Check {
    Pass,
    Fail(String),
    /// Rule must be resolved against storage
    Deferred,
}

/// Evaluates a rule that can be decided from the value alone
pub(crate) fn check(field: &str, value: &FieldValue, rule: &Rule) -> Check {
    if let Rule::Required = rule {
        return if value.is_blank() {
            Check::Fail(format!("{} is a required field", field))
        } else {
            Check::Pass
        };
    }

    if value.is_blank() {
        return Check::Pass;
    }

    let passed = match (rule, value) {
        (Rule::MinLength(n), FieldValue::Text(s)) => s.chars().count() >= *n,
        (Rule::MaxLength(n), FieldValue::Text(s)) => s.chars().count() <= *n,
        (Rule::Min(n), FieldValue::Integer(v)) => v >= n,
        (Rule::Max(n), FieldValue::Integer(v)) => v <= n,
        (Rule::Email, FieldValue::Text(s)) => s.validate_email(),
        (Rule::DateTime(fmt), FieldValue::Text(s)) => NaiveDateTime::parse_from_str(s, fmt).is_ok(),
        (Rule::OneOf(options), v) => v.as_text().map_or(false, |t| options.contains(&t.as_str())),
        (Rule::Unique { .. }, _) => return Check::Deferred,
        // A length rule on a number, or a bound on text, is a type mismatch
        (_, _) => false,
    };

    if passed {
        Check::Pass
    } else {
        Check::Fail(message(field, rule))
    }
}

pub(crate) fn message(field: &str, rule: &Rule) -> String {
    match rule {
        Rule::Required => format!("{} is a required field", field),
        Rule::MinLength(n) => format!("{} must be at least {} characters in length", field, n),
        Rule::MaxLength(n) => format!("{} must be a maximum of {} characters in length", field, n),
        Rule::Min(n) => format!("{} must be {} or greater", field, n),
        Rule::Max(n) => format!("{} must be {} or less", field, n),
        Rule::Email => format!("{} must be a valid email address", field),
        Rule::DateTime(fmt) => format!("{} does not match the {} format", field, display_format(fmt)),
        Rule::OneOf(options) => format!("{} must be one of [{}]", field, options.join(" ")),
        Rule::Unique { .. } => format!("{} must be unique", field),
    }
}

/// Renders a chrono format the way users write it
fn display_format(fmt: &str) -> String {
    fmt.replace("%Y", "YYYY")
        .replace("%m", "MM")
        .replace("%d", "DD")
        .replace("%H", "HH")
        .replace("%M", "MM")
        .replace("%S", "SS")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fails(value: FieldValue, rule: Rule) -> bool {
        matches!(check("f", &value, &rule), Check::Fail(_))
    }

    #[test]
    fn test_required_rejects_missing_and_blank() {
        assert!(fails(FieldValue::Missing, Rule::Required));
        assert!(fails("   ".into(), Rule::Required));
        assert!(!fails("x".into(), Rule::Required));
        assert!(!fails(0i64.into(), Rule::Required));
    }

    #[test]
    fn test_optional_rules_skip_absent_values() {
        assert!(!fails(FieldValue::Missing, Rule::MinLength(3)));
        assert!(!fails("".into(), Rule::Email));
        assert!(!fails(FieldValue::Missing, Rule::Min(1)));
    }

    #[test]
    fn test_length_counts_characters() {
        assert!(!fails("añé".into(), Rule::MaxLength(3)));
        assert!(fails("ab".into(), Rule::MinLength(3)));
        assert!(fails("abcd".into(), Rule::MaxLength(3)));
    }

    #[test]
    fn test_numeric_bounds() {
        assert!(fails(0i64.into(), Rule::Min(1)));
        assert!(!fails(1i64.into(), Rule::Min(1)));
        assert!(fails(11i64.into(), Rule::Max(10)));
    }

    #[test]
    fn test_email_format() {
        assert!(!fails("donor@example.com".into(), Rule::Email));
        assert!(fails("not-an-email".into(), Rule::Email));
    }

    #[test]
    fn test_datetime_format() {
        let rule = Rule::DateTime(DATETIME_FORMAT);
        assert!(!fails("2025-03-01 08:30:00".into(), rule.clone()));
        assert!(fails("2025-03-01".into(), rule.clone()));
        assert!(fails("2025-13-01 08:30:00".into(), rule));
    }

    #[test]
    fn test_one_of_accepts_integers_by_decimal_form() {
        let rule = Rule::OneOf(&["1", "2"]);
        assert!(!fails(2i64.into(), rule.clone()));
        assert!(fails(3i64.into(), rule));
    }

    #[test]
    fn test_type_mismatch_fails() {
        assert!(fails(5i64.into(), Rule::MinLength(1)));
        assert!(fails("5".into(), Rule::Min(1)));
    }

    #[test]
    fn test_unique_is_deferred() {
        assert_eq!(check("slug", &"abc".into(), &Rule::unique("campaigns", "slug")), Check::Deferred);
    }

    #[test]
    fn test_messages() {
        assert_eq!(message("title", &Rule::MinLength(3)), "title must be at least 3 characters in length");
        assert_eq!(message("status", &Rule::OneOf(&["1", "2"])), "status must be one of [1 2]");
        assert_eq!(
            message("start_date", &Rule::DateTime(DATETIME_FORMAT)),
            "start_date does not match the YYYY-MM-DD HH:MM:SS format"
        );
    }
}
