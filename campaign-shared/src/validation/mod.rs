/// Declarative request validation
///
/// Handlers describe each input as a [`Field`] with an ordered list of
/// [`Rule`]s. [`Validator::validate`] evaluates every field and reports all
/// failing fields at once; within a field, evaluation stops at the first rule
/// that fails. Uniqueness rules are resolved through a [`UniqueLookup`], so
/// the validator is built once at startup with the storage handle it needs.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use campaign_shared::validation::{Field, Rule, Validator};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let validator = Validator::new(Arc::new(pool));
///
/// let fields = [
///     Field::new("email", "donor@example.com").rules([Rule::Required, Rule::Email]),
///     Field::new("slug", "save-the-reef").rules([
///         Rule::Required,
///         Rule::unique_except_id("campaigns", "slug", 12),
///     ]),
/// ];
///
/// validator.validate(&fields).await?;
/// # Ok(())
/// # }
/// ```

pub mod lookup;
pub mod rules;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use lookup::{LookupError, UniqueLookup};
pub use rules::{Exclusion, Field, FieldValue, Rule, DATETIME_FORMAT};

use rules::{check, message, Check};

/// A single failed field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every failed field of one request, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    /// True when `field` already failed, used to skip dependent checks
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Invalid(self))
        }
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| format!("{}: {}", v.field, v.message)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Input broke one or more rules
    #[error("validation failed: {0}")]
    Invalid(Violations),

    /// A uniqueness rule could not be evaluated
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Rule engine shared by all handlers
#[derive(Clone)]
pub struct Validator {
    lookup: Arc<dyn UniqueLookup>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

impl Validator {
    pub fn new(lookup: Arc<dyn UniqueLookup>) -> Self {
        Self { lookup }
    }

    /// Collects the violations of every field without failing on them
    ///
    /// Callers that add cross-field checks use this and then call
    /// [`Violations::into_result`].
    pub async fn violations(&self, fields: &[Field]) -> Result<Violations, LookupError> {
        let mut violations = Violations::default();

        for field in fields {
            if let Some(msg) = self.first_failure(field).await? {
                violations.push(Violation::new(field.name, msg));
            }
        }

        Ok(violations)
    }

    /// Fails with every violation found, or with the lookup error if storage could not be queried
    pub async fn validate(&self, fields: &[Field]) -> Result<(), ValidationError> {
        self.violations(fields).await?.into_result()
    }

    async fn first_failure(&self, field: &Field) -> Result<Option<String>, LookupError> {
        for rule in &field.rules {
            match check(field.name, &field.value, rule) {
                Check::Pass => {}
                Check::Fail(msg) => return Ok(Some(msg)),
                Check::Deferred => {
                    if self.taken(&field.value, rule).await? {
                        return Ok(Some(message(field.name, rule)));
                    }
                }
            }
        }

        Ok(None)
    }

    async fn taken(&self, value: &FieldValue, rule: &Rule) -> Result<bool, LookupError> {
        let (Rule::Unique { table, column, except }, Some(text)) = (rule, value.as_text()) else {
            return Ok(false);
        };

        self.lookup.exists(table, column, &text, except.as_ref()).await
    }
}
