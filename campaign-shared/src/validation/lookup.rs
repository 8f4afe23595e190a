/// Storage-backed uniqueness checks
///
/// Table and column names cannot be bound as query parameters, so they are
/// checked against a plain identifier pattern before being spliced into SQL.
/// Values are always bound.

use async_trait::async_trait;
use sqlx::PgPool;

use super::rules::Exclusion;

/// Answers "does another row already hold this value?"
#[async_trait]
pub trait UniqueLookup: Send + Sync {
    async fn exists(
        &self,
        table: &str,
        column: &str,
        value: &str,
        except: Option<&Exclusion>,
    ) -> Result<bool, LookupError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("invalid SQL identifier in uniqueness rule: {0:?}")]
    InvalidIdentifier(String),

    #[error("uniqueness lookup failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes (the Postgres identifier limit)
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }

    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn ensure_identifier(name: &str) -> Result<(), LookupError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(LookupError::InvalidIdentifier(name.to_string()))
    }
}

/// Builds the existence query, with `$2` as the excluded value when present
pub fn exists_query(table: &str, column: &str, except: Option<&Exclusion>) -> Result<String, LookupError> {
    ensure_identifier(table)?;
    ensure_identifier(column)?;

    match except {
        Some(exclusion) => {
            ensure_identifier(exclusion.column)?;
            Ok(format!(
                "SELECT EXISTS (SELECT 1 FROM {table} WHERE {column} = $1 AND {} <> $2)",
                exclusion.column
            ))
        }
        None => Ok(format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE {column} = $1)")),
    }
}

#[async_trait]
impl UniqueLookup for PgPool {
    async fn exists(
        &self,
        table: &str,
        column: &str,
        value: &str,
        except: Option<&Exclusion>,
    ) -> Result<bool, LookupError> {
        let sql = exists_query(table, column, except)?;

        let mut query = sqlx::query_scalar::<_, bool>(&sql).bind(value);
        if let Some(exclusion) = except {
            query = query.bind(exclusion.value);
        }

        Ok(query.fetch_one(self).await?)
    }
}
