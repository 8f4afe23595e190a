/// Authentication utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: HS256 access token issuance and validation
/// - [`middleware`]: Axum bearer-token middleware and the `AuthContext` extractor
/// - [`callback`]: constant-time verification of payment webhook tokens
///
/// # Example
///
/// ```no_run
/// use campaign_shared::auth::password::{hash_password, verify_password};
/// use campaign_shared::auth::jwt::{issue_token, validate_token};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let token = issue_token(1, "secret-key-of-at-least-thirty-two-bytes")?;
/// let claims = validate_token(&token, "secret-key-of-at-least-thirty-two-bytes")?;
/// assert_eq!(claims.sub, 1);
/// # Ok(())
/// # }
/// ```

pub mod callback;
pub mod jwt;
pub mod middleware;
pub mod password;
