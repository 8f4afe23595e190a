/// Middleware for the API server
///
/// - `security`: response security headers
/// - `rate_limit`: per-client request throttling

pub mod rate_limit;
pub mod security;
