/// Database layer
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded schema migrations
/// - `transaction`: commit-or-rollback scope for multi-statement units of work
///
/// Row types and their queries live in the crate-level `models` module.

pub mod migrations;
pub mod pool;
pub mod transaction;
