/// Database models
///
/// Each model owns its SQL. Functions that must run inside a transaction
/// (row locks, multi-row writes) take `&mut PgConnection`; read-only and
/// single-statement operations accept any `PgExecutor`, so they work with
/// either the pool or a transaction.
///
/// - `user`: accounts
/// - `campaign`: campaigns, owner-scoped CRUD, public listing
/// - `donor`: donor identity per donation attempt
/// - `donation`: pledged amount and note
/// - `payment`: gateway correlation and settlement state

pub mod campaign;
pub mod donation;
pub mod donor;
pub mod payment;
pub mod user;
