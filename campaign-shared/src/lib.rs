//! # Campaign Shared Library
//!
//! Domain logic for the crowdfunding backend, used by the HTTP API.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, access tokens, request authentication
//! - `db`: connection pool, migrations, scoped transactions
//! - `models`: users, campaigns, donors, donations, payments
//! - `validation`: declarative field rules with storage-backed uniqueness
//! - `pagination`: page requests and page-shaped results
//! - `payment`: payment gateway trait, Xendit client, webhook payloads
//! - `donations`: donation initiation and webhook reconciliation
//! - `uploads`: image upload policies and storage

pub mod auth;
pub mod db;
pub mod donations;
pub mod models;
pub mod pagination;
pub mod payment;
pub mod uploads;
pub mod validation;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
