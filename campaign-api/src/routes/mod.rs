/// API route handlers
///
/// - `health`: health check
/// - `auth`: register, login, logout
/// - `campaigns`: campaign management for the signed-in owner
/// - `public`: public campaign listing, donors, donations
/// - `payments`: payment provider callbacks
/// - `images`: image upload and removal

pub mod auth;
pub mod campaigns;
pub mod health;
pub mod images;
pub mod payments;
pub mod public;
