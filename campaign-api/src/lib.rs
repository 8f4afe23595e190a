//! # Campaign API Server Library
//!
//! HTTP surface of the crowdfunding backend: account registration, campaign
//! management, public browsing, donations paid through Xendit invoices, and
//! image uploads.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Rate limiting and security headers
//! - `response`: Success envelopes
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod response;
pub mod routes;
