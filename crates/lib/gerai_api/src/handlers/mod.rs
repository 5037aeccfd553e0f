//! HTTP request handlers, thin over the service layer and queries.

pub mod access;
pub mod access_codes;
pub mod auth;
pub mod health;
