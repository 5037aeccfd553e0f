//! Service layer: flows and cookie construction used by the handlers.

pub mod access_cookie;
pub mod auth;
pub mod cookies;
pub mod setup;
