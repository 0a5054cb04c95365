//! Request handlers.

pub mod mobile_auth;
pub mod mobile_session;
