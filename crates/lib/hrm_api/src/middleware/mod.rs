//! Request middleware.

pub mod mobile_auth;
