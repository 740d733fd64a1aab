//! HTTP Request Handlers

pub mod health;
pub mod session;
