//! Presentation Layer
//!
//! HTTP API surface and the server-push stream. Handlers construct
//! application services from shared state per request and translate
//! service errors into API responses.

pub mod http;
pub mod middleware;
pub mod sse;
