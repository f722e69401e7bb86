//! HTTP API for document upload and question answering, with bearer auth
//! and per-IP rate limiting.

mod error;
mod handlers;
mod router;
mod server;

pub use error::GatewayError;
pub use server::GatewayServer;
