//! HTTP plumbing: request helpers and a minimal JSON API server

pub mod client;
pub mod server;

pub use client::{get, post_json};
pub use server::{ApiServer, ResponseHeaders};
