//! CA REST API access
//!
//! - [`TokenManager`] - OAuth2 client-credentials tokens with an on-disk cache
//! - [`CaClient`] - authenticated calls against the CA REST endpoints
//! - [`types`] - wire-format request/response records

mod client;
mod token;
pub mod types;

pub use client::CaClient;
pub use token::{CachedToken, TokenManager};
