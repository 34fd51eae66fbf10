//! HTTP surface for text2sql.
//!
//! Exposes the translation pipeline over a small JSON API.

#[cfg(feature = "server")]
mod server;

#[cfg(feature = "server")]
pub use server::*;
