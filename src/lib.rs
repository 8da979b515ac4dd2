//! seaauth library crate.
//!
//! Provides an OAuth 2.1 authorization server core that issues RS256 signed
//! access tokens to a fixed set of bootstrap clients, plus the HTTP surface
//! that exposes it.

pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
