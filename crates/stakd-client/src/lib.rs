#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Stakd REST client.
//!
//! One shared transport ([`ApiClient`]) normalizes every call into an
//! [`ApiResponse`](stakd_core::ApiResponse). Credentials come from an
//! injected [`TokenProvider`]. [`EntityApi`] adds typed per-collection
//! endpoints on top.

pub mod auth;
pub mod client;
pub mod config;
pub mod resources;

pub use auth::{NoSession, Session, StaticToken, TokenProvider};
pub use client::{ApiClient, ApiRequest};
pub use config::{ClientConfig, default_config_path};
pub use resources::EntityApi;
