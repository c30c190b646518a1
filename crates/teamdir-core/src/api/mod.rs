//! REST API client module for the team directory service.
//!
//! This module provides the `ApiClient` for signing in and managing team
//! members. The service uses JWT bearer tokens: a short-lived access token
//! sent with every request and a refresh token used to obtain a new one.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, RefreshError};
