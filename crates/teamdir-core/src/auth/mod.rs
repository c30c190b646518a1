//! Authentication module for managing the signed-in session.
//!
//! This module provides:
//! - `TokenStore`: typed access to the persisted token pair and user
//! - `Session`: the single source of truth for who is signed in
//! - `claims`: which account an access token was issued for
//!
//! A session is created by sign-in, updated by token refresh and destroyed
//! by sign-out or by a refresh that fails.

pub mod claims;
pub mod session;
pub mod tokens;

pub use session::{AuthState, Session};
pub use tokens::TokenStore;
