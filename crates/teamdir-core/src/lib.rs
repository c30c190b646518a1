//! Client library for a team member directory service.
//!
//! Sign in with a username and password, keep the session across restarts,
//! and list, add, edit and delete team members. Expired access tokens are
//! refreshed transparently; concurrent requests share one refresh.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use teamdir_core::Config;
//!
//! let mut session = Config::load()?.session()?;
//! if !session.check_status().await {
//!     session.sign_in("alice", "secret1").await?;
//! }
//! for member in session.team_members().await? {
//!     println!("{}", member.full_name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;
pub mod validation;

pub use api::{ApiClient, ApiError, RefreshError};
pub use auth::{AuthState, Session, TokenStore};
pub use config::{Config, StorageBackend};
pub use models::{can, Action, MemberRole, NewTeamMember, Role, TeamMember, TokenPair, User};
pub use validation::{LoginForm, ValidationErrors};
