//! Data models for the team directory.
//!
//! - `User`, `Role`, `Action`: the signed-in account and what it may do
//! - `TeamMember`, `NewTeamMember`: directory entries and their editable form
//! - `TokenPair`: credentials returned by the token endpoint

pub mod team_member;
pub mod user;

pub use team_member::{MemberRole, NewTeamMember, TeamMember};
pub use user::{can, Action, Role, StoredUser, User};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}
