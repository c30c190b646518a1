use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{can, Action, NewTeamMember, TeamMember, User};
use crate::validation::LoginForm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SignedIn,
}

/// The signed-in user and the operations that change who that is.
///
/// Persistent state lives in the client's `TokenStore`; the user is mirrored
/// in memory so callers can gate actions without touching storage.
pub struct Session {
    api: ApiClient,
    user: Option<User>,
}

impl Session {
    pub fn new(api: ApiClient) -> Self {
        Self { api, user: None }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn state(&self) -> AuthState {
        if self.user.is_some() {
            AuthState::SignedIn
        } else {
            AuthState::SignedOut
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.state() == AuthState::SignedIn
    }

    /// Whether the signed-in user may perform `action`
    pub fn can(&self, action: Action) -> bool {
        can(self.user.as_ref(), action)
    }

    /// Load the persisted user into memory.
    ///
    /// Best effort: missing or unreadable data leaves the session signed out.
    pub fn restore(&mut self) -> bool {
        match self.api.tokens().user() {
            Ok(Some(stored)) => {
                debug!(username = %stored.user.username, saved_at = %stored.saved_at, "Restored session");
                self.user = Some(stored.user);
                true
            }
            Ok(None) => {
                debug!("No stored session");
                self.user = None;
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to restore session, starting signed out");
                self.user = None;
                false
            }
        }
    }

    /// Validate the stored access token with the server and reload the user.
    ///
    /// Never fails: any problem reports unauthenticated. With no stored token
    /// no request is made.
    pub async fn check_status(&mut self) -> bool {
        let token = match self.api.tokens().access_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.user = None;
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                self.user = None;
                return false;
            }
        };

        match self.api.verify_token(&token).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Stored access token is no longer valid");
                self.user = None;
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Error checking auth status");
                self.user = None;
                return false;
            }
        }

        match self.api.current_user().await {
            Ok(user) => {
                if let Err(e) = self.api.tokens().set_user(&user) {
                    warn!(error = %e, "Failed to save user");
                }
                self.user = Some(user);
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to load current user");
                self.user = None;
                false
            }
        }
    }

    /// Sign in with a username and password.
    ///
    /// Tokens and user are persisted together only once both are known, so a
    /// failed sign-in leaves any previous session untouched.
    pub async fn sign_in(&mut self, username: &str, password: &str) -> Result<&User> {
        LoginForm::new(username, password).validate()?;

        let tokens = self.api.login(username, password).await?;
        let user = self.api.user_for_token(&tokens.access).await?;

        self.api
            .tokens()
            .save_session(&tokens, &user)
            .context("Failed to save session")?;

        info!(username = %user.username, role = %user.effective_role(), "Signed in");
        Ok(self.user.insert(user))
    }

    /// Forget the user and both tokens. Safe to call when already signed out.
    pub fn sign_out(&mut self) -> Result<()> {
        self.user = None;
        self.api
            .tokens()
            .clear()
            .context("Failed to clear session")?;
        debug!("Signed out");
        Ok(())
    }

    /// Drop the in-memory user when `result` shows the session is gone
    fn observe<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            if ApiError::is_unauthorized(e) && self.user.take().is_some() {
                info!("Session expired, signed out");
            }
        }
        result
    }

    // ===== Team Members =====

    pub async fn team_members(&mut self) -> Result<Vec<TeamMember>> {
        let result = self.api.list_team_members().await;
        self.observe(result)
    }

    pub async fn team_member(&mut self, id: i64) -> Result<TeamMember> {
        let result = self.api.get_team_member(id).await;
        self.observe(result)
    }

    pub async fn add_team_member(&mut self, member: &NewTeamMember) -> Result<TeamMember> {
        let result = self.api.create_team_member(member).await;
        self.observe(result)
    }

    pub async fn update_team_member(&mut self, id: i64, member: &NewTeamMember) -> Result<TeamMember> {
        let result = self.api.update_team_member(id, member).await;
        self.observe(result)
    }

    pub async fn delete_team_member(&mut self, id: i64) -> Result<()> {
        let result = self.api.delete_team_member(id).await;
        self.observe(result)
    }
}
