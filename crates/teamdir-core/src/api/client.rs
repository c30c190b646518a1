//! API client for the team directory REST service.
//!
//! All requests go through [`ApiClient::request`], which attaches the stored
//! access token and recovers from an expired token by refreshing it once and
//! reissuing the request once. Typed operations sit on top and turn non-2xx
//! responses into named failures.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{header, Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{claims, TokenStore};
use crate::models::{NewTeamMember, TeamMember, TokenPair, User};

use super::{ApiError, RefreshError};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const TOKEN_PATH: &str = "/api/token/";
const TOKEN_REFRESH_PATH: &str = "/api/token/refresh/";
const TOKEN_VERIFY_PATH: &str = "/api/token/verify/";
const USERS_PATH: &str = "/api/users/";
const TEAM_MEMBERS_PATH: &str = "/api/team-members/";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// API client for the team directory.
/// Clone is cheap - the connection pool, token store and in-flight refresh
/// are shared between clones.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    tokens: TokenStore,
    // Refresh currently running on behalf of any clone of this client
    pending_refresh: Arc<Mutex<Option<RefreshFuture>>>,
    // Identity endpoint for tokens that carry no user id claim
    current_user_fallback: Option<Arc<str>>,
}

impl ApiClient {
    /// Create a new API client for `base_url` backed by `tokens`
    pub fn new(base_url: &str, tokens: TokenStore) -> Result<Self> {
        Self::with_timeout(
            base_url,
            tokens,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(base_url: &str, tokens: TokenStore, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            tokens,
            pending_refresh: Arc::new(Mutex::new(None)),
            current_user_fallback: None,
        })
    }

    /// Fetch the current user from `path` when the access token does not
    /// name its account (e.g. `/api/users/me/` on servers that provide it)
    pub fn with_current_user_fallback(mut self, path: &str) -> Self {
        self.current_user_fallback = Some(Arc::from(path));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn member_path(id: i64) -> String {
        format!("{}{}/", TEAM_MEMBERS_PATH, id)
    }

    fn user_path(id: i64) -> String {
        format!("{}{}/", USERS_PATH, id)
    }

    /// Where to look up the account `access_token` belongs to
    fn identity_path(&self, access_token: &str) -> Result<String, ApiError> {
        if let Some(id) = claims::user_id(access_token) {
            return Ok(Self::user_path(id));
        }
        match self.current_user_fallback {
            Some(ref path) => Ok(path.to_string()),
            None => Err(ApiError::InvalidResponse(format!(
                "Access token has no {} claim",
                claims::USER_ID_CLAIM
            ))),
        }
    }

    // ===== Authenticated Requests =====

    /// Issue an authenticated request and return the response as received.
    ///
    /// A 401 triggers one token refresh; if it succeeds the request is sent
    /// again with the new token and that second response is returned whatever
    /// its status. If the refresh fails the original 401 is returned. Only
    /// transport failures become errors.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        self.request_with_headers(method, path, body, header::HeaderMap::new())
            .await
    }

    /// Like [`request`](Self::request), with extra headers on both attempts
    pub async fn request_with_headers(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: header::HeaderMap,
    ) -> Result<Response, ApiError> {
        let token = self.tokens.access_token()?;
        let response = self
            .send(method.clone(), path, body, &headers, token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(%method, path, "Access token rejected, refreshing");
        match self.token_after_rejection(token.as_deref()).await {
            Ok(new_token) => {
                let retried = self
                    .send(method, path, body, &headers, Some(&new_token))
                    .await?;
                debug!(path, status = %retried.status(), "Retried request after refresh");
                Ok(retried)
            }
            Err(e) => {
                warn!(path, error = %e, "Token refresh failed, session cleared");
                Ok(response)
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: &header::HeaderMap,
        token: Option<&str>,
    ) -> Result<Response, reqwest::Error> {
        // Our content type and credentials replace any the caller passed
        let mut headers = headers.clone();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.remove(header::AUTHORIZATION);

        let mut request = self.client.request(method, self.url(path)).headers(headers);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await
    }

    /// Pick the token for the retry after `rejected` got a 401.
    ///
    /// If the stored token already differs from the rejected one, another
    /// request refreshed in the meantime and its token is reused.
    async fn token_after_rejection(&self, rejected: Option<&str>) -> Result<String, RefreshError> {
        if let Some(current) = self.tokens.access_token()? {
            if rejected != Some(current.as_str()) {
                debug!("Access token was refreshed by another request");
                return Ok(current);
            }
        }
        self.refresh_access_token().await
    }

    // ===== Token Refresh =====

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Concurrent callers share a single in-flight refresh. On success the new
    /// access token is persisted; on any failure the whole session (both
    /// tokens and the user) is cleared.
    pub async fn refresh_access_token(&self) -> Result<String, RefreshError> {
        let refresh = {
            let mut slot = self
                .pending_refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(pending) if pending.peek().is_none() => pending.clone(),
                _ => {
                    let client = self.clone();
                    let pending = async move { client.run_refresh().await }.boxed().shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        refresh.await
    }

    async fn run_refresh(self) -> Result<String, RefreshError> {
        match self.exchange_refresh_token().await {
            Ok(access) => {
                info!("Access token refreshed");
                Ok(access)
            }
            Err(e) => {
                if let Err(clear_err) = self.tokens.clear() {
                    warn!(error = %clear_err, "Failed to clear session after refresh failure");
                }
                Err(e)
            }
        }
    }

    async fn exchange_refresh_token(&self) -> Result<String, RefreshError> {
        let refresh = self
            .tokens
            .refresh_token()?
            .ok_or(RefreshError::NoRefreshToken)?;

        let response = self
            .client
            .post(self.url(TOKEN_REFRESH_PATH))
            .json(&RefreshRequest { refresh: &refresh })
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RefreshError::Rejected(response.status().as_u16()));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        self.tokens.set_access_token(&body.access)?;
        Ok(body.access)
    }

    // ===== Response Helpers =====

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let response = self.request(method, path, body).await?;
        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    // ===== Authentication =====

    /// Exchange credentials for a token pair. Nothing is persisted here.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair> {
        let response = self
            .client
            .post(self.url(TOKEN_PATH))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(ApiError::from)
            .context("Failed to send login request")?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::InvalidCredentials).context("Login failed");
        }
        let response = Self::check_response(response).await.context("Login failed")?;

        response
            .json()
            .await
            .context("Failed to parse login response")
    }

    /// Ask the server whether `token` is still a valid access token
    pub async fn verify_token(&self, token: &str) -> Result<bool> {
        let response = self
            .client
            .post(self.url(TOKEN_VERIFY_PATH))
            .json(&VerifyRequest { token })
            .send()
            .await
            .map_err(ApiError::from)
            .context("Failed to send token verification request")?;

        Ok(response.status().is_success())
    }

    /// Fetch the signed-in user's identity and role.
    ///
    /// The account is the one named by the stored access token.
    pub async fn current_user(&self) -> Result<User> {
        let token = self
            .tokens
            .access_token()
            .map_err(ApiError::from)?
            .ok_or(ApiError::Unauthorized)
            .context("Failed to fetch current user")?;
        let path = self
            .identity_path(&token)
            .context("Failed to fetch current user")?;

        self.fetch_json(Method::GET, &path, None)
            .await
            .context("Failed to fetch current user")
    }

    /// Fetch the user that `access_token` belongs to, bypassing stored tokens
    pub async fn user_for_token(&self, access_token: &str) -> Result<User> {
        let path = self
            .identity_path(access_token)
            .context("Failed to fetch current user")?;
        let response = self
            .send(
                Method::GET,
                &path,
                None,
                &header::HeaderMap::new(),
                Some(access_token),
            )
            .await
            .map_err(ApiError::from)
            .context("Failed to fetch current user")?;

        let response = Self::check_response(response)
            .await
            .context("Failed to fetch current user")?;

        response
            .json()
            .await
            .context("Failed to parse current user response")
    }

    // ===== Team Members =====

    pub async fn list_team_members(&self) -> Result<Vec<TeamMember>> {
        self.fetch_json(Method::GET, TEAM_MEMBERS_PATH, None)
            .await
            .context("Failed to fetch team members")
    }

    pub async fn get_team_member(&self, id: i64) -> Result<TeamMember> {
        self.fetch_json(Method::GET, &Self::member_path(id), None)
            .await
            .context("Failed to fetch team member")
    }

    /// Create a team member. Invalid input is rejected before any request.
    pub async fn create_team_member(&self, member: &NewTeamMember) -> Result<TeamMember> {
        member.validate()?;
        let body = serde_json::to_value(member)?;
        self.fetch_json(Method::POST, TEAM_MEMBERS_PATH, Some(&body))
            .await
            .context("Failed to create team member")
    }

    /// Replace a team member's fields. Invalid input is rejected before any request.
    pub async fn update_team_member(&self, id: i64, member: &NewTeamMember) -> Result<TeamMember> {
        member.validate()?;
        let body = serde_json::to_value(member)?;
        self.fetch_json(Method::PUT, &Self::member_path(id), Some(&body))
            .await
            .context("Failed to update team member")
    }

    pub async fn delete_team_member(&self, id: i64) -> Result<()> {
        let response = self
            .request(Method::DELETE, &Self::member_path(id), None)
            .await
            .context("Failed to delete team member")?;
        Self::check_response(response)
            .await
            .context("Failed to delete team member")?;
        Ok(())
    }
}
