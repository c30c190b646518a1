//! In-process stand-in for the directory service.
//!
//! Serves the token and team-member endpoints on an ephemeral port and
//! records every request so tests can assert on headers and call counts.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{json, Value};

use teamdir_core::storage::KeyValueStore;
use teamdir_core::{
    ApiClient, MemberRole, NewTeamMember, Role, Session, TeamMember, TokenPair, TokenStore, User,
};

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret1";
pub const USER_ID: i64 = 10;

/// Access token for alice, tagged with `label` so tests can tell tokens apart
pub fn access_token(label: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({"token_type": "access", "user_id": USER_ID, "jti": label}).to_string(),
    );
    format!("{}.{}.{}", header, payload, label)
}

pub fn bearer(label: &str) -> String {
    format!("Bearer {}", access_token(label))
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub authorization_values: usize,
    pub content_type_values: usize,
}

pub struct MockState {
    pub valid_tokens: HashSet<String>,
    pub issued_pair: TokenPair,
    pub user: User,
    /// Access token handed out by the refresh endpoint; `None` rejects
    pub refresh_grant: Option<String>,
    /// Whether tokens issued by refresh are accepted afterwards
    pub honor_refreshed_tokens: bool,
    pub refresh_delay: Duration,
    pub requests: Vec<RecordedRequest>,
    pub refresh_bodies: Vec<Value>,
    pub members: BTreeMap<i64, TeamMember>,
    pub next_id: i64,
}

pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        let mut members = BTreeMap::new();
        members.insert(
            1,
            TeamMember {
                id: 1,
                first_name: "John".to_string(),
                last_name: "Doe".to_string(),
                phone_number: "1234567890".to_string(),
                email: "john@example.com".to_string(),
                role: MemberRole::Admin,
            },
        );

        Arc::new(Self {
            state: Mutex::new(MockState {
                valid_tokens: HashSet::new(),
                issued_pair: TokenPair {
                    access: access_token("A1"),
                    refresh: "R1".to_string(),
                },
                user: User {
                    id: USER_ID,
                    username: USERNAME.to_string(),
                    role: Role::Admin,
                    is_superuser: false,
                    email: Some("alice@example.com".to_string()),
                    first_name: Some("Alice".to_string()),
                    last_name: None,
                },
                refresh_grant: Some(access_token("A2")),
                honor_refreshed_tokens: true,
                refresh_delay: Duration::ZERO,
                requests: Vec::new(),
                refresh_bodies: Vec::new(),
                members,
                next_id: 2,
            }),
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Recorded requests for `path`, in arrival order
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.with(|s| s.requests.iter().filter(|r| r.path == path).cloned().collect())
    }

    pub fn total_requests(&self) -> usize {
        self.with(|s| s.requests.len())
    }

    pub fn revoke(&self, token: &str) {
        self.with(|s| s.valid_tokens.remove(token));
    }

    pub fn accept(&self, token: &str) {
        self.with(|s| s.valid_tokens.insert(token.to_string()));
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match token {
            Some(token) => self.with(|s| s.valid_tokens.contains(token)),
            None => false,
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Given token not valid for any token type", "code": "token_not_valid"})),
    )
        .into_response()
}

async fn record(State(mock): State<Arc<MockBackend>>, request: Request, next: Next) -> Response {
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        authorization: request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        authorization_values: request.headers().get_all(AUTHORIZATION).iter().count(),
        content_type_values: request.headers().get_all(CONTENT_TYPE).iter().count(),
    };
    mock.with(|s| s.requests.push(recorded));
    next.run(request).await
}

async fn obtain_token(State(mock): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Response {
    mock.with(|s| {
        if body["username"] == s.user.username.as_str() && body["password"] == PASSWORD {
            s.valid_tokens.insert(s.issued_pair.access.clone());
            Json(json!({"access": s.issued_pair.access, "refresh": s.issued_pair.refresh}))
                .into_response()
        } else {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "No active account found with the given credentials"})),
            )
                .into_response()
        }
    })
}

async fn refresh_token(State(mock): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Response {
    let delay = mock.with(|s| {
        s.refresh_bodies.push(body.clone());
        s.refresh_delay
    });
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    mock.with(|s| {
        let known = body["refresh"] == s.issued_pair.refresh.as_str();
        match s.refresh_grant.clone() {
            Some(access) if known => {
                if s.honor_refreshed_tokens {
                    s.valid_tokens.insert(access.clone());
                }
                Json(json!({ "access": access })).into_response()
            }
            _ => unauthorized(),
        }
    })
}

async fn verify_token(State(mock): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Response {
    let valid = body["token"]
        .as_str()
        .map(|t| mock.with(|s| s.valid_tokens.contains(t)))
        .unwrap_or(false);
    if valid {
        Json(json!({})).into_response()
    } else {
        unauthorized()
    }
}

async fn current_user(State(mock): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    mock.with(|s| Json(s.user.clone()).into_response())
}

async fn get_user(
    State(mock): State<Arc<MockBackend>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    mock.with(|s| {
        if s.user.id == id {
            Json(s.user.clone()).into_response()
        } else {
            (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response()
        }
    })
}

async fn list_members(State(mock): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    mock.with(|s| Json(s.members.values().cloned().collect::<Vec<_>>()).into_response())
}

async fn create_member(
    State(mock): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(draft): Json<NewTeamMember>,
) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    mock.with(|s| {
        let member = draft.into_member(s.next_id);
        s.next_id += 1;
        s.members.insert(member.id, member.clone());
        (StatusCode::CREATED, Json(member)).into_response()
    })
}

async fn get_member(
    State(mock): State<Arc<MockBackend>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    mock.with(|s| match s.members.get(&id) {
        Some(member) => Json(member.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    })
}

async fn update_member(
    State(mock): State<Arc<MockBackend>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(draft): Json<NewTeamMember>,
) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    mock.with(|s| {
        if !s.members.contains_key(&id) {
            return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
        }
        let member = draft.into_member(id);
        s.members.insert(id, member.clone());
        Json(member).into_response()
    })
}

async fn delete_member(
    State(mock): State<Arc<MockBackend>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if !mock.authorized(&headers) {
        return unauthorized();
    }
    mock.with(|s| match s.members.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    })
}

/// Serve `mock` on an ephemeral port and return its base URL
pub async fn spawn(mock: Arc<MockBackend>) -> String {
    let app = Router::new()
        .route("/api/token/", post(obtain_token))
        .route("/api/token/refresh/", post(refresh_token))
        .route("/api/token/verify/", post(verify_token))
        .route("/api/users/me/", get(current_user))
        .route("/api/users/{id}/", get(get_user))
        .route("/api/team-members/", get(list_members).post(create_member))
        .route(
            "/api/team-members/{id}/",
            get(get_member).put(update_member).delete(delete_member),
        )
        .layer(middleware::from_fn_with_state(mock.clone(), record))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn client(base_url: &str, storage: Arc<dyn KeyValueStore>) -> ApiClient {
    ApiClient::new(base_url, TokenStore::new(storage)).unwrap()
}

pub fn session(base_url: &str, storage: Arc<dyn KeyValueStore>) -> Session {
    Session::new(client(base_url, storage))
}
