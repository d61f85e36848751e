//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Duration, Utc};
use connix::auth::{SESSION_COOKIE, Session, create_session_token};
use connix::data::{NewRepository, NewUser, RepositoryOwner, User};
use connix::{AppState, config};
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const SESSION_SECRET: &str = "test-secret-key-that-is-32-bytes!";

/// Profile served by the fake GitHub API
#[derive(Debug, Clone)]
pub struct FakeGitHubUser {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    /// Public email on /user; None forces a /user/emails lookup
    pub email: Option<String>,
    /// (email, primary, verified) entries of /user/emails
    pub emails: Vec<(String, bool, bool)>,
    pub avatar_url: String,
}

impl FakeGitHubUser {
    pub fn new(id: u64, login: &str) -> Self {
        Self {
            id,
            login: login.to_string(),
            name: Some(format!("{login} Example")),
            email: Some(format!("{login}@example.com")),
            emails: Vec::new(),
            avatar_url: format!("https://avatars.example.com/u/{id}"),
        }
    }
}

/// In-process stand-in for github.com and api.github.com
///
/// Every authorization code registered here is also its own access token.
#[derive(Clone)]
pub struct FakeGitHub {
    users: Arc<Mutex<HashMap<String, FakeGitHubUser>>>,
    pub addr: String,
}

impl FakeGitHub {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let github = Self {
            users: Arc::new(Mutex::new(HashMap::new())),
            addr: format!("http://{}", listener.local_addr().unwrap()),
        };

        let app = Router::new()
            .route("/login/oauth/access_token", post(fake_access_token))
            .route("/user", get(fake_user))
            .route("/user/emails", get(fake_user_emails))
            .with_state(github.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        github
    }

    /// Make `code` redeemable for `user`
    pub fn register(&self, code: &str, user: FakeGitHubUser) {
        self.users.lock().unwrap().insert(code.to_string(), user);
    }

    fn user_for(&self, headers: &HeaderMap) -> Option<FakeGitHubUser> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))?;
        self.users.lock().unwrap().get(token).cloned()
    }
}

async fn fake_access_token(
    State(github): State<FakeGitHub>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let code = form.get("code").cloned().unwrap_or_default();
    let known = github.users.lock().unwrap().contains_key(&code);

    if known && form.get("client_id").map(String::as_str) == Some("test-client-id") {
        Json(json!({ "access_token": code, "token_type": "bearer", "scope": "read:user,user:email" }))
    } else {
        Json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }))
    }
}

async fn fake_user(State(github): State<FakeGitHub>, headers: HeaderMap) -> Response {
    match github.user_for(&headers) {
        Some(user) => Json(json!({
            "id": user.id,
            "login": user.login,
            "name": user.name,
            "email": user.email,
            "avatar_url": user.avatar_url,
        }))
        .into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn fake_user_emails(State(github): State<FakeGitHub>, headers: HeaderMap) -> Response {
    match github.user_for(&headers) {
        Some(user) => Json(
            user.emails
                .iter()
                .map(|(email, primary, verified)| {
                    json!({ "email": email, "primary": primary, "verified": verified })
                })
                .collect::<Vec<_>>(),
        )
        .into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub github: FakeGitHub,
    pub _temp_dir: TempDir,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        connix::metrics::init_metrics();

        let temp_dir = TempDir::new().unwrap();
        let github = FakeGitHub::start().await;

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                app_url: "http://localhost:8000".to_string(),
                static_dir: temp_dir.path().join("static"),
            },
            database: config::DatabaseConfig {
                path: temp_dir.path().join("test.db"),
            },
            auth: config::AuthConfig {
                session_secret: SESSION_SECRET.to_string(),
                session_max_age: 2_592_000,
                github: config::GitHubOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                    authorize_url: format!("{}/login/oauth/authorize", github.addr),
                    token_url: format!("{}/login/oauth/access_token", github.addr),
                    api_base_url: github.addr.clone(),
                },
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).await.unwrap();

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        let app = connix::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            github,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Directory served under /static
    pub fn static_dir(&self) -> PathBuf {
        self.state.config.server.static_dir.clone()
    }

    /// Insert a user row directly
    pub async fn create_user(&self, github_id: &str, username: &str) -> User {
        let id = self
            .state
            .db
            .insert_user(&NewUser {
                name: format!("{username} name"),
                username: username.to_string(),
                email: format!("{username}@example.com"),
                github_id: github_id.to_string(),
                github_username: username.to_string(),
                github_avatar: Some(format!("https://avatars.example.com/u/{github_id}")),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        self.state.db.get_user(id).await.unwrap().unwrap()
    }

    /// Insert a repository owned by a user
    pub async fn create_repository(&self, owner: &User, name: &str, is_private: bool) -> i64 {
        self.create_repository_at(owner, name, is_private, Utc::now())
            .await
    }

    /// Insert a repository created (and last updated) at `at`
    pub async fn create_repository_at(
        &self,
        owner: &User,
        name: &str,
        is_private: bool,
        at: DateTime<Utc>,
    ) -> i64 {
        self.state
            .db
            .insert_repository(&NewRepository {
                name: name.to_string(),
                slug: name.to_string(),
                description: Some(format!("{name} description")),
                owner: RepositoryOwner::User(owner.id),
                is_private,
                default_branch: "main".to_string(),
                created_at: at,
            })
            .await
            .unwrap()
    }

    /// `Cookie` header value carrying a valid session for `user_id`
    pub fn session_cookie_for(&self, user_id: i64, username: &str) -> String {
        let now = Utc::now();
        let session = Session {
            user_id,
            username: username.to_string(),
            created_at: now,
            expires_at: now + Duration::days(30),
        };
        let token = create_session_token(&session, SESSION_SECRET).unwrap();
        format!("{}={}", SESSION_COOKIE, token)
    }

    pub fn session_cookie(&self, user: &User) -> String {
        self.session_cookie_for(user.id, &user.username)
    }

    /// GET with an optional Cookie header
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.expect("request succeeds")
    }

    /// POST with an optional Cookie header
    pub async fn post(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.post(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.expect("request succeeds")
    }

    /// Run the browser side of the OAuth flow for a registered code
    ///
    /// Returns the callback response.
    pub async fn sign_in_with_code(&self, code: &str) -> reqwest::Response {
        let redirect = self.get("/auth/github", None).await;
        let oauth_state =
            cookie_value(&redirect, "oauth_state").expect("redirect sets oauth_state cookie");

        self.get(
            &format!("/auth/github/callback?code={code}&state={oauth_state}"),
            Some(&format!("oauth_state={oauth_state}")),
        )
        .await
    }
}

/// All Set-Cookie header values of a response
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// Value of the named cookie set by a response
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response).into_iter().find_map(|header| {
        header
            .split(';')
            .next()
            .and_then(|pair| pair.strip_prefix(&prefix))
            .map(ToString::to_string)
    })
}

/// Location header of a redirect
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}
