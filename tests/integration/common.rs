use std::sync::Arc;
use std::time::Duration;

use circulation_server::{
    api,
    config::AppConfig,
    models::member::{Claims, Role},
    repository::Repository,
    services::Services,
    AppState,
};
use reqwest::Client;
use serde_json::{json, Value};

pub const JWT_SECRET: &str = "integration-secret";

pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = JWT_SECRET.to_string();
        config.circulation.lock_timeout_ms = 1000;

        let repository = Repository::in_memory(Duration::from_millis(config.circulation.lock_timeout_ms));
        let services = Services::new(repository, &config.circulation);
        let app = api::create_router(AppState {
            config: Arc::new(config),
            services: Arc::new(services),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api/v1", addr),
            client: Client::new(),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register a borrower through the API and return its id
    pub async fn register(&self, name: &str, email: &str, role: &str) -> i64 {
        let res = self
            .client
            .post(self.url("/members"))
            .bearer_auth(librarian_token())
            .json(&json!({ "name": name, "email": email, "role": role }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn create_item(&self, identifier: &str, total_copies: i32) -> Value {
        let res = self
            .client
            .post(self.url("/items"))
            .bearer_auth(librarian_token())
            .json(&json!({
                "title": format!("Title {}", identifier),
                "author": "Jane Austen",
                "genre": "Classic",
                "identifier": identifier,
                "total_copies": total_copies,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::CREATED);
        res.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn token(borrower_id: i64, role: Role) -> String {
    Claims::new(borrower_id, role, chrono::Duration::minutes(10))
        .create_token(JWT_SECRET)
        .expect("failed to encode jwt")
}

/// Librarian token for a borrower that need not exist in the directory
pub fn librarian_token() -> String {
    token(9_000, Role::Librarian)
}
