use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use shelfkeeper::config::{Config, StorageConfig};
use shelfkeeper::email::{Notification, Notifier, NotifyError};
use shelfkeeper::state::SharedState;

/// Keeps every notification instead of delivering it. Can be switched to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Vec<String>, Notification)>>,
    pub fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(Vec<String>, Notification)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipients: &[String], notification: &Notification) -> Result<(), NotifyError> {
        if *self.fail.lock().unwrap() {
            return Err(NotifyError("relay refused".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipients.to_vec(), notification.clone()));
        Ok(())
    }
}

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: std::net::SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub state: SharedState,
    pub notifier: Arc<RecordingNotifier>,
}

async fn read(resp: reqwest::Response) -> (Value, StatusCode) {
    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(json!(null));
    (body, status)
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/register"))
            .json(&json!({
                "name": name,
                "email": email,
                "password": password,
                "c_password": password,
            }))
            .send()
            .await
            .expect("register request failed");
        read(resp).await
    }

    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request failed");
        read(resp).await
    }

    /// Register a reader and return their token.
    pub async fn reader(&self, email: &str) -> String {
        let (body, status) = self.register("Reader", email, "password123").await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["results"]["token"].as_str().unwrap().to_string()
    }

    /// Create a book through the API, return its id.
    pub async fn create_book(&self, token: &str, name: &str, total: i32) -> String {
        let (body, status) = self
            .post_auth(
                "/api/books",
                token,
                &json!({
                    "name": name,
                    "description": "A book",
                    "inventory_total_qty": total,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create book failed: {body}");
        body["results"]["book"]["id"].as_str().unwrap().to_string()
    }

    pub async fn checkout(&self, token: &str, book_id: &str, due_date: &str) -> (Value, StatusCode) {
        self.post_auth(
            &format!("/api/books/{book_id}/checkout"),
            token,
            &json!({ "due_date": due_date }),
        )
        .await
    }

    pub async fn return_book(&self, token: &str, book_id: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .patch(self.url(&format!("/api/books/{book_id}/return")))
            .bearer_auth(token)
            .send()
            .await
            .expect("return request failed");
        read(resp).await
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        read(resp).await
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        read(resp).await
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
        read(resp).await
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("delete request failed");
        read(resp).await
    }

    pub async fn checked_qty(&self, book_id: &str) -> i32 {
        sqlx::query_scalar::<_, i32>("SELECT checked_qty FROM books WHERE id = $1")
            .bind(Uuid::parse_str(book_id).unwrap())
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

fn admin_url(base_url: &str) -> String {
    base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.to_string())
}

/// Spawn a test app with a fresh temporary database.
pub async fn spawn_app() -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let db_name = format!("shelfkeeper_test_{}", Uuid::now_v7().simple());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let storage_root = std::env::temp_dir().join(&db_name);

    let config = Config {
        database_url: test_url,
        signing_secret: "test-signing-secret-that-is-long-enough".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://localhost:8000".to_string(),
        frontend_url: "http://localhost:4200".to_string(),
        max_body_size: 1_048_576,
        token_ttl: None,
        log_level: "warn".to_string(),
        storage: StorageConfig {
            root: storage_root,
            public_url: "http://localhost:8000/storage".to_string(),
        },
        report: None,
        smtp: None,
    };

    let notifier = Arc::new(RecordingNotifier::default());
    let (app, state) = shelfkeeper::build_app_with(pool.clone(), config, notifier.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        state,
        notifier,
    }
}

/// Drop the test database and storage directory after a test.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    let storage_root = app.state.config.storage.root.clone();
    app.pool.close().await;
    let _ = tokio::fs::remove_dir_all(storage_root).await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
