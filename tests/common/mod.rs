// tests/common/mod.rs

#![allow(dead_code)]

use std::net::SocketAddr;

use lms_backend::{config::Config, db, routes, state::AppState};
use serde_json::{Value, json};
use sqlx::SqlitePool;

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
}

/// Spawns the app on a random port backed by a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    let database_url = "sqlite::memory:".to_string();

    let pool = db::connect(&database_url)
        .await
        .expect("Failed to open in-memory database");

    db::migrate(&pool).await.expect("Failed to migrate database");

    let config = Config {
        database_url,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        bind_addr: "127.0.0.1:0".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        submit_grace_seconds: 30,
        rate_limit_replenish_ms: 1,
        rate_limit_burst: 1000,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client: reqwest::Client::new(),
    }
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Registers a fresh user and returns its bearer token.
    pub async fn user_token(&self) -> String {
        let username = unique_name("u");
        self.register(&username, "password123").await;
        self.token_for(&username).await
    }

    /// Registers a fresh user, promotes it to admin and returns its token.
    pub async fn admin_token(&self) -> String {
        let username = unique_name("adm");
        self.register(&username, "password123").await;
        sqlx::query("UPDATE users SET role = 'admin' WHERE username = ?")
            .bind(&username)
            .execute(&self.pool)
            .await
            .unwrap();
        self.token_for(&username).await
    }

    async fn token_for(&self, username: &str) -> String {
        let body: Value = self
            .login(username, "password123")
            .await
            .json()
            .await
            .expect("Failed to parse login json");
        body["token"].as_str().expect("Token not found").to_string()
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Creates a test as admin and returns its id.
    pub async fn create_test(&self, admin: &str, body: Value) -> i64 {
        let resp = self.post("/api/admin/tests", admin, body).await;
        assert_eq!(resp.status().as_u16(), 201);
        let test: Value = resp.json().await.unwrap();
        test["id"].as_i64().unwrap()
    }

    pub async fn upload_answer_key(&self, admin: &str, test_id: i64, bytes: Vec<u8>) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(bytes).file_name("answer_key.xlsx");
        let form = reqwest::multipart::Form::new().part("file", part);

        self.client
            .post(self.url(&format!("/api/admin/tests/{}/questions", test_id)))
            .bearer_auth(admin)
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Builds an answer-key workbook: a header row, then each row written
/// cell by cell as `question, options..., answer`.
pub fn answer_key_workbook(rows: Vec<Vec<&str>>) -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();

    sheet.write_string(0, 0, "Question").unwrap();
    sheet.write_string(0, 1, "Options").unwrap();

    for (i, row) in rows.iter().enumerate() {
        for (j, cell) in row.iter().enumerate() {
            sheet.write_string(i as u32 + 1, j as u16, *cell).unwrap();
        }
    }

    workbook.save_to_buffer().unwrap()
}
