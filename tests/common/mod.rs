//! Test harness: a real gateway on an ephemeral port, backed by the in-memory
//! store and a wiremock stand-in for the prediction service.

#![allow(dead_code)]

use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::MockServer;

use agrosense::db::MemoryStore;
use agrosense::services::HttpPredictionClient;
use agrosense::{serve, AppState, Args};

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-chars";

pub struct TestGateway {
    pub base: String,
    pub store: MemoryStore,
    pub ml: MockServer,
    pub upload_dir: TempDir,
    pub http: reqwest::Client,
}

impl TestGateway {
    pub async fn spawn() -> Self {
        let ml = MockServer::start().await;
        let upload_dir = TempDir::new().unwrap();

        let args = Args::parse_from([
            "agrosense".to_string(),
            "--jwt-secret".to_string(),
            TEST_SECRET.to_string(),
            "--ml-service-url".to_string(),
            ml.uri(),
            "--upload-dir".to_string(),
            upload_dir.path().display().to_string(),
            "--listen".to_string(),
            "127.0.0.1:0".to_string(),
        ]);

        let store = MemoryStore::new();
        let prediction = Arc::new(HttpPredictionClient::new(&ml.uri()));
        let state = AppState::new(args, Arc::new(store.clone()), prediction, "memory").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::new(state)));

        Self {
            base: format!("http://{}", addr),
            store,
            ml,
            upload_dir,
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Register a farmer and return the auth response body
    pub async fn register(&self, phone: &str, password: &str) -> Value {
        let response = self
            .http
            .post(self.url("/auth/register"))
            .json(&json!({
                "name": "Lakshmi",
                "phone": phone,
                "password": password,
                "village": "Anand",
                "district": "Kheda",
                "state": "Gujarat"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }

    /// Register a farmer and return just the token
    pub async fn token(&self, phone: &str) -> String {
        let body = self.register(phone, "kharif-season").await;
        body["token"].as_str().unwrap().to_string()
    }

    /// Number of files left in the upload directory
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path()).unwrap().count()
    }
}
