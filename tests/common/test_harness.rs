//! Integration test harness: an in-process MentatSync server over an
//! in-memory database, driven over real HTTP with `reqwest`.
//!
//! Each test gets its own server bound to an OS-assigned port, so tests can
//! run concurrently without colliding on fixed ports or shared files: there's
//! no on-disk state to race over since the backend is `sqlite::memory:`.

use std::net::SocketAddr;
use std::sync::Arc;

use mentatsync::app_state::AppState;
use mentatsync::server::http_api::create_router;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let app_state = Arc::new(AppState::new_in_memory().await.expect("in-memory storage"));
        let app = create_router(app_state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            _handle: handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn create_chunk(&self, user: &str, chunk: &str, payload: &[u8]) -> reqwest::Response {
        self.client
            .put(self.url(&format!("/0.1/{user}/chunks/{chunk}")))
            .body(payload.to_vec())
            .send()
            .await
            .unwrap()
    }

    pub async fn create_transaction(
        &self,
        user: &str,
        trnid: Uuid,
        parent: Uuid,
        chunks: &[&str],
    ) -> reqwest::Response {
        let body = serde_json::json!({ "parent": parent, "chunks": chunks });
        self.client
            .put(self.url(&format!("/0.1/{user}/transactions/{trnid}")))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn set_head(&self, user: &str, trnid: Uuid) -> reqwest::Response {
        let body = serde_json::json!({ "head": trnid });
        self.client
            .put(self.url(&format!("/0.1/{user}/head")))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn get_head(&self, user: &str) -> Uuid {
        let resp = self.client.get(self.url(&format!("/0.1/{user}/head"))).send().await.unwrap();
        let body: serde_json::Value = resp.json().await.unwrap();
        Uuid::parse_str(body["head"].as_str().unwrap()).unwrap()
    }
}
