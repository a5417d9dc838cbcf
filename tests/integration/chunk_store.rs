use reqwest::StatusCode;

use crate::common::test_harness::TestServer;

#[tokio::test]
async fn create_and_fetch_chunk_roundtrips_payload() {
    let server = TestServer::start().await;
    let resp = server.create_chunk("alice", "aa", b"payload-bytes").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = server
        .client
        .get(server.url("/0.1/alice/chunks/aa"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"payload-bytes");
}

#[tokio::test]
async fn create_chunk_is_idempotent_over_http() {
    let server = TestServer::start().await;
    server.create_chunk("alice", "aa", b"first").await;
    server.create_chunk("alice", "aa", b"second").await;

    let resp = server
        .client
        .get(server.url("/0.1/alice/chunks/aa"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"first");
}

#[tokio::test]
async fn missing_chunk_returns_404() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .get(server.url("/0.1/alice/chunks/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chunks_are_isolated_per_user() {
    let server = TestServer::start().await;
    server.create_chunk("alice", "aa", b"alice-data").await;

    let resp = server
        .client
        .get(server.url("/0.1/bob/chunks/aa"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
