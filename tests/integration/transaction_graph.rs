use reqwest::StatusCode;
use uuid::Uuid;

use crate::common::test_harness::TestServer;

const ROOT: Uuid = Uuid::nil();

#[tokio::test]
async fn happy_path_two_commits() {
    let server = TestServer::start().await;
    let user = "alice";

    server.create_chunk(user, "aa", b"AY").await;
    server.create_chunk(user, "bb", b"BE").await;

    let t1 = Uuid::new_v4();
    let resp = server.create_transaction(user, t1, ROOT, &["bb", "aa"]).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    server.create_chunk(user, "cc", b"SI").await;
    let t2 = Uuid::new_v4();
    let resp = server.create_transaction(user, t2, t1, &["cc"]).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = server.set_head(user, t2).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    assert_eq!(server.get_head(user).await, t2);

    let resp = server
        .client
        .get(server.url(&format!("/0.1/{user}/transactions")))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let ids: Vec<Uuid> = body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| Uuid::parse_str(v.as_str().unwrap()).unwrap())
        .collect();
    assert_eq!(ids, vec![t1, t2]);
}

#[tokio::test]
async fn conflicting_sibling_commits_from_root() {
    let server = TestServer::start().await;
    let user = "bob";
    server.create_chunk(user, "xx", b"xx").await;

    let t1 = Uuid::new_v4();
    let resp = server.create_transaction(user, t1, ROOT, &["xx"]).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let t2 = Uuid::new_v4();
    let resp = server.create_transaction(user, t2, ROOT, &["xx"]).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn skip_the_leaf_commit_is_rejected() {
    let server = TestServer::start().await;
    let user = "carol";
    server.create_chunk(user, "xx", b"xx").await;

    let t1 = Uuid::new_v4();
    server.create_transaction(user, t1, ROOT, &["xx"]).await;
    let t2 = Uuid::new_v4();
    server.create_transaction(user, t2, t1, &["xx"]).await;

    let resp = server.set_head(user, t1).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn multi_step_commit_promotes_whole_chain() {
    let server = TestServer::start().await;
    let user = "dave";
    server.create_chunk(user, "xx", b"xx").await;

    let t1 = Uuid::new_v4();
    server.create_transaction(user, t1, ROOT, &["xx"]).await;
    let t2 = Uuid::new_v4();
    server.create_transaction(user, t2, t1, &["xx"]).await;
    let t3 = Uuid::new_v4();
    server.create_transaction(user, t3, t2, &["xx"]).await;
    let t4 = Uuid::new_v4();
    server.create_transaction(user, t4, t3, &["xx"]).await;

    let resp = server.set_head(user, t4).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(server.get_head(user).await, t4);
}

#[tokio::test]
async fn create_transaction_with_missing_chunk_is_404() {
    let server = TestServer::start().await;
    let user = "erin";
    let t1 = Uuid::new_v4();
    let resp = server.create_transaction(user, t1, ROOT, &["no-such-chunk"]).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_transaction_with_nonexistent_parent_is_409() {
    let server = TestServer::start().await;
    let user = "frank";
    server.create_chunk(user, "xx", b"xx").await;
    let ghost_parent = Uuid::new_v4();
    let t1 = Uuid::new_v4();
    let resp = server.create_transaction(user, t1, ghost_parent, &["xx"]).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn get_transaction_returns_ordered_chunks() {
    let server = TestServer::start().await;
    let user = "grace";
    server.create_chunk(user, "bb", b"BE").await;
    server.create_chunk(user, "aa", b"AY").await;

    let t1 = Uuid::new_v4();
    server.create_transaction(user, t1, ROOT, &["bb", "aa"]).await;

    let resp = server
        .client
        .get(server.url(&format!("/0.1/{user}/transactions/{t1}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["chunks"], serde_json::json!(["bb", "aa"]));
    assert_eq!(body["parent"], serde_json::json!(ROOT));
}

#[tokio::test]
async fn get_unknown_transaction_is_404() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .get(server.url(&format!("/0.1/someone/transactions/{}", Uuid::new_v4())))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
