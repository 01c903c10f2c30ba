use serde_json::json;

use crate::common;

#[tokio::test]
async fn list_is_paginated_and_newest_first() {
    let srv = common::spawn().await;
    for i in 0..3 {
        srv.seed_memory(&format!("memory {i}"), 100.0 + i as f64).await;
    }

    let (status, body) = srv.get_json("/memories?limit=2&offset=0").await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 3);
    let memories = body["memories"].as_array().unwrap();
    assert_eq!(memories.len(), 2);
    assert_eq!(memories[0]["message"], "memory 2");
    // Embeddings never leave through the API.
    assert!(memories[0].get("embedding").is_none());
}

#[tokio::test]
async fn search_returns_similarity_ranked_hits() {
    let srv = common::spawn().await;
    srv.seed_memory("my cat is named Miso", 100.0).await;
    srv.seed_memory("the weather is cloudy today", 101.0).await;

    let (status, body) = srv
        .post_json("/memories/search", json!({"query": "what is my cat named", "top_k": 1}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 1);
    let hit = &body["memories"][0];
    assert!(hit["message"].as_str().unwrap().contains("Miso"));
    assert!(hit["similarity"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn get_and_delete_round_trip_with_404_after() {
    let srv = common::spawn().await;
    let id = srv.seed_memory("disposable fact", 100.0).await;

    let (status, body) = srv.get_json(&format!("/memories/{id}")).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "disposable fact");

    let resp = srv
        .http
        .delete(srv.url(&format!("/memories/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "deleted");
    assert_eq!(body["id"], id);

    let (status, body) = srv.get_json(&format!("/memories/{id}")).await;
    assert_eq!(status, 404);
    assert!(body["detail"].as_str().unwrap().contains(&id));
}

#[tokio::test]
async fn empty_search_query_is_a_400() {
    let srv = common::spawn().await;
    let (status, body) = srv.post_json("/memories/search", json!({"query": " "})).await;
    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("query"));
}
