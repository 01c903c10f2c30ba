use serde_json::json;

use crate::common;

#[tokio::test]
async fn help_intent_is_answered_inline() {
    let srv = common::spawn().await;
    let (status, body) = srv.post_json("/chat", json!({"message": "help"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["engine"], "router");
    assert!(body["response"].as_str().unwrap().contains("memory"));
    // No LLM involved for the static help reply.
    assert_eq!(srv.llm.call_count(), 0);
}

#[tokio::test]
async fn memory_intent_searches_the_store() {
    let srv = common::spawn().await;
    srv.seed_memory("the project deadline is Friday", 100.0).await;

    let (status, body) = srv
        .post_json("/chat", json!({"message": "what did I say about the project deadline"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["engine"], "memory");
    assert!(body["response"].as_str().unwrap().contains("Friday"));
}

#[tokio::test]
async fn default_intent_chats_with_the_fast_engine() {
    let srv = common::spawn().await;
    srv.llm.push_reply("hello back");

    let (status, body) = srv
        .post_json("/chat", json!({"message": "tell me something nice"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["engine"], "fast");
    assert_eq!(body["response"], "hello back");
}

#[tokio::test]
async fn every_chat_turn_lands_on_the_input_stream() {
    let srv = common::spawn().await;
    srv.llm.push_reply("ok");
    let _ = srv
        .post_json("/chat", json!({"message": "remember this moment"}))
        .await;

    // The append is detached; give it a beat.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    use archive::stream::{Cursor, InputStream};
    let read = srv
        .stream
        .read_batch(&Cursor::Beginning, 10, std::time::Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(read.len(), 1);
    assert!(read[0].1.message.contains("remember this moment"));
}

#[tokio::test]
async fn empty_message_is_a_400_with_detail() {
    let srv = common::spawn().await;
    let (status, body) = srv.post_json("/chat", json!({"message": "  "})).await;
    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("message"));
}

#[tokio::test]
async fn persona_prompt_is_prepended_fresh_each_call() {
    let srv = common::spawn().await;
    std::fs::write(
        srv.data_dir.path().join("personas.json"),
        r#"{"curator": {"name": "curator", "prompt": "You are the curator.", "history": ""}}"#,
    )
    .unwrap();
    std::fs::write(
        srv.data_dir.path().join("active_persona.json"),
        r#"{"active": "curator"}"#,
    )
    .unwrap();

    srv.llm.push_reply("as the curator");
    let (status, _) = srv.post_json("/chat", json!({"message": "who are you"})).await;
    assert_eq!(status, 200);

    let calls = srv.llm.calls.lock().unwrap();
    let last = calls.last().unwrap();
    assert_eq!(last.messages[0].role, "system");
    assert!(last.messages[0].content.contains("curator"));
}
