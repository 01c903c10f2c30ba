use serde_json::json;

use crate::common;

#[tokio::test]
async fn verification_trace_is_well_formed() {
    let srv = common::spawn().await;
    srv.llm.push_reply("Paris is the capital of France.");
    srv.llm
        .push_reply("1. Is Paris the capital of France?\n2. Is France in Europe?");
    srv.llm.push_reply("Yes, it is the capital.");
    srv.llm.push_reply("Yes, France is in Europe.");
    srv.llm
        .push_reply("Paris is the capital of France, which is in Europe.");

    let (status, body) = srv
        .post_json("/verify", json!({"message": "What is the capital of France?"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["initial_response"], "Paris is the capital of France.");

    let questions = body["verification_questions"].as_array().unwrap();
    assert!(questions.len() >= 2 && questions.len() <= 3);

    let qa = body["verification_qa"].as_array().unwrap();
    assert_eq!(qa.len(), questions.len());
    assert!(qa[0]["q"].is_string() && qa[0]["a"].is_string());

    assert!(!body["final_response"].as_str().unwrap().is_empty());
    assert_eq!(body["revised"], true);
}

#[tokio::test]
async fn unrevised_answer_reports_revised_false() {
    let srv = common::spawn().await;
    srv.llm.push_reply("The answer.");
    srv.llm.push_reply("1. Is the answer correct?");
    srv.llm.push_reply("Yes.");
    srv.llm.push_reply("The answer.");

    let (status, body) = srv.post_json("/verify", json!({"message": "q"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["revised"], false);
    assert_eq!(body["final_response"], body["initial_response"]);
}

#[tokio::test]
async fn empty_message_is_a_400() {
    let srv = common::spawn().await;
    let (status, body) = srv.post_json("/verify", json!({})).await;
    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("message"));
}
