use serde_json::json;

use crate::common;

/// Calculator then DateTime then Final Answer, over the advanced registry.
#[tokio::test]
async fn calculator_then_datetime_chain_succeeds() {
    let srv = common::spawn().await;
    srv.llm
        .push_reply("Thought: multiply first\nAction: Calculator\nAction Input: 15 * 23");
    srv.llm
        .push_reply("Thought: now the time\nAction: DateTime\nAction Input: time");
    srv.llm.push_reply(
        "Thought: done\nAction: Final Answer\nAction Input: 345, and the current time is above.",
    );

    let (status, body) = srv
        .post_json(
            "/agent/advanced",
            json!({"question": "Calculate 15 multiplied by 23, then tell me the current time"}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["total_steps"], 3);

    let steps = body["steps"].as_array().unwrap();
    assert_eq!(steps[0]["action"], "Calculator");
    assert_eq!(steps[0]["observation"], "345");
    assert_eq!(steps[1]["action"], "DateTime");
    assert_eq!(steps[2]["action"], "Final Answer");
    assert!(body["answer"].as_str().unwrap().contains("345"));
}

/// A denied import is blocked by validation before any sandbox contact, and
/// the loop keeps going.
#[tokio::test]
async fn code_validator_blocks_os_import_and_loop_continues() {
    let srv = common::spawn().await;
    srv.llm.push_reply(
        "Thought: run it\nAction: CodeExecution\nAction Input: import os; print(os.listdir('/'))",
    );
    srv.llm
        .push_reply("Thought: blocked\nAction: Final Answer\nAction Input: That import is not allowed.");

    let (status, body) = srv
        .post_json(
            "/agent/advanced",
            json!({"question": "run: import os; print(os.listdir('/'))"}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    let steps = body["steps"].as_array().unwrap();
    let obs = steps[0]["observation"].as_str().unwrap();
    assert!(obs.starts_with("Validation Error:"), "got: {obs}");
    assert!(obs.contains("os"));
}

#[tokio::test]
async fn basic_agent_does_not_know_advanced_tools() {
    let srv = common::spawn().await;
    srv.llm
        .push_reply("Thought: t\nAction: DateTime\nAction Input: now");
    srv.llm
        .push_reply("Thought: t\nAction: Final Answer\nAction Input: nevermind");

    let (status, body) = srv.post_json("/agent", json!({"question": "time?"})).await;
    assert_eq!(status, 200);
    let steps = body["steps"].as_array().unwrap();
    assert!(steps[0]["observation"]
        .as_str()
        .unwrap()
        .contains("unknown tool"));
}

#[tokio::test]
async fn step_budget_exhaustion_reports_failure() {
    let srv = common::spawn().await;
    // Fallback loops forever on the same tool call.
    for _ in 0..2 {
        srv.llm
            .push_reply("Thought: again\nAction: Calculator\nAction Input: 1 + 1");
    }
    let (status, body) = srv
        .post_json("/agent", json!({"question": "loop", "max_steps": 2}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], false);
    assert_eq!(body["total_steps"], 2);
    assert!(body["answer"].as_str().unwrap().contains("step limit"));
}

#[tokio::test]
async fn recursive_agent_requires_a_corpus() {
    let srv = common::spawn().await;
    let (status, body) = srv
        .post_json("/agent/recursive", json!({"question": "summarize"}))
        .await;
    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("corpus"));
}

#[tokio::test]
async fn empty_question_is_a_400() {
    let srv = common::spawn().await;
    let (status, body) = srv.post_json("/agent", json!({"question": ""})).await;
    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("question"));
}
