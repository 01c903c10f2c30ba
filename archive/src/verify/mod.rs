//! Chain-of-verification: draft, plan verification questions, answer them
//! independently, revise.
//!
//! Four LLM calls at distinct temperatures. Answers are produced in fresh
//! context, with the draft deliberately withheld so the checks cannot
//! inherit its mistakes. Any step failure degrades to a partial trace whose
//! `final` falls back to the draft.

use std::sync::Arc;

use serde::Serialize;

use crate::llm::{ChatMessage, ChatOptions, LlmClient};

const MAX_QUESTIONS: usize = 3;

const DRAFT_TEMP: f32 = 0.7;
const CHECK_TEMP: f32 = 0.3;
const REVISE_TEMP: f32 = 0.5;

/// One verification question with its independently produced answer.
#[derive(Clone, Debug, Serialize)]
pub struct VerificationQa {
    pub q: String,
    pub a: String,
}

/// Full trace of one verification run.
#[derive(Clone, Debug, Serialize)]
pub struct VerificationTrace {
    pub initial: String,
    pub questions: Vec<String>,
    pub qa: Vec<VerificationQa>,
    #[serde(rename = "final")]
    pub final_answer: String,
    pub revised: bool,
}

pub struct VerificationChain {
    llm: Arc<dyn LlmClient>,
}

/// Splits the model's question list on numbering/bullets and newlines, trims
/// decoration, dedupes, caps at [`MAX_QUESTIONS`].
fn parse_questions(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in raw.lines() {
        let cleaned = line
            .trim()
            .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')' || c == '-' || c == '*')
            .trim()
            .to_string();
        if cleaned.len() < 8 || !cleaned.contains('?') {
            continue;
        }
        if out.iter().any(|q| q.eq_ignore_ascii_case(&cleaned)) {
            continue;
        }
        out.push(cleaned);
        if out.len() == MAX_QUESTIONS {
            break;
        }
    }
    out
}

/// Whitespace-insensitive equality used for the `revised` flag.
fn normalized(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl VerificationChain {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    async fn chat_one(&self, system: &str, user: String, temp: f32) -> Result<String, crate::llm::LlmError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        Ok(self
            .llm
            .chat(&messages, &ChatOptions::with_temperature(temp))
            .await?
            .text)
    }

    /// Runs the four-step chain. Never fails outright: the first successful
    /// prefix of the pipeline is returned as a partial trace.
    pub async fn run(&self, question: &str) -> VerificationTrace {
        // Step 1: draft.
        let initial = match self
            .chat_one("Answer the question.", question.to_string(), DRAFT_TEMP)
            .await
        {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "verification draft failed");
                return VerificationTrace {
                    initial: String::new(),
                    questions: vec![],
                    qa: vec![],
                    final_answer: String::new(),
                    revised: false,
                };
            }
        };

        let partial = |questions: Vec<String>, qa: Vec<VerificationQa>| VerificationTrace {
            initial: initial.clone(),
            questions,
            qa,
            final_answer: initial.clone(),
            revised: false,
        };

        // Step 2: plan 2-3 verification questions about specific claims.
        let plan = self
            .chat_one(
                "List 2-3 short verification questions, one per line, that check the specific factual claims in the answer below. Only output the questions.",
                format!("Question: {question}\n\nAnswer to verify:\n{initial}"),
                CHECK_TEMP,
            )
            .await;
        let questions = match plan {
            Ok(raw) => parse_questions(&raw),
            Err(e) => {
                tracing::warn!(error = %e, "verification planning failed");
                return partial(vec![], vec![]);
            }
        };
        if questions.is_empty() {
            return partial(vec![], vec![]);
        }

        // Step 3: answer each question in fresh context (no draft included).
        let mut qa = Vec::with_capacity(questions.len());
        for q in &questions {
            match self
                .chat_one("Answer concisely and factually.", q.clone(), CHECK_TEMP)
                .await
            {
                Ok(a) => qa.push(VerificationQa { q: q.clone(), a }),
                Err(e) => {
                    tracing::warn!(error = %e, "verification answer failed");
                    return partial(questions.clone(), qa);
                }
            }
        }

        // Step 4: revise given the original question, the draft, and the checks.
        let checks: String = qa
            .iter()
            .map(|p| format!("Q: {}\nA: {}", p.q, p.a))
            .collect::<Vec<_>>()
            .join("\n");
        let revision = self
            .chat_one(
                "Revise the draft answer so it is consistent with the verification answers. Output only the corrected answer.",
                format!(
                    "Original question: {question}\n\nDraft answer:\n{initial}\n\nVerification:\n{checks}"
                ),
                REVISE_TEMP,
            )
            .await;

        match revision {
            Ok(final_answer) => {
                let revised = normalized(&final_answer) != normalized(&initial);
                VerificationTrace {
                    initial,
                    questions,
                    qa,
                    final_answer,
                    revised,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "verification revision failed");
                partial(questions, qa)
            }
        }
    }
}
