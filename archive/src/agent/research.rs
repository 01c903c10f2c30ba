//! Research agent: retrieval from memory and the librarian, synthesis with
//! numbered citations, optional multi-query mode with a final synthesis pass.

use std::sync::Arc;

use serde::Serialize;

use super::react::AgentError;
use super::prompts::RESEARCH_SYNTHESIS;
use crate::library::LibraryClient;
use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::memory::MemoryStore;

const DEFAULT_TOP_K: usize = 3;

/// One numbered source handed to the synthesis prompt and echoed in the
/// response.
#[derive(Clone, Debug, Serialize)]
pub struct ResearchSource {
    pub number: usize,
    pub origin: String,
    pub text: String,
    pub similarity: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResearchReport {
    pub question: String,
    pub answer: String,
    pub sources: Vec<ResearchSource>,
    pub total_sources: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct MultiResearchReport {
    pub questions: Vec<String>,
    pub results: Vec<ResearchReport>,
    pub synthesis: String,
    pub total_sources: usize,
}

pub struct ResearchAgent {
    llm: Arc<dyn LlmClient>,
    memory: Arc<dyn MemoryStore>,
    library: Option<Arc<LibraryClient>>,
}

impl ResearchAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        memory: Arc<dyn MemoryStore>,
        library: Option<Arc<LibraryClient>>,
    ) -> Self {
        Self {
            llm,
            memory,
            library,
        }
    }

    /// Gathers memory hits and library chunks as one numbered source list.
    /// A missing or failing librarian degrades to memory-only with a note in
    /// the log, never an error.
    async fn gather_sources(&self, question: &str, top_k: usize) -> Vec<ResearchSource> {
        let mut sources = Vec::new();

        match self.memory.search(question, top_k, None).await {
            Ok(hits) => {
                for h in hits {
                    sources.push(ResearchSource {
                        number: 0,
                        origin: "memory".to_string(),
                        text: h.entry.message,
                        similarity: h.similarity,
                    });
                }
            }
            Err(e) => tracing::warn!(error = %e, "memory search failed during research"),
        }

        if let Some(library) = &self.library {
            match library.search(question, top_k).await {
                Ok(chunks) => {
                    for c in chunks {
                        sources.push(ResearchSource {
                            number: 0,
                            origin: format!("library:{}#{}", c.filename, c.chunk_index),
                            text: c.text,
                            similarity: c.similarity,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "library unavailable, research degrades to memory only")
                }
            }
        }

        sources.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        sources.truncate(top_k * 2);
        for (i, s) in sources.iter_mut().enumerate() {
            s.number = i + 1;
        }
        sources
    }

    pub async fn run(&self, question: &str, top_k: Option<usize>) -> Result<ResearchReport, AgentError> {
        let top_k = top_k.unwrap_or(DEFAULT_TOP_K).clamp(1, 20);
        let sources = self.gather_sources(question, top_k).await;

        let answer = if sources.is_empty() {
            "No sources found in memory or the library for this question.".to_string()
        } else {
            let source_block: String = sources
                .iter()
                .map(|s| format!("[Source {}] ({}) {}", s.number, s.origin, s.text))
                .collect::<Vec<_>>()
                .join("\n");
            let messages = [
                ChatMessage::system(RESEARCH_SYNTHESIS),
                ChatMessage::user(format!("{source_block}\n\nQuestion: {question}")),
            ];
            self.llm
                .chat(&messages, &ChatOptions::with_temperature(0.3))
                .await?
                .text
        };

        let total_sources = sources.len();
        Ok(ResearchReport {
            question: question.to_string(),
            answer,
            sources,
            total_sources,
        })
    }

    /// Answers each question, then asks for one synthesis section over the
    /// per-question answers.
    pub async fn run_multi(&self, questions: &[String]) -> Result<MultiResearchReport, AgentError> {
        let mut results = Vec::with_capacity(questions.len());
        for q in questions {
            results.push(self.run(q, None).await?);
        }

        let combined: String = results
            .iter()
            .map(|r| format!("Q: {}\nA: {}", r.question, r.answer))
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages = [
            ChatMessage::system(
                "Combine the answers below into one coherent synthesis. Keep the [Source N] citations.",
            ),
            ChatMessage::user(combined),
        ];
        let synthesis = self
            .llm
            .chat(&messages, &ChatOptions::with_temperature(0.3))
            .await?
            .text;

        let total_sources = results.iter().map(|r| r.total_sources).sum();
        Ok(MultiResearchReport {
            questions: questions.to_vec(),
            results,
            synthesis,
            total_sources,
        })
    }
}
