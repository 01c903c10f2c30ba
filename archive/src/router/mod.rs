//! Intent router for `/chat`: a lightweight pattern matcher that sends a
//! message to the help text, the memory search, or the LLM.

use once_cell::sync::Lazy;
use regex::Regex;

/// Routed intent with confidence and extracted parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    /// Greeting/help request; handled inline with a static response.
    Help,
    /// Memory lookup with the residual query after trigger words.
    SearchMemory { query: String },
    /// Everything else: a plain chat completion.
    Chat,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Help => "help",
            Intent::SearchMemory { .. } => "search_memory",
            Intent::Chat => "chat",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Intent::Help | Intent::SearchMemory { .. } => 0.9,
            Intent::Chat => 0.8,
        }
    }
}

static HELP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(help|\?|hi|hello|hey)[.!?\s]*$|what can you do").unwrap()
});

/// Memory triggers with the query in a capture group.
static SEARCH_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)what did i (?:say|tell you) about\s+(.+)",
        r"(?i)^\s*(?:do you )?remember\s+(.+)",
        r"(?i)^\s*recall\s+(.+)",
        r"(?i)find my\s+(.+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Filler stripped from the head and tail of an extracted query.
static QUERY_TRIM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:that|about|the|my)\s+|[.!?\s]+$").unwrap());

fn clean_query(raw: &str) -> String {
    let mut q = raw.trim().to_string();
    loop {
        let next = QUERY_TRIM_RE.replace_all(&q, "").to_string();
        if next == q {
            break;
        }
        q = next;
    }
    q
}

/// Classifies one user message.
pub fn route(message: &str) -> Intent {
    if HELP_RE.is_match(message) {
        return Intent::Help;
    }
    for re in SEARCH_RES.iter() {
        if let Some(cap) = re.captures(message) {
            let query = clean_query(&cap[1]);
            if !query.is_empty() {
                return Intent::SearchMemory { query };
            }
        }
    }
    Intent::Chat
}

/// Static reply for the help intent.
pub const HELP_RESPONSE: &str = "\
I can chat, run multi-step agents with tools (calculator, code execution, \
date/time, JSON), search my long-term memory of our conversations, research \
questions against memory and the document library, verify answers against \
themselves, and write-and-test Python for you. Just ask in plain language; \
for past topics try \"what did I say about ...\".";
