//! Parser for the model's ReAct output.
//!
//! Deliberately tolerant: a small descent over `Thought:` / `Action:` /
//! `Action Input:` line groups with lookahead to coalesce multi-line inputs.
//! Survives extra whitespace, fenced or quoted action inputs, and arbitrary
//! casing of labels and tool names.

/// What the model decided to do this iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedAction {
    /// Invoke the named tool (name as written; matched case-insensitively).
    Tool(String),
    FinalAnswer,
}

/// One parsed thought/action/input triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedStep {
    pub thought: String,
    pub action: ParsedAction,
    pub input: String,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no Action line found in model output")]
    MissingAction,
    #[error("Action line has no tool name")]
    EmptyAction,
}

/// Label match at the start of a line, tolerant of case and leading spaces.
/// Returns the rest of the line after the label and colon.
fn match_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let trimmed = line.trim_start();
    if trimmed.len() <= label.len() || !trimmed.is_char_boundary(label.len()) {
        return None;
    }
    let (head, rest) = trimmed.split_at(label.len());
    if head.eq_ignore_ascii_case(label) {
        rest.strip_prefix(':').map(str::trim_start)
    } else {
        None
    }
}

/// Strips one layer of code fencing, then one layer of symmetric quotes.
fn clean_input(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(inner) = s.strip_prefix("```") {
        let inner = inner.strip_suffix("```").unwrap_or(inner);
        // Opening fence may carry a language tag on its own line.
        s = match inner.split_once('\n') {
            Some((first, rest)) if !first.trim().contains(' ') && first.len() <= 12 => rest,
            _ => inner,
        };
        s = s.trim();
    }
    let bytes = s.as_bytes();
    if s.len() >= 2
        && ((bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\''))
    {
        s = &s[1..s.len() - 1];
    }
    s.to_string()
}

/// Parses one model turn into a step. The last `Thought:`/`Action:` group
/// wins when the model emits several; everything after `Action Input:` up to
/// the next label (or the end) is the input.
pub fn parse_step(output: &str) -> Result<ParsedStep, ParseError> {
    let lines: Vec<&str> = output.lines().collect();

    let mut thought: Vec<String> = Vec::new();
    let mut action: Option<String> = None;
    let mut input_lines: Vec<String> = Vec::new();
    let mut section = Section::None;

    #[derive(PartialEq)]
    enum Section {
        None,
        Thought,
        Input,
    }

    for line in &lines {
        if let Some(rest) = match_label(line, "Thought") {
            // A fresh Thought starts a new group; earlier groups are stale.
            thought.clear();
            action = None;
            input_lines.clear();
            thought.push(rest.to_string());
            section = Section::Thought;
        } else if let Some(rest) = match_label(line, "Action Input") {
            input_lines.push(rest.to_string());
            section = Section::Input;
        } else if let Some(rest) = match_label(line, "Action") {
            action = Some(rest.trim().to_string());
            section = Section::None;
        } else if let Some(rest) = match_label(line, "Observation") {
            // The model sometimes hallucinates its own observation; stop there.
            let _ = rest;
            break;
        } else {
            match section {
                Section::Thought => thought.push(line.trim().to_string()),
                Section::Input => input_lines.push(line.to_string()),
                Section::None => {}
            }
        }
    }

    let action = action.ok_or(ParseError::MissingAction)?;
    if action.is_empty() {
        return Err(ParseError::EmptyAction);
    }

    let normalized = action.trim().trim_matches('"').trim_matches('\'');
    let parsed_action = if normalized.eq_ignore_ascii_case("final answer") {
        ParsedAction::FinalAnswer
    } else {
        ParsedAction::Tool(normalized.to_string())
    };

    Ok(ParsedStep {
        thought: thought.join("\n").trim().to_string(),
        action: parsed_action,
        input: clean_input(&input_lines.join("\n")),
    })
}
