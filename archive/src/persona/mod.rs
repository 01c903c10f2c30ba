//! Persona definitions under the data root.
//!
//! `personas.json` holds the definitions, `active_persona.json` the current
//! selection. Both are re-read on every chat call so edits from the UI take
//! effect immediately; nothing here is cached.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    /// System-prompt body injected ahead of the conversation.
    #[serde(default)]
    pub prompt: String,
    /// Backstory/summary appended after the prompt.
    #[serde(default)]
    pub history: String,
    /// Voice sample path forwarded to TTS (out of core).
    #[serde(default)]
    pub voice_sample: Option<String>,
}

impl Persona {
    /// The system message content this persona injects: always
    /// `prompt + "\n" + history`, even when the history is still empty.
    pub fn system_content(&self) -> String {
        format!("{}\n{}", self.prompt, self.history)
    }
}

#[derive(Deserialize)]
struct ActiveSelection {
    #[serde(default)]
    active: Option<String>,
}

pub struct PersonaStore {
    personas_path: PathBuf,
    active_path: PathBuf,
}

impl PersonaStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            personas_path: data_dir.join("personas.json"),
            active_path: data_dir.join("active_persona.json"),
        }
    }

    fn read_personas(&self) -> HashMap<String, Persona> {
        let Ok(raw) = std::fs::read_to_string(&self.personas_path) else {
            return HashMap::new();
        };
        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(error = %e, path = %self.personas_path.display(), "personas.json unparseable");
                HashMap::new()
            }
        }
    }

    /// The currently selected persona, if any. Reads both files fresh.
    pub fn active(&self) -> Option<Persona> {
        let raw = std::fs::read_to_string(&self.active_path).ok()?;
        let selection: ActiveSelection = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "active_persona.json unparseable");
                return None;
            }
        };
        let name = selection.active?;
        let persona = self.read_personas().remove(&name);
        if persona.is_none() {
            tracing::warn!(%name, "active persona not found in personas.json");
        }
        persona
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_files(dir: &Path, personas: &str, active: &str) {
        std::fs::write(dir.join("personas.json"), personas).unwrap();
        std::fs::write(dir.join("active_persona.json"), active).unwrap();
    }

    #[test]
    fn active_persona_is_resolved_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_files(
            dir.path(),
            r#"{"archivist": {"name": "archivist", "prompt": "You are the archivist.", "history": "Keeps the stacks."}}"#,
            r#"{"active": "archivist"}"#,
        );
        let store = PersonaStore::new(dir.path());
        let p = store.active().unwrap();
        assert_eq!(p.name, "archivist");
        assert_eq!(
            p.system_content(),
            "You are the archivist.\nKeeps the stacks."
        );
    }

    #[test]
    fn empty_history_keeps_the_joining_newline() {
        let p = Persona {
            name: "fresh".to_string(),
            prompt: "You are brand new.".to_string(),
            history: String::new(),
            voice_sample: None,
        };
        assert_eq!(p.system_content(), "You are brand new.\n");
    }

    #[test]
    fn missing_files_mean_no_persona() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PersonaStore::new(dir.path()).active().is_none());
    }

    #[test]
    fn selection_without_definition_is_none() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), r#"{}"#, r#"{"active": "ghost"}"#);
        assert!(PersonaStore::new(dir.path()).active().is_none());
    }

    #[test]
    fn edits_take_effect_without_restart() {
        let dir = tempfile::tempdir().unwrap();
        write_files(
            dir.path(),
            r#"{"a": {"name": "a", "prompt": "one"}}"#,
            r#"{"active": "a"}"#,
        );
        let store = PersonaStore::new(dir.path());
        assert_eq!(store.active().unwrap().prompt, "one");

        write_files(
            dir.path(),
            r#"{"a": {"name": "a", "prompt": "two"}}"#,
            r#"{"active": "a"}"#,
        );
        assert_eq!(store.active().unwrap().prompt, "two");
    }
}
