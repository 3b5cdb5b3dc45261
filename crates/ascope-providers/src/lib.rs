//! Producer adapters: one per AI coding agent log format, each implementing
//! [`traits::ProducerAdapter`] to locate session files and hand back an
//! incremental reader that yields [`ascope_types::Event`]s.

pub mod claude;
pub mod codex;
mod error;
mod jsonl_reader;
pub mod traits;

pub use error::{Error, Result};
pub use jsonl_reader::{JsonlReader, LineParser};
pub use traits::{IncrementalReader, ProducerAdapter};

/// Construct a producer by its stable id.
pub fn producer_for(id: &str) -> Result<Box<dyn ProducerAdapter>> {
    match id {
        "claude_code" | "claude" => Ok(Box::new(claude::ClaudeProducer)),
        "codex" => Ok(Box::new(codex::CodexProducer)),
        _ => Err(Error::UnknownProvider(id.to_string())),
    }
}

/// All producers this build knows about, in priority order for discovery.
pub fn all_producers() -> Vec<Box<dyn ProducerAdapter>> {
    vec![Box::new(claude::ClaudeProducer), Box::new(codex::CodexProducer)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_for_resolves_known_ids() {
        assert_eq!(producer_for("claude_code").unwrap().id(), "claude_code");
        assert_eq!(producer_for("codex").unwrap().id(), "codex");
    }

    #[test]
    fn producer_for_rejects_unknown_id() {
        assert!(producer_for("nonexistent").is_err());
    }
}
