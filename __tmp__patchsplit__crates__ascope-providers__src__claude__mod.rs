mod discovery;
mod parser;
mod schema;

pub use discovery::ClaudeProducer;
pub use parser::{normalize_record, ClaudeLineParser};
pub use schema::ClaudeRecord;


