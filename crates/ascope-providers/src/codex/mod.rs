mod discovery;
mod parser;
mod schema;

pub use discovery::CodexProducer;
pub use parser::{normalize_record, CodexLineParser};
pub use schema::CodexRecord;
