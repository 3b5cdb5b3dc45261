use crate::traits::IncrementalReader;
use crate::Result;
use ascope_types::Event;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;

/// Converts one raw JSONL line into zero-or-one normalized events. Malformed
/// or recognized-but-irrelevant lines return `Ok(None)` rather than erroring,
/// since a single bad line (e.g. a half-flushed write mid-append) must never
/// take down the whole session stream.
pub trait LineParser: Send {
    fn parse_line(&self, line: &str) -> Result<Option<Event>>;
}

/// Generic incremental reader shared by every JSONL-based producer.
///
/// Tracks a byte offset into the file and re-opens + seeks on every read
/// rather than holding the file handle open across calls, so it tolerates
/// the file being rotated or replaced between polls.
pub struct JsonlReader<P: LineParser> {
    path: PathBuf,
    parser: P,
    position: u64,
    partial: String,
}

impl<P: LineParser> JsonlReader<P> {
    pub fn new(path: PathBuf, parser: P) -> Self {
        Self {
            path,
            parser,
            position: 0,
            partial: String::new(),
        }
    }

    fn read_from(&mut self, start: u64) -> Result<Vec<Event>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;
        let mut reader = BufReader::new(file);

        let mut events = Vec::new();
        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line)?;
            if bytes_read == 0 {
                break;
            }

            if !line.ends_with('\n') {
                // Partial line at EOF: buffer it and don't advance position
                // past its start, so the next poll re-reads it complete.
                self.partial = line;
                break;
            }

            self.position += bytes_read as u64;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(event) = self.parser.parse_line(trimmed)? {
                events.push(event);
            }
        }

        Ok(events)
    }
}

impl<P: LineParser> IncrementalReader for JsonlReader<P> {
    fn read_new(&mut self) -> Result<Vec<Event>> {
        let start = self.position;
        self.read_from(start)
    }

    fn read_all(&mut self) -> Result<Vec<Event>> {
        self.position = 0;
        self.partial.clear();
        self.read_from(0)
    }

    fn flush(&mut self) {
        self.partial.clear();
    }

    fn get_position(&self) -> u64 {
        self.position
    }

    fn seek_to(&mut self, position: u64) -> Result<()> {
        self.position = position;
        self.partial.clear();
        Ok(())
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn was_truncated(&mut self) -> Result<bool> {
        let len = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(len < self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascope_types::{Content, Event, Message, Role};
    use chrono::Utc;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct EchoParser;
    impl LineParser for EchoParser {
        fn parse_line(&self, line: &str) -> Result<Option<Event>> {
            if line.starts_with("skip") {
                return Ok(None);
            }
            Ok(Some(Event::User {
                message: Message {
                    role: Role::User,
                    content: Content::Text(line.to_string()),
                    usage: None,
                    model: None,
                    permission_mode: None,
                },
                uuid: None,
                parent_uuid: None,
                timestamp: Utc::now(),
            }))
        }
    }

    #[test]
    fn reads_only_newly_appended_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "one").unwrap();
        writeln!(file, "two").unwrap();

        let mut reader = JsonlReader::new(file.path().to_path_buf(), EchoParser);
        let first = reader.read_new().unwrap();
        assert_eq!(first.len(), 2);

        writeln!(file, "three").unwrap();
        let second = reader.read_new().unwrap();
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn buffers_partial_trailing_line() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "one\npartial-no-newline").unwrap();

        let mut reader = JsonlReader::new(file.path().to_path_buf(), EchoParser);
        let events = reader.read_new().unwrap();
        assert_eq!(events.len(), 1);

        writeln!(file, " now-complete").unwrap();
        let events = reader.read_new().unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn detects_truncation() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "one").unwrap();
        writeln!(file, "two").unwrap();

        let mut reader = JsonlReader::new(file.path().to_path_buf(), EchoParser);
        reader.read_new().unwrap();
        assert!(!reader.was_truncated().unwrap());

        file.as_file().set_len(0).unwrap();
        assert!(reader.was_truncated().unwrap());
    }

    #[test]
    fn skipped_lines_do_not_produce_events() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "skip-me").unwrap();
        writeln!(file, "keep-me").unwrap();

        let mut reader = JsonlReader::new(file.path().to_path_buf(), EchoParser);
        let events = reader.read_new().unwrap();
        assert_eq!(events.len(), 1);
    }
}


