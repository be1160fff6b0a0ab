use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Server session log: one line per login, command, transfer and error.
pub trait Logger: Send + Sync {
    fn login(&self, _peer: &str, _user: &str, _outcome: &str) {}
    fn command(&self, _user: &str, _command: &str) {}
    fn transfer(&self, _user: &str, _path: &Path, _bytes: u64, _seconds: f64) {}
    fn error(&self, _user: &str, _context: &str, _msg: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        let mut f = self.file.lock();
        let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
    }
}

impl Logger for TextLogger {
    fn login(&self, peer: &str, user: &str, outcome: &str) {
        self.line(&format!("LOGIN peer={peer} user={user} outcome={outcome}"));
    }
    fn command(&self, user: &str, command: &str) {
        self.line(&format!("COMMAND user={user} cmd={command}"));
    }
    fn transfer(&self, user: &str, path: &Path, bytes: u64, seconds: f64) {
        self.line(&format!(
            "TRANSFER user={} path={} bytes={} seconds={:.3}",
            user,
            path.display(),
            bytes,
            seconds
        ));
    }
    fn error(&self, user: &str, context: &str, msg: &str) {
        self.line(&format!("ERROR user={user} ctx={context} msg={msg}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn text_logger_appends_timestamped_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs/session.log");
        {
            let log = TextLogger::new(&path).unwrap();
            log.login("127.0.0.1:5000", "alice", "verified");
            log.command("alice", "LIST \"\"");
            log.transfer("alice", Path::new("a.bin"), 20001, 0.25);
        }
        {
            let log = TextLogger::new(&path).unwrap();
            log.error("alice", "RMFILE", "no such file");
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("LOGIN peer=127.0.0.1:5000 user=alice outcome=verified"));
        assert!(lines[2].contains("TRANSFER user=alice path=a.bin bytes=20001 seconds=0.250"));
        assert!(lines[3].contains("ERROR user=alice ctx=RMFILE"));
    }
}
