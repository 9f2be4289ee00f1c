//! Shell Replies
//!
//! The values a shell command can produce, printed in the familiar
//! `redis-cli` style.

use bytes::Bytes;
use std::fmt;

/// A command result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Short status line such as `OK` or `PONG`
    Status(String),
    /// Error message, printed with an `(error)` prefix
    Error(String),
    /// Signed integer
    Integer(i64),
    /// A stored value
    Bulk(Bytes),
    /// Absent value
    Nil,
    /// List of values
    Array(Vec<Bytes>),
}

impl Reply {
    /// The `OK` status.
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    /// Creates an error reply.
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    /// Returns true if this is an error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

fn write_bytes(f: &mut fmt::Formatter<'_>, data: &Bytes) -> fmt::Result {
    match std::str::from_utf8(data) {
        Ok(s) => write!(f, "\"{}\"", s),
        Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => f.write_str(s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(data) => write_bytes(f, data),
            Reply::Nil => write!(f, "(nil)"),
            Reply::Array(values) if values.is_empty() => write!(f, "(empty array)"),
            Reply::Array(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) ", i + 1)?;
                    write_bytes(f, v)?;
                }
                Ok(())
            }
        }
    }
}
