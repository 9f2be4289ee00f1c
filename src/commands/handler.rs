//! Command Handler
//!
//! Parses one shell line and runs it against an
//! `ExpiringCache<Bytes, Bytes>`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ tokenize()  │───>│  dispatch() │───>│   cmd_*()   │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                       ExpiringCache         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use super::glob::GlobPattern;
use super::reply::Reply;
use crate::error::Result;
use crate::ExpiringCache;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// The cache type the shell operates on.
pub type ByteCache = ExpiringCache<Bytes, Bytes>;

/// Splits a line into arguments. Double quotes group words and `\"` escapes
/// a quote inside them.
pub fn tokenize(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            '\\' if in_quotes => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => return Err("unterminated escape".to_string()),
            },
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err("unbalanced quotes".to_string());
    }
    if has_token {
        args.push(current);
    }
    Ok(args)
}

/// Executes shell commands against a shared cache.
#[derive(Clone)]
pub struct CommandHandler {
    /// The cache
    cache: Arc<ByteCache>,
}

impl CommandHandler {
    /// Creates a new command handler for the given cache.
    pub fn new(cache: Arc<ByteCache>) -> Self {
        Self { cache }
    }

    /// Parses and executes one line.
    pub fn execute(&self, line: &str) -> Reply {
        let args = match tokenize(line) {
            Ok(args) => args,
            Err(e) => return Reply::error(format!("ERR {}", e)),
        };

        let Some((name, rest)) = args.split_first() else {
            return Reply::error("ERR empty command");
        };

        match self.dispatch(&name.to_uppercase(), rest) {
            Ok(reply) => reply,
            Err(e) => Reply::error(format!("ERR {}", e)),
        }
    }

    /// Dispatches a command to its handler.
    fn dispatch(&self, cmd: &str, args: &[String]) -> Result<Reply> {
        match cmd {
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "DEL" => self.cmd_del(args),
            "EXISTS" => self.cmd_exists(args),
            "TOUCH" => self.cmd_touch(args),
            "TTL" => self.cmd_ttl(args, false),
            "PTTL" => self.cmd_ttl(args, true),
            "KEYS" => self.cmd_keys(args),
            "DBSIZE" => Ok(Reply::Integer(self.cache.len()? as i64)),
            "FLUSH" => {
                self.cache.clear()?;
                Ok(Reply::ok())
            }
            "INFO" => Ok(self.cmd_info()),
            "PING" if args.is_empty() => Ok(Reply::Status("PONG".to_string())),
            "PING" => Ok(Self::wrong_args("PING")),
            _ => Ok(Reply::error(format!("ERR unknown command '{}'", cmd))),
        }
    }

    fn wrong_args(cmd: &str) -> Reply {
        Reply::error(format!("ERR wrong number of arguments for '{}' command", cmd))
    }

    /// SET key value [EX seconds | PX milliseconds]
    fn cmd_set(&self, args: &[String]) -> Result<Reply> {
        let (key, value, options) = match args {
            [key, value, options @ ..] => (key, value, options),
            _ => return Ok(Self::wrong_args("SET")),
        };

        let ttl = match options {
            [] => None,
            [unit, amount] => {
                let amount: u64 = match amount.parse() {
                    Ok(n) if n > 0 => n,
                    _ => return Ok(Reply::error("ERR invalid expire time")),
                };
                match unit.to_uppercase().as_str() {
                    "EX" => Some(Duration::from_secs(amount)),
                    "PX" => Some(Duration::from_millis(amount)),
                    _ => return Ok(Reply::error("ERR syntax error")),
                }
            }
            _ => return Ok(Reply::error("ERR syntax error")),
        };

        let key = Bytes::from(key.clone());
        let value = Bytes::from(value.clone());
        match ttl {
            Some(ttl) => self.cache.put_with_ttl(key, value, ttl)?,
            None => self.cache.put(key, value)?,
        };
        Ok(Reply::ok())
    }

    /// GET key
    fn cmd_get(&self, args: &[String]) -> Result<Reply> {
        let [key] = args else {
            return Ok(Self::wrong_args("GET"));
        };
        Ok(match self.cache.get(key.as_bytes())? {
            Some(value) => Reply::Bulk(value),
            None => Reply::Nil,
        })
    }

    /// DEL key [key ...]
    fn cmd_del(&self, args: &[String]) -> Result<Reply> {
        if args.is_empty() {
            return Ok(Self::wrong_args("DEL"));
        }
        let mut deleted = 0;
        for key in args {
            if self.cache.remove(key.as_bytes())?.is_some() {
                deleted += 1;
            }
        }
        Ok(Reply::Integer(deleted))
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&self, args: &[String]) -> Result<Reply> {
        if args.is_empty() {
            return Ok(Self::wrong_args("EXISTS"));
        }
        let mut found = 0;
        for key in args {
            if self.cache.contains_key(key.as_bytes())? {
                found += 1;
            }
        }
        Ok(Reply::Integer(found))
    }

    /// TOUCH key
    fn cmd_touch(&self, args: &[String]) -> Result<Reply> {
        let [key] = args else {
            return Ok(Self::wrong_args("TOUCH"));
        };
        Ok(Reply::Integer(self.cache.touch(key.as_bytes())? as i64))
    }

    /// TTL key / PTTL key. Returns -2 for a missing key.
    fn cmd_ttl(&self, args: &[String], millis: bool) -> Result<Reply> {
        let [key] = args else {
            return Ok(Self::wrong_args(if millis { "PTTL" } else { "TTL" }));
        };
        let remaining = match self.cache.time_to_live(key.as_bytes())? {
            Some(left) if millis => i64::try_from(left.as_millis()).unwrap_or(i64::MAX),
            Some(left) => i64::try_from(left.as_secs()).unwrap_or(i64::MAX),
            None => -2,
        };
        Ok(Reply::Integer(remaining))
    }

    /// KEYS [pattern]
    fn cmd_keys(&self, args: &[String]) -> Result<Reply> {
        let pattern = match args {
            [] => GlobPattern::new("*"),
            [pattern] => GlobPattern::new(pattern),
            _ => return Ok(Self::wrong_args("KEYS")),
        };
        let mut keys: Vec<Bytes> = self
            .cache
            .keys()?
            .into_iter()
            .filter(|key| pattern.matches(key))
            .collect();
        keys.sort();
        Ok(Reply::Array(keys))
    }

    /// INFO
    fn cmd_info(&self) -> Reply {
        let stats = self.cache.stats();
        let info = format!(
            "# Keyspace\n\
             default_ttl_ms:{}\n\
             entries:{}\n\
             tracked:{}\n\
             listeners:{}\n\
             \n\
             # Operations\n\
             puts:{}\n\
             gets:{}\n\
             hits:{}\n\
             misses:{}\n\
             hit_rate:{:.2}\n\
             removals:{}\n\
             \n\
             # Expiry\n\
             expirations:{}\n\
             evictions:{}\n\
             reaped:{}\n\
             listener_failures:{}\n\
             sweeps:{}",
            self.cache.default_ttl().as_millis(),
            stats.entries,
            stats.tracked,
            stats.listeners,
            stats.puts,
            stats.gets,
            stats.hits,
            stats.misses,
            stats.hit_rate(),
            stats.removals,
            stats.expirations,
            stats.evictions,
            stats.reaped,
            stats.listener_failures,
            stats.sweeps,
        );
        Reply::Status(info)
    }
}
