//! Shell Command Module
//!
//! A line-oriented command layer over an `ExpiringCache<Bytes, Bytes>`,
//! used by the `ttlmap` binary to drive the cache interactively.
//!
//! ## Architecture
//!
//! ```text
//! stdin line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (handler)
//! │                 │
//! │  - Tokenize     │
//! │  - Dispatch     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ ExpiringCache   │  (cache module)
//! └────────┬────────┘
//!          │
//!          ▼
//!        Reply        (reply)
//! ```
//!
//! ## Supported Commands
//!
//! - `SET key value [EX seconds|PX milliseconds]`
//! - `GET`, `DEL`, `EXISTS`, `TOUCH`
//! - `TTL`, `PTTL`, `KEYS [pattern]`
//! - `DBSIZE`, `FLUSH`, `INFO`, `PING`

pub mod glob;
pub mod handler;
pub mod reply;

pub use glob::GlobPattern;
pub use handler::{tokenize, ByteCache, CommandHandler};
pub use reply::Reply;
