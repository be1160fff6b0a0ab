//! LPTF: private file transfer over a length-prefixed TCP protocol
//!
//! A logged-in client issues one command per connection (upload, download,
//! delete, list, directory management or a tree listing) against its own
//! sandboxed directory on the server.

pub mod actions;
pub mod auth;
pub mod cli;
pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod fs_enum;
pub mod logger;
pub mod logging;
pub mod message;
pub mod net;
pub mod packet;
pub mod pool;
pub mod progress;
pub mod protocol;
pub mod sandbox;
pub mod server;
pub mod transfer;
pub mod url;
pub mod wire;

pub use error::{LptfError, Result};
