/// Minimal HTTP/1.1 layer
///
/// This module handles:
/// - Parsing requests out of a partially received byte stream (message.rs)
/// - Building and sending replies (reply.rs)
/// - The per-connection read/parse/dispatch loop (connection.rs)
/// - Accepting connections and spawning one worker per connection (server.rs)

pub mod connection;
pub mod message;
pub mod reply;
pub mod server;

pub use connection::{Connection, ConnectionState, MessageHandler};
pub use message::{parse_message, HttpHeader, HttpMessage, ParseStatus};
pub use reply::{http_reply, Responder};
pub use server::serve;
