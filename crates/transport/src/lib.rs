//! Async JSON-RPC transport for a headless delve server.
//!
//! delve speaks Go's `net/rpc/jsonrpc` dialect: every request and response is
//! a single JSON object, and the server terminates each object it writes with
//! a newline. This crate handles only the framing:
//!
//! - [`RpcCodec`] implements both `Encoder` and `Decoder` for [`Message`]s
//! - [`RpcReader`] wraps an `AsyncRead` to produce a `Stream` of [`Message`]s
//! - [`RpcWriter`] wraps an `AsyncWrite` to provide a `Sink` for messages
//!
//! # Usage
//!
//! ```ignore
//! use futures::StreamExt;
//! use transport::{connect, Message, Request};
//!
//! let (mut reader, mut writer) = transport::connect("127.0.0.1:2345").await?;
//! writer.send(Message::Request(Request::new(1, "RPCServer.State", json!({"NonBlocking": true})))).await?;
//!
//! while let Some(msg) = reader.next().await {
//!     if let Message::Response(r) = msg? { /* match r.id */ }
//! }
//! ```
//!
//! Request/response correlation belongs to the `debugger` crate.

mod codec;
mod error;
mod message;
mod reader;
mod transport;
mod writer;

pub mod testing;

pub use codec::RpcCodec;
pub use error::CodecError;
pub use message::{Id, Message, Request, Response};
pub use reader::RpcReader;
pub use transport::{RpcTransport, split};
pub use writer::RpcWriter;

use std::io;
use tokio::net::{TcpStream, ToSocketAddrs};

/// Connect to a delve server over TCP and return a reader/writer pair.
pub async fn connect(
    addr: impl ToSocketAddrs,
) -> io::Result<(
    RpcReader<tokio::net::tcp::OwnedReadHalf>,
    RpcWriter<tokio::net::tcp::OwnedWriteHalf>,
)> {
    let stream = TcpStream::connect(addr).await?;
    Ok(split(stream))
}
