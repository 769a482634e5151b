//! Transport abstraction and split functionality.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::reader::RpcReader;
use crate::writer::RpcWriter;

/// A byte stream that can be split into separate read and write halves.
///
/// Implemented for TCP and for the in-memory test transport.
pub trait RpcTransport: Send + 'static {
    /// The read half type.
    type Read: AsyncRead + Unpin + Send + 'static;
    /// The write half type.
    type Write: AsyncWrite + Unpin + Send + 'static;

    /// Split the transport into separate read and write halves.
    fn into_split(self) -> (Self::Read, Self::Write);
}

impl RpcTransport for TcpStream {
    type Read = OwnedReadHalf;
    type Write = OwnedWriteHalf;

    fn into_split(self) -> (Self::Read, Self::Write) {
        TcpStream::into_split(self)
    }
}

/// Split a transport into a reader and writer pair.
///
/// The halves are independent: the client moves the reader into a
/// background task and keeps the writer behind a lock.
pub fn split<T: RpcTransport>(transport: T) -> (RpcReader<T::Read>, RpcWriter<T::Write>) {
    let (read, write) = transport.into_split();
    (RpcReader::new(read), RpcWriter::new(write))
}
