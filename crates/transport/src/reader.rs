//! Incoming half of a delve connection.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::RpcCodec;
use crate::error::CodecError;
use crate::message::Message;

pin_project! {
    /// Decodes one [`Message`] per line from an [`AsyncRead`]. The stream
    /// ends when delve closes the connection; a decode error is yielded once
    /// and the caller decides whether to keep reading.
    pub struct RpcReader<R> {
        #[pin]
        inner: FramedRead<R, RpcCodec>,
    }
}

impl<R> RpcReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            inner: FramedRead::new(reader, RpcCodec::new()),
        }
    }
}

impl<R> Stream for RpcReader<R>
where
    R: AsyncRead + Unpin,
{
    type Item = Result<Message, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}
