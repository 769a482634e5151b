//! Line-delimited JSON codec using tokio-util.
//!
//! This module provides [`RpcCodec`], which implements both the `Encoder` and
//! `Decoder` traits from tokio-util for JSON-RPC messages.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;
use crate::message::Message;

/// Default maximum message size (16 MB).
const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Codec for encoding and decoding JSON-RPC messages.
///
/// Each message is one JSON object followed by a newline:
/// ```text
/// {"id":1,"result":{...},"error":null}\n
/// ```
///
/// Go's JSON encoder never emits raw newlines inside a value, so the newline
/// is an unambiguous frame boundary.
#[derive(Debug, Clone)]
pub struct RpcCodec {
    /// Maximum allowed message size in bytes.
    max_message_size: usize,
    /// How far into the buffer we have already searched for a newline.
    next_index: usize,
}

impl RpcCodec {
    /// Create a new codec with default settings.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a new codec with a custom maximum message size.
    ///
    /// Lines longer than this are rejected with [`CodecError::MessageTooLarge`].
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            next_index: 0,
        }
    }
}

impl Default for RpcCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RpcCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_message_size {
                    return Err(CodecError::MessageTooLarge {
                        size: src.len(),
                        max: self.max_message_size,
                    });
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let line_end = self.next_index + offset;
            self.next_index = 0;

            if line_end > self.max_message_size {
                return Err(CodecError::MessageTooLarge {
                    size: line_end,
                    max: self.max_message_size,
                });
            }

            let line = src.split_to(line_end + 1);
            let body = trim_ascii(&line[..line_end]);
            if body.is_empty() {
                continue;
            }

            let message: Message =
                serde_json::from_slice(body).map_err(CodecError::JsonDeserialize)?;
            return Ok(Some(message));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(buf)? {
            return Ok(Some(message));
        }

        // a final object without its trailing newline
        let body = trim_ascii(buf);
        if body.is_empty() {
            buf.clear();
            return Ok(None);
        }
        let message = serde_json::from_slice(body).map_err(CodecError::JsonDeserialize)?;
        buf.advance(buf.len());
        self.next_index = 0;
        Ok(Some(message))
    }
}

impl Encoder<Message> for RpcCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item).map_err(CodecError::JsonSerialize)?;

        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');

        Ok(())
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Request, Response};
    use serde_json::json;

    #[test]
    fn decode_complete_message() {
        let mut codec = RpcCodec::new();
        let mut buf = BytesMut::from(&b"{\"id\":1,\"result\":{},\"error\":null}\n"[..]);

        let result = codec.decode(&mut buf).unwrap();
        assert!(matches!(result, Some(Message::Response(r)) if r.id == 1));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_line() {
        let mut codec = RpcCodec::new();
        let mut buf = BytesMut::from(&b"{\"id\":1,\"res"[..]);

        let result = codec.decode(&mut buf).unwrap();
        assert!(result.is_none());
        assert!(!buf.is_empty());

        buf.put_slice(b"ult\":null,\"error\":\"boom\"}\n");
        let result = codec.decode(&mut buf).unwrap();
        assert!(matches!(result, Some(Message::Response(r)) if r.error.as_deref() == Some("boom")));
    }

    #[test]
    fn decode_multiple_messages_and_blank_lines() {
        let mut codec = RpcCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(b"{\"id\":1,\"result\":null,\"error\":null}\n\r\n");
        buf.put_slice(b"{\"id\":2,\"result\":null,\"error\":null}\n");

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(first, Message::Response(r) if r.id == 1));

        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(second, Message::Response(r) if r.id == 2));

        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_message_too_large() {
        let mut codec = RpcCodec::with_max_size(10);
        let mut buf = BytesMut::from(&b"{\"id\":1,\"result\":null"[..]);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::MessageTooLarge { .. })));
    }

    #[test]
    fn decode_invalid_json() {
        let mut codec = RpcCodec::new();
        let mut buf = BytesMut::from(&b"not json\n"[..]);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::JsonDeserialize(_))));
    }

    #[test]
    fn decode_eof_without_newline() {
        let mut codec = RpcCodec::new();
        let mut buf = BytesMut::from(&b"{\"id\":9,\"result\":null,\"error\":null}"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        let result = codec.decode_eof(&mut buf).unwrap();
        assert!(matches!(result, Some(Message::Response(r)) if r.id == 9));
    }

    #[test]
    fn encode_request() {
        let mut codec = RpcCodec::new();
        let msg = Message::Request(Request::new(1, "RPCServer.State", json!({"NonBlocking": true})));

        let mut buf = BytesMut::new();
        codec.encode(msg, &mut buf).unwrap();

        let s = std::str::from_utf8(&buf).unwrap();
        assert!(s.ends_with('\n'));
        assert_eq!(s.matches('\n').count(), 1);
        assert!(s.contains(r#""method":"RPCServer.State""#));
    }

    #[test]
    fn encode_then_decode_response() {
        let mut codec = RpcCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Message::Response(Response::err(3, "nope")), &mut buf)
            .unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Message::Response(Response::err(3, "nope")));
    }
}
