//! Test doubles for code that talks to delve.

use tokio::io::{DuplexStream, duplex};

use crate::transport::RpcTransport;

/// Per-direction buffer of a [`MemoryTransport`] pair.
const BUFFER_SIZE: usize = 64 * 1024;

/// One end of an in-memory connection, used in place of a TCP stream to a
/// headless delve server.
///
/// ```
/// use transport::{split, testing::MemoryTransport};
///
/// let (client, fake_server) = MemoryTransport::pair();
/// let (client_reader, client_writer) = split(client);
/// let (server_reader, server_writer) = split(fake_server);
/// ```
#[derive(Debug)]
pub struct MemoryTransport {
    incoming: DuplexStream,
    outgoing: DuplexStream,
}

impl MemoryTransport {
    /// Two connected ends: bytes written to one are read from the other.
    pub fn pair() -> (Self, Self) {
        let (client_out, server_in) = duplex(BUFFER_SIZE);
        let (server_out, client_in) = duplex(BUFFER_SIZE);
        (
            MemoryTransport {
                incoming: client_in,
                outgoing: client_out,
            },
            MemoryTransport {
                incoming: server_in,
                outgoing: server_out,
            },
        )
    }
}

impl RpcTransport for MemoryTransport {
    type Read = DuplexStream;
    type Write = DuplexStream;

    fn into_split(self) -> (Self::Read, Self::Write) {
        (self.incoming, self.outgoing)
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::{
        message::{Message, Request, Response},
        split,
    };

    #[tokio::test]
    async fn request_and_reply() {
        let (client, server) = MemoryTransport::pair();
        let (mut client_reader, mut client_writer) = split(client);
        let (mut server_reader, mut server_writer) = split(server);

        client_writer
            .send(Message::Request(Request::new(
                7,
                "RPCServer.Command",
                json!({"name": "continue"}),
            )))
            .await
            .unwrap();

        let msg = server_reader.next().await.unwrap().unwrap();
        let Message::Request(request) = msg else {
            panic!("expected request, got {msg:?}");
        };
        assert_eq!(request.method, "RPCServer.Command");
        assert_eq!(request.params, vec![json!({"name": "continue"})]);

        server_writer
            .send(Message::Response(Response::ok(request.id, json!({}))))
            .await
            .unwrap();

        let msg = client_reader.next().await.unwrap().unwrap();
        assert_eq!(msg, Message::Response(Response::ok(7, json!({}))));
    }

    #[tokio::test]
    async fn dropping_one_end_closes_the_other() {
        let (client, server) = MemoryTransport::pair();
        let (_client_reader, client_writer) = split(client);
        let (mut server_reader, _server_writer) = split(server);

        drop(client_writer);
        assert!(server_reader.next().await.is_none());
    }
}
