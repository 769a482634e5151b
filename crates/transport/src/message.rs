//! JSON-RPC message types.
//!
//! delve uses the Go `net/rpc/jsonrpc` encoding: a request carries a method
//! name and a single-element parameter array, a response echoes the request
//! id and carries either a result or an error string.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlation id shared by a request and its response.
pub type Id = u64;

/// A JSON-RPC message travelling in either direction.
///
/// The client only ever receives responses; the request variant exists so
/// that fake servers in tests can use the same codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// A method call.
    Request(Request),
    /// The reply to a method call.
    Response(Response),
}

/// A method call sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed by the response.
    pub id: Id,
    /// Fully qualified method name, e.g. `RPCServer.Command`.
    pub method: String,
    /// Call arguments. delve expects exactly one element.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Request {
    /// Build a request with a single argument object.
    pub fn new(id: Id, method: impl Into<String>, args: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params: vec![args],
        }
    }
}

/// The server's reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request this answers.
    pub id: Id,
    /// Call result, `null` when the call failed.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error text, `null` when the call succeeded.
    #[serde(default)]
    pub error: Option<String>,
}

impl Response {
    /// A successful reply.
    pub fn ok(id: Id, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A failed reply.
    pub fn err(id: Id, error: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Split the reply into its result or its error text.
    pub fn into_result(self) -> Result<Value, String> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_response() {
        let json = r#"{"id":4,"result":{"State":{"Running":false}},"error":null}"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, Message::Response(r) if r.id == 4 && r.error.is_none()));
    }

    #[test]
    fn deserialize_error_response() {
        let json = r#"{"id":5,"result":null,"error":"could not find breakpoint"}"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        let Message::Response(response) = msg else {
            panic!("expected a response");
        };
        assert_eq!(
            response.into_result(),
            Err("could not find breakpoint".to_string())
        );
    }

    #[test]
    fn deserialize_request() {
        let json = r#"{"method":"RPCServer.Command","params":[{"name":"next"}],"id":2}"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, Message::Request(r) if r.method == "RPCServer.Command"));
    }

    #[test]
    fn serialize_request() {
        let msg = Message::Request(Request::new(
            1,
            "RPCServer.ClearBreakpoint",
            json!({"Id": 3}),
        ));

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""method":"RPCServer.ClearBreakpoint""#));
        assert!(json.contains(r#""params":[{"Id":3}]"#));
    }

    #[test]
    fn missing_result_is_null() {
        let response = Response {
            id: 1,
            result: None,
            error: None,
        };
        assert_eq!(response.into_result(), Ok(Value::Null));
    }
}
