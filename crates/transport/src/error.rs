use std::io;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("reading or writing the delve connection: {0}")]
    Io(#[from] io::Error),

    /// No newline within `max` bytes; delve never sends frames this large.
    #[error("frame of {size} bytes is larger than the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },

    #[error("line is not a JSON-RPC message: {0}")]
    JsonDeserialize(#[source] serde_json::Error),

    #[error("could not encode message: {0}")]
    JsonSerialize(#[source] serde_json::Error),
}
