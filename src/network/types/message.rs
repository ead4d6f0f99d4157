use std::fmt;

use thiserror::Error;

/// Delimiter between the header, sender address, and payload segments
const DELIMITER: char = ':';

/// A decoded message must split into exactly this many segments
const SEGMENT_COUNT: usize = 3;

pub const FILE_REQUEST: &str = "FILE_REQUEST";
pub const ACK_FILE_REQUEST: &str = "ACK_FILE_REQUEST";
pub const CLONE_FILES: &str = "CLONE_FILES";
pub const ACK_CLONE_FILES: &str = "ACK_CLONE_FILES";

/// Message headers used by the file sync protocol
///
/// The headers are string constants, not an exhaustive protocol grammar: an
/// unrecognized header decodes as `Unknown` and is dispatched as a logged
/// no-op, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    /// Broadcast asking peers which of the listed files they hold
    FileRequest,

    /// A peer's manifest of the requested files it holds
    AckFileRequest,

    /// Ask a peer for the contents of files it owns
    CloneFiles,

    /// A peer's answer to a clone request
    AckCloneFiles,

    /// Any header this node does not recognize
    Unknown(String),
}

impl Header {
    /// The header's wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Header::FileRequest => FILE_REQUEST,
            Header::AckFileRequest => ACK_FILE_REQUEST,
            Header::CloneFiles => CLONE_FILES,
            Header::AckCloneFiles => ACK_CLONE_FILES,
            Header::Unknown(name) => name,
        }
    }
}

impl From<&str> for Header {
    fn from(s: &str) -> Self {
        match s {
            FILE_REQUEST => Header::FileRequest,
            ACK_FILE_REQUEST => Header::AckFileRequest,
            CLONE_FILES => Header::CloneFiles,
            ACK_CLONE_FILES => Header::AckCloneFiles,
            other => Header::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire message missing its required delimiter segments
#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed message: expected 'header:sender:payload', got '{0}'")]
pub struct MalformedMessage(pub String);

/// A decoded wire message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub header: Header,

    /// Canonical `host_port` address the sender answers on
    pub sender: String,

    /// Opaque serialized structure; may itself contain the delimiter
    pub payload: String,
}

/// Encode a message as `header:sender:payload`
pub fn encode(header: &Header, sender: &str, payload: &str) -> String {
    format!("{}{DELIMITER}{}{DELIMITER}{}", header, sender, payload)
}

/// Decode a raw wire message
///
/// Splits on at most the first two delimiter occurrences so a payload that
/// legally contains the delimiter survives intact.
pub fn decode(raw: &str) -> Result<WireMessage, MalformedMessage> {
    let mut segments = raw.splitn(SEGMENT_COUNT, DELIMITER);

    match (segments.next(), segments.next(), segments.next()) {
        (Some(header), Some(sender), Some(payload)) => Ok(WireMessage {
            header: Header::from(header),
            sender: sender.to_string(),
            payload: payload.to_string(),
        }),
        _ => Err(MalformedMessage(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let raw = encode(&Header::FileRequest, "10.0.0.1_9000", "[\"a.txt\"]");
        let message = decode(&raw).unwrap();

        assert_eq!(message.header, Header::FileRequest);
        assert_eq!(message.sender, "10.0.0.1_9000");
        assert_eq!(message.payload, "[\"a.txt\"]");
    }

    #[test]
    fn test_payload_with_embedded_delimiters_survives() {
        // Serialized JSON payloads routinely contain colons
        let payload = r#"[{"FilePath":"a.txt","Timestamp":"2024-01-01T00:00:00Z"}]"#;
        let raw = encode(&Header::AckFileRequest, "10.0.0.2_9000", payload);
        let message = decode(&raw).unwrap();

        assert_eq!(message.header, Header::AckFileRequest);
        assert_eq!(message.sender, "10.0.0.2_9000");
        assert_eq!(message.payload, payload);
    }

    #[test]
    fn test_decode_rejects_missing_segments() {
        assert!(decode("FILE_REQUEST").is_err());
        assert!(decode("FILE_REQUEST:10.0.0.1_9000").is_err());
    }

    #[test]
    fn test_empty_payload_is_well_formed() {
        let message = decode("FILE_REQUEST:10.0.0.1_9000:").unwrap();
        assert_eq!(message.payload, "");
    }

    #[test]
    fn test_unknown_header_is_preserved_not_rejected() {
        let message = decode("SOMETHING_ELSE:10.0.0.1_9000:data").unwrap();
        assert_eq!(message.header, Header::Unknown("SOMETHING_ELSE".to_string()));
    }
}
