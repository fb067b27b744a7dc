//! Envelope header data structures and their JSON view.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Whether the payload travels inside the envelope or beside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Header followed by the payload bytes.
    #[default]
    Attached,
    /// Header only; the payload is supplied separately at verification.
    Detached,
}

/// One signer's contribution to an envelope.
///
/// The body is opaque here: only the algorithm named by `kind` produces or
/// interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    /// Algorithm tag, e.g. `ed25519-sha512`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Extension arguments, carried through unchanged.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Algorithm-specific signature bytes (standard base64 in JSON).
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
}

impl SignatureBlock {
    /// Create a block with no extension arguments.
    pub fn new<S: Into<String>>(kind: S, body: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            args: Vec::new(),
            body,
        }
    }

    /// Append an extension argument.
    pub fn with_arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// The signature section of an envelope, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub signatures: Vec<SignatureBlock>,
}

impl Header {
    /// Create an empty header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a signature block.
    pub fn push(&mut self, block: SignatureBlock) {
        self.signatures.push(block);
    }

    /// Blocks carrying the given algorithm tag.
    pub fn blocks_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a SignatureBlock> + 'a {
        self.signatures.iter().filter(move |b| b.kind == kind)
    }

    /// Get the number of signatures.
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Check if there are any signatures.
    pub fn has_signatures(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Serialize the header to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a header from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
