//! Error types for the rust-seal library.

use crate::algorithm::Algorithm;
use crate::keys::KeyKind;
use thiserror::Error;

/// The main error type for rust-seal operations.
#[derive(Error, Debug)]
pub enum SealError {
    /// Error reading or writing the envelope, payload or key files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error with JSON serialization/deserialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The envelope header is malformed.
    #[error("Invalid envelope format: {0}")]
    Format(#[from] FormatError),

    /// Write attempted after the digest stream was closed.
    #[error("Digest stream is closed")]
    StreamClosed,

    /// Digest requested while the stream is still open.
    #[error("Digest is not available until the stream is closed")]
    DigestNotReady,

    /// Error with the underlying ECDSA or Ed25519 signature operations.
    #[error("Signature error: {0}")]
    Signature(#[from] ed25519_dalek::SignatureError),

    /// Malformed PKCS#8 private key material.
    #[error("PKCS#8 error: {0}")]
    Pkcs8(#[from] pkcs8::Error),

    /// Malformed SubjectPublicKeyInfo public key material.
    #[error("Public key encoding error: {0}")]
    Spki(#[from] pkcs8::spki::Error),

    /// Invalid or unsupported key material.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A key file could not be loaded.
    #[error("Unable to load key from '{path}': {source}")]
    KeyLoad {
        path: String,
        #[source]
        source: Box<SealError>,
    },

    /// The requested algorithm cannot operate on the supplied key.
    #[error("Algorithm {algorithm} cannot be used with a {key_kind} key")]
    AlgorithmMismatch {
        algorithm: Algorithm,
        key_kind: KeyKind,
    },

    /// No registered algorithm carries this tag.
    #[error("Unknown signature algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// The envelope header carries no signature blocks.
    #[error("Header does not include any signatures")]
    NoSignatures,

    /// Signing or verification was attempted without any keys.
    #[error("No keys supplied")]
    NoKeys,

    /// None of the supplied keys verified any signature block.
    #[error(
        "Unable to verify any signature using the supplied keys \
         ({keys} key(s) tried against {blocks} signature block(s))"
    )]
    VerificationRejected { keys: usize, blocks: usize },
}

/// Envelope header syntax errors. Line numbers are 1-based and count the magic line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The first line is not the format identifier.
    #[error("envelope does not start with '{}'", crate::format::MAGIC.trim_end())]
    BadMagic,

    /// Input ended before the header terminator.
    #[error("header ended at line {line} before the terminator")]
    UnexpectedEof { line: usize },

    /// A block intro appeared while another block was still open.
    #[error("unterminated signature block at line {line}")]
    UnterminatedBlock { line: usize },

    /// A block outro appeared with no block open.
    #[error("signature block outro at line {line} has no matching intro")]
    UnexpectedOutro { line: usize },

    /// A block intro line without a usable type tag.
    #[error("malformed signature block intro at line {line}")]
    MalformedIntro { line: usize },

    /// A body line outside of any signature block.
    #[error("unexpected content outside a signature block at line {line}")]
    UnexpectedLine { line: usize },

    /// A body line carried a carriage return or line feed.
    #[error("unexpected newline character in signature body at line {line}")]
    EmbeddedNewline { line: usize },

    /// A body line is not canonical unpadded base64.
    #[error("error decoding signature body at line {line}: {source}")]
    Base64 {
        line: usize,
        source: base64::DecodeError,
    },

    /// A tag or argument that cannot be written without breaking the line syntax.
    #[error("invalid block token '{0}'")]
    InvalidToken(String),
}

/// Result type alias for rust-seal operations.
pub type Result<T> = std::result::Result<T, SealError>;
