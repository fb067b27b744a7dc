//! # rust-seal
//!
//! Multi-signature envelopes around arbitrary payloads, using SHA-512 digests
//! with ECDSA (P-256, P-384, P-521) and Ed25519 signatures.
//!
//! ## Features
//!
//! - **Text envelopes** that can be read with a pager: a magic line, one block
//!   per signer, a terminator line, then the payload
//! - **Multiple signers** with mixed algorithms on the same payload
//! - **Key binding**: every signature covers the signer's key id as well as the
//!   payload digest
//! - **Attached or detached** payloads
//! - **Streaming** parse: the payload after the header is read on demand
//!
//! ## Quick Start
//!
//! ### Generate a Key
//!
//! ```rust
//! use rust_seal::{KeyKind, SigningKey};
//!
//! let key = SigningKey::generate(KeyKind::Ed25519);
//! let public = key.public_key();
//! // Save to files (optional)
//! // key.save_to_file("my_key.pem").unwrap();
//! // public.save_to_file("my_key.pub.pem").unwrap();
//! ```
//!
//! ### Sign a Payload
//!
//! ```rust
//! use rust_seal::{KeyKind, Signer, SigningKey};
//!
//! let key = SigningKey::generate(KeyKind::Ed25519);
//! let envelope = Signer::new().with_key(&key).sign_bytes(b"hello\n").unwrap();
//!
//! assert!(envelope.starts_with(b"kepler22b.uk/seal/v1\n-> ed25519-sha512\n"));
//! assert!(envelope.ends_with(b"/----/\nhello\n"));
//! ```
//!
//! ### Verify an Envelope
//!
//! ```rust
//! use rust_seal::{KeyKind, Signer, SigningKey, Verifier};
//!
//! let key = SigningKey::generate(KeyKind::EcdsaP256);
//! let envelope = Signer::new().with_key(&key).sign_bytes(b"hello\n").unwrap();
//!
//! let result = Verifier::new()
//!     .with_key("alice.pem", key.public_key())
//!     .verify_bytes(&envelope)
//!     .unwrap();
//! assert_eq!(result.payload.as_deref(), Some(&b"hello\n"[..]));
//! ```
//!
//! ### Multiple Signers
//!
//! ```rust
//! use rust_seal::{KeyKind, Signer, SigningKey, Verifier};
//!
//! let alice = SigningKey::generate(KeyKind::EcdsaP256);
//! let bob = SigningKey::generate(KeyKind::Ed25519);
//! let envelope = Signer::new()
//!     .with_key(&alice)
//!     .with_key(&bob)
//!     .sign_bytes(b"Contract requiring multiple signatures")
//!     .unwrap();
//!
//! // Either key alone is enough.
//! let result = Verifier::new()
//!     .with_key("bob", bob.public_key())
//!     .verify_bytes(&envelope)
//!     .unwrap();
//! assert_eq!(result.valid_count(), 1);
//! ```

pub mod algorithm;
pub mod error;
pub mod format;
pub mod hash;
pub mod keys;
pub mod signature;
pub mod signer;
pub mod verifier;

// Re-export main types for convenience
pub use algorithm::Algorithm;
pub use error::{FormatError, Result, SealError};
pub use format::{parse, serialize, PayloadReader};
pub use hash::{hash_bytes, hash_reader, Digest, DigestStream};
pub use keys::{KeyKind, PublicKey, SigningKey};
pub use signature::{Header, Mode, SignatureBlock};
pub use signer::{sign_bytes, Signer};
pub use verifier::{verify_bytes, VerificationResult, Verifier};
