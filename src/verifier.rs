//! Envelope verification.
//!
//! A verifier holds one or more labelled public keys. Each key is tried
//! against the blocks whose tag matches its algorithm until one verifies; the
//! envelope is accepted if any key verified any block. A key that verifies
//! nothing is not evidence of tampering, since signers and verifying keys need
//! not correspond.

use crate::error::{Result, SealError};
use crate::format;
use crate::hash::{Digest, DigestStream};
use crate::keys::PublicKey;
use crate::signature::{Header, Mode};
use serde::Serialize;
use std::io::Read;

/// Outcome of an accepted verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    /// Attached or detached envelope.
    pub mode: Mode,

    /// SHA-512 digest of the verified payload.
    pub digest: Digest,

    /// Number of signature blocks in the header.
    pub signature_count: usize,

    /// Labels of the supplied keys that verified a block.
    pub verified_keys: Vec<String>,

    /// The attached payload, released only once a key has verified it.
    #[serde(skip)]
    pub payload: Option<Vec<u8>>,
}

impl VerificationResult {
    /// Get the number of keys that verified.
    pub fn valid_count(&self) -> usize {
        self.verified_keys.len()
    }

    /// Serialize the result (without the payload) to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Verifier for signed envelopes.
#[derive(Debug, Default)]
pub struct Verifier {
    keys: Vec<(String, PublicKey)>,
}

impl Verifier {
    /// Create a verifier with no keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a public key, labelled for reporting (typically the key file path).
    pub fn with_key<S: Into<String>>(mut self, label: S, key: PublicKey) -> Self {
        self.keys.push((label.into(), key));
        self
    }

    /// Number of keys supplied.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Apply the acceptance policy to a parsed header and frozen digest.
    ///
    /// Returns the labels of every key that verified at least one block.
    pub fn check(&self, header: &Header, digest: &Digest) -> Result<Vec<String>> {
        if self.keys.is_empty() {
            return Err(SealError::NoKeys);
        }
        if !header.has_signatures() {
            return Err(SealError::NoSignatures);
        }

        let mut verified = Vec::new();
        for (label, key) in &self.keys {
            let algorithm = key.algorithm();
            let hit = header
                .blocks_of(algorithm.tag())
                .any(|block| algorithm.verify(key, block, digest));

            if hit {
                tracing::info!("Verified signature using '{}'", label);
                verified.push(label.clone());
            } else {
                tracing::debug!("Key '{}' did not verify any {} block", label, algorithm);
            }
        }

        if verified.is_empty() {
            return Err(SealError::VerificationRejected {
                keys: self.keys.len(),
                blocks: header.signature_count(),
            });
        }
        Ok(verified)
    }

    /// Verify an attached envelope read from `envelope`.
    ///
    /// The payload is only returned inside an accepted result.
    pub fn verify_reader<R: Read>(&self, envelope: R) -> Result<VerificationResult> {
        let (header, mut payload_reader) = format::parse(envelope)?;

        let mut stream = DigestStream::new();
        let mut payload = Vec::new();
        stream.absorb(&mut payload_reader, Some(&mut payload))?;
        let digest = stream.close();

        let verified_keys = self.check(&header, &digest)?;
        Ok(VerificationResult {
            mode: Mode::Attached,
            digest,
            signature_count: header.signature_count(),
            verified_keys,
            payload: Some(payload),
        })
    }

    /// Verify a detached envelope against a separately supplied payload.
    ///
    /// Anything after the envelope's header is ignored.
    pub fn verify_detached<E: Read, D: Read>(&self, envelope: E, data: &mut D) -> Result<VerificationResult> {
        let (header, _) = format::parse(envelope)?;

        let mut stream = DigestStream::new();
        stream.absorb(data, None)?;
        let digest = stream.close();

        let verified_keys = self.check(&header, &digest)?;
        Ok(VerificationResult {
            mode: Mode::Detached,
            digest,
            signature_count: header.signature_count(),
            verified_keys,
            payload: None,
        })
    }

    /// Verify an attached envelope held in memory.
    pub fn verify_bytes(&self, envelope: &[u8]) -> Result<VerificationResult> {
        self.verify_reader(envelope)
    }

    /// Quick check whether an attached envelope verifies.
    pub fn is_valid_bytes(&self, envelope: &[u8]) -> bool {
        self.verify_bytes(envelope).is_ok()
    }
}

/// Convenience function to verify an attached envelope with a set of keys.
pub fn verify_bytes(keys: &[PublicKey], envelope: &[u8]) -> Result<VerificationResult> {
    keys.iter()
        .enumerate()
        .fold(Verifier::new(), |v, (i, key)| v.with_key(format!("key #{}", i + 1), key.clone()))
        .verify_bytes(envelope)
}
