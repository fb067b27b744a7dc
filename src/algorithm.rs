//! The signature algorithm registry.
//!
//! Every algorithm signs a value that binds the signer's key identifier to the
//! payload digest, so a block produced for one key cannot be attributed to
//! another key that happens to sign the same payload.

use crate::error::{Result, SealError};
use crate::hash::{hash_bytes, Digest};
use crate::keys::{PublicKey, SigningKey};
use crate::signature::SignatureBlock;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier, RandomizedPrehashSigner};
use rand::rngs::OsRng;
use std::fmt;
use std::str::FromStr;

/// Tag for ECDSA over SHA-512 of (key id ‖ digest).
pub const ECDSA_SHA512: &str = "ecdsa-sha512";

/// Tag for Ed25519 over (key id ‖ digest).
pub const ED25519_SHA512: &str = "ed25519-sha512";

/// A registered signature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// ECDSA on P-256, P-384 or P-521, ASN.1 DER signatures.
    EcdsaSha512,
    /// Ed25519, raw 64-byte signatures.
    Ed25519Sha512,
}

impl Algorithm {
    /// Every registered algorithm.
    pub const ALL: [Algorithm; 2] = [Algorithm::EcdsaSha512, Algorithm::Ed25519Sha512];

    /// The wire tag naming this algorithm in a signature block.
    pub fn tag(self) -> &'static str {
        match self {
            Algorithm::EcdsaSha512 => ECDSA_SHA512,
            Algorithm::Ed25519Sha512 => ED25519_SHA512,
        }
    }

    /// Look up an algorithm by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.tag() == tag)
    }

    fn check_key(self, key: &PublicKey) -> Result<()> {
        if key.kind().algorithm() != self {
            return Err(SealError::AlgorithmMismatch {
                algorithm: self,
                key_kind: key.kind(),
            });
        }
        Ok(())
    }

    /// Derive the identifier bound into every signature made with `key`.
    ///
    /// ECDSA uses SHA-512 of the DER SubjectPublicKeyInfo; Ed25519 uses the raw
    /// 32-byte public key.
    pub fn key_id(self, key: &PublicKey) -> Result<Vec<u8>> {
        self.check_key(key)?;
        match key {
            PublicKey::EcdsaP256(_) | PublicKey::EcdsaP384(_) | PublicKey::EcdsaP521(_) => {
                Ok(hash_bytes(&key.to_public_key_der()?).as_bytes().to_vec())
            }
            PublicKey::Ed25519(vk) => Ok(vk.to_bytes().to_vec()),
        }
    }

    /// The exact value handed to the signature primitive for `key` and `digest`.
    ///
    /// For ECDSA this is the SHA-512 prehash of key id ‖ digest; Ed25519 signs
    /// key id ‖ digest directly.
    pub fn bound_message(self, key: &PublicKey, digest: &Digest) -> Result<Vec<u8>> {
        let mut message = self.key_id(key)?;
        message.extend_from_slice(digest.as_bytes());
        match self {
            Algorithm::EcdsaSha512 => Ok(hash_bytes(&message).as_bytes().to_vec()),
            Algorithm::Ed25519Sha512 => Ok(message),
        }
    }

    /// Sign a frozen payload digest, producing a block tagged with this algorithm.
    pub fn sign(self, key: &SigningKey, digest: &Digest) -> Result<SignatureBlock> {
        let public = key.public_key();
        let message = self.bound_message(&public, digest)?;

        let body = match key {
            SigningKey::EcdsaP256(sk) => {
                let sig: p256::ecdsa::Signature = sk.sign_prehash_with_rng(&mut OsRng, &message)?;
                sig.to_der().as_bytes().to_vec()
            }
            SigningKey::EcdsaP384(sk) => {
                let sig: p384::ecdsa::Signature = sk.sign_prehash_with_rng(&mut OsRng, &message)?;
                sig.to_der().as_bytes().to_vec()
            }
            SigningKey::EcdsaP521(secret) => {
                // RFC 6979 nonces: the P-521 signing key has no hedged prehash signer.
                let sk = p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes())?;
                let sig: p521::ecdsa::Signature = sk.sign_prehash(&message)?;
                sig.to_der().as_bytes().to_vec()
            }
            SigningKey::Ed25519(sk) => {
                use ed25519_dalek::Signer as _;
                sk.sign(&message).to_bytes().to_vec()
            }
        };

        tracing::debug!("Signed digest with {} key as {}", key.kind(), self);
        Ok(SignatureBlock::new(self.tag(), body))
    }

    /// Check one block against one key. Any mismatch or malformed body is `false`.
    pub fn verify(self, key: &PublicKey, block: &SignatureBlock, digest: &Digest) -> bool {
        if block.kind != self.tag() {
            return false;
        }
        let message = match self.bound_message(key, digest) {
            Ok(message) => message,
            Err(_) => return false,
        };

        match key {
            PublicKey::EcdsaP256(vk) => p256::ecdsa::Signature::from_der(&block.body)
                .map(|sig| vk.verify_prehash(&message, &sig).is_ok())
                .unwrap_or(false),
            PublicKey::EcdsaP384(vk) => p384::ecdsa::Signature::from_der(&block.body)
                .map(|sig| vk.verify_prehash(&message, &sig).is_ok())
                .unwrap_or(false),
            PublicKey::EcdsaP521(pk) => {
                let Ok(vk) = p521::ecdsa::VerifyingKey::from_sec1_bytes(&pk.to_sec1_bytes()) else {
                    return false;
                };
                p521::ecdsa::Signature::from_der(&block.body)
                    .map(|sig| vk.verify_prehash(&message, &sig).is_ok())
                    .unwrap_or(false)
            }
            PublicKey::Ed25519(vk) => ed25519_dalek::Signature::from_slice(&block.body)
                .map(|sig| vk.verify_strict(&message, &sig).is_ok())
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Algorithm {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s).ok_or_else(|| SealError::UnknownAlgorithm(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyKind;

    const KINDS: [KeyKind; 4] = [
        KeyKind::EcdsaP256,
        KeyKind::EcdsaP384,
        KeyKind::EcdsaP521,
        KeyKind::Ed25519,
    ];

    #[test]
    fn test_tag_lookup() {
        for alg in Algorithm::ALL {
            assert_eq!(Algorithm::from_tag(alg.tag()), Some(alg));
            assert_eq!(alg.to_string().parse::<Algorithm>().unwrap(), alg);
        }
        assert!(matches!(
            "rsa-sha256".parse::<Algorithm>(),
            Err(SealError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_sign_verify_every_kind() {
        let digest = hash_bytes(b"Test message");
        for kind in KINDS {
            let key = SigningKey::generate(kind);
            let alg = kind.algorithm();
            let block = alg.sign(&key, &digest).unwrap();

            assert_eq!(block.kind, alg.tag());
            assert!(block.args.is_empty());
            assert!(alg.verify(&key.public_key(), &block, &digest), "{kind}");
        }
    }

    #[test]
    fn test_key_id_shapes() {
        let ed = SigningKey::generate(KeyKind::Ed25519).public_key();
        let id = Algorithm::Ed25519Sha512.key_id(&ed).unwrap();
        assert_eq!(id.len(), 32);
        match &ed {
            PublicKey::Ed25519(vk) => assert_eq!(id, vk.to_bytes().to_vec()),
            _ => unreachable!(),
        }

        let ec = SigningKey::generate(KeyKind::EcdsaP256).public_key();
        let id = Algorithm::EcdsaSha512.key_id(&ec).unwrap();
        assert_eq!(id.len(), 64);
        assert_eq!(id, Algorithm::EcdsaSha512.key_id(&ec).unwrap());
    }

    #[test]
    fn test_ed25519_bound_message_layout() {
        let key = SigningKey::generate(KeyKind::Ed25519).public_key();
        let digest = hash_bytes(b"payload");
        let message = Algorithm::Ed25519Sha512.bound_message(&key, &digest).unwrap();

        assert_eq!(message.len(), 32 + 64);
        assert_eq!(&message[32..], digest.as_bytes());
    }

    #[test]
    fn test_wrong_digest_fails() {
        let digest = hash_bytes(b"original");
        let other = hash_bytes(b"tampered");
        for kind in KINDS {
            let key = SigningKey::generate(kind);
            let block = kind.algorithm().sign(&key, &digest).unwrap();
            assert!(!kind.algorithm().verify(&key.public_key(), &block, &other));
        }
    }

    #[test]
    fn test_key_confusion_rejected() {
        let digest = hash_bytes(b"shared payload");
        for kind in KINDS {
            let a = SigningKey::generate(kind);
            let b = SigningKey::generate(kind);
            let block = kind.algorithm().sign(&a, &digest).unwrap();
            assert!(!kind.algorithm().verify(&b.public_key(), &block, &digest));
        }
    }

    #[test]
    fn test_algorithm_mismatch() {
        let digest = hash_bytes(b"data");
        let ed = SigningKey::generate(KeyKind::Ed25519);

        assert!(matches!(
            Algorithm::EcdsaSha512.sign(&ed, &digest),
            Err(SealError::AlgorithmMismatch { .. })
        ));

        let block = Algorithm::Ed25519Sha512.sign(&ed, &digest).unwrap();
        assert!(!Algorithm::EcdsaSha512.verify(&ed.public_key(), &block, &digest));
    }

    #[test]
    fn test_garbage_body_fails() {
        let digest = hash_bytes(b"data");
        for kind in KINDS {
            let key = SigningKey::generate(kind).public_key();
            let block = SignatureBlock::new(kind.algorithm().tag(), vec![0x30, 0x01, 0x00]);
            assert!(!kind.algorithm().verify(&key, &block, &digest));
        }
    }
}
