//! SHA-512 digest streaming for envelope payloads.

use crate::error::{Result, SealError};
use serde::{Serialize, Serializer};
use sha2::{Digest as _, Sha512};
use std::io::{self, Read, Write};

/// The size of a SHA-512 digest in bytes.
pub const DIGEST_SIZE: usize = 64;

/// A frozen SHA-512 digest of payload content.
///
/// Only produced by closing a [`DigestStream`] or by the one-shot helpers, so
/// an algorithm can never observe a digest that is still changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Get the raw bytes of the digest.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Encode the digest as a hexadecimal string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[derive(Debug)]
enum State {
    Open(Sha512),
    Closed(Digest),
}

/// An incremental SHA-512 accumulator with an open/closed lifecycle.
///
/// Writes are accepted while open. [`close`](Self::close) freezes the digest;
/// later writes fail with [`SealError::StreamClosed`] and later closes return
/// the same digest.
#[derive(Debug)]
pub struct DigestStream {
    state: State,
}

impl DigestStream {
    /// Create a new open stream.
    pub fn new() -> Self {
        Self {
            state: State::Open(Sha512::new()),
        }
    }

    /// Feed bytes into the digest.
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.state {
            State::Open(hasher) => {
                hasher.update(data);
                Ok(())
            }
            State::Closed(_) => Err(SealError::StreamClosed),
        }
    }

    /// Freeze the stream and return its digest. Idempotent.
    pub fn close(&mut self) -> Digest {
        let digest = match &mut self.state {
            State::Open(hasher) => {
                let mut bytes = [0u8; DIGEST_SIZE];
                bytes.copy_from_slice(&hasher.finalize_reset());
                Digest(bytes)
            }
            State::Closed(digest) => return *digest,
        };
        self.state = State::Closed(digest);
        digest
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed(_))
    }

    /// The frozen digest; fails if the stream is still open.
    pub fn digest(&self) -> Result<Digest> {
        match &self.state {
            State::Closed(digest) => Ok(*digest),
            State::Open(_) => Err(SealError::DigestNotReady),
        }
    }

    /// Drain a reader into the stream, optionally retaining a copy of every byte.
    ///
    /// Returns the number of bytes consumed.
    pub fn absorb<R: Read>(&mut self, reader: &mut R, mut retain: Option<&mut Vec<u8>>) -> Result<u64> {
        let mut buffer = [0u8; 8192];
        let mut total = 0u64;

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.update(&buffer[..bytes_read])?;
            if let Some(retained) = retain.as_deref_mut() {
                retained.extend_from_slice(&buffer[..bytes_read]);
            }
            total += bytes_read as u64;
        }

        Ok(total)
    }
}

impl Default for DigestStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for DigestStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Compute the SHA-512 digest of a byte slice.
pub fn hash_bytes(data: &[u8]) -> Digest {
    let mut bytes = [0u8; DIGEST_SIZE];
    bytes.copy_from_slice(&Sha512::digest(data));
    Digest(bytes)
}

/// Compute the SHA-512 digest from any reader using streaming.
pub fn hash_reader<R: Read>(reader: &mut R) -> Result<Digest> {
    let mut stream = DigestStream::new();
    stream.absorb(reader, None)?;
    Ok(stream.close())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_hash_bytes() {
        let data = b"Hello, World!";
        let hash = hash_bytes(data);

        let hash2 = hash_bytes(data);
        assert_eq!(hash, hash2);

        let hash3 = hash_bytes(b"Different data");
        assert_ne!(hash, hash3);
    }

    #[test]
    fn test_one_shot_matches_stream() {
        for data in [&b""[..], &b"abc"[..], &[0x5a; 10_000][..]] {
            let mut stream = DigestStream::new();
            stream.update(data).unwrap();
            assert_eq!(hash_bytes(data), stream.close());
        }
    }

    #[test]
    fn test_known_vector() {
        // SHA-512("abc")
        let hash = hash_bytes(b"abc");
        assert_eq!(
            hash.to_hex(),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let mut stream = DigestStream::new();
        stream.update(b"hello ").unwrap();
        stream.update(b"world").unwrap();
        assert_eq!(stream.close(), hash_bytes(b"hello world"));
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut stream = DigestStream::new();
        stream.update(b"data").unwrap();
        stream.close();

        assert!(matches!(stream.update(b"more"), Err(SealError::StreamClosed)));
        assert!(stream.write(b"more").is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut stream = DigestStream::new();
        stream.update(b"data").unwrap();
        let first = stream.close();
        let second = stream.close();

        assert_eq!(first, second);
        assert_eq!(first, hash_bytes(b"data"));
        assert!(stream.is_closed());
    }

    #[test]
    fn test_digest_before_close_fails() {
        let stream = DigestStream::new();
        assert!(matches!(stream.digest(), Err(SealError::DigestNotReady)));
    }

    #[test]
    fn test_absorb_retains_copy() {
        let data = vec![7u8; 20_000];
        let mut stream = DigestStream::new();
        let mut retained = Vec::new();

        let n = stream.absorb(&mut Cursor::new(&data), Some(&mut retained)).unwrap();

        assert_eq!(n, 20_000);
        assert_eq!(retained, data);
        assert_eq!(stream.close(), hash_bytes(&data));
    }

    #[test]
    fn test_hex_encoding() {
        let hex = hash_bytes(b"Test").to_hex();
        assert_eq!(hex.len(), 128);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
