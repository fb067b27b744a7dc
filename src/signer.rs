//! Envelope signing.

use crate::error::{Result, SealError};
use crate::format;
use crate::hash::DigestStream;
use crate::keys::SigningKey;
use crate::signature::{Header, Mode};
use std::io::{Read, Write};
use std::path::Path;

/// A builder for creating signed envelopes.
#[derive(Debug, Default)]
pub struct Signer<'a> {
    keys: Vec<&'a SigningKey>,
    mode: Mode,
}

impl<'a> Signer<'a> {
    /// Create a signer with no keys in attached mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signing key. Each key contributes one signature block, in order.
    pub fn with_key(mut self, key: &'a SigningKey) -> Self {
        self.keys.push(key);
        self
    }

    /// Add several signing keys.
    pub fn with_keys<I: IntoIterator<Item = &'a SigningKey>>(mut self, keys: I) -> Self {
        self.keys.extend(keys);
        self
    }

    /// Emit only the header, leaving the payload to travel separately.
    pub fn detached(mut self, detached: bool) -> Self {
        self.mode = if detached { Mode::Detached } else { Mode::Attached };
        self
    }

    /// The configured payload mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Digest the payload and produce the signed header.
    ///
    /// In attached mode the payload is retained and returned alongside.
    pub fn sign_header<R: Read>(&self, reader: &mut R) -> Result<(Header, Option<Vec<u8>>)> {
        if self.keys.is_empty() {
            return Err(SealError::NoKeys);
        }

        let mut stream = DigestStream::new();
        let payload = match self.mode {
            Mode::Attached => {
                let mut retained = Vec::new();
                stream.absorb(reader, Some(&mut retained))?;
                Some(retained)
            }
            Mode::Detached => {
                stream.absorb(reader, None)?;
                None
            }
        };
        let digest = stream.close();

        let mut header = Header::new();
        for key in &self.keys {
            header.push(key.kind().algorithm().sign(key, &digest)?);
        }

        tracing::debug!(
            "Signed payload {} with {} key(s)",
            digest.to_hex(),
            header.signature_count()
        );
        Ok((header, payload))
    }

    /// Sign everything read from `reader` and write the envelope to `writer`.
    ///
    /// The envelope is assembled in memory first, so nothing is written unless
    /// every key signed successfully.
    pub fn sign_reader<R: Read, W: Write>(&self, reader: &mut R, writer: &mut W) -> Result<()> {
        let envelope = self.sign_to_vec(reader)?;
        writer.write_all(&envelope)?;
        writer.flush()?;
        Ok(())
    }

    /// Sign a byte slice, returning the envelope.
    pub fn sign_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.sign_to_vec(&mut &data[..])
    }

    /// Sign a file, returning the envelope.
    pub fn sign_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>> {
        let mut file = std::fs::File::open(path)?;
        self.sign_to_vec(&mut file)
    }

    fn sign_to_vec<R: Read>(&self, reader: &mut R) -> Result<Vec<u8>> {
        let (header, payload) = self.sign_header(reader)?;
        let mut envelope = Vec::new();
        format::serialize(&header, payload.as_deref(), &mut envelope)?;
        Ok(envelope)
    }
}

/// Convenience function to sign bytes into an attached envelope.
pub fn sign_bytes(keys: &[SigningKey], data: &[u8]) -> Result<Vec<u8>> {
    Signer::new().with_keys(keys).sign_bytes(data)
}
