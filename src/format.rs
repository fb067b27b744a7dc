//! The text envelope codec.
//!
//! An envelope looks like this:
//!
//! ```text
//! kepler22b.uk/seal/v1
//! -> ed25519-sha512
//! <unpadded standard base64 signature body>
//! <-
//! /----/
//! <payload bytes, attached mode only>
//! ```
//!
//! Parsing is line oriented and stops at the terminator line. Whatever the
//! line scanner buffered past that point is handed back through
//! [`PayloadReader`] ahead of the rest of the source, so the payload is never
//! collected into memory by the parser itself.

use crate::error::{FormatError, Result};
use crate::signature::{Header, SignatureBlock};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};

/// Format identifier line, including its newline.
pub const MAGIC: &str = "kepler22b.uk/seal/v1\n";

/// Marks the start of a signature block.
pub const BLOCK_INTRO: &str = "->";

/// Marks the end of a signature block.
pub const BLOCK_OUTRO: &str = "<-";

/// Ends the header; every following byte is payload.
pub const HEADER_END: &str = "/----/";

/// Decode one body line, refusing anything the strict decoder might silently skip.
fn decode_body_line(line: &[u8], line_no: usize) -> std::result::Result<Vec<u8>, FormatError> {
    if line.iter().any(|&b| b == b'\n' || b == b'\r') {
        return Err(FormatError::EmbeddedNewline { line: line_no });
    }
    STANDARD_NO_PAD
        .decode(line)
        .map_err(|source| FormatError::Base64 { line: line_no, source })
}

fn check_token(token: &str) -> std::result::Result<(), FormatError> {
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(FormatError::InvalidToken(token.to_string()));
    }
    Ok(())
}

impl SignatureBlock {
    /// Write this block in wire form.
    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        check_token(&self.kind)?;
        for arg in &self.args {
            check_token(arg)?;
        }

        let mut intro = format!("{} {}", BLOCK_INTRO, self.kind);
        for arg in &self.args {
            intro.push(' ');
            intro.push_str(arg);
        }
        intro.push('\n');

        w.write_all(intro.as_bytes())?;
        w.write_all(STANDARD_NO_PAD.encode(&self.body).as_bytes())?;
        w.write_all(b"\n")?;
        w.write_all(BLOCK_OUTRO.as_bytes())?;
        w.write_all(b"\n")?;
        Ok(())
    }
}

impl Header {
    /// Write the magic line, every block in order, and the terminator.
    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(MAGIC.as_bytes())?;
        for block in &self.signatures {
            block.marshal(w)?;
        }
        w.write_all(HEADER_END.as_bytes())?;
        w.write_all(b"\n")?;
        Ok(())
    }

    /// Encode the header into a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.marshal(&mut out)?;
        Ok(out)
    }
}

/// Write a complete envelope: the header, then the payload if attached.
pub fn serialize<W: Write>(header: &Header, payload: Option<&[u8]>, w: &mut W) -> Result<()> {
    header.marshal(w)?;
    if let Some(payload) = payload {
        w.write_all(payload)?;
    }
    Ok(())
}

/// Forward-only reader over the payload that follows a parsed header.
///
/// Yields the bytes the header scanner had already buffered, then continues
/// with the underlying source.
#[derive(Debug)]
pub struct PayloadReader<R> {
    inner: io::Chain<Cursor<Vec<u8>>, R>,
}

impl<R: Read> PayloadReader<R> {
    fn new(lookahead: Vec<u8>, source: R) -> Self {
        Self {
            inner: Cursor::new(lookahead).chain(source),
        }
    }

    /// Consume the reader, returning the unread look-ahead bytes and the source.
    pub fn into_parts(self) -> (Vec<u8>, R) {
        let (cursor, source) = self.inner.into_inner();
        let position = cursor.position() as usize;
        let mut lookahead = cursor.into_inner();
        lookahead.drain(..position.min(lookahead.len()));
        (lookahead, source)
    }
}

impl<R: Read> Read for PayloadReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Read one `\n`-terminated line. `Ok(false)` means the input ended first.
fn read_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<bool> {
    line.clear();
    reader.read_until(b'\n', line)?;
    if line.last() == Some(&b'\n') {
        line.pop();
        Ok(true)
    } else {
        Ok(false)
    }
}

fn parse_intro(line: &[u8], line_no: usize) -> std::result::Result<SignatureBlock, FormatError> {
    let text = std::str::from_utf8(line).map_err(|_| FormatError::MalformedIntro { line: line_no })?;
    // Same whitespace class `check_token` refuses, so parsed tokens always re-serialize.
    let mut tokens = text.split_whitespace();

    if tokens.next() != Some(BLOCK_INTRO) {
        return Err(FormatError::MalformedIntro { line: line_no });
    }
    let kind = match tokens.next() {
        Some(kind) => kind.to_string(),
        None => return Err(FormatError::MalformedIntro { line: line_no }),
    };

    Ok(SignatureBlock {
        kind,
        args: tokens.map(str::to_string).collect(),
        body: Vec::new(),
    })
}

/// Parse an envelope header, returning it with a reader over the payload.
pub fn parse<R: Read>(input: R) -> Result<(Header, PayloadReader<R>)> {
    let mut reader = BufReader::new(input);
    let mut line = Vec::new();

    if !read_line(&mut reader, &mut line)? || line != MAGIC.trim_end_matches('\n').as_bytes() {
        return Err(FormatError::BadMagic.into());
    }

    let mut header = Header::new();
    let mut open: Option<SignatureBlock> = None;
    let mut line_no = 1;

    loop {
        line_no += 1;
        if !read_line(&mut reader, &mut line)? {
            return Err(FormatError::UnexpectedEof { line: line_no }.into());
        }

        if line.starts_with(HEADER_END.as_bytes()) {
            if open.is_some() {
                return Err(FormatError::UnterminatedBlock { line: line_no }.into());
            }
            break;
        }

        if line.starts_with(BLOCK_INTRO.as_bytes()) {
            if open.is_some() {
                return Err(FormatError::UnterminatedBlock { line: line_no }.into());
            }
            open = Some(parse_intro(&line, line_no)?);
            continue;
        }

        if line.starts_with(BLOCK_OUTRO.as_bytes()) {
            match open.take() {
                Some(block) => header.push(block),
                None => return Err(FormatError::UnexpectedOutro { line: line_no }.into()),
            }
            continue;
        }

        match open.as_mut() {
            Some(block) => {
                let decoded = decode_body_line(&line, line_no)?;
                block.body.extend_from_slice(&decoded);
            }
            None => return Err(FormatError::UnexpectedLine { line: line_no }.into()),
        }
    }

    tracing::debug!(
        "Parsed envelope header with {} signature block(s)",
        header.signature_count()
    );

    let lookahead = reader.buffer().to_vec();
    Ok((header, PayloadReader::new(lookahead, reader.into_inner())))
}

/// Parse an envelope held in memory, returning the header and the payload slice.
pub fn parse_bytes(envelope: &[u8]) -> Result<(Header, Vec<u8>)> {
    let (header, mut payload) = parse(envelope)?;
    let mut rest = Vec::new();
    payload.read_to_end(&mut rest)?;
    Ok((header, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SealError;

    fn sample_header() -> Header {
        let mut header = Header::new();
        header.push(SignatureBlock::new("ecdsa-sha512", vec![0x30, 0x45, 0x02, 0x21]));
        header.push(SignatureBlock::new("ed25519-sha512", vec![0xff; 64]).with_arg("x").with_arg("y"));
        header
    }

    fn format_err(result: Result<(Header, PayloadReader<&[u8]>)>) -> FormatError {
        match result {
            Err(SealError::Format(e)) => e,
            Err(e) => panic!("expected format error, got {e}"),
            Ok(_) => panic!("expected format error, got a header"),
        }
    }

    #[test]
    fn test_wire_layout() {
        let mut header = Header::new();
        header.push(SignatureBlock::new("ed25519-sha512", vec![0xde, 0xad, 0xbe, 0xef]).with_arg("a"));

        let mut out = Vec::new();
        serialize(&header, Some(b"payload"), &mut out).unwrap();

        assert_eq!(
            out,
            b"kepler22b.uk/seal/v1\n-> ed25519-sha512 a\n3q2+7w\n<-\n/----/\npayload".to_vec()
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        let header = sample_header();
        let payload = b"line one\n/----/\n-> not a block\n".to_vec();

        let mut envelope = Vec::new();
        serialize(&header, Some(&payload), &mut envelope).unwrap();

        let (parsed, rest) = parse_bytes(&envelope).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(rest, payload);

        let mut again = Vec::new();
        serialize(&parsed, Some(&rest), &mut again).unwrap();
        assert_eq!(again, envelope);
    }

    #[test]
    fn test_payload_reader_drains_lookahead_first() {
        let header = sample_header();
        let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();

        let mut envelope = Vec::new();
        serialize(&header, Some(&payload), &mut envelope).unwrap();

        let (_, mut reader) = parse(Cursor::new(envelope)).unwrap();
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, payload);
    }

    #[test]
    fn test_into_parts_returns_unread_lookahead() {
        let envelope = b"kepler22b.uk/seal/v1\n/----/\nabcdef".to_vec();
        let (_, mut reader) = parse(&envelope[..]).unwrap();

        let mut first = [0u8; 2];
        reader.read_exact(&mut first).unwrap();
        let (lookahead, _) = reader.into_parts();

        assert_eq!(&first, b"ab");
        assert_eq!(lookahead, b"cdef".to_vec());
    }

    #[test]
    fn test_body_may_span_lines() {
        let envelope = b"kepler22b.uk/seal/v1\n-> ed25519-sha512\n3q2+\n7w\n<-\n/----/\n";
        let (header, _) = parse(&envelope[..]).unwrap();
        assert_eq!(header.signatures[0].body, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_missing_magic() {
        let envelope = b"-> ed25519-sha512\n3q2+7w\n<-\n/----/\n";
        assert_eq!(format_err(parse(&envelope[..])), FormatError::BadMagic);

        assert_eq!(format_err(parse(&b""[..])), FormatError::BadMagic);
    }

    #[test]
    fn test_unterminated_block() {
        let envelope = b"kepler22b.uk/seal/v1\n-> ed25519-sha512\n3q2+7w\n-> ecdsa-sha512\n<-\n/----/\n";
        assert_eq!(
            format_err(parse(&envelope[..])),
            FormatError::UnterminatedBlock { line: 4 }
        );

        let envelope = b"kepler22b.uk/seal/v1\n-> ed25519-sha512\n3q2+7w\n/----/\n";
        assert_eq!(
            format_err(parse(&envelope[..])),
            FormatError::UnterminatedBlock { line: 4 }
        );
    }

    #[test]
    fn test_unexpected_outro() {
        let envelope = b"kepler22b.uk/seal/v1\n<-\n/----/\n";
        assert_eq!(
            format_err(parse(&envelope[..])),
            FormatError::UnexpectedOutro { line: 2 }
        );
    }

    #[test]
    fn test_missing_terminator() {
        let envelope = b"kepler22b.uk/seal/v1\n-> ed25519-sha512\n3q2+7w\n<-\n";
        assert_eq!(
            format_err(parse(&envelope[..])),
            FormatError::UnexpectedEof { line: 5 }
        );
    }

    #[test]
    fn test_rejects_carriage_return() {
        let envelope = b"kepler22b.uk/seal/v1\n-> ed25519-sha512\n3q2+7w\r\n<-\n/----/\n";
        assert_eq!(
            format_err(parse(&envelope[..])),
            FormatError::EmbeddedNewline { line: 3 }
        );
    }

    #[test]
    fn test_rejects_non_canonical_base64() {
        // padded
        let envelope = b"kepler22b.uk/seal/v1\n-> ed25519-sha512\n3q0=\n<-\n/----/\n";
        assert!(matches!(
            format_err(parse(&envelope[..])),
            FormatError::Base64 { line: 3, .. }
        ));

        // non-zero trailing bits
        let envelope = b"kepler22b.uk/seal/v1\n-> ed25519-sha512\n3q1\n<-\n/----/\n";
        assert!(matches!(
            format_err(parse(&envelope[..])),
            FormatError::Base64 { line: 3, .. }
        ));
    }

    #[test]
    fn test_rejects_stray_lines() {
        let envelope = b"kepler22b.uk/seal/v1\n3q2+7w\n/----/\n";
        assert_eq!(
            format_err(parse(&envelope[..])),
            FormatError::UnexpectedLine { line: 2 }
        );

        let envelope = b"kepler22b.uk/seal/v1\n->\n<-\n/----/\n";
        assert_eq!(
            format_err(parse(&envelope[..])),
            FormatError::MalformedIntro { line: 2 }
        );
    }

    #[test]
    fn test_intro_whitespace_is_normalised() {
        let envelope = b"kepler22b.uk/seal/v1\n-> ed25519-sha512 \n3q2+7w\n<-\n/----/\nhi";
        let (header, rest) = parse_bytes(envelope).unwrap();
        assert!(header.signatures[0].args.is_empty());

        let mut again = Vec::new();
        serialize(&header, Some(&rest), &mut again).unwrap();
        assert_eq!(
            again,
            b"kepler22b.uk/seal/v1\n-> ed25519-sha512\n3q2+7w\n<-\n/----/\nhi".to_vec()
        );

        let envelope = b"kepler22b.uk/seal/v1\n->  ed25519-sha512  a\tb\n3q2+7w\n<-\n/----/\n";
        let (header, _) = parse_bytes(envelope).unwrap();
        let block = &header.signatures[0];
        assert_eq!(block.kind, "ed25519-sha512");
        assert_eq!(block.args, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(parse_bytes(&header.to_bytes().unwrap()).unwrap().0, header);

        let envelope = b"kepler22b.uk/seal/v1\n-> \t \n3q2+7w\n<-\n/----/\n";
        assert_eq!(
            format_err(parse(&envelope[..])),
            FormatError::MalformedIntro { line: 2 }
        );
    }

    #[test]
    fn test_marker_lines_match_by_prefix() {
        let envelope = b"kepler22b.uk/seal/v1\n-> ed25519-sha512\n3q2+7w\n<-xyz\n/----/abc\npayload";
        let (header, rest) = parse_bytes(envelope).unwrap();
        assert_eq!(header.signatures[0].body, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(rest, b"payload".to_vec());

        // Trailing marker bytes are not kept.
        let mut again = Vec::new();
        serialize(&header, Some(&rest), &mut again).unwrap();
        assert_eq!(
            again,
            b"kepler22b.uk/seal/v1\n-> ed25519-sha512\n3q2+7w\n<-\n/----/\npayload".to_vec()
        );
    }

    #[test]
    fn test_marshal_rejects_bad_tokens() {
        let block = SignatureBlock::new("ed25519 sha512", vec![1]);
        assert!(matches!(
            block.marshal(&mut Vec::new()),
            Err(SealError::Format(FormatError::InvalidToken(_)))
        ));

        let block = SignatureBlock::new("ed25519-sha512", vec![1]).with_arg("");
        assert!(block.marshal(&mut Vec::new()).is_err());
    }

    #[test]
    fn test_detached_header_only() {
        let header = sample_header();
        let mut out = Vec::new();
        serialize(&header, None, &mut out).unwrap();

        assert!(out.ends_with(b"/----/\n"));
        let (parsed, rest) = parse_bytes(&out).unwrap();
        assert_eq!(parsed, header);
        assert!(rest.is_empty());
    }
}
