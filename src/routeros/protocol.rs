// SPDX-License-Identifier: MIT

//! RouterOS wire protocol framing
//!
//! A sentence is a run of length-prefixed words terminated by a zero-length
//! word. The length prefix is the RouterOS variable-length scheme: the high
//! bits of the leading byte say how many continuation bytes follow. The
//! router is a fixed external peer, so the byte boundaries here must match
//! its framing exactly.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{AppError, Result};

// RouterOS protocol length encoding - intentional truncation is part of the wire format
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else if len < 0x4000 {
        vec![((len >> 8) as u8) | 0x80, (len & 0xFF) as u8]
    } else if len < 0x0020_0000 {
        vec![
            ((len >> 16) as u8) | 0xC0,
            ((len >> 8) & 0xFF) as u8,
            (len & 0xFF) as u8,
        ]
    } else if len < 0x1000_0000 {
        vec![
            ((len >> 24) as u8) | 0xE0,
            ((len >> 16) & 0xFF) as u8,
            ((len >> 8) & 0xFF) as u8,
            (len & 0xFF) as u8,
        ]
    } else {
        vec![
            ((len >> 32) as u8) | 0xF0,
            ((len >> 24) & 0xFF) as u8,
            ((len >> 16) & 0xFF) as u8,
            ((len >> 8) & 0xFF) as u8,
            (len & 0xFF) as u8,
        ]
    }
}

/// Encodes one word: length prefix followed by the raw bytes
#[must_use]
pub fn encode_word(word: &str) -> Vec<u8> {
    let bytes = word.as_bytes();
    let mut out = encode_length(bytes.len());
    out.extend_from_slice(bytes);
    out
}

/// Encodes a full sentence: every word, then the zero-length terminator
#[must_use]
pub fn encode_sentence<S: AsRef<str>>(words: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    for w in words {
        out.extend_from_slice(&encode_word(w.as_ref()));
    }
    out.push(0);
    out
}

/// Decodes a length prefix from a byte slice
///
/// Returns `(length, bytes_consumed)`. A truncated prefix or a reserved
/// leading byte (>= 0xF8, a control byte) is a protocol error, never a
/// silent misread.
pub fn decode_length(buf: &[u8]) -> Result<(usize, usize)> {
    let first = *buf
        .first()
        .ok_or_else(|| AppError::Protocol("empty input while decoding length".to_string()))?;

    let extra = if first & 0x80 == 0 {
        0
    } else if first & 0xC0 == 0x80 {
        1
    } else if first & 0xE0 == 0xC0 {
        2
    } else if first & 0xF0 == 0xE0 {
        3
    } else if first & 0xF8 == 0xF0 {
        4
    } else {
        tracing::debug!("Undecodable length prefix, buffer head: {:02X?}", head(buf));
        return Err(AppError::Protocol(format!(
            "reserved length prefix byte {first:#04X}"
        )));
    };

    if buf.len() < 1 + extra {
        tracing::debug!("Truncated length prefix, buffer head: {:02X?}", head(buf));
        return Err(AppError::Protocol(format!(
            "truncated length prefix: need {} continuation byte(s), have {} ({:02X?})",
            extra,
            buf.len() - 1,
            head(buf)
        )));
    }

    let mut len = match extra {
        0 => first as usize,
        1 => (first & 0x3F) as usize,
        2 => (first & 0x1F) as usize,
        3 => (first & 0x0F) as usize,
        _ => (first & 0x07) as usize,
    };
    for &b in &buf[1..=extra] {
        len = (len << 8) | b as usize;
    }
    Ok((len, 1 + extra))
}

/// First bytes of an undecodable buffer, for diagnostics
fn head(buf: &[u8]) -> &[u8] {
    &buf[..buf.len().min(8)]
}

/// Decodes one word from a byte slice
///
/// Returns `(word, bytes_consumed)`; a zero-length word is the sentence
/// terminator and comes back as an empty string.
pub fn decode_word(buf: &[u8]) -> Result<(String, usize)> {
    let (len, prefix) = decode_length(buf)?;
    let end = prefix + len;
    if buf.len() < end {
        tracing::debug!("Truncated word, buffer head: {:02X?}", head(buf));
        return Err(AppError::Protocol(format!(
            "truncated word: length prefix says {} byte(s), have {} ({:02X?})",
            len,
            buf.len() - prefix,
            head(buf)
        )));
    }
    let word = String::from_utf8_lossy(&buf[prefix..end]).into_owned();
    Ok((word, end))
}

/// Decodes a full sentence, stopping exactly at the terminator
///
/// Returns the words and the total bytes consumed including the terminator;
/// trailing bytes are left untouched.
pub fn decode_sentence(buf: &[u8]) -> Result<(Vec<String>, usize)> {
    let mut words = Vec::new();
    let mut pos = 0;
    loop {
        let (word, consumed) = decode_word(&buf[pos..])?;
        pos += consumed;
        if word.is_empty() {
            return Ok((words, pos));
        }
        words.push(word);
    }
}

/// Reads a length prefix from an async stream
///
/// Async mirror of [`decode_length`]. A stream that closes mid-prefix
/// surfaces the underlying IO error (the peer hung up), while a reserved
/// leading byte is a protocol error.
pub(crate) async fn read_length<R: AsyncRead + Unpin>(stream: &mut R) -> Result<usize> {
    let first = stream.read_u8().await?;
    let len = if first & 0x80 == 0 {
        first as usize
    } else if first & 0xC0 == 0x80 {
        let second = stream.read_u8().await?;
        (((first & 0x3F) as usize) << 8) + second as usize
    } else if first & 0xE0 == 0xC0 {
        let second = stream.read_u8().await?;
        let third = stream.read_u8().await?;
        (((first & 0x1F) as usize) << 16) + ((second as usize) << 8) + third as usize
    } else if first & 0xF0 == 0xE0 {
        let second = stream.read_u8().await?;
        let third = stream.read_u8().await?;
        let fourth = stream.read_u8().await?;
        (((first & 0x0F) as usize) << 24)
            + ((second as usize) << 16)
            + ((third as usize) << 8)
            + fourth as usize
    } else if first & 0xF8 == 0xF0 {
        // five byte length
        let b2 = stream.read_u8().await?;
        let b3 = stream.read_u8().await?;
        let b4 = stream.read_u8().await?;
        let b5 = stream.read_u8().await?;
        ((first & 0x07) as usize) << 32
            | (b2 as usize) << 24
            | (b3 as usize) << 16
            | (b4 as usize) << 8
            | b5 as usize
    } else {
        return Err(AppError::Protocol(format!(
            "reserved length prefix byte {first:#04X}"
        )));
    };
    Ok(len)
}
