//! RESP2 wire codec
//!
//! Request:  array of bulk strings (`*<n>\r\n$<len>\r\n<arg>\r\n...`)
//! Reply:    one of `+` simple string, `-` error, `:` integer,
//!           `$` bulk string, `*` array (nested)
//!
//! Error replies are not values: they surface as [`ClientError::Protocol`].
//! An error nested inside an array is reported only after the whole array
//! has been consumed so the connection stays in sync.

use std::io::{BufRead, Read, Write};

use crate::error::ClientError;
use crate::reply::Reply;

/// Largest bulk string accepted (matches the store's proto-max-bulk-len default)
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest array length accepted
const MAX_ARRAY_LEN: usize = 16 * 1024 * 1024;

/// Deepest array nesting accepted
pub const MAX_DEPTH: usize = 512;

pub fn encode_command(command: &str, args: &[&str]) -> Vec<u8> {
    let capacity = 16 + command.len() + args.iter().map(|a| a.len() + 16).sum::<usize>();
    let mut buf = Vec::with_capacity(capacity);
    buf.extend_from_slice(format!("*{}\r\n", args.len() + 1).as_bytes());
    for part in std::iter::once(&command).chain(args.iter()) {
        buf.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        buf.extend_from_slice(part.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

pub fn write_command<W: Write>(
    writer: &mut W,
    command: &str,
    args: &[&str],
) -> std::io::Result<()> {
    writer.write_all(&encode_command(command, args))?;
    writer.flush()
}

/// Read exactly one reply.
pub fn read_reply<R: BufRead>(reader: &mut R) -> Result<Reply, ClientError> {
    match read_value(reader, 0)? {
        Parsed::Value(reply) => Ok(reply),
        Parsed::Error(message) => Err(ClientError::Protocol(message)),
    }
}

enum Parsed {
    Value(Reply),
    Error(String),
}

fn read_value<R: BufRead>(reader: &mut R, depth: usize) -> Result<Parsed, ClientError> {
    let line = read_line(reader)?;
    let (kind, rest) = match line.split_first() {
        Some((kind, rest)) => (*kind, rest),
        None => return Err(ClientError::Codec("empty reply line".to_string())),
    };

    match kind {
        b'+' => Ok(Parsed::Value(Reply::Str(String::from_utf8_lossy(rest).into_owned()))),
        b'-' => Ok(Parsed::Error(String::from_utf8_lossy(rest).into_owned())),
        b':' => Ok(Parsed::Value(Reply::Int(parse_int(rest)?))),
        b'$' => {
            let len = parse_int(rest)?;
            if len == -1 {
                return Ok(Parsed::Value(Reply::Nil));
            }
            let len = checked_len(len, MAX_BULK_LEN)?;
            // Grow with the bytes that arrive, not the declared length
            let mut buf = Vec::with_capacity(len.min(64 * 1024) + 2);
            reader.by_ref().take(len as u64 + 2).read_to_end(&mut buf)?;
            if buf.len() < len + 2 {
                return Err(ClientError::Transport(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by store",
                )));
            }
            if !buf.ends_with(b"\r\n") {
                return Err(ClientError::Codec("bulk string not terminated by CRLF".to_string()));
            }
            buf.truncate(len);
            Ok(Parsed::Value(Reply::Bytes(buf)))
        }
        b'*' => {
            let len = parse_int(rest)?;
            if len == -1 {
                return Ok(Parsed::Value(Reply::Nil));
            }
            let len = checked_len(len, MAX_ARRAY_LEN)?;
            if depth >= MAX_DEPTH {
                return Err(ClientError::Codec(format!(
                    "reply nested deeper than {} arrays",
                    MAX_DEPTH
                )));
            }
            let mut items = Vec::with_capacity(len.min(1024));
            let mut first_error = None;
            for _ in 0..len {
                match read_value(reader, depth + 1)? {
                    Parsed::Value(item) => items.push(item),
                    Parsed::Error(message) => {
                        if first_error.is_none() {
                            first_error = Some(message);
                        }
                    }
                }
            }
            Ok(match first_error {
                Some(message) => Parsed::Error(message),
                None => Parsed::Value(Reply::Array(items)),
            })
        }
        other => Err(ClientError::Codec(format!("unknown reply type byte 0x{:02x}", other))),
    }
}

/// Read one CRLF-terminated line, without the terminator.
fn read_line<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, ClientError> {
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line)?;
    if n == 0 {
        return Err(ClientError::Transport(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed by store",
        )));
    }
    if !line.ends_with(b"\r\n") {
        return Err(ClientError::Codec("reply line not terminated by CRLF".to_string()));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

fn parse_int(bytes: &[u8]) -> Result<i64, ClientError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            ClientError::Codec(format!("invalid integer '{}'", String::from_utf8_lossy(bytes)))
        })
}

fn checked_len(len: i64, max: usize) -> Result<usize, ClientError> {
    usize::try_from(len)
        .ok()
        .filter(|&len| len <= max)
        .ok_or_else(|| ClientError::Codec(format!("invalid length {}", len)))
}
