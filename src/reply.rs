//! Reply - untyped value tree returned by the store
//!
//! A reply carries no schema: its meaning is encoded in shape and position.
//! Decoders never match on variants directly for structure they require;
//! they go through the checked accessors below, which fail with a
//! [`ShapeError`] naming what was expected and what was found.

use std::borrow::Cow;
use std::fmt;

use crate::error::ShapeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Simple string (`+OK`)
    Str(String),
    Int(i64),
    /// Bulk string, not necessarily UTF-8
    Bytes(Vec<u8>),
    Array(Vec<Reply>),
    Nil,
}

impl Reply {
    /// Shape name used in error messages
    pub fn shape(&self) -> String {
        match self {
            Reply::Str(_) => "string".to_string(),
            Reply::Int(_) => "integer".to_string(),
            Reply::Bytes(_) => "bytes".to_string(),
            Reply::Array(items) => format!("array of {}", items.len()),
            Reply::Nil => "nil".to_string(),
        }
    }

    pub fn as_int(&self) -> Result<i64, ShapeError> {
        match self {
            Reply::Int(n) => Ok(*n),
            other => Err(ShapeError::new("integer", other.shape())),
        }
    }

    pub fn as_array(&self) -> Result<&[Reply], ShapeError> {
        match self {
            Reply::Array(items) => Ok(items),
            other => Err(ShapeError::new("array", other.shape())),
        }
    }

    /// Text of a simple or bulk string. Invalid UTF-8 is replaced lossily.
    pub fn as_text(&self) -> Result<Cow<'_, str>, ShapeError> {
        match self {
            Reply::Str(s) => Ok(Cow::Borrowed(s)),
            Reply::Bytes(b) => Ok(String::from_utf8_lossy(b)),
            other => Err(ShapeError::new("string", other.shape())),
        }
    }

    /// Element `index` of an array reply.
    pub fn get(&self, index: usize) -> Result<&Reply, ShapeError> {
        let items = self.as_array()?;
        items.get(index).ok_or_else(|| {
            ShapeError::new(format!("array of at least {}", index + 1), self.shape())
        })
    }

    /// Value half of a `[tag, value]` pair.
    pub fn pair_value(&self) -> Result<&Reply, ShapeError> {
        self.get(1)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Reply::Array(_))
    }
}

/// Flat text rendering used by the generic reply mappers.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Str(s) => f.write_str(s),
            Reply::Int(n) => write!(f, "{}", n),
            Reply::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Reply::Nil => Ok(()),
            Reply::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Bytes(s.as_bytes().to_vec())
    }
}

impl From<i64> for Reply {
    fn from(n: i64) -> Self {
        Reply::Int(n)
    }
}

impl From<Vec<Reply>> for Reply {
    fn from(items: Vec<Reply>) -> Self {
        Reply::Array(items)
    }
}
