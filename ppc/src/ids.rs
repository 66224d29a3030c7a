//! Composite resource identifiers
//!
//! Terraform keeps a single `id` string per resource. Objects scoped to a
//! cloud instance (or to a network, an instance, ...) store every path
//! segment needed to find them again, joined with `/`.

use thiserror::Error;

pub const SEPARATOR: char = '/';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("cannot build an id from zero parts")]
    Empty,

    #[error("id segment {segment:?} is empty or contains '/'")]
    InvalidSegment { segment: String },

    #[error("malformed id {id:?}: expected {expected} parts separated by '/', found {found}")]
    Malformed {
        id: String,
        expected: usize,
        found: usize,
    },
}

/// Joins `parts` into one id. Rejects empty segments and segments that
/// contain the separator, since those could not be split back apart.
pub fn encode(parts: &[&str]) -> Result<String, IdError> {
    if parts.is_empty() {
        return Err(IdError::Empty);
    }

    for part in parts {
        if part.is_empty() || part.contains(SEPARATOR) {
            return Err(IdError::InvalidSegment {
                segment: part.to_string(),
            });
        }
    }

    Ok(parts.join("/"))
}

/// Splits `id` into exactly `arity` non-empty segments
pub fn decode(id: &str, arity: usize) -> Result<Vec<String>, IdError> {
    let parts: Vec<&str> = id.split(SEPARATOR).collect();

    if parts.len() != arity || parts.iter().any(|p| p.is_empty()) {
        return Err(IdError::Malformed {
            id: id.to_string(),
            expected: arity,
            found: parts.len(),
        });
    }

    Ok(parts.into_iter().map(String::from).collect())
}

pub fn decode_pair(id: &str) -> Result<(String, String), IdError> {
    let mut parts = decode(id, 2)?.into_iter();
    match (parts.next(), parts.next()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(IdError::Malformed {
            id: id.to_string(),
            expected: 2,
            found: 0,
        }),
    }
}

pub fn decode_triple(id: &str) -> Result<(String, String, String), IdError> {
    let mut parts = decode(id, 3)?.into_iter();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), Some(c)) => Ok((a, b, c)),
        _ => Err(IdError::Malformed {
            id: id.to_string(),
            expected: 3,
            found: 0,
        }),
    }
}
