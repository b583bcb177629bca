//! Revision Codec.
//!
//! Converts stream revisions to and from weak entity tags (`W/"<revision>"`)
//! so they can travel in `ETag` and `If-Match` headers. The token grammar is
//! deliberately narrow: a `W/` prefix, a double-quoted body, and only ASCII
//! digits inside the quotes.

use thiserror::Error;

use crate::types::{ExpectedRevision, StreamRevision};

const WEAK_PREFIX: &str = "W/";

/// A conditional token that does not follow the weak entity-tag grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ETagError {
    /// The token does not start with `W/`.
    #[error("entity tag '{0}' is not a weak entity tag")]
    NotWeak(String),
    /// The body is not wrapped in double quotes.
    #[error("entity tag '{0}' is not quoted")]
    Unquoted(String),
    /// The quoted body is empty.
    #[error("entity tag '{0}' has an empty revision")]
    EmptyRevision(String),
    /// The quoted body is not an unsigned decimal number.
    #[error("entity tag '{0}' does not hold a non-negative decimal revision")]
    NotARevision(String),
    /// The revision does not fit in 64 bits.
    #[error("entity tag '{0}' holds a revision that is out of range")]
    OutOfRange(String),
}

impl ETagError {
    /// Machine-readable code shared by every malformed-token failure.
    pub const fn code(&self) -> &'static str {
        "INVALID_ETAG"
    }
}

/// Encodes a revision as a weak entity tag.
///
/// ```
/// use eventguard::{to_weak_etag, StreamRevision};
///
/// assert_eq!(to_weak_etag(StreamRevision::new(42)), r#"W/"42""#);
/// ```
pub fn to_weak_etag(revision: StreamRevision) -> String {
    format!("{WEAK_PREFIX}\"{revision}\"")
}

/// Decodes a weak entity tag back into a revision.
///
/// Surrounding whitespace is ignored; anything else outside the grammar is
/// rejected rather than defaulted.
pub fn parse_weak_etag(header_value: &str) -> Result<StreamRevision, ETagError> {
    let token = header_value.trim();

    let quoted = token
        .strip_prefix(WEAK_PREFIX)
        .ok_or_else(|| ETagError::NotWeak(token.to_string()))?;

    let body = quoted
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| ETagError::Unquoted(token.to_string()))?;

    if body.is_empty() {
        return Err(ETagError::EmptyRevision(token.to_string()));
    }

    if !body.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ETagError::NotARevision(token.to_string()));
    }

    body.parse::<u64>()
        .map(StreamRevision::new)
        .map_err(|_| ETagError::OutOfRange(token.to_string()))
}

/// Turns an optional `If-Match` header value into an append precondition.
///
/// A missing header means the caller asserted nothing, which maps to
/// [`ExpectedRevision::Any`]; a present but malformed header is an error.
pub fn expected_revision_from_if_match(
    header_value: Option<&str>,
) -> Result<ExpectedRevision, ETagError> {
    header_value.map_or(Ok(ExpectedRevision::Any), |value| {
        parse_weak_etag(value).map(ExpectedRevision::Exact)
    })
}
