//! Decoding of backend replies into typed records.
//!
//! Two strategies exist: delimited-section decoding for combined-mode
//! documents, and per-task decoding of JSON records or text. Every
//! decoder is total. When a reply cannot be interpreted the decoder
//! substitutes a fallback value and tags the result as degraded.

pub mod records;
pub mod sections;

pub use records::decode_task;
pub use sections::decode_combined;

/// Outcome of a decode: the parsed value, or a fallback and its reason.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Ok(T),
    Fallback { value: T, reason: String },
}

impl<T> Decoded<T> {
    pub fn fallback(value: T, reason: impl Into<String>) -> Self {
        Decoded::Fallback {
            value,
            reason: reason.into(),
        }
    }

    /// Returns true if the fallback value was substituted.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Decoded::Fallback { .. })
    }

    /// Why decoding degraded, if it did.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Decoded::Ok(_) => None,
            Decoded::Fallback { reason, .. } => Some(reason),
        }
    }

    #[allow(dead_code)] // Borrowing accessor; the run consumes values
    pub fn value(&self) -> &T {
        match self {
            Decoded::Ok(value) | Decoded::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Decoded::Ok(value) | Decoded::Fallback { value, .. } => value,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Decoded<U> {
        match self {
            Decoded::Ok(value) => Decoded::Ok(f(value)),
            Decoded::Fallback { value, reason } => Decoded::Fallback {
                value: f(value),
                reason,
            },
        }
    }
}

/// Bullet marker for list lines.
pub(crate) const BULLET: &str = "- ";

/// Collect the `"- "` bullet lines of a block, dropping everything else.
pub(crate) fn bullet_items<'a, I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(|line| line.trim().strip_prefix(BULLET))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
