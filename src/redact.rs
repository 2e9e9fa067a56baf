//! Secret redaction for logs and serialized output.
//!
//! The signing key travels through [`Config`](crate::config::Config), which is
//! logged and debug-printed. Wrapping it in [`Redacted`] keeps it out of
//! `Debug`, `Display` and `Serialize` output; all of them print `"<redacted>"`.

use std::fmt::{self, Debug, Display};

/// Wrapper that redacts its inner value when formatted or serialized.
///
/// Read the secret through [`expose`](Redacted::expose) or the public field.
///
/// # Example
///
/// ```
/// use hro_linker::redact::Redacted;
///
/// let key = Redacted("0xac09".to_string());
/// assert_eq!(format!("{:?}", key), "<redacted>");
/// assert_eq!(key.expose(), "0xac09");
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        "<redacted>".serialize(serializer)
    }
}
