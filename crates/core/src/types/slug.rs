//! URL slugs derived from display names.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a name has no characters usable in a slug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlugError {
    /// The name produced an empty slug.
    #[error("name must contain at least one letter or digit")]
    Empty,
}

/// A lowercase, dash-separated identifier derived from a name.
///
/// Derivation keeps ASCII letters and digits (lowercased), collapses every run
/// of other characters into a single `-` and trims dashes at both ends. The
/// output alphabet is `[a-z0-9-]` with no leading, trailing or repeated dash,
/// so deriving a slug from a slug returns it unchanged.
///
/// ```
/// use emporium_core::Slug;
///
/// let slug = Slug::derive("Running Shoes & Boots").unwrap();
/// assert_eq!(slug.as_str(), "running-shoes-boots");
/// assert_eq!(Slug::derive(slug.as_str()).unwrap(), slug);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Derive a slug from a display name.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the name has no ASCII letters or digits.
    pub fn derive(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        let mut pending_dash = false;

        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }

        if out.is_empty() {
            return Err(SlugError::Empty);
        }
        Ok(Self(out))
    }

    /// Wrap a value that is already a slug (a stored column or a path segment).
    ///
    /// The value is not re-derived; lookups with a malformed slug simply miss.
    #[must_use]
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
