//! Size label type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Size`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    /// The input is empty or only whitespace.
    #[error("size cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("size must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A garment size label such as `M`, `XL` or `32x34`.
///
/// Sizes are opaque to the cart: two lines with the same product and
/// different sizes are different lines. Comparison is exact (after trimming),
/// matching how the backend keys its cart items.
///
/// ## Constraints
///
/// - Leading and trailing whitespace is removed
/// - Length: 1-16 characters after trimming
///
/// ## Examples
///
/// ```
/// use tidewear_core::Size;
///
/// assert_eq!(Size::parse(" M ").unwrap().as_str(), "M");
/// assert!(Size::parse("").is_err());
/// assert!(Size::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Size(String);

impl Size {
    /// Maximum length of a size label.
    pub const MAX_LENGTH: usize = 16;

    /// Parse a `Size` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than
    /// [`Size::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, SizeError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(SizeError::Empty);
        }

        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(SizeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the size label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Size` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Size {
    type Err = SizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Size {
    type Error = SizeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Size> for String {
    fn from(size: Size) -> Self {
        size.0
    }
}

impl AsRef<str> for Size {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
