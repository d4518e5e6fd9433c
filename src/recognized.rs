use std::fmt;

/// A header value that was either recognized as a known variant `T`, or is
/// an unrecognized raw value `Raw`.
///
/// Like `Result<T, Raw>`, except the raw case is not an error by itself: a
/// file may carry a value this crate has no name for, and the raw value is
/// kept so it can still be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Recognized<T, Raw = u16> {
    Known(T),
    Unknown(Raw),
}

impl<T, Raw> Recognized<T, Raw> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Recognized::Known(t) => Some(t),
            Recognized::Unknown(_) => None,
        }
    }

    pub fn unknown(&self) -> Option<&Raw> {
        match self {
            Recognized::Known(_) => None,
            Recognized::Unknown(raw) => Some(raw),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Recognized::Known(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Recognized<U, Raw> {
        match self {
            Recognized::Known(t) => Recognized::Known(f(t)),
            Recognized::Unknown(raw) => Recognized::Unknown(raw),
        }
    }
}

impl<T, Raw> From<T> for Recognized<T, Raw> {
    fn from(value: T) -> Self {
        Recognized::Known(value)
    }
}

impl<T: fmt::Display, Raw: fmt::Display> fmt::Display for Recognized<T, Raw> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recognized::Known(t) => t.fmt(f),
            Recognized::Unknown(raw) => write!(f, "unknown ({raw})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::c2g::IndexFormat;

    #[test]
    fn index_sizes() {
        let known = IndexFormat::from_size(2);
        assert!(known.is_known());
        assert_eq!(known.to_string(), "u16");

        let odd = IndexFormat::from_size(3);
        assert_eq!(odd.unknown(), Some(&3));
        assert_eq!(odd.to_string(), "unknown (3)");
        assert_eq!(odd.map(|f| f.to_string()).known(), None);
    }
}
