//! Run identifiers.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::Error;

/// Identifies one pipeline run. The controller mints it, passes it to the
/// worker on the command line, and both sides name the run's scratch
/// subdirectory after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    /// A fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

/// Hyphenated lowercase form, which is also the scratch directory name.
impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for RunId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::Validation(format!("invalid run id '{s}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_differ() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn command_line_form_parses_back() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn display_is_a_safe_directory_name() {
        let id: RunId = "6F9619FF-8B86-D011-B42D-00CF4FC964FF".parse().unwrap();
        assert_eq!(id.to_string(), "6f9619ff-8b86-d011-b42d-00cf4fc964ff");
        assert!(!id.to_string().contains(['/', '\\']));
    }

    #[test]
    fn rejects_garbage_as_validation_error() {
        let err = "../etc".parse::<RunId>().unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("invalid run id '../etc'"));
    }
}
