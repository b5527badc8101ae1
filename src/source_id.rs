//! Source identification type.

use std::sync::Arc;

/// Identifier for a capturable audio source, typically a browser tab.
///
/// `SourceId` is what the host environment hands the engine to name one
/// capturable thing. It is cheap to clone (`Arc<str>` internally) and is
/// used as the registry key for the source's pipeline.
///
/// # Example
///
/// ```
/// use tab_eq::SourceId;
///
/// let a = SourceId::for_tab(42);
/// let b = SourceId::new("tab:42");
///
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Arc<str>);

impl SourceId {
    /// Creates a source ID from a string.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Creates a source ID for a numeric tab identifier.
    ///
    /// Host tab ids are integers; this formats them into the canonical
    /// `tab:<n>` form so they can coexist with other id schemes.
    pub fn for_tab(tab_id: u32) -> Self {
        Self::new(format!("tab:{tab_id}"))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
