use std::fmt;

/// Raised when a splitter rule set would make a shard statically depend on
/// one of its own ancestors. This is the only condition that aborts a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularReferenceError {
    /// Shard whose module queue discovered the edge
    pub from: String,
    /// Splitter the offending module matched
    pub to: String,
}

impl fmt::Display for CircularReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "circular reference detected between splitter '{}' and splitter '{}'",
            self.from, self.to
        )
    }
}

impl std::error::Error for CircularReferenceError {}
