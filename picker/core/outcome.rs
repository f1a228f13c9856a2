use serde::{Deserialize, Serialize};

/// Why a request left the session unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoopKind {
    /// Blank, duplicate, absent or out-of-range input, or too few names.
    ValidationNoop,
    /// An import yielded no usable names.
    ImportEmpty,
    /// A spin was requested while another one is pending.
    PendingConflict,
}

impl NoopKind {
    /// Short label used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ValidationNoop => "validation_noop",
            Self::ImportEmpty => "import_empty",
            Self::PendingConflict => "pending_conflict",
        }
    }
}

/// Result of a session request. Ignored requests are not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The request changed state.
    Applied(T),
    /// The request was dropped.
    Ignored(NoopKind),
}

impl<T> Outcome<T> {
    /// True for [`Outcome::Applied`].
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The reason, if ignored.
    #[must_use]
    pub const fn noop(&self) -> Option<NoopKind> {
        match self {
            Self::Applied(_) => None,
            Self::Ignored(kind) => Some(*kind),
        }
    }

    /// Converts into an `Option`, dropping the reason.
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Ignored(_) => None,
        }
    }
}
