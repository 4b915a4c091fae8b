//! Request context carried through a sync invocation

use uuid::Uuid;

/// Per-invocation context. The request id tags every log line emitted while
/// serving one sync call; fan-out units get a [`Kit::sub_kit`] so their lines
/// can be told apart and still grouped under the parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kit {
    pub rid: String,
}

impl Kit {
    pub fn new() -> Self {
        Self {
            rid: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn with_rid(rid: impl Into<String>) -> Self {
        Self { rid: rid.into() }
    }

    /// Derive a child context for a fan-out unit
    pub fn sub_kit(&self) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            rid: format!("{}-{}", self.rid, &suffix[..8]),
        }
    }
}

impl Default for Kit {
    fn default() -> Self {
        Self::new()
    }
}
