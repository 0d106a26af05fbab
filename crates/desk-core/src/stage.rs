//! Stage invocation identities

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one stage invocation
///
/// A fresh identity is minted every time a stage runs, so re-running the same
/// stage never collides with an earlier result. The stage name travels along
/// for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageIdentity {
    id: Uuid,
    name: String,
}

impl StageIdentity {
    /// Mint a new identity for a stage invocation
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Renders as `Stage Name (uuid)`, the form used for document headings
impl fmt::Display for StageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
