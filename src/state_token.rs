//! Opaque resumption/idempotency handles carried in responses.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::render::{FieldValue, LogValue};

/// An opaque handle a handler can attach to its response so callers can
/// resume or deduplicate a command later. The pipeline never inspects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateToken {
    token: Uuid,
}

impl StateToken {
    pub fn of(token: Uuid) -> Self {
        Self { token }
    }

    /// primarily used for testing
    pub fn random() -> Self {
        Self::of(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.token
    }
}

impl std::fmt::Display for StateToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token)
    }
}

impl LogValue for StateToken {
    fn log_value(&self) -> FieldValue<'_> {
        FieldValue::Text(self.token.to_string())
    }
}
