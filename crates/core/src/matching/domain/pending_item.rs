use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use super::match_context::MatchContext;

/// Opaque token identifying one deferred hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PendingId(Uuid);

impl PendingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PendingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PendingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A hypothesis waiting for the slow path.
///
/// Only ever changed by copy: a retry is a new item with `attempts + 1`
/// and the same id, context and partials.
#[derive(Debug, Clone)]
pub struct PendingAsrItem {
    pub id: PendingId,
    pub text: String,
    pub confidence: f32,
    pub context: Arc<MatchContext>,
    /// Earlier partial hypotheses, oldest first.
    pub partials: Vec<String>,
    pub attempts: u32,
    pub enqueued_at: Instant,
}

impl PendingAsrItem {
    pub fn new(
        text: impl Into<String>,
        confidence: f32,
        context: Arc<MatchContext>,
        partials: Vec<String>,
    ) -> Self {
        Self {
            id: PendingId::new(),
            text: text.into(),
            confidence,
            context,
            partials,
            attempts: 0,
            enqueued_at: Instant::now(),
        }
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            attempts: self.attempts + 1,
            ..self.clone()
        }
    }
}
