//! Reaction bookkeeping shared by posts, comments and replies.
//!
//! Nothing here performs I/O. The store computes a [`ReactionTransition`]
//! before calling the server and applies it only once the server confirms.

use murmur_types::{ReactCounts, Reactable, ReactRequest, ReactionType};

/// Count change for one entity. Never has `add == remove` unless both are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionDelta {
    pub add: Option<ReactionType>,
    pub remove: Option<ReactionType>,
}

impl ReactionDelta {
    pub fn is_noop(&self) -> bool {
        self.add.is_none() && self.remove.is_none()
    }

    /// Wire body for the react endpoint
    pub fn to_request(&self) -> ReactRequest {
        ReactRequest::new(self.add, self.remove)
    }
}

/// Delta plus the viewer's selection after it is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionTransition {
    pub delta: ReactionDelta,
    pub next: Option<ReactionType>,
}

/// Selecting `chosen` while `current` is selected:
/// nothing selected adds, the same type toggles off, another type switches.
pub fn transition(current: Option<ReactionType>, chosen: ReactionType) -> ReactionTransition {
    match current {
        None => ReactionTransition {
            delta: ReactionDelta { add: Some(chosen), remove: None },
            next: Some(chosen),
        },
        Some(selected) if selected == chosen => ReactionTransition {
            delta: ReactionDelta { add: None, remove: Some(chosen) },
            next: None,
        },
        Some(selected) => ReactionTransition {
            delta: ReactionDelta { add: Some(chosen), remove: Some(selected) },
            next: Some(chosen),
        },
    }
}

/// Apply a delta to counts. Removal saturates at zero.
pub fn apply_delta(counts: &mut ReactCounts, delta: &ReactionDelta) {
    if let Some(added) = delta.add {
        counts.set(added, counts.get(added).saturating_add(1));
    }
    if let Some(removed) = delta.remove {
        counts.set(removed, counts.get(removed).saturating_sub(1));
    }
}

/// Commit a confirmed transition to any reactable entity
pub fn commit<R: Reactable + ?Sized>(entity: &mut R, transition: &ReactionTransition) {
    apply_delta(entity.react_counts_mut(), &transition.delta);
    entity.set_my_reaction(transition.next);
}
