//! fsm - table-driven finite state machine with transition validation

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S, E> {
    pub event: E,
    pub from: S,
    pub to: S,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsmError {
    #[error("duplicate transition [From: {from}, Event: {event}]")]
    DuplicateTransition { from: String, event: String },

    #[error("unknown state: {0}")]
    UnknownState(String),

    #[error("unknown transition [From: {from}, Event: {event}]")]
    UnknownTransition { from: String, event: String },
}

/// A validated transition table keyed by (from state, event).
#[derive(Debug)]
pub struct Fsm<S, E> {
    transitions: HashMap<(S, E), S>,
}

impl<S, E> Fsm<S, E>
where
    S: Copy + Eq + Hash + Debug,
    E: Copy + Eq + Hash + Debug,
{
    /// Build the table.  Fails on a repeated (from, event) pair, or if a state that has a
    /// callback never appears in any transition.
    pub fn new(transitions: &[Transition<S, E>], callback_states: &[S]) -> Result<Self, FsmError> {
        let mut table = HashMap::new();
        let mut known_states = HashSet::new();

        for t in transitions {
            if table.insert((t.from, t.event), t.to).is_some() {
                return Err(FsmError::DuplicateTransition {
                    from: format!("{:?}", t.from),
                    event: format!("{:?}", t.event),
                });
            }
            known_states.insert(t.from);
            known_states.insert(t.to);
        }

        if let Some(s) = callback_states.iter().find(|s| !known_states.contains(s)) {
            return Err(FsmError::UnknownState(format!("{s:?}")));
        }

        Ok(Fsm { transitions: table })
    }

    /// Look up the target state for `event` fired in `from`.
    pub fn transition(&self, from: S, event: E) -> Result<S, FsmError> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| FsmError::UnknownTransition {
                from: format!("{from:?}"),
                event: format!("{event:?}"),
            })
    }
}
