//! Single-resolution readiness gate.
//!
//! The gate starts pending. Work that depends on it is parked as a waiter
//! and handed back, in arrival order, by the first `resolve`. Once
//! resolved the gate stays resolved and `wait` returns its argument
//! immediately.

use std::fmt;

pub struct HandshakeGate<W> {
    state: GateState<W>,
}

enum GateState<W> {
    Pending(Vec<W>),
    Resolved,
}

impl<W> HandshakeGate<W> {
    pub fn new() -> Self {
        Self {
            state: GateState::Pending(Vec::new()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, GateState::Resolved)
    }

    /// Number of parked waiters.
    pub fn pending(&self) -> usize {
        match &self.state {
            GateState::Pending(waiters) => waiters.len(),
            GateState::Resolved => 0,
        }
    }

    /// Register `waiter`. Returns it straight back when the gate is
    /// already resolved, otherwise parks it and returns `None`.
    pub fn wait(&mut self, waiter: W) -> Option<W> {
        match &mut self.state {
            GateState::Pending(waiters) => {
                waiters.push(waiter);
                None
            }
            GateState::Resolved => Some(waiter),
        }
    }

    /// Resolve the gate and release every parked waiter. Later calls
    /// release nothing.
    pub fn resolve(&mut self) -> Vec<W> {
        match std::mem::replace(&mut self.state, GateState::Resolved) {
            GateState::Pending(waiters) => waiters,
            GateState::Resolved => Vec::new(),
        }
    }

    /// Drop parked waiters without resolving.
    pub fn clear_waiters(&mut self) -> usize {
        match &mut self.state {
            GateState::Pending(waiters) => {
                let dropped = waiters.len();
                waiters.clear();
                dropped
            }
            GateState::Resolved => 0,
        }
    }
}

impl<W> Default for HandshakeGate<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> fmt::Debug for HandshakeGate<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeGate")
            .field("resolved", &self.is_resolved())
            .field("pending", &self.pending())
            .finish()
    }
}
