// src/core/registry.rs

//! Arena of all sessions opened through one runtime.
//!
//! Sessions refer to each other by [`SessionId`] only. The registry records which
//! session spawned which, the transport each one runs on, and whether it owns that
//! transport, and it is the source of truth for session state. Closing a transport
//! owner therefore closes every inline sub-shell layered on it, even when those
//! sub-shell handles live elsewhere.
//!
//! Slots are recycled: once a session's handle is released and it and its whole subtree
//! are terminal, the node is pruned and its slot moves to the next generation.

use crate::{
    dialect::ShellDialect,
    models::{SessionId, SessionState, TransportId},
};
use log::trace;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNode {
    pub id: SessionId,
    pub parent: Option<SessionId>,
    pub dialect: ShellDialect,
    pub state: SessionState,
    pub transport: Option<TransportId>,
    /// `true` if the session spawned its transport; `false` for inline sub-shells.
    pub owns_transport: bool,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<SessionNode>,
    /// Set once the session's handle is gone; only released sessions are pruned.
    released: bool,
}

#[derive(Debug, Default)]
struct RegistryInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_transport: u64,
}

impl RegistryInner {
    fn slot_mut(&mut self, id: SessionId) -> Option<&mut Slot> {
        let index = usize::try_from(id.slot()).ok()?;
        self.slots
            .get_mut(index)
            .filter(|slot| slot.generation == id.generation() && slot.node.is_some())
    }

    fn node_mut(&mut self, id: SessionId) -> Option<&mut SessionNode> {
        self.slot_mut(id).and_then(|slot| slot.node.as_mut())
    }

    fn node(&self, id: SessionId) -> Option<&SessionNode> {
        let index = usize::try_from(id.slot()).ok()?;
        self.slots
            .get(index)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    fn nodes(&self) -> impl Iterator<Item = &SessionNode> {
        self.slots.iter().filter_map(|slot| slot.node.as_ref())
    }

    fn insert(&mut self, parent: Option<SessionId>, dialect: ShellDialect) -> SessionId {
        let (slot, generation) = match self.free.pop() {
            Some(slot) => {
                let generation = usize::try_from(slot)
                    .ok()
                    .and_then(|index| self.slots.get(index))
                    .map_or(0, |s| s.generation);
                (slot, generation)
            }
            None => {
                self.slots.push(Slot::default());
                (u32::try_from(self.slots.len() - 1).unwrap_or(u32::MAX), 0)
            }
        };
        let id = SessionId::new(slot, generation);
        if let Some(entry) = usize::try_from(slot).ok().and_then(|index| self.slots.get_mut(index)) {
            entry.node = Some(SessionNode {
                id,
                parent,
                dialect,
                state: SessionState::NotStarted,
                transport: None,
                owns_transport: false,
            });
            entry.released = false;
        }
        id
    }

    fn descendants_on(&self, root: SessionId, transport: TransportId) -> Vec<SessionId> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            for node in self.nodes() {
                if node.parent == Some(current) && node.transport == Some(transport) {
                    found.push(node.id);
                    stack.push(node.id);
                }
            }
        }
        found
    }

    /// Frees released, terminal sessions without children left in the arena, repeating
    /// until no more qualify. A parent therefore goes only after its whole subtree.
    fn prune(&mut self) -> usize {
        let mut pruned = 0;
        loop {
            let parents: Vec<SessionId> = self.nodes().filter_map(|n| n.parent).collect();
            let doomed: Vec<SessionId> = self
                .slots
                .iter()
                .filter(|slot| slot.released)
                .filter_map(|slot| slot.node.as_ref())
                .filter(|n| n.state.is_terminal() && !parents.contains(&n.id))
                .map(|n| n.id)
                .collect();
            if doomed.is_empty() {
                return pruned;
            }
            for id in doomed {
                let Some(slot) = self.slot_mut(id) else {
                    continue;
                };
                slot.node = None;
                slot.released = false;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.slot());
                pruned += 1;
            }
        }
    }
}

/// Shared handle to the session arena. Clones see the same sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a not yet started session, reusing the slot of a pruned one if possible.
    pub fn register(&self, parent: Option<SessionId>, dialect: ShellDialect) -> SessionId {
        self.lock().insert(parent, dialect)
    }

    /// Records that the handle of a session is gone. The node is pruned as soon as it
    /// and everything spawned from it have reached a terminal state.
    pub fn release(&self, id: SessionId) {
        let mut inner = self.lock();
        if let Some(slot) = inner.slot_mut(id) {
            slot.released = true;
            let pruned = inner.prune();
            if pruned > 0 {
                trace!("Pruned {} session(s) from the registry.", pruned);
            }
        }
    }

    /// Hands out a fresh transport identifier.
    pub fn allocate_transport(&self) -> TransportId {
        let mut inner = self.lock();
        let id = TransportId(inner.next_transport);
        inner.next_transport += 1;
        id
    }

    pub fn bind_transport(&self, id: SessionId, transport: TransportId, owns: bool) {
        if let Some(node) = self.lock().node_mut(id) {
            node.transport = Some(transport);
            node.owns_transport = owns;
        }
    }

    pub fn node(&self, id: SessionId) -> Option<SessionNode> {
        self.lock().node(id).cloned()
    }

    pub fn state(&self, id: SessionId) -> Option<SessionState> {
        self.lock().node(id).map(|n| n.state)
    }

    /// Moves a session to `state`. Terminal states are final and are never left.
    pub fn set_state(&self, id: SessionId, state: SessionState) -> bool {
        match self.lock().node_mut(id) {
            Some(node) if !node.state.is_terminal() => {
                node.state = state;
                true
            }
            _ => false,
        }
    }

    pub fn set_dialect(&self, id: SessionId, dialect: ShellDialect) {
        if let Some(node) = self.lock().node_mut(id) {
            node.dialect = dialect;
        }
    }

    pub fn parent(&self, id: SessionId) -> Option<SessionId> {
        self.lock().node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: SessionId) -> Vec<SessionId> {
        self.lock()
            .nodes()
            .filter(|n| n.parent == Some(id))
            .map(|n| n.id)
            .collect()
    }

    /// Parent chain of a session, nearest first.
    pub fn ancestors(&self, id: SessionId) -> Vec<SessionId> {
        let inner = self.lock();
        let mut chain = Vec::new();
        let mut current = inner.node(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            if chain.contains(&parent) || parent == id {
                break;
            }
            chain.push(parent);
            current = inner.node(parent).and_then(|n| n.parent);
        }
        chain
    }

    /// Closes a session together with every inline descendant layered on it, i.e. every
    /// descendant reachable through sessions sharing its transport.
    /// Returns the sessions whose state changed, the given one first.
    pub fn close_cascade(&self, id: SessionId, state: SessionState) -> Vec<SessionId> {
        let mut inner = self.lock();
        let Some(node) = inner.node(id) else {
            return Vec::new();
        };
        let transport = node.transport;
        let mut targets = vec![id];
        if let Some(transport) = transport {
            targets.extend(inner.descendants_on(id, transport));
        }
        let mut changed = Vec::new();
        for (position, target) in targets.into_iter().enumerate() {
            let Some(node) = inner.node_mut(target) else {
                continue;
            };
            if node.state.is_terminal() {
                continue;
            }
            // Only the session itself takes `state`; dragged-along descendants close.
            node.state = if position == 0 { state } else { SessionState::Closed };
            changed.push(target);
        }
        inner.prune();
        changed
    }

    /// Sessions that have not reached a terminal state.
    pub fn live_sessions(&self) -> Vec<SessionId> {
        self.lock()
            .nodes()
            .filter(|n| !n.state.is_terminal())
            .map(|n| n.id)
            .collect()
    }

    pub fn sessions_on(&self, transport: TransportId) -> Vec<SessionId> {
        self.lock()
            .nodes()
            .filter(|n| n.transport == Some(transport))
            .map(|n| n.id)
            .collect()
    }

    /// Sessions still held in the arena.
    pub fn len(&self) -> usize {
        self.lock().nodes().count()
    }

    /// Allocated slots, occupied or free.
    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root (t0, owner) -> inline (t0) -> nested inline (t0)
    ///                  -> spawned (t1, owner)
    fn tree() -> (SessionRegistry, [SessionId; 4]) {
        let registry = SessionRegistry::new();
        let t0 = registry.allocate_transport();
        let t1 = registry.allocate_transport();

        let root = registry.register(None, ShellDialect::Cmd);
        registry.bind_transport(root, t0, true);
        let inline = registry.register(Some(root), ShellDialect::PowerShell);
        registry.bind_transport(inline, t0, false);
        let nested = registry.register(Some(inline), ShellDialect::Cmd);
        registry.bind_transport(nested, t0, false);
        let spawned = registry.register(Some(root), ShellDialect::Bash);
        registry.bind_transport(spawned, t1, true);

        for id in [root, inline, nested, spawned] {
            registry.set_state(id, SessionState::Running);
        }
        (registry, [root, inline, nested, spawned])
    }

    #[test]
    fn test_tree_navigation() {
        let (registry, [root, inline, nested, spawned]) = tree();

        assert_eq!(registry.children(root), vec![inline, spawned]);
        assert_eq!(registry.ancestors(nested), vec![inline, root]);
        assert!(registry.ancestors(root).is_empty());
        assert_eq!(registry.sessions_on(TransportId(0)), vec![root, inline, nested]);
    }

    #[test]
    fn test_closing_owner_cascades_to_inline_descendants_only() {
        // --- Setup ---
        let (registry, [root, inline, nested, spawned]) = tree();

        // --- Execute ---
        let changed = registry.close_cascade(root, SessionState::Closed);

        // --- Assert ---
        assert_eq!(changed, vec![root, inline, nested]);
        assert_eq!(registry.state(nested), Some(SessionState::Closed));
        assert_eq!(registry.state(spawned), Some(SessionState::Running));
        assert_eq!(registry.live_sessions(), vec![spawned]);
    }

    #[test]
    fn test_closing_inline_child_leaves_parent_running() {
        let (registry, [root, inline, nested, _]) = tree();

        let changed = registry.close_cascade(inline, SessionState::Closed);

        assert_eq!(changed, vec![inline, nested]);
        assert_eq!(registry.state(root), Some(SessionState::Running));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let (registry, [root, ..]) = tree();

        registry.close_cascade(root, SessionState::Failed);

        assert!(!registry.set_state(root, SessionState::Running));
        assert_eq!(registry.state(root), Some(SessionState::Failed));
        assert!(registry.close_cascade(root, SessionState::Closed).is_empty());
    }

    #[test]
    fn test_released_closed_sessions_are_pruned_and_slots_reused() {
        // --- Setup ---
        let registry = SessionRegistry::new();
        let stale = registry.register(None, ShellDialect::Sh);
        registry.close_cascade(stale, SessionState::Closed);
        registry.release(stale);

        // --- Execute ---
        for _ in 0..1000 {
            let id = registry.register(None, ShellDialect::Sh);
            registry.set_state(id, SessionState::Running);
            registry.release(id);
            registry.close_cascade(id, SessionState::Closed);
        }
        let fresh = registry.register(None, ShellDialect::Bash);

        // --- Assert ---
        assert_eq!(registry.capacity(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(fresh.slot(), stale.slot());
        assert_ne!(fresh, stale);
        assert_eq!(registry.state(stale), None);
        assert!(!registry.set_state(stale, SessionState::Running));
        assert_eq!(registry.state(fresh), Some(SessionState::NotStarted));
    }

    #[test]
    fn test_unreleased_child_keeps_closed_parent() {
        // --- Setup ---
        let (registry, [root, inline, nested, spawned]) = tree();

        // --- Execute ---
        registry.close_cascade(root, SessionState::Closed);
        for id in [root, inline, nested] {
            registry.release(id);
        }

        // --- Assert ---
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.state(root), Some(SessionState::Closed));
        assert_eq!(registry.state(inline), None);
        assert_eq!(registry.children(root), vec![spawned]);

        registry.close_cascade(spawned, SessionState::Closed);
        registry.release(spawned);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_running_sessions_are_never_pruned() {
        let (registry, [root, inline, nested, spawned]) = tree();

        for id in [root, inline, nested, spawned] {
            registry.release(id);
        }

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.live_sessions().len(), 4);
    }
}
