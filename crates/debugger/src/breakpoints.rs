//! Breakpoint reconciliation.
//!
//! Creates are recorded optimistically as pending entries (id
//! [`PENDING_ID`]) keyed by name, and swapped for the backend's record once
//! it confirms. Clears and condition changes flag the confirmed entry as
//! pending until the backend answers.

use std::path::Path;

use crate::{
    actions::{Action, BreakpointAction},
    store::{Reducer, Store, StoreCore, SubscriptionId},
    types::{Breakpoint, BreakpointId, Location, PENDING_ID},
};

pub struct BreakpointStore {
    core: StoreCore<Vec<Breakpoint>>,
}

impl Default for BreakpointStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BreakpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakpointStore")
            .field("breakpoints", &self.core.get())
            .finish()
    }
}

impl BreakpointStore {
    pub fn new() -> Self {
        Self {
            core: StoreCore::new(Vec::new()),
        }
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.core.get()
    }

    /// Breakpoints in `file`, in insertion order.
    pub fn breakpoints_for_file(&self, file: impl AsRef<Path>) -> Vec<Breakpoint> {
        let file = file.as_ref();
        self.core.read(|bps| {
            bps.iter()
                .filter(|bp| bp.is_in_file(file))
                .cloned()
                .collect()
        })
    }

    pub fn breakpoint_by_id(&self, id: BreakpointId) -> Option<Breakpoint> {
        self.core
            .read(|bps| bps.iter().find(|bp| bp.id == id).cloned())
    }

    /// Name for a breakpoint created without one: the number of entries
    /// (confirmed and pending) at call time, advanced past any ordinal an
    /// entry already carries as its name.
    ///
    /// Not reserved: two unnamed creates issued before either request action
    /// is dispatched receive the same name.
    pub fn next_breakpoint_name(&self) -> usize {
        self.core.read(|bps| {
            let mut ordinal = bps.len();
            while bps.iter().any(|bp| bp.name == ordinal.to_string()) {
                ordinal += 1;
            }
            ordinal
        })
    }

    /// Whether an unconfirmed create with this name is outstanding.
    pub fn has_pending_create(&self, name: &str) -> bool {
        self.core
            .read(|bps| bps.iter().any(|bp| !bp.is_confirmed() && bp.name == name))
    }

    /// Ids a clear-all should touch: every confirmed entry with no request in flight.
    pub fn clearable_ids(&self) -> Vec<BreakpointId> {
        self.core.read(|bps| {
            bps.iter()
                .filter(|bp| bp.is_confirmed() && !bp.pending_change)
                .map(|bp| bp.id)
                .collect()
        })
    }
}

fn add_pending(
    mut bps: Vec<Breakpoint>,
    name: Option<&str>,
    location: Option<&Location>,
) -> Vec<Breakpoint> {
    // pattern creates: we cannot know how many breakpoints will appear, or where
    let (Some(name), Some(location)) = (name, location) else {
        return bps;
    };

    if bps.iter().any(|bp| !bp.is_confirmed() && bp.name == name) {
        tracing::warn!(%name, "a create with this name is already pending, ignoring");
        return bps;
    }

    bps.push(Breakpoint::pending(name, location.clone()));
    bps
}

fn add_created(mut bps: Vec<Breakpoint>, created: &[Breakpoint]) -> Vec<Breakpoint> {
    let confirmed: Vec<Breakpoint> = created
        .iter()
        .cloned()
        .map(|mut bp| {
            bp.pending_change = false;
            bp
        })
        .collect();

    if let [single] = confirmed.as_slice() {
        let slot = bps
            .iter()
            .position(|bp| bp.id == PENDING_ID && bp.name == single.name);
        if let Some(idx) = slot {
            bps[idx] = single.clone();
            return bps;
        }
    }

    bps.extend(confirmed);
    bps
}

fn remove_failed_create(
    mut bps: Vec<Breakpoint>,
    name: Option<&str>,
    expecting_multiple: bool,
) -> Vec<Breakpoint> {
    if expecting_multiple {
        return bps;
    }
    if let Some(name) = name {
        if let Some(idx) = bps
            .iter()
            .position(|bp| bp.id == PENDING_ID && bp.name == name)
        {
            bps.remove(idx);
        }
    }
    bps
}

fn mark_pending(mut bps: Vec<Breakpoint>, id: BreakpointId) -> Vec<Breakpoint> {
    match bps.iter_mut().find(|bp| bp.id == id && bp.is_confirmed()) {
        Some(bp) => bp.pending_change = true,
        None => tracing::warn!(%id, "request for unknown breakpoint"),
    }
    bps
}

fn settle(
    mut bps: Vec<Breakpoint>,
    id: BreakpointId,
    condition: Option<&str>,
) -> Vec<Breakpoint> {
    if let Some(bp) = bps.iter_mut().find(|bp| bp.id == id && bp.is_confirmed()) {
        bp.pending_change = false;
        if let Some(condition) = condition {
            bp.condition = Some(condition.to_string());
        }
    }
    bps
}

fn remove(mut bps: Vec<Breakpoint>, id: BreakpointId) -> Vec<Breakpoint> {
    bps.retain(|bp| !(bp.id == id && bp.is_confirmed()));
    bps
}

impl Store for BreakpointStore {
    type State = Vec<Breakpoint>;

    fn reduce(&self, state: Self::State, action: &Action) -> Self::State {
        let Action::Breakpoint(action) = action else {
            return state;
        };

        match action {
            BreakpointAction::CreateRequest { name, location } => {
                add_pending(state, name.as_deref(), location.as_ref())
            }
            BreakpointAction::CreateSuccess { created } => add_created(state, created),
            BreakpointAction::CreateFailure {
                name,
                expecting_multiple,
                error,
            } => {
                tracing::debug!(?name, %error, "breakpoint create failed");
                remove_failed_create(state, name.as_deref(), *expecting_multiple)
            }

            BreakpointAction::SetConditionRequest { id } | BreakpointAction::ClearRequest { id } => {
                mark_pending(state, *id)
            }
            BreakpointAction::SetConditionSuccess { id, condition } => {
                settle(state, *id, Some(condition))
            }
            BreakpointAction::SetConditionFailure { id, error } => {
                tracing::debug!(%id, %error, "setting breakpoint condition failed");
                settle(state, *id, None)
            }

            BreakpointAction::ClearSuccess { id } => remove(state, *id),
            BreakpointAction::ClearFailure { id, error } => {
                tracing::debug!(%id, %error, "error clearing breakpoint, assuming destroyed");
                remove(state, *id)
            }

            BreakpointAction::ClearAllRequest => state,
            BreakpointAction::ClearAllSuccess => {
                state.into_iter().filter(|bp| bp.pending_change).collect()
            }
            BreakpointAction::ClearAllFailure { error } => {
                tracing::debug!(%error, "clearing all breakpoints failed");
                state
            }
        }
    }

    fn state(&self) -> Self::State {
        self.core.get()
    }

    fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.core.subscribe(std::sync::Arc::new(listener))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.unsubscribe(id)
    }
}

impl Reducer for BreakpointStore {
    fn on_dispatch(&self, action: &Action) {
        self.core.apply(|state| self.reduce(state, action));
    }

    fn reset(&self) {
        self.core.reset(Vec::new());
    }
}
