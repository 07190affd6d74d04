use std::fmt;
use std::mem;
use std::sync::{Mutex, Weak};

use super::deferred::{Deferred, Outcome, ResponseFuture};
use crate::utils::lock;

/// The lifecycle state of a request.
///
/// ```text
/// New ──load──> Loading ──response──> Loaded
///  │               ├──abort/timeout──> Aborted
///  └──abort────────┼──────────────────> Aborted
///                  └──transport error──> Failed
/// ```
///
/// `Loaded`, `Aborted` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    New,
    Loading,
    Loaded,
    Aborted,
    /// The transport failed before the server answered.
    Failed,
}

impl RequestState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Loaded | RequestState::Aborted | RequestState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestState::New => "new",
            RequestState::Loading => "loading",
            RequestState::Loaded => "loaded",
            RequestState::Aborted => "aborted",
            RequestState::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request sharing a lifecycle.
pub(crate) trait Member: Send + Sync {
    /// Cancels the exchange this member sent, if any.
    fn abort_transport(&self);

    /// Releases the UI handles and the transport handle.
    fn evict(&self);
}

pub(crate) type MemberRef = Weak<dyn Member>;

struct Phase {
    state: RequestState,
    members: Vec<MemberRef>,
}

/// State and eventual result of a request, shared by requests that follow it.
///
/// Every request sharing the lifecycle joins it as a [`Member`]. The members are handed
/// out once, to whoever makes the terminal transition.
pub(crate) struct Lifecycle {
    phase: Mutex<Phase>,
    deferred: Deferred,
    preload: bool,
}

impl Lifecycle {
    pub(crate) fn new(preload: bool) -> Self {
        Self {
            phase: Mutex::new(Phase { state: RequestState::New, members: Vec::new() }),
            deferred: Deferred::new(),
            preload,
        }
    }

    pub(crate) fn state(&self) -> RequestState {
        lock(&self.phase).state
    }

    /// Adds `member` unless the lifecycle already settled. Returns whether it was added.
    pub(crate) fn join(&self, member: MemberRef) -> bool {
        let mut phase = lock(&self.phase);
        if phase.state.is_terminal() {
            return false;
        }
        phase.members.push(member);
        true
    }

    /// Takes the members to release. Empty unless the lifecycle is terminal, and empty
    /// on every later call.
    pub(crate) fn take_members(&self) -> Vec<MemberRef> {
        let mut phase = lock(&self.phase);
        if !phase.state.is_terminal() {
            return Vec::new();
        }
        mem::take(&mut phase.members)
    }

    pub(crate) fn preload(&self) -> bool {
        self.preload
    }

    /// Moves to `to` if the current state is one of `from`, and reports whether it moved.
    pub(crate) fn transition(&self, from: &[RequestState], to: RequestState) -> bool {
        let mut phase = lock(&self.phase);
        if !from.contains(&phase.state) {
            return false;
        }
        phase.state = to;
        true
    }

    pub(crate) fn settle(&self, outcome: Outcome) -> bool {
        self.deferred.settle(outcome)
    }

    pub(crate) fn future(&self) -> ResponseFuture {
        self.deferred.future()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state())
            .field("settled", &self.deferred.is_settled())
            .field("members", &lock(&self.phase).members.len())
            .field("preload", &self.preload)
            .finish()
    }
}
