use std::fmt::{Display, Formatter};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use crate::action::ActionType;
use crate::card::CardType;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnState {
    Pending,
    Submitted,
    AwaitingTarget,
    Blocking,
    Called,
    CallFailed,
    BlockFailed,
    Blocked,
    Complete,
}

impl Display for TurnState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// A response window: the deadline after which the turn resolves itself,
/// and the task that will wake up to do it once one is attached.
#[derive(Debug)]
pub struct Window {
    deadline: Instant,
    task: Option<AbortHandle>,
}

impl Window {
    fn open(length: Duration) -> Self {
        Self { deadline: Instant::now() + length, task: None }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn armed(&self) -> bool {
        self.task.is_some()
    }

    fn cancel(self) {
        if let Some(task) = self.task {
            task.abort();
        }
    }
}

/// One seat's declared action on its way through block, call and resolution.
/// Players are referred to by seat index.
#[derive(Debug)]
pub struct Turn {
    number: usize,
    actor: usize,
    target: Option<usize>,
    action: Option<ActionType>,
    state: TurnState,
    blocker: Option<usize>,
    caller: Option<usize>,
    blocked_with: Option<CardType>,
    window: Option<Window>,
}

impl Turn {
    pub fn new(number: usize, actor: usize) -> Self {
        Self {
            number,
            actor,
            target: None,
            action: None,
            state: TurnState::Pending,
            blocker: None,
            caller: None,
            blocked_with: None,
            window: None,
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn actor(&self) -> usize {
        self.actor
    }

    pub fn target(&self) -> Option<usize> {
        self.target
    }

    pub fn action(&self) -> Option<ActionType> {
        self.action
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn blocker(&self) -> Option<usize> {
        self.blocker
    }

    pub fn caller(&self) -> Option<usize> {
        self.caller
    }

    pub fn blocked_with(&self) -> Option<CardType> {
        self.blocked_with
    }

    pub fn window(&self) -> Option<&Window> {
        self.window.as_ref()
    }

    pub(crate) fn submit(&mut self, action: ActionType, target: Option<usize>) {
        self.action = Some(action);
        self.target = target;
        self.state = TurnState::Submitted;
    }

    pub(crate) fn set_state(&mut self, state: TurnState) {
        self.state = state;
    }

    pub(crate) fn block(&mut self, blocker: usize, with: CardType) {
        self.blocker = Some(blocker);
        self.blocked_with = Some(with);
        self.state = TurnState::Blocking;
    }

    pub(crate) fn set_caller(&mut self, caller: usize) {
        self.caller = Some(caller);
    }

    pub(crate) fn open_window(&mut self, length: Duration) {
        self.close_window();
        self.window = Some(Window::open(length));
    }

    /// Closes the window and aborts its task, if any.
    pub(crate) fn close_window(&mut self) {
        if let Some(window) = self.window.take() {
            window.cancel();
        }
    }

    /// Attaches the expiry task; returns false (and aborts it) if there is no open window to attach to.
    pub(crate) fn arm(&mut self, task: AbortHandle) -> bool {
        match self.window.as_mut() {
            Some(window) if window.task.is_none() => {
                window.task = Some(task);
                true
            }
            _ => {
                task.abort();
                false
            }
        }
    }
}
