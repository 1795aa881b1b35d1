//! View state machine.
//!
//! `Unknown -> Loading -> Data`, with `Unknown` reachable from anywhere at
//! teardown. Side effects run on entry only: entering `Loading` starts the
//! progress indicator, entering `Unknown` or `Data` stops it.

use std::fmt;

use folio_types::error::{FolioError, Result};

/// Load state of one article view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Initial and torn-down state.
    Unknown,
    /// Document requested; progress indicator running.
    Loading,
    /// Document ready; content interactive.
    Data,
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewState::Unknown => "unknown",
            ViewState::Loading => "loading",
            ViewState::Data => "data",
        };
        f.write_str(name)
    }
}

/// A progress affordance (e.g. a bar under the navigation bar).
pub trait ProgressIndicator {
    fn start(&mut self);
    fn stop(&mut self);
}

/// Tracks [`ViewState`] and drives the progress indicator.
pub struct ViewStateMachine {
    state: ViewState,
    indicator: Box<dyn ProgressIndicator>,
    history: Vec<ViewState>,
}

impl ViewStateMachine {
    pub fn new(indicator: Box<dyn ProgressIndicator>) -> Self {
        Self {
            state: ViewState::Unknown,
            indicator,
            history: vec![ViewState::Unknown],
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Every state entered so far, starting with the initial `Unknown`.
    pub fn history(&self) -> &[ViewState] {
        &self.history
    }

    /// Whether `from -> to` is a legal transition.
    pub fn can_transition(from: ViewState, to: ViewState) -> bool {
        matches!(
            (from, to),
            (ViewState::Unknown, ViewState::Loading)
                | (ViewState::Loading, ViewState::Data)
                | (_, ViewState::Unknown)
        )
    }

    /// Enter `next`, running its entry side effect.
    ///
    /// Re-entering `Unknown` is a no-op; every other illegal transition is
    /// rejected and leaves the state untouched.
    pub fn enter(&mut self, next: ViewState) -> Result<()> {
        if self.state == ViewState::Unknown && next == ViewState::Unknown {
            return Ok(());
        }
        if !Self::can_transition(self.state, next) {
            return Err(FolioError::State(format!(
                "illegal transition {} -> {next}",
                self.state
            )));
        }
        log::debug!("View state {} -> {next}", self.state);
        self.state = next;
        self.history.push(next);
        match next {
            ViewState::Loading => self.indicator.start(),
            ViewState::Unknown | ViewState::Data => self.indicator.stop(),
        }
        Ok(())
    }
}
