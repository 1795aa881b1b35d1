//! Navigation stack of article orchestrators.
//!
//! Following a link builds a new orchestrator; the stack pushes and sets
//! it up. Earlier articles stay alive underneath for back navigation but
//! only the top one receives bridge messages: each message carries the
//! [`SurfaceId`] it was raised on, and messages from covered surfaces
//! are dropped.

use folio_types::error::{FolioError, Result};

use crate::address::ArticleReference;
use crate::orchestrator::{ArticleDeps, EventOutcome, Orchestrator};
use crate::surface::SurfaceId;

pub struct NavigationStack {
    deps: ArticleDeps,
    back_stack: Vec<Orchestrator>,
    current: Option<Orchestrator>,
}

impl NavigationStack {
    pub fn new(deps: ArticleDeps) -> Self {
        Self {
            deps,
            back_stack: Vec::new(),
            current: None,
        }
    }

    /// Open an article on top of the stack.
    ///
    /// Fails with `ConstructionPrecondition` when no orchestrator can be
    /// built for `address`; the stack is unchanged in that case.
    pub fn open(&mut self, address: &str) -> Result<()> {
        let next = Orchestrator::new(address, self.deps.clone()).ok_or_else(|| {
            FolioError::ConstructionPrecondition(format!("cannot open {address}"))
        })?;
        self.push(next)
    }

    /// Push an orchestrator and set it up.
    ///
    /// The orchestrator stays on the stack even when setup fails: its
    /// failure has already been shown to the user.
    pub fn push(&mut self, mut next: Orchestrator) -> Result<()> {
        let result = next.setup();
        if let Err(e) = &result {
            log::warn!("Setup of {} failed: {e}", next.reference());
        }
        if let Some(previous) = self.current.replace(next) {
            self.back_stack.push(previous);
        }
        result
    }

    /// Route a bridge message raised on surface `from` to the top
    /// article, following any link it activates.
    pub fn handle_message(&mut self, from: SurfaceId, raw: &str) -> Result<()> {
        let Some(current) = self.current.as_mut() else {
            log::warn!("Bridge message with no article open; dropping");
            return Ok(());
        };
        if current.surface_id() != from {
            log::debug!(
                "Message from {from} while {} is on top; dropping",
                current.surface_id()
            );
            return Ok(());
        }
        match current.handle_message(raw) {
            EventOutcome::Navigate(next) => self.push(*next),
            EventOutcome::Handled | EventOutcome::Ignored => Ok(()),
        }
    }

    /// Pop the top article, tearing it down. Returns `false` at the root.
    pub fn go_back(&mut self) -> bool {
        let Some(previous) = self.back_stack.pop() else {
            return false;
        };
        if let Some(mut top) = self.current.replace(previous) {
            top.teardown();
        }
        true
    }

    /// Poll every live article. Background completions for covered
    /// articles still land so they are complete when uncovered.
    pub fn poll(&mut self) {
        for orchestrator in self.back_stack.iter_mut().chain(self.current.as_mut()) {
            orchestrator.poll();
        }
    }

    pub fn tick(&mut self, dt_ms: u32) {
        if let Some(current) = self.current.as_mut() {
            current.tick(dt_ms);
        }
    }

    pub fn current(&self) -> Option<&Orchestrator> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut Orchestrator> {
        self.current.as_mut()
    }

    /// Number of open articles.
    pub fn depth(&self) -> usize {
        self.back_stack.len() + usize::from(self.current.is_some())
    }

    pub fn can_go_back(&self) -> bool {
        !self.back_stack.is_empty()
    }

    /// Open articles, most recent first.
    pub fn history(&self) -> Vec<&ArticleReference> {
        self.current
            .iter()
            .chain(self.back_stack.iter().rev())
            .map(Orchestrator::reference)
            .collect()
    }
}
