use std::mem;

use tracing::{info, warn};

use crate::display::preview_text;
use crate::error::ImportError;
use crate::parser::RawPayload;
use crate::schedule::{import_text, Reconciliation, ScheduleMap};
use crate::store::ScheduleStore;

/// Paints the schedule grid; called after every successful save or clear
pub trait Renderer {
    fn render(&mut self, schedule: &ScheduleMap);
}

/// Answer to an import preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Commit,
    Cancel,
}

/// Gates the second phase of an import
pub trait UserConfirmation {
    fn present(&mut self, preview: &str, commit_allowed: bool) -> Decision;
}

/// Where an import session stands
#[derive(Debug, Default)]
pub enum ImportState {
    #[default]
    Idle,
    /// A reconciled payload waits for confirmation; the store is untouched
    Previewing(Reconciliation),
    Committed { placed: usize, ignored: usize },
    Cancelled,
}

/// Two-phase import: preview a payload without touching the store, then
/// commit or cancel it. Only one preview can be pending at a time.
#[derive(Debug)]
pub struct ImportSession {
    state: ImportState,
    slot_count: u32,
}

impl ImportSession {
    pub fn new(slot_count: u32) -> Self {
        ImportSession {
            state: ImportState::Idle,
            slot_count,
        }
    }

    pub fn state(&self) -> &ImportState {
        &self.state
    }

    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    /// The reconciliation waiting for confirmation, if any
    pub fn pending(&self) -> Option<&Reconciliation> {
        match &self.state {
            ImportState::Previewing(reconciliation) => Some(reconciliation),
            _ => None,
        }
    }

    /// Reconciles a payload and holds the result for confirmation.
    /// On error the session keeps its previous state.
    pub fn preview(&mut self, payload: &RawPayload) -> Result<&Reconciliation, ImportError> {
        if self.pending().is_some() {
            return Err(ImportError::ImportPending);
        }

        let reconciliation = import_text(&payload.text, self.slot_count).map_err(|e| {
            warn!("Import from {:?} payload failed: {}", payload.origin, e);
            e
        })?;
        info!(
            "Previewing {:?} import: {} placements, {} ignored",
            payload.origin, reconciliation.placed, reconciliation.ignored
        );

        self.state = ImportState::Previewing(reconciliation);
        self.pending().ok_or(ImportError::NothingToCommit)
    }

    /// Saves the pending schedule as a whole and returns it.
    /// If the save fails the preview stays pending.
    pub fn commit(&mut self, store: &dyn ScheduleStore) -> Result<ScheduleMap, ImportError> {
        let reconciliation = match mem::take(&mut self.state) {
            ImportState::Previewing(reconciliation) => reconciliation,
            other => {
                self.state = other;
                return Err(ImportError::NothingToCommit);
            }
        };

        if !reconciliation.commit_allowed() {
            self.state = ImportState::Previewing(reconciliation);
            return Err(ImportError::CommitNotAllowed);
        }

        if let Err(e) = store.save(&reconciliation.schedule) {
            self.state = ImportState::Previewing(reconciliation);
            return Err(e.into());
        }

        self.state = ImportState::Committed {
            placed: reconciliation.placed,
            ignored: reconciliation.ignored,
        };
        Ok(reconciliation.schedule)
    }

    /// Drops the pending preview; the stored schedule stays as it was
    pub fn cancel(&mut self) -> Result<(), ImportError> {
        if self.pending().is_none() {
            return Err(ImportError::NothingToCommit);
        }
        self.state = ImportState::Cancelled;
        info!("Import cancelled");
        Ok(())
    }
}

/// How an interactive import ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Committed { placed: usize, ignored: usize },
    Cancelled,
}

/// Preview, confirm, save, render
pub fn run_import(
    session: &mut ImportSession,
    payload: &RawPayload,
    store: &dyn ScheduleStore,
    confirmation: &mut dyn UserConfirmation,
    renderer: &mut dyn Renderer,
) -> Result<ImportOutcome, ImportError> {
    let slot_count = session.slot_count();
    let reconciliation = session.preview(payload)?;
    let preview = preview_text(reconciliation, slot_count);
    let allowed = reconciliation.commit_allowed();
    let (placed, ignored) = (reconciliation.placed, reconciliation.ignored);

    match confirmation.present(&preview, allowed) {
        Decision::Commit if allowed => {
            let schedule = session.commit(store)?;
            renderer.render(&schedule);
            Ok(ImportOutcome::Committed { placed, ignored })
        }
        _ => {
            session.cancel()?;
            Ok(ImportOutcome::Cancelled)
        }
    }
}

/// Clears the stored schedule and repaints the empty grid
pub fn run_clear(store: &dyn ScheduleStore, renderer: &mut dyn Renderer) -> Result<(), ImportError> {
    store.clear()?;
    renderer.render(&ScheduleMap::new());
    Ok(())
}
