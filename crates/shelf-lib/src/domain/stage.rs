use log::{info, warn};
use std::fmt;
use thiserror::Error;

/// One ordered unit of the publish pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishStage {
    Images,
    Audio,
    Document,
    Manifest,
}

impl PublishStage {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [Self::Images, Self::Audio, Self::Document, Self::Manifest];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Images => "Images",
            Self::Audio => "Audio",
            Self::Document => "Document",
            Self::Manifest => "Manifest",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Images => 0,
            Self::Audio => 1,
            Self::Document => 2,
            Self::Manifest => 3,
        }
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StageState {
    #[default]
    Pending,
    Active,
    Completed,
    Failed,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A stage transition the board refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot mark {stage} stage {requested} while it is {current}")]
pub struct StageOrderError {
    pub stage: PublishStage,
    pub current: StageState,
    pub requested: StageState,
}

/// State of every stage of one publish run.
///
/// Transitions are strictly sequential: a stage becomes active only once every
/// earlier stage has completed, and a failed stage blocks everything after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageBoard {
    states: [StageState; 4],
}

impl StageBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self, stage: PublishStage) -> StageState {
        self.states
            .get(stage.index())
            .copied()
            .unwrap_or_default()
    }

    /// Move `stage` from pending to active.
    ///
    /// # Errors
    ///
    /// Returns [`StageOrderError`] if `stage` is not pending or an earlier
    /// stage has not completed.
    pub fn activate(&mut self, stage: PublishStage) -> Result<(), StageOrderError> {
        let current = self.state(stage);
        let earlier_done = PublishStage::ALL
            .iter()
            .take_while(|s| **s != stage)
            .all(|s| self.state(*s) == StageState::Completed);

        if current != StageState::Pending || !earlier_done {
            return Err(StageOrderError {
                stage,
                current,
                requested: StageState::Active,
            });
        }
        self.set(stage, StageState::Active);
        Ok(())
    }

    /// Move `stage` from active to completed.
    ///
    /// # Errors
    ///
    /// Returns [`StageOrderError`] if `stage` is not active.
    pub fn complete(&mut self, stage: PublishStage) -> Result<(), StageOrderError> {
        let current = self.state(stage);
        if current != StageState::Active {
            return Err(StageOrderError {
                stage,
                current,
                requested: StageState::Completed,
            });
        }
        self.set(stage, StageState::Completed);
        Ok(())
    }

    /// Mark an active `stage` failed. Returns whether the board changed.
    pub fn fail(&mut self, stage: PublishStage) -> bool {
        if self.state(stage) != StageState::Active {
            return false;
        }
        self.set(stage, StageState::Failed);
        true
    }

    /// The stage that failed, if any.
    #[must_use]
    pub fn failed_stage(&self) -> Option<PublishStage> {
        PublishStage::ALL
            .into_iter()
            .find(|s| self.state(*s) == StageState::Failed)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.states.iter().all(|s| *s == StageState::Completed)
    }

    fn set(&mut self, stage: PublishStage, state: StageState) {
        if let Some(slot) = self.states.get_mut(stage.index()) {
            *slot = state;
        }
    }
}

/// Receives progress of a publish run. Rendering is up to the implementor.
pub trait ProgressSink {
    /// Called on every stage transition.
    fn stage_changed(&mut self, stage: PublishStage, state: StageState);

    /// Called after each file lands on the remote store.
    fn file_uploaded(&mut self, _stage: PublishStage, _path: &str) {}
}

/// Progress sink that reports through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn stage_changed(&mut self, stage: PublishStage, state: StageState) {
        match state {
            StageState::Failed => warn!("{stage}: {state}"),
            StageState::Pending | StageState::Active | StageState::Completed => {
                info!("{stage}: {state}");
            }
        }
    }

    fn file_uploaded(&mut self, stage: PublishStage, path: &str) {
        info!("{stage}: uploaded {path}");
    }
}
