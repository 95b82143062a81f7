use failure::Fallible;

use stackdep::model::Trainer;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompletedUnit {
    /// A batch is completed.
    Batch,

    /// An epoch is completed.
    Epoch,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SaveSchedule {
    /// Never save intermediate parameters.
    Never,

    /// Save after every N batches.
    Batches(usize),

    /// Save after every epoch.
    Epoch,

    /// Save every epoch and after every N batches.
    EpochAndBatches(usize),
}

impl SaveSchedule {
    /// Create a scheduler from the schedule.
    pub fn to_save_scheduler(self, prefix: impl Into<String>) -> SaveScheduler {
        SaveScheduler {
            prefix: prefix.into(),
            batch: 0,
            epoch: 0,
            epoch_batch: 0,
            schedule: self,
        }
    }
}

/// Scheduler that saves at points dictated by the schedule.
pub struct SaveScheduler {
    prefix: String,
    epoch_batch: usize,
    epoch: usize,
    batch: usize,
    schedule: SaveSchedule,
}

impl SaveScheduler {
    /// Current batch.
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Current epoch.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// The file name that parameters are saved to for `completed`.
    fn filename(&self, completed: CompletedUnit) -> Option<String> {
        match (completed, self.schedule) {
            (CompletedUnit::Epoch, SaveSchedule::Epoch)
            | (CompletedUnit::Epoch, SaveSchedule::EpochAndBatches(_)) => {
                Some(format!("{}epoch-{}", self.prefix, self.epoch))
            }
            (CompletedUnit::Batch, SaveSchedule::Batches(batches))
            | (CompletedUnit::Batch, SaveSchedule::EpochAndBatches(batches))
                if (self.batch + 1) % batches == 0 =>
            {
                Some(format!(
                    "{}epoch-{}-batch-{}",
                    self.prefix, self.epoch, self.epoch_batch
                ))
            }
            _ => None,
        }
    }

    /// Save the network parameters when a save point has been reached.
    pub fn save(&mut self, trainer: &Trainer, completed: CompletedUnit) -> Fallible<()> {
        if let Some(filename) = self.filename(completed) {
            trainer.save(filename)?;
        }

        match completed {
            CompletedUnit::Epoch => {
                self.epoch += 1;
                self.epoch_batch = 0;
            }
            CompletedUnit::Batch => {
                self.batch += 1;
                self.epoch_batch += 1;
            }
        }

        Ok(())
    }
}
