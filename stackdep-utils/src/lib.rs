mod progress;
pub use crate::progress::{item_progress, ReadProgress};

mod save;
pub use crate::save::{CompletedUnit, SaveSchedule, SaveScheduler};

mod util;
pub use crate::util::read_config;
