pub mod bootstrap;
pub mod cycle;
pub mod notifier;
pub mod selection;
pub mod trigger;

pub use bootstrap::{init, init_with, run_once, RunOptions};
pub use cycle::{CheckStatus, CycleReport, CycleRunner, CycleStage, StageFailure, CHECK_COMPLETE};
pub use notifier::{render_batch, render_single, LogChannel, Notifier};
pub use selection::{select, Selection};
pub use trigger::{router, TriggerServer};
