pub mod backup;
pub mod exclusion;
pub mod merge;
pub mod stager;
pub mod updater;
pub mod walk;

pub use crate::domain::model::{MergeResult, UpdateOutcome, UpdateRequest};
pub use crate::domain::ports::{ArchiveSource, BranchLister};
pub use crate::utils::error::Result;
