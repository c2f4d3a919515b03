//! qp-lc library - Question Lifecycle Engine
//!
//! The only component allowed to insert or transition rows of the working
//! question store. Rows move through
//!
//! ```text
//! (absent) --generate--> pending
//! pending  --review(approve)--> approved            terminal
//! pending  --review(reject + notes)--> rejected
//! rejected --repair--> new pending row (lineage → rejected row)
//! ```
//!
//! Every operation runs as one transaction per invocation. The write paths
//! live in the private `store` module and are reachable only through
//! [`LifecycleEngine`].

pub mod engine;
pub mod error;
pub mod input;
pub mod report;
mod store;

pub use engine::{LifecycleEngine, RunOptions, Scope};
pub use error::{LifecycleError, Result};
pub use input::{
    BatchItem, Candidate, CorrectAnswer, QuestionPayload, RepairSubmission, ReviewDecision,
};
pub use report::{BatchReport, ItemOutcome, ItemReport, Stage};
pub use store::{fetch_question, lineage_depth, repair_attempts_used, ListFilter};
