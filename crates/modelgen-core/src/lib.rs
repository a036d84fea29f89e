//! modelgen Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Worker runtimes (docker)
//! - Async runtime specifics
//!
//! It owns the task handle codec, worker naming, task statuses and the
//! nested label model shared by the creation, status and listing flows.

pub mod error;
pub mod ids;
pub mod labels;
pub mod model;
pub mod status;
pub mod task;
pub mod worker;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::{validate_name, worker_name, TaskHandle, TaskKey};
pub use labels::{decode_labels, extract, LabelConflict, LabelTree, CONFLICT_KEY};
pub use model::{GeneratorInfo, ModelInfo};
pub use status::{TaskStatus, WorkerState};
pub use task::{StatusOutcome, TaskInfo};
pub use worker::{progress_info, sanitize_output, WorkerRecord};
