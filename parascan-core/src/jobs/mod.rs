//! Job tracking and scan coordination

pub mod coordinator;
pub mod models;
pub mod registry;

pub use coordinator::{ScanCoordinator, ScanReceipt, ScanRequest};
pub use models::{Job, JobStatus, ModelDescriptor, ToolRun, ToolStatus};
pub use registry::JobRegistry;
