pub mod clinic;
pub mod slot;
pub mod task;

pub use clinic::{BackendKind, Clinic, StaffCategory, StaffRuleset};
pub use slot::{ClinicResult, RunArtifact, SlotObservation, StaffAnalysis};
pub use task::{Task, TaskProgress, TaskStatus};
