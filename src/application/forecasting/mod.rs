pub mod cancellation;
pub mod orchestrator;
pub mod returns;
pub mod walk_forward;
