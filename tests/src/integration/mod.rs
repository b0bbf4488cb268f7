//! Cross-subsystem choreography tests.

pub mod anchor_flow;
pub mod inbox_flow;
pub mod monitor_flow;
pub mod redelivery_flow;
pub mod sync_resume;
