//! Session status for the face command agent.
//!
//! Counters and the last operator-facing status line, shared between the
//! pipeline and the CLI and persisted so `face-command status` can read them
//! from another process.

pub mod log;

pub use log::{
    create_shared_status, create_shared_status_with_persistence, SessionStatus,
    SharedSessionStatus, StatusSnapshot,
};
