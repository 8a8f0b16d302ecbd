//! Autoforge state layer.
//!
//! Defines the persistence seam between the patch execution engine and
//! whatever store the surrounding system uses: record types, the
//! `AgentStore` trait, and in-memory fakes for testing. No concrete
//! database backend lives here; durable persistence is owned by the
//! embedding application.

pub mod error;
pub mod fakes;
pub mod records;
pub mod store_traits;

pub use error::{StateError, StateResult};
pub use fakes::MemoryAgentStore;
pub use records::{
    AgentState, ContentDigest, IterationOutcome, LeaseToken, TaskRecord, TaskStatus,
};
pub use store_traits::AgentStore;
