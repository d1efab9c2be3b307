//! Group matching and consensus engine.
//!
//! Scores group profiles, ranks candidates, records swipes, runs the
//! invitation lifecycle under either governance mode, and creates or tears
//! down matches while keeping every group in at most one live match.
//! Persistence, membership, authorization and venue suggestions are
//! collaborators behind traits; [`memory::MemoryStore`] is the bundled
//! in-process backend.

pub mod authz;
pub mod cache;
pub mod candidates;
pub mod config;
pub mod engine;
pub mod error;
pub mod governance;
pub mod invitations;
pub mod matcher;
pub mod memory;
pub mod retry;
pub mod scoring;
pub mod store;
pub mod swipes;
pub mod venue;

pub use config::{EngineConfig, EpochPolicy};
pub use engine::{Engine, LeaveOutcome, NewGroup};
pub use error::{Conflict, EngineError, EngineResult};
pub use store::{Direction, MatchStore, Membership, StoreError, StoreResult};
