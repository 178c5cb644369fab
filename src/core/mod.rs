//! Core business logic module
//!
//! This module contains the rental booking and settlement components:
//! - `conflict` - Interval conflict resolution over granted rentals
//! - `ledger` - Wallet balances and postings
//! - `transaction_store` - Append-only transaction log
//! - `state_machine` - Rental transition table and requested side effects
//! - `settlement` - All-or-nothing settlement units
//! - `engine` - Settlement orchestrator
//! - `rental_store` - Rental records indexed by item
//! - `locks` - Per-item and per-wallet exclusive locks
//! - `scheduler` - Cancellable completion timers
//! - `traits` - Collaborator ports
//! - `collaborators` - In-memory collaborator implementations
//! - `replay` / `batch_processor` - Driving the engine from intent streams

pub mod batch_processor;
pub mod collaborators;
pub mod conflict;
pub mod engine;
pub mod ledger;
pub mod locks;
pub mod rental_store;
pub mod replay;
pub mod scheduler;
pub mod settlement;
pub mod state_machine;
pub mod traits;
pub mod transaction_store;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use collaborators::{Collaborators, InMemoryCatalog, InMemoryIdentity, NoopDispatcher};
pub use engine::{
    ApprovalOutcome, EngineConfig, SettlementEngine, DEFAULT_COMMISSION_RATE,
    DEFAULT_COMPLETION_DELAY,
};
pub use ledger::{Ledger, Reconciliation};
pub use replay::IntentProcessor;
pub use state_machine::{Decision, Effect, RentalEvent, Transition};
pub use traits::{Catalog, DeliveryDispatcher, Identity};
pub use transaction_store::TransactionStore;
