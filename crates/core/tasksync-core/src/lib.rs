//! Core types shared by the tasksync client crates.
//!
//! This crate is I/O-free. It provides:
//! - the domain types exchanged with the remote service (`Task`, `User`,
//!   `ChatMessage`),
//! - the `Route`/`Navigator` seam used for headless route guarding,
//! - the `events::InvalidationChannel`, a process-wide no-payload broadcast
//!   that decouples "something changed the tasks" from "who changed them".

pub mod events;
mod route;
mod types;

pub use route::{InMemoryNavigator, Navigator, Route};
pub use types::{ChatMessage, Role, Task, User};
