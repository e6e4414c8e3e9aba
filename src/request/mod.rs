//! Expiring reply requests.
//!
//! [`TimedSet`] is the general bounded, self-expiring collection;
//! [`RequestQueue`] builds the "type /accept within 30 seconds" flow on it.

pub mod queue;
pub mod timed;

pub use queue::{Request, RequestQueue, ResponseHandler, ResponseType};
pub use timed::{EndReason, TimedSet};
