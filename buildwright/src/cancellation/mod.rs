//! Cooperative cancellation and per-call deadlines.
//!
//! Every blocking external call (process wait, HTTP request) goes through
//! [`run_with_deadline`] so a hung collaborator cannot stall a run forever.

mod deadline;
mod token;

pub use deadline::{run_with_deadline, Interrupted};
pub use token::CancellationToken;
