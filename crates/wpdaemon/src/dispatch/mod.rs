//! Command dispatch for the daemon's wire protocol.
//!
//! The dispatcher is the single authority over the supervised process slot:
//! only it may create or destroy the process handle, and only it may commit
//! lifecycle transitions. Every connection funnels into one
//! [`CommandDispatcher::execute`] entry point guarded by a single lock, so
//! commands from concurrent clients are totally ordered. Collaborator
//! failures never escape: each becomes a normal error response, with the
//! lifecycle state reverted to idle and any partially constructed handle
//! released before the response is returned.

mod dispatcher;

pub use dispatcher::CommandDispatcher;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
