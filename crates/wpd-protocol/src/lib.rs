//! Wire protocol for the WireProxy supervision daemon.
//!
//! Requests are single lines of the form `name:arg1,arg2,...\n`; the colon
//! is mandatory even for commands that take no arguments (`spin_down:`).
//! Responses are one JSON object per line with a fixed three-field
//! envelope: the echoed command name, a result payload, and an error
//! message — at most one of result and error is populated.
//!
//! The daemon serializes responses and the client deserializes them, so the
//! types here derive both halves and are shared by both binaries' code
//! paths.

mod payload;
mod request;
mod response;

pub use payload::{ConfigListing, Identity, SessionStarted, SessionStopped, StateSnapshot};
pub use request::{Request, RequestParseError};
pub use response::Response;
