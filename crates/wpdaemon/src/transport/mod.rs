//! TCP transport for the daemon's command protocol.
//!
//! The listener binds the configured loopback endpoint and accepts
//! connections in a background thread; each accepted connection gets its
//! own detached thread running a read/dispatch/write loop for the
//! connection's lifetime. All connections funnel into the shared
//! dispatcher, which is the sole serialization point — the transport holds
//! no cross-connection state.

mod errors;
mod handler;
mod listener;

pub use errors::ListenerError;
pub use handler::{ConnectionHandler, DispatchConnectionHandler};
pub use listener::{ListenerHandle, SocketListener};

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
