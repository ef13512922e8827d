//! Listener implementation for the daemon's TCP endpoint.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use wpd_config::Endpoint;

use super::TRANSPORT_TARGET;
use super::errors::ListenerError;
use super::handler::ConnectionHandler;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to the daemon's TCP endpoint.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: Endpoint,
    listener: TcpListener,
}

impl SocketListener {
    /// Binds the endpoint without accepting yet.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the address cannot be resolved or the
    /// socket cannot be bound; binding failure is the one startup error the
    /// daemon treats as fatal.
    pub fn bind(endpoint: &Endpoint) -> Result<Self, ListenerError> {
        let listener = bind_tcp(endpoint.host(), endpoint.port())?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    /// Local address the listener actually bound, for ephemeral ports.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Starts the accept loop in a background thread.
    ///
    /// Each accepted connection is handed to `handler` on its own detached
    /// thread; connection threads are not tracked and end when their peer
    /// disconnects.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonBlocking`] when the listener cannot be
    /// switched to non-blocking mode for cooperative shutdown.
    pub fn start(self, handler: Arc<dyn ConnectionHandler>) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || run_accept_loop(&self, &shutdown_flag, handler));
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept-loop thread.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Requests the accept loop to exit after its current iteration.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Joins the accept-loop thread.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the loop panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &AtomicBool,
    handler: Arc<dyn ConnectionHandler>,
) {
    info!(
        target: TRANSPORT_TARGET,
        endpoint = %listener.endpoint,
        "listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match listener.listener.accept() {
            Ok((stream, peer)) => {
                last_error = None;
                if let Err(error) = stream.set_nonblocking(false) {
                    warn!(target: TRANSPORT_TARGET, %error, "failed to reset connection mode");
                    continue;
                }
                info!(target: TRANSPORT_TARGET, %peer, "client connected");
                let handler = Arc::clone(&handler);
                thread::spawn(move || handler.handle(stream));
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(target: TRANSPORT_TARGET, %error, "accept error");
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(target: TRANSPORT_TARGET, "listener stopped");
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::Bind { addr, source })
}

#[cfg(test)]
mod tests {
    use std::net::TcpStream;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use super::*;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ConnectionHandler for CountingHandler {
        fn handle(&self, _stream: TcpStream) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_for_count(count: &AtomicUsize, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if count.load(Ordering::SeqCst) >= expected {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn accepts_concurrent_connections() {
        let listener =
            SocketListener::bind(&Endpoint::loopback(0)).expect("bind listener");
        let addr = listener.local_addr().expect("local address");
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(CountingHandler {
            count: Arc::clone(&count),
        });
        let handle = listener.start(handler).expect("start listener");

        TcpStream::connect(addr).expect("connect first client");
        TcpStream::connect(addr).expect("connect second client");

        assert!(wait_for_count(&count, 2), "expected two connections");
        handle.shutdown();
        handle.join().expect("join listener");
    }

    #[test]
    fn bind_conflict_is_reported() {
        let first = SocketListener::bind(&Endpoint::loopback(0)).expect("bind first");
        let addr = first.local_addr().expect("local address");
        let taken = Endpoint::new(addr.ip().to_string(), addr.port());
        let error = SocketListener::bind(&taken).expect_err("second bind should fail");
        assert!(matches!(error, ListenerError::Bind { .. }));
    }

    #[test]
    fn shutdown_stops_the_accept_loop() {
        let listener =
            SocketListener::bind(&Endpoint::loopback(0)).expect("bind listener");
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(CountingHandler {
            count: Arc::clone(&count),
        });
        let handle = listener.start(handler).expect("start listener");
        handle.shutdown();
        handle.join().expect("join listener");
    }
}
