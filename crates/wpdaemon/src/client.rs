//! TCP client for talking to a running daemon.
//!
//! Connections are short-lived: one connect, one request line, one response
//! line. The interactive CLI and the daemonize helper both probe and drive
//! the daemon through this client.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use wpd_config::Endpoint;
use wpd_protocol::Response;

/// Timeout for establishing a command connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Shorter timeout used when probing for a live daemon.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Timeout for reading a response; spin_up blocks through its settle delay
/// and spin_down through the graceful window, so this stays generous.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced while talking to the daemon.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint did not resolve to a usable address.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        /// Configured endpoint.
        endpoint: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Connecting to the daemon failed.
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect {
        /// Configured endpoint.
        endpoint: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Sending the request or receiving the response failed.
    #[error("daemon connection failed: {source}")]
    Io {
        /// Underlying IO error.
        #[from]
        source: std::io::Error,
    },
    /// The daemon closed the connection without answering.
    #[error("no response from daemon")]
    EmptyResponse,
    /// The response line was not a well-formed response object.
    #[error("failed to decode daemon response: {source}")]
    Decode {
        /// Underlying deserialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Client for the daemon's line protocol.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    endpoint: Endpoint,
}

impl DaemonClient {
    /// Builds a client for the given endpoint.
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Endpoint this client targets.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Sends one command line and returns the decoded response.
    ///
    /// A trailing newline is appended when missing, so callers can pass
    /// `"state:"` and `"state:\n"` interchangeably.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the daemon is unreachable, the
    /// connection breaks mid-exchange, or the response fails to decode.
    pub fn send(&self, command: &str) -> Result<Response, ClientError> {
        let mut stream = self.connect(CONNECT_TIMEOUT)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut line = command.to_owned();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        stream.write_all(line.as_bytes())?;
        stream.flush()?;

        let mut response_line = String::new();
        let read = BufReader::new(stream).read_line(&mut response_line)?;
        if read == 0 {
            return Err(ClientError::EmptyResponse);
        }
        Ok(Response::decode(&response_line)?)
    }

    /// Whether a daemon is answering on the endpoint.
    ///
    /// Probes with `whoami`; anything short of a well-formed identity
    /// response counts as "not running".
    pub fn is_daemon_running(&self) -> bool {
        let Ok(mut stream) = self.connect(PROBE_TIMEOUT) else {
            return false;
        };
        if stream.set_read_timeout(Some(PROBE_TIMEOUT)).is_err() {
            return false;
        }
        if stream.write_all(b"whoami:\n").is_err() || stream.flush().is_err() {
            return false;
        }
        let mut response_line = String::new();
        if BufReader::new(stream).read_line(&mut response_line).is_err() {
            return false;
        }
        Response::decode(&response_line).is_ok_and(|response| {
            response
                .result
                .as_ref()
                .is_some_and(|result| result.get("version").is_some())
        })
    }

    fn connect(&self, timeout: Duration) -> Result<TcpStream, ClientError> {
        let address = resolve(self.endpoint.host(), self.endpoint.port()).map_err(|source| {
            ClientError::Resolve {
                endpoint: self.endpoint.to_string(),
                source,
            }
        })?;
        TcpStream::connect_timeout(&address, timeout).map_err(|source| ClientError::Connect {
            endpoint: self.endpoint.to_string(),
            source,
        })
    }
}

fn resolve(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no resolved addresses")
        })
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    fn fake_daemon(responses: &'static [&'static str]) -> (Endpoint, thread::JoinHandle<()>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut request = String::new();
                BufReader::new(stream.try_clone().expect("clone"))
                    .read_line(&mut request)
                    .expect("read request");
                stream.write_all(response.as_bytes()).expect("write");
            }
        });
        (Endpoint::new(addr.ip().to_string(), addr.port()), server)
    }

    #[test]
    fn send_round_trips_a_response() {
        let (endpoint, server) = fake_daemon(&[
            "{\"CMD\":\"state\",\"result\":{\"running\":false,\"config\":null,\"pid\":null,\"log_file\":null},\"error\":null}\n",
        ]);
        let client = DaemonClient::new(endpoint);
        let response = client.send("state:").expect("send command");
        assert_eq!(response.command, "state");
        server.join().expect("join server");
    }

    #[test]
    fn probe_accepts_identity_response() {
        let (endpoint, server) = fake_daemon(&[
            "{\"CMD\":\"whoami\",\"result\":{\"version\":\"0.3.0\",\"implementation\":\"Rust\"},\"error\":null}\n",
        ]);
        let client = DaemonClient::new(endpoint);
        assert!(client.is_daemon_running());
        server.join().expect("join server");
    }

    #[test]
    fn probe_rejects_closed_port() {
        // Bind then drop to obtain a port that refuses connections.
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let client = DaemonClient::new(Endpoint::new(addr.ip().to_string(), addr.port()));
        assert!(!client.is_daemon_running());
    }

    #[test]
    fn send_to_closed_port_reports_connect_error() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let client = DaemonClient::new(Endpoint::new(addr.ip().to_string(), addr.port()));
        assert!(matches!(
            client.send("state:"),
            Err(ClientError::Connect { .. })
        ));
    }
}
