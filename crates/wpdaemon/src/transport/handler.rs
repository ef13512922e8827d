//! Per-connection read/dispatch/write loop.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use tracing::{debug, warn};

use wpd_protocol::Response;

use crate::dispatch::CommandDispatcher;

use super::TRANSPORT_TARGET;

/// Upper bound on one request line; the protocol carries short commands.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Handles accepted connections.
///
/// Implementations should avoid panicking: a connection thread that dies
/// takes no other state with it, but the peer sees an unexplained hangup.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serves one connection for its whole lifetime.
    fn handle(&self, stream: TcpStream);
}

/// One received request line, or the reason none could be framed.
enum Framing {
    /// A complete newline-terminated line.
    Line(Vec<u8>),
    /// The peer disconnected cleanly between requests.
    Disconnected,
    /// Data arrived but the peer disconnected before the newline, or the
    /// line exceeded the size bound.
    Malformed,
}

/// Connection handler that frames lines and forwards them to the dispatcher.
///
/// Each connection is served synchronously: read one line, dispatch, write
/// one response, repeat until the peer goes away. Responses to protocol
/// errors are produced here without touching the dispatcher.
pub struct DispatchConnectionHandler {
    dispatcher: Arc<CommandDispatcher>,
}

impl DispatchConnectionHandler {
    /// Builds a handler forwarding to the shared dispatcher.
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self { dispatcher }
    }

    fn serve(&self, mut stream: TcpStream) {
        // Bytes received past a request's newline belong to the next
        // request and carry over between loop iterations.
        let mut pending = Vec::new();
        loop {
            let line = match read_request_line(&mut stream, &mut pending) {
                Ok(Framing::Line(line)) => line,
                Ok(Framing::Disconnected) => {
                    debug!(target: TRANSPORT_TARGET, "client disconnected");
                    return;
                }
                Ok(Framing::Malformed) => {
                    // Unterminated request: answer the fixed parse error and
                    // drop the connection.
                    let _ = write_response(&mut stream, &Response::parse_error());
                    return;
                }
                Err(error) => {
                    warn!(target: TRANSPORT_TARGET, %error, "read failed");
                    return;
                }
            };

            let text = String::from_utf8_lossy(&line);
            if !text.contains(':') {
                // Protocol-level parse failure: answer and close without
                // involving the dispatcher.
                let _ = write_response(&mut stream, &Response::parse_error());
                return;
            }

            let response = self.dispatcher.execute(&text);
            if let Err(error) = write_response(&mut stream, &response) {
                warn!(target: TRANSPORT_TARGET, %error, "write failed");
                return;
            }
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: TcpStream) {
        self.serve(stream);
    }
}

fn write_response(stream: &mut TcpStream, response: &Response) -> io::Result<()> {
    stream.write_all(response.encode().as_bytes())?;
    stream.flush()
}

/// Reads one newline-terminated request line from the stream.
///
/// `pending` holds bytes received past a previous request's newline; a
/// complete line is split off the front before touching the socket again.
fn read_request_line(stream: &mut TcpStream, pending: &mut Vec<u8>) -> io::Result<Framing> {
    let mut chunk = [0_u8; 1024];

    loop {
        if let Some(newline_pos) = pending.iter().position(|byte| *byte == b'\n') {
            let rest = pending.split_off(newline_pos + 1);
            let line = std::mem::replace(pending, rest);
            return Ok(Framing::Line(line));
        }
        if pending.len() > MAX_REQUEST_BYTES {
            pending.clear();
            return Ok(Framing::Malformed);
        }

        let bytes_read = read_with_retry(stream, &mut chunk)?;
        if bytes_read == 0 {
            return Ok(if pending.is_empty() {
                Framing::Disconnected
            } else {
                pending.clear();
                Framing::Malformed
            });
        }
        pending.extend_from_slice(&chunk[..bytes_read]);
    }
}

fn read_with_retry(stream: &mut TcpStream, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}
