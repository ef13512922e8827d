//! Background watcher tailing the supervised process output.
//!
//! WireProxy reports transient network loss on its stderr rather than by
//! exiting, so a dedicated thread tails the session log from the point
//! spawning began and counts consecutive transient-failure lines. At the
//! threshold it flags the drop and signals the process group, then stops.
//! It never touches lifecycle state or the process handle itself; the
//! dispatcher observes the resulting death on its next liveness check and
//! does all bookkeeping there.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use super::SUPERVISOR_TARGET;

/// Sleep between polls when no new output is available.
const TAIL_POLL: Duration = Duration::from_millis(200);

/// Consecutive transient-failure lines before auto-termination.
const FAILURE_THRESHOLD: u32 = 5;

/// Output lines treated as transient network failures.
const FAILURE_PATTERNS: [&str; 2] = ["network is unreachable", "can't assign requested address"];

/// What a tailed output line means for the failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    /// Matches a transient network failure pattern.
    TransientFailure,
    /// An error line that is not a recognized transient failure.
    GenericError,
    /// Ordinary output.
    Benign,
}

fn classify(line: &str) -> LineKind {
    let lowered = line.to_ascii_lowercase();
    if FAILURE_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
    {
        LineKind::TransientFailure
    } else if lowered.contains("error") {
        LineKind::GenericError
    } else {
        LineKind::Benign
    }
}

/// Counter over consecutive transient failures.
///
/// Failure lines increment; benign lines reset; generic error lines leave
/// the count unchanged so interleaved unrelated errors cannot mask a
/// genuine drop.
#[derive(Debug, Default)]
struct FailureCounter {
    consecutive: u32,
}

impl FailureCounter {
    /// Feeds one line; returns `true` when the threshold is reached.
    fn observe(&mut self, line: &str) -> bool {
        match classify(line) {
            LineKind::TransientFailure => {
                self.consecutive += 1;
                self.consecutive >= FAILURE_THRESHOLD
            }
            LineKind::GenericError => false,
            LineKind::Benign => {
                self.consecutive = 0;
                false
            }
        }
    }
}

/// Handle on the running watcher thread.
///
/// Stopping is cooperative: the thread checks the stop flag each poll
/// iteration and [`WatcherHandle::stop`] joins it, guaranteeing no watcher
/// access outlives the process handle that owns it.
#[derive(Debug)]
pub(super) struct WatcherHandle {
    stop: Arc<AtomicBool>,
    network_drop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// Starts a watcher tailing `log_path` from `offset`.
    pub(super) fn spawn(log_path: PathBuf, offset: u64, group: Pid) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let network_drop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread_drop = Arc::clone(&network_drop);
        let thread = thread::spawn(move || {
            tail_for_failures(&log_path, offset, group, &thread_stop, &thread_drop);
        });
        Self {
            stop,
            network_drop,
            thread: Some(thread),
        }
    }

    /// Whether the failure threshold was reached.
    pub(super) fn network_drop_detected(&self) -> bool {
        self.network_drop.load(Ordering::SeqCst)
    }

    /// Shared flag the owning process handle keeps after the watcher stops.
    pub(super) fn network_drop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.network_drop)
    }

    /// Requests the watcher to stop and joins the thread.
    pub(super) fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: SUPERVISOR_TARGET, "output watcher panicked");
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn tail_for_failures(
    log_path: &PathBuf,
    offset: u64,
    group: Pid,
    stop: &AtomicBool,
    network_drop: &AtomicBool,
) {
    let file = match File::open(log_path) {
        Ok(file) => file,
        Err(error) => {
            warn!(
                target: SUPERVISOR_TARGET,
                log = %log_path.display(),
                %error,
                "watcher could not open session log"
            );
            return;
        }
    };
    let mut reader = BufReader::new(file);
    if let Err(error) = reader.seek(SeekFrom::Start(offset)) {
        warn!(
            target: SUPERVISOR_TARGET,
            log = %log_path.display(),
            %error,
            "watcher could not seek to spawn offset"
        );
        return;
    }

    let mut counter = FailureCounter::default();
    let mut position = offset;
    let mut buffer = Vec::new();

    while !stop.load(Ordering::SeqCst) {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => thread::sleep(TAIL_POLL),
            Ok(read) if buffer.ends_with(b"\n") => {
                position += read as u64;
                let line = String::from_utf8_lossy(&buffer);
                if counter.observe(&line) {
                    network_drop.store(true, Ordering::SeqCst);
                    info!(
                        target: SUPERVISOR_TARGET,
                        log = %log_path.display(),
                        "network drop threshold reached, terminating proxy"
                    );
                    if let Err(error) = killpg(group, Signal::SIGTERM) {
                        debug!(
                            target: SUPERVISOR_TARGET,
                            %error,
                            "watcher SIGTERM delivery failed"
                        );
                    }
                    return;
                }
            }
            Ok(_) => {
                // Partial line: rewind and wait for the writer to finish it.
                if reader.seek(SeekFrom::Start(position)).is_err() {
                    return;
                }
                thread::sleep(TAIL_POLL);
            }
            Err(error) => {
                warn!(
                    target: SUPERVISOR_TARGET,
                    log = %log_path.display(),
                    %error,
                    "watcher read failed"
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Instant;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("network is unreachable", LineKind::TransientFailure)]
    #[case("Can't Assign Requested Address", LineKind::TransientFailure)]
    #[case("ERROR: handshake did not complete", LineKind::GenericError)]
    #[case("peer endpoint updated", LineKind::Benign)]
    fn classifies_output_lines(#[case] line: &str, #[case] expected: LineKind) {
        assert_eq!(classify(line), expected);
    }

    #[test]
    fn threshold_requires_consecutive_failures() {
        let mut counter = FailureCounter::default();
        for _ in 0..4 {
            assert!(!counter.observe("write udp: network is unreachable"));
        }
        assert!(counter.observe("write udp: network is unreachable"));
    }

    #[test]
    fn benign_line_resets_the_count() {
        let mut counter = FailureCounter::default();
        for _ in 0..4 {
            assert!(!counter.observe("write udp: network is unreachable"));
        }
        assert!(!counter.observe("handshake complete"));
        for _ in 0..4 {
            assert!(!counter.observe("write udp: network is unreachable"));
        }
        assert!(counter.observe("write udp: network is unreachable"));
    }

    #[test]
    fn generic_error_does_not_reset_the_count() {
        let mut counter = FailureCounter::default();
        for _ in 0..4 {
            assert!(!counter.observe("write udp: network is unreachable"));
        }
        assert!(!counter.observe("error: device closed stream"));
        assert!(counter.observe("write udp: network is unreachable"));
    }

    #[test]
    fn watcher_flags_drop_after_threshold() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("session.log");
        std::fs::write(&path, "header\n").expect("write header");
        let offset = std::fs::metadata(&path).expect("metadata").len();

        // A group id that cannot match a live process group keeps the
        // SIGTERM harmless in the test environment.
        let watcher = WatcherHandle::spawn(path.clone(), offset, Pid::from_raw(i32::MAX - 1));

        let mut file = File::options().append(true).open(&path).expect("append");
        for _ in 0..5 {
            writeln!(file, "write udp: network is unreachable").expect("append line");
        }
        drop(file);

        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline && !watcher.network_drop_detected() {
            thread::sleep(Duration::from_millis(50));
        }
        assert!(watcher.network_drop_detected());
        watcher.stop();
    }

    #[test]
    fn watcher_ignores_output_before_spawn_offset() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("session.log");
        let mut file = File::create(&path).expect("create log");
        for _ in 0..5 {
            writeln!(file, "write udp: network is unreachable").expect("write line");
        }
        let offset = std::fs::metadata(&path).expect("metadata").len();

        let watcher = WatcherHandle::spawn(path, offset, Pid::from_raw(i32::MAX - 1));
        thread::sleep(Duration::from_millis(500));
        assert!(!watcher.network_drop_detected());
        watcher.stop();
    }
}
