use std::{
    fmt,
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, error, info, trace, warn};

use crate::{
    osc::{decode_packet, OscNode},
    Result, VisualError,
};

/// How long the receive loop blocks before checking for a stop request.
const READ_TIMEOUT: Duration = Duration::from_millis(50);
const MAX_DATAGRAM: usize = 65_536;

/// Listens for OSC packets on a worker thread and routes every message into
/// a shared root node while holding its lock.
pub struct OscReceiver {
    port: u16,
    running: Arc<AtomicBool>,
    ignore: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
    worker: Option<JoinHandle<()>>,
}

impl OscReceiver {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            running: Arc::new(AtomicBool::new(false)),
            ignore: Arc::new(AtomicBool::new(false)),
            local_addr: None,
            worker: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Changes the listening port; refused while running.
    pub fn setup(&mut self, port: u16) -> bool {
        if self.is_running() {
            warn!(port = self.port, "cannot change port while the receiver is running");
            return false;
        }
        self.port = port;
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Starts listening; returns false when the socket couldn't be bound or
    /// the receiver is already running.
    pub fn start<R>(&mut self, root: Arc<Mutex<R>>) -> bool
    where
        R: OscNode + Send + 'static,
    {
        match self.try_start(root) {
            Ok(addr) => {
                info!(%addr, "osc receiver listening");
                true
            }
            Err(err) => {
                error!(%err, "osc receiver not started");
                false
            }
        }
    }

    pub fn try_start<R>(&mut self, root: Arc<Mutex<R>>) -> Result<SocketAddr>
    where
        R: OscNode + Send + 'static,
    {
        if self.is_running() {
            return Err(VisualError::msg("osc receiver is already running"));
        }
        let socket = UdpSocket::bind(("0.0.0.0", self.port)).map_err(|source| VisualError::Bind {
            port: self.port,
            source,
        })?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        let addr = socket.local_addr()?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let ignore = Arc::clone(&self.ignore);
        let spawned = thread::Builder::new()
            .name("visual-osc-receiver".to_string())
            .spawn(move || receive_loop(socket, root, running, ignore));
        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                self.local_addr = Some(addr);
                Ok(addr)
            }
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                Err(err.into())
            }
        }
    }

    /// Drops inbound messages while set, without closing the socket.
    pub fn ignore_messages(&self, ignore: bool) {
        self.ignore.store(ignore, Ordering::SeqCst);
    }

    pub fn is_ignoring(&self) -> bool {
        self.ignore.load(Ordering::SeqCst)
    }

    /// Shared handle on the ignore flag, for whoever owns the pause state.
    pub fn ignore_switch(&self) -> IgnoreSwitch {
        IgnoreSwitch(Arc::clone(&self.ignore))
    }

    /// Stops the worker and closes the socket. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("osc receiver thread panicked");
            }
            debug!(port = self.port, "osc receiver stopped");
        }
        self.local_addr = None;
        self.ignore.store(false, Ordering::SeqCst);
    }
}

/// Toggles whether a receiver drops inbound messages.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSwitch(Arc<AtomicBool>);

impl IgnoreSwitch {
    pub fn set(&self, ignore: bool) {
        self.0.store(ignore, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Drop for OscReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for OscReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OscReceiver")
            .field("port", &self.port)
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .field("ignoring", &self.is_ignoring())
            .finish()
    }
}

fn receive_loop<R: OscNode>(
    socket: UdpSocket,
    root: Arc<Mutex<R>>,
    running: Arc<AtomicBool>,
    ignore: Arc<AtomicBool>,
) {
    let mut buffer = vec![0_u8; MAX_DATAGRAM];
    while running.load(Ordering::SeqCst) {
        let (len, source) = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                continue
            }
            Err(err) => {
                warn!(%err, "osc receive failed");
                continue;
            }
        };

        let packet = match decode_packet(&buffer[..len]) {
            Ok(packet) => packet,
            Err(err) => {
                trace!(%source, %err, "dropped malformed datagram");
                continue;
            }
        };
        if ignore.load(Ordering::SeqCst) {
            trace!(%source, "ignoring inbound messages");
            continue;
        }

        let Ok(mut root) = root.lock() else {
            warn!("routing root has been poisoned, message dropped");
            continue;
        };
        for message in packet.into_messages() {
            let message = message.with_source(source);
            let handled = root.process_osc(&message);
            trace!(address = message.address(), handled, "routed message");
        }
    }
}
