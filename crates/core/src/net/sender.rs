use std::{
    fmt,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
};

use tracing::{debug, trace};

use crate::{
    osc::{encode_message, OscMessage},
    Result, VisualError,
};

/// Fire-and-forget sender bound to one destination.
pub struct OscSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscSender {
    pub fn new(ip: &str, port: u16) -> Result<Self> {
        let target = (ip, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| VisualError::msg(format!("couldn't resolve `{ip}`")))?;
        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)?;
        debug!(%target, "osc sender ready");
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn send(&self, message: &OscMessage) -> Result<()> {
        let bytes = encode_message(message);
        self.socket.send_to(&bytes, self.target)?;
        trace!(%message, target = %self.target, "sent message");
        Ok(())
    }

    /// Sends `[event, id]` to `address`, e.g. `connect` on startup.
    pub fn notify(&self, address: &str, event: &str, id: i32) -> Result<()> {
        self.send(&OscMessage::new(address).with_arg(event).with_arg(id))
    }
}

impl fmt::Debug for OscSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OscSender")
            .field("target", &self.target)
            .finish()
    }
}
