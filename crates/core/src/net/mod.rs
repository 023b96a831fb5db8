//! UDP transport: one inbound socket feeding the node tree and one outbound
//! socket for replies and notifications.

mod receiver;
mod sender;

pub use receiver::{IgnoreSwitch, OscReceiver};
pub use sender::OscSender;
