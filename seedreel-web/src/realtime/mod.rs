//! Real-time control channel
//!
//! Clients send a magnet link or a `.torrent` file and get back the stream
//! URL, then periodic status updates until they disconnect.

pub mod connection;
pub mod messages;
pub mod socket;

pub use connection::{ChannelSink, Connection};
pub use messages::{ClientMessage, PayloadError, ServerMessage};
pub use socket::{run_socket, ws_handler};
