//! Wire framing and verb encoding shared by the mirror and vendor daemons
//! and the client that talks to them.

mod error;
mod framing;
pub mod mirror;
pub mod vendor;

pub use error::ProtocolError;
pub use framing::{read_message, write_message, MAX_MESSAGE_LEN};
