//! Bridge between the daemon and the embedding shell / embedded page
//!
//! The shell connects over a Unix domain socket and relays page lifecycle
//! notifications inbound; mic directives and the dev-mode flag flow
//! outbound. Messages use a fixed, enumerated vocabulary only.

mod protocol;
mod server;

pub use protocol::{HostMessage, PageMessage};
pub use server::BridgeServer;
