pub mod client;
pub mod frame;
pub mod opcode;
pub mod request;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ClientState, ProtocolClient};
pub use frame::{recv_exact, ProtocolFrame};
pub use opcode::{Opcode, ResponseFamily, ResponseKind};
pub use request::Request;
