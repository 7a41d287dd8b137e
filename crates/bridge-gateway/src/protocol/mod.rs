//! Gateway protocol definitions
//!
//! Op codes, message formats and close codes, seen from the client side.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{is_recoverable, CloseCode};
pub use messages::{GatewayMessage, InboundMessage};
pub use opcodes::OpCode;
pub use payloads::{HelloPayload, IdentifyPayload, IdentifyProperties, ReadyPayload, ResumePayload};
