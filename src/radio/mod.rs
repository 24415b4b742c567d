pub mod cc1101;
pub mod cc1101_registers;
pub mod hal;
pub mod packet;

pub use cc1101::{Cc1101, ChipState, LinkStats, RadioConfig, RadioError, ReceiverHandle};
pub use packet::{RadiatorCommand, RadiatorMode, RadioAddress, ReceivedPacket};
