// Adapters layer: concrete transports and wire formats.

pub mod codec;
pub mod transport;
