//! The local stand-in for the out-of-scope "capture framework" host
//! library: wire framing, backpressure ring buffer, channel-hop scheduler,
//! the callback-registration contract, and the event loop that ties them
//! together. See `SPEC_FULL.md`'s AMBIENT STACK section (F1-F5).

pub mod datasource;
pub mod hop;
pub mod host;
pub mod ringbuffer;
pub mod wire;
