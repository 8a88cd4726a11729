//! I/O primitives shared by the session pipeline and the transport adapters.
//!
//! - [`chunk_channel`] carries client bytes between an adapter and the core
//!   with an in-flight byte window.
//! - [`read_at_least`] accumulates chunks until a header stage is buffered.
//! - [`drain`] discards client input after a rejected handshake.
//! - [`pump`] relays both directions between the client and the remote.

mod accumulate;
mod channel;
mod drain;
mod pump;

pub use accumulate::{AccumulateError, concat_bytes, read_at_least};
pub use channel::{ChunkReceiver, ChunkSender, chunk_channel};
pub use drain::{DrainOutcome, drain};
pub use pump::{
    DirectionEnd, NoOpMetrics, PumpOptions, PumpReport, RelayMetrics, TrafficCounters, pump,
};
