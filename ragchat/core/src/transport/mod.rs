//! Transport Layer
//!
//! Wire-level framing for the streamed turn response. Everything above this
//! module works with decoded payload strings and never sees raw bytes.

pub mod frame;

// Re-exports for convenience
pub use frame::{parse_data_line, FrameDecoder, DATA_PREFIX, DEFAULT_MAX_FRAME_BYTES};
