//! Audio and still-frame extraction by piping bytes through ffmpeg.
//!
//! Nothing here decodes media. The crate streams the source into the
//! transcoder, splits its concatenated PNG output on chunk boundaries and
//! backpatches the size fields of its streamed WAV output.

pub mod args;
pub mod batch;
pub mod error;
pub mod events;
pub mod extract;
pub mod png;
pub mod probe;
pub mod process;
pub mod wav;

pub use error::{PipeError, Result};
