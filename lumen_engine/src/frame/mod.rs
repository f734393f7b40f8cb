//! Per-frame machinery: slot ring bookkeeping and command recording

mod frame_sync;
mod command_recorder;

pub use frame_sync::{FrameSync, SlotState};
pub use command_recorder::{record, DrawCommand, FrameContext, RecordStats};
