/// Deferred destruction of GPU objects
///
/// A released object may still be referenced by command lists that are in
/// flight. It is kept alive until every frame slot that could have recorded
/// it has retired.

use std::collections::VecDeque;
use std::sync::Arc;
use crate::graphics_device::{Buffer, Program, Texture};

/// A GPU object waiting for destruction
pub enum ReleasedObject {
    Buffer(Arc<dyn Buffer>),
    Texture(Arc<dyn Texture>),
    Program(Arc<dyn Program>),
}

/// Queue of released objects tagged with the frame serial of their release
#[derive(Default)]
pub struct DeferredReleaseQueue {
    entries: VecDeque<(u64, ReleasedObject)>,
}

impl DeferredReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, serial: u64, object: ReleasedObject) {
        self.entries.push_back((serial, object));
    }

    /// Destroy every object released at least `frames_in_flight` frames
    /// before `current_serial`; returns how many were destroyed
    pub fn collect(&mut self, current_serial: u64, frames_in_flight: u64) -> usize {
        let mut released = 0;
        while let Some((serial, _)) = self.entries.front() {
            if serial + frames_in_flight > current_serial {
                break;
            }
            self.entries.pop_front();
            released += 1;
        }
        released
    }

    /// Destroy everything; only valid once the device is idle
    pub fn flush(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
