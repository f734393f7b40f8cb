/// Frame synchronization controller
///
/// Bookkeeping for the fixed ring of frame slots. The GPU-side primitives
/// (fences, semaphores) live in the device; this type tracks which slot is
/// current, what state each slot is in, and the monotonically increasing
/// frame serial used for deferred resource destruction.

use crate::engine_bail;
use crate::error::Result;

/// Lifecycle of one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Fence satisfied, nothing in flight
    Idle,
    /// Waiting for a swapchain image
    Acquiring,
    /// Command list being recorded
    Recording,
    /// Submitted to the GPU; fence pending
    Submitted,
}

impl SlotState {
    fn can_become(self, next: SlotState) -> bool {
        use SlotState::*;
        matches!(
            (self, next),
            (Idle, Idle)
                | (Submitted, Idle)
                | (Idle, Acquiring)
                | (Acquiring, Idle)
                | (Acquiring, Recording)
                | (Recording, Submitted)
        )
    }
}

pub struct FrameSync {
    states: Vec<SlotState>,
    current: usize,
    serial: u64,
}

impl FrameSync {
    /// `frames_in_flight` must be at least 1
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            states: vec![SlotState::Idle; frames_in_flight.max(1)],
            current: 0,
            serial: 0,
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.states.len()
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// Serial of the frame being built; increases by one per presented or
    /// abandoned frame
    pub fn frame_serial(&self) -> u64 {
        self.serial
    }

    pub fn state(&self, slot: usize) -> SlotState {
        self.states[slot]
    }

    /// Move the current slot to `next`
    pub fn transition(&mut self, next: SlotState) -> Result<()> {
        let slot = self.current;
        let state = self.states[slot];
        if !state.can_become(next) {
            engine_bail!("lumen::frame", "Invalid transition of slot {}: {:?} -> {:?}", slot, state, next);
        }
        self.states[slot] = next;
        Ok(())
    }

    /// Move to the next slot once the current one has been submitted
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.states.len();
        self.serial += 1;
    }

    /// Forget in-flight state after the device went idle
    pub fn reset_idle(&mut self) {
        for state in self.states.iter_mut() {
            if *state == SlotState::Submitted {
                *state = SlotState::Idle;
            }
        }
    }
}

#[cfg(test)]
#[path = "frame_sync_tests.rs"]
mod tests;
