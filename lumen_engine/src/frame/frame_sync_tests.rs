//! Unit tests for FrameSync

use crate::frame::{FrameSync, SlotState};

#[test]
fn test_new_starts_idle_at_slot_zero() {
    let sync = FrameSync::new(3);
    assert_eq!(sync.frames_in_flight(), 3);
    assert_eq!(sync.current_slot(), 0);
    assert_eq!(sync.frame_serial(), 0);
    assert!((0..3).all(|s| sync.state(s) == SlotState::Idle));
}

#[test]
fn test_zero_slots_clamped_to_one() {
    assert_eq!(FrameSync::new(0).frames_in_flight(), 1);
}

#[test]
fn test_full_cycle() {
    let mut sync = FrameSync::new(2);
    sync.transition(SlotState::Acquiring).unwrap();
    sync.transition(SlotState::Recording).unwrap();
    sync.transition(SlotState::Submitted).unwrap();
    sync.advance();

    assert_eq!(sync.current_slot(), 1);
    assert_eq!(sync.frame_serial(), 1);
    assert_eq!(sync.state(0), SlotState::Submitted);
}

#[test]
fn test_slot_index_wraps() {
    let mut sync = FrameSync::new(3);
    let slots: Vec<usize> = (0..7)
        .map(|_| {
            let slot = sync.current_slot();
            sync.advance();
            slot
        })
        .collect();
    assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
}

#[test]
fn test_aborted_acquire_returns_to_idle() {
    let mut sync = FrameSync::new(2);
    sync.transition(SlotState::Acquiring).unwrap();
    sync.transition(SlotState::Idle).unwrap();
    assert_eq!(sync.state(0), SlotState::Idle);
}

#[test]
fn test_invalid_transitions_rejected() {
    let mut sync = FrameSync::new(2);
    assert!(sync.transition(SlotState::Recording).is_err());
    assert!(sync.transition(SlotState::Submitted).is_err());

    sync.transition(SlotState::Acquiring).unwrap();
    assert!(sync.transition(SlotState::Submitted).is_err());
    assert_eq!(sync.state(0), SlotState::Acquiring);
}

#[test]
fn test_reset_idle_clears_submitted() {
    let mut sync = FrameSync::new(2);
    sync.transition(SlotState::Acquiring).unwrap();
    sync.transition(SlotState::Recording).unwrap();
    sync.transition(SlotState::Submitted).unwrap();

    sync.reset_idle();
    assert_eq!(sync.state(0), SlotState::Idle);
}
