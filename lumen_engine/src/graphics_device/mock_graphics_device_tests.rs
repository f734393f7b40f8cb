//! Unit tests for MockGraphicsDevice
//!
//! The renderer tests rely on the mock catching synchronization misuse, so
//! the state machines themselves are checked here.

use crate::graphics_device::mock_graphics_device::*;
use crate::graphics_device::{
    AcquireOutcome, Buffer, BufferDesc, BufferUsage, CommandList, Extent2D, GraphicsDevice, PresentOutcome,
    ProgramDesc, ShaderSource, ShaderStage, Swapchain, Texture, TextureDesc, TextureFormat,
};
use crate::error::Error;

fn device() -> MockGraphicsDevice {
    MockGraphicsDevice::new(2, Extent2D::new(800, 600))
}

fn program_desc(vertex: &str, fragment: &str) -> ProgramDesc {
    ProgramDesc {
        label: "basic".to_string(),
        stages: vec![
            ShaderSource { stage: ShaderStage::Vertex, code: vertex.as_bytes().to_vec(), entry_point: "main".to_string() },
            ShaderSource { stage: ShaderStage::Fragment, code: fragment.as_bytes().to_vec(), entry_point: "main".to_string() },
        ],
    }
}

/// Drive one well-formed frame on a slot
fn run_frame(dev: &mut MockGraphicsDevice, slot: usize) -> u32 {
    dev.wait_for_slot(slot).unwrap();
    let AcquireOutcome::Acquired { image_index, .. } = dev.swapchain().acquire_next_image(slot).unwrap() else {
        panic!("acquire failed");
    };
    dev.reset_slot(slot).unwrap();
    {
        let cmd = dev.command_list(slot, image_index);
        cmd.begin().unwrap();
        cmd.end().unwrap();
    }
    dev.submit(slot, image_index).unwrap();
    dev.swapchain().present(slot, image_index).unwrap();
    image_index
}

// ============================================================================
// FENCE STATE MACHINE
// ============================================================================

#[test]
fn test_fences_start_signaled() {
    let dev = device();
    assert_eq!(dev.fences, vec![FenceState::Signaled, FenceState::Signaled]);
    assert_eq!(dev.frames_in_flight(), 2);
}

#[test]
fn test_well_formed_frames_have_no_violations() {
    let mut dev = device();
    for frame in 0..6 {
        run_frame(&mut dev, frame % 2);
    }
    assert!(dev.all_violations().is_empty(), "{:?}", dev.all_violations());
    assert_eq!(dev.submitted_frames, 6);
    assert_eq!(dev.swapchain.presented, vec![0, 1, 2, 0, 1, 2]);
}

#[test]
fn test_submit_without_reset_is_violation() {
    let mut dev = device();
    let _ = dev.swapchain().acquire_next_image(0).unwrap();
    dev.submit(0, 0).unwrap();
    assert_eq!(dev.violations.len(), 1);
    assert!(dev.violations[0].contains("without fence reset"));
}

#[test]
fn test_reset_of_pending_fence_is_violation() {
    let mut dev = device();
    run_frame(&mut dev, 0);
    dev.reset_slot(0).unwrap();
    assert!(dev.violations[0].contains("in-flight"));
}

#[test]
fn test_wait_on_unsignaled_fence_reports_deadlock() {
    let mut dev = device();
    dev.reset_slot(0).unwrap();
    assert_eq!(dev.wait_for_slot(0), Err(Error::DeviceLost));
    assert!(dev.violations[0].contains("never return"));
}

#[test]
fn test_abandon_resignals_fence() {
    let mut dev = device();
    let _ = dev.swapchain().acquire_next_image(0).unwrap();
    dev.reset_slot(0).unwrap();
    dev.abandon_frame(0).unwrap();
    assert_eq!(dev.fences[0], FenceState::Pending);
    assert!(!dev.swapchain.image_available[0]);
    dev.wait_for_slot(0).unwrap();
    assert!(dev.all_violations().is_empty());
    assert_eq!(dev.abandoned_frames, 1);
}

#[test]
fn test_injected_submit_failure_leaves_fence_unsignaled() {
    let mut dev = device();
    dev.fail_next_submit = true;
    let _ = dev.swapchain().acquire_next_image(0).unwrap();
    dev.reset_slot(0).unwrap();
    assert!(matches!(dev.submit(0, 0), Err(Error::SubmitFailed(_))));
    assert_eq!(dev.fences[0], FenceState::Unsignaled);
    assert!(!dev.fail_next_submit);
}

#[test]
fn test_abandon_after_failed_reset_resignals_fence() {
    let mut dev = device();
    dev.fail_next_reset = true;
    let _ = dev.swapchain().acquire_next_image(0).unwrap();
    assert!(matches!(dev.reset_slot(0), Err(Error::BackendError(_))));
    assert_eq!(dev.fences[0], FenceState::Signaled);

    dev.abandon_frame(0).unwrap();
    assert_eq!(dev.fences[0], FenceState::Pending);
    dev.wait_for_slot(0).unwrap();
    assert!(dev.all_violations().is_empty());
}

#[test]
fn test_wait_idle_marks_idle() {
    let mut dev = device();
    run_frame(&mut dev, 0);
    assert!(!dev.is_idle());
    dev.wait_idle().unwrap();
    assert!(dev.is_idle());
}

// ============================================================================
// SWAPCHAIN
// ============================================================================

#[test]
fn test_scripted_out_of_date_acquire() {
    let mut dev = device();
    dev.swapchain.acquire_script.push_back(ScriptedAcquire::OutOfDate);
    assert_eq!(dev.swapchain().acquire_next_image(0).unwrap(), AcquireOutcome::OutOfDate);
    assert!(!dev.swapchain.image_available[0]);
}

#[test]
fn test_scripted_suboptimal_acquire() {
    let mut dev = device();
    dev.swapchain.acquire_script.push_back(ScriptedAcquire::Suboptimal);
    assert_eq!(
        dev.swapchain().acquire_next_image(0).unwrap(),
        AcquireOutcome::Acquired { image_index: 0, suboptimal: true }
    );
}

#[test]
fn test_double_acquire_is_violation() {
    let mut dev = device();
    let _ = dev.swapchain().acquire_next_image(0).unwrap();
    let _ = dev.swapchain().acquire_next_image(0).unwrap();
    assert_eq!(dev.swapchain.violations.len(), 1);
}

#[test]
fn test_present_without_render_is_violation() {
    let mut dev = device();
    assert_eq!(dev.swapchain().present(0, 1).unwrap(), PresentOutcome::Presented);
    assert_eq!(dev.swapchain.violations.len(), 1);
}

#[test]
fn test_recreate_updates_extent() {
    let mut dev = device();
    let extent = dev.swapchain().recreate(Extent2D::new(1024, 768)).unwrap();
    assert_eq!(extent, Extent2D::new(1024, 768));
    assert_eq!(dev.swapchain_ref().extent(), extent);
    assert_eq!(dev.swapchain.recreate_count, 1);
    assert_eq!(dev.swapchain_ref().image_count(), 3);
    assert_eq!(dev.swapchain_ref().format(), TextureFormat::B8G8R8A8_SRGB);
}

// ============================================================================
// COMMAND LIST
// ============================================================================

#[test]
fn test_command_list_records_and_fails_on_demand() {
    let mut list = MockCommandList::new();
    list.begin().unwrap();
    list.fail_on = Some("draw_indexed".to_string());
    assert!(list.draw_indexed(3, 0, 0).is_err());
    list.end().unwrap();
    assert_eq!(list.commands, vec!["begin", "end"]);
}

#[test]
fn test_command_list_rejects_double_begin() {
    let mut list = MockCommandList::new();
    list.begin().unwrap();
    assert!(list.begin().is_err());
}

// ============================================================================
// RESOURCES
// ============================================================================

#[test]
fn test_buffer_creation_and_update() {
    let mut dev = device();
    let buffer = dev.create_buffer(BufferDesc { size: 8, usage: BufferUsage::Vertex }, &[1, 2, 3, 4]).unwrap();
    assert_eq!(buffer.size(), 8);
    assert!(buffer.update(4, &[9, 9, 9, 9]).is_ok());
    assert!(buffer.update(6, &[9, 9, 9, 9]).is_err());
    assert_eq!(dev.live.buffers(), 1);
    drop(buffer);
    assert_eq!(dev.live.buffers(), 0);
}

#[test]
fn test_texture_creation_validates() {
    let mut dev = device();
    let bad = TextureDesc {
        label: "bad".to_string(),
        width: 2,
        height: 2,
        format: TextureFormat::R8G8B8A8_SRGB,
        data: vec![0; 3],
    };
    assert!(matches!(dev.create_texture(bad), Err(Error::InvalidResource(_))));

    let good = TextureDesc {
        label: "good".to_string(),
        width: 1,
        height: 1,
        format: TextureFormat::R8G8B8A8_SRGB,
        data: vec![1, 2, 3, 4],
    };
    let texture = dev.create_texture(good).unwrap();
    assert_eq!(texture.info().width, 1);
    assert_eq!(dev.live.textures(), 1);
}

#[test]
fn test_program_compilation() {
    let mut dev = device();
    assert!(dev.create_program(&program_desc("void main() {}", "void main() {}")).is_ok());
    assert!(matches!(
        dev.create_program(&program_desc("syntax error here", "void main() {}")),
        Err(Error::ShaderCompilationFailed(_))
    ));
    assert!(matches!(
        dev.create_program(&program_desc("", "void main() {}")),
        Err(Error::ShaderCompilationFailed(_))
    ));
    assert_eq!(dev.programs_created, 1);
}

#[test]
fn test_program_requires_vertex_and_fragment() {
    let mut dev = device();
    let mut desc = program_desc("v", "f");
    desc.stages.pop();
    assert!(dev.create_program(&desc).is_err());
}
