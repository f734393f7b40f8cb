//! Unit tests for FrameRenderer
//!
//! Frame loop behaviour against the mock device: slot rotation, fence
//! discipline, surface rebuilds, dropped frames and resource lifetime.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use glam::Mat4;
use crate::camera::Camera;
use crate::config::Config;
use crate::error::{Error, ErrorCode};
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, MockProgram, ScriptedAcquire};
use crate::graphics_device::{Extent2D, PresentOutcome};
use crate::renderer::{FrameRenderer, FrameStatus, Renderer, SkipReason};
use crate::resource::{
    DefaultAssetLoader, MemoryAssetSource, MeshDesc, MeshId, ProgramId, ResourceManager,
    ShaderProgramDesc, Vertex,
};

const FRAMES: usize = 2;

fn config() -> Config {
    Config { frames_in_flight: FRAMES, hot_reload: false, ..Config::default() }
}

fn renderer_with(files: Arc<MemoryAssetSource>) -> FrameRenderer<MockGraphicsDevice> {
    let device = MockGraphicsDevice::new(FRAMES, Extent2D::new(800, 600));
    let resources = ResourceManager::new(Box::new(files), Box::new(DefaultAssetLoader), FRAMES);
    FrameRenderer::new(device, resources, &config())
}

fn shader_files() -> Arc<MemoryAssetSource> {
    let files = Arc::new(MemoryAssetSource::new());
    files.insert("/shaders/mesh.vert", b"void main() {}".to_vec());
    files.insert("/shaders/mesh.frag", b"void main() {}".to_vec());
    files
}

/// Initialized renderer with one mesh and an active program
fn scene() -> (FrameRenderer<MockGraphicsDevice>, MeshId, ProgramId, Arc<MemoryAssetSource>) {
    let files = shader_files();
    let mut renderer = renderer_with(files.clone());
    renderer.init().unwrap();

    let (mesh, program) = {
        let mut resources = renderer.resources();
        let mesh = resources
            .create_mesh(MeshDesc {
                label: "tri".to_string(),
                vertices: vec![Vertex::default(); 3],
                indices: vec![0, 1, 2],
                diffuse: None,
                specular: None,
            })
            .unwrap();
        let program = resources
            .create_program(ShaderProgramDesc::new("mesh", "shaders/mesh.vert", "shaders/mesh.frag"))
            .unwrap();
        (mesh, program)
    };
    renderer.render_state_mut().active_program = Some(program);
    (renderer, mesh, program, files)
}

fn presented_slot(status: FrameStatus) -> usize {
    match status {
        FrameStatus::Presented { slot, .. } => slot,
        other => panic!("frame not presented: {:?}", other),
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_init_then_wait_leaves_device_idle() {
    let mut renderer = renderer_with(shader_files());
    renderer.init().unwrap();
    renderer.new_frame().unwrap();
    assert!(!renderer.device().is_idle());

    renderer.wait().unwrap();

    assert!(renderer.device().is_idle());
    assert!(renderer.device().all_violations().is_empty());
}

#[test]
fn test_init_creates_placeholder() {
    let mut renderer = renderer_with(shader_files());
    renderer.init().unwrap();
    renderer.init().unwrap();

    assert!(renderer.is_initialized());
    assert_eq!(renderer.properties().resources.textures, 1);
}

#[test]
fn test_new_frame_before_init_fails() {
    let mut renderer = renderer_with(shader_files());
    assert_eq!(renderer.new_frame().unwrap_err(), Error::NotInitialized);
    assert!(renderer.device().call_log().is_empty());
}

#[test]
fn test_shutdown_releases_everything() {
    let (mut renderer, mesh, _program, _files) = scene();
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();
    renderer.new_frame().unwrap();

    renderer.shutdown().unwrap();

    let live = renderer.device().live.clone();
    assert_eq!(live.buffers(), 0);
    assert_eq!(live.textures(), 0);
    assert_eq!(live.programs(), 0);
    assert!(!renderer.is_initialized());
    assert_eq!(renderer.device().call_log().last().map(String::as_str), Some("wait_idle"));
}

// ============================================================================
// FRAME SLOTS
// ============================================================================

#[test]
fn test_slots_cycle_with_frames_in_flight_period() {
    let (mut renderer, mesh, _program, _files) = scene();

    let slots: Vec<usize> = (0..6)
        .map(|_| {
            renderer.draw(mesh, Mat4::IDENTITY).unwrap();
            presented_slot(renderer.new_frame().unwrap())
        })
        .collect();

    assert_eq!(slots, vec![0, 1, 0, 1, 0, 1]);
    assert_eq!(renderer.properties().frame_serial, 6);
    assert_eq!(renderer.device().submitted_frames, 6);
    assert!(renderer.device().all_violations().is_empty());
}

#[test]
fn test_fence_waited_before_reset() {
    let (mut renderer, _mesh, _program, _files) = scene();
    renderer.new_frame().unwrap();

    let calls = renderer.device().call_log();
    assert_eq!(calls, vec!["wait 0", "acquire 0", "reset 0", "submit 0 0", "present 0 0"]);
}

#[test]
fn test_draws_are_recorded_once() {
    let (mut renderer, mesh, _program, _files) = scene();
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();
    renderer.draw(mesh, Mat4::from_translation(glam::Vec3::Y)).unwrap();

    match renderer.new_frame().unwrap() {
        FrameStatus::Presented { draws, skipped, .. } => {
            assert_eq!(draws, 2);
            assert_eq!(skipped, 0);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(renderer.queued_draws().is_empty());

    renderer.new_frame().unwrap();
    assert_eq!(renderer.properties().last_frame.draws, 0);
}

// ============================================================================
// DRAW VALIDATION
// ============================================================================

#[test]
fn test_draw_unknown_mesh_is_rejected() {
    let (mut renderer, mesh, _program, _files) = scene();
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();
    renderer.resources().free_mesh(mesh).unwrap();

    let err = renderer.draw(mesh, Mat4::IDENTITY).unwrap_err();

    assert!(matches!(err, Error::MeshNotFound(_)));
    assert_eq!(err.code(), ErrorCode::MeshNotFound);
    assert_eq!(renderer.queued_draws().len(), 1);
}

#[test]
fn test_draw_freed_after_queue_is_skipped() {
    let (mut renderer, mesh, _program, _files) = scene();
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();
    renderer.resources().free_mesh(mesh).unwrap();

    match renderer.new_frame().unwrap() {
        FrameStatus::Presented { draws, skipped, .. } => {
            assert_eq!(draws, 0);
            assert_eq!(skipped, 1);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_error_message_lookup() {
    let renderer = renderer_with(shader_files());
    assert_eq!(renderer.error_message(ErrorCode::MeshNotFound), "Mesh not found");
    assert_eq!(renderer.describe_error(&Error::DeviceLost), "Device lost");
}

// ============================================================================
// SURFACE
// ============================================================================

#[test]
fn test_resize_rebuilds_once_per_distinct_extent() {
    let (mut renderer, mesh, _program, _files) = scene();
    renderer.new_frame().unwrap();

    renderer.notify_resize(1024, 768);
    renderer.notify_resize(1280, 720);
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();
    let slot = presented_slot(renderer.new_frame().unwrap());

    renderer.notify_resize(1280, 720);
    renderer.new_frame().unwrap();

    assert_eq!(renderer.device().swapchain.recreate_count, 1);
    assert_eq!(renderer.properties().extent, Extent2D::new(1280, 720));
    assert!(renderer.device().command_lists[slot].commands.contains(&"set_viewport 1280x720".to_string()));
    assert!(renderer.device().all_violations().is_empty());
}

#[test]
fn test_resize_subscribers_notified() {
    let (mut renderer, _mesh, _program, _files) = scene();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    renderer.subscribe_resize(Box::new(move |extent| sink.borrow_mut().push(extent)));

    renderer.notify_resize(640, 480);
    renderer.new_frame().unwrap();

    assert_eq!(*seen.borrow(), vec![Extent2D::new(640, 480)]);
}

#[test]
fn test_minimized_window_skips_frames() {
    let (mut renderer, mesh, _program, _files) = scene();
    renderer.notify_resize(0, 0);
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();

    assert_eq!(renderer.new_frame().unwrap(), FrameStatus::Skipped(SkipReason::Minimized));
    assert!(renderer.device().call_log().is_empty());
    assert!(renderer.queued_draws().is_empty());

    renderer.notify_resize(800, 600);
    assert!(renderer.new_frame().unwrap().is_presented());
}

#[test]
fn test_out_of_date_acquire_skips_then_rebuilds() {
    let (mut renderer, _mesh, _program, _files) = scene();
    renderer.device_mut().swapchain.acquire_script.push_back(ScriptedAcquire::OutOfDate);

    assert_eq!(renderer.new_frame().unwrap(), FrameStatus::Skipped(SkipReason::OutOfDate));
    assert_eq!(renderer.frame_sync().current_slot(), 0);

    assert!(renderer.new_frame().unwrap().is_presented());
    assert_eq!(renderer.device().swapchain.recreate_count, 1);
    assert!(renderer.device().all_violations().is_empty());
}

#[test]
fn test_suboptimal_acquire_presents_then_rebuilds() {
    let (mut renderer, _mesh, _program, _files) = scene();
    renderer.device_mut().swapchain.acquire_script.push_back(ScriptedAcquire::Suboptimal);

    assert!(renderer.new_frame().unwrap().is_presented());
    assert_eq!(renderer.device().swapchain.recreate_count, 0);

    renderer.new_frame().unwrap();
    assert_eq!(renderer.device().swapchain.recreate_count, 1);
}

#[test]
fn test_out_of_date_present_triggers_rebuild() {
    let (mut renderer, _mesh, _program, _files) = scene();
    renderer.device_mut().swapchain.present_script.push_back(PresentOutcome::OutOfDate);

    assert!(renderer.new_frame().unwrap().is_presented());
    renderer.new_frame().unwrap();

    assert_eq!(renderer.device().swapchain.recreate_count, 1);
    assert!(renderer.device().all_violations().is_empty());
}

// ============================================================================
// DROPPED FRAMES
// ============================================================================

#[test]
fn test_submit_failure_abandons_frame_without_deadlock() {
    let (mut renderer, mesh, _program, _files) = scene();
    renderer.device_mut().fail_next_submit = true;
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();

    let err = renderer.new_frame().unwrap_err();
    assert!(matches!(err, Error::SubmitFailed(_)));
    assert_eq!(renderer.device().abandoned_frames, 1);

    for _ in 0..4 {
        assert!(renderer.new_frame().unwrap().is_presented());
    }
    assert!(renderer.device().all_violations().is_empty());
}

#[test]
fn test_slot_reset_failure_abandons_frame_without_deadlock() {
    let (mut renderer, mesh, _program, _files) = scene();
    renderer.device_mut().fail_next_reset = true;
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();

    let err = renderer.new_frame().unwrap_err();
    assert!(matches!(err, Error::BackendError(_)));
    assert_eq!(renderer.device().abandoned_frames, 1);
    assert_eq!(renderer.device().submitted_frames, 0);

    // Every slot comes round again, including the abandoned one
    for _ in 0..FRAMES * 2 {
        renderer.draw(mesh, Mat4::IDENTITY).unwrap();
        assert!(renderer.new_frame().unwrap().is_presented());
    }
    assert!(renderer.device().all_violations().is_empty());
}

#[test]
fn test_recording_failure_drops_frame() {
    let (mut renderer, mesh, _program, _files) = scene();
    renderer.device_mut().command_lists[0].fail_on = Some("draw_indexed".to_string());
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();

    let err = renderer.new_frame().unwrap_err();
    assert!(matches!(err, Error::RecordingFailed(_)));
    assert_eq!(renderer.device().submitted_frames, 0);

    renderer.device_mut().command_lists[0].fail_on = None;
    for _ in 0..3 {
        renderer.draw(mesh, Mat4::IDENTITY).unwrap();
        assert!(renderer.new_frame().unwrap().is_presented());
    }
    assert!(renderer.device().all_violations().is_empty());
}

// ============================================================================
// RENDER STATE
// ============================================================================

#[test]
fn test_wireframe_mode_binds_line_program() {
    let (mut renderer, mesh, _program, _files) = scene();
    renderer.set_wireframe_mode(true).unwrap();
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();

    let slot = presented_slot(renderer.new_frame().unwrap());

    assert!(renderer.render_state().wireframe);
    assert!(renderer.device().command_lists[slot].commands.contains(&"bind_program mesh Line".to_string()));
}

#[test]
fn test_wireframe_unsupported_is_rejected() {
    let (mut renderer, _mesh, _program, _files) = scene();
    renderer.device_mut().properties.wireframe_supported = false;

    assert!(renderer.set_wireframe_mode(true).is_err());
    assert!(!renderer.render_state().wireframe);
    assert!(renderer.set_wireframe_mode(false).is_ok());
}

#[test]
fn test_clear_color_from_render_state() {
    let (mut renderer, _mesh, _program, _files) = scene();
    renderer.render_state_mut().clear_color = [1.0, 0.0, 0.0, 1.0];

    let slot = presented_slot(renderer.new_frame().unwrap());

    assert!(renderer.device().command_lists[slot].commands[1].contains("[1.0, 0.0, 0.0, 1.0]"));
}

#[test]
fn test_set_camera() {
    let mut renderer = renderer_with(shader_files());
    let camera = Camera::new(glam::Vec3::new(1.0, 2.0, 3.0), 0.0, 10.0);
    renderer.set_camera(camera);
    assert_eq!(*renderer.camera(), camera);
}

// ============================================================================
// RESOURCE LIFETIME
// ============================================================================

#[test]
fn test_freed_mesh_buffers_outlive_in_flight_frames() {
    let (mut renderer, mesh, _program, _files) = scene();
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();
    renderer.new_frame().unwrap();
    renderer.resources().free_mesh(mesh).unwrap();

    assert_eq!(renderer.device().live.buffers(), 2);
    renderer.new_frame().unwrap();
    assert_eq!(renderer.device().live.buffers(), 2);

    for _ in 0..FRAMES {
        renderer.new_frame().unwrap();
    }
    assert_eq!(renderer.device().live.buffers(), 0);
}

#[test]
fn test_hot_reload_applied_at_frame_start() {
    let (mut renderer, _mesh, program, files) = scene();
    renderer
        .resources()
        .set_uniform(program, "u_exposure", crate::graphics_device::UniformValue::Float(2.0))
        .unwrap();

    files.insert("/shaders/mesh.frag", b"void main() { discard; }".to_vec());
    let sender = renderer.resources().manager().reload_sender();
    sender.send(PathBuf::from("/shaders/mesh.frag")).unwrap();
    renderer.new_frame().unwrap();

    let resources = renderer.resources();
    let shader = resources.manager().program(program).unwrap();
    assert_eq!(shader.generation(), 1);
    let gpu = shader.gpu().clone();
    let mock = gpu.as_any().downcast_ref::<MockProgram>().unwrap();
    assert_eq!(mock.uniform("u_exposure"), Some(crate::graphics_device::UniformValue::Float(2.0)));
}

#[test]
fn test_broken_hot_reload_keeps_rendering() {
    let (mut renderer, mesh, program, files) = scene();

    files.insert("/shaders/mesh.vert", b"syntax error".to_vec());
    let sender = renderer.resources().manager().reload_sender();
    sender.send(PathBuf::from("/shaders/mesh.vert")).unwrap();
    renderer.draw(mesh, Mat4::IDENTITY).unwrap();

    let slot = presented_slot(renderer.new_frame().unwrap());

    assert_eq!(renderer.resources().manager().program(program).unwrap().generation(), 0);
    assert!(renderer.device().command_lists[slot].commands.iter().any(|c| c.starts_with("draw_indexed")));
}
