/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Models the slot fences and the swapchain signals as small state machines
/// and records every misuse in `violations` instead of hanging or crashing
/// like a real driver would. Acquire/present results can be scripted and
/// failures injected to drive the renderer through its error paths.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;

use crate::config::BackendKind;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquireOutcome, AdapterType, Buffer, BufferDesc, BufferUsage, ClearValue, CommandList,
    DeviceProperties, Extent2D, GraphicsDevice, IndexType, PolygonMode, PresentOutcome, Program,
    ProgramDesc, Rect2D, ShaderStageFlags, Swapchain, Texture, TextureDesc, TextureFormat,
    TextureInfo, UniformValue, Viewport,
};

/// Shared call log
pub type CallLog = Arc<Mutex<Vec<String>>>;

fn push(log: &CallLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

/// Number of live GPU objects created by the mock
#[derive(Debug, Default)]
pub struct LiveCounts {
    pub buffers: AtomicUsize,
    pub textures: AtomicUsize,
    pub programs: AtomicUsize,
}

impl LiveCounts {
    pub fn textures(&self) -> usize {
        self.textures.load(Ordering::SeqCst)
    }

    pub fn buffers(&self) -> usize {
        self.buffers.load(Ordering::SeqCst)
    }

    pub fn programs(&self) -> usize {
        self.programs.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub size: u64,
    pub usage: BufferUsage,
    pub data: Mutex<Vec<u8>>,
    live: Arc<LiveCounts>,
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset as usize + data.len();
        if end as u64 > self.size {
            return Err(Error::InvalidResource(format!("write of {} bytes past buffer end", data.len())));
        }
        self.data.lock().unwrap()[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockBuffer {
    fn drop(&mut self) {
        self.live.buffers.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

pub struct MockTexture {
    pub info: TextureInfo,
    pub label: String,
    /// First pixel, for content checks
    pub first_pixel: [u8; 4],
    live: Arc<LiveCounts>,
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockTexture {
    fn drop(&mut self) {
        self.live.textures.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Mock Program
// ============================================================================

pub struct MockProgram {
    pub label: String,
    pub stages: ShaderStageFlags,
    /// Source bytes of the vertex stage, to tell rebuilt programs apart
    pub vertex_code: Vec<u8>,
    pub uniforms: Mutex<FxHashMap<String, UniformValue>>,
    live: Arc<LiveCounts>,
}

impl MockProgram {
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.lock().unwrap().get(name).copied()
    }
}

impl Program for MockProgram {
    fn stages(&self) -> ShaderStageFlags {
        self.stages
    }

    fn set_uniform(&self, name: &str, value: &UniformValue) -> Result<()> {
        self.uniforms.lock().unwrap().insert(name.to_string(), *value);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockProgram {
    fn drop(&mut self) {
        self.live.programs.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

/// Command list that records commands as strings
pub struct MockCommandList {
    pub commands: Vec<String>,
    /// Fail the first command whose name starts with this prefix
    pub fail_on: Option<String>,
    pub recording: bool,
    pub image_index: u32,
}

impl MockCommandList {
    pub fn new() -> Self {
        Self { commands: Vec::new(), fail_on: None, recording: false, image_index: 0 }
    }

    fn record(&mut self, command: String) -> Result<()> {
        if let Some(prefix) = &self.fail_on {
            if command.starts_with(prefix.as_str()) {
                return Err(Error::BackendError(format!("injected failure on '{}'", command)));
            }
        }
        self.commands.push(command);
        Ok(())
    }
}

impl Default for MockCommandList {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::BackendError("Command list already recording".to_string()));
        }
        self.record("begin".to_string())?;
        self.recording = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if !self.recording {
            return Err(Error::BackendError("Command list not recording".to_string()));
        }
        self.record("end".to_string())?;
        self.recording = false;
        Ok(())
    }

    fn begin_render_pass(&mut self, clear_values: &[ClearValue]) -> Result<()> {
        let color = clear_values.iter().find_map(|c| match c {
            ClearValue::Color(rgba) => Some(*rgba),
            _ => None,
        });
        self.record(format!("begin_render_pass image={} clear={:?}", self.image_index, color))
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.record("end_render_pass".to_string())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.record(format!("set_viewport {}x{}", viewport.width, viewport.height))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.record(format!("set_scissor {}x{}", scissor.width, scissor.height))
    }

    fn bind_program(&mut self, program: &Arc<dyn Program>, mode: PolygonMode) -> Result<()> {
        let label = program
            .as_any()
            .downcast_ref::<MockProgram>()
            .map(|p| p.label.clone())
            .unwrap_or_default();
        self.record(format!("bind_program {} {:?}", label, mode))
    }

    fn bind_textures(&mut self, diffuse: &Arc<dyn Texture>, specular: &Arc<dyn Texture>) -> Result<()> {
        let label = |t: &Arc<dyn Texture>| {
            t.as_any()
                .downcast_ref::<MockTexture>()
                .map(|m| m.label.clone())
                .unwrap_or_default()
        };
        self.record(format!("bind_textures {} {}", label(diffuse), label(specular)))
    }

    fn push_constants(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.record(format!("push_constants {} {}", offset, data.len()))
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, _offset: u64) -> Result<()> {
        self.record(format!("bind_vertex_buffer {}", buffer.size()))
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, _offset: u64, index_type: IndexType) -> Result<()> {
        self.record(format!("bind_index_buffer {} {:?}", buffer.size(), index_type))
    }

    fn draw_indexed(&mut self, index_count: u32, _first_index: u32, _vertex_offset: i32) -> Result<()> {
        self.record(format!("draw_indexed {}", index_count))
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

/// Scripted acquire result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedAcquire {
    OutOfDate,
    Suboptimal,
}

pub struct MockSwapchain {
    pub extent: Extent2D,
    pub image_count: usize,
    pub format: TextureFormat,
    next_image: u32,
    /// "image available" signal pending, per slot
    pub image_available: Vec<bool>,
    /// "render finished" signal pending, per image
    pub render_finished: Vec<bool>,
    pub acquire_script: VecDeque<ScriptedAcquire>,
    pub present_script: VecDeque<PresentOutcome>,
    pub recreate_count: usize,
    /// Largest extent the surface allows; requests beyond it are clamped
    pub max_extent: Option<Extent2D>,
    pub presented: Vec<u32>,
    pub violations: Vec<String>,
    pub calls: CallLog,
}

impl MockSwapchain {
    fn new(frames_in_flight: usize, extent: Extent2D, calls: CallLog) -> Self {
        let image_count = 3;
        Self {
            extent,
            image_count,
            format: TextureFormat::B8G8R8A8_SRGB,
            next_image: 0,
            image_available: vec![false; frames_in_flight],
            render_finished: vec![false; image_count],
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            recreate_count: 0,
            max_extent: None,
            presented: Vec::new(),
            violations: Vec::new(),
            calls,
        }
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        push(&self.calls, format!("acquire {}", slot));
        if self.image_available[slot] {
            self.violations.push(format!("acquire on slot {} with a pending image-available signal", slot));
        }

        let scripted = self.acquire_script.pop_front();
        if scripted == Some(ScriptedAcquire::OutOfDate) {
            return Ok(AcquireOutcome::OutOfDate);
        }

        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count as u32;
        self.image_available[slot] = true;
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: scripted == Some(ScriptedAcquire::Suboptimal),
        })
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        push(&self.calls, format!("present {} {}", slot, image_index));
        let image = image_index as usize;
        if !self.render_finished[image] {
            self.violations.push(format!("present of image {} without render-finished signal", image));
        }
        self.render_finished[image] = false;
        self.presented.push(image_index);
        Ok(self.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    fn recreate(&mut self, requested: Extent2D) -> Result<Extent2D> {
        push(&self.calls, format!("recreate {}x{}", requested.width, requested.height));
        if self.image_available.iter().any(|pending| *pending) {
            self.violations.push("recreate with a pending image-available signal".to_string());
        }
        self.extent = match self.max_extent {
            Some(max) => Extent2D::new(requested.width.min(max.width), requested.height.min(max.height)),
            None => requested,
        };
        self.next_image = 0;
        self.render_finished = vec![false; self.image_count];
        self.recreate_count += 1;
        Ok(self.extent)
    }

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

/// State of a slot fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    Signaled,
    Unsignaled,
    /// Submitted, signaled by the GPU on the next wait
    Pending,
}

pub struct MockGraphicsDevice {
    pub properties: DeviceProperties,
    pub fences: Vec<FenceState>,
    pub command_lists: Vec<MockCommandList>,
    pub swapchain: MockSwapchain,
    pub violations: Vec<String>,
    pub calls: CallLog,
    pub live: Arc<LiveCounts>,
    /// Fail the next `submit` call
    pub fail_next_submit: bool,
    /// Fail the next `reset_slot` call, leaving the fence signaled
    pub fail_next_reset: bool,
    /// Fail every texture creation
    pub fail_texture_creation: bool,
    pub submitted_frames: usize,
    pub abandoned_frames: usize,
    pub programs_created: usize,
    /// Set by `wait_idle`, cleared by any submission
    pub idle: AtomicBool,
}

impl MockGraphicsDevice {
    pub fn new(frames_in_flight: usize, extent: Extent2D) -> Self {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        Self {
            properties: DeviceProperties {
                backend: BackendKind::Vulkan,
                device_name: "Mock Device".to_string(),
                adapter_type: AdapterType::Other,
                api_version: "1.3.0".to_string(),
                frames_in_flight,
                wireframe_supported: true,
            },
            fences: vec![FenceState::Signaled; frames_in_flight],
            command_lists: (0..frames_in_flight).map(|_| MockCommandList::new()).collect(),
            swapchain: MockSwapchain::new(frames_in_flight, extent, calls.clone()),
            violations: Vec::new(),
            calls,
            live: Arc::new(LiveCounts::default()),
            fail_next_submit: false,
            fail_next_reset: false,
            fail_texture_creation: false,
            submitted_frames: 0,
            abandoned_frames: 0,
            programs_created: 0,
            idle: AtomicBool::new(true),
        }
    }

    /// Device and swapchain violations together
    pub fn all_violations(&self) -> Vec<String> {
        self.violations.iter().chain(self.swapchain.violations.iter()).cloned().collect()
    }

    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn compile_stage(code: &[u8], label: &str) -> Result<()> {
        if code.is_empty() {
            return Err(Error::ShaderCompilationFailed(format!("{}: empty stage", label)));
        }
        let text = String::from_utf8_lossy(code);
        if text.contains("syntax error") {
            return Err(Error::ShaderCompilationFailed(format!("{}: syntax error", label)));
        }
        Ok(())
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn frames_in_flight(&self) -> usize {
        self.fences.len()
    }

    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        push(&self.calls, format!("wait {}", slot));
        match self.fences[slot] {
            FenceState::Signaled => Ok(()),
            FenceState::Pending => {
                self.fences[slot] = FenceState::Signaled;
                Ok(())
            }
            FenceState::Unsignaled => {
                self.violations.push(format!("wait on unsignaled fence of slot {} would never return", slot));
                Err(Error::DeviceLost)
            }
        }
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        push(&self.calls, format!("reset {}", slot));
        if self.fail_next_reset {
            self.fail_next_reset = false;
            return Err(Error::BackendError("injected reset failure".to_string()));
        }
        if self.fences[slot] == FenceState::Pending {
            self.violations.push(format!("reset of in-flight fence of slot {}", slot));
        }
        self.fences[slot] = FenceState::Unsignaled;
        let list = &mut self.command_lists[slot];
        list.commands.clear();
        list.recording = false;
        Ok(())
    }

    fn command_list(&mut self, slot: usize, image_index: u32) -> &mut dyn CommandList {
        let list = &mut self.command_lists[slot];
        list.image_index = image_index;
        list
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> Result<()> {
        push(&self.calls, format!("submit {} {}", slot, image_index));
        if self.fail_next_submit {
            self.fail_next_submit = false;
            return Err(Error::SubmitFailed("injected submit failure".to_string()));
        }
        if self.fences[slot] != FenceState::Unsignaled {
            self.violations.push(format!("submit on slot {} without fence reset", slot));
        }
        if !self.swapchain.image_available[slot] {
            self.violations.push(format!("submit on slot {} without an acquired image", slot));
        }
        self.swapchain.image_available[slot] = false;
        self.swapchain.render_finished[image_index as usize] = true;
        self.fences[slot] = FenceState::Pending;
        self.submitted_frames += 1;
        self.idle.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn abandon_frame(&mut self, slot: usize) -> Result<()> {
        push(&self.calls, format!("abandon {}", slot));
        if self.fences[slot] == FenceState::Pending {
            self.violations.push(format!("abandon on in-flight slot {}", slot));
        }
        if !self.swapchain.image_available[slot] {
            self.violations.push(format!("abandon on slot {} without an acquired image", slot));
        }
        self.swapchain.image_available[slot] = false;
        self.fences[slot] = FenceState::Pending;
        self.abandoned_frames += 1;
        self.idle.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn swapchain(&mut self) -> &mut dyn Swapchain {
        &mut self.swapchain
    }

    fn swapchain_ref(&self) -> &dyn Swapchain {
        &self.swapchain
    }

    fn wait_idle(&self) -> Result<()> {
        push(&self.calls, "wait_idle");
        self.idle.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn create_buffer(&mut self, desc: BufferDesc, data: &[u8]) -> Result<Arc<dyn Buffer>> {
        if desc.size == 0 || data.len() as u64 > desc.size {
            return Err(Error::InvalidResource(format!("bad buffer size {} for {} bytes", desc.size, data.len())));
        }
        let mut contents = vec![0u8; desc.size as usize];
        contents[..data.len()].copy_from_slice(data);
        self.live.buffers.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockBuffer {
            size: desc.size,
            usage: desc.usage,
            data: Mutex::new(contents),
            live: self.live.clone(),
        }))
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        if self.fail_texture_creation {
            return Err(Error::OutOfMemory);
        }
        desc.validate()?;
        self.live.textures.fetch_add(1, Ordering::SeqCst);
        let mut first_pixel = [0u8; 4];
        first_pixel.copy_from_slice(&desc.data[..4]);
        Ok(Arc::new(MockTexture {
            info: TextureInfo { width: desc.width, height: desc.height, format: desc.format },
            label: desc.label,
            first_pixel,
            live: self.live.clone(),
        }))
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<Arc<dyn Program>> {
        let stages = desc.stage_flags();
        if !stages.contains(ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT) {
            return Err(Error::ShaderCompilationFailed(format!(
                "{}: vertex and fragment stages are required",
                desc.label
            )));
        }
        for stage in &desc.stages {
            Self::compile_stage(&stage.code, &desc.label)?;
        }
        let vertex_code = desc
            .stages
            .iter()
            .find(|s| s.stage.flag() == ShaderStageFlags::VERTEX)
            .map(|s| s.code.clone())
            .unwrap_or_default();
        self.live.programs.fetch_add(1, Ordering::SeqCst);
        self.programs_created += 1;
        Ok(Arc::new(MockProgram {
            label: desc.label.clone(),
            stages,
            vertex_code,
            uniforms: Mutex::new(FxHashMap::default()),
            live: self.live.clone(),
        }))
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
