/// Central resource manager for the engine.
///
/// Owns the mesh, texture, program and model tables. Tables are generational
/// arenas keyed by id; files are additionally indexed by canonical path so a
/// repeated load returns the existing entry and bumps its reference count.
///
/// GPU work goes through the `GraphicsDevice` passed to each operation. The
/// manager is only touched from the rendering thread.

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferDesc, BufferUsage, GraphicsDevice, Program as GpuProgram, ProgramDesc, ShaderSource, TextureDesc, TextureFormat,
    UniformValue,
};
use crate::resource::{
    placeholder_texture_desc, AssetLoader, AssetSource, Bounds, DefaultAssetLoader,
    DeferredReleaseQueue, FsAssetSource, Mesh, MeshData, MeshDesc, MeshTexture, Model, ReleasedObject,
    ShaderProgram, ShaderProgramDesc, ShaderStagePath, ShaderWatcher, TextureEntry, TextureOwnership,
};
use crate::{engine_debug, engine_error, engine_info, engine_warn};

new_key_type! {
    /// Mesh handle
    pub struct MeshId;
    /// Texture handle
    pub struct TextureId;
    /// Shader program handle
    pub struct ProgramId;
    /// Model handle
    pub struct ModelId;
}

/// Live entries per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    pub meshes: usize,
    pub textures: usize,
    pub programs: usize,
    pub models: usize,
    /// GPU objects waiting for their frames to retire
    pub pending_releases: usize,
}

/// Outcome of draining the hot-reload channel
#[derive(Debug, Default, PartialEq)]
pub struct HotReloadReport {
    pub reloaded: Vec<ProgramId>,
    pub failed: Vec<(ProgramId, Error)>,
}

impl HotReloadReport {
    pub fn is_empty(&self) -> bool {
        self.reloaded.is_empty() && self.failed.is_empty()
    }
}

pub struct ResourceManager {
    source: Box<dyn AssetSource>,
    loader: Box<dyn AssetLoader>,

    meshes: SlotMap<MeshId, Mesh>,
    textures: SlotMap<TextureId, TextureEntry>,
    programs: SlotMap<ProgramId, ShaderProgram>,
    models: SlotMap<ModelId, Model>,

    mesh_paths: FxHashMap<PathBuf, MeshId>,
    texture_paths: FxHashMap<PathBuf, TextureId>,
    model_paths: FxHashMap<PathBuf, ModelId>,

    placeholder: Option<TextureId>,

    /// Watched source path -> programs built from it
    watched: FxHashMap<PathBuf, Vec<ProgramId>>,
    watcher: Option<ShaderWatcher>,
    reload_tx: mpsc::Sender<PathBuf>,
    reload_rx: mpsc::Receiver<PathBuf>,

    deferred: DeferredReleaseQueue,
    frame_serial: u64,
    frames_in_flight: u64,
}

impl ResourceManager {
    /// Create a manager reading through `source` and decoding with `loader`
    pub fn new(source: Box<dyn AssetSource>, loader: Box<dyn AssetLoader>, frames_in_flight: usize) -> Self {
        let (reload_tx, reload_rx) = mpsc::channel();
        Self {
            source,
            loader,
            meshes: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            models: SlotMap::with_key(),
            mesh_paths: FxHashMap::default(),
            texture_paths: FxHashMap::default(),
            model_paths: FxHashMap::default(),
            placeholder: None,
            watched: FxHashMap::default(),
            watcher: None,
            reload_tx,
            reload_rx,
            deferred: DeferredReleaseQueue::new(),
            frame_serial: 0,
            frames_in_flight: frames_in_flight as u64,
        }
    }

    /// Filesystem source and `image`/`tobj` decoding
    pub fn with_defaults(frames_in_flight: usize) -> Self {
        Self::new(Box::new(FsAssetSource::new()), Box::new(DefaultAssetLoader), frames_in_flight)
    }

    // ===== LIFECYCLE =====

    /// Create the missing-texture placeholder
    pub fn init_placeholder(&mut self, device: &mut dyn GraphicsDevice) -> Result<TextureId> {
        if let Some(id) = self.placeholder {
            return Ok(id);
        }
        let gpu = device.create_texture(placeholder_texture_desc())?;
        let id = self.textures.insert(TextureEntry { gpu, path: None, in_use: 1 });
        self.placeholder = Some(id);
        Ok(id)
    }

    pub fn placeholder(&self) -> Option<TextureId> {
        self.placeholder
    }

    /// Start the filesystem watcher and watch every hot-reloadable source
    pub fn enable_hot_reload(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }
        let mut watcher = ShaderWatcher::new(self.reload_tx.clone())?;
        for path in self.watched.keys() {
            if let Err(e) = watcher.watch(path) {
                engine_warn!("lumen::resource", "{}", e);
            }
        }
        self.watcher = Some(watcher);
        engine_info!("lumen::resource", "Shader hot-reload enabled");
        Ok(())
    }

    pub fn hot_reload_enabled(&self) -> bool {
        self.watcher.is_some()
    }

    /// Sender feeding the hot-reload channel
    ///
    /// The filesystem watcher uses it; tools may push paths directly.
    pub fn reload_sender(&self) -> mpsc::Sender<PathBuf> {
        self.reload_tx.clone()
    }

    /// Advance to a new frame serial and destroy released objects whose
    /// frames have all retired
    pub fn retire_frames(&mut self, frame_serial: u64) -> usize {
        self.frame_serial = frame_serial;
        let released = self.deferred.collect(frame_serial, self.frames_in_flight);
        if released > 0 {
            engine_debug!("lumen::resource", "Destroyed {} released GPU object(s)", released);
        }
        released
    }

    /// Drop every resource; the device must be idle
    pub fn release_all(&mut self) {
        let stats = self.stats();
        self.models.clear();
        self.meshes.clear();
        self.programs.clear();
        self.textures.clear();
        self.mesh_paths.clear();
        self.texture_paths.clear();
        self.model_paths.clear();
        self.watched.clear();
        self.watcher = None;
        self.placeholder = None;
        self.deferred.flush();
        engine_debug!(
            "lumen::resource",
            "Released {} mesh(es), {} texture(s), {} program(s), {} model(s)",
            stats.meshes, stats.textures, stats.programs, stats.models
        );
    }

    pub fn stats(&self) -> ResourceStats {
        ResourceStats {
            meshes: self.meshes.len(),
            textures: self.textures.len(),
            programs: self.programs.len(),
            models: self.models.len(),
            pending_releases: self.deferred.len(),
        }
    }

    fn canonical(&self, path: &Path) -> Option<PathBuf> {
        self.source.canonicalize(path).ok()
    }

    // ===== TEXTURES =====

    /// Load a texture file, or return the existing entry for the same file
    ///
    /// Missing or undecodable files yield the placeholder texture.
    pub fn load_texture(&mut self, device: &mut dyn GraphicsDevice, path: &Path) -> Result<TextureId> {
        let Some(canonical) = self.canonical(path) else {
            engine_warn!("lumen::resource", "Texture {} not found, using placeholder", path.display());
            return self.init_placeholder(device);
        };

        if let Some(&id) = self.texture_paths.get(&canonical) {
            if let Some(entry) = self.textures.get_mut(id) {
                entry.in_use += 1;
                return Ok(id);
            }
        }

        let image = match self
            .source
            .read(&canonical)
            .and_then(|bytes| self.loader.decode_image(&bytes, &canonical.to_string_lossy()))
        {
            Ok(image) => image,
            Err(e) => {
                engine_warn!("lumen::resource", "Texture {} unreadable ({}), using placeholder", path.display(), e);
                return self.init_placeholder(device);
            }
        };

        let gpu = device.create_texture(TextureDesc {
            label: canonical.to_string_lossy().into_owned(),
            width: image.width,
            height: image.height,
            format: TextureFormat::R8G8B8A8_SRGB,
            data: image.pixels,
        })?;

        let id = self.textures.insert(TextureEntry { gpu, path: Some(canonical.clone()), in_use: 1 });
        self.texture_paths.insert(canonical, id);
        Ok(id)
    }

    /// Create a texture from pixel data (not path-indexed)
    pub fn create_texture(&mut self, device: &mut dyn GraphicsDevice, desc: TextureDesc) -> Result<TextureId> {
        let gpu = device.create_texture(desc)?;
        Ok(self.textures.insert(TextureEntry { gpu, path: None, in_use: 1 }))
    }

    /// Drop one reference to the texture loaded from `path`
    ///
    /// Returns `true` when the GPU texture was released.
    pub fn free_texture(&mut self, path: &Path) -> Result<bool> {
        let id = self
            .canonical(path)
            .and_then(|canonical| self.texture_paths.get(&canonical).copied())
            .ok_or_else(|| Error::ResourceNotFound(format!("texture {}", path.display())))?;
        self.free_texture_id(id)
    }

    /// Drop one reference to a texture; the placeholder is never released
    pub fn free_texture_id(&mut self, id: TextureId) -> Result<bool> {
        if Some(id) == self.placeholder {
            return Ok(false);
        }
        let entry = self
            .textures
            .get_mut(id)
            .ok_or_else(|| Error::ResourceNotFound(format!("{:?}", id)))?;
        entry.in_use = entry.in_use.saturating_sub(1);
        if entry.in_use > 0 {
            return Ok(false);
        }

        if let Some(entry) = self.textures.remove(id) {
            if let Some(path) = &entry.path {
                self.texture_paths.remove(path);
            }
            self.deferred.push(self.frame_serial, ReleasedObject::Texture(entry.gpu));
        }
        Ok(true)
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureEntry> {
        self.textures.get(id)
    }

    pub fn texture_by_path(&self, path: &Path) -> Option<TextureId> {
        self.canonical(path).and_then(|c| self.texture_paths.get(&c).copied())
    }

    // ===== MESHES =====

    /// Upload a mesh
    ///
    /// Texture references are taken over as given: an owned reference is
    /// released with the mesh, a shared one is left alone.
    pub fn create_mesh(&mut self, device: &mut dyn GraphicsDevice, desc: MeshDesc) -> Result<MeshId> {
        self.create_mesh_at(device, desc, None)
    }

    fn create_mesh_at(&mut self, device: &mut dyn GraphicsDevice, desc: MeshDesc, path: Option<PathBuf>) -> Result<MeshId> {
        desc.validate()?;
        for texture in [desc.diffuse, desc.specular].into_iter().flatten() {
            if !self.textures.contains_key(texture.texture) {
                return Err(Error::ResourceNotFound(format!("{:?} referenced by mesh '{}'", texture.texture, desc.label)));
            }
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&desc.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&desc.indices);
        let vertex_buffer = device.create_buffer(
            BufferDesc { size: vertex_bytes.len() as u64, usage: BufferUsage::Vertex },
            vertex_bytes,
        )?;
        let index_buffer = device.create_buffer(
            BufferDesc { size: index_bytes.len() as u64, usage: BufferUsage::Index },
            index_bytes,
        )?;

        let id = self.meshes.insert(Mesh {
            bounds: Bounds::from_vertices(&desc.vertices),
            label: desc.label,
            path: path.clone(),
            vertex_buffer,
            index_buffer,
            vertex_count: desc.vertices.len() as u32,
            index_count: desc.indices.len() as u32,
            diffuse: desc.diffuse,
            specular: desc.specular,
            in_use: 1,
        });
        if let Some(path) = path {
            self.mesh_paths.insert(path, id);
        }
        Ok(id)
    }

    /// Load a mesh file (all shapes merged), or return the existing entry
    pub fn load_mesh(&mut self, device: &mut dyn GraphicsDevice, path: &Path) -> Result<MeshId> {
        let canonical = self
            .canonical(path)
            .ok_or_else(|| Error::MeshNotFound(path.display().to_string()))?;

        if let Some(&id) = self.mesh_paths.get(&canonical) {
            if let Some(mesh) = self.meshes.get_mut(id) {
                mesh.in_use += 1;
                return Ok(id);
            }
        }

        let bytes = self
            .source
            .read(&canonical)
            .map_err(|e| Error::MeshNotFound(format!("{}: {}", path.display(), e)))?;
        let data = self
            .loader
            .parse_model(&bytes, &canonical, self.source.as_ref())
            .map_err(|e| Error::MeshNotFound(e.to_string()))?;

        let mut merged = MeshDesc { label: canonical.to_string_lossy().into_owned(), ..MeshDesc::default() };
        let mut diffuse_path = None;
        let mut specular_path = None;
        for mesh in data.meshes {
            let base = merged.vertices.len() as u32;
            merged.vertices.extend(mesh.vertices);
            merged.indices.extend(mesh.indices.iter().map(|i| i + base));
            diffuse_path = diffuse_path.or(mesh.diffuse_texture);
            specular_path = specular_path.or(mesh.specular_texture);
        }

        let dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
        merged.diffuse = self.load_owned_texture(device, &dir, diffuse_path)?;
        merged.specular = self.load_owned_texture(device, &dir, specular_path)?;
        self.create_mesh_at(device, merged, Some(canonical))
    }

    fn load_owned_texture(
        &mut self,
        device: &mut dyn GraphicsDevice,
        dir: &Path,
        relative: Option<PathBuf>,
    ) -> Result<Option<MeshTexture>> {
        let Some(relative) = relative else {
            return Ok(None);
        };
        let id = self.load_texture(device, &dir.join(relative))?;
        Ok(Some(MeshTexture::owned(id)))
    }

    /// Drop one reference to the mesh loaded from `path`
    pub fn free_mesh(&mut self, path: &Path) -> Result<bool> {
        let id = self
            .canonical(path)
            .and_then(|canonical| self.mesh_paths.get(&canonical).copied())
            .ok_or_else(|| Error::MeshNotFound(path.display().to_string()))?;
        self.free_mesh_id(id)
    }

    /// Drop one reference to a mesh
    ///
    /// Returns `true` when the mesh and its owned textures were released.
    pub fn free_mesh_id(&mut self, id: MeshId) -> Result<bool> {
        let mesh = self
            .meshes
            .get_mut(id)
            .ok_or_else(|| Error::MeshNotFound(format!("{:?}", id)))?;
        mesh.in_use = mesh.in_use.saturating_sub(1);
        if mesh.in_use > 0 {
            return Ok(false);
        }

        if let Some(mesh) = self.meshes.remove(id) {
            if let Some(path) = &mesh.path {
                self.mesh_paths.remove(path);
            }
            for texture in [mesh.diffuse, mesh.specular].into_iter().flatten() {
                if texture.ownership == TextureOwnership::Owned {
                    if let Err(e) = self.free_texture_id(texture.texture) {
                        engine_warn!("lumen::resource", "Owned texture of mesh '{}': {}", mesh.label, e);
                    }
                }
            }
            self.deferred.push(self.frame_serial, ReleasedObject::Buffer(mesh.vertex_buffer));
            self.deferred.push(self.frame_serial, ReleasedObject::Buffer(mesh.index_buffer));
        }
        Ok(true)
    }

    /// Look up a mesh
    pub fn mesh(&self, id: MeshId) -> Result<&Mesh> {
        self.meshes.get(id).ok_or_else(|| Error::MeshNotFound(format!("{:?}", id)))
    }

    pub fn contains_mesh(&self, id: MeshId) -> bool {
        self.meshes.contains_key(id)
    }

    // ===== MODELS =====

    /// Load a model, or return the existing entry for the same file
    ///
    /// Unlike textures there is no placeholder: a missing or unparsable file
    /// is `Error::ModelNotFound`.
    pub fn load_model(&mut self, device: &mut dyn GraphicsDevice, path: &Path) -> Result<ModelId> {
        let canonical = self
            .canonical(path)
            .ok_or_else(|| Error::ModelNotFound(path.display().to_string()))?;

        if let Some(&id) = self.model_paths.get(&canonical) {
            if let Some(model) = self.models.get_mut(id) {
                model.in_use += 1;
                return Ok(id);
            }
        }

        let bytes = self
            .source
            .read(&canonical)
            .map_err(|e| Error::ModelNotFound(format!("{}: {}", path.display(), e)))?;
        let data = self.loader.parse_model(&bytes, &canonical, self.source.as_ref())?;
        if data.meshes.is_empty() {
            return Err(Error::ModelNotFound(format!("{}: no meshes", path.display())));
        }

        let dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut meshes = Vec::with_capacity(data.meshes.len());
        for mesh in data.meshes {
            let result = self.create_model_mesh(device, &dir, mesh);
            match result {
                Ok(id) => meshes.push(id),
                Err(e) => {
                    for id in meshes {
                        let _ = self.free_mesh_id(id);
                    }
                    engine_error!("lumen::resource", "Model {} failed to load: {}", path.display(), e);
                    return Err(e);
                }
            }
        }

        let name = canonical
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        engine_info!("lumen::resource", "Loaded model '{}' ({} mesh(es))", name, meshes.len());
        let id = self.models.insert(Model { name, path: canonical.clone(), meshes, in_use: 1 });
        self.model_paths.insert(canonical, id);
        Ok(id)
    }

    fn create_model_mesh(&mut self, device: &mut dyn GraphicsDevice, dir: &Path, mesh: MeshData) -> Result<MeshId> {
        let diffuse = self.load_owned_texture(device, dir, mesh.diffuse_texture)?;
        let specular = match self.load_owned_texture(device, dir, mesh.specular_texture) {
            Ok(specular) => specular,
            Err(e) => {
                if let Some(diffuse) = diffuse {
                    let _ = self.free_texture_id(diffuse.texture);
                }
                return Err(e);
            }
        };
        let created = self.create_mesh(device, MeshDesc {
            label: mesh.name,
            vertices: mesh.vertices,
            indices: mesh.indices,
            diffuse,
            specular,
        });
        if created.is_err() {
            for texture in [diffuse, specular].into_iter().flatten() {
                let _ = self.free_texture_id(texture.texture);
            }
        }
        created
    }

    /// Drop one reference to the model loaded from `path`
    ///
    /// At zero the model's meshes are released.
    pub fn free_model(&mut self, path: &Path) -> Result<bool> {
        let id = self
            .canonical(path)
            .and_then(|canonical| self.model_paths.get(&canonical).copied())
            .ok_or_else(|| Error::ModelNotFound(path.display().to_string()))?;
        self.free_model_id(id)
    }

    pub fn free_model_id(&mut self, id: ModelId) -> Result<bool> {
        let model = self
            .models
            .get_mut(id)
            .ok_or_else(|| Error::ModelNotFound(format!("{:?}", id)))?;
        model.in_use = model.in_use.saturating_sub(1);
        if model.in_use > 0 {
            return Ok(false);
        }
        if let Some(model) = self.models.remove(id) {
            self.model_paths.remove(&model.path);
            // Meshes freed through their own id are already gone
            for mesh in model.meshes {
                if let Err(e) = self.free_mesh_id(mesh) {
                    engine_warn!("lumen::resource", "Mesh of model '{}': {}", model.name, e);
                }
            }
        }
        Ok(true)
    }

    pub fn model(&self, id: ModelId) -> Option<&Model> {
        self.models.get(id)
    }

    // ===== PROGRAMS =====

    fn build_program(&mut self, device: &mut dyn GraphicsDevice, label: &str, stages: &[ShaderStagePath]) -> Result<Arc<dyn GpuProgram>> {
        let mut sources = Vec::with_capacity(stages.len());
        for stage in stages {
            let code = self.source.read(&stage.path).map_err(|e| {
                Error::ShaderCompilationFailed(format!("{}: cannot read {}: {}", label, stage.path.display(), e))
            })?;
            sources.push(ShaderSource { stage: stage.stage, code, entry_point: "main".to_string() });
        }
        device.create_program(&ProgramDesc { label: label.to_string(), stages: sources })
    }

    /// Compile a program from source files
    pub fn create_program(&mut self, device: &mut dyn GraphicsDevice, desc: ShaderProgramDesc) -> Result<ProgramId> {
        let mut stages = Vec::with_capacity(desc.stages.len());
        for stage in &desc.stages {
            let path = self.source.canonicalize(&stage.path).map_err(|_| {
                Error::ShaderCompilationFailed(format!("{}: {} not found", desc.label, stage.path.display()))
            })?;
            stages.push(ShaderStagePath { stage: stage.stage, path });
        }

        let gpu = self.build_program(device, &desc.label, &stages).map_err(|e| {
            engine_error!("lumen::resource", "Program '{}' failed to build: {}", desc.label, e);
            e
        })?;

        let id = self.programs.insert(ShaderProgram {
            label: desc.label,
            stages: stages.clone(),
            gpu,
            uniforms: FxHashMap::default(),
            generation: 0,
            hot_reload: desc.hot_reload,
        });

        if desc.hot_reload {
            for stage in stages {
                let programs = self.watched.entry(stage.path.clone()).or_default();
                if programs.is_empty() {
                    if let Some(watcher) = self.watcher.as_mut() {
                        if let Err(e) = watcher.watch(&stage.path) {
                            engine_warn!("lumen::resource", "{}", e);
                        }
                    }
                }
                if !programs.contains(&id) {
                    programs.push(id);
                }
            }
        }
        Ok(id)
    }

    /// Write a uniform and remember it for rebuilds
    pub fn set_uniform(&mut self, id: ProgramId, name: &str, value: UniformValue) -> Result<()> {
        let program = self
            .programs
            .get_mut(id)
            .ok_or_else(|| Error::ResourceNotFound(format!("{:?}", id)))?;
        program.gpu.set_uniform(name, &value)?;
        program.uniforms.insert(name.to_string(), value);
        Ok(())
    }

    /// Rebuild a program from its sources and replay its uniforms
    ///
    /// On failure the previous program stays in place and the error is
    /// returned.
    pub fn reload_program(&mut self, device: &mut dyn GraphicsDevice, id: ProgramId) -> Result<()> {
        let (label, stages) = {
            let program = self
                .programs
                .get(id)
                .ok_or_else(|| Error::ResourceNotFound(format!("{:?}", id)))?;
            (program.label.clone(), program.stages.clone())
        };

        let gpu = match self.build_program(device, &label, &stages) {
            Ok(gpu) => gpu,
            Err(e) => {
                engine_error!("lumen::resource", "Reload of '{}' failed, keeping previous program: {}", label, e);
                return Err(e);
            }
        };

        let Some(program) = self.programs.get_mut(id) else {
            return Err(Error::ResourceNotFound(format!("{:?}", id)));
        };
        for (name, value) in &program.uniforms {
            if let Err(e) = gpu.set_uniform(name, value) {
                engine_warn!("lumen::resource", "Uniform '{}' not replayed on '{}': {}", name, label, e);
            }
        }
        let old = std::mem::replace(&mut program.gpu, gpu);
        program.generation += 1;
        self.deferred.push(self.frame_serial, ReleasedObject::Program(old));
        engine_info!("lumen::resource", "Reloaded program '{}'", label);
        Ok(())
    }

    /// Rebuild every program whose sources changed since the last poll
    pub fn poll_hot_reload(&mut self, device: &mut dyn GraphicsDevice) -> HotReloadReport {
        let mut pending: Vec<ProgramId> = Vec::new();
        while let Ok(path) = self.reload_rx.try_recv() {
            let key = self.canonical(&path).unwrap_or(path);
            if let Some(programs) = self.watched.get(&key) {
                for id in programs {
                    if !pending.contains(id) {
                        pending.push(*id);
                    }
                }
            }
        }

        let mut report = HotReloadReport::default();
        for id in pending {
            match self.reload_program(device, id) {
                Ok(()) => report.reloaded.push(id),
                Err(e) => report.failed.push((id, e)),
            }
        }
        report
    }

    /// Release a program
    pub fn free_program(&mut self, id: ProgramId) -> Result<()> {
        let program = self
            .programs
            .remove(id)
            .ok_or_else(|| Error::ResourceNotFound(format!("{:?}", id)))?;
        for stage in &program.stages {
            if let Some(programs) = self.watched.get_mut(&stage.path) {
                programs.retain(|p| *p != id);
                if programs.is_empty() {
                    self.watched.remove(&stage.path);
                    if let Some(watcher) = self.watcher.as_mut() {
                        watcher.unwatch(&stage.path);
                    }
                }
            }
        }
        self.deferred.push(self.frame_serial, ReleasedObject::Program(program.gpu));
        Ok(())
    }

    pub fn program(&self, id: ProgramId) -> Option<&ShaderProgram> {
        self.programs.get(id)
    }

    /// Programs rebuilt when `path` changes
    pub fn programs_watching(&self, path: &Path) -> &[ProgramId] {
        self.canonical(path)
            .and_then(|c| self.watched.get(&c))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
#[path = "resource_manager_tests.rs"]
mod tests;
