//! Resource management module
//!
//! Meshes, textures, shader programs and models, with path memoization,
//! reference counting, deferred GPU release and shader hot-reload.

mod resource_manager;
pub mod asset_source;
pub mod asset_loader;
pub mod mesh;
pub mod texture;
pub mod model;
pub mod program;
pub mod release;
pub mod hot_reload;

pub use resource_manager::{
    ResourceManager, ResourceStats, HotReloadReport,
    MeshId, TextureId, ProgramId, ModelId,
};
pub use asset_source::{AssetSource, FsAssetSource};
#[cfg(test)]
pub use asset_source::MemoryAssetSource;
pub use asset_loader::{AssetLoader, DefaultAssetLoader, ImageData, MeshData, ModelData};
pub use mesh::{
    Vertex, DrawConstants, Bounds,
    Mesh, MeshDesc, MeshTexture, TextureOwnership,
};
pub use texture::{TextureEntry, placeholder_texture_desc, PLACEHOLDER_LABEL};
pub use model::Model;
pub use program::{ShaderProgram, ShaderProgramDesc, ShaderStagePath};
pub use release::{DeferredReleaseQueue, ReleasedObject};
pub use hot_reload::ShaderWatcher;
