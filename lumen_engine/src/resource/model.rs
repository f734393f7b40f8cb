/// Models: named, reference-counted groups of meshes loaded from one file

use std::path::PathBuf;
use crate::resource::MeshId;

pub struct Model {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) meshes: Vec<MeshId>,
    pub(crate) in_use: u32,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical source path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn meshes(&self) -> &[MeshId] {
        &self.meshes
    }

    /// Reference count
    pub fn in_use(&self) -> u32 {
        self.in_use
    }
}
