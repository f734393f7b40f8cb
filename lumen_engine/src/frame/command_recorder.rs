/// Command recording for one frame slot
///
/// Records the whole frame into a slot's command list: one render pass
/// cleared to the current clear color, the active program in fill or line
/// mode, and one indexed draw per queued mesh. Any failure aborts the frame
/// with `Error::RecordingFailed`.

use std::sync::Arc;
use glam::Mat4;
use crate::engine_warn;
use crate::error::{Error, Result};
use crate::graphics_device::{
    ClearValue, CommandList, Extent2D, IndexType, PolygonMode, Rect2D, Texture, Viewport,
};
use crate::resource::{DrawConstants, MeshId, MeshTexture, ProgramId, ResourceManager};

/// A mesh queued for drawing this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub mesh: MeshId,
    pub transform: Mat4,
}

/// Everything the recorder needs for one frame
pub struct FrameContext<'a> {
    pub resources: &'a ResourceManager,
    pub draws: &'a [DrawCommand],
    pub extent: Extent2D,
    pub clear_color: [f32; 4],
    pub program: Option<ProgramId>,
    pub polygon_mode: PolygonMode,
    pub view_projection: Mat4,
}

/// Counters of a recorded frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStats {
    pub draws: usize,
    /// Draws dropped because their mesh was freed after queuing
    pub skipped: usize,
    pub triangles: u64,
}

/// Record a frame into `cmd`
pub fn record(cmd: &mut dyn CommandList, ctx: &FrameContext) -> Result<RecordStats> {
    record_frame(cmd, ctx).map_err(|e| match e {
        Error::RecordingFailed(_) => e,
        other => Error::RecordingFailed(other.to_string()),
    })
}

fn record_frame(cmd: &mut dyn CommandList, ctx: &FrameContext) -> Result<RecordStats> {
    let mut stats = RecordStats::default();

    cmd.begin()?;
    cmd.begin_render_pass(&[
        ClearValue::Color(ctx.clear_color),
        ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
    ])?;
    cmd.set_viewport(Viewport {
        x: 0.0,
        y: 0.0,
        width: ctx.extent.width as f32,
        height: ctx.extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    })?;
    cmd.set_scissor(Rect2D { x: 0, y: 0, width: ctx.extent.width, height: ctx.extent.height })?;

    let program = ctx.program.and_then(|id| ctx.resources.program(id));
    if let Some(program) = program {
        cmd.bind_program(program.gpu(), ctx.polygon_mode)?;

        for draw in ctx.draws {
            let Ok(mesh) = ctx.resources.mesh(draw.mesh) else {
                engine_warn!("lumen::frame", "Skipping draw of freed mesh {:?}", draw.mesh);
                stats.skipped += 1;
                continue;
            };

            let diffuse = resolve_texture(ctx.resources, mesh.diffuse());
            let specular = resolve_texture(ctx.resources, mesh.specular());
            if let (Some(diffuse), Some(specular)) = (diffuse, specular) {
                cmd.bind_textures(diffuse, specular)?;
            }

            let constants = DrawConstants { model: draw.transform, view_projection: ctx.view_projection };
            cmd.push_constants(0, bytemuck::bytes_of(&constants))?;
            cmd.bind_vertex_buffer(mesh.vertex_buffer(), 0)?;
            cmd.bind_index_buffer(mesh.index_buffer(), 0, IndexType::U32)?;
            cmd.draw_indexed(mesh.index_count(), 0, 0)?;

            stats.draws += 1;
            stats.triangles += mesh.triangle_count() as u64;
        }
    } else if !ctx.draws.is_empty() {
        engine_warn!("lumen::frame", "No active program, {} draw(s) dropped", ctx.draws.len());
        stats.skipped = ctx.draws.len();
    }

    cmd.end_render_pass()?;
    cmd.end()?;
    Ok(stats)
}

/// Mesh texture, else the placeholder
fn resolve_texture<'a>(resources: &'a ResourceManager, texture: Option<MeshTexture>) -> Option<&'a Arc<dyn Texture>> {
    texture
        .and_then(|t| resources.texture(t.texture))
        .or_else(|| resources.placeholder().and_then(|p| resources.texture(p)))
        .map(|entry| entry.gpu())
}

#[cfg(test)]
#[path = "command_recorder_tests.rs"]
mod tests;
