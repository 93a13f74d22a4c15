//! A minimal windowed renderer: upload one static mesh with per-vertex
//! color, compile a vertex/fragment shader pair, and redraw it until the
//! window closes. The backend is chosen at compile time through cargo
//! features (vulkan by default).

#[cfg(feature = "dx12")]
use gfx_backend_dx12 as back;
#[cfg(feature = "metal")]
use gfx_backend_metal as back;
#[cfg(feature = "vulkan")]
use gfx_backend_vulkan as back;

pub mod error;
pub mod graphics;
pub mod mesh;

use error::Error;
use graphics::vertex_layout::VertexLayout;
use graphics::Context;
use mesh::Mesh;

use raw_window_handle::HasRawWindowHandle;

/// The public face of the crate. Owns a [`Context`] on the compiled-in
/// backend; everything device-side is torn down when this drops.
pub struct Renderer {
    context: Context<back::Backend>,
}

impl Renderer {
    /// Create the device context for `window`. The renderer is not able
    /// to draw until a pipeline is installed and a mesh is uploaded.
    pub fn new<W: HasRawWindowHandle>(window: &W, name: &str) -> Result<Self, Error> {
        Ok(Self {
            context: Context::build(window, name)?,
        })
    }

    /// Build the graphics pipeline from a SPIR-V shader pair and the
    /// vertex layout that interprets the vertex buffer.
    pub fn install_pipeline(
        &mut self,
        vertex_layout: &VertexLayout,
        vert_spirv: &[u32],
        frag_spirv: &[u32],
    ) -> Result<(), Error> {
        self.context
            .install_pipeline(vertex_layout, vert_spirv, frag_spirv)
    }

    /// Upload `mesh` into device buffers. Replaces any previous mesh.
    pub fn upload_mesh(&mut self, mesh: &Mesh) -> Result<(), Error> {
        self.context.upload_mesh(mesh)
    }

    /// Present a frame containing only `color`.
    pub fn clear(&mut self, color: [f32; 4]) -> Result<(), Error> {
        self.context.clear(color)
    }

    /// Present a frame: clear to `color`, then draw the uploaded mesh
    /// with the `scale` uniform set for the vertex stage.
    pub fn draw_frame(&mut self, color: [f32; 4], scale: f32) -> Result<(), Error> {
        self.context.draw(color, scale)
    }
}
