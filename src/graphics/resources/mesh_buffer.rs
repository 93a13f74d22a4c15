use std::mem::ManuallyDrop;
use std::rc::Rc;

use gfx_hal::{
    adapter::Adapter,
    buffer::Usage as BufferUsage,
    device::Device,
    memory::Properties,
    Backend,
};

use log::debug;

use crate::error::{BufferKind, Error, MemoryKind};
use crate::mesh::Mesh;

use super::buffer::{Buffer, Memory};

/// The uploaded form of a [`Mesh`]: one vertex buffer and one index
/// buffer, each bound to its own CPU-visible allocation and filled once
/// at creation. The demo's geometry is static, so there is no staging
/// copy and no update path.
#[derive(Debug)]
pub struct MeshBuffer<B: Backend, D: Device<B>> {
    // buffers before memories: buffers must be destroyed while their
    // backing allocations are still alive
    pub vertex_buffer: Buffer<B, D>,
    pub index_buffer: Buffer<B, D>,
    pub vertex_memory: Memory<B, D>,
    pub index_memory: Memory<B, D>,
    pub index_count: u32,
}

impl<B: Backend, D: Device<B>> MeshBuffer<B, D> {
    pub fn new(
        device: Rc<ManuallyDrop<D>>,
        adapter: &Adapter<B>,
        mesh: &Mesh,
    ) -> Result<Self, Error> {
        let mut vertex_buffer = Buffer::new(
            device.clone(),
            mesh.vertex_buffer_size(),
            BufferUsage::VERTEX,
            BufferKind::Vertex,
        )?;
        let mut index_buffer = Buffer::new(
            device.clone(),
            mesh.index_buffer_size(),
            BufferUsage::INDEX,
            BufferKind::Index,
        )?;

        let vertex_memory = Memory::new(
            device.clone(),
            adapter,
            Properties::CPU_VISIBLE,
            vertex_buffer.requirements(),
            MemoryKind::Vertex,
        )?;
        let index_memory = Memory::new(
            device,
            adapter,
            Properties::CPU_VISIBLE,
            index_buffer.requirements(),
            MemoryKind::Index,
        )?;

        vertex_buffer.bind_to_memory(&vertex_memory, 0)?;
        index_buffer.bind_to_memory(&index_memory, 0)?;

        vertex_memory.write_bytes(0, mesh.vertex_bytes())?;
        index_memory.write_bytes(0, mesh.index_bytes())?;

        debug!(
            target: "trigon",
            "uploaded mesh: {} vertices, {} indices",
            mesh.vertices().len(),
            mesh.index_count(),
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_memory,
            index_memory,
            index_count: mesh.index_count(),
        })
    }
}
