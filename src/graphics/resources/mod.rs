use std::mem::ManuallyDrop;
use std::rc::Rc;

use gfx_hal::{adapter::Adapter, device::Device, Backend};

use crate::error::Error;
use crate::mesh::Mesh;

pub mod buffer;
pub mod mesh_buffer;

/// Everything the device holds on behalf of the application. For this
/// crate that is exactly one uploaded mesh.
#[derive(Debug)]
pub struct ResourceManager<B: Backend, D: Device<B>> {
    pub mesh_buffer: mesh_buffer::MeshBuffer<B, D>,
}

impl<B: Backend, D: Device<B>> ResourceManager<B, D> {
    pub fn new(
        device: Rc<ManuallyDrop<D>>,
        adapter: &Adapter<B>,
        mesh: &Mesh,
    ) -> Result<Self, Error> {
        Ok(Self {
            mesh_buffer: mesh_buffer::MeshBuffer::new(device, adapter, mesh)?,
        })
    }
}
