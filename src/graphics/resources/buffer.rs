use std::iter;
use std::mem::ManuallyDrop;
use std::ptr;
use std::rc::Rc;

use gfx_hal::{
    adapter::{Adapter, PhysicalDevice},
    buffer::Usage as BufferUsage,
    device::Device,
    memory::{Properties, Requirements, Segment},
    Backend, MemoryTypeId,
};

use crate::error::{BufferKind, BufferOp, Error, MemoryError, MemoryKind};

/// One device memory allocation. Owns the allocation and frees it on
/// drop; host writes go through [`Memory::write_bytes`].
#[derive(Debug)]
pub struct Memory<B: Backend, D: Device<B>> {
    pub device: Rc<ManuallyDrop<D>>,
    pub memory: ManuallyDrop<B::Memory>,
    pub size: u64,
    kind: MemoryKind,
}

impl<B: Backend, D: Device<B>> Memory<B, D> {
    pub fn new(
        device: Rc<ManuallyDrop<D>>,
        adapter: &Adapter<B>,
        properties: Properties,
        reqs: Requirements,
        kind: MemoryKind,
    ) -> Result<Self, Error> {
        unsafe {
            let memory_type_id = adapter
                .physical_device
                .memory_properties()
                .memory_types
                .iter()
                .enumerate()
                .find(|&(id, memory_type)| {
                    reqs.type_mask & (1 << id) != 0 && memory_type.properties.contains(properties)
                })
                .map(|(id, _)| MemoryTypeId(id))
                .ok_or(Error::MemoryError(MemoryError::NoSupportedMemory, kind))?;

            let memory = ManuallyDrop::new(
                device
                    .allocate_memory(memory_type_id, reqs.size)
                    .map_err(|_| Error::MemoryError(MemoryError::AllocationError, kind))?,
            );

            Ok(Memory {
                device,
                memory,
                size: reqs.size,
                kind,
            })
        }
    }

    /// Copy `bytes` into the allocation at `offset`. Maps, copies,
    /// flushes and unmaps in one go; the allocation must have been made
    /// from a `CPU_VISIBLE` memory type.
    pub fn write_bytes(&self, offset: u64, bytes: &[u8]) -> Result<(), Error> {
        if offset + bytes.len() as u64 > self.size {
            return Err(Error::MemoryError(MemoryError::OutOfBounds, self.kind));
        }

        unsafe {
            let mapped = self
                .device
                .map_memory(&self.memory, Segment::ALL)
                .map_err(|_| Error::MemoryError(MemoryError::MappingError, self.kind))?;

            ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.add(offset as usize), bytes.len());

            // flushing is a no-op on coherent memory, required otherwise
            let flushed = self
                .device
                .flush_mapped_memory_ranges(iter::once((&*self.memory, Segment::ALL)));

            self.device.unmap_memory(&self.memory);

            flushed.map_err(|_| Error::MemoryError(MemoryError::FlushError, self.kind))
        }
    }
}

impl<B: Backend, D: Device<B>> Drop for Memory<B, D> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .free_memory(ManuallyDrop::into_inner(ptr::read(&self.memory)));
        }
    }
}

/// One device buffer handle, destroyed on drop. Valid between creation
/// and drop, nothing more; it is only usable for drawing once bound to
/// a [`Memory`].
#[derive(Debug)]
pub struct Buffer<B: Backend, D: Device<B>> {
    pub device: Rc<ManuallyDrop<D>>,
    pub buffer: ManuallyDrop<B::Buffer>,
    kind: BufferKind,
}

impl<B: Backend, D: Device<B>> Buffer<B, D> {
    pub fn new(
        device: Rc<ManuallyDrop<D>>,
        size: u64,
        usage: BufferUsage,
        kind: BufferKind,
    ) -> Result<Self, Error> {
        let buffer = unsafe {
            ManuallyDrop::new(
                device
                    .create_buffer(size, usage)
                    .map_err(|_| Error::BufferError(BufferOp::Create, kind))?,
            )
        };
        Ok(Self {
            device,
            buffer,
            kind,
        })
    }

    pub fn requirements(&self) -> Requirements {
        unsafe { self.device.get_buffer_requirements(&self.buffer) }
    }

    /// Bind this buffer to `mem` at `offset`. Must happen exactly once,
    /// before the buffer is used in a draw.
    pub fn bind_to_memory(&mut self, mem: &Memory<B, D>, offset: u64) -> Result<(), Error> {
        unsafe {
            self.device
                .bind_buffer_memory(&mem.memory, offset, &mut self.buffer)
                .map_err(|_| Error::BufferError(BufferOp::Bind, self.kind))?;
        }
        Ok(())
    }
}

impl<B: Backend, D: Device<B>> Drop for Buffer<B, D> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_buffer(ManuallyDrop::into_inner(ptr::read(&self.buffer)));
        }
    }
}
