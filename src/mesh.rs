use std::mem;
use std::slice;

use nalgebra::base::Vector3;

use crate::error::{Error, MeshError};
use crate::graphics::vertex_layout::VertexLayout;

use gfx_hal::format::Format;

pub type Vec3 = Vector3<f32>;

/// One interleaved vertex: position followed by color, both three floats.
/// The layout is what the vertex buffer bytes mean on the device, so this
/// must stay `repr(C)` and padding-free.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
}

impl Vertex {
    pub const STRIDE: u32 = mem::size_of::<Vertex>() as u32;
    pub const POSITION_OFFSET: u32 = 0;
    pub const COLOR_OFFSET: u32 = mem::size_of::<Vec3>() as u32;

    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    /// The attribute layout matching this vertex type: position at
    /// location 0, color at location 1, one interleaved binding.
    pub fn layout() -> VertexLayout {
        VertexLayout::new(Self::STRIDE)
            .with_attribute(0, Format::Rgb32Sfloat, Self::POSITION_OFFSET)
            .with_attribute(1, Format::Rgb32Sfloat, Self::COLOR_OFFSET)
    }
}

/// Host-side triangle mesh, ready for upload. Construction checks the
/// only invariants this crate cares about: all indices are in range and
/// the index list forms whole triangles.
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self, Error> {
        if vertices.is_empty() {
            return Err(Error::MeshError(MeshError::NoVertices));
        }
        if indices.len() % 3 != 0 {
            return Err(Error::MeshError(MeshError::PartialTriangle(indices.len())));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(Error::MeshError(MeshError::IndexOutOfBounds(bad)));
        }

        Ok(Self { vertices, indices })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn vertex_buffer_size(&self) -> u64 {
        (self.vertices.len() * mem::size_of::<Vertex>()) as u64
    }

    pub fn index_buffer_size(&self) -> u64 {
        (self.indices.len() * mem::size_of::<u32>()) as u64
    }

    /// The raw bytes the vertex buffer receives. Sound because `Vertex`
    /// is `repr(C)` with no padding.
    pub fn vertex_bytes(&self) -> &[u8] {
        unsafe {
            slice::from_raw_parts(
                self.vertices.as_ptr() as *const u8,
                self.vertices.len() * mem::size_of::<Vertex>(),
            )
        }
    }

    pub fn index_bytes(&self) -> &[u8] {
        unsafe {
            slice::from_raw_parts(
                self.indices.as_ptr() as *const u8,
                self.indices.len() * mem::size_of::<u32>(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, MeshError};

    fn quad_vertices() -> Vec<Vertex> {
        [
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
        ]
        .iter()
        .map(|&(x, y)| Vertex::new(Vec3::new(x, y, 0.0), Vec3::new(1.0, 1.0, 1.0)))
        .collect()
    }

    #[test]
    fn vertex_is_packed() {
        assert_eq!(Vertex::STRIDE, 24);
        assert_eq!(Vertex::POSITION_OFFSET, 0);
        assert_eq!(Vertex::COLOR_OFFSET, 12);
    }

    #[test]
    fn accepts_well_formed_indices() {
        let mesh = Mesh::new(quad_vertices(), vec![0, 1, 2, 2, 3, 0]).unwrap();
        assert_eq!(mesh.index_count(), 6);
        assert_eq!(mesh.vertex_buffer_size(), 4 * 24);
        assert_eq!(mesh.index_buffer_size(), 6 * 4);
    }

    #[test]
    fn rejects_out_of_range_index() {
        match Mesh::new(quad_vertices(), vec![0, 1, 4]) {
            Err(Error::MeshError(MeshError::IndexOutOfBounds(4))) => {}
            other => panic!("expected index error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_partial_triangle() {
        match Mesh::new(quad_vertices(), vec![0, 1, 2, 3]) {
            Err(Error::MeshError(MeshError::PartialTriangle(4))) => {}
            other => panic!("expected partial triangle error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_empty_vertex_list() {
        assert!(matches!(
            Mesh::new(vec![], vec![]),
            Err(Error::MeshError(MeshError::NoVertices))
        ));
    }

    #[test]
    fn byte_views_cover_the_data() {
        let mesh = Mesh::new(quad_vertices(), vec![0, 1, 2]).unwrap();
        assert_eq!(mesh.vertex_bytes().len() as u64, mesh.vertex_buffer_size());
        assert_eq!(mesh.index_bytes().len() as u64, mesh.index_buffer_size());

        // the first index is 0, little-endian
        assert_eq!(&mesh.index_bytes()[0..4], &[0, 0, 0, 0]);
    }
}
