use gfx_hal::format::Format;
use gfx_hal::pso::{AttributeDesc, Element, VertexBufferDesc, VertexInputRate};

/// Describes how the bytes of one interleaved vertex buffer are read as
/// typed shader inputs. This is the crate's stand-in for what the fixed
/// pipeline would call a vertex array object: it owns the attribute
/// records and hands the pipeline its `VertexBufferDesc`/`AttributeDesc`
/// lists.
///
/// Everything lives on binding 0 at per-vertex rate; the demo has a
/// single vertex buffer and no instancing.
#[derive(Debug, Clone)]
pub struct VertexLayout {
    stride: u32,
    attributes: Vec<AttributeDesc>,
}

impl VertexLayout {
    pub fn new(stride: u32) -> Self {
        Self {
            stride,
            attributes: vec![],
        }
    }

    /// Record one attribute: which shader location reads it, what format
    /// it has, and where inside the vertex its bytes start.
    pub fn with_attribute(mut self, location: u32, format: Format, offset: u32) -> Self {
        self.attributes.push(AttributeDesc {
            location,
            binding: 0,
            element: Element { format, offset },
        });
        self
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn buffer_descs(&self) -> Vec<VertexBufferDesc> {
        vec![VertexBufferDesc {
            binding: 0,
            stride: self.stride,
            rate: VertexInputRate::Vertex,
        }]
    }

    pub fn attribute_descs(&self) -> Vec<AttributeDesc> {
        self.attributes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_interleaved_binding() {
        let layout = VertexLayout::new(24)
            .with_attribute(0, Format::Rgb32Sfloat, 0)
            .with_attribute(1, Format::Rgb32Sfloat, 12);

        let buffers = layout.buffer_descs();
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[0].binding, 0);
        assert_eq!(buffers[0].stride, 24);

        let attrs = layout.attribute_descs();
        assert_eq!(attrs.len(), 2);
        assert!(attrs.iter().all(|a| a.binding == 0));
        assert_eq!(attrs[0].location, 0);
        assert_eq!(attrs[0].element.offset, 0);
        assert_eq!(attrs[1].location, 1);
        assert_eq!(attrs[1].element.offset, 12);
    }

    #[test]
    fn vertex_layout_matches_vertex_type() {
        use crate::mesh::Vertex;

        let layout = Vertex::layout();
        assert_eq!(layout.stride(), Vertex::STRIDE);
        assert_eq!(layout.attribute_count(), 2);
    }
}
