use std::fmt;
use std::io;

/// Crate-wide error type. Variants carry just enough context to tell
/// which device object was being created or used when the call failed;
/// the backend's own error values are not kept since most of them are
/// unrecoverable anyway.
#[derive(Debug)]
pub enum Error {
    InstanceCreationError,
    SurfaceCreationError,
    QueueGroupError(QueueGroupError),
    DeviceNotFoundError(usize),
    SwapchainError(SwapchainError),
    CommandPoolCreationError,
    FenceCreationError,
    SemaphoreCreationError,
    RenderPassCreationError,
    ImageViewCreationError,
    FramebufferCreationError,
    FenceError(FenceOp),
    SubmissionError,
    BufferError(BufferOp, BufferKind),
    MemoryError(MemoryError, MemoryKind),
    MeshError(MeshError),
    ShaderCreation(ShaderKind),
    DescriptorSetLayoutCreation,
    PipelineLayoutCreation,
    PipelineCreation,
    MissingPipeline(usize),
    MissingMesh,
    IOError(io::Error),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QueueGroupError {
    QueueGroupNotFound,
    OwnershipFailed,
    NoCommandQueues,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SwapchainError {
    NoPresentMode,
    NoSurfaceFormat,
    CreationError,
    AcquireError,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FenceOp {
    Acquire,
    Wait,
    Reset,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferOp {
    Create,
    Bind,
    Upload,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryError {
    NoSupportedMemory,
    AllocationError,
    MappingError,
    FlushError,
    /// A write would run past the end of the allocation.
    OutOfBounds,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryKind {
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// An index referred past the end of the vertex list.
    IndexOutOfBounds(u32),
    /// The index list length is not a multiple of three.
    PartialTriangle(usize),
    NoVertices,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;

        match self {
            InstanceCreationError => write!(f, "failed to create backend instance"),
            SurfaceCreationError => write!(f, "failed to create window surface"),
            QueueGroupError(e) => write!(f, "queue group error: {:?}", e),
            DeviceNotFoundError(i) => write!(f, "no device at index {}", i),
            SwapchainError(e) => write!(f, "swapchain error: {:?}", e),
            CommandPoolCreationError => write!(f, "failed to create command pool"),
            FenceCreationError => write!(f, "failed to create fence"),
            SemaphoreCreationError => write!(f, "failed to create semaphore"),
            RenderPassCreationError => write!(f, "failed to create render pass"),
            ImageViewCreationError => write!(f, "failed to create image view"),
            FramebufferCreationError => write!(f, "failed to create framebuffer"),
            FenceError(op) => write!(f, "fence operation failed: {:?}", op),
            SubmissionError => write!(f, "failed to submit or present a frame"),
            BufferError(op, kind) => write!(f, "{:?} buffer error during {:?}", kind, op),
            MemoryError(e, kind) => write!(f, "{:?} memory error: {:?}", kind, e),
            MeshError(e) => write!(f, "invalid mesh: {:?}", e),
            ShaderCreation(kind) => write!(f, "failed to create {:?} shader module", kind),
            DescriptorSetLayoutCreation => write!(f, "failed to create descriptor set layout"),
            PipelineLayoutCreation => write!(f, "failed to create pipeline layout"),
            PipelineCreation => write!(f, "failed to create graphics pipeline"),
            MissingPipeline(i) => write!(f, "no graphics pipeline at index {}", i),
            MissingMesh => write!(f, "no mesh has been uploaded"),
            IOError(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IOError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IOError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_buffer_kind_and_op() {
        let msg = Error::BufferError(BufferOp::Bind, BufferKind::Index).to_string();
        assert!(msg.contains("Index"));
        assert!(msg.contains("Bind"));
    }

    #[test]
    fn io_errors_keep_their_source() {
        use std::error::Error as _;

        let e = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(e.source().is_some());
    }
}
