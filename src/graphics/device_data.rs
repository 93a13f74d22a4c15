use core::mem::ManuallyDrop;

use log::info;

use gfx_hal::{
    adapter::Adapter,
    buffer::{IndexBufferView, SubRange},
    command::{
        ClearColor, ClearValue, CommandBuffer as CommandBufferTrait, CommandBufferFlags, Level,
        SubpassContents,
    },
    device::Device as DeviceTrait,
    format::{Aspects, Swizzle},
    image::{Layout, SubresourceRange, ViewKind},
    pass::{Attachment, AttachmentLoadOp, AttachmentOps, AttachmentStoreOp, SubpassDesc},
    pool::CommandPool as CommandPoolTrait,
    pso::PipelineStage,
    queue::{CommandQueue, QueueGroup, Submission},
    window::Swapchain,
    Backend, IndexType,
};

use super::pipeline_data::PipelineData;
use super::resources::ResourceManager;
use super::swapchain_data::SwapchainData;
use super::vertex_layout::VertexLayout;
use crate::error::*;
use crate::mesh::Mesh;

use arrayvec::ArrayVec;
use std::rc::Rc;

#[derive(Debug)]
pub struct DeviceData<B: Backend> {
    pub adapter_index: usize,
    pub device: Rc<ManuallyDrop<B::Device>>,
    pub queue: QueueGroup<B>,
    pub swapchains: Vec<SwapchainData<B>>,
    pub render_passes: Vec<B::RenderPass>,
    pub pipelines: Vec<PipelineData<B, B::Device>>,
    pub resources: Option<ResourceManager<B, B::Device>>,
}

impl<B: Backend> DeviceData<B> {
    pub fn from(adapter_index: usize, device: B::Device, queue: QueueGroup<B>) -> Self {
        Self {
            adapter_index,
            device: Rc::new(ManuallyDrop::new(device)),
            queue,
            swapchains: vec![],
            render_passes: vec![],
            pipelines: vec![],
            resources: None,
        }
    }

    pub fn add_semaphores(&mut self, swapchain_index: usize) -> Result<(), Error> {
        let image_count = self.swapchains[swapchain_index].config.image_count;
        let device = &self.device;
        self.swapchains[swapchain_index].fences = Some(
            (0..image_count)
                .map(|n| {
                    let mut fence = device
                        .create_fence(true)
                        .map_err(|_| Error::FenceCreationError)?;
                    unsafe {
                        device.set_fence_name(&mut fence, &format!("fence #{}", n));
                    }
                    Ok(fence)
                })
                .collect::<Result<Vec<_>, Error>>()?,
        );
        self.swapchains[swapchain_index].available_semaphores = Some(
            (0..image_count)
                .map(|_| {
                    device
                        .create_semaphore()
                        .map_err(|_| Error::SemaphoreCreationError)
                })
                .collect::<Result<Vec<_>, _>>()?,
        );
        self.swapchains[swapchain_index].finished_semaphores = Some(
            (0..image_count)
                .map(|_| {
                    device
                        .create_semaphore()
                        .map_err(|_| Error::SemaphoreCreationError)
                })
                .collect::<Result<Vec<_>, _>>()?,
        );
        Ok(())
    }

    pub fn add_render_pass(&mut self) -> Result<(), Error> {
        self.render_passes.push({
            let color_attachment = Attachment {
                format: Some(self.swapchains[0].config.format),
                samples: 1,
                ops: AttachmentOps {
                    load: AttachmentLoadOp::Clear,
                    store: AttachmentStoreOp::Store,
                },
                stencil_ops: AttachmentOps::DONT_CARE,
                layouts: Layout::Undefined..Layout::Present,
            };
            let subpass = SubpassDesc {
                colors: &[(0, Layout::ColorAttachmentOptimal)],
                depth_stencil: None,
                inputs: &[],
                resolves: &[],
                preserves: &[],
            };
            unsafe {
                self.device
                    .create_render_pass(&[color_attachment], &[subpass], &[])
                    .map_err(|_| Error::RenderPassCreationError)?
            }
        });
        Ok(())
    }

    pub fn add_image_views(&mut self, swapchain_index: usize) -> Result<(), Error> {
        self.swapchains[swapchain_index].image_views = Some(
            self.swapchains[swapchain_index]
                .backbuffer
                .iter()
                .map(|image| unsafe {
                    self.device
                        .create_image_view(
                            &image,
                            ViewKind::D2,
                            self.swapchains[swapchain_index].config.format,
                            Swizzle::NO,
                            SubresourceRange {
                                aspects: Aspects::COLOR,
                                levels: 0..1,
                                layers: 0..1,
                            },
                        )
                        .map_err(|_| Error::ImageViewCreationError)
                })
                .collect::<Result<Vec<_>, Error>>()?,
        );
        Ok(())
    }

    pub fn add_framebuffers(
        &mut self,
        swapchain_index: usize,
        render_pass_index: usize,
    ) -> Result<(), Error> {
        unsafe {
            self.swapchains[swapchain_index]
                .create_framebuffers(&self.device, &self.render_passes[render_pass_index])?
        };
        Ok(())
    }

    pub fn create_command_buffers(
        &mut self,
        command_pool: &mut B::CommandPool,
    ) -> Vec<B::CommandBuffer> {
        let num_buffers = self.swapchains[0].framebuffers.len();
        let mut buffers = Vec::new();
        unsafe {
            command_pool.allocate(num_buffers, Level::Primary, &mut buffers);
        }

        for (c, buf) in buffers.iter_mut().enumerate() {
            unsafe {
                self.device
                    .set_command_buffer_name(buf, &format!("drawing buffer #{}", c));
            }
        }

        buffers
    }

    pub fn add_graphics_pipeline(
        &mut self,
        swapchain_index: usize,
        render_pass_index: usize,
        vertex_layout: &VertexLayout,
        vert_spirv: &[u32],
        frag_spirv: &[u32],
    ) -> Result<(), Error> {
        let data = PipelineData::new(
            self.device.clone(),
            self.swapchains[swapchain_index].config.extent.to_extent(),
            &self.render_passes[render_pass_index],
            vertex_layout,
            vert_spirv,
            frag_spirv,
        )?;

        info!(target: "trigon", "graphics pipeline #{} ready", self.pipelines.len());

        Ok(self.pipelines.push(data))
    }

    /// Upload `mesh`, replacing whatever was uploaded before. The old
    /// buffers may still be referenced by in-flight frames, so the
    /// device is drained first when replacing.
    pub fn upload_mesh(&mut self, adapter: &Adapter<B>, mesh: &Mesh) -> Result<(), Error> {
        if self.resources.is_some() {
            let _ = self.device.wait_idle();
        }

        self.resources = Some(ResourceManager::new(self.device.clone(), adapter, mesh)?);
        Ok(())
    }

    pub fn reset_current_fence(&self, swapchain_index: usize) -> Result<(), Error> {
        unsafe {
            self.device
                .wait_for_fence(
                    &self.swapchains[swapchain_index]
                        .fences
                        .as_ref()
                        .ok_or(Error::FenceError(FenceOp::Acquire))?
                        [self.swapchains[swapchain_index].current_frame],
                    u64::max_value(),
                )
                .map_err(|_| Error::FenceError(FenceOp::Wait))?;
            self.device
                .reset_fence(
                    &self.swapchains[swapchain_index]
                        .fences
                        .as_ref()
                        .ok_or(Error::FenceError(FenceOp::Acquire))?
                        [self.swapchains[swapchain_index].current_frame],
                )
                .map_err(|_| Error::FenceError(FenceOp::Reset))?;
        }
        Ok(())
    }

    /// Record and submit one frame that clears to `color` and draws the
    /// uploaded mesh with the current pipeline, passing `scale` to the
    /// vertex shader.
    pub fn draw_mesh(
        &mut self,
        color: [f32; 4],
        scale: f32,
        command_buffers: &mut [B::CommandBuffer],
    ) -> Result<(), Error> {
        self.swapchains[0].advance_frame();

        // reset once for acquire, once more after acquire signals it
        self.reset_current_fence(0)?;

        let (i_u32, i_usize) = unsafe { self.swapchains[0].get_current_image()? };

        self.reset_current_fence(0)?;

        let mesh_buffer = &self
            .resources
            .as_ref()
            .ok_or(Error::MissingMesh)?
            .mesh_buffer;

        unsafe {
            let clear_values = [ClearValue {
                color: ClearColor { float32: color },
            }];
            let index_buffer_view = IndexBufferView {
                buffer: &*mesh_buffer.index_buffer.buffer,
                range: SubRange::WHOLE,
                index_type: IndexType::U32,
            };

            let pipeline = self.pipelines.get(0).ok_or(Error::MissingPipeline(0))?;
            let buffer = &mut command_buffers[i_usize];

            buffer.reset(true);
            buffer.begin_primary(CommandBufferFlags::ONE_TIME_SUBMIT);
            buffer.begin_render_pass(
                &self.render_passes[0],
                &self.swapchains[0].framebuffers[i_usize],
                self.swapchains[0].config.extent.to_extent().rect(),
                clear_values.iter(),
                SubpassContents::Inline,
            );
            buffer.bind_graphics_pipeline(&pipeline.graphics_pipeline);
            buffer.bind_index_buffer(index_buffer_view);
            buffer.bind_vertex_buffers(
                0,
                vec![(&*mesh_buffer.vertex_buffer.buffer, SubRange::WHOLE)],
            );
            // uniforms only take effect once the pipeline is bound
            pipeline.push_scale(buffer, scale);
            buffer.draw_indexed(0..mesh_buffer.index_count, 0, 0..1);
            buffer.end_render_pass();
            buffer.finish();
        }

        self.submit_and_present(i_u32, &command_buffers[i_usize..=i_usize])
    }

    /// Record and submit one frame that only clears to `color`.
    pub fn clear_frame(
        &mut self,
        color: [f32; 4],
        command_buffers: &mut [B::CommandBuffer],
    ) -> Result<(), Error> {
        // Advance the frame _before_ we start using the `?` operator
        self.swapchains[0].advance_frame();

        self.reset_current_fence(0)?;

        let (i_u32, i_usize) = unsafe { self.swapchains[0].get_current_image()? };

        self.reset_current_fence(0)?;

        unsafe {
            let buffer = &mut command_buffers[i_usize];

            let clear_values = [ClearValue {
                color: ClearColor { float32: color },
            }];

            buffer.reset(true);
            buffer.begin_primary(CommandBufferFlags::ONE_TIME_SUBMIT);
            buffer.begin_render_pass(
                &self.render_passes[0],
                &self.swapchains[0].framebuffers[i_usize],
                self.swapchains[0].config.extent.to_extent().rect(),
                clear_values.iter(),
                SubpassContents::Inline,
            );
            buffer.end_render_pass();
            buffer.finish();
        }

        self.submit_and_present(i_u32, &command_buffers[i_usize..=i_usize])
    }

    fn submit_and_present(
        &mut self,
        image_index: u32,
        command_buffers: &[B::CommandBuffer],
    ) -> Result<(), Error> {
        let the_command_queue = &mut self.queue.queues[0];

        // split the swapchain entry into field borrows: the semaphore
        // references must stay alive across the present call, which
        // needs the swapchain itself mutably
        let SwapchainData {
            swapchain,
            fences,
            available_semaphores,
            finished_semaphores,
            current_frame,
            ..
        } = &mut self.swapchains[0];
        let current_frame = *current_frame;

        let wait_semaphores: ArrayVec<[_; 1]> = [(
            &available_semaphores.as_ref().ok_or(Error::SubmissionError)?[current_frame],
            PipelineStage::COLOR_ATTACHMENT_OUTPUT,
        )]
        .into();

        let signal_semaphores: ArrayVec<[_; 1]> =
            [&finished_semaphores.as_ref().ok_or(Error::SubmissionError)?[current_frame]].into();
        // yes, you have to write it twice like this. yes, it's silly.
        let present_wait_semaphores: ArrayVec<[_; 1]> =
            [&finished_semaphores.as_ref().ok_or(Error::SubmissionError)?[current_frame]].into();

        let submission = Submission {
            command_buffers,
            wait_semaphores,
            signal_semaphores,
        };

        unsafe {
            the_command_queue.submit(
                submission,
                Some(&fences.as_ref().ok_or(Error::FenceError(FenceOp::Acquire))?[current_frame]),
            );
            swapchain
                .present(the_command_queue, image_index, present_wait_semaphores)
                .map_err(|_| Error::SubmissionError)?
        };

        Ok(())
    }
}
