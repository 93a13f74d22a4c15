#![warn(
    clippy::cast_lossless,
    clippy::checked_conversions,
    clippy::copy_iterator,
    clippy::default_trait_access,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_into_iter_loop,
    clippy::explicit_iter_loop,
    clippy::filter_map_next,
    clippy::if_not_else,
    clippy::inline_always,
    clippy::items_after_statements,
    clippy::large_digit_groups,
    clippy::large_stack_arrays,
    clippy::map_flatten,
    clippy::match_same_arms,
    clippy::maybe_infinite_iter,
    clippy::mut_mut,
    clippy::needless_continue,
    clippy::needless_pass_by_value,
    clippy::non_ascii_literal,
    clippy::map_unwrap_or,
    clippy::redundant_closure_for_method_calls,
    clippy::same_functions_in_if_condition,
    clippy::shadow_unrelated,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::too_many_lines,
    clippy::type_repetition_in_bounds,
    clippy::unicode_not_nfc,
    clippy::unseparated_literal_suffix,
    clippy::unused_self,
    clippy::used_underscore_binding
)]

mod device_data;
mod pipeline_data;
mod resources;
mod swapchain_data;
pub mod vertex_layout;

use device_data::DeviceData;
use swapchain_data::SwapchainData;

pub use pipeline_data::{load_spirv_file, read_spirv};

use core::mem::ManuallyDrop;
use std::rc::Rc;

use log::info;

use gfx_hal::{
    adapter::{Adapter, Gpu, PhysicalDevice},
    device::Device as DeviceTrait,
    format::{ChannelType, Format},
    pool::CommandPoolCreateFlags,
    queue::QueueFamily as QueueFamilyTrait,
    window::{Surface, SwapchainConfig},
    Backend, Features, Instance,
};

use raw_window_handle::HasRawWindowHandle;

use crate::error::Error;
use crate::mesh::Mesh;
use vertex_layout::VertexLayout;

#[derive(Debug)]
struct CommandData<B: Backend> {
    device: Rc<ManuallyDrop<B::Device>>,
    command_pool: B::CommandPool,
    command_buffers: Vec<B::CommandBuffer>,
}

impl<B: Backend> CommandData<B> {
    unsafe fn new(device_data: &mut DeviceData<B>) -> Result<Self, Error> {
        let mut command_pool = device_data
            .device
            .create_command_pool(
                device_data.queue.family,
                CommandPoolCreateFlags::RESET_INDIVIDUAL,
            )
            .map_err(|_| Error::CommandPoolCreationError)?;
        let command_buffers = device_data.create_command_buffers(&mut command_pool);

        Ok(CommandData {
            device: device_data.device.clone(),
            command_pool,
            command_buffers,
        })
    }
}

/// The whole device side of the crate: instance, surface, one opened
/// device with its swapchain, render pass, pipeline and uploaded mesh,
/// and the command pool that records frames.
#[derive(Debug)]
pub struct Context<B: Backend> {
    instance: ManuallyDrop<B::Instance>,
    surface: B::Surface,
    adapters: Vec<Adapter<B>>,
    devices: Vec<DeviceData<B>>,
    command_pools: Vec<CommandData<B>>,
}

impl<B: Backend> Context<B> {
    /// Run the fixed setup sequence up to the point where frames can be
    /// recorded. Shaders and mesh data come later, via
    /// [`Context::install_pipeline`] and [`Context::upload_mesh`].
    pub fn build<W: HasRawWindowHandle>(window: &W, name: &str) -> Result<Self, Error> {
        let mut context = Self::from_window(window, name)?;
        context.add_device()?;
        context.add_swapchain(0)?;
        context.add_semaphores(0, 0)?;
        context.devices[0].add_render_pass()?;
        context.devices[0].add_image_views(0)?;
        context.devices[0].add_framebuffers(0, 0)?;
        context.add_command_pool(0)?;

        Ok(context)
    }

    pub fn from_window<W: HasRawWindowHandle>(window: &W, name: &str) -> Result<Self, Error> {
        let raw_instance =
            B::Instance::create(name, 1).map_err(|_| Error::InstanceCreationError)?;

        let surface = unsafe {
            raw_instance
                .create_surface(window)
                .map_err(|_| Error::SurfaceCreationError)?
        };

        let adapters = raw_instance
            .enumerate_adapters()
            .into_iter()
            .map(|mut a| {
                a.queue_families = a
                    .queue_families
                    .into_iter()
                    .filter(|qf| {
                        qf.queue_type().supports_graphics() && surface.supports_queue_family(qf)
                    })
                    .collect();
                a
            })
            .filter(|a| !a.queue_families.is_empty())
            .collect::<Vec<_>>();

        Ok(Self {
            instance: ManuallyDrop::new(raw_instance),
            surface,
            adapters,
            devices: vec![],
            command_pools: vec![],
        })
    }

    fn add_device(&mut self) -> Result<(), Error> {
        use crate::error::QueueGroupError;

        let (
            index,
            Gpu {
                device,
                queue_groups,
            },
            _family,
        ) = self
            .adapters
            .iter()
            .enumerate()
            .find_map(|(index, a)| {
                a.queue_families.iter().find_map(|qf| unsafe {
                    a.physical_device
                        .open(&[(&qf, &[1.0; 1])], Features::empty())
                        .ok()
                        .map(|gpu| (index, gpu, qf))
                })
            })
            .ok_or(Error::QueueGroupError(QueueGroupError::QueueGroupNotFound))?;

        info!(target: "trigon", "using adapter: {}", self.adapters[index].info.name);

        let queue_group = queue_groups
            .into_iter()
            .next()
            .ok_or(Error::QueueGroupError(QueueGroupError::OwnershipFailed))?;

        if queue_group.queues.is_empty() {
            return Err(Error::QueueGroupError(QueueGroupError::NoCommandQueues));
        };

        self.devices
            .push(DeviceData::from(index, device, queue_group));

        Ok(())
    }

    fn add_swapchain(&mut self, device_index: usize) -> Result<(), Error> {
        let DeviceData {
            adapter_index,
            device,
            ..
        } = self
            .devices
            .get(device_index)
            .ok_or(Error::DeviceNotFoundError(device_index))?;

        let surface_capabilities = self
            .surface
            .capabilities(&self.adapters[*adapter_index].physical_device);

        let &present_mode = {
            use gfx_hal::window::PresentMode;
            let present_modes = surface_capabilities.present_modes;

            [
                PresentMode::MAILBOX,
                PresentMode::FIFO,
                PresentMode::RELAXED,
                PresentMode::IMMEDIATE,
            ]
            .iter()
            .find(|pm| present_modes.contains(**pm))
            .ok_or(Error::SwapchainError(
                crate::error::SwapchainError::NoPresentMode,
            ))?
        };

        let preferred_formats = self
            .surface
            .supported_formats(&self.adapters[*adapter_index].physical_device);

        let format = match preferred_formats {
            None => Format::Rgba8Srgb,
            Some(formats) => match formats
                .iter()
                .find(|format| format.base_format().1 == ChannelType::Srgb)
                .cloned()
            {
                Some(srgb_format) => srgb_format,
                None => formats.get(0).cloned().ok_or(Error::SwapchainError(
                    crate::error::SwapchainError::NoSurfaceFormat,
                ))?,
            },
        };

        let swapchain_config = SwapchainConfig::from_caps(
            &surface_capabilities,
            format,
            *surface_capabilities.extents.end(),
        )
        .with_present_mode(present_mode);

        let (swapchain, backbuffer) = unsafe {
            device
                .create_swapchain(&mut self.surface, swapchain_config.clone(), None)
                .map_err(|_| {
                    Error::SwapchainError(crate::error::SwapchainError::CreationError)
                })?
        };

        self.devices[device_index].swapchains.push(SwapchainData::from(
            swapchain,
            backbuffer,
            swapchain_config,
        ));
        Ok(())
    }

    fn add_semaphores(&mut self, device_index: usize, swapchain_index: usize) -> Result<(), Error> {
        self.devices
            .get_mut(device_index)
            .ok_or(Error::DeviceNotFoundError(device_index))?
            .add_semaphores(swapchain_index)
    }

    fn add_command_pool(&mut self, device_index: usize) -> Result<(), Error> {
        unsafe {
            self.command_pools
                .push(CommandData::new(&mut self.devices[device_index])?);
        }
        Ok(())
    }

    /// Compile the shader pair and the vertex layout into the pipeline
    /// all frames draw with.
    pub fn install_pipeline(
        &mut self,
        vertex_layout: &VertexLayout,
        vert_spirv: &[u32],
        frag_spirv: &[u32],
    ) -> Result<(), Error> {
        self.devices[0].add_graphics_pipeline(0, 0, vertex_layout, vert_spirv, frag_spirv)
    }

    /// Upload `mesh` to device-visible buffers.
    pub fn upload_mesh(&mut self, mesh: &Mesh) -> Result<(), Error> {
        let adapter_index = self.devices[0].adapter_index;
        let adapter = &self.adapters[adapter_index];
        self.devices[0].upload_mesh(adapter, mesh)
    }

    /// Present one frame containing only the clear color.
    pub fn clear(&mut self, color: [f32; 4]) -> Result<(), Error> {
        self.devices[0].clear_frame(color, &mut self.command_pools[0].command_buffers)
    }

    /// Present one frame: clear, then an indexed draw of the uploaded
    /// mesh with `scale` pushed to the vertex stage.
    pub fn draw(&mut self, color: [f32; 4], scale: f32) -> Result<(), Error> {
        self.devices[0].draw_mesh(color, scale, &mut self.command_pools[0].command_buffers)
    }
}

impl<B: Backend> std::ops::Drop for Context<B> {
    fn drop(&mut self) {
        // we drop the result since an error here would be quite unrecoverable
        // we can't really return an error message

        for device_data in &self.devices {
            let _ = device_data.device.wait_idle();
        }

        for command_data in self.command_pools.drain(..) {
            unsafe {
                command_data
                    .device
                    .destroy_command_pool(command_data.command_pool);
            }
        }

        for DeviceData {
            device,
            swapchains,
            render_passes,
            pipelines,
            resources,
            queue: _,
            adapter_index: _,
        } in self.devices.drain(..)
        {
            // resource and pipeline wrappers destroy their own handles,
            // and need the device alive to do so
            drop(resources);
            drop(pipelines);

            for render_pass in render_passes {
                unsafe { device.destroy_render_pass(render_pass) };
            }

            for swapchain_data in swapchains {
                let SwapchainData {
                    swapchain,
                    backbuffer,
                    fences,
                    available_semaphores,
                    finished_semaphores,
                    image_views,
                    framebuffers,
                    config: _,
                    current_frame: _,
                } = swapchain_data;
                unsafe {
                    for fence in fences.unwrap_or_else(Vec::new) {
                        device.destroy_fence(fence);
                    }

                    for semaphore in available_semaphores.unwrap_or_else(Vec::new) {
                        device.destroy_semaphore(semaphore);
                    }

                    for semaphore in finished_semaphores.unwrap_or_else(Vec::new) {
                        device.destroy_semaphore(semaphore);
                    }

                    for image_view in image_views.unwrap_or_else(Vec::new) {
                        device.destroy_image_view(image_view);
                    }

                    for image in backbuffer {
                        device.destroy_image(image);
                    }

                    for framebuffer in framebuffers {
                        device.destroy_framebuffer(framebuffer);
                    }

                    device.destroy_swapchain(swapchain);
                }
            }

            match Rc::try_unwrap(device) {
                Ok(mut dev) => unsafe { ManuallyDrop::drop(&mut dev) },
                Err(_) => {
                    use std::io::Write;
                    // if this fails then everything is probably failing anyway
                    let _ = writeln!(std::io::stderr(), "There were still alive `Rc`s to device!");
                }
            }
        }
        unsafe {
            ManuallyDrop::drop(&mut self.instance);
        }
    }
}
