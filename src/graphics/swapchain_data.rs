use gfx_hal::{
    device::Device as DeviceTrait,
    image::Extent,
    window::{Swapchain, SwapchainConfig},
    Backend,
};

use crate::error::{Error, SwapchainError};

/// One swapchain and everything keyed by its image count: backbuffer
/// images, their views and framebuffers, and the fence/semaphore sets
/// that pace frame submission.
#[derive(Debug)]
pub struct SwapchainData<B: Backend> {
    pub swapchain: B::Swapchain,
    pub backbuffer: Vec<B::Image>,
    pub config: SwapchainConfig,
    pub fences: Option<Vec<B::Fence>>,
    pub available_semaphores: Option<Vec<B::Semaphore>>,
    pub finished_semaphores: Option<Vec<B::Semaphore>>,
    pub current_frame: usize,
    pub image_views: Option<Vec<B::ImageView>>,
    pub framebuffers: Vec<B::Framebuffer>,
}

impl<B: Backend> SwapchainData<B> {
    pub fn from(swapchain: B::Swapchain, backbuffer: Vec<B::Image>, config: SwapchainConfig) -> Self {
        Self {
            swapchain,
            backbuffer,
            config,
            fences: None,
            available_semaphores: None,
            finished_semaphores: None,
            current_frame: 0,
            image_views: None,
            framebuffers: vec![],
        }
    }

    /// Acquire the next backbuffer image, signalling this frame's
    /// "available" semaphore and fence.
    pub unsafe fn get_current_image(&mut self) -> Result<(u32, usize), Error> {
        let semaphore = &self
            .available_semaphores
            .as_ref()
            .ok_or(Error::SemaphoreCreationError)?[self.current_frame];
        let fence = &self.fences.as_ref().ok_or(Error::FenceCreationError)?[self.current_frame];

        let (image_index, _suboptimal) = self
            .swapchain
            .acquire_image(u64::max_value(), Some(semaphore), Some(fence))
            .map_err(|_| Error::SwapchainError(SwapchainError::AcquireError))?;

        Ok((image_index, image_index as usize))
    }

    pub unsafe fn create_framebuffers(
        &mut self,
        device: &B::Device,
        render_pass: &B::RenderPass,
    ) -> Result<(), Error> {
        self.framebuffers = self
            .image_views
            .as_ref()
            .ok_or(Error::ImageViewCreationError)?
            .iter()
            .map(|image_view| {
                device
                    .create_framebuffer(
                        render_pass,
                        vec![image_view],
                        Extent {
                            width: self.config.extent.width as u32,
                            height: self.config.extent.height as u32,
                            depth: 1,
                        },
                    )
                    .map_err(|_| Error::FramebufferCreationError)
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(())
    }

    pub fn advance_frame(&mut self) {
        self.current_frame = match &self.available_semaphores {
            Some(semaphores) => (self.current_frame + 1) % semaphores.len(),
            None => 0,
        };
    }
}
