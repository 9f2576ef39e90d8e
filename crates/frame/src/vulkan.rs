//! Vulkan implementation of the render backend.
//!
//! Owns the whole GPU side of the frame loop: instance, device, surface,
//! the swapchain manager, and one [`FrameSlot`] of synchronization objects
//! per in-flight frame. Swapchain images make the round trip from
//! `UNDEFINED` to color attachment to `PRESENT_SRC` inside the slot's
//! command buffer, so the caller records only its own passes.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use wsi_platform::Surface;
use wsi_rhi::command::{CommandBuffer, CommandPool};
use wsi_rhi::device::Device;
use wsi_rhi::instance::Instance;
use wsi_rhi::swapchain::{SwapchainManager, SwapchainTarget};
use wsi_rhi::sync::{Fence, Semaphore};
use wsi_rhi::{RhiError, RhiResult};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::backend::{AcquireOutcome, PresentOutcome, RenderBackend};
use crate::orchestrator::FrameError;

/// Maps RHI failures into frame errors, promoting device loss to fatal.
fn backend_err(error: RhiError) -> FrameError {
    match error {
        RhiError::Vulkan(vk::Result::ERROR_DEVICE_LOST) => FrameError::DeviceLost,
        other => FrameError::Backend(other),
    }
}

/// Synchronization and recording resources for one in-flight slot.
///
/// The flow per slot, matching the submission wiring below:
///
/// ```text
/// 1. Wait on in_flight (CPU gates reuse of this slot's resources)
/// 2. Acquire image (signals image_available)
/// 3. Record into command_buffer
/// 4. Submit: wait image_available, signal render_finished + in_flight
/// 5. Present: wait render_finished
/// ```
struct FrameSlot {
    command_buffer: CommandBuffer,
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
}

impl FrameSlot {
    fn new(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        let command_buffer = CommandBuffer::new(device.clone(), pool)?;
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        // Signaled so the first wait on a fresh slot does not block forever
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            command_buffer,
            image_available,
            render_finished,
            in_flight,
        })
    }
}

/// The GPU half of the frame loop, driving `wsi_rhi` for the orchestrator.
pub struct VulkanBackend {
    // Field order is teardown order: chain and sync objects go before the
    // surface, which goes before the device and instance.
    swapchain: SwapchainManager,
    slots: Vec<FrameSlot>,
    command_pool: CommandPool,
    surface: Surface,
    device: Arc<Device>,
    instance: Instance,
}

impl VulkanBackend {
    /// Bring up the backend against an already-created surface.
    ///
    /// The swapchain itself is not created here; the orchestrator creates
    /// it lazily at its own initialization.
    ///
    /// # Errors
    ///
    /// Returns an error if command pool or synchronization object creation
    /// fails.
    pub fn new(
        instance: Instance,
        surface: Surface,
        device: Arc<Device>,
    ) -> Result<Self, FrameError> {
        let command_pool =
            CommandPool::new(device.clone(), device.graphics_family()).map_err(backend_err)?;

        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for index in 0..MAX_FRAMES_IN_FLIGHT {
            let slot = FrameSlot::new(device.clone(), &command_pool).map_err(backend_err)?;
            debug!("Created frame slot {}", index);
            slots.push(slot);
        }

        let swapchain = SwapchainManager::new(&instance, device.clone(), surface.handle());

        info!(
            "Vulkan backend created with {} frame slot(s)",
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            swapchain,
            slots,
            command_pool,
            surface,
            device,
            instance,
        })
    }

    /// The logical device driving this backend.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// The swapchain manager, for format/extent queries.
    pub fn swapchain(&self) -> &SwapchainManager {
        &self.swapchain
    }

    /// The Vulkan instance this backend was built against.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The surface the swapchain presents to.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// The command pool the frame slots record from.
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// Rebuilds every slot's semaphores.
    ///
    /// A semaphore may hold a signal from an acquire against the retired
    /// chain; after recreation every slot starts the new generation clean.
    fn reset_semaphores(&mut self) -> Result<(), FrameError> {
        for slot in &mut self.slots {
            slot.image_available = Semaphore::new(self.device.clone()).map_err(backend_err)?;
            slot.render_finished = Semaphore::new(self.device.clone()).map_err(backend_err)?;
        }
        debug!("Rebuilt frame slot semaphores");
        Ok(())
    }
}

impl RenderBackend for VulkanBackend {
    type Recording = CommandBuffer;
    type Target = SwapchainTarget;

    fn create_swapchain(&mut self, width: u32, height: u32) -> Result<(), FrameError> {
        self.swapchain.create(width, height).map_err(backend_err)
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<(), FrameError> {
        self.swapchain
            .recreate(width, height)
            .map_err(backend_err)?;
        self.reset_semaphores()
    }

    fn mark_swapchain_stale(&mut self) {
        self.swapchain.mark_stale();
    }

    fn swapchain_stale(&self) -> bool {
        self.swapchain.is_stale()
    }

    fn swapchain_generation(&self) -> u64 {
        self.swapchain.generation()
    }

    fn swapchain_extent(&self) -> (u32, u32) {
        let extent = self.swapchain.extent();
        (extent.width, extent.height)
    }

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn acquire(
        &mut self,
        slot: usize,
        timeout_ns: u64,
    ) -> Result<AcquireOutcome<SwapchainTarget>, FrameError> {
        let frame_slot = &self.slots[slot];

        // Slot reuse is gated on the GPU finishing the previous submission
        // that used these resources; this is what orders frame N before
        // the reuse of its image slot.
        match frame_slot.in_flight.wait(timeout_ns) {
            Ok(()) => {}
            Err(RhiError::Vulkan(vk::Result::TIMEOUT)) => return Err(FrameError::AcquireTimeout),
            Err(e) => return Err(backend_err(e)),
        }

        match self
            .swapchain
            .acquire_next_image(frame_slot.image_available.handle(), timeout_ns)
        {
            Ok((image_index, suboptimal)) => {
                let target = self.swapchain.target(image_index).map_err(backend_err)?;
                Ok(AcquireOutcome::Acquired {
                    image_index,
                    target,
                    suboptimal,
                })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date during acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => {
                Err(FrameError::AcquireTimeout)
            }
            Err(vk::Result::ERROR_DEVICE_LOST) => Err(FrameError::DeviceLost),
            Err(e) => Err(FrameError::Backend(RhiError::Vulkan(e))),
        }
    }

    fn begin_recording(
        &mut self,
        slot: usize,
        image_index: u32,
    ) -> Result<CommandBuffer, FrameError> {
        let frame_slot = &self.slots[slot];

        // Only reset the fence once an image is actually acquired; an
        // earlier reset could deadlock the next wait if acquire failed.
        frame_slot.in_flight.reset().map_err(backend_err)?;
        frame_slot.command_buffer.reset().map_err(backend_err)?;
        frame_slot.command_buffer.begin().map_err(backend_err)?;

        // The acquired image arrives in UNDEFINED; move it into the layout
        // the caller's color pass expects.
        let image = self.swapchain.image(image_index).map_err(backend_err)?;
        frame_slot.command_buffer.transition_image(
            image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );

        Ok(CommandBuffer::from_handle(
            self.device.clone(),
            frame_slot.command_buffer.handle(),
        ))
    }

    fn submit_and_present(
        &mut self,
        recording: CommandBuffer,
        slot: usize,
        image_index: u32,
    ) -> Result<PresentOutcome, FrameError> {
        let frame_slot = &self.slots[slot];

        // Close the batch: return the image to its presentation layout
        let image = self.swapchain.image(image_index).map_err(backend_err)?;
        recording.transition_image(
            image,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );
        recording.end().map_err(backend_err)?;

        let wait_semaphores = [frame_slot.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame_slot.render_finished.handle()];
        let command_buffers = [recording.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the command buffer is fully recorded, and the slot's
        // fence and semaphores are free for reuse after the in_flight wait
        // performed during acquire.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], frame_slot.in_flight.handle())
                .map_err(backend_err)?;
        }

        match self.swapchain.present(
            self.device.present_queue(),
            image_index,
            frame_slot.render_finished.handle(),
        ) {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => {
                debug!("Swapchain suboptimal during present");
                Ok(PresentOutcome::Stale)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => {
                debug!("Swapchain out of date during present");
                Ok(PresentOutcome::Stale)
            }
            Err(vk::Result::ERROR_DEVICE_LOST) => Err(FrameError::DeviceLost),
            Err(e) => Err(FrameError::Backend(RhiError::Vulkan(e))),
        }
    }

    fn wait_idle(&mut self) -> Result<(), FrameError> {
        self.device.wait_idle().map_err(backend_err)
    }

    fn destroy_swapchain(&mut self) {
        self.swapchain.destroy();
    }
}
