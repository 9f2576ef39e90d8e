//! The frame-loop state machine.
//!
//! [`FrameOrchestrator`] decides when a new frame may begin, owns the
//! swapchain's lifecycle through its backend, and hands the caller a
//! [`Frame`] token bounding the recording context. Its states:
//!
//! ```text
//! Idle --begin_frame--> Active --end_frame--> Idle --shutdown--> Terminated
//! ```
//!
//! Staleness policy: a resize noticed between frames, an out-of-date or
//! suboptimal acquire, and a stale present all converge on the same path -
//! the chain is marked stale and rebuilt at the next `begin_frame`, after a
//! full device wait. No frame in progress is ever aborted for staleness.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use wsi_platform::Platform;
use wsi_rhi::RhiError;

use crate::backend::{AcquireOutcome, PresentOutcome, RenderBackend};

/// Bound on how long `begin_frame` may block waiting for an image.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors surfaced by the frame orchestrator.
#[derive(Error, Debug)]
pub enum FrameError {
    /// No presentable image became available within the acquisition bound.
    #[error("timed out waiting for a presentable image")]
    AcquireTimeout,

    /// The device reported a fatal failure; the loop cannot continue.
    #[error("device lost")]
    DeviceLost,

    /// The chain stayed unusable even after a recreation retry.
    #[error("swapchain unavailable after recreation retry")]
    SwapchainUnavailable,

    /// `begin_frame` was called while a frame is already open.
    #[error("a frame is already open")]
    FrameAlreadyOpen,

    /// `end_frame` was called without an open frame.
    #[error("no frame is open")]
    NoOpenFrame,

    /// `shutdown` was called while a frame is open.
    #[error("cannot shut down while a frame is open")]
    ShutdownWhileActive,

    /// A call arrived after `shutdown` completed.
    #[error("frame orchestrator is terminated")]
    Terminated,

    /// A frame token outlived the swapchain generation that issued it.
    #[error("frame targets swapchain generation {actual}, current is {current}")]
    StaleTarget {
        /// Generation the token was issued under.
        actual: u64,
        /// Generation currently live.
        current: u64,
    },

    /// GPU backend failure.
    #[error(transparent)]
    Backend(RhiError),
}

/// Orchestrator lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Between frames; `begin_frame` is legal.
    Idle,
    /// A frame is open; only `end_frame` is legal.
    Active,
    /// Shut down; nothing is legal anymore.
    Terminated,
}

/// Proof that a frame is open.
///
/// Returned by [`FrameOrchestrator::begin_frame`] and consumed by value in
/// [`FrameOrchestrator::end_frame`], so the recording context cannot be
/// retained past the frame. At most one exists at a time.
pub struct Frame<B: RenderBackend> {
    recording: B::Recording,
    target: B::Target,
    image_index: u32,
    extent: (u32, u32),
    generation: u64,
    slot: usize,
}

impl<B: RenderBackend> Frame<B> {
    /// The recording context for this frame.
    pub fn recording(&self) -> &B::Recording {
        &self.recording
    }

    /// The attachment description for the acquired image.
    pub fn target(&self) -> B::Target {
        self.target
    }

    /// The swapchain extent this frame renders at.
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    /// Index of the acquired swapchain image.
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Swapchain generation the frame was opened against.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Drives frame admission, swapchain lifecycle, and submission ordering.
pub struct FrameOrchestrator<B: RenderBackend> {
    backend: B,
    state: LoopState,
    slot: usize,
    acquire_timeout_ns: u64,
}

impl<B: RenderBackend> FrameOrchestrator<B> {
    /// Creates the orchestrator and the initial swapchain at the platform's
    /// current drawable size.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial swapchain cannot be created.
    pub fn new(mut backend: B, platform: &dyn Platform) -> Result<Self, FrameError> {
        backend.create_swapchain(platform.surface_width(), platform.surface_height())?;

        Ok(Self {
            backend,
            state: LoopState::Idle,
            slot: 0,
            acquire_timeout_ns: ACQUIRE_TIMEOUT.as_nanos() as u64,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The backend this orchestrator drives.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Opens a frame: honors pending resizes, acquires an image, and hands
    /// out the recording context.
    ///
    /// If the platform reported a resize since the last frame or the chain
    /// is stale, all in-flight work is waited on and the chain rebuilt at
    /// the platform's current size first. An out-of-date acquire triggers
    /// one recreate-and-retry cycle that the caller never observes.
    ///
    /// # Errors
    ///
    /// - [`FrameError::FrameAlreadyOpen`] if a frame is open (programming
    ///   error; never silently ignored)
    /// - [`FrameError::Terminated`] after shutdown
    /// - [`FrameError::AcquireTimeout`] if no image arrives within
    ///   [`ACQUIRE_TIMEOUT`]
    /// - [`FrameError::DeviceLost`] on fatal device failure
    pub fn begin_frame(&mut self, platform: &mut dyn Platform) -> Result<Frame<B>, FrameError> {
        match self.state {
            LoopState::Active => return Err(FrameError::FrameAlreadyOpen),
            LoopState::Terminated => return Err(FrameError::Terminated),
            LoopState::Idle => {}
        }

        // Resizes coalesce to the latest size; consuming the flag here is
        // what defers mid-frame notifications to the next begin_frame.
        if platform.take_resize().is_some() {
            self.backend.mark_swapchain_stale();
        }
        if self.backend.swapchain_stale() {
            self.wait_and_recreate(platform)?;
        }

        let mut retried = false;
        let (image_index, target) = loop {
            match self.backend.acquire(self.slot, self.acquire_timeout_ns)? {
                AcquireOutcome::Acquired {
                    image_index,
                    target,
                    suboptimal,
                } => {
                    if suboptimal {
                        // Usable this frame; rebuild before the next one
                        self.backend.mark_swapchain_stale();
                    }
                    break (image_index, target);
                }
                AcquireOutcome::OutOfDate => {
                    if retried {
                        return Err(FrameError::SwapchainUnavailable);
                    }
                    retried = true;
                    debug!("Swapchain out of date during acquire, recreating");
                    self.backend.mark_swapchain_stale();
                    self.wait_and_recreate(platform)?;
                }
            }
        };

        let recording = self.backend.begin_recording(self.slot, image_index)?;
        self.state = LoopState::Active;

        Ok(Frame {
            recording,
            target,
            image_index,
            extent: self.backend.swapchain_extent(),
            generation: self.backend.swapchain_generation(),
            slot: self.slot,
        })
    }

    /// Closes the frame: submits its batch and schedules presentation.
    ///
    /// A stale presentation result does not fail the frame; the chain is
    /// marked for recreation at the next `begin_frame` instead.
    ///
    /// # Errors
    ///
    /// - [`FrameError::NoOpenFrame`] if no frame is open
    /// - [`FrameError::StaleTarget`] if the token's generation is no longer
    ///   current
    /// - [`FrameError::DeviceLost`] on fatal device failure
    ///
    /// The orchestrator returns to `Idle` even when submission fails, so a
    /// fatal error can still be followed by an orderly [`Self::shutdown`].
    pub fn end_frame(&mut self, frame: Frame<B>) -> Result<(), FrameError> {
        match self.state {
            LoopState::Idle => return Err(FrameError::NoOpenFrame),
            LoopState::Terminated => return Err(FrameError::Terminated),
            LoopState::Active => {}
        }
        self.state = LoopState::Idle;

        let current = self.backend.swapchain_generation();
        if frame.generation != current {
            return Err(FrameError::StaleTarget {
                actual: frame.generation,
                current,
            });
        }

        let outcome =
            self.backend
                .submit_and_present(frame.recording, frame.slot, frame.image_index)?;
        if outcome == PresentOutcome::Stale {
            debug!("Presentation reported a stale swapchain, deferring recreation");
            self.backend.mark_swapchain_stale();
        }

        self.slot = (self.slot + 1) % self.backend.slot_count();
        Ok(())
    }

    /// Waits for all outstanding work, destroys the swapchain, and enters
    /// `Terminated`.
    ///
    /// Calling `shutdown` again afterwards is an error-free no-op; the
    /// teardown never runs twice.
    ///
    /// # Errors
    ///
    /// - [`FrameError::ShutdownWhileActive`] if a frame is open
    /// - The final device wait's error, if it fails; teardown still
    ///   completes and the orchestrator is `Terminated` regardless
    pub fn shutdown(&mut self) -> Result<(), FrameError> {
        match self.state {
            LoopState::Active => return Err(FrameError::ShutdownWhileActive),
            LoopState::Terminated => return Ok(()),
            LoopState::Idle => {}
        }

        self.state = LoopState::Terminated;
        let wait = self.backend.wait_idle();
        self.backend.destroy_swapchain();
        info!("Frame orchestrator shut down");
        wait
    }

    /// Full-device wait followed by recreation at the platform's current
    /// size. Recreation never runs while any prior frame is in flight.
    fn wait_and_recreate(&mut self, platform: &dyn Platform) -> Result<(), FrameError> {
        self.backend.wait_idle()?;
        self.backend
            .recreate_swapchain(platform.surface_width(), platform.surface_height())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use wsi_core::Error as CoreError;
    use wsi_platform::Surface;

    use super::*;

    struct MockPlatform {
        width: u32,
        height: u32,
        pending: Option<(u32, u32)>,
        alive: bool,
    }

    impl MockPlatform {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pending: None,
                alive: true,
            }
        }
    }

    impl Platform for MockPlatform {
        fn create_surface(
            &mut self,
            _entry: &ash::Entry,
            _instance: &ash::Instance,
        ) -> wsi_core::Result<Surface> {
            Err(CoreError::Surface("not available in tests".to_owned()))
        }

        fn instance_extensions(&self) -> wsi_core::Result<Vec<*const i8>> {
            Ok(Vec::new())
        }

        fn surface_width(&self) -> u32 {
            self.width
        }

        fn surface_height(&self) -> u32 {
            self.height
        }

        fn alive(&self) -> bool {
            self.alive
        }

        fn poll_input(&mut self) {}

        fn notify_resize(&mut self, width: u32, height: u32) {
            self.pending = Some((width, height));
            self.width = width;
            self.height = height;
        }

        fn take_resize(&mut self) -> Option<(u32, u32)> {
            self.pending.take()
        }

        fn request_close(&mut self) {
            self.alive = false;
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    enum Call {
        Create(u32, u32),
        Recreate(u32, u32),
        WaitIdle,
        Acquire,
        Submit(u32),
        Destroy,
    }

    struct MockBackend {
        calls: Vec<Call>,
        stale: bool,
        generation: u64,
        extent: (u32, u32),
        acquire_script: VecDeque<AcquireOutcome<()>>,
        present_script: VecDeque<PresentOutcome>,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                stale: false,
                generation: 0,
                extent: (0, 0),
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
            }
        }

        fn script_acquire(&mut self, outcome: AcquireOutcome<()>) {
            self.acquire_script.push_back(outcome);
        }

        fn script_present(&mut self, outcome: PresentOutcome) {
            self.present_script.push_back(outcome);
        }
    }

    impl RenderBackend for MockBackend {
        type Recording = u32;
        type Target = ();

        fn create_swapchain(&mut self, width: u32, height: u32) -> Result<(), FrameError> {
            self.calls.push(Call::Create(width, height));
            self.extent = (width, height);
            self.generation += 1;
            self.stale = false;
            Ok(())
        }

        fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<(), FrameError> {
            self.calls.push(Call::Recreate(width, height));
            self.extent = (width, height);
            self.generation += 1;
            self.stale = false;
            Ok(())
        }

        fn mark_swapchain_stale(&mut self) {
            self.stale = true;
        }

        fn swapchain_stale(&self) -> bool {
            self.stale
        }

        fn swapchain_generation(&self) -> u64 {
            self.generation
        }

        fn swapchain_extent(&self) -> (u32, u32) {
            self.extent
        }

        fn slot_count(&self) -> usize {
            crate::MAX_FRAMES_IN_FLIGHT
        }

        fn acquire(
            &mut self,
            _slot: usize,
            _timeout_ns: u64,
        ) -> Result<AcquireOutcome<()>, FrameError> {
            self.calls.push(Call::Acquire);
            Ok(self
                .acquire_script
                .pop_front()
                .unwrap_or(AcquireOutcome::Acquired {
                    image_index: 0,
                    target: (),
                    suboptimal: false,
                }))
        }

        fn begin_recording(&mut self, slot: usize, _image_index: u32) -> Result<u32, FrameError> {
            Ok(slot as u32)
        }

        fn submit_and_present(
            &mut self,
            _recording: u32,
            _slot: usize,
            image_index: u32,
        ) -> Result<PresentOutcome, FrameError> {
            self.calls.push(Call::Submit(image_index));
            Ok(self
                .present_script
                .pop_front()
                .unwrap_or(PresentOutcome::Presented))
        }

        fn wait_idle(&mut self) -> Result<(), FrameError> {
            self.calls.push(Call::WaitIdle);
            Ok(())
        }

        fn destroy_swapchain(&mut self) {
            self.calls.push(Call::Destroy);
        }
    }

    fn orchestrator_at(
        width: u32,
        height: u32,
    ) -> (FrameOrchestrator<MockBackend>, MockPlatform) {
        let platform = MockPlatform::new(width, height);
        let orchestrator =
            FrameOrchestrator::new(MockBackend::new(), &platform).expect("init failed");
        (orchestrator, platform)
    }

    fn count(calls: &[Call], matching: impl Fn(&Call) -> bool) -> usize {
        calls.iter().filter(|call| matching(call)).count()
    }

    #[test]
    fn first_frame_uses_platform_startup_size() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);

        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        assert_eq!(frame.extent(), (1280, 720));
        orchestrator.end_frame(frame).expect("end failed");
    }

    #[test]
    fn resize_mid_frame_is_deferred_to_next_begin() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);

        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        // Resize lands while the frame is open
        platform.notify_resize(640, 480);
        // The open frame keeps its extent
        assert_eq!(frame.extent(), (1280, 720));
        orchestrator.end_frame(frame).expect("end failed");

        // No recreation happened during the open frame
        assert_eq!(
            count(&orchestrator.backend().calls, |c| matches!(
                c,
                Call::Recreate(_, _)
            )),
            0
        );

        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        assert_eq!(frame.extent(), (640, 480));
        orchestrator.end_frame(frame).expect("end failed");
    }

    #[test]
    fn resizes_coalesce_to_latest_size() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);

        platform.notify_resize(800, 600);
        platform.notify_resize(1024, 768);
        platform.notify_resize(640, 480);

        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        assert_eq!(frame.extent(), (640, 480));
        orchestrator.end_frame(frame).expect("end failed");

        // One recreation, at the final size only
        let recreates: Vec<_> = orchestrator
            .backend()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Recreate(_, _)))
            .collect();
        assert_eq!(recreates, vec![&Call::Recreate(640, 480)]);
    }

    #[test]
    fn recreation_is_preceded_by_full_wait() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);

        platform.notify_resize(640, 480);
        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        orchestrator.end_frame(frame).expect("end failed");

        let calls = &orchestrator.backend().calls;
        let wait_at = calls
            .iter()
            .position(|c| *c == Call::WaitIdle)
            .expect("no wait recorded");
        let recreate_at = calls
            .iter()
            .position(|c| matches!(c, Call::Recreate(_, _)))
            .expect("no recreate recorded");
        assert!(wait_at < recreate_at);
    }

    #[test]
    fn begin_while_active_is_rejected() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);

        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        assert!(matches!(
            orchestrator.begin_frame(&mut platform),
            Err(FrameError::FrameAlreadyOpen)
        ));

        // The open frame is unaffected and still ends normally
        orchestrator.end_frame(frame).expect("end failed");
    }

    #[test]
    fn out_of_date_acquire_recreates_and_retries_once() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);
        orchestrator
            .backend
            .script_acquire(AcquireOutcome::OutOfDate);

        // The caller never observes the intermediate failure
        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        assert_eq!(frame.extent(), (1280, 720));

        let calls = &orchestrator.backend().calls;
        assert_eq!(count(calls, |c| *c == Call::Acquire), 2);
        assert_eq!(count(calls, |c| matches!(c, Call::Recreate(_, _))), 1);

        orchestrator.end_frame(frame).expect("end failed");
    }

    #[test]
    fn out_of_date_twice_surfaces_an_error() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);
        orchestrator
            .backend
            .script_acquire(AcquireOutcome::OutOfDate);
        orchestrator
            .backend
            .script_acquire(AcquireOutcome::OutOfDate);

        assert!(matches!(
            orchestrator.begin_frame(&mut platform),
            Err(FrameError::SwapchainUnavailable)
        ));
        // The failed begin leaves the orchestrator usable
        assert_eq!(orchestrator.state(), LoopState::Idle);
    }

    #[test]
    fn stale_present_never_aborts_the_frame() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);
        orchestrator.backend.script_present(PresentOutcome::Stale);

        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        // Frame N completes normally despite the stale presentation
        orchestrator.end_frame(frame).expect("end failed");
        assert!(orchestrator.backend().swapchain_stale());

        // Recreation happens during frame N+1's begin, after a full wait
        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        let calls = &orchestrator.backend().calls;
        assert_eq!(count(calls, |c| matches!(c, Call::Recreate(_, _))), 1);
        assert_eq!(count(calls, |c| *c == Call::WaitIdle), 1);
        orchestrator.end_frame(frame).expect("end failed");
    }

    #[test]
    fn suboptimal_acquire_defers_recreation() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);
        orchestrator.backend.script_acquire(AcquireOutcome::Acquired {
            image_index: 0,
            target: (),
            suboptimal: true,
        });

        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        // The suboptimal chain still carries this frame
        assert_eq!(
            count(&orchestrator.backend().calls, |c| matches!(
                c,
                Call::Recreate(_, _)
            )),
            0
        );
        orchestrator.end_frame(frame).expect("end failed");

        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        assert_eq!(
            count(&orchestrator.backend().calls, |c| matches!(
                c,
                Call::Recreate(_, _)
            )),
            1
        );
        orchestrator.end_frame(frame).expect("end failed");
    }

    #[test]
    fn slots_rotate_between_frames() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);

        for _ in 0..3 {
            let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
            orchestrator.end_frame(frame).expect("end failed");
        }

        // Recordings carry the slot index in the mock
        assert_eq!(orchestrator.slot, 3 % crate::MAX_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);

        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        orchestrator.end_frame(frame).expect("end failed");

        orchestrator.shutdown().expect("shutdown failed");
        assert_eq!(orchestrator.state(), LoopState::Terminated);

        // Second shutdown is a no-op, not a double teardown
        orchestrator.shutdown().expect("second shutdown failed");
        let calls = &orchestrator.backend().calls;
        assert_eq!(count(calls, |c| *c == Call::Destroy), 1);
        assert_eq!(count(calls, |c| *c == Call::WaitIdle), 1);
    }

    #[test]
    fn shutdown_while_active_is_rejected() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);

        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        assert!(matches!(
            orchestrator.shutdown(),
            Err(FrameError::ShutdownWhileActive)
        ));
        orchestrator.end_frame(frame).expect("end failed");
        orchestrator.shutdown().expect("shutdown failed");
    }

    #[test]
    fn no_frames_begin_after_termination() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);

        orchestrator.shutdown().expect("shutdown failed");
        assert!(matches!(
            orchestrator.begin_frame(&mut platform),
            Err(FrameError::Terminated)
        ));
    }

    #[test]
    fn close_request_does_not_disturb_the_open_frame() {
        let (mut orchestrator, mut platform) = orchestrator_at(1280, 720);

        let frame = orchestrator.begin_frame(&mut platform).expect("begin failed");
        // The user closes the window mid-frame
        platform.request_close();
        assert!(!platform.alive());

        // The open frame still completes end_frame normally
        orchestrator.end_frame(frame).expect("end failed");
        orchestrator.shutdown().expect("shutdown failed");
    }
}
