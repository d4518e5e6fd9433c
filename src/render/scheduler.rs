//! Explicit frame scheduling.
//!
//! The host owns the per-frame primitive (`requestAnimationFrame`, a winit
//! redraw request, a test loop). [`AnimationLoop`] asks it for one frame at
//! a time and only asks again after rendering while it is running, so
//! stopping is a state change rather than breaking a callback chain.

use tracing::{debug, warn};

use crate::render::backend::{RenderError, Renderer};
use crate::render::context::RenderContext;

/// Host token for a requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Host-side per-frame callback primitive.
pub trait FrameScheduler {
    /// Ask for [`AnimationLoop::on_frame`] to be called once, soon.
    fn request_frame(&mut self) -> FrameRequest;

    /// Withdraw a request that has not fired yet.
    fn cancel_frame(&mut self, request: FrameRequest);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Never started, or cancelled.
    Idle,
    Running,
    /// Stopped; an outstanding request is ignored when it fires.
    Stopped,
}

pub struct AnimationLoop<S: FrameScheduler> {
    scheduler: S,
    state: LoopState,
    pending: Option<FrameRequest>,
    frames_rendered: u64,
}

impl<S: FrameScheduler> AnimationLoop<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            state: LoopState::Idle,
            pending: None,
            frames_rendered: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Start requesting frames. No-op while already running.
    pub fn start(&mut self) {
        if self.state == LoopState::Running {
            return;
        }
        self.state = LoopState::Running;
        if self.pending.is_none() {
            self.pending = Some(self.scheduler.request_frame());
        }
        debug!("animation loop started");
    }

    /// Stop after the current frame. The outstanding request is left with
    /// the host and ignored when it fires.
    pub fn stop(&mut self) {
        if self.state == LoopState::Running {
            self.state = LoopState::Stopped;
            debug!("animation loop stopped");
        }
    }

    /// Stop and withdraw the outstanding request from the host.
    pub fn cancel(&mut self) {
        if let Some(request) = self.pending.take() {
            self.scheduler.cancel_frame(request);
        }
        self.state = LoopState::Idle;
        debug!("animation loop cancelled");
    }

    /// Cancel, then start again. Used around a reload.
    pub fn restart(&mut self) {
        self.cancel();
        self.start();
    }

    /// Host callback for a fired frame request.
    ///
    /// Stale requests and frames arriving while not running are ignored. A
    /// draw failure stops the loop.
    pub fn on_frame<R: Renderer>(
        &mut self,
        request: FrameRequest,
        context: &mut RenderContext<R>,
    ) -> Result<(), RenderError> {
        if self.pending != Some(request) {
            return Ok(());
        }
        self.pending = None;
        if self.state != LoopState::Running {
            return Ok(());
        }

        if let Err(e) = context.render_frame() {
            warn!("frame failed, stopping animation loop: {e}");
            self.state = LoopState::Stopped;
            return Err(e);
        }
        self.frames_rendered += 1;
        self.pending = Some(self.scheduler.request_frame());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::context::tests::{RecordingRenderer, shaders, triangle_bytes};
    use crate::render::uniforms::Viewport;

    #[derive(Default)]
    struct ManualScheduler {
        next: u64,
        outstanding: Vec<FrameRequest>,
        cancelled: Vec<FrameRequest>,
    }

    impl ManualScheduler {
        fn fire(&mut self) -> Option<FrameRequest> {
            if self.outstanding.is_empty() {
                None
            } else {
                Some(self.outstanding.remove(0))
            }
        }
    }

    impl FrameScheduler for ManualScheduler {
        fn request_frame(&mut self) -> FrameRequest {
            self.next += 1;
            let request = FrameRequest(self.next);
            self.outstanding.push(request);
            request
        }

        fn cancel_frame(&mut self, request: FrameRequest) {
            self.outstanding.retain(|r| *r != request);
            self.cancelled.push(request);
        }
    }

    fn loaded_context() -> RenderContext<RecordingRenderer> {
        let mut ctx = RenderContext::new(RecordingRenderer::default(), Viewport::new(4, 3));
        ctx.reload(&shaders(), &triangle_bytes()).unwrap();
        ctx
    }

    #[test]
    fn runs_one_frame_per_request() {
        let mut ctx = loaded_context();
        let mut anim = AnimationLoop::new(ManualScheduler::default());
        assert_eq!(anim.state(), LoopState::Idle);

        anim.start();
        anim.start();
        assert_eq!(anim.scheduler().outstanding.len(), 1);

        for _ in 0..3 {
            let request = anim.scheduler_mut().fire().unwrap();
            anim.on_frame(request, &mut ctx).unwrap();
        }
        assert_eq!(anim.frames_rendered(), 3);
        assert_eq!(ctx.renderer().draws.len(), 3);
        assert_eq!(anim.pending(), Some(FrameRequest(4)));
    }

    #[test]
    fn stop_ignores_the_outstanding_frame() {
        let mut ctx = loaded_context();
        let mut anim = AnimationLoop::new(ManualScheduler::default());
        anim.start();
        anim.stop();
        assert_eq!(anim.state(), LoopState::Stopped);

        let request = anim.scheduler_mut().fire().unwrap();
        anim.on_frame(request, &mut ctx).unwrap();
        assert!(ctx.renderer().draws.is_empty());
        assert_eq!(anim.pending(), None);
        assert!(anim.scheduler().outstanding.is_empty());
    }

    #[test]
    fn cancel_withdraws_request() {
        let mut ctx = loaded_context();
        let mut anim = AnimationLoop::new(ManualScheduler::default());
        anim.start();
        anim.cancel();
        assert_eq!(anim.state(), LoopState::Idle);
        assert_eq!(anim.scheduler().cancelled, vec![FrameRequest(1)]);

        // A request that fires anyway is stale.
        anim.on_frame(FrameRequest(1), &mut ctx).unwrap();
        assert_eq!(anim.frames_rendered(), 0);
    }

    #[test]
    fn restart_replaces_request() {
        let mut anim = AnimationLoop::new(ManualScheduler::default());
        anim.start();
        anim.restart();
        assert_eq!(anim.state(), LoopState::Running);
        assert_eq!(anim.pending(), Some(FrameRequest(2)));
        assert_eq!(anim.scheduler().outstanding, vec![FrameRequest(2)]);
    }

    #[test]
    fn draw_failure_stops_loop() {
        let mut ctx = loaded_context();
        ctx.renderer_mut().fail_draw = true;
        let mut anim = AnimationLoop::new(ManualScheduler::default());
        anim.start();

        let request = anim.scheduler_mut().fire().unwrap();
        assert!(anim.on_frame(request, &mut ctx).is_err());
        assert_eq!(anim.state(), LoopState::Stopped);
        assert_eq!(anim.pending(), None);
    }
}
