/// Outstanding work of a surface.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    /// The current tree must be drawn again.
    DrawPending,
    /// The scene changed; compile, then draw.
    SyncPending,
}

/// What one animation frame callback should do.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct FramePlan {
    pub sync: bool,
    pub draw: bool,
}

/// Decides, once per host animation frame, whether to compile and/or draw.
///
/// At most one frame callback is armed at a time; requests made while one is
/// armed fold into it. Auto-redraw re-arms a callback every frame regardless
/// of pending work.
///
/// A failed compile keeps `SyncPending` but is not retried until the scene
/// generation changes.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    state: FrameState,
    callback_armed: bool,
    auto_redraw: bool,
    scene_generation: u64,
    failed_generation: Option<u64>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn auto_redraw(&self) -> bool {
        self.auto_redraw
    }

    /// Whether a frame callback is armed.
    pub fn wants_frame(&self) -> bool {
        self.callback_armed
    }

    /// Returns true when this call armed a new callback.
    fn arm(&mut self) -> bool {
        !std::mem::replace(&mut self.callback_armed, true)
    }

    /// The scene description changed.
    pub fn invalidate_scene(&mut self) -> bool {
        self.scene_generation = self.scene_generation.wrapping_add(1);
        self.state = FrameState::SyncPending;
        log::debug!("scene generation {} pending", self.scene_generation);
        self.arm()
    }

    /// Redraw the current tree without recompiling.
    pub fn request_draw(&mut self) -> bool {
        if self.state == FrameState::Idle {
            self.state = FrameState::DrawPending;
        }
        self.arm()
    }

    pub fn set_auto_redraw(&mut self, on: bool) -> bool {
        self.auto_redraw = on;
        on && self.arm()
    }

    /// Consumes the armed callback and plans the frame.
    pub fn begin_frame(&mut self) -> FramePlan {
        self.callback_armed = false;
        let sync = self.state == FrameState::SyncPending
            && self.failed_generation != Some(self.scene_generation);
        let draw = self.state != FrameState::Idle || self.auto_redraw;
        if self.auto_redraw {
            self.callback_armed = true;
        }
        FramePlan { sync, draw }
    }

    pub fn finish_sync(&mut self, ok: bool) {
        if ok {
            self.failed_generation = None;
            self.state = FrameState::DrawPending;
        } else {
            self.failed_generation = Some(self.scene_generation);
        }
    }

    /// `drawn` is false when the draw was withheld; it then stays pending.
    pub fn finish_draw(&mut self, drawn: bool) {
        if drawn && self.state == FrameState::DrawPending {
            self.state = FrameState::Idle;
        }
    }

    /// Drops the armed callback and all pending work.
    pub fn cancel(&mut self) {
        self.callback_armed = false;
        self.auto_redraw = false;
        self.state = FrameState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_fold_into_one_callback() {
        let mut s = FrameScheduler::new();
        assert!(s.invalidate_scene());
        assert!(!s.invalidate_scene());
        assert!(!s.request_draw());
        assert_eq!(s.state(), FrameState::SyncPending);
        assert!(s.wants_frame());
    }

    #[test]
    fn draw_request_does_not_require_sync() {
        let mut s = FrameScheduler::new();
        assert!(s.request_draw());
        assert_eq!(s.begin_frame(), FramePlan { sync: false, draw: true });
        s.finish_draw(true);
        assert_eq!(s.state(), FrameState::Idle);
        assert!(!s.wants_frame());
    }

    #[test]
    fn sync_then_draw_returns_to_idle() {
        let mut s = FrameScheduler::new();
        s.invalidate_scene();
        assert_eq!(s.begin_frame(), FramePlan { sync: true, draw: true });
        s.finish_sync(true);
        assert_eq!(s.state(), FrameState::DrawPending);
        s.finish_draw(true);
        assert_eq!(s.state(), FrameState::Idle);
    }

    #[test]
    fn withheld_draw_stays_pending() {
        let mut s = FrameScheduler::new();
        s.invalidate_scene();
        s.begin_frame();
        s.finish_sync(true);
        s.finish_draw(false);
        assert_eq!(s.state(), FrameState::DrawPending);
        assert!(s.request_draw());
        assert_eq!(s.begin_frame(), FramePlan { sync: false, draw: true });
    }

    #[test]
    fn failed_sync_is_not_retried_until_scene_changes() {
        let mut s = FrameScheduler::new();
        s.invalidate_scene();
        assert!(s.begin_frame().sync);
        s.finish_sync(false);
        s.finish_draw(true);
        assert_eq!(s.state(), FrameState::SyncPending);

        s.request_draw();
        assert_eq!(s.begin_frame(), FramePlan { sync: false, draw: true });

        s.invalidate_scene();
        assert!(s.begin_frame().sync);
    }

    #[test]
    fn auto_redraw_rearms_every_frame() {
        let mut s = FrameScheduler::new();
        assert!(s.set_auto_redraw(true));
        for _ in 0..3 {
            assert_eq!(s.begin_frame(), FramePlan { sync: false, draw: true });
            assert!(s.wants_frame());
        }
        s.set_auto_redraw(false);
        s.begin_frame();
        assert!(!s.wants_frame());
    }

    #[test]
    fn cancel_clears_everything() {
        let mut s = FrameScheduler::new();
        s.set_auto_redraw(true);
        s.invalidate_scene();
        s.cancel();
        assert!(!s.wants_frame());
        assert_eq!(s.state(), FrameState::Idle);
        assert_eq!(s.begin_frame(), FramePlan::default());
    }
}
