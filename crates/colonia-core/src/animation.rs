//! Keeps a factory's work animation in step with its production gate.
//!
//! The animation itself is a presentational asset behind [`Animation`]; the
//! only rule here is that it runs exactly while the factory may work.

use crate::fixed::Ticks;
use serde::{Deserialize, Serialize};

/// Index of a picture in the asset atlas.
pub type FrameId = u32;

/// A looping picture sequence.
pub trait Animation {
    fn start(&mut self);
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    fn is_stopped(&self) -> bool {
        !self.is_running()
    }
    fn advance(&mut self, time: Ticks);
    fn current_frame(&self) -> Option<FrameId>;
}

/// Start or stop request issued by [`sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationSignal {
    Start,
    Stop,
}

/// Start a stopped animation when work is allowed, stop a running one when
/// it is not. Returns the signal that was applied, if any.
pub fn sync<A: Animation + ?Sized>(may_work: bool, animation: &mut A) -> Option<AnimationSignal> {
    if may_work && animation.is_stopped() {
        animation.start();
        Some(AnimationSignal::Start)
    } else if !may_work && animation.is_running() {
        animation.stop();
        Some(AnimationSignal::Stop)
    } else {
        None
    }
}

/// Which pictures a factory kind animates through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationSpec {
    pub first_frame: FrameId,
    pub frame_count: u32,
    /// Ticks each frame stays on screen.
    #[serde(default = "default_frame_delay")]
    pub frame_delay: u32,
}

fn default_frame_delay() -> u32 {
    1
}

/// Built-in [`Animation`]: cycles through `frame_count` consecutive frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLoop {
    spec: Option<AnimationSpec>,
    index: u32,
    running: bool,
}

impl FrameLoop {
    pub fn new(spec: Option<AnimationSpec>) -> Self {
        Self {
            spec,
            index: 0,
            running: false,
        }
    }

    pub fn spec(&self) -> Option<AnimationSpec> {
        self.spec
    }
}

impl Animation for FrameLoop {
    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn advance(&mut self, time: Ticks) {
        let Some(spec) = self.spec else {
            return;
        };
        if !self.running || spec.frame_count == 0 {
            return;
        }
        if time % Ticks::from(spec.frame_delay.max(1)) == 0 {
            self.index = (self.index + 1) % spec.frame_count;
        }
    }

    fn current_frame(&self) -> Option<FrameId> {
        let spec = self.spec?;
        if spec.frame_count == 0 {
            return None;
        }
        Some(spec.first_frame + self.index)
    }
}
