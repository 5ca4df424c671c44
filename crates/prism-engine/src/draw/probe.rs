use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::gfx::Extent;
use crate::scene::SceneNode;
use crate::shader::UniformType;

/// What an attached debug probe records.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DebugProbeConfig {
    /// Time every draw call.
    pub profile: bool,
    /// Read back every node's target.
    pub capture: bool,
    /// Minimum time between two captured frames; zero captures every frame.
    pub capture_rate: Duration,
}

impl Default for DebugProbeConfig {
    fn default() -> Self {
        Self {
            profile: true,
            capture: true,
            capture_rate: Duration::ZERO,
        }
    }
}

/// Timings of one node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    /// The node's own draw call.
    pub exclusive: Duration,
    /// Exclusive plus every (context) child and consumed content.
    pub inclusive: Duration,
}

/// Pixels read back from a node's target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCapture {
    pub size: Extent,
    pub pixels: Vec<u8>,
}

/// One drawn node as seen by the probe.
#[derive(Debug, Clone)]
pub struct DebugNode {
    pub shader: String,
    pub uniform_types: BTreeMap<String, UniformType>,
    pub source: Arc<SceneNode>,
    pub profile: Option<Profile>,
    pub capture: Option<NodeCapture>,
    pub children: Vec<DebugNode>,
    pub context_children: Vec<DebugNode>,
}

impl DebugNode {
    pub(crate) fn take_captures(&mut self, out: &mut Vec<Vec<u8>>) {
        if let Some(capture) = self.capture.take() {
            out.push(capture.pixels);
        }
        for child in self.context_children.iter_mut().chain(&mut self.children) {
            child.take_captures(out);
        }
    }
}

/// One content input as seen by the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugContent {
    pub index: usize,
    pub label: String,
    /// Time spent uploading the content this frame.
    pub profile: Option<Duration>,
    /// The uploaded pixels, when this frame was captured.
    pub capture: Option<NodeCapture>,
}

/// Everything the probe sink receives after a draw.
#[derive(Debug, Clone)]
pub struct DebugFrame {
    pub tree: DebugNode,
    pub contents: Vec<DebugContent>,
}

/// Instrumentation attached to a surface.
pub struct DebugProbe {
    config: DebugProbeConfig,
    last_capture: Option<Instant>,
    on_draw: Box<dyn FnMut(&DebugFrame)>,
}

impl fmt::Debug for DebugProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugProbe")
            .field("config", &self.config)
            .field("last_capture", &self.last_capture)
            .finish_non_exhaustive()
    }
}

impl DebugProbe {
    pub fn new(config: DebugProbeConfig, on_draw: impl FnMut(&DebugFrame) + 'static) -> Self {
        Self {
            config,
            last_capture: None,
            on_draw: Box::new(on_draw),
        }
    }

    pub fn config(&self) -> DebugProbeConfig {
        self.config
    }

    pub fn profiles(&self) -> bool {
        self.config.profile
    }

    /// Decides whether the frame drawn at `now` is captured, and if so
    /// records it as the last capture.
    pub fn should_capture(&mut self, now: Instant) -> bool {
        if !self.config.capture {
            return false;
        }
        let due = match self.last_capture {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.config.capture_rate,
        };
        if due {
            self.last_capture = Some(now);
        }
        due
    }

    pub(crate) fn emit(&mut self, frame: &DebugFrame) {
        (self.on_draw)(frame);
    }
}
