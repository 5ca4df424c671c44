use std::collections::VecDeque;

use crate::gfx::{FramebufferId, GraphicsContext, ProgramId, TextureId};

/// A GPU object scheduled for release.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Disposal {
    Program(ProgramId),
    Texture(TextureId),
    Framebuffer(FramebufferId),
}

/// Ordered queue of pending releases, drained once per draw pass.
///
/// Entries are released in the order they were queued.
#[derive(Debug, Default)]
pub struct DisposalQueue {
    entries: VecDeque<Disposal>,
}

impl DisposalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, disposal: Disposal) {
        self.entries.push_back(disposal);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Releases every queued object through `ctx`.
    pub fn drain<G: GraphicsContext + ?Sized>(&mut self, ctx: &mut G) -> usize {
        let n = self.entries.len();
        while let Some(entry) = self.entries.pop_front() {
            match entry {
                Disposal::Program(id) => ctx.dispose_program(id),
                Disposal::Texture(id) => ctx.dispose_texture(id),
                Disposal::Framebuffer(id) => ctx.dispose_framebuffer(id),
            }
        }
        if n > 0 {
            log::debug!("disposed {n} deferred GPU objects");
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::recording::{Event, RecordingContext};
    use crate::gfx::{Extent, Filter};

    #[test]
    fn drain_releases_in_queue_order() {
        let mut ctx = RecordingContext::new();
        let a = ctx.create_texture(Extent::PLACEHOLDER, Filter::Linear);
        let b = ctx.create_texture(Extent::PLACEHOLDER, Filter::Linear);
        ctx.clear_events();

        let mut queue = DisposalQueue::new();
        queue.push(Disposal::Texture(b));
        queue.push(Disposal::Texture(a));
        assert_eq!(queue.drain(&mut ctx), 2);
        assert!(queue.is_empty());
        assert_eq!(
            ctx.events,
            vec![Event::DisposeTexture(b), Event::DisposeTexture(a)]
        );
    }
}
