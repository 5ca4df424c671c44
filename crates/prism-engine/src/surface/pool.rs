use crate::cache::ResourceCache;
use crate::gfx::GraphicsContext;

/// Default number of idle surfaces kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 20;

/// A graphics context together with the cache of objects created on it.
#[derive(Debug)]
pub struct SurfaceResources<G> {
    pub ctx: G,
    pub cache: ResourceCache,
}

impl<G> SurfaceResources<G> {
    pub fn new(ctx: G) -> Self {
        Self {
            ctx,
            cache: ResourceCache::new(),
        }
    }
}

/// Bounded pool of idle [`SurfaceResources`].
///
/// Owned by the application and handed to whatever mounts surfaces; there is
/// no global instance.
#[derive(Debug)]
pub struct SurfacePool<G> {
    idle: Vec<SurfaceResources<G>>,
    capacity: usize,
}

impl<G: GraphicsContext> SurfacePool<G> {
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Reuses the most recently released entry or builds a new one.
    pub fn acquire<E>(
        &mut self,
        create: impl FnOnce() -> Result<G, E>,
    ) -> Result<SurfaceResources<G>, E> {
        match self.idle.pop() {
            Some(resources) => {
                log::debug!("surface resources reused ({} idle left)", self.idle.len());
                Ok(resources)
            }
            None => Ok(SurfaceResources::new(create()?)),
        }
    }

    /// Keeps `resources` for reuse, or releases its cache when the pool is full.
    pub fn release(&mut self, mut resources: SurfaceResources<G>) {
        if self.idle.len() < self.capacity {
            self.idle.push(resources);
        } else {
            log::debug!("surface pool full, releasing resources");
            resources.cache.dispose_all(&mut resources.ctx);
        }
    }

    /// Releases every idle entry.
    pub fn clear(&mut self) {
        for mut resources in self.idle.drain(..) {
            resources.cache.dispose_all(&mut resources.ctx);
        }
    }
}

impl<G: GraphicsContext> Default for SurfacePool<G> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}
