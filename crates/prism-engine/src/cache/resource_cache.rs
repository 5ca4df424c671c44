use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::error::{CompileError, LoadError, ProgramError, SyncError};
use crate::gfx::{Extent, Filter, Framebuffer, GraphicsContext, ProgramId, ProgramInfo, TextureId};
use crate::loader::DecodedImage;
use crate::shader::{ShaderId, ShaderRegistry, UniformType};

use super::{Disposal, DisposalQueue};

/// A compiled shader program, shared between the cache and compiled trees.
#[derive(Debug, PartialEq)]
pub struct Program {
    pub shader: ShaderId,
    pub name: String,
    pub info: ProgramInfo,
}

impl Program {
    #[inline]
    pub fn id(&self) -> ProgramId {
        self.info.id
    }

    pub fn uniform_type(&self, name: &str) -> Option<UniformType> {
        self.info.uniforms.get(name).copied()
    }
}

/// Load state of an image resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ImageState {
    /// Placeholder content until the load completes.
    Loading,
    Ready(Extent),
    /// The load failed; the placeholder stays bound.
    Failed,
}

/// A uri-backed texture whose handle is stable across frames.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ImageResource {
    pub texture: TextureId,
    pub state: ImageState,
}

#[derive(Debug, Copy, Clone)]
struct CachedFramebuffer {
    framebuffer: Framebuffer,
    size: Extent,
}

#[derive(Debug, Copy, Clone)]
struct ContentTexture {
    texture: TextureId,
    size: Extent,
}

/// Image bookkeeping produced by a committed synchronization.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Uris that got a fresh resource and need loading.
    pub new_images: Vec<String>,
    /// Uris whose resources were dropped from the live set.
    pub dropped_images: Vec<String>,
}

/// GPU objects owned by one surface.
///
/// Shaders, images and standalone textures are diffed against the live set
/// of each committed sync. Framebuffers and content textures persist until
/// the pool is resized or the cache is disposed. Nothing is released before
/// [`ResourceCache::drain_disposals`] runs after a draw.
///
/// Content textures cut from the pool stay retired until the next committed
/// sync, since the authoritative tree may still bind them.
#[derive(Debug, Default)]
pub struct ResourceCache {
    shaders: HashMap<ShaderId, Rc<Program>>,
    images: HashMap<String, ImageResource>,
    framebuffers: BTreeMap<u32, CachedFramebuffer>,
    content: Vec<ContentTexture>,
    retired_content: Vec<TextureId>,
    standalone: Vec<TextureId>,
    disposals: DisposalQueue,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a synchronization transaction.
    pub fn begin_sync(&mut self) -> SyncPass<'_> {
        SyncPass {
            cache: self,
            shaders: HashMap::new(),
            images: HashMap::new(),
            framebuffers: BTreeMap::new(),
            standalone: Vec::new(),
            created: Vec::new(),
            new_images: Vec::new(),
        }
    }

    pub fn shader(&self, id: ShaderId) -> Option<&Rc<Program>> {
        self.shaders.get(&id)
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    pub fn image(&self, uri: &str) -> Option<&ImageResource> {
        self.images.get(uri)
    }

    pub fn image_uris(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn standalone_count(&self) -> usize {
        self.standalone.len()
    }

    pub fn framebuffer(&self, slot: u32) -> Option<Framebuffer> {
        self.framebuffers.get(&slot).map(|c| c.framebuffer)
    }

    /// Returns the framebuffer for `slot` sized to `size`, creating or
    /// resizing it as needed.
    pub fn framebuffer_sized<G: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut G,
        slot: u32,
        size: Extent,
    ) -> Framebuffer {
        match self.framebuffers.get_mut(&slot) {
            Some(cached) => {
                if cached.size != size {
                    ctx.resize_framebuffer(cached.framebuffer.id, size);
                    cached.size = size;
                }
                cached.framebuffer
            }
            None => {
                let framebuffer = ctx.create_framebuffer(size);
                log::debug!("framebuffer #{slot} created at {}x{}", size.width, size.height);
                self.framebuffers
                    .insert(slot, CachedFramebuffer { framebuffer, size });
                framebuffer
            }
        }
    }

    pub fn content_len(&self) -> usize {
        self.content.len()
    }

    pub fn content_texture(&self, index: usize) -> Option<TextureId> {
        self.content.get(index).map(|c| c.texture)
    }

    pub fn retired_content_len(&self) -> usize {
        self.retired_content.len()
    }

    /// Grows or shrinks the content texture pool to `len` entries.
    ///
    /// Excess textures are retired; the next commit queues them for disposal.
    pub fn resize_content_textures<G: GraphicsContext + ?Sized>(&mut self, ctx: &mut G, len: usize) {
        while self.content.len() < len {
            let texture = ctx.create_texture(Extent::PLACEHOLDER, Filter::Linear);
            self.content.push(ContentTexture {
                texture,
                size: Extent::PLACEHOLDER,
            });
        }
        while self.content.len() > len {
            if let Some(excess) = self.content.pop() {
                self.retired_content.push(excess.texture);
            }
        }
    }

    /// Brings content texture `index` up to date with an external frame.
    ///
    /// Without a frame the texture is left at the placeholder shape.
    pub fn sync_content_texture<G: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut G,
        index: usize,
        frame: Option<(Extent, &[u8])>,
    ) {
        let Some(slot) = self.content.get_mut(index) else {
            return;
        };
        match frame {
            Some((size, pixels)) => {
                ctx.upload_texture(slot.texture, size, pixels);
                slot.size = size;
            }
            None if slot.size != Extent::PLACEHOLDER => {
                ctx.set_texture_shape(slot.texture, Extent::PLACEHOLDER);
                slot.size = Extent::PLACEHOLDER;
            }
            None => {}
        }
    }

    /// Applies a finished load to the image resource for `uri`.
    ///
    /// Returns the new state, or `None` when the uri is no longer cached.
    pub fn complete_image<G: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut G,
        uri: &str,
        result: Result<DecodedImage, LoadError>,
    ) -> Option<ImageState> {
        let image = self.images.get_mut(uri)?;
        image.state = match result {
            Ok(decoded) if decoded.pixels.len() == decoded.size.rgba_len() => {
                ctx.upload_texture(image.texture, decoded.size, &decoded.pixels);
                ImageState::Ready(decoded.size)
            }
            Ok(decoded) => {
                log::warn!(
                    "image '{uri}' decoded to {} bytes, expected {}",
                    decoded.pixels.len(),
                    decoded.size.rgba_len()
                );
                ImageState::Failed
            }
            Err(e) => {
                log::warn!("{e}");
                ImageState::Failed
            }
        };
        Some(image.state)
    }

    pub fn pending_disposals(&self) -> usize {
        self.disposals.len()
    }

    /// Releases everything queued since the last drain.
    pub fn drain_disposals<G: GraphicsContext + ?Sized>(&mut self, ctx: &mut G) -> usize {
        self.disposals.drain(ctx)
    }

    /// Releases every object the cache owns, leaving it empty.
    pub fn dispose_all<G: GraphicsContext + ?Sized>(&mut self, ctx: &mut G) {
        for (_, program) in self.shaders.drain() {
            self.disposals.push(Disposal::Program(program.id()));
        }
        for (_, image) in self.images.drain() {
            self.disposals.push(Disposal::Texture(image.texture));
        }
        for texture in self.standalone.drain(..) {
            self.disposals.push(Disposal::Texture(texture));
        }
        for content in self.content.drain(..) {
            self.disposals.push(Disposal::Texture(content.texture));
        }
        for texture in self.retired_content.drain(..) {
            self.disposals.push(Disposal::Texture(texture));
        }
        for (_, cached) in std::mem::take(&mut self.framebuffers) {
            self.disposals.push(Disposal::Framebuffer(cached.framebuffer.id));
        }
        self.disposals.drain(ctx);
    }
}

/// One synchronization transaction over a [`ResourceCache`].
///
/// Collects the live set of the tree being compiled. [`SyncPass::commit`]
/// replaces the cache's live sets and queues stale entries for disposal;
/// [`SyncPass::rollback`] releases what the pass created and leaves the cache
/// as it was.
pub struct SyncPass<'c> {
    cache: &'c mut ResourceCache,
    shaders: HashMap<ShaderId, Rc<Program>>,
    images: HashMap<String, ImageResource>,
    framebuffers: BTreeMap<u32, CachedFramebuffer>,
    standalone: Vec<TextureId>,
    created: Vec<Disposal>,
    new_images: Vec<String>,
}

impl SyncPass<'_> {
    /// Resolves a shader: this pass first, then the previous live set, then a
    /// fresh compile.
    pub fn get_or_create_shader<G: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut G,
        registry: &dyn ShaderRegistry,
        id: ShaderId,
    ) -> Result<Rc<Program>, SyncError> {
        if let Some(program) = self.shaders.get(&id) {
            return Ok(Rc::clone(program));
        }
        if let Some(program) = self.cache.shaders.get(&id) {
            self.shaders.insert(id, Rc::clone(program));
            return Ok(Rc::clone(program));
        }

        let source = registry.get(id).ok_or(CompileError::UnknownShader(id))?;
        let info = match ctx.create_program(&source.name, &source.fragment) {
            Ok(info) => info,
            Err(ProgramError::Compile(message)) => {
                return Err(CompileError::ShaderCompile {
                    shader: source.name.clone(),
                    message,
                }
                .into());
            }
            Err(ProgramError::Device(e)) => {
                return Err(SyncError::Fatal(
                    e.context(format!("creating program for shader '{}'", source.name)),
                ));
            }
        };
        log::debug!("program {:?} compiled for shader '{}'", info.id, source.name);

        self.created.push(Disposal::Program(info.id));
        let program = Rc::new(Program {
            shader: id,
            name: source.name.clone(),
            info,
        });
        self.shaders.insert(id, Rc::clone(&program));
        Ok(program)
    }

    /// Resolves the image resource for `uri`, creating a placeholder-backed
    /// one when neither this pass nor the previous live set has it.
    pub fn get_or_create_image<G: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut G,
        uri: &str,
    ) -> ImageResource {
        if let Some(image) = self.images.get(uri) {
            return *image;
        }
        let image = match self.cache.images.get(uri) {
            Some(image) => *image,
            None => {
                let texture = ctx.create_texture(Extent::PLACEHOLDER, Filter::Linear);
                self.created.push(Disposal::Texture(texture));
                self.new_images.push(uri.to_string());
                ImageResource {
                    texture,
                    state: ImageState::Loading,
                }
            }
        };
        self.images.insert(uri.to_string(), image);
        image
    }

    /// Returns the framebuffer for `slot`, creating it at the placeholder size.
    pub fn get_or_create_framebuffer<G: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut G,
        slot: u32,
    ) -> Framebuffer {
        if let Some(fb) = self.cache.framebuffer(slot) {
            return fb;
        }
        if let Some(cached) = self.framebuffers.get(&slot) {
            return cached.framebuffer;
        }
        let framebuffer = ctx.create_framebuffer(Extent::PLACEHOLDER);
        self.created.push(Disposal::Framebuffer(framebuffer.id));
        self.framebuffers.insert(
            slot,
            CachedFramebuffer {
                framebuffer,
                size: Extent::PLACEHOLDER,
            },
        );
        framebuffer
    }

    /// Creates a texture that lives until the next committed sync.
    pub fn create_standalone_texture<G: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut G,
        size: Extent,
        filter: Filter,
        pixels: Option<&[u8]>,
    ) -> TextureId {
        let texture = ctx.create_texture(size, filter);
        if let Some(pixels) = pixels {
            ctx.upload_texture(texture, size, pixels);
        }
        self.created.push(Disposal::Texture(texture));
        self.standalone.push(texture);
        texture
    }

    pub fn content_texture(&self, index: usize) -> Option<TextureId> {
        self.cache.content_texture(index)
    }

    /// Makes this pass's live sets authoritative.
    pub fn commit(self) -> SyncReport {
        let SyncPass {
            cache,
            shaders,
            images,
            framebuffers,
            standalone,
            new_images,
            ..
        } = self;

        for (id, program) in &cache.shaders {
            if !shaders.contains_key(id) {
                log::debug!("program for shader '{}' dropped", program.name);
                cache.disposals.push(Disposal::Program(program.id()));
            }
        }

        let mut dropped_images = Vec::new();
        for (uri, image) in &cache.images {
            if !images.contains_key(uri) {
                cache.disposals.push(Disposal::Texture(image.texture));
                dropped_images.push(uri.clone());
            }
        }

        for texture in cache.standalone.drain(..) {
            cache.disposals.push(Disposal::Texture(texture));
        }
        for texture in cache.retired_content.drain(..) {
            log::debug!("retired content texture {texture:?} released");
            cache.disposals.push(Disposal::Texture(texture));
        }

        cache.shaders = shaders;
        cache.images = images;
        cache.standalone = standalone;
        cache.framebuffers.extend(framebuffers);

        SyncReport {
            new_images,
            dropped_images,
        }
    }

    /// Releases every object this pass created. They were never drawn, so
    /// they go immediately.
    pub fn rollback<G: GraphicsContext + ?Sized>(self, ctx: &mut G) {
        let mut queue = DisposalQueue::new();
        for disposal in self.created {
            queue.push(disposal);
        }
        queue.drain(ctx);
    }
}
