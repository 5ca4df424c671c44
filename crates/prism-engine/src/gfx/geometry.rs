use bytemuck::{Pod, Zeroable};

/// Vertex of the shared full-surface geometry (clip space).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct SurfaceVertex {
    pub pos: [f32; 2],
}

impl SurfaceVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SurfaceVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// One oversized triangle covering clip space.
///
/// A single triangle avoids the diagonal seam a two-triangle quad produces.
pub const FULL_SURFACE_TRIANGLE: [SurfaceVertex; 3] = [
    SurfaceVertex { pos: [-1.0, -1.0] },
    SurfaceVertex { pos: [-1.0, 4.0] },
    SurfaceVertex { pos: [4.0, -1.0] },
];
