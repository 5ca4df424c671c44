use std::sync::mpsc;
use std::time::Duration;

use crate::error::ResourceError;
use crate::gfx::Extent;

const BYTES_PER_PIXEL: u32 = 4;
const MAP_ATTEMPTS: u32 = 2000;

/// Row pitch of a texture-to-buffer copy, padded to wgpu's alignment.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies tightly packed rows out of a row-padded buffer.
pub(crate) fn strip_row_padding(padded: &[u8], size: Extent, out: &mut Vec<u8>) {
    let row = (size.width * BYTES_PER_PIXEL) as usize;
    let pitch = padded_bytes_per_row(size.width) as usize;
    out.clear();
    out.reserve(size.rgba_len());
    for y in 0..size.height as usize {
        let start = y * pitch;
        out.extend_from_slice(&padded[start..start + row]);
    }
}

/// Synchronously reads an RGBA8 texture of `size` into `out`.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    size: Extent,
    out: &mut Vec<u8>,
) -> Result<(), ResourceError> {
    let pitch = padded_bytes_per_row(size.width);
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("prism readback buffer"),
        size: u64::from(pitch) * u64::from(size.height),
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("prism readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(pitch),
                rows_per_image: Some(size.height),
            },
        },
        wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    let mut mapped = None;
    for _ in 0..MAP_ATTEMPTS {
        let _ = device.poll(wgpu::PollType::Poll);
        if let Ok(result) = rx.try_recv() {
            mapped = Some(result);
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    match mapped {
        Some(Ok(())) => {}
        Some(Err(e)) => return Err(ResourceError::Readback(e.to_string())),
        None => return Err(ResourceError::Readback("timed out mapping readback buffer".into())),
    }

    {
        let view = slice.get_mapped_range();
        strip_row_padding(&view, size, out);
    }
    buffer.unmap();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }

    #[test]
    fn padding_is_stripped_per_row() {
        let size = Extent::new(2, 2);
        let mut padded = vec![0u8; 512];
        padded[..8].copy_from_slice(&[1; 8]);
        padded[256..264].copy_from_slice(&[2; 8]);

        let mut out = vec![9; 3];
        strip_row_padding(&padded, size, &mut out);
        assert_eq!(out.len(), 16);
        assert!(out[..8].iter().all(|b| *b == 1));
        assert!(out[8..].iter().all(|b| *b == 2));
    }
}
