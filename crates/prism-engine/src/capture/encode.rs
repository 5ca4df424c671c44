use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::error::ResourceError;
use crate::gfx::Extent;

use super::{CaptureFormat, CaptureOptions};

/// Encoded capture handed to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureData {
    /// `data:<mime>;base64,<payload>`
    Base64(String),
    Blob { mime: String, bytes: Vec<u8> },
}

impl CaptureData {
    pub fn mime(&self) -> &str {
        match self {
            CaptureData::Base64(url) => url
                .strip_prefix("data:")
                .and_then(|rest| rest.split(';').next())
                .unwrap_or_default(),
            CaptureData::Blob { mime, .. } => mime,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    fn from_type(ty: &str) -> Self {
        let ty = ty.trim().to_ascii_lowercase();
        match ty.strip_prefix("image/").unwrap_or(&ty) {
            "png" => ImageKind::Png,
            "jpeg" | "jpg" => ImageKind::Jpeg,
            other => {
                log::warn!("capture type '{other}' is not supported, encoding as png");
                ImageKind::Png
            }
        }
    }

    fn mime(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }
}

fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encodes tightly packed RGBA8 pixels per `options`.
pub fn encode(
    pixels: &[u8],
    size: Extent,
    options: &CaptureOptions,
) -> Result<CaptureData, ResourceError> {
    let kind = ImageKind::from_type(&options.mime);
    let mime = kind.mime();
    let fail = |e: image::ImageError| ResourceError::Encode {
        mime: mime.to_string(),
        message: e.to_string(),
    };

    if pixels.len() != size.rgba_len() {
        return Err(ResourceError::Encode {
            mime: mime.to_string(),
            message: format!(
                "{}x{} capture needs {} bytes, got {}",
                size.width,
                size.height,
                size.rgba_len(),
                pixels.len()
            ),
        });
    }

    let mut bytes = Vec::new();
    match kind {
        ImageKind::Png => PngEncoder::new(&mut bytes)
            .write_image(pixels, size.width, size.height, ExtendedColorType::Rgba8)
            .map_err(fail)?,
        ImageKind::Jpeg => {
            let rgb: Vec<u8> = pixels
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(options.quality))
                .write_image(&rgb, size.width, size.height, ExtendedColorType::Rgb8)
                .map_err(fail)?
        }
    }

    Ok(match options.format {
        CaptureFormat::Base64 => {
            CaptureData::Base64(format!("data:{mime};base64,{}", STANDARD.encode(&bytes)))
        }
        CaptureFormat::Blob => CaptureData::Blob {
            mime: mime.to_string(),
            bytes,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];

    fn red(size: Extent) -> Vec<u8> {
        [255, 0, 0, 255].repeat(size.width as usize * size.height as usize)
    }

    #[test]
    fn png_blob_starts_with_signature() {
        let size = Extent::new(2, 2);
        let opts = CaptureOptions::default().with_format(CaptureFormat::Blob);
        let CaptureData::Blob { mime, bytes } = encode(&red(size), size, &opts).unwrap() else {
            panic!("expected blob");
        };
        assert_eq!(mime, "image/png");
        assert!(bytes.starts_with(PNG_MAGIC));
    }

    #[test]
    fn base64_is_a_data_url() {
        let size = Extent::new(1, 1);
        let data = encode(&red(size), size, &CaptureOptions::default()).unwrap();
        let CaptureData::Base64(url) = &data else {
            panic!("expected base64");
        };
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(data.mime(), "image/png");
    }

    #[test]
    fn jpeg_accepts_prefixed_type() {
        let size = Extent::new(4, 4);
        let opts = CaptureOptions::default()
            .with_format(CaptureFormat::Blob)
            .with_mime("image/jpg")
            .with_quality(0.8);
        let data = encode(&red(size), size, &opts).unwrap();
        assert_eq!(data.mime(), "image/jpeg");
        let CaptureData::Blob { bytes, .. } = data else {
            panic!("expected blob");
        };
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn unsupported_type_falls_back_to_png() {
        let size = Extent::new(1, 1);
        let opts = CaptureOptions::default().with_mime("webp");
        assert_eq!(encode(&red(size), size, &opts).unwrap().mime(), "image/png");
    }

    #[test]
    fn short_buffer_is_an_encode_error() {
        let err = encode(&[0; 3], Extent::new(1, 1), &CaptureOptions::default()).unwrap_err();
        assert!(matches!(err, ResourceError::Encode { .. }));
    }

    #[test]
    fn jpeg_quality_is_clamped() {
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(0.5), 50);
        assert_eq!(jpeg_quality(1.0), 100);
    }
}
