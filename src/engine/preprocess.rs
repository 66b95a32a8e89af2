//! Image normalization for attribute inference.
//!
//! Turns raw upload bytes into the canonical model input: decode (with EXIF
//! orientation applied), aspect-preserving resize, centered composite onto a
//! zero-filled square canvas, then an NHWC `[1, 224, 224, 3]` tensor with
//! channels scaled to [0, 1]. The whole path is deterministic: the same
//! bytes always produce a bit-identical buffer.

use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};

use crate::engine::tensor::{TensorArena, TensorBuffer};
use crate::error::PipelineError;

/// Side length of the canonical model input canvas.
pub const INPUT_SIZE: u32 = 224;

/// Aspect-preserving fit of a source image into a target bound.
///
/// One rounding policy everywhere: scaled dimensions use round-half-up, and
/// when centering leaves an odd pixel of padding, the trailing (right or
/// bottom) side receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitScale {
    pub scaled_w: u32,
    pub scaled_h: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl FitScale {
    pub fn compute(
        source_w: u32,
        source_h: u32,
        target_w: u32,
        target_h: u32,
    ) -> Result<Self, PipelineError> {
        if source_w == 0 || source_h == 0 {
            return Err(PipelineError::Dimension {
                width: source_w,
                height: source_h,
            });
        }
        // A zero target bound would underflow the centering offsets.
        if target_w == 0 || target_h == 0 {
            return Err(PipelineError::Dimension {
                width: target_w,
                height: target_h,
            });
        }

        let scale = f32::min(
            target_w as f32 / source_w as f32,
            target_h as f32 / source_h as f32,
        );

        let scaled_w = round_half_up(source_w as f32 * scale).max(1);
        let scaled_h = round_half_up(source_h as f32 * scale).max(1);

        // Integer halving floors, so the trailing side gets the odd pixel.
        Ok(Self {
            scaled_w,
            scaled_h,
            offset_x: (target_w - scaled_w) / 2,
            offset_y: (target_h - scaled_h) / 2,
        })
    }
}

/// Round-half-up, the single rounding rule for scaled dimensions.
fn round_half_up(v: f32) -> u32 {
    (v + 0.5).floor() as u32
}

/// Decode image bytes with EXIF orientation applied.
///
/// Mobile captures often carry an orientation tag instead of rotated
/// pixels; applying it here keeps the geometric transform deterministic
/// per input bytes.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, PipelineError> {
    let image =
        image::load_from_memory(data).map_err(|e| PipelineError::Decode(e.to_string()))?;
    Ok(apply_exif_orientation(data, image))
}

fn apply_exif_orientation(data: &[u8], image: DynamicImage) -> DynamicImage {
    use std::io::Cursor;

    let orientation = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif_data) => exif_data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1) as u8,
        Err(_) => 1,
    };

    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Normalizes a decoded image into the canonical `[1, 224, 224, 3]` tensor.
///
/// The scaled image is centered on a black canvas; the padding area stays
/// exactly 0.0 after normalization. Ownership of the returned buffer moves
/// to the caller.
pub fn normalize(
    image: &DynamicImage,
    arena: &Arc<TensorArena>,
) -> Result<TensorBuffer, PipelineError> {
    let (source_w, source_h) = image.dimensions();
    let fit = FitScale::compute(source_w, source_h, INPUT_SIZE, INPUT_SIZE)?;

    let resized = image.resize_exact(
        fit.scaled_w,
        fit.scaled_h,
        image::imageops::FilterType::Lanczos3,
    );

    // Composite onto a black canvas. Padding is zero-filled, not transparent,
    // so untouched area contributes 0.0 to the normalized tensor.
    let mut canvas = ImageBuffer::from_pixel(INPUT_SIZE, INPUT_SIZE, Rgb([0u8, 0, 0]));
    let rgb = resized.to_rgb8();
    for y in 0..fit.scaled_h {
        for x in 0..fit.scaled_w {
            let pixel = rgb.get_pixel(x, y);
            canvas.put_pixel(x + fit.offset_x, y + fit.offset_y, *pixel);
        }
    }

    let side = INPUT_SIZE as usize;
    let mut tensor = arena.alloc(&[1, side, side, 3]);
    {
        let values = tensor.as_mut_slice();
        for (i, pixel) in canvas.pixels().enumerate() {
            let base = i * 3;
            values[base] = pixel[0] as f32 / 255.0;
            values[base + 1] = pixel[1] as f32 / 255.0;
            values[base + 2] = pixel[2] as f32 / 255.0;
        }
    }

    Ok(tensor)
}

/// Scales an image to fit a display bound, preserving aspect ratio.
///
/// Display-only path: shares the scale and rounding rule with
/// [`normalize`] but performs no canvas padding, channel normalization or
/// batching.
pub fn preview_fit(
    image: &DynamicImage,
    max_w: u32,
    max_h: u32,
) -> Result<DynamicImage, PipelineError> {
    let (source_w, source_h) = image.dimensions();
    let fit = FitScale::compute(source_w, source_h, max_w, max_h)?;
    Ok(image.resize_exact(
        fit.scaled_w,
        fit.scaled_h,
        image::imageops::FilterType::Lanczos3,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn solid_image(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(rgb)))
    }

    #[test]
    fn test_fit_scale_wide_image() {
        // 400x200: s = min(224/400, 224/200) = 0.56 -> 224x112, 56px top and bottom.
        let fit = FitScale::compute(400, 200, 224, 224).unwrap();
        assert_eq!(fit.scaled_w, 224);
        assert_eq!(fit.scaled_h, 112);
        assert_eq!(fit.offset_x, 0);
        assert_eq!(fit.offset_y, 56);
    }

    #[test]
    fn test_fit_scale_rejects_zero_dimension() {
        let result = FitScale::compute(0, 100, 224, 224);
        assert!(matches!(result, Err(PipelineError::Dimension { .. })));
    }

    #[test]
    fn test_fit_scale_rejects_zero_target_bound() {
        let result = FitScale::compute(100, 100, 0, 224);
        assert!(matches!(result, Err(PipelineError::Dimension { .. })));
        let result = FitScale::compute(100, 100, 224, 0);
        assert!(matches!(result, Err(PipelineError::Dimension { .. })));
    }

    #[test]
    fn test_preview_with_zero_bound_errors_cleanly() {
        let image = solid_image(100, 100, [0, 0, 0]);
        let result = preview_fit(&image, 0, 0);
        assert!(matches!(result, Err(PipelineError::Dimension { .. })));
    }

    #[test]
    fn test_fit_scale_rounds_half_up() {
        // 224/299 * 299 = 224 exactly; 150 * (224/299) = 112.374... -> 112.
        let fit = FitScale::compute(299, 150, 224, 224).unwrap();
        assert_eq!(fit.scaled_w, 224);
        assert_eq!(fit.scaled_h, 112);
        // 100 * (224/300) = 74.666... -> 75.
        let fit = FitScale::compute(300, 100, 224, 224).unwrap();
        assert_eq!(fit.scaled_h, 75);
    }

    #[test]
    fn test_odd_padding_goes_to_trailing_side() {
        // Scaled height 75 leaves 149 pixels of padding: 74 top, 75 bottom.
        let fit = FitScale::compute(300, 100, 224, 224).unwrap();
        assert_eq!(fit.offset_y, 74);
        assert_eq!(224 - fit.offset_y - fit.scaled_h, 75);
    }

    #[test]
    fn test_tiny_source_never_scales_to_zero() {
        let fit = FitScale::compute(1, 1000, 224, 224).unwrap();
        assert!(fit.scaled_w >= 1);
        assert_eq!(fit.scaled_h, 224);
    }

    #[test]
    fn test_normalize_shape_and_range() {
        let arena = TensorArena::new();
        let image = solid_image(400, 200, [255, 128, 0]);
        let tensor = normalize(&image, &arena).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert!(tensor
            .as_slice()
            .iter()
            .all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_normalize_pads_with_zeros() {
        let arena = TensorArena::new();
        let image = solid_image(400, 200, [255, 255, 255]);
        let tensor = normalize(&image, &arena).unwrap();
        let values = tensor.as_slice();
        // Row 0 is padding: all zero. Row 112 is image content: all one.
        let row = |y: usize| &values[y * 224 * 3..(y + 1) * 224 * 3];
        assert!(row(0).iter().all(|&v| v == 0.0));
        assert!(row(223).iter().all(|&v| v == 0.0));
        assert!(row(112).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        // Byte-for-byte: the same encoded input through the full
        // decode-and-normalize path twice yields bit-identical buffers.
        let image = solid_image(123, 77, [10, 200, 30]);
        let mut buffer = std::io::Cursor::new(Vec::new());
        image.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
        let bytes = buffer.into_inner();

        let arena = TensorArena::new();
        let a = normalize(&decode_image(&bytes).unwrap(), &arena).unwrap();
        let b = normalize(&decode_image(&bytes).unwrap(), &arena).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_normalize_releases_buffer_on_drop() {
        let arena = TensorArena::new();
        let image = solid_image(64, 64, [1, 2, 3]);
        let tensor = normalize(&image, &arena).unwrap();
        assert_eq!(arena.live(), 1);
        drop(tensor);
        assert_eq!(arena.live(), 0);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_image(b"definitely not an image");
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }

    #[test]
    fn test_decode_roundtrip_png() {
        let image = solid_image(32, 16, [9, 9, 9]);
        let mut buffer = std::io::Cursor::new(Vec::new());
        image.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
        let decoded = decode_image(&buffer.into_inner()).unwrap();
        assert_eq!(decoded.dimensions(), (32, 16));
    }

    #[test]
    fn test_preview_shares_scale_rule() {
        let image = solid_image(400, 200, [0, 0, 0]);
        let preview = preview_fit(&image, 224, 224).unwrap();
        assert_eq!(preview.dimensions(), (224, 112));
    }
}
