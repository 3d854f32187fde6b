//! Locally synthesized placeholder images for prompts no model tier could
//! serve. The bitmap is deterministic in the prompt (digest-derived colors
//! with a contrasting center band); the prompt itself travels in the
//! surrounding block's alt text.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use super::backends::GenerateError;

fn colors_from_prompt(prompt: &str) -> (Rgb<u8>, Rgb<u8>) {
    let digest = blake3::hash(prompt.as_bytes());
    let bytes = digest.as_bytes();
    // Lift toward pastel so the band and any client-side overlay stay legible.
    let background = Rgb([
        128 + bytes[0] / 2,
        128 + bytes[1] / 2,
        128 + bytes[2] / 2,
    ]);
    let band = Rgb([bytes[3] / 2, bytes[4] / 2, bytes[5] / 2]);
    (background, band)
}

/// Render a `size`×`size` placeholder PNG for `prompt`.
pub fn render(prompt: &str, size: u32) -> Result<Vec<u8>, GenerateError> {
    let size = size.max(16);
    let (background, band) = colors_from_prompt(prompt);

    let mut canvas = RgbImage::from_pixel(size, size, background);
    let band_top = size * 2 / 5;
    let band_bottom = size * 3 / 5;
    let margin = size / 10;
    for y in band_top..band_bottom {
        for x in margin..size - margin {
            canvas.put_pixel(x, y, band);
        }
    }

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(canvas)
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| GenerateError::InvalidPayload(format!("placeholder encoding failed: {e}")))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_valid_png() {
        let bytes = render("a blue sky", 64).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 64);
    }

    #[test]
    fn deterministic_per_prompt() {
        assert_eq!(render("same prompt", 32).unwrap(), render("same prompt", 32).unwrap());
        assert_ne!(render("one prompt", 32).unwrap(), render("another prompt", 32).unwrap());
    }
}
