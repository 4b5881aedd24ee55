//! CAPTCHA image generation.
//!
//! Renders a random phrase from the bitmap alphabet into a PNG. Each glyph
//! gets its own colour, offset and slant; the whole canvas is then warped
//! along two sine waves and overlaid with noise lines and speckles.

use std::f32::consts::TAU;
use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::geometric_transformations::{Interpolation, warp_with};
use imageproc::rect::Rect;
use quill_common::constants::{MAX_CAPTCHA_HEIGHT, MAX_CAPTCHA_WIDTH};
use quill_common::{QuillError, Result, ValidationError};
use rand::Rng;

use super::glyphs::{self, ALPHABET, GLYPH_HEIGHT, GLYPH_WIDTH};

/// A rendered challenge: the expected answer and its PNG image
pub struct RenderedCaptcha {
    pub phrase: String,
    pub png: Vec<u8>,
}

/// CAPTCHA generator service
#[derive(Debug, Clone)]
pub struct CaptchaGenerator {
    phrase_length: usize,
}

impl CaptchaGenerator {
    pub fn new(phrase_length: usize) -> Self {
        Self {
            phrase_length: phrase_length.max(1),
        }
    }

    pub fn phrase_length(&self) -> usize {
        self.phrase_length
    }

    /// Generate a fresh phrase and render it at `width` x `height`
    pub fn generate(&self, width: u32, height: u32) -> Result<RenderedCaptcha> {
        validate_dimensions(width, height)?;

        let mut rng = rand::rng();
        let phrase = self.generate_phrase(&mut rng);
        let image = render(&phrase, width, height, &mut rng);

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| QuillError::Captcha(e.to_string()))?;

        Ok(RenderedCaptcha { phrase, png })
    }

    fn generate_phrase(&self, rng: &mut impl Rng) -> String {
        (0..self.phrase_length)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || width > MAX_CAPTCHA_WIDTH {
        return Err(ValidationError::field(
            "width",
            format!("must be between 1 and {MAX_CAPTCHA_WIDTH}"),
        )
        .into());
    }
    if height == 0 || height > MAX_CAPTCHA_HEIGHT {
        return Err(ValidationError::field(
            "height",
            format!("must be between 1 and {MAX_CAPTCHA_HEIGHT}"),
        )
        .into());
    }
    Ok(())
}

fn render(text: &str, width: u32, height: u32, rng: &mut impl Rng) -> RgbImage {
    let background = Rgb([
        rng.random_range(225..=250),
        rng.random_range(225..=250),
        rng.random_range(225..=250),
    ]);
    let mut canvas = RgbImage::from_pixel(width, height, background);

    let len = text.chars().count().max(1) as u32;
    let margin = width / 20;
    let cell_width = (width.saturating_sub(2 * margin) / len).max(1);
    // One blank column and row of spacing around each glyph
    let scale = (cell_width / (GLYPH_WIDTH + 1))
        .min(height / (GLYPH_HEIGHT + 1))
        .max(1);
    let jitter = scale as i32;

    for (i, c) in text.chars().enumerate() {
        let Some(glyph) = glyphs::glyph(c) else {
            continue;
        };
        let color = Rgb([
            rng.random_range(10..110),
            rng.random_range(10..110),
            rng.random_range(10..110),
        ]);
        let slant: f32 = rng.random_range(-0.4..0.4);
        let x0 = (margin + i as u32 * cell_width) as i32
            + (cell_width.saturating_sub(GLYPH_WIDTH * scale) / 2) as i32
            + rng.random_range(-jitter..=jitter);
        let y0 = (height.saturating_sub(GLYPH_HEIGHT * scale) / 2) as i32
            + rng.random_range(-jitter..=jitter);

        for row in 0..GLYPH_HEIGHT {
            let shear = ((GLYPH_HEIGHT / 2) as f32 - row as f32) * slant * scale as f32;
            for col in 0..GLYPH_WIDTH {
                if glyphs::is_set(&glyph, col, row) {
                    let x = x0 + (col * scale) as i32 + shear.round() as i32;
                    let y = y0 + (row * scale) as i32;
                    draw_filled_rect_mut(&mut canvas, Rect::at(x, y).of_size(scale, scale), color);
                }
            }
        }
    }

    let mut canvas = warp(&canvas, background, rng);
    add_noise(&mut canvas, rng);
    canvas
}

/// Displace pixels along a vertical and a horizontal sine wave
fn warp(canvas: &RgbImage, background: Rgb<u8>, rng: &mut impl Rng) -> RgbImage {
    let (width, height) = canvas.dimensions();
    let amp_y = (height as f32 / 12.0).max(1.0);
    let amp_x = amp_y / 2.0;
    let period_x: f32 = rng.random_range(0.6..1.2) * width as f32;
    let period_y: f32 = rng.random_range(0.8..1.6) * height as f32;
    let phase_x: f32 = rng.random_range(0.0..TAU);
    let phase_y: f32 = rng.random_range(0.0..TAU);

    warp_with(
        canvas,
        move |x, y| {
            (
                x + amp_x * (TAU * y / period_y + phase_y).sin(),
                y + amp_y * (TAU * x / period_x + phase_x).sin(),
            )
        },
        Interpolation::Bilinear,
        background,
    )
}

fn add_noise(canvas: &mut RgbImage, rng: &mut impl Rng) {
    let (width, height) = canvas.dimensions();
    let (w, h) = (width as f32, height as f32);

    for _ in 0..rng.random_range(3..6) {
        let color = Rgb([
            rng.random_range(60..180),
            rng.random_range(60..180),
            rng.random_range(60..180),
        ]);
        let start = (rng.random_range(0.0..w * 0.3), rng.random_range(0.0..h));
        let end = (rng.random_range(w * 0.7..w), rng.random_range(0.0..h));
        draw_line_segment_mut(canvas, start, end, color);
    }

    for _ in 0..(width * height / 25) {
        let x = rng.random_range(0..width);
        let y = rng.random_range(0..height);
        let shade = rng.random_range(90..220);
        canvas.put_pixel(x, y, Rgb([shade, shade, shade]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_png_with_requested_size() {
        let generator = CaptchaGenerator::new(5);
        let captcha = generator.generate(100, 36).unwrap();

        assert_eq!(captcha.phrase.len(), 5);
        assert!(captcha.phrase.bytes().all(|b| ALPHABET.contains(&b)));

        let decoded = image::load_from_memory_with_format(&captcha.png, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 36));
    }

    #[test]
    fn test_tiny_and_large_canvases_render() {
        let generator = CaptchaGenerator::new(8);
        assert!(generator.generate(1, 1).is_ok());
        assert!(generator.generate(MAX_CAPTCHA_WIDTH, MAX_CAPTCHA_HEIGHT).is_ok());
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        let generator = CaptchaGenerator::new(5);

        let err = generator.generate(0, 36).err().unwrap();
        assert!(err.as_validation().unwrap().message("width").is_some());

        let err = generator.generate(100, MAX_CAPTCHA_HEIGHT + 1).err().unwrap();
        assert!(err.as_validation().unwrap().message("height").is_some());
    }

    #[test]
    fn test_phrases_vary() {
        let generator = CaptchaGenerator::new(6);
        let mut rng = rand::rng();
        let a = generator.generate_phrase(&mut rng);
        let b = generator.generate_phrase(&mut rng);
        let c = generator.generate_phrase(&mut rng);
        // 32^6 space: three equal draws would mean the rng is broken
        assert!(a != b || b != c);
    }

    #[test]
    fn test_zero_length_is_clamped() {
        assert_eq!(CaptchaGenerator::new(0).phrase_length(), 1);
    }
}
