// src/core/visualization/spectrogram.rs
//
// PNG rendering of log spectrograms and fingerprint images.

use std::path::{Path, PathBuf};

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

use crate::core::dsp::Matrix;
use crate::core::fingerprint::Fingerprint;
use crate::error::{FindSimilarError, Result};

/// Rendering options
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Each matrix cell becomes a `scale x scale` block
    pub scale: u32,
    /// Values this far below the loudest cell render as the floor colour
    pub dynamic_range_db: f64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            scale: 4,
            dynamic_range_db: 90.0,
        }
    }
}

const POSITIVE: Luma<u8> = Luma([255]);
const NEGATIVE: Luma<u8> = Luma([0]);
const UNSELECTED: Luma<u8> = Luma([128]);

/// Frames run left to right, low bands at the bottom
pub fn render_log_spectrogram(spectrum: &Matrix, config: &ImageConfig) -> Result<RgbImage> {
    if spectrum.is_empty() {
        return Err(FindSimilarError::InvalidMatrix("cannot render an empty spectrogram".into()));
    }
    let frames = spectrum.rows() as u32;
    let bands = spectrum.cols() as u32;
    let scale = config.scale.max(1);
    let peak = spectrum.as_slice().iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let floor = -config.dynamic_range_db.max(1.0);

    let img = ImageBuffer::from_fn(frames * scale, bands * scale, |x, y| {
        let frame = (x / scale) as usize;
        let band = (bands - 1 - y / scale) as usize;
        let v = spectrum[(frame, band)].abs();
        let db = if v > 0.0 && peak > 0.0 {
            20.0 * (v / peak).log10()
        } else {
            floor
        };
        db_to_color(((db - floor) / -floor) as f32)
    });
    Ok(img)
}

/// Positive bits white, negative bits black, unselected grey
pub fn render_fingerprint(fingerprint: &Fingerprint, frames: usize, bands: usize, config: &ImageConfig) -> Result<GrayImage> {
    if fingerprint.len() != 2 * frames * bands {
        return Err(FindSimilarError::DimensionMismatch {
            expected: 2 * frames * bands,
            found: fingerprint.len(),
        });
    }
    let scale = config.scale.max(1);
    let img = ImageBuffer::from_fn(frames as u32 * scale, bands as u32 * scale, |x, y| {
        let frame = (x / scale) as usize;
        let band = bands - 1 - (y / scale) as usize;
        let cell = frame * bands + band;
        if fingerprint.get(2 * cell) {
            POSITIVE
        } else if fingerprint.get(2 * cell + 1) {
            NEGATIVE
        } else {
            UNSELECTED
        }
    });
    Ok(img)
}

/// Write a log spectrogram as a PNG
pub fn write_spectrogram(spectrum: &Matrix, path: &Path, config: &ImageConfig) -> Result<()> {
    render_log_spectrogram(spectrum, config)?
        .save(path)
        .map_err(|e| image_error(path, e))
}

/// Write one PNG per fingerprint as `<stem>_<n>.png` in `dir`
pub fn write_fingerprints(
    fingerprints: &[Fingerprint],
    frames: usize,
    bands: usize,
    dir: &Path,
    stem: &str,
    config: &ImageConfig,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    fingerprints
        .iter()
        .enumerate()
        .map(|(i, fp)| {
            let path = dir.join(format!("{}_{:04}.png", stem, i));
            render_fingerprint(fp, frames, bands, config)?
                .save(&path)
                .map_err(|e| image_error(&path, e))?;
            Ok(path)
        })
        .collect()
}

fn image_error(path: &Path, err: image::ImageError) -> FindSimilarError {
    FindSimilarError::Io(std::io::Error::other(format!("{}: {}", path.display(), err)))
}

fn db_to_color(value: f32) -> Rgb<u8> {
    // Viridis-like colormap
    let v = value.clamp(0.0, 1.0);

    let r = (68.0 + v * (235.0 - 68.0)) as u8;
    let g = (1.0 + v * (237.0 - 1.0)) as u8;
    let b = (84.0 + v * (32.0 - 84.0 + (1.0 - v) * 150.0)) as u8;

    Rgb([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_pixels() {
        // 2 frames x 2 bands: cell 0 positive, cell 3 negative
        let mut fp = Fingerprint::new(8);
        fp.set(0, true);
        fp.set(7, true);
        let img = render_fingerprint(&fp, 2, 2, &ImageConfig { scale: 1, ..Default::default() }).unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        // band 0 is drawn on the bottom row
        assert_eq!(*img.get_pixel(0, 1), POSITIVE);
        assert_eq!(*img.get_pixel(1, 0), NEGATIVE);
        assert_eq!(*img.get_pixel(0, 0), UNSELECTED);
    }

    #[test]
    fn test_fingerprint_size_checked() {
        let fp = Fingerprint::new(10);
        assert!(render_fingerprint(&fp, 2, 2, &ImageConfig::default()).is_err());
    }

    #[test]
    fn test_spectrogram_png_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.png");
        let spectrum = Matrix::from_rows(&[vec![1.0, 0.5], vec![0.0, 0.25], vec![0.1, 0.9]]).unwrap();
        write_spectrogram(&spectrum, &path, &ImageConfig::default()).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (12, 8));
    }
}
