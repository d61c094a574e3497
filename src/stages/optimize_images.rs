// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Lossless PNG and quality-bounded JPEG recompression
//!
//! Images are re-encoded on the rayon pool inside a blocking task. A result
//! is only kept when it is smaller than the input; other formats pass
//! through untouched.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, ImageFormat};
use rayon::prelude::*;
use tracing::debug;

use super::{Stage, TaskContext};
use crate::errors::StageError;
use crate::files::{FileRecord, FileSet};

#[derive(Debug)]
pub struct OptimizeImagesStage {
    jpeg_quality: u8,
}

impl OptimizeImagesStage {
    pub fn new(jpeg_quality: u8) -> Result<Self, String> {
        if !(1..=100).contains(&jpeg_quality) {
            return Err(format!("jpeg_quality must be between 1 and 100, got {}", jpeg_quality));
        }
        Ok(Self { jpeg_quality })
    }
}

/// Re-encoded bytes, or `None` for formats that are left alone
fn recompress(bytes: &[u8], jpeg_quality: u8) -> Result<Option<Vec<u8>>, String> {
    let format = match image::guess_format(bytes) {
        Ok(f @ (ImageFormat::Png | ImageFormat::Jpeg)) => f,
        _ => return Ok(None),
    };

    let img = image::load_from_memory_with_format(bytes, format).map_err(|e| e.to_string())?;
    let mut out = Vec::new();

    match format {
        ImageFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
            encoder
                .write_image(img.as_bytes(), img.width(), img.height(), img.color())
                .map_err(|e| e.to_string())?;
        }
        _ => {
            let rgb = img.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality);
            encoder
                .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                .map_err(|e| e.to_string())?;
        }
    }

    Ok(Some(out))
}

fn optimise(mut file: FileRecord, jpeg_quality: u8) -> Result<FileRecord, StageError> {
    let recompressed = recompress(&file.contents, jpeg_quality).map_err(|message| StageError::Image {
        file: file.path.clone(),
        message,
    })?;

    if let Some(bytes) = recompressed {
        if bytes.len() < file.contents.len() {
            debug!(
                file = %file.relative(),
                before = file.contents.len(),
                after = bytes.len(),
                "image recompressed"
            );
            file.contents = bytes;
        }
    }
    Ok(file)
}

#[async_trait]
impl Stage for OptimizeImagesStage {
    fn name(&self) -> &'static str {
        "optimize_images"
    }

    async fn apply(&self, files: FileSet, _ctx: &TaskContext) -> Result<FileSet, StageError> {
        let quality = self.jpeg_quality;
        let files: Vec<FileRecord> = files.into_iter().collect();

        tokio::task::spawn_blocking(move || {
            files
                .into_par_iter()
                .map(|f| optimise(f, quality))
                .collect::<Result<Vec<_>, _>>()
                .map(FileSet::new)
        })
        .await
        .map_err(|e| StageError::Worker {
            message: e.to_string(),
        })?
    }
}
