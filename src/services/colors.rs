//! Dominant color extraction via downsampling and color-space quantization.

use std::collections::HashMap;
use std::time::Duration;

use image::imageops::FilterType;

/// Edge length of the downsampled working image.
const SAMPLE_SIZE: u32 = 150;

/// Width of each quantization bucket per channel (256 / 32 = 8 buckets,
/// 512 buckets total across the RGB cube).
const BUCKET_WIDTH: u8 = 32;

/// Number of dominant colors reported.
const COLOR_COUNT: usize = 3;

/// Neutral gray used to pad images with fewer than three distinct buckets.
const PAD_COLOR: &str = "#808080";

/// Returned when the image cannot be downloaded or decoded.
const FALLBACK_COLORS: [&str; 3] = ["#000000", "#ffffff", "#808080"];

/// Timeout for fetching the image bytes.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ColorError {
    #[error("image download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image download returned HTTP {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Extract the top-3 dominant colors of the image at `image_url`.
///
/// Never errors outward: any download or decode failure yields the fixed
/// fallback triple so callers always receive exactly three colors.
pub async fn extract(http: &reqwest::Client, image_url: &str) -> Vec<String> {
    match fetch_and_extract(http, image_url).await {
        Ok(colors) => colors,
        Err(e) => {
            tracing::debug!(url = %image_url, error = %e, "color extraction failed, using fallback colors");
            FALLBACK_COLORS.iter().map(|c| c.to_string()).collect()
        }
    }
}

async fn fetch_and_extract(
    http: &reqwest::Client,
    image_url: &str,
) -> Result<Vec<String>, ColorError> {
    let response = http
        .get(image_url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ColorError::HttpStatus(response.status()));
    }

    let bytes = response.bytes().await?;
    dominant_colors(&bytes)
}

/// Quantize image pixels into the three most frequent color buckets.
///
/// The image is downsampled to bound cost, each RGB channel is reduced to
/// buckets of width 32, and bucket frequencies are tallied in
/// first-encountered order so equal frequencies tie-break stably. Always
/// returns exactly three `#rrggbb` strings, most frequent first, padded with
/// neutral gray when fewer than three distinct buckets exist.
pub fn dominant_colors(bytes: &[u8]) -> Result<Vec<String>, ColorError> {
    let img = image::load_from_memory(bytes)?;
    let rgb = img
        .resize_exact(SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle)
        .to_rgb8();

    // Tally in insertion order so the later stable sort preserves the
    // first-encountered tie-break.
    let mut bucket_index: HashMap<(u8, u8, u8), usize> = HashMap::new();
    let mut buckets: Vec<((u8, u8, u8), u32)> = Vec::new();

    for pixel in rgb.pixels() {
        let key = (
            (pixel[0] / BUCKET_WIDTH) * BUCKET_WIDTH,
            (pixel[1] / BUCKET_WIDTH) * BUCKET_WIDTH,
            (pixel[2] / BUCKET_WIDTH) * BUCKET_WIDTH,
        );
        match bucket_index.get(&key) {
            Some(&i) => buckets[i].1 += 1,
            None => {
                bucket_index.insert(key, buckets.len());
                buckets.push((key, 1));
            }
        }
    }

    buckets.sort_by(|a, b| b.1.cmp(&a.1));

    let mut colors: Vec<String> = buckets
        .iter()
        .take(COLOR_COUNT)
        .map(|((r, g, b), _)| format!("#{r:02x}{g:02x}{b:02x}"))
        .collect();

    while colors.len() < COLOR_COUNT {
        colors.push(PAD_COLOR.to_string());
    }

    Ok(colors)
}
