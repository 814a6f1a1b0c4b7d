//! Local caption model: lazily loaded ONNX classifier, CPU-only inference.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ndarray::Array4;
use ort::{session::Session, value::Value};
use parking_lot::Mutex;
use reqwest::Client;
use tokio::sync::OnceCell;

use super::{require_caption, CaptionProvider, ProviderError};

const DEFAULT_MODEL_PATH: &str = "models/caption.onnx";
const DEFAULT_LABELS_PATH: &str = "models/caption_labels.txt";

/// Model input tensor name.
const MODEL_INPUT: &str = "data";

/// Model input dimensions (square RGB).
const INPUT_SIZE: u32 = 224;

/// At most this many labels go into the composed caption.
const MAX_CAPTION_LABELS: usize = 5;

/// Labels scoring below this after softmax are ignored.
const MIN_LABEL_SCORE: f32 = 0.05;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// A loaded caption model: ONNX session plus label vocabulary.
///
/// The session mutex serializes inference to a single worker so concurrent
/// requests queue instead of contending for the runtime.
pub struct CaptionModel {
    session: Mutex<Session>,
    labels: Vec<String>,
}

impl CaptionModel {
    pub fn load(model_path: &Path, labels_path: &Path) -> Result<Self, ProviderError> {
        if !model_path.exists() {
            return Err(ProviderError::NotFound(format!(
                "caption model not found at {}",
                model_path.display()
            )));
        }
        if !labels_path.exists() {
            return Err(ProviderError::NotFound(format!(
                "caption label vocabulary not found at {}",
                labels_path.display()
            )));
        }

        let labels: Vec<String> = std::fs::read_to_string(labels_path)
            .map_err(|e| ProviderError::Unavailable(format!("failed to read labels: {e}")))?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if labels.is_empty() {
            return Err(ProviderError::Unavailable(
                "caption label vocabulary is empty".to_string(),
            ));
        }

        tracing::info!(model = %model_path.display(), labels = labels.len(), "loading caption model");

        let session = Session::builder()
            .and_then(|builder| Ok(builder.with_intra_threads(2)?))
            .and_then(|mut builder| builder.commit_from_file(model_path))
            .map_err(|e| ProviderError::Unavailable(format!("failed to load caption model: {e}")))?;

        Ok(Self {
            session: Mutex::new(session),
            labels,
        })
    }

    /// Run one inference pass and compose a caption from the top labels.
    pub fn describe(&self, image_bytes: &[u8]) -> Result<String, ProviderError> {
        let img = image::load_from_memory(image_bytes)
            .map_err(|e| ProviderError::Unavailable(format!("image decode failed: {e}")))?;

        let tensor = preprocess(&img);
        let shape: Vec<usize> = tensor.shape().to_vec();
        let (data, _offset) = tensor.into_raw_vec_and_offset();
        let shape_arr: [usize; 4] = [shape[0], shape[1], shape[2], shape[3]];
        let input = Value::from_array((shape_arr, data))
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let scores = {
            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![MODEL_INPUT => input])
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

            let first_key = outputs.keys().next().ok_or_else(|| {
                ProviderError::Unavailable("caption model produced no outputs".to_string())
            })?;
            let (_shape, logits) = outputs[first_key]
                .try_extract_tensor::<f32>()
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

            softmax(logits)
        };

        let picks = top_labels(&scores, &self.labels);
        if picks.is_empty() {
            return Err(ProviderError::EmptyResult);
        }

        Ok(compose_caption(&picks))
    }
}

/// Caption provider backed by a lazily loaded in-process model.
pub struct LocalModelProvider {
    http: Client,
    model_path: PathBuf,
    labels_path: PathBuf,
    model: OnceCell<Arc<CaptionModel>>,
}

impl LocalModelProvider {
    pub fn new(model_path: Option<String>, labels_path: Option<String>) -> Self {
        Self {
            http: Client::new(),
            model_path: PathBuf::from(model_path.unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string())),
            labels_path: PathBuf::from(
                labels_path.unwrap_or_else(|| DEFAULT_LABELS_PATH.to_string()),
            ),
            model: OnceCell::new(),
        }
    }

    /// Load the model exactly once; concurrent first callers collapse onto a
    /// single load, later callers reuse the cached handle without the lock.
    /// The load itself runs on the blocking pool.
    async fn ensure_loaded(&self) -> Result<Arc<CaptionModel>, ProviderError> {
        let model = self
            .model
            .get_or_try_init(|| {
                let model_path = self.model_path.clone();
                let labels_path = self.labels_path.clone();
                async move {
                    tokio::task::spawn_blocking(move || {
                        CaptionModel::load(&model_path, &labels_path).map(Arc::new)
                    })
                    .await
                    .map_err(|e| {
                        ProviderError::Unavailable(format!("model load task failed: {e}"))
                    })?
                }
            })
            .await?;

        Ok(Arc::clone(model))
    }
}

#[async_trait]
impl CaptionProvider for LocalModelProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn caption(&self, image_url: &str) -> Result<String, ProviderError> {
        let model = self.ensure_loaded().await?;

        let response = self
            .http
            .get(image_url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("image download failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "image download returned HTTP {}",
                response.status()
            )));
        }

        let image = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("image download failed: {e}")))?
            .to_vec();

        // CPU-bound inference must not block the scheduler.
        let caption = tokio::task::spawn_blocking(move || model.describe(&image))
            .await
            .map_err(|e| ProviderError::Unavailable(format!("inference task failed: {e}")))??;

        require_caption(caption)
    }
}

/// Convert to a normalized `[1, 3, H, W]` float tensor.
fn preprocess(img: &image::DynamicImage) -> Array4<f32> {
    let rgb = img
        .resize_exact(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let size = INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            tensor[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            tensor[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            tensor[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }
    }
    tensor
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|v| v / sum).collect()
}

/// Label names for the highest-scoring classes, best first.
fn top_labels<'a>(scores: &[f32], labels: &'a [String]) -> Vec<&'a str> {
    let mut indexed: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    indexed
        .into_iter()
        .take(MAX_CAPTION_LABELS)
        .filter(|(_, score)| *score >= MIN_LABEL_SCORE)
        .filter_map(|(i, _)| labels.get(i).map(String::as_str))
        .collect()
}

fn compose_caption(picks: &[&str]) -> String {
    match picks {
        [] => String::new(),
        [only] => format!("A photo of {only}."),
        [first, rest @ ..] => format!("A photo of {first}, featuring {}.", rest.join(", ")),
    }
}
