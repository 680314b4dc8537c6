use std::path::Path;

use anyhow::{bail, Context};
use image::{DynamicImage, ImageBuffer, Pixel};
use log::debug;
use ndarray::Array4;
use tract_core::model::TypedModel;
use tract_core::internal::DimLike;
use tract_core::plan::SimplePlan;
use tract_onnx::prelude::*;

use crate::error::ApiError;
use crate::models::{Prediction, CLASS_NAMES};

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// A single forward pass from an NHWC image tensor to one score per class.
pub trait Classifier: Send + Sync {
    fn forward(&self, input: Array4<f32>) -> anyhow::Result<Vec<f32>>;
}

pub struct OnnxClassifier {
    plan: OnnxPlan,
}

impl OnnxClassifier {
    /// Loads and optimizes the ONNX artifact at `model_path`.
    ///
    /// Fails if the artifact declares a fixed output width other than
    /// `classes`, since predictions would then be mapped to the wrong names.
    pub fn load<P: AsRef<Path>>(model_path: P, classes: usize) -> anyhow::Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("could not read ONNX model {}", model_path.display()))?;
        Self::from_model(model, classes)
    }

    fn from_model(model: InferenceModel, classes: usize) -> anyhow::Result<Self> {
        let plan = model
            .into_optimized()
            .context("could not optimize ONNX model")?
            .into_runnable()
            .context("could not build runnable plan")?;

        match output_width(&plan)? {
            Some(width) if width != classes => bail!(
                "model has {} outputs but {} class labels are configured",
                width,
                classes
            ),
            Some(width) => debug!("model output width {}", width),
            None => debug!("model output width is symbolic, skipping label check"),
        }

        Ok(Self { plan })
    }
}

fn output_width(plan: &OnnxPlan) -> anyhow::Result<Option<usize>> {
    let fact = plan.model().output_fact(0)?;
    Ok(fact.shape.last().and_then(|dim| dim.to_usize().ok()))
}

impl Classifier for OnnxClassifier {
    fn forward(&self, input: Array4<f32>) -> anyhow::Result<Vec<f32>> {
        let shape = input.shape().to_vec();
        let tensor = Tensor::from_shape(&shape, &input.into_raw_vec())?;
        let outputs = self.plan.run(tvec!(tensor.into()))?;
        let scores = outputs
            .first()
            .context("model returned no outputs")?
            .to_array_view::<f32>()?
            .iter()
            .copied()
            .collect();
        Ok(scores)
    }
}

/// Decodes an uploaded image into a `[1, height, width, channels]` tensor.
///
/// Pixel values are copied as-is; no resizing or normalization happens here.
pub fn image_to_tensor(bytes: &[u8]) -> Result<Array4<f32>, ApiError> {
    let image = image::load_from_memory(bytes)?;
    let array = match image {
        DynamicImage::ImageLuma8(buffer) => buffer_to_array(&buffer),
        DynamicImage::ImageLumaA8(buffer) => buffer_to_array(&buffer),
        DynamicImage::ImageRgb8(buffer) => buffer_to_array(&buffer),
        DynamicImage::ImageRgba8(buffer) => buffer_to_array(&buffer),
        DynamicImage::ImageLuma16(buffer) => buffer_to_array(&buffer),
        DynamicImage::ImageLumaA16(buffer) => buffer_to_array(&buffer),
        DynamicImage::ImageRgb16(buffer) => buffer_to_array(&buffer),
        DynamicImage::ImageRgba16(buffer) => buffer_to_array(&buffer),
        DynamicImage::ImageRgb32F(buffer) => buffer_to_array(&buffer),
        DynamicImage::ImageRgba32F(buffer) => buffer_to_array(&buffer),
        other => buffer_to_array(&other.to_rgba32f()),
    };
    array.map_err(|e| ApiError::Inference(e.into()))
}

fn buffer_to_array<P>(
    buffer: &ImageBuffer<P, Vec<P::Subpixel>>,
) -> Result<Array4<f32>, ndarray::ShapeError>
where
    P: Pixel,
    P::Subpixel: Into<f32>,
{
    let (width, height) = buffer.dimensions();
    let channels = P::CHANNEL_COUNT as usize;
    let values = buffer.as_raw().iter().map(|&v| v.into()).collect();
    Array4::from_shape_vec((1, height as usize, width as usize, channels), values)
}

/// Index and value of the highest score; the first one wins on ties.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (index, score)| match best {
            Some((_, top)) if score.total_cmp(&top).is_le() => best,
            _ => Some((index, score)),
        })
}

/// The loaded model together with the labels for its outputs.
pub struct Predictor {
    classifier: Box<dyn Classifier>,
    labels: &'static [&'static str],
}

impl Predictor {
    pub fn new(classifier: Box<dyn Classifier>) -> Self {
        Self::with_labels(classifier, &CLASS_NAMES)
    }

    pub fn with_labels(
        classifier: Box<dyn Classifier>,
        labels: &'static [&'static str],
    ) -> Self {
        Predictor { classifier, labels }
    }

    pub fn labels(&self) -> &'static [&'static str] {
        self.labels
    }

    pub fn predict(&self, bytes: &[u8]) -> Result<Prediction, ApiError> {
        let input = image_to_tensor(bytes)?;
        debug!("input tensor shape {:?}", input.shape());

        let scores = self
            .classifier
            .forward(input)
            .map_err(ApiError::Inference)?;
        let (index, confidence) = argmax(&scores).ok_or(ApiError::EmptyOutput)?;
        let label = self
            .labels
            .get(index)
            .copied()
            .ok_or(ApiError::UnknownClass {
                index,
                labels: self.labels.len(),
            })?;

        Ok(Prediction {
            label,
            index,
            confidence,
        })
    }
}
