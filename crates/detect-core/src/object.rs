//! Object detection variant: boxes and class labels.

use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;
use tch::{CModule, Device};
use tracing::debug;

use crate::draw;
use crate::geometry::{non_max_suppression, Bbox};
use crate::model::{load_names, ModelSpec};
use crate::report::{report_json, Detection};
use crate::runtime::{forward_rows, image_tensor, select_device};
use crate::Detect;

const IOU_THRESHOLD: f32 = 0.45;
const MAX_DETECTIONS: usize = 512;

/// TorchScript-backed object detector.
pub struct ObjectDetector {
    module: CModule,
    device: Device,
    spec: ModelSpec,
    names: Vec<String>,
    detections: Vec<Detection>,
}

impl ObjectDetector {
    pub fn load(cfg: &Path, weights: &Path, names: &Path, gpu: usize) -> Result<Self> {
        let spec = ModelSpec::from_cfg(cfg)?;
        let names = load_names(names)?;
        let device = select_device(gpu);
        let module = CModule::load_on_device(weights, device)
            .with_context(|| format!("failed to load model weights {}", weights.display()))?;
        debug!(
            ?device,
            input_width = spec.width,
            input_height = spec.height,
            classes = names.len(),
            "object detector ready"
        );
        Ok(Self {
            module,
            device,
            spec,
            names,
            detections: Vec::new(),
        })
    }

    fn class_name(&self, class_id: usize) -> String {
        self.names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class-{class_id}"))
    }
}

impl Detect for ObjectDetector {
    fn detect(&mut self, image: &RgbImage, threshold: f32) -> Result<()> {
        let (src_w, src_h) = image.dimensions();
        let input = image_tensor(image, self.spec.width, self.spec.height, self.device);
        let rows = forward_rows(&self.module, &input)?;

        let scale_x = src_w as f32 / self.spec.width as f32;
        let scale_y = src_h as f32 / self.spec.height as f32;
        let max_x = src_w.saturating_sub(1) as f32;
        let max_y = src_h.saturating_sub(1) as f32;

        let mut picked = Vec::new();
        for row in rows {
            if row.len() < 5 {
                continue;
            }
            let score = row[4];
            if score < threshold {
                continue;
            }
            let class_id = if row.len() > 5 { row[5] as usize } else { 0 };

            let left = (row[0] * scale_x).clamp(0.0, max_x);
            let top = (row[1] * scale_y).clamp(0.0, max_y);
            let right = (row[2] * scale_x).clamp(0.0, max_x);
            let bottom = (row[3] * scale_y).clamp(0.0, max_y);
            picked.push(Detection {
                class: self.class_name(class_id),
                class_id,
                score,
                bbox: Bbox {
                    x: left,
                    y: top,
                    w: right - left,
                    h: bottom - top,
                },
            });
            if picked.len() >= MAX_DETECTIONS {
                break;
            }
        }

        non_max_suppression(&mut picked, |d| d.bbox, |d| d.score, IOU_THRESHOLD);
        self.detections = picked;
        Ok(())
    }

    fn report(&self, seq: u64) -> String {
        report_json(seq, &self.detections)
    }

    fn draw(&self, image: &mut RgbImage) {
        draw::draw_detections(image, &self.detections);
    }
}
