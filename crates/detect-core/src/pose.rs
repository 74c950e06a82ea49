//! Pose estimation variant: one 17-joint skeleton per detected person.

use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;
use tch::{CModule, Device};
use tracing::debug;

use crate::draw;
use crate::geometry::{non_max_suppression, Bbox, Keypoint};
use crate::model::ModelSpec;
use crate::report::{report_json, Pose};
use crate::runtime::{forward_rows, image_tensor, select_device};
use crate::Detect;

const IOU_THRESHOLD: f32 = 0.45;
const MAX_POSES: usize = 64;
/// Joints below this confidence are reported as zeroed keypoints.
const KEYPOINT_THRESHOLD: f32 = 0.5;
/// Joints per skeleton in the COCO layout.
pub const KEYPOINT_COUNT: usize = 17;

const KPT_STRIDE: usize = 3;
const BOX_FIELDS: usize = 5;

/// TorchScript-backed pose estimator.
pub struct PoseDetector {
    module: CModule,
    device: Device,
    spec: ModelSpec,
    poses: Vec<Pose>,
}

impl PoseDetector {
    pub fn load(cfg: &Path, weights: &Path, gpu: usize) -> Result<Self> {
        let spec = ModelSpec::from_cfg(cfg)?;
        let device = select_device(gpu);
        let module = CModule::load_on_device(weights, device)
            .with_context(|| format!("failed to load model weights {}", weights.display()))?;
        debug!(
            ?device,
            input_width = spec.width,
            input_height = spec.height,
            "pose detector ready"
        );
        Ok(Self {
            module,
            device,
            spec,
            poses: Vec::new(),
        })
    }
}

impl Detect for PoseDetector {
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
            if row.len() < BOX_FIELDS + KEYPOINT_COUNT * KPT_STRIDE {
                continue;
            }
            let score = row[4];
            if score < threshold {
                continue;
            }

            let left = (row[0] * scale_x).clamp(0.0, max_x);
            let top = (row[1] * scale_y).clamp(0.0, max_y);
            let right = (row[2] * scale_x).clamp(0.0, max_x);
            let bottom = (row[3] * scale_y).clamp(0.0, max_y);

            let mut keypoints = Vec::with_capacity(KEYPOINT_COUNT);
            for joint in 0..KEYPOINT_COUNT {
                let base = BOX_FIELDS + joint * KPT_STRIDE;
                let confidence = row[base + 2];
                if confidence < KEYPOINT_THRESHOLD {
                    keypoints.push(Keypoint::default());
                } else {
                    keypoints.push(Keypoint {
                        x: (row[base] * scale_x).clamp(0.0, max_x),
                        y: (row[base + 1] * scale_y).clamp(0.0, max_y),
                        score: confidence,
                    });
                }
            }

            picked.push(Pose {
                score,
                bbox: Bbox {
                    x: left,
                    y: top,
                    w: right - left,
                    h: bottom - top,
                },
                keypoints,
            });
            if picked.len() >= MAX_POSES {
                break;
            }
        }

        non_max_suppression(&mut picked, |p| p.bbox, |p| p.score, IOU_THRESHOLD);
        self.poses = picked;
        Ok(())
    }

    fn report(&self, seq: u64) -> String {
        report_json(seq, &self.poses)
    }

    fn draw(&self, image: &mut RgbImage) {
        draw::draw_poses(image, &self.poses);
    }
}
