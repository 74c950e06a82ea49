//! Detector capability for the inference stage.
//!
//! A worker process holds exactly one detector, chosen at startup: the
//! object variant reports labelled bounding boxes, the pose variant reports
//! COCO skeletons. Both run a TorchScript module through `tch`, which is
//! only linked when the `with-tch` feature is enabled; everything around the
//! forward pass (artifact parsing, geometry, result JSON, drawing) is
//! feature-independent.

use anyhow::Result;
use image::RgbImage;

pub use geometry::{non_max_suppression, Bbox, Keypoint, SKELETON};
pub use model::{load_names, ModelSpec};
pub use report::{report_json, Detection, Pose};

#[cfg(feature = "with-tch")]
pub use object::ObjectDetector;
#[cfg(feature = "with-tch")]
pub use pose::PoseDetector;

pub mod draw;
pub mod geometry;
pub mod model;
pub mod report;

#[cfg(feature = "with-tch")]
mod object;
#[cfg(feature = "with-tch")]
mod pose;
#[cfg(feature = "with-tch")]
mod runtime;

/// The capability the inference stage programs against.
///
/// `detect` keeps its result inside the detector; `report` and `draw` read
/// the most recent one. The pipeline owns a single detector on a single
/// thread, so no interior synchronization is needed.
pub trait Detect {
    /// Run inference on a decoded image, filtering by confidence threshold.
    fn detect(&mut self, image: &RgbImage, threshold: f32) -> Result<()>;

    /// Serialize the most recent result for the given sequence identifier.
    fn report(&self, seq: u64) -> String;

    /// Overlay the most recent result on the image in place.
    fn draw(&self, image: &mut RgbImage);
}
