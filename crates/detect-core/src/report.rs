//! Serialized detection results, as forwarded to the sink in the frame's
//! detection buffer.

use serde::Serialize;

use crate::geometry::{Bbox, Keypoint};

/// One detected object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub class: String,
    pub class_id: usize,
    pub score: f32,
    pub bbox: Bbox,
}

/// One detected person with its skeleton.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pose {
    pub score: f32,
    pub bbox: Bbox,
    pub keypoints: Vec<Keypoint>,
}

#[derive(Serialize)]
struct Report<'a, T: Serialize> {
    seq: u64,
    detections: &'a [T],
}

/// Render the report JSON for one frame: `{"seq":<seq>,"detections":[...]}`.
pub fn report_json<T: Serialize>(seq: u64, detections: &[T]) -> String {
    serde_json::to_string(&Report { seq, detections })
        .expect("detection report is always serializable")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_shape() {
        assert_eq!(report_json::<Detection>(42, &[]), r#"{"seq":42,"detections":[]}"#);
    }

    #[test]
    fn object_report_carries_class_and_box() {
        let detections = vec![Detection {
            class: "person".to_owned(),
            class_id: 0,
            score: 0.5,
            bbox: Bbox {
                x: 1.0,
                y: 2.0,
                w: 3.0,
                h: 4.0,
            },
        }];
        let json = report_json(7, &detections);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["seq"], 7);
        assert_eq!(value["detections"][0]["class"], "person");
        assert_eq!(value["detections"][0]["bbox"]["w"], 3.0);
    }

    #[test]
    fn pose_report_carries_keypoints_not_classes() {
        let poses = vec![Pose {
            score: 0.9,
            bbox: Bbox::default(),
            keypoints: vec![
                Keypoint {
                    x: 10.0,
                    y: 20.0,
                    score: 0.8,
                },
                Keypoint::default(),
            ],
        }];
        let json = report_json(3, &poses);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["detections"][0]["keypoints"][0]["x"], 10.0);
        assert_eq!(value["detections"][0]["keypoints"][1]["score"], 0.0);
        assert!(value["detections"][0].get("class").is_none());
    }
}
