//! Box and keypoint geometry shared by the detector variants.

use serde::Serialize;

/// Axis-aligned box in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Bbox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Bbox {
    pub fn xmax(&self) -> f32 {
        self.x + self.w
    }

    pub fn ymax(&self) -> f32 {
        self.y + self.h
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    pub fn intersection(&self, other: &Bbox) -> f32 {
        let left = self.x.max(other.x);
        let right = self.xmax().min(other.xmax());
        let top = self.y.max(other.y);
        let bottom = self.ymax().min(other.ymax());
        (right - left).max(0.0) * (bottom - top).max(0.0)
    }

    pub fn union(&self, other: &Bbox) -> f32 {
        self.area() + other.area() - self.intersection(other)
    }

    pub fn iou(&self, other: &Bbox) -> f32 {
        let union = self.union(other);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection(other) / union
    }
}

/// One skeleton joint; a zeroed keypoint stands for "not confidently seen".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

impl Keypoint {
    pub fn is_visible(&self) -> bool {
        self.score > 0.0
    }
}

/// Edges of the 17-joint COCO skeleton, as keypoint index pairs.
pub const SKELETON: [(usize, usize); 16] = [
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (5, 6),
    (5, 11),
    (6, 12),
    (11, 12),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (11, 13),
    (12, 14),
    (13, 15),
    (14, 16),
];

/// Greedy IoU suppression: keep the highest-scoring item of every cluster of
/// mutually overlapping boxes.
pub fn non_max_suppression<T>(
    items: &mut Vec<T>,
    bbox: impl Fn(&T) -> Bbox,
    score: impl Fn(&T) -> f32,
    iou_threshold: f32,
) {
    items.sort_by(|a, b| score(b).total_cmp(&score(a)));

    let mut kept = 0;
    for index in 0..items.len() {
        let mut suppressed = false;
        for prev in 0..kept {
            if bbox(&items[prev]).iou(&bbox(&items[index])) > iou_threshold {
                suppressed = true;
                break;
            }
        }
        if !suppressed {
            items.swap(kept, index);
            kept += 1;
        }
    }
    items.truncate(kept);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> Bbox {
        Bbox { x, y, w, h }
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = bbox(10.0, 10.0, 20.0, 20.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlapping_boxes() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 0.0, 10.0, 10.0);
        // intersection 50, union 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn nms_keeps_the_strongest_of_a_cluster() {
        let mut items = vec![
            (bbox(0.0, 0.0, 10.0, 10.0), 0.6),
            (bbox(1.0, 1.0, 10.0, 10.0), 0.9),
            (bbox(50.0, 50.0, 10.0, 10.0), 0.5),
        ];
        non_max_suppression(&mut items, |i| i.0, |i| i.1, 0.45);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].1, 0.9);
        assert_eq!(items[1].1, 0.5);
    }

    #[test]
    fn nms_sorts_survivors_by_score() {
        let mut items = vec![
            (bbox(0.0, 0.0, 5.0, 5.0), 0.2),
            (bbox(20.0, 0.0, 5.0, 5.0), 0.8),
            (bbox(40.0, 0.0, 5.0, 5.0), 0.5),
        ];
        non_max_suppression(&mut items, |i| i.0, |i| i.1, 0.45);
        let scores: Vec<f32> = items.iter().map(|i| i.1).collect();
        assert_eq!(scores, vec![0.8, 0.5, 0.2]);
    }
}
