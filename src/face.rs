use std::collections::HashMap;

pub type Point2 = nalgebra::Point2<f32>;
pub type Point3 = nalgebra::Point3<f32>;

/// An ordered set of landmark points belonging to one semantic region.
pub type LandmarkGroup = Vec<Point3>;

/// Semantic groupings of face mesh points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceRegion {
    LeftEyeIris,
    RightEyeIris,
    LeftEyeUpper0,
    LeftEyeLower0,
    RightEyeUpper0,
    RightEyeLower0,
    MidwayBetweenEyes,
    NoseTip,
    LeftCheek,
    RightCheek,
}

impl FaceRegion {
    /// The two iris regions in eye-slot order (0 = left, 1 = right).
    pub const IRISES: [FaceRegion; 2] = [FaceRegion::LeftEyeIris, FaceRegion::RightEyeIris];

    pub fn name(self) -> &'static str {
        match self {
            FaceRegion::LeftEyeIris => "leftEyeIris",
            FaceRegion::RightEyeIris => "rightEyeIris",
            FaceRegion::LeftEyeUpper0 => "leftEyeUpper0",
            FaceRegion::LeftEyeLower0 => "leftEyeLower0",
            FaceRegion::RightEyeUpper0 => "rightEyeUpper0",
            FaceRegion::RightEyeLower0 => "rightEyeLower0",
            FaceRegion::MidwayBetweenEyes => "midwayBetweenEyes",
            FaceRegion::NoseTip => "noseTip",
            FaceRegion::LeftCheek => "leftCheek",
            FaceRegion::RightCheek => "rightCheek",
        }
    }
}

/// Face bounding box in frame pixels, given by two opposite corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub top_left: Point2,
    pub bottom_right: Point2,
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        (self.bottom_right.x - self.top_left.x).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom_right.y - self.top_left.y).max(0.0)
    }
}

/// One detected face. Produced fresh by every inference call.
#[derive(Debug, Clone)]
pub struct Face {
    pub bounding_box: FaceBox,
    pub confidence: f32,
    pub annotations: HashMap<FaceRegion, LandmarkGroup>,
}

impl Face {
    pub fn new(bounding_box: FaceBox, confidence: f32) -> Self {
        Self {
            bounding_box,
            confidence,
            annotations: HashMap::new(),
        }
    }

    pub fn with_group(mut self, region: FaceRegion, group: LandmarkGroup) -> Self {
        self.annotations.insert(region, group);
        self
    }

    pub fn group(&self, region: FaceRegion) -> Option<&LandmarkGroup> {
        self.annotations.get(&region)
    }

    /// Iris landmarks for eye slot `slot` (0 = left, 1 = right).
    pub fn iris(&self, slot: usize) -> Option<&LandmarkGroup> {
        FaceRegion::IRISES.get(slot).and_then(|&region| self.group(region))
    }

    /// All iris keypoints of both eyes.
    pub fn iris_points(&self) -> impl Iterator<Item = &Point3> + '_ {
        FaceRegion::IRISES
            .iter()
            .filter_map(|&region| self.group(region))
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> Face {
        Face::new(
            FaceBox {
                top_left: Point2::new(10.0, 20.0),
                bottom_right: Point2::new(110.0, 150.0),
            },
            0.9,
        )
        .with_group(
            FaceRegion::LeftEyeIris,
            vec![Point3::new(1.0, 1.0, 0.0), Point3::new(2.0, 2.0, 0.0)],
        )
        .with_group(FaceRegion::RightEyeIris, vec![Point3::new(5.0, 5.0, 0.0)])
    }

    #[test]
    fn iris_slots_follow_left_right_order() {
        let face = face();
        assert_eq!(face.iris(0).map(Vec::len), Some(2));
        assert_eq!(face.iris(1).map(Vec::len), Some(1));
        assert!(face.iris(2).is_none());
        assert_eq!(face.iris_points().count(), 3);
    }

    #[test]
    fn box_size_is_never_negative() {
        let face = face();
        assert_eq!(face.bounding_box.width(), 100.0);
        assert_eq!(face.bounding_box.height(), 130.0);

        let flipped = FaceBox {
            top_left: Point2::new(5.0, 5.0),
            bottom_right: Point2::new(0.0, 0.0),
        };
        assert_eq!(flipped.width(), 0.0);
    }
}
