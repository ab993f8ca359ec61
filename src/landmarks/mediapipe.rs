use std::path::Path;
use std::sync::Arc;

use image::{imageops, RgbaImage};
use ndarray::{Array, CowArray};
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, ExecutionProvider, GraphOptimizationLevel, Session, SessionBuilder, Value};

use crate::error::{InferenceError, ModelLoadError};
use crate::face::{Face, FaceBox, FaceRegion, Point2, Point3};
use crate::landmarks::FaceLandmarksModel;

const INPUT_SIZE: u32 = 256;
const NUM_LANDMARKS: usize = 478;

// Annotation indices into the 478 point mesh, named from the subject's point of view.
const LEFT_EYE_IRIS: &[usize] = &[473, 474, 475, 476, 477];
const RIGHT_EYE_IRIS: &[usize] = &[468, 469, 470, 471, 472];
const LEFT_EYE_UPPER0: &[usize] = &[466, 388, 387, 386, 385, 384, 398];
const LEFT_EYE_LOWER0: &[usize] = &[263, 249, 390, 373, 374, 380, 381, 382, 362];
const RIGHT_EYE_UPPER0: &[usize] = &[246, 161, 160, 159, 158, 157, 173];
const RIGHT_EYE_LOWER0: &[usize] = &[33, 7, 163, 144, 145, 153, 154, 155, 133];
const MIDWAY_BETWEEN_EYES: &[usize] = &[168];
const NOSE_TIP: &[usize] = &[1];
const LEFT_CHEEK: &[usize] = &[425];
const RIGHT_CHEEK: &[usize] = &[205];

const ANNOTATIONS: &[(FaceRegion, &[usize])] = &[
    (FaceRegion::LeftEyeIris, LEFT_EYE_IRIS),
    (FaceRegion::RightEyeIris, RIGHT_EYE_IRIS),
    (FaceRegion::LeftEyeUpper0, LEFT_EYE_UPPER0),
    (FaceRegion::LeftEyeLower0, LEFT_EYE_LOWER0),
    (FaceRegion::RightEyeUpper0, RIGHT_EYE_UPPER0),
    (FaceRegion::RightEyeLower0, RIGHT_EYE_LOWER0),
    (FaceRegion::MidwayBetweenEyes, MIDWAY_BETWEEN_EYES),
    (FaceRegion::NoseTip, NOSE_TIP),
    (FaceRegion::LeftCheek, LEFT_CHEEK),
    (FaceRegion::RightCheek, RIGHT_CHEEK),
];

/// The square part of the frame fed to the model.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Crop {
    x: u32,
    y: u32,
    side: u32,
}

impl Crop {
    // largest centered square
    fn centered(width: u32, height: u32) -> Self {
        let side = width.min(height);
        Self {
            x: (width - side) / 2,
            y: (height - side) / 2,
            side,
        }
    }

    fn to_frame(self, x: f32, y: f32, z: f32) -> Point3 {
        let scale = self.side as f32 / INPUT_SIZE as f32;
        Point3::new(
            x * scale + self.x as f32,
            y * scale + self.y as f32,
            z * scale,
        )
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Builds a face from the raw mesh output (x, y, z triples in model input pixels).
fn face_from_mesh(values: &[f32], crop: Crop, confidence: f32) -> Result<Face, InferenceError> {
    if values.len() < NUM_LANDMARKS * 3 {
        return Err(InferenceError::OutputSize {
            got: values.len(),
            expected: NUM_LANDMARKS * 3,
        });
    }

    let points: Vec<Point3> = values
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|p| crop.to_frame(p[0], p[1], p[2]))
        .collect();

    let mut top_left = Point2::new(f32::MAX, f32::MAX);
    let mut bottom_right = Point2::new(f32::MIN, f32::MIN);
    for p in &points {
        top_left.x = top_left.x.min(p.x);
        top_left.y = top_left.y.min(p.y);
        bottom_right.x = bottom_right.x.max(p.x);
        bottom_right.y = bottom_right.y.max(p.y);
    }

    let mut face = Face::new(
        FaceBox {
            top_left,
            bottom_right,
        },
        confidence,
    );
    for &(region, indices) in ANNOTATIONS {
        face.annotations
            .insert(region, indices.iter().map(|&i| points[i]).collect());
    }
    Ok(face)
}

/// MediaPipe face mesh (with attention/iris refinement) as an ONNX model.
///
/// The model sees a single centered square of the frame and reports at most one face.
pub struct MediapipeFaceMesh {
    session: Session,
    _environment: Arc<Environment>,
    face_threshold: f32,
}

impl MediapipeFaceMesh {
    pub fn load(
        path: &Path,
        intra_threads: i16,
        face_threshold: f32,
    ) -> Result<Self, ModelLoadError> {
        if !path.is_file() {
            return Err(ModelLoadError::NotFound(path.to_path_buf()));
        }

        let environment = Environment::builder()
            .with_name("eye-recolor")
            .with_execution_providers([ExecutionProvider::CPU(Default::default())])
            .build()?
            .into_arc();

        let session = SessionBuilder::new(&environment)?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .with_model_from_file(path)?;

        log::info!("loaded face mesh model from {}", path.display());

        Ok(Self {
            session,
            _environment: environment,
            face_threshold,
        })
    }
}

impl FaceLandmarksModel for MediapipeFaceMesh {
    fn run(&mut self, image: &RgbaImage) -> Result<Vec<Face>, InferenceError> {
        let crop = Crop::centered(image.width(), image.height());
        if crop.side == 0 {
            return Ok(Vec::new());
        }

        let input = imageops::crop_imm(image, crop.x, crop.y, crop.side, crop.side).to_image();
        let input = imageops::resize(
            &input,
            INPUT_SIZE,
            INPUT_SIZE,
            imageops::FilterType::Triangle,
        );

        // NHWC, RGB in [0, 1]
        let data: Vec<f32> = input
            .pixels()
            .flat_map(|p| p.0[..3].iter().map(|&c| c as f32 / 255.0))
            .collect();
        let array: CowArray<_, _> =
            Array::from_shape_vec((1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3), data)?
                .into_dyn()
                .into();

        let inputs = vec![Value::from_array(self.session.allocator(), &array)?];
        let outputs: Vec<Value> = self.session.run(inputs)?;
        if outputs.len() < 2 {
            return Err(InferenceError::OutputSize {
                got: outputs.len(),
                expected: 2,
            });
        }

        let face_flag: OrtOwnedTensor<f32, _> = outputs[1].try_extract()?;
        let confidence = face_flag
            .view()
            .iter()
            .next()
            .copied()
            .map(sigmoid)
            .unwrap_or(0.0);
        if confidence < self.face_threshold {
            log::trace!("no face (confidence {confidence:.2})");
            return Ok(Vec::new());
        }

        let mesh: OrtOwnedTensor<f32, _> = outputs[0].try_extract()?;
        let values: Vec<f32> = mesh.view().iter().copied().collect();

        Ok(vec![face_from_mesh(&values, crop, confidence)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_is_the_centered_square() {
        assert_eq!(Crop::centered(1280, 720), Crop { x: 280, y: 0, side: 720 });
        assert_eq!(Crop::centered(100, 300), Crop { x: 0, y: 100, side: 100 });
    }

    #[test]
    fn mesh_points_map_back_to_frame_pixels() {
        let crop = Crop::centered(1280, 720);
        let mut values = vec![128.0f32; NUM_LANDMARKS * 3];
        // right iris center at the model input's top-left corner
        values[468 * 3] = 0.0;
        values[468 * 3 + 1] = 0.0;

        let face = face_from_mesh(&values, crop, 0.9).unwrap();
        let iris = face.group(FaceRegion::RightEyeIris).unwrap();
        assert_eq!(iris.len(), 5);
        assert_eq!((iris[0].x, iris[0].y), (280.0, 0.0));
        assert_eq!((iris[1].x, iris[1].y), (280.0 + 360.0, 360.0));

        assert_eq!(face.bounding_box.top_left, Point2::new(280.0, 0.0));
        assert_eq!(face.bounding_box.bottom_right, Point2::new(640.0, 360.0));
        assert_eq!(face.iris(0).map(Vec::len), Some(5));
    }

    #[test]
    fn short_output_is_an_error() {
        let crop = Crop::centered(256, 256);
        let err = face_from_mesh(&[0.0; 30], crop, 1.0).unwrap_err();
        assert!(matches!(err, InferenceError::OutputSize { got: 30, .. }));
    }

    #[test]
    fn sigmoid_is_centered_at_zero() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(8.0) > 0.99);
    }
}
