use image::Rgba;

use crate::face::Face;
use crate::surface::{Surface, TextStyle};

const FACE_BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const KEYPOINT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const KEYPOINT_RADIUS: i32 = 1;
const MARGIN: i32 = 15;

/// Diagnostic drawing for debug mode: reference coordinates, face boxes, iris keypoints,
/// frame rate and face count.
pub fn draw_debug_overlay<S: Surface + ?Sized>(
    surface: &mut S,
    faces: &[Face],
    fps_label: &str,
    style: TextStyle,
) {
    surface.set_text_style(style);
    draw_reference_labels(surface, style);

    for face in faces {
        let bbox = &face.bounding_box;
        surface.draw_rect_outline(
            bbox.top_left.x.floor() as i32,
            bbox.top_left.y.floor() as i32,
            bbox.width().round() as u32,
            bbox.height().round() as u32,
            FACE_BOX_COLOR,
        );
        for p in face.iris_points() {
            surface.draw_circle_outline(
                p.x.round() as i32,
                p.y.round() as i32,
                KEYPOINT_RADIUS,
                KEYPOINT_COLOR,
            );
        }
    }

    let line = style.size.round() as i32;
    surface.draw_text(fps_label, MARGIN, MARGIN + 5);
    surface.draw_text(
        &format!("{} face(s)", faces.len()),
        MARGIN,
        MARGIN + 5 + line + 4,
    );
}

// Surface coordinates printed next to the corners they name.
fn draw_reference_labels<S: Surface + ?Sized>(surface: &mut S, style: TextStyle) {
    let (w, h) = surface.size();
    let (w, h) = (w as i32, h as i32);
    let line = style.size.round() as i32;
    // rough width of a label, right-aligned labels are pulled in by this much
    let label_width = (style.size * 5.0) as i32;

    surface.draw_text(&format!("({w}, 0)"), w - label_width - MARGIN, MARGIN + 5);
    surface.draw_text(&format!("(0, {h})"), MARGIN, h - MARGIN);
    surface.draw_text(&format!("({w}, {h})"), w - label_width - MARGIN, h - MARGIN);
    surface.draw_text(
        &format!("({}, {})", w / 2, h / 2),
        w / 2 - label_width / 2,
        h / 2 - line,
    );
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use image::RgbaImage;

    use super::*;
    use crate::face::{FaceBox, FaceRegion, Point2, Point3};
    use crate::recolor::PixelBuffer;
    use crate::region::BoundingRegion;
    use crate::surface::ImageSurface;

    #[derive(Default)]
    struct Recorder {
        texts: Vec<String>,
        rects: Vec<(i32, i32, u32, u32)>,
        circles: Vec<(i32, i32)>,
    }

    impl Surface for Recorder {
        fn size(&self) -> (u32, u32) {
            (1280, 720)
        }
        fn draw_frame(&mut self, _frame: &RgbaImage) {}
        fn read_region(&self, region: &BoundingRegion, buffer: &mut PixelBuffer) {
            buffer.reshape(region.width, region.height);
        }
        fn write_region(&mut self, _buffer: &PixelBuffer, _x: i32, _y: i32) {}
        fn set_text_style(&mut self, _style: TextStyle) {}
        fn draw_text(&mut self, text: &str, _x: i32, _y: i32) {
            self.texts.push(text.to_string());
        }
        fn draw_rect_outline(&mut self, x: i32, y: i32, w: u32, h: u32, _color: Rgba<u8>) {
            self.rects.push((x, y, w, h));
        }
        fn draw_circle_outline(&mut self, x: i32, y: i32, _r: i32, _color: Rgba<u8>) {
            self.circles.push((x, y));
        }
    }

    #[test]
    fn draws_every_debug_element() {
        let face = Face {
            bounding_box: FaceBox {
                top_left: Point2::new(100.2, 50.0),
                bottom_right: Point2::new(300.2, 330.0),
            },
            confidence: 1.0,
            annotations: HashMap::from([
                (
                    FaceRegion::LeftEyeIris,
                    vec![Point3::new(150.0, 120.0, 0.0), Point3::new(152.0, 121.0, 0.0)],
                ),
                (FaceRegion::RightEyeIris, vec![Point3::new(250.4, 119.6, 0.0)]),
                (FaceRegion::NoseTip, vec![Point3::new(200.0, 200.0, 0.0)]),
            ]),
        };

        let mut surface = Recorder::default();
        draw_debug_overlay(&mut surface, &[face], "60 fps", TextStyle::default());

        assert_eq!(surface.rects, vec![(100, 50, 200, 280)]);
        // iris points only, the nose tip is not marked
        assert_eq!(surface.circles.len(), 3);
        assert!(surface.circles.contains(&(250, 120)));
        assert!(surface.texts.contains(&"60 fps".to_string()));
        assert!(surface.texts.contains(&"1 face(s)".to_string()));
        assert!(surface.texts.contains(&"(1280, 720)".to_string()));
    }

    #[test]
    fn no_faces_still_reports_count_and_rate() {
        let mut surface = Recorder::default();
        draw_debug_overlay(&mut surface, &[], "0 fps", TextStyle::default());
        assert!(surface.rects.is_empty());
        assert!(surface.texts.contains(&"0 face(s)".to_string()));
    }

    #[test]
    fn labels_reach_the_canvas_of_a_default_surface() {
        let mut surface = ImageSurface::new(320, 240);
        draw_debug_overlay(&mut surface, &[], "60 fps", TextStyle::default());

        let blank = Rgba([0, 0, 0, 0]);
        let canvas = surface.canvas();
        let changed = |xs: std::ops::Range<u32>, ys: std::ops::Range<u32>| {
            xs.flat_map(|x| ys.clone().map(move |y| (x, y)))
                .any(|(x, y)| *canvas.get_pixel(x, y) != blank)
        };
        // frame rate line
        assert!(changed(15..80, 0..25));
        // face count line
        assert!(changed(15..100, 25..50));
        // center reference label
        assert!(changed(100..220, 90..125));
    }
}
