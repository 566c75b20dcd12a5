//! Bounding-box annotation of segmented objects.

use serde::Deserialize;

use crate::detect::contour::find_external_contours;
use crate::frame::{BoundingBox, Frame, Mask};

/// Outline color and thickness for drawn rectangles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct StrokeStyle {
    /// BGR color.
    pub color: [u8; 3],
    /// Line thickness in pixels, drawn inward from the box edge.
    pub width: u32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: [0, 255, 0],
            width: 2,
        }
    }
}

/// Annotated working copy of a frame plus the boxes drawn on it.
#[derive(Clone, Debug)]
pub struct Annotation {
    pub frame: Frame,
    pub boxes: Vec<BoundingBox>,
}

/// Draws a rectangle around every mask region whose contour area exceeds `min_area`.
#[derive(Clone, Copy, Debug)]
pub struct ObjectAnnotator {
    min_area: f64,
    stroke: StrokeStyle,
}

impl ObjectAnnotator {
    pub fn new(min_area: f64, stroke: StrokeStyle) -> Self {
        Self { min_area, stroke }
    }

    /// Bounding boxes of contours with `area > min_area`, in discovery order.
    pub fn detect(&self, mask: &Mask) -> Vec<BoundingBox> {
        find_external_contours(mask)
            .iter()
            .filter(|contour| contour.area() > self.min_area)
            .map(|contour| contour.bounding_box())
            .collect()
    }

    /// Annotate a copy of `frame`; the input is left untouched.
    pub fn annotate(&self, frame: &Frame, mask: &Mask) -> Annotation {
        debug_assert!(mask.matches(frame), "mask dimensions must match frame");
        let boxes = self.detect(mask);
        let mut annotated = frame.clone();
        for rect in &boxes {
            draw_rectangle(&mut annotated, *rect, self.stroke);
        }
        Annotation {
            frame: annotated,
            boxes,
        }
    }
}

/// Draw the outline of `rect`, clipped to the frame.
///
/// The stroke lies inside `rect`: its outer edge is the box's first and last
/// pixel row and column. It is not centered on the edge, so a box touching
/// the frame border keeps its full thickness.
pub fn draw_rectangle(frame: &mut Frame, rect: BoundingBox, stroke: StrokeStyle) {
    if rect.width == 0 || rect.height == 0 || stroke.width == 0 {
        return;
    }
    let t_x = stroke.width.min(rect.width);
    let t_y = stroke.width.min(rect.height);
    let right = rect.x + rect.width;
    let bottom = rect.y + rect.height;

    // Top, bottom, left, right bands.
    frame.fill_rect(BoundingBox::new(rect.x, rect.y, rect.width, t_y), stroke.color);
    frame.fill_rect(
        BoundingBox::new(rect.x, bottom - t_y, rect.width, t_y),
        stroke.color,
    );
    frame.fill_rect(BoundingBox::new(rect.x, rect.y, t_x, rect.height), stroke.color);
    frame.fill_rect(
        BoundingBox::new(right - t_x, rect.y, t_x, rect.height),
        stroke.color,
    );
}
