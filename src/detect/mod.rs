mod annotate;
mod contour;
mod segment;

pub use annotate::{draw_rectangle, Annotation, ObjectAnnotator, StrokeStyle};
pub use contour::{find_external_contours, Contour, Point};
pub use segment::{bgr_to_hsv, ColorRange, ColorSegmenter, Hsv, RED_HIGH, RED_LOW};
