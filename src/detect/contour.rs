//! Outer contour extraction.
//!
//! Implements topological border following (Suzuki & Abe, 1985) over a
//! zero-padded label grid. Every border is traced so that parent relations are
//! known, but only outer borders whose parent is the image frame are returned:
//! regions nested inside another region's hole are skipped, and hole borders
//! themselves are never reported.
//!
//! Contours are returned in raster discovery order of their starting pixel, and
//! runs of collinear points are compressed to their end points.

use crate::frame::{BoundingBox, Mask};

/// 2D integer point in mask coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Closed outer boundary of one connected foreground region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contour {
    points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Enclosed polygon area (shoelace formula, absolute value).
    ///
    /// Measured on pixel centers, so a solid `n x n` square has area `(n - 1)^2`
    /// and a single pixel or a one-pixel-wide line has area zero.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice: i64 = 0;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
        }
        (twice.abs() as f64) / 2.0
    }

    /// Smallest axis-aligned rectangle containing every point.
    pub fn bounding_box(&self) -> BoundingBox {
        let Some(first) = self.points.first() else {
            return BoundingBox::default();
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        BoundingBox::new(
            min_x.max(0) as u32,
            min_y.max(0) as u32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        )
    }
}

/// Neighbor offsets `(dy, dx)` in clockwise order starting east (y grows down).
const NEIGHBORS: [(isize, isize); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// Label reserved for the image frame; it behaves as a hole border.
const FRAME_LABEL: i32 = 1;

#[derive(Clone, Copy)]
struct Border {
    is_hole: bool,
    parent: i32,
}

struct Grid {
    cells: Vec<i32>,
    stride: usize,
}

impl Grid {
    fn from_mask(mask: &Mask) -> Self {
        let stride = mask.width as usize + 2;
        let rows = mask.height as usize + 2;
        let mut cells = vec![0i32; stride * rows];
        for y in 0..mask.height {
            for x in 0..mask.width {
                if mask.get(x, y) {
                    cells[(y as usize + 1) * stride + x as usize + 1] = 1;
                }
            }
        }
        Self { cells, stride }
    }

    fn at(&self, r: usize, c: usize) -> i32 {
        self.cells[r * self.stride + c]
    }

    fn set(&mut self, r: usize, c: usize, value: i32) {
        self.cells[r * self.stride + c] = value;
    }

    fn neighbor(&self, (r, c): (usize, usize), dir: usize) -> (usize, usize) {
        let (dy, dx) = NEIGHBORS[dir % 8];
        ((r as isize + dy) as usize, (c as isize + dx) as usize)
    }
}

/// Direction index from `from` to its 8-neighbor `to`.
fn direction(from: (usize, usize), to: (usize, usize)) -> usize {
    let dy = to.0 as isize - from.0 as isize;
    let dx = to.1 as isize - from.1 as isize;
    NEIGHBORS
        .iter()
        .position(|&offset| offset == (dy, dx))
        .unwrap_or(0)
}

/// Extract the outermost contours of the foreground regions of `mask`.
pub fn find_external_contours(mask: &Mask) -> Vec<Contour> {
    let mut grid = Grid::from_mask(mask);
    let rows = mask.height as usize + 2;
    let cols = mask.width as usize + 2;

    // Index 0 unused; index 1 is the frame.
    let mut borders = vec![
        Border {
            is_hole: true,
            parent: 0,
        },
        Border {
            is_hole: true,
            parent: 0,
        },
    ];
    let mut contours = Vec::new();
    let mut nbd = FRAME_LABEL;

    for r in 1..rows - 1 {
        let mut lnbd = FRAME_LABEL;
        for c in 1..cols - 1 {
            let value = grid.at(r, c);
            if value == 0 {
                continue;
            }

            let start = if value == 1 && grid.at(r, c - 1) == 0 {
                Some((false, (r, c - 1)))
            } else if value >= 1 && grid.at(r, c + 1) == 0 {
                if value > 1 {
                    lnbd = value;
                }
                Some((true, (r, c + 1)))
            } else {
                None
            };

            if let Some((is_hole, from)) = start {
                nbd += 1;
                let last = borders[lnbd as usize];
                let parent = if is_hole == last.is_hole {
                    last.parent
                } else {
                    lnbd
                };
                borders.push(Border { is_hole, parent });

                let points = follow_border(&mut grid, (r, c), from, nbd);
                if !is_hole && parent == FRAME_LABEL {
                    contours.push(Contour::new(compress(points)));
                }
            }

            let value = grid.at(r, c);
            if value != 1 {
                lnbd = value.abs();
            }
        }
    }

    contours
}

/// Trace one border starting at `start`, entering from the zero pixel `from`.
///
/// Returns the border pixels in padded grid coordinates translated back to
/// mask coordinates.
fn follow_border(
    grid: &mut Grid,
    start: (usize, usize),
    from: (usize, usize),
    nbd: i32,
) -> Vec<Point> {
    let to_point = |(r, c): (usize, usize)| Point::new(c as i32 - 1, r as i32 - 1);

    // Clockwise search for the first nonzero neighbor.
    let from_dir = direction(start, from);
    let first = (0..8)
        .map(|k| grid.neighbor(start, from_dir + k))
        .find(|&(r, c)| grid.at(r, c) != 0);
    let Some(first) = first else {
        grid.set(start.0, start.1, -nbd);
        return vec![to_point(start)];
    };

    let mut points = Vec::new();
    let mut prev = first;
    let mut current = start;
    loop {
        points.push(to_point(current));

        // Counterclockwise search, starting just past `prev`.
        let prev_dir = direction(current, prev);
        let mut east_examined = false;
        let mut next = current;
        for k in 1..=8 {
            let dir = (prev_dir + 8 - k) % 8;
            let cell = grid.neighbor(current, dir);
            if grid.at(cell.0, cell.1) != 0 {
                next = cell;
                break;
            }
            if dir == 0 {
                east_examined = true;
            }
        }

        if east_examined {
            grid.set(current.0, current.1, -nbd);
        } else if grid.at(current.0, current.1) == 1 {
            grid.set(current.0, current.1, nbd);
        }

        if next == start && current == first {
            break;
        }
        prev = current;
        current = next;
    }

    points
}

/// Drop interior points of straight (horizontal, vertical or diagonal) runs.
fn compress(points: Vec<Point>) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points;
    }
    let step = |a: Point, b: Point| ((b.x - a.x).signum(), (b.y - a.y).signum());
    let mut kept = Vec::with_capacity(n);
    for i in 0..n {
        let prev = points[(i + n - 1) % n];
        let here = points[i];
        let next = points[(i + 1) % n];
        if step(prev, here) != step(here, next) {
            kept.push(here);
        }
    }
    if kept.is_empty() {
        return points;
    }
    kept
}
