//! Popup outline computation.
//!
//! A popup with an arrow is a rectangle with a triangular pointer carved
//! into its top or bottom edge. The pointer tip sits on the anchor point and
//! the popup body is shifted so that it stays on screen. The outline is
//! rebuilt on every paint because both the anchor and the size can change.
//!
//! ```text
//!  Up                      Down
//!          /\              +----------------------+
//!  +------/  \----+        |                      |
//!  |              |        +------\  /------------+
//!  +--------------+                \/
//! ```

use crate::content::SPACER_LEFT;
use crate::geometry::{Point, Rect, Size};

pub const DEFAULT_ARROW_HEIGHT: i32 = 14;
pub const DEFAULT_ARROW_WIDTH: i32 = 28;
pub const DEFAULT_ARROW_OFFSET: i32 = SPACER_LEFT + 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrowDirection {
    Up,
    Down,
}

/// Which arrow sides survive horizontal clamping against the screen edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryCase {
    NoCollapse,
    /// Anchor closer to the left screen edge than half an arrow.
    LeftCollapse,
    /// Anchor closer to the right screen edge than half an arrow.
    RightCollapse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArrowGeometry {
    pub direction: ArrowDirection,
    pub case: GeometryCase,
    pub offset: i32,
    pub side1_width: i32,
    pub side2_width: i32,
    pub begin: Point,
    pub middle: Point,
    pub end: Point,
}

/// The arrow points up, with the popup hanging below the anchor, unless
/// that would push the popup past the bottom of the screen.
pub fn arrow_direction(anchor_y: i32, popup_height: i32, screen_height: i32) -> ArrowDirection {
    if anchor_y + popup_height + DEFAULT_ARROW_HEIGHT > screen_height {
        ArrowDirection::Down
    } else {
        ArrowDirection::Up
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.0.len();
        (0..n).map(move |i| (self.0[i], self.0[(i + 1) % n]))
    }

    fn crossings(&self, py: f64) -> Vec<f64> {
        let mut xs: Vec<f64> = self
            .edges()
            .filter_map(|(a, b)| {
                let (ay, by) = (f64::from(a.y), f64::from(b.y));
                ((ay <= py) != (by <= py))
                    .then(|| f64::from(a.x) + (py - ay) * f64::from(b.x - a.x) / (by - ay))
            })
            .collect();
        xs.sort_by(f64::total_cmp);
        xs
    }
}

/// Pixel region covered by a polygon under the even-odd rule, as
/// row-aligned rectangles. Owned by the popup that produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn from_polygon(polygon: &Polygon) -> Self {
        let Some(top) = polygon.points().iter().map(|p| p.y).min() else {
            return Self::default();
        };
        let bottom = polygon.points().iter().map(|p| p.y).max().unwrap_or(top);

        let mut rects: Vec<Rect> = Vec::new();
        let mut prev_spans: Vec<(i32, i32)> = Vec::new();
        let mut prev_start = 0;

        for y in top..bottom {
            let xs = polygon.crossings(f64::from(y) + 0.5);
            let spans: Vec<(i32, i32)> = xs
                .chunks_exact(2)
                .filter_map(|pair| {
                    let start = (pair[0] - 0.5).ceil() as i32;
                    let end = (pair[1] - 0.5).ceil() as i32;
                    (end > start).then_some((start, end))
                })
                .collect();

            if !spans.is_empty() && spans == prev_spans {
                for rect in &mut rects[prev_start..] {
                    rect.height += 1;
                }
                continue;
            }

            prev_start = rects.len();
            rects.extend(
                spans
                    .iter()
                    .map(|&(start, end)| Rect::new(start, y, end - start, 1)),
            );
            prev_spans = spans;
        }

        Self { rects }
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains(x, y))
    }
}

/// Everything derived from one popup size and anchor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outline {
    /// Border path in popup coordinates, stroked on pixel centers.
    pub border: Polygon,
    /// Border path with right and bottom vertices pushed out one pixel so
    /// the filled shape covers the stroked border.
    pub shape: Polygon,
    pub arrow: ArrowGeometry,
    /// Window top-left on screen that puts the arrow tip on the anchor.
    pub origin: Point,
}

impl Outline {
    pub fn region(&self) -> Region {
        Region::from_polygon(&self.shape)
    }
}

#[derive(Clone, Copy)]
struct Vertex {
    x: i32,
    y: i32,
    shape_dx: i32,
    shape_dy: i32,
}

const fn vertex(x: i32, y: i32, shape_dx: i32, shape_dy: i32) -> Vertex {
    Vertex {
        x,
        y,
        shape_dx,
        shape_dy,
    }
}

pub fn compute_outline(size: Size, anchor: Point, screen: Size) -> Outline {
    let width = size.width.max(0);
    let height = size.height.max(0);
    let half = DEFAULT_ARROW_WIDTH / 2;
    let direction = arrow_direction(anchor.y, height, screen.height);

    let (case, side1_width, side2_width, offset) = if anchor.x < half {
        (GeometryCase::LeftCollapse, 0, half, 0)
    } else if anchor.x > screen.width - half {
        (GeometryCase::RightCollapse, half, 0, (width - half).max(0))
    } else {
        let offset = if anchor.x - half + width >= screen.width {
            // Keep the popup body on screen; slide the arrow right instead.
            let reach = (anchor.x + half).max(screen.width - DEFAULT_ARROW_OFFSET);
            width - 2 * half - (screen.width - reach)
        } else {
            (anchor.x - half).min(DEFAULT_ARROW_OFFSET)
        };
        (
            GeometryCase::NoCollapse,
            half,
            half,
            offset.clamp(0, (width - 2 * half).max(0)),
        )
    };

    let (base_y, tip_y) = match direction {
        ArrowDirection::Up => (DEFAULT_ARROW_HEIGHT, 0),
        ArrowDirection::Down => (height - DEFAULT_ARROW_HEIGHT, height),
    };

    let arrow = ArrowGeometry {
        direction,
        case,
        offset,
        side1_width,
        side2_width,
        begin: Point::new(offset, base_y),
        middle: Point::new(offset + side1_width, tip_y),
        end: Point::new(offset + side1_width + side2_width, base_y),
    };

    let vertices = match direction {
        ArrowDirection::Up => up_template(&arrow, width, height),
        ArrowDirection::Down => down_template(&arrow, width, height),
    };

    let border = Polygon::new(vertices.iter().map(|v| Point::new(v.x, v.y)).collect());
    let shape = Polygon::new(
        vertices
            .iter()
            .map(|v| Point::new(v.x + v.shape_dx, v.y + v.shape_dy))
            .collect(),
    );

    let origin = Point::new(
        anchor.x - offset - side1_width,
        match direction {
            ArrowDirection::Up => anchor.y,
            ArrowDirection::Down => anchor.y - height,
        },
    );

    Outline {
        border,
        shape,
        arrow,
        origin,
    }
}

// Both templates trace clockwise from the top-left corner.

fn up_template(arrow: &ArrowGeometry, width: i32, height: i32) -> Vec<Vertex> {
    let base = DEFAULT_ARROW_HEIGHT;
    let right = width - 1;
    let bottom = height - 1;
    let mut v = Vec::with_capacity(7);

    match arrow.case {
        GeometryCase::LeftCollapse => {
            v.push(vertex(0, 0, 0, 0));
            v.push(vertex(arrow.end.x, base, 1, 0));
        }
        GeometryCase::RightCollapse => {
            v.push(vertex(0, base, 0, 0));
            v.push(vertex(arrow.begin.x - 1, base, 0, 0));
            v.push(vertex(right, 0, 0, 0));
        }
        GeometryCase::NoCollapse => {
            v.push(vertex(0, base, 0, 0));
            if arrow.begin.x > 0 {
                v.push(vertex(arrow.begin.x, base, 0, 0));
            }
            v.push(vertex(arrow.middle.x, 0, 0, 0));
            if arrow.end.x < right {
                v.push(vertex(arrow.end.x, base, 1, 0));
            }
        }
    }

    if arrow.case != GeometryCase::RightCollapse {
        v.push(vertex(right, base, 1, 0));
    }
    v.push(vertex(right, bottom, 1, 1));
    v.push(vertex(0, bottom, 0, 1));
    v
}

fn down_template(arrow: &ArrowGeometry, width: i32, height: i32) -> Vec<Vertex> {
    let base = height - DEFAULT_ARROW_HEIGHT;
    let right = width - 1;
    let mut v = Vec::with_capacity(7);

    v.push(vertex(0, 0, 0, 0));
    v.push(vertex(right, 0, 1, 0));

    match arrow.case {
        GeometryCase::RightCollapse => {
            v.push(vertex(right, height, 0, 0));
            v.push(vertex(arrow.begin.x - 1, base, 0, 0));
        }
        GeometryCase::LeftCollapse => {
            v.push(vertex(right, base, 1, 1));
            v.push(vertex(arrow.end.x, base, 0, 1));
            v.push(vertex(0, height, 0, 1));
        }
        GeometryCase::NoCollapse => {
            v.push(vertex(right, base, 1, 1));
            if arrow.end.x < right {
                v.push(vertex(arrow.end.x, base, 0, 1));
            }
            v.push(vertex(arrow.middle.x, height, 0, 1));
            if arrow.begin.x > 0 {
                v.push(vertex(arrow.begin.x, base, 0, 0));
            }
        }
    }

    if arrow.case != GeometryCase::LeftCollapse {
        v.push(vertex(0, base, 0, 1));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Size = Size {
        width: 1280,
        height: 800,
    };
    const POPUP: Size = Size {
        width: 400,
        height: 120,
    };

    fn orient(a: Point, b: Point, c: Point) -> i64 {
        let (ax, ay) = (i64::from(a.x), i64::from(a.y));
        (i64::from(b.x) - ax) * (i64::from(c.y) - ay) - (i64::from(b.y) - ay) * (i64::from(c.x) - ax)
    }

    fn within(a: Point, b: Point, p: Point) -> bool {
        p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
    }

    fn touch(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
        let d1 = orient(q1, q2, p1);
        let d2 = orient(q1, q2, p2);
        let d3 = orient(p1, p2, q1);
        let d4 = orient(p1, p2, q2);
        if ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0)) && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0)) {
            return true;
        }
        (d1 == 0 && within(q1, q2, p1))
            || (d2 == 0 && within(q1, q2, p2))
            || (d3 == 0 && within(p1, p2, q1))
            || (d4 == 0 && within(p1, p2, q2))
    }

    fn assert_simple(polygon: &Polygon) {
        let pts = polygon.points();
        let n = pts.len();
        for i in 0..n {
            let (a, b, c) = (pts[i], pts[(i + 1) % n], pts[(i + 2) % n]);
            assert_ne!(a, b, "repeated vertex in {pts:?}");
            // no back-tracking spike between consecutive edges
            if orient(a, b, c) == 0 {
                let dot = i64::from(b.x - a.x) * i64::from(c.x - b.x)
                    + i64::from(b.y - a.y) * i64::from(c.y - b.y);
                assert!(dot > 0, "spike at {b:?} in {pts:?}");
            }
        }
        for i in 0..n {
            for j in i + 2..n {
                if i == 0 && j == n - 1 {
                    continue;
                }
                let (p1, p2) = (pts[i], pts[(i + 1) % n]);
                let (q1, q2) = (pts[j], pts[(j + 1) % n]);
                assert!(!touch(p1, p2, q1, q2), "edges {i} and {j} cross in {pts:?}");
            }
        }
    }

    #[test]
    fn direction_flips_near_bottom_edge() {
        assert_eq!(arrow_direction(500, 100, 600), ArrowDirection::Down);
        assert_eq!(arrow_direction(500, 100, 700), ArrowDirection::Up);
        assert_eq!(arrow_direction(486, 100, 600), ArrowDirection::Up);
    }

    #[test]
    fn interior_anchor_uses_full_arrow() {
        let outline = compute_outline(POPUP, Point::new(600, 200), SCREEN);
        assert_eq!(outline.arrow.case, GeometryCase::NoCollapse);
        assert_eq!(outline.arrow.direction, ArrowDirection::Up);
        assert_eq!(outline.arrow.offset, DEFAULT_ARROW_OFFSET);
        assert_eq!(outline.border.len(), 7);
        assert_eq!(outline.arrow.middle, Point::new(46, 0));
        assert_eq!(outline.origin, Point::new(600 - 32 - 14, 200));
    }

    #[test]
    fn arrow_at_popup_edge_drops_a_shoulder() {
        let outline = compute_outline(POPUP, Point::new(14, 200), SCREEN);
        assert_eq!(outline.arrow.case, GeometryCase::NoCollapse);
        assert_eq!(outline.arrow.offset, 0);
        assert_eq!(outline.border.len(), 6);
    }

    #[test]
    fn collapsed_sides_give_five_points() {
        let left = compute_outline(POPUP, Point::new(5, 200), SCREEN);
        assert_eq!(left.arrow.case, GeometryCase::LeftCollapse);
        assert_eq!(left.arrow.side1_width, 0);
        assert_eq!(left.arrow.offset, 0);
        assert_eq!(left.border.len(), 5);
        assert_eq!(left.origin.x, 5);

        let right = compute_outline(POPUP, Point::new(1275, 200), SCREEN);
        assert_eq!(right.arrow.case, GeometryCase::RightCollapse);
        assert_eq!(right.arrow.side2_width, 0);
        assert_eq!(right.arrow.offset, POPUP.width - 14);
        assert_eq!(right.border.len(), 5);
    }

    #[test]
    fn right_overflow_keeps_popup_on_screen() {
        for x in 880..=1266 {
            let outline = compute_outline(POPUP, Point::new(x, 200), SCREEN);
            assert!(
                outline.origin.x + POPUP.width <= SCREEN.width,
                "anchor {x} pushes popup to {:?}",
                outline.origin
            );
            assert!(outline.arrow.end.x <= POPUP.width);
        }
    }

    #[test]
    fn arrow_tip_lands_on_anchor() {
        for &(x, y) in &[(3, 100), (14, 100), (300, 100), (1250, 100), (1279, 100), (640, 750)] {
            let outline = compute_outline(POPUP, Point::new(x, y), SCREEN);
            let tip_x = outline.origin.x + outline.arrow.middle.x;
            assert_eq!(tip_x, x, "anchor ({x}, {y})");
            let tip_y = outline.origin.y + outline.arrow.middle.y;
            assert_eq!(tip_y, y);
        }
    }

    #[test]
    fn outlines_are_simple_polygons() {
        for y in [100, 760] {
            for x in 0..=SCREEN.width {
                let outline = compute_outline(POPUP, Point::new(x, y), SCREEN);
                assert!(outline.border.len() >= 5);
                assert_simple(&outline.border);
            }
        }
    }

    #[test]
    fn region_follows_arrow_notch() {
        let outline = compute_outline(POPUP, Point::new(600, 200), SCREEN);
        let region = outline.region();
        assert!(region.contains(200, 60));
        assert!(region.contains(outline.arrow.middle.x, 5));
        assert!(!region.contains(2, 2));
        assert!(!region.contains(300, 2));
        assert!(region.contains(POPUP.width - 1, POPUP.height - 1));
        assert!(!region.contains(POPUP.width, 60));
    }

    #[test]
    fn square_region_is_even_odd_interior() {
        let square = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ]);
        let region = Region::from_polygon(&square);
        assert!(region.contains(5, 5));
        assert!(!region.contains(10, 5));
        assert_eq!(region.rects(), &[Rect::new(0, 0, 10, 10)]);
    }

    #[test]
    fn degenerate_size_does_not_panic() {
        let outline = compute_outline(Size::new(0, 0), Point::new(600, 200), SCREEN);
        assert!(outline.border.len() >= 5);
        assert_eq!(outline.arrow.offset, 0);
    }
}
