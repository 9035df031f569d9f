use crate::error::{Result, config_error};
use crate::ir::{Axis, Orientation};
use geo::{Area, BooleanOps, Contains, Coord, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Free space below this is treated as the obstacle touching the boundary.
pub const SIDE_EPSILON: f64 = 1e-3;

const COORD_EPSILON: f64 = 1e-9;

/// Axis-aligned rectangle given by centre and full extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub center: [f64; 2],
    pub extent: [f64; 2],
}

impl Rect {
    pub fn new(center: [f64; 2], extent: [f64; 2]) -> Self {
        Self { center, extent }
    }

    pub fn from_bounds(min: [f64; 2], max: [f64; 2]) -> Self {
        Self {
            center: [(min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0],
            extent: [max[0] - min[0], max[1] - min[1]],
        }
    }

    pub fn min(&self, axis: usize) -> f64 {
        self.center[axis] - self.extent[axis] / 2.0
    }

    pub fn max(&self, axis: usize) -> f64 {
        self.center[axis] + self.extent[axis] / 2.0
    }

    /// Two rectangles overlap unless some axis separates their centres by
    /// more than the sum of the half extents.
    pub fn overlaps(&self, other: &Rect) -> bool {
        (0..2).all(|axis| {
            (self.center[axis] - other.center[axis]).abs()
                <= (self.extent[axis] + other.extent[axis]) / 2.0
        })
    }

    pub fn contains(&self, other: &Rect) -> bool {
        (0..2).all(|axis| {
            other.min(axis) >= self.min(axis) - COORD_EPSILON
                && other.max(axis) <= self.max(axis) + COORD_EPSILON
        })
    }

    pub fn area(&self) -> f64 {
        self.extent[0] * self.extent[1]
    }
}

/// One polygon edge together with the direction the wall faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallSegment {
    pub index: usize,
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub orientation: Orientation,
}

impl WallSegment {
    pub fn min(&self, axis: usize) -> f64 {
        self.start[axis].min(self.end[axis])
    }

    pub fn max(&self, axis: usize) -> f64 {
        self.start[axis].max(self.end[axis])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Boundary {
    pub origin: [f64; 3],
    pub size: [f64; 3],
    pub points: Vec<[f64; 2]>,
    /// `walls[i]` tags the segment `points[i] -> points[(i + 1) % n]`.
    pub walls: Vec<Orientation>,
}

impl Boundary {
    pub fn new(
        origin: [f64; 3],
        size: [f64; 3],
        points: Vec<[f64; 2]>,
        walls: Vec<Orientation>,
    ) -> Result<Self> {
        if points.len() != walls.len() {
            return Err(config_error(format!(
                "boundary has {} points but {} wall orientations",
                points.len(),
                walls.len()
            )));
        }
        if let Some(wall) = walls.iter().find(|wall| !wall.is_planar()) {
            return Err(config_error(format!(
                "wall orientation {} is not a planar direction",
                wall.as_str()
            )));
        }
        if size.iter().any(|extent| *extent < 0.0 || !extent.is_finite()) {
            return Err(config_error("boundary size must be finite and non-negative"));
        }
        Ok(Self {
            origin,
            size,
            points,
            walls,
        })
    }

    /// Axis-aligned box boundary listed counter-clockwise from the origin corner.
    pub fn rectangle(origin: [f64; 3], size: [f64; 3]) -> Self {
        let [x, y, _] = origin;
        Self {
            origin,
            size,
            points: vec![
                [x, y],
                [x + size[0], y],
                [x + size[0], y + size[1]],
                [x, y + size[1]],
            ],
            walls: vec![
                Orientation::Back,
                Orientation::Right,
                Orientation::Front,
                Orientation::Left,
            ],
        }
    }

    /// Builds the bounding box from the polygon and derives each wall's orientation.
    pub fn from_polygon(points: Vec<[f64; 2]>, base_z: f64, height: f64) -> Result<Self> {
        let walls = derive_wall_orientations(&points)?;
        let (min, max) = bounds(&points);
        Self::new(
            [min[0], min[1], base_z],
            [max[0] - min[0], max[1] - min[1], height],
            points,
            walls,
        )
    }

    pub fn wall(&self, index: usize) -> Option<WallSegment> {
        let count = self.points.len();
        if index >= count || index >= self.walls.len() {
            return None;
        }
        Some(WallSegment {
            index,
            start: self.points[index],
            end: self.points[(index + 1) % count],
            orientation: self.walls[index],
        })
    }

    pub fn footprint(&self) -> Rect {
        Rect::from_bounds(
            [self.origin[0], self.origin[1]],
            [self.origin[0] + self.size[0], self.origin[1] + self.size[1]],
        )
    }

    pub fn min(&self, axis: Axis) -> f64 {
        self.origin[axis.index()]
    }

    pub fn max(&self, axis: Axis) -> f64 {
        self.origin[axis.index()] + self.size[axis.index()]
    }

    /// Bounding box floor area.
    pub fn area(&self) -> f64 {
        self.size[0] * self.size[1]
    }

    /// Big-M constant for the disjunctive constraints.
    pub fn big_m(&self) -> f64 {
        self.size.iter().sum()
    }

    /// Parts of the bounding box outside the polygon, as full-height boxes.
    pub fn concavity_obstacles(&self) -> Vec<Obstacle> {
        if self.points.len() < 3 {
            return Vec::new();
        }
        let bbox = self.footprint();
        let outline = to_polygon(&self.points);
        let frame = to_polygon(&[
            [bbox.min(0), bbox.min(1)],
            [bbox.max(0), bbox.min(1)],
            [bbox.max(0), bbox.max(1)],
            [bbox.min(0), bbox.max(1)],
        ]);
        let outside = frame.difference(&outline);
        if outside.unsigned_area() <= COORD_EPSILON {
            return Vec::new();
        }

        let xs = grid_lines(self.points.iter().map(|p| p[0]), bbox.min(0), bbox.max(0));
        let ys = grid_lines(self.points.iter().map(|p| p[1]), bbox.min(1), bbox.max(1));

        // Row strips first, then stack strips that span the same x interval.
        let mut boxes: Vec<[f64; 4]> = Vec::new();
        for row in ys.windows(2) {
            let cy = (row[0] + row[1]) / 2.0;
            let mut run: Option<(f64, f64)> = None;
            let mut strips = Vec::new();
            for column in xs.windows(2) {
                let cx = (column[0] + column[1]) / 2.0;
                if outside.contains(&Point::new(cx, cy)) {
                    run = Some(match run {
                        Some((start, _)) => (start, column[1]),
                        None => (column[0], column[1]),
                    });
                } else if let Some(done) = run.take() {
                    strips.push(done);
                }
            }
            strips.extend(run);
            for (x0, x1) in strips {
                let stacked = boxes.iter_mut().find(|b| {
                    approx(b[0], x0) && approx(b[1], x1) && approx(b[3], row[0])
                });
                match stacked {
                    Some(existing) => existing[3] = row[1],
                    None => boxes.push([x0, x1, row[0], row[1]]),
                }
            }
        }

        let z = self.origin[2] + self.size[2] / 2.0;
        let obstacles: Vec<Obstacle> = boxes
            .into_iter()
            .map(|[x0, x1, y0, y1]| Obstacle {
                pos: [(x0 + x1) / 2.0, (y0 + y1) / 2.0, z],
                size: [x1 - x0, y1 - y0, self.size[2]],
            })
            .collect();
        debug!(count = obstacles.len(), "boundary concavities decomposed");
        obstacles
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub pos: [f64; 3],
    pub size: [f64; 3],
}

impl Obstacle {
    pub fn footprint(&self) -> Rect {
        Rect::new([self.pos[0], self.pos[1]], [self.size[0], self.size[1]])
    }

    pub fn footprint_area(&self) -> f64 {
        self.size[0] * self.size[1]
    }

    pub fn min(&self, axis: Axis) -> f64 {
        self.pos[axis.index()] - self.size[axis.index()] / 2.0
    }

    pub fn max(&self, axis: Axis) -> f64 {
        self.pos[axis.index()] + self.size[axis.index()] / 2.0
    }
}

/// Door or window: the opening itself plus the clearance zone kept free in front of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Opening {
    pub orientation: Orientation,
    pub pos: [f64; 3],
    pub size: [f64; 3],
    pub obstacle_pos: [f64; 3],
    pub obstacle_size: [f64; 3],
}

impl Opening {
    pub fn clearance(&self) -> Obstacle {
        Obstacle {
            pos: self.obstacle_pos,
            size: self.obstacle_size,
        }
    }
}

pub fn clearance_zones(doors: &[Opening], windows: &[Opening]) -> Vec<Obstacle> {
    doors
        .iter()
        .chain(windows.iter())
        .map(Opening::clearance)
        .collect()
}

/// Bounding box area minus every obstacle footprint.
pub fn usable_area(boundary: &Boundary, obstacles: &[Obstacle]) -> f64 {
    boundary.area() - obstacles.iter().map(Obstacle::footprint_area).sum::<f64>()
}

/// Tags every polygon edge with the planar direction of its outward normal.
pub fn derive_wall_orientations(points: &[[f64; 2]]) -> Result<Vec<Orientation>> {
    if points.len() < 3 {
        return Err(config_error(format!(
            "boundary polygon needs at least 3 points, got {}",
            points.len()
        )));
    }
    let signed = to_polygon(points).signed_area();
    if signed.abs() <= COORD_EPSILON {
        return Err(config_error("boundary polygon has no area"));
    }
    let counter_clockwise = signed > 0.0;
    let count = points.len();
    let mut walls = Vec::with_capacity(count);
    for index in 0..count {
        let start = points[index];
        let end = points[(index + 1) % count];
        let (dx, dy) = (end[0] - start[0], end[1] - start[1]);
        if dx.abs() <= COORD_EPSILON && dy.abs() <= COORD_EPSILON {
            return Err(config_error(format!("boundary segment {index} has zero length")));
        }
        let (nx, ny) = if counter_clockwise { (dy, -dx) } else { (-dy, dx) };
        let wall = if nx.abs() >= ny.abs() {
            if nx > 0.0 { Orientation::Right } else { Orientation::Left }
        } else if ny > 0.0 {
            Orientation::Front
        } else {
            Orientation::Back
        };
        walls.push(wall);
    }
    Ok(walls)
}

fn to_polygon(points: &[[f64; 2]]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = points.iter().map(|p| Coord { x: p[0], y: p[1] }).collect();
    Polygon::new(LineString::from(coords), Vec::new())
}

fn bounds(points: &[[f64; 2]]) -> ([f64; 2], [f64; 2]) {
    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for point in points {
        for axis in 0..2 {
            min[axis] = min[axis].min(point[axis]);
            max[axis] = max[axis].max(point[axis]);
        }
    }
    (min, max)
}

fn grid_lines(values: impl Iterator<Item = f64>, low: f64, high: f64) -> Vec<f64> {
    let mut lines: Vec<f64> = values.chain([low, high]).collect();
    lines.sort_by(f64::total_cmp);
    lines.dedup_by(|a, b| approx(*a, *b));
    lines
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= COORD_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_shape() -> Vec<[f64; 2]> {
        vec![
            [0.0, 0.0],
            [0.8, 0.0],
            [0.8, 0.3],
            [1.0, 0.3],
            [1.0, 1.0],
            [0.3, 1.0],
            [0.3, 0.6],
            [0.0, 0.6],
        ]
    }

    #[test]
    fn derives_walls_from_counter_clockwise_polygon() {
        let walls = derive_wall_orientations(&l_shape()).unwrap();
        use Orientation::*;
        assert_eq!(walls, vec![Back, Right, Back, Right, Front, Left, Front, Left]);
    }

    #[test]
    fn derives_same_walls_when_polygon_is_clockwise() {
        let mut points = vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];
        let walls = derive_wall_orientations(&points).unwrap();
        use Orientation::*;
        assert_eq!(walls, vec![Left, Front, Right, Back]);
        points.reverse();
        assert!(derive_wall_orientations(&points).is_ok());
    }

    #[test]
    fn rectangle_boundary_has_no_concavities() {
        let boundary = Boundary::rectangle([0.0; 3], [1.0, 1.0, 1.0]);
        assert!(boundary.concavity_obstacles().is_empty());
    }

    #[test]
    fn concavities_cover_missing_corners() {
        let boundary = Boundary::from_polygon(l_shape(), 0.0, 1.0).unwrap();
        let obstacles = boundary.concavity_obstacles();
        let area: f64 = obstacles.iter().map(Obstacle::footprint_area).sum();
        // Missing corners: 0.2 x 0.3 bottom right, 0.3 x 0.4 top left.
        assert!((area - 0.18).abs() < 1e-9, "area {area}");
        assert_eq!(obstacles.len(), 2);
        assert!((usable_area(&boundary, &obstacles) - 0.82).abs() < 1e-9);
    }

    #[test]
    fn overlap_checks_both_axes() {
        let a = Rect::new([0.0, 0.0], [1.0, 1.0]);
        let b = Rect::new([0.5, 5.0], [1.0, 1.0]);
        assert!(!a.overlaps(&b));
        let c = Rect::new([0.5, 0.5], [1.0, 1.0]);
        assert!(a.overlaps(&c));
    }

    #[test]
    fn rejects_mismatched_walls() {
        let err = Boundary::new(
            [0.0; 3],
            [1.0; 3],
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
            vec![Orientation::Back],
        );
        assert!(err.is_err());
    }
}
