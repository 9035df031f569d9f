use tracing::debug;

use crate::error::{Result, config_error};
use crate::geometry::{Boundary, Obstacle, Rect};
use crate::ir::{Orientation, SceneGraph};

/// Drops target positions of wall-pinned vertices that cannot be met.
///
/// The candidate rectangle is the target position with the position
/// tolerance as extents. It must touch the strip in front of the pinned wall,
/// sit inside the boundary box and stay clear of every obstacle. Target sizes
/// are never changed. Returns how many vertices lost their position target.
pub fn relax(graph: &mut SceneGraph, boundary: &Boundary, obstacles: &[Obstacle]) -> Result<usize> {
    let footprint = boundary.footprint();
    let mut relaxed = 0;
    for vertex in &mut graph.vertices {
        let Some(pin) = vertex.boundary else {
            continue;
        };
        let (Some(position), Some(size)) = (vertex.position, vertex.size) else {
            continue;
        };
        let wall = boundary.wall(pin).ok_or_else(|| {
            config_error(format!(
                "vertex '{}' is pinned to missing wall {pin}",
                vertex.label
            ))
        })?;

        let candidate = Rect::new(
            [position.target[0], position.target[1]],
            [position.tolerance[0], position.tolerance[1]],
        );
        let (x1, x2) = (wall.min(0), wall.max(0));
        let (y1, y2) = (wall.min(1), wall.max(1));
        let (length, width) = (size.target[0], size.target[1]);
        let strip = match wall.orientation {
            Orientation::Front => Some(Rect::new(
                [(x1 + x2) / 2.0, y1 - width / 2.0],
                [x2 - x1, position.tolerance[1] / 2.0],
            )),
            Orientation::Back => Some(Rect::new(
                [(x1 + x2) / 2.0, y1 + width / 2.0],
                [x2 - x1, position.tolerance[1] / 2.0],
            )),
            Orientation::Left => Some(Rect::new(
                [x1 + length / 2.0, (y1 + y2) / 2.0],
                [size.tolerance[0] / 2.0, y2 - y1],
            )),
            Orientation::Right => Some(Rect::new(
                [x1 - length / 2.0, (y1 + y2) / 2.0],
                [size.tolerance[0] / 2.0, y2 - y1],
            )),
            Orientation::Up | Orientation::Down => None,
        };

        let reason = if strip.is_some_and(|strip| !candidate.overlaps(&strip)) {
            Some("misses the pinned wall")
        } else if !footprint.contains(&candidate) {
            Some("leaves the boundary box")
        } else if obstacles
            .iter()
            .any(|obstacle| candidate.overlaps(&obstacle.footprint()))
        {
            Some("overlaps an obstacle")
        } else {
            None
        };

        if let Some(reason) = reason {
            debug!(vertex = %vertex.label, wall = pin, reason, "dropping target position");
            vertex.position = None;
            relaxed += 1;
        }
    }
    Ok(relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Band;

    fn pinned(graph: &mut SceneGraph, wall: usize, pos: [f64; 3], tol: [f64; 3]) -> usize {
        let id = graph.add_vertex("wardrobe");
        let vertex = graph.vertex_mut(id);
        vertex.boundary = Some(wall);
        vertex.position = Some(Band::new(pos, tol));
        vertex.size = Some(Band::new([0.2, 0.1, 0.5], [0.05, 0.05, 0.0]));
        id
    }

    #[test]
    fn drops_target_far_from_pinned_wall() {
        let boundary = Boundary::rectangle([0.0; 3], [1.0, 1.0, 1.0]);
        let mut graph = SceneGraph::new();
        // Wall 3 is the LEFT wall at x = 0; the target sits against the right side.
        let id = pinned(&mut graph, 3, [0.8, 0.5, 0.25], [0.05, 0.05, 0.0]);
        let relaxed = relax(&mut graph, &boundary, &[]).unwrap();
        assert_eq!(relaxed, 1);
        assert!(graph.vertex(id).position.is_none());
        assert!(graph.vertex(id).size.is_some());
    }

    #[test]
    fn keeps_target_against_pinned_wall() {
        let boundary = Boundary::rectangle([0.0; 3], [1.0, 1.0, 1.0]);
        let mut graph = SceneGraph::new();
        let id = pinned(&mut graph, 3, [0.1, 0.5, 0.25], [0.05, 0.05, 0.0]);
        relax(&mut graph, &boundary, &[]).unwrap();
        assert!(graph.vertex(id).position.is_some());
    }

    #[test]
    fn drops_target_inside_obstacle() {
        let boundary = Boundary::rectangle([0.0; 3], [1.0, 1.0, 1.0]);
        let obstacle = Obstacle {
            pos: [0.1, 0.5, 0.5],
            size: [0.2, 0.2, 1.0],
        };
        let mut graph = SceneGraph::new();
        let id = pinned(&mut graph, 3, [0.1, 0.5, 0.25], [0.05, 0.05, 0.0]);
        relax(&mut graph, &boundary, &[obstacle]).unwrap();
        assert!(graph.vertex(id).position.is_none());
    }

    #[test]
    fn unpinned_vertices_are_left_alone() {
        let boundary = Boundary::rectangle([0.0; 3], [1.0, 1.0, 1.0]);
        let mut graph = SceneGraph::new();
        let id = graph.add_vertex("rug");
        graph.vertex_mut(id).position = Some(Band::new([5.0, 5.0, 0.0], [0.0; 3]));
        graph.vertex_mut(id).size = Some(Band::new([0.2, 0.2, 0.0], [0.0; 3]));
        assert_eq!(relax(&mut graph, &boundary, &[]).unwrap(), 0);
        assert!(graph.vertex(id).position.is_some());
    }
}
