//! Lowering of a scene graph into the MIQP [`Model`].
//!
//! Variables are named after the vertex id (`x_3`, `l_3`, ...) so results can
//! be read back by name. Every constraint gets a unique name, which is what an
//! infeasibility report lists.

pub mod reachability;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use reachability::{Reachability, has_path, has_path_of};

use crate::error::Result;
use crate::geometry::{Boundary, Obstacle, Opening, SIDE_EPSILON, clearance_zones, usable_area};
use crate::ir::{Axis, Edge, EdgeType, Orientation, SceneGraph, Vertex};
use crate::model::{LinExpr, Model, ObjectiveSense, QuadExpr, Sense, VarId, eq, geq, leq};

/// Objective weights: unused area, size deviation, position deviation, gap deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    pub area: f64,
    pub size: f64,
    pub position: f64,
    pub adjacency: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            area: 0.0,
            size: 1.0,
            position: 1.0,
            adjacency: 1.0,
        }
    }
}

impl From<[f64; 4]> for Hyperparameters {
    fn from(weights: [f64; 4]) -> Self {
        Self {
            area: weights[0],
            size: weights[1],
            position: weights[2],
            adjacency: weights[3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompileOptions {
    pub weights: Hyperparameters,
    /// 2D room placement: no vertical variables.
    pub floorplan: bool,
}

/// Decision variables of one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexVars {
    pub x: VarId,
    pub y: VarId,
    pub l: VarId,
    pub w: VarId,
    pub z: Option<VarId>,
    pub h: Option<VarId>,
}

impl VertexVars {
    pub fn center(&self, axis: Axis) -> Option<VarId> {
        match axis {
            Axis::X => Some(self.x),
            Axis::Y => Some(self.y),
            Axis::Z => self.z,
        }
    }

    pub fn extent(&self, axis: Axis) -> Option<VarId> {
        match axis {
            Axis::X => Some(self.l),
            Axis::Y => Some(self.w),
            Axis::Z => self.h,
        }
    }

    pub fn low(&self, axis: Axis) -> Option<LinExpr> {
        Some(self.center(axis)? - self.extent(axis)? * 0.5)
    }

    pub fn high(&self, axis: Axis) -> Option<LinExpr> {
        Some(self.center(axis)? + self.extent(axis)? * 0.5)
    }

    fn face(&self, axis: Axis, high: bool) -> Option<LinExpr> {
        if high { self.high(axis) } else { self.low(axis) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompiledModel {
    pub vertices: Vec<VertexVars>,
    /// Pairs that received separation indicators.
    pub separated_pairs: usize,
    /// Pairs exempted because a directed path already orders them.
    pub ordered_pairs: usize,
    pub obstacle_indicators: usize,
    pub usable_area: f64,
}

/// Axis of a directional relation and whether its source sits on the high side.
fn ordering(kind: EdgeType) -> Option<(Axis, bool)> {
    match kind {
        EdgeType::LeftOf => Some((Axis::X, false)),
        EdgeType::RightOf => Some((Axis::X, true)),
        EdgeType::FrontOf => Some((Axis::Y, true)),
        EdgeType::Behind => Some((Axis::Y, false)),
        EdgeType::Above => Some((Axis::Z, true)),
        EdgeType::Under => Some((Axis::Z, false)),
        EdgeType::CloseBy | EdgeType::AlignWith => None,
    }
}

fn axis_tag(axis: Axis) -> &'static str {
    match axis {
        Axis::X => "x",
        Axis::Y => "y",
        Axis::Z => "z",
    }
}

fn relation_tag(kind: EdgeType) -> String {
    kind.as_str().to_ascii_lowercase()
}

/// Fills `model` with variables, constraints and the objective for `graph`.
/// Does not solve.
pub fn compile(
    model: &mut Model,
    graph: &SceneGraph,
    boundary: &Boundary,
    obstacles: &[Obstacle],
    doors: &[Opening],
    windows: &[Opening],
    options: &CompileOptions,
) -> Result<CompiledModel> {
    graph.validate(boundary)?;
    let floorplan = options.floorplan;
    let axes: &[Axis] = if floorplan { &Axis::PLANAR } else { &Axis::ALL };

    let mut obstacles = obstacles.to_vec();
    obstacles.extend(clearance_zones(doors, windows));

    let mut compiled = CompiledModel {
        vertices: graph
            .vertices
            .iter()
            .map(|vertex| add_vertex_vars(model, boundary, vertex.id, floorplan))
            .collect(),
        usable_area: usable_area(boundary, &obstacles),
        ..CompiledModel::default()
    };

    for (vertex, vars) in graph.vertices.iter().zip(&compiled.vertices) {
        add_vertex_constraints(model, boundary, vertex, vars, axes, floorplan);
    }

    for (index, edge) in graph.edges.iter().enumerate() {
        add_edge_constraints(model, &compiled.vertices, index, edge, floorplan);
    }

    // Vertical relations emit nothing in a floor plan, so they order nothing.
    let kinds: Vec<EdgeType> = EdgeType::DIRECTIONAL
        .into_iter()
        .filter(|kind| !floorplan || kind.axis() != Some(Axis::Z))
        .collect();
    let reachability = Reachability::for_kinds(graph, &kinds);
    let big_m = boundary.big_m();
    for i in 0..graph.len() {
        for j in (i + 1)..graph.len() {
            if reachability.ordered(i, j) {
                compiled.ordered_pairs += 1;
                continue;
            }
            add_separation(model, &compiled.vertices, i, j, axes, big_m);
            compiled.separated_pairs += 1;
        }
    }

    for (i, vars) in compiled.vertices.iter().enumerate() {
        for (q, obstacle) in obstacles.iter().enumerate() {
            compiled.obstacle_indicators +=
                add_obstacle_avoidance(model, boundary, vars, i, q, obstacle, axes, big_m);
        }
    }

    for (vertex, vars) in graph.vertices.iter().zip(&compiled.vertices) {
        add_wall_attachment(model, boundary, vertex, vars);
    }

    if floorplan {
        let mut occupied = QuadExpr::new();
        for vars in &compiled.vertices {
            occupied.add_product(vars.l, vars.w, 1.0);
        }
        model.add_quadratic_constraint("floorplan_area", occupied, Sense::Eq, compiled.usable_area);
    }

    let objective = build_objective(graph, boundary, &compiled.vertices, &options.weights, floorplan);
    model.set_objective(objective, ObjectiveSense::Minimize);

    let stats = model.stats();
    info!(
        variables = stats.variables,
        binaries = stats.binaries,
        constraints = stats.linear_constraints + stats.quadratic_constraints,
        separated_pairs = compiled.separated_pairs,
        ordered_pairs = compiled.ordered_pairs,
        "model compiled"
    );
    Ok(compiled)
}

fn add_vertex_vars(model: &mut Model, boundary: &Boundary, id: usize, floorplan: bool) -> VertexVars {
    let [ox, oy, oz] = boundary.origin;
    let [sx, sy, sz] = boundary.size;
    VertexVars {
        x: model.add_continuous_var(ox, ox + sx, format!("x_{id}")),
        y: model.add_continuous_var(oy, oy + sy, format!("y_{id}")),
        l: model.add_continuous_var(0.0, sx, format!("l_{id}")),
        w: model.add_continuous_var(0.0, sy, format!("w_{id}")),
        z: (!floorplan).then(|| model.add_continuous_var(oz, oz + sz, format!("z_{id}"))),
        h: (!floorplan).then(|| model.add_continuous_var(0.0, sz, format!("h_{id}"))),
    }
}

fn add_vertex_constraints(
    model: &mut Model,
    boundary: &Boundary,
    vertex: &Vertex,
    vars: &VertexVars,
    axes: &[Axis],
    floorplan: bool,
) {
    let id = vertex.id;
    for &axis in axes {
        let tag = axis_tag(axis);
        let (Some(center), Some(extent), Some(low), Some(high)) = (
            vars.center(axis),
            vars.extent(axis),
            vars.low(axis),
            vars.high(axis),
        ) else {
            continue;
        };
        model.add_linear_constraint(format!("inside_{tag}_min_{id}"), geq(low, boundary.min(axis)));
        model.add_linear_constraint(format!("inside_{tag}_max_{id}"), leq(high, boundary.max(axis)));

        if let Some(band) = vertex.position {
            model.add_linear_constraint(format!("pos_{tag}_min_{id}"), geq(center, band.lower(axis)));
            model.add_linear_constraint(format!("pos_{tag}_max_{id}"), leq(center, band.upper(axis)));
        }
        if let Some(band) = vertex.size {
            model.add_linear_constraint(format!("size_{tag}_min_{id}"), geq(extent, band.lower(axis)));
            model.add_linear_constraint(format!("size_{tag}_max_{id}"), leq(extent, band.upper(axis)));
        }
    }

    if vertex.on_floor && !floorplan {
        if let Some(bottom) = vars.low(Axis::Z) {
            model.add_linear_constraint(format!("on_floor_{id}"), eq(bottom, boundary.min(Axis::Z)));
        }
    }
}

fn add_edge_constraints(
    model: &mut Model,
    vertices: &[VertexVars],
    index: usize,
    edge: &Edge,
    floorplan: bool,
) {
    let (s, t) = (&vertices[edge.source], &vertices[edge.target]);
    let name = format!("edge{index}_{}", relation_tag(edge.kind));

    if let Some((axis, source_high)) = ordering(edge.kind) {
        if floorplan && axis == Axis::Z {
            debug!(edge = index, kind = edge.kind.as_str(), "vertical relation ignored in floor-plan mode");
            return;
        }
        let Some(gap) = directional_gap(s, t, axis, source_high) else {
            return;
        };
        match edge.distance {
            Some(distance) => model.add_linear_constraint(format!("{name}_gap"), eq(gap, distance)),
            None => model.add_linear_constraint(format!("{name}_order"), geq(gap, 0.0)),
        }

        if axis == Axis::Z {
            // The stacked vertex must project inside its support.
            let (top, support) = if source_high { (s, t) } else { (t, s) };
            for planar in Axis::PLANAR {
                let tag = axis_tag(planar);
                if let (Some(a), Some(b)) = (top.low(planar), support.low(planar)) {
                    model.add_linear_constraint(format!("{name}_support_{tag}_min"), geq(a, b));
                }
                if let (Some(a), Some(b)) = (top.high(planar), support.high(planar)) {
                    model.add_linear_constraint(format!("{name}_support_{tag}_max"), leq(a, b));
                }
            }
        } else if edge.distance.is_some() {
            let (across, tolerance) = match axis {
                Axis::X => (Axis::Y, edge.tolerance_or_zero()[1]),
                _ => (Axis::X, edge.tolerance_or_zero()[0]),
            };
            add_overlap_band(model, s, t, across, tolerance, &name);
        }
        return;
    }

    match edge.kind {
        EdgeType::CloseBy => {
            let [tol_x, tol_y] = edge.tolerance_or_zero();
            let (Some(s_lx), Some(s_hx), Some(t_lx), Some(t_hx)) =
                (s.low(Axis::X), s.high(Axis::X), t.low(Axis::X), t.high(Axis::X))
            else {
                return;
            };
            let (Some(s_ly), Some(s_hy), Some(t_ly), Some(t_hy)) =
                (s.low(Axis::Y), s.high(Axis::Y), t.low(Axis::Y), t.high(Axis::Y))
            else {
                return;
            };
            let pick = model.add_binary_var(format!("closeby_{index}"));
            // pick = 1: shared span along x, pick = 0: shared span along y.
            model.add_linear_constraint(format!("{name}_x_low"), leq(s_lx, t_hx - pick * tol_x));
            model.add_linear_constraint(format!("{name}_x_high"), geq(s_hx, t_lx + pick * tol_x));
            model.add_linear_constraint(
                format!("{name}_y_low"),
                leq(s_ly, t_hy - tol_y + pick * tol_y),
            );
            model.add_linear_constraint(
                format!("{name}_y_high"),
                geq(s_hy, t_ly + tol_y - pick * tol_y),
            );
        }
        EdgeType::AlignWith => {
            let Some(align) = edge.align_edge else {
                return;
            };
            let (axis, high) = align.face();
            if floorplan && axis == Axis::Z {
                debug!(edge = index, "vertical alignment ignored in floor-plan mode");
                return;
            }
            if let (Some(a), Some(b)) = (s.face(axis, high), t.face(axis, high)) {
                model.add_linear_constraint(format!("{name}_{}", align.as_str()), eq(a, b));
            }
        }
        _ => {}
    }
}

/// Free space between the two faces a directional relation orders.
fn directional_gap(s: &VertexVars, t: &VertexVars, axis: Axis, source_high: bool) -> Option<LinExpr> {
    if source_high {
        Some(s.low(axis)? - t.high(axis)?)
    } else {
        Some(t.low(axis)? - s.high(axis)?)
    }
}

/// Projections on `axis` share at least `tolerance`.
fn add_overlap_band(
    model: &mut Model,
    s: &VertexVars,
    t: &VertexVars,
    axis: Axis,
    tolerance: f64,
    name: &str,
) {
    let tag = axis_tag(axis);
    if let (Some(s_high), Some(t_low)) = (s.high(axis), t.low(axis)) {
        model.add_linear_constraint(format!("{name}_overlap_{tag}_low"), geq(s_high, t_low + tolerance));
    }
    if let (Some(s_low), Some(t_high)) = (s.low(axis), t.high(axis)) {
        model.add_linear_constraint(format!("{name}_overlap_{tag}_high"), leq(s_low, t_high - tolerance));
    }
}

const SEPARATIONS: [(Axis, bool, &str); 6] = [
    (Axis::X, true, "R"),
    (Axis::X, false, "L"),
    (Axis::Y, true, "F"),
    (Axis::Y, false, "B"),
    (Axis::Z, true, "U"),
    (Axis::Z, false, "D"),
];

/// `i` lies entirely on one side of `j` along at least one axis.
fn add_separation(
    model: &mut Model,
    vertices: &[VertexVars],
    i: usize,
    j: usize,
    axes: &[Axis],
    big_m: f64,
) {
    let (a, b) = (&vertices[i], &vertices[j]);
    let mut any = LinExpr::new();
    for (axis, high_side, tag) in SEPARATIONS {
        if !axes.contains(&axis) {
            continue;
        }
        let sigma = model.add_binary_var(format!("sigma_{tag}_{i}_{j}"));
        let relaxation = LinExpr::constant(big_m) - sigma * big_m;
        let comparison = if high_side {
            a.low(axis)
                .zip(b.high(axis))
                .map(|(a_low, b_high)| geq(a_low, b_high - relaxation))
        } else {
            a.high(axis)
                .zip(b.low(axis))
                .map(|(a_high, b_low)| leq(a_high, b_low + relaxation))
        };
        if let Some(comparison) = comparison {
            model.add_linear_constraint(format!("separate_{tag}_{i}_{j}"), comparison);
            any = any + sigma;
        }
    }
    model.add_linear_constraint(format!("separate_{i}_{j}"), geq(any, 1.0));
}

/// Side indicators for one vertex and one obstacle. Sides where the obstacle
/// touches the boundary box get none. Returns the number of indicators added.
#[allow(clippy::too_many_arguments)]
fn add_obstacle_avoidance(
    model: &mut Model,
    boundary: &Boundary,
    vars: &VertexVars,
    i: usize,
    q: usize,
    obstacle: &Obstacle,
    axes: &[Axis],
    big_m: f64,
) -> usize {
    let mut any = LinExpr::new();
    let mut count = 0;
    for (axis, high_side, tag) in SEPARATIONS {
        if !axes.contains(&axis) {
            continue;
        }
        let free = if high_side {
            boundary.max(axis) - obstacle.max(axis)
        } else {
            obstacle.min(axis) - boundary.min(axis)
        };
        if free <= SIDE_EPSILON {
            continue;
        }
        let sigma = model.add_binary_var(format!("avoid_{tag}_{i}_{q}"));
        let relaxation = LinExpr::constant(big_m) - sigma * big_m;
        let comparison = if high_side {
            vars.low(axis)
                .map(|low| geq(low, LinExpr::constant(obstacle.max(axis)) - relaxation))
        } else {
            vars.high(axis)
                .map(|high| leq(high, relaxation + obstacle.min(axis)))
        };
        if let Some(comparison) = comparison {
            model.add_linear_constraint(format!("avoid_{tag}_{i}_{q}"), comparison);
            any = any + sigma;
            count += 1;
        }
    }
    if count == 0 {
        warn!(vertex = i, obstacle = q, "obstacle fills the boundary box, no side to avoid it on");
        return 0;
    }
    model.add_linear_constraint(format!("avoid_{i}_{q}"), geq(any, 1.0));
    count
}

/// Puts the face of a pinned vertex on its wall line, centre within the wall span.
fn add_wall_attachment(model: &mut Model, boundary: &Boundary, vertex: &Vertex, vars: &VertexVars) {
    let Some(wall) = vertex.boundary.and_then(|pin| boundary.wall(pin)) else {
        return;
    };
    let id = vertex.id;
    let (face, along, line, span) = match wall.orientation {
        Orientation::Left => (vars.low(Axis::X), Axis::Y, wall.min(0), (wall.min(1), wall.max(1))),
        Orientation::Right => (vars.high(Axis::X), Axis::Y, wall.min(0), (wall.min(1), wall.max(1))),
        Orientation::Front => (vars.high(Axis::Y), Axis::X, wall.min(1), (wall.min(0), wall.max(0))),
        Orientation::Back => (vars.low(Axis::Y), Axis::X, wall.min(1), (wall.min(0), wall.max(0))),
        Orientation::Up | Orientation::Down => return,
    };
    let (Some(face), Some(center)) = (face, vars.center(along)) else {
        return;
    };
    model.add_linear_constraint(format!("wall_{id}"), eq(face, line));
    model.add_linear_constraint(format!("wall_span_min_{id}"), geq(center, span.0));
    model.add_linear_constraint(format!("wall_span_max_{id}"), leq(center, span.1));
}

fn build_objective(
    graph: &SceneGraph,
    boundary: &Boundary,
    vertices: &[VertexVars],
    weights: &Hyperparameters,
    floorplan: bool,
) -> QuadExpr {
    let mut objective = QuadExpr::new();

    if weights.area != 0.0 {
        objective.add_linear(boundary.area(), weights.area);
        for vars in vertices {
            objective.add_product(vars.l, vars.w, -weights.area);
        }
    }

    let axes: &[Axis] = if floorplan { &Axis::PLANAR } else { &Axis::ALL };
    for (vertex, vars) in graph.vertices.iter().zip(vertices) {
        for &axis in axes {
            if weights.size != 0.0 {
                if let (Some(band), Some(extent)) = (vertex.size, vars.extent(axis)) {
                    objective.add_square(extent - band.target[axis.index()], weights.size);
                }
            }
            if weights.position != 0.0 {
                if let (Some(band), Some(center)) = (vertex.position, vars.center(axis)) {
                    objective.add_square(center - band.target[axis.index()], weights.position);
                }
            }
        }
    }

    if weights.adjacency != 0.0 {
        for edge in &graph.edges {
            let (Some(distance), Some((axis, source_high))) = (edge.distance, ordering(edge.kind)) else {
                continue;
            };
            if let Some(gap) =
                directional_gap(&vertices[edge.source], &vertices[edge.target], axis, source_high)
            {
                objective.add_square(gap - distance, weights.adjacency);
            }
        }
    }
    objective
}
