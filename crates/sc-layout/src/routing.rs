use std::collections::BTreeMap;

use sc_core::{Flowchart, NodeShape};
use serde::Serialize;

use crate::config::LayoutConfig;
use crate::cycles::BackEdges;
use crate::graph::LayoutGraph;
use crate::{LayoutPoint, LayoutRect};

const EPSILON: f32 = 0.001;
const PARALLEL_STEP: f32 = 12.0;
const SELF_LOOP_SIZE: f32 = 24.0;
/// Segments used to flatten a curved route for collision tests.
const CURVE_SEGMENTS: usize = 16;
/// Half the width of a hexagon's flat top and bottom faces, relative to its
/// half width.
const HEXAGON_FACE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Axis-aligned segment between the anchors.
    Straight,
    /// Quadratic Bezier through `control_point`.
    Curved,
    /// Horizontal and vertical segments around obstacles.
    Orthogonal,
    SelfLoop,
}

impl RouteKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Straight => "straight",
            Self::Curved => "curved",
            Self::Orthogonal => "orthogonal",
            Self::SelfLoop => "self_loop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedEdge {
    pub edge_index: usize,
    pub anchor_from: LayoutPoint,
    pub anchor_to: LayoutPoint,
    /// Bend points between the anchors; empty for straight and curved paths.
    pub waypoints: Vec<LayoutPoint>,
    pub control_point: Option<LayoutPoint>,
    pub kind: RouteKind,
    pub back_edge: bool,
    /// False when the detour search ran out of attempts and kept its best try.
    pub clear: bool,
}

impl RoutedEdge {
    /// Anchors and waypoints as one polyline.
    #[must_use]
    pub fn points(&self) -> Vec<LayoutPoint> {
        let mut points = Vec::with_capacity(self.waypoints.len() + 2);
        points.push(self.anchor_from);
        points.extend_from_slice(&self.waypoints);
        points.push(self.anchor_to);
        points
    }

    /// The drawn path as a polyline; curves are flattened.
    #[must_use]
    pub fn path_points(&self) -> Vec<LayoutPoint> {
        match self.control_point {
            Some(control) if self.kind == RouteKind::Curved => {
                quadratic_points(self.anchor_from, control, self.anchor_to)
            }
            _ => self.points(),
        }
    }
}

fn quadratic_points(from: LayoutPoint, control: LayoutPoint, to: LayoutPoint) -> Vec<LayoutPoint> {
    (0..=CURVE_SEGMENTS)
        .map(|step| {
            let t = step as f32 / CURVE_SEGMENTS as f32;
            let u = 1.0 - t;
            LayoutPoint::new(
                u * u * from.x + 2.0 * u * t * control.x + t * t * to.x,
                u * u * from.y + 2.0 * u * t * control.y + t * t * to.y,
            )
        })
        .collect()
}

/// Node boxes inflated by the obstacle padding, minus the edge's own endpoints.
struct Obstacles<'a> {
    padded: &'a [LayoutRect],
    source: usize,
    target: usize,
}

impl Obstacles<'_> {
    /// Number of obstacles any segment of `points` touches.
    fn hits(&self, points: &[LayoutPoint]) -> usize {
        self.padded
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != self.source && *index != self.target)
            .filter(|(_, rect)| {
                points
                    .windows(2)
                    .any(|segment| segment_intersects_rect(segment[0], segment[1], rect))
            })
            .count()
    }
}

/// Route every resolved edge between the placed node boxes.
pub(crate) fn route_edges(
    chart: &Flowchart,
    graph: &LayoutGraph<'_>,
    boxes: &[LayoutRect],
    back_edges: &BackEdges,
    config: &LayoutConfig,
) -> Vec<RoutedEdge> {
    let padded: Vec<LayoutRect> = boxes
        .iter()
        .map(|rect| rect.padded(config.obstacle_padding))
        .collect();

    let mut pair_count: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    for (_, source, target) in graph.edges() {
        *pair_count.entry((source.min(target), source.max(target))).or_insert(0) += 1;
    }
    let mut pair_seen: BTreeMap<(usize, usize), usize> = BTreeMap::new();

    graph
        .edges()
        .map(|(edge_index, source, target)| {
            let back_edge = back_edges.contains_edge(edge_index);
            if source == target {
                let obstacles = Obstacles {
                    padded: &padded,
                    source,
                    target,
                };
                return self_loop_edge(edge_index, boxes[source], &obstacles, back_edge);
            }

            let key = (source.min(target), source.max(target));
            let total = pair_count.get(&key).copied().unwrap_or(1);
            let seen = pair_seen.entry(key).or_insert(0);
            let mut parallel_offset = if total > 1 {
                (*seen as f32 - (total - 1) as f32 / 2.0) * PARALLEL_STEP
            } else {
                0.0
            };
            *seen += 1;
            // Offsets are measured against the lower-index to higher-index direction.
            if source > target {
                parallel_offset = -parallel_offset;
            }

            let obstacles = Obstacles {
                padded: &padded,
                source,
                target,
            };
            let mut routed = route_between(
                shape_of(chart, source),
                boxes[source],
                shape_of(chart, target),
                boxes[target],
                &obstacles,
                parallel_offset,
                config,
            );
            routed.edge_index = edge_index;
            routed.back_edge = back_edge;
            routed
        })
        .collect()
}

fn shape_of(chart: &Flowchart, node_index: usize) -> NodeShape {
    chart
        .nodes
        .get(node_index)
        .map(|node| node.shape)
        .unwrap_or_default()
}

fn route_between(
    source_shape: NodeShape,
    source_box: LayoutRect,
    target_shape: NodeShape,
    target_box: LayoutRect,
    obstacles: &Obstacles<'_>,
    parallel_offset: f32,
    config: &LayoutConfig,
) -> RoutedEdge {
    let anchor_from = shape_anchor(source_shape, source_box, target_box.center());
    let anchor_to = shape_anchor(target_shape, target_box, source_box.center());

    if obstacles.hits(&[anchor_from, anchor_to]) == 0 {
        let routed = direct_route(anchor_from, anchor_to, parallel_offset, config);
        // The chord is clear; a bulging curve may still clip a neighbor.
        if routed.kind == RouteKind::Curved && obstacles.hits(&routed.path_points()) > 0 {
            return direct_route(anchor_from, anchor_to, 0.0, &LayoutConfig {
                curve_factor: 0.0,
                ..*config
            });
        }
        return routed;
    }

    let (points, clear) = orthogonal_detour(source_box, target_box, obstacles, config);
    let last = points.len().saturating_sub(1);
    RoutedEdge {
        edge_index: 0,
        anchor_from: points.first().copied().unwrap_or(anchor_from),
        anchor_to: points.last().copied().unwrap_or(anchor_to),
        waypoints: points.get(1..last).map(<[LayoutPoint]>::to_vec).unwrap_or_default(),
        control_point: None,
        kind: RouteKind::Orthogonal,
        back_edge: false,
        clear,
    }
}

fn direct_route(
    from: LayoutPoint,
    to: LayoutPoint,
    parallel_offset: f32,
    config: &LayoutConfig,
) -> RoutedEdge {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = dx.hypot(dy);
    let diagonal = dx.abs() > EPSILON && dy.abs() > EPSILON;
    let bend = if diagonal { length * config.curve_factor } else { 0.0 } + parallel_offset;

    let (kind, control_point) = if length < EPSILON || bend.abs() < EPSILON {
        (RouteKind::Straight, None)
    } else {
        let normal = LayoutPoint::new(-dy / length, dx / length);
        let control = LayoutPoint::new(
            (from.x + to.x) / 2.0 + normal.x * bend,
            (from.y + to.y) / 2.0 + normal.y * bend,
        );
        (RouteKind::Curved, Some(control))
    };

    RoutedEdge {
        edge_index: 0,
        anchor_from: from,
        anchor_to: to,
        waypoints: Vec::new(),
        control_point,
        kind,
        back_edge: false,
        clear: true,
    }
}

/// Orthogonal path from face midpoint to face midpoint.
///
/// The primary axis is the one with the larger center delta. The mid-line
/// route is tried first, then channels stepping outward from the middle,
/// alternating sides, up to `config.detour_attempts`. The first clear path
/// wins; otherwise the attempt touching the fewest obstacles is returned.
fn orthogonal_detour(
    source_box: LayoutRect,
    target_box: LayoutRect,
    obstacles: &Obstacles<'_>,
    config: &LayoutConfig,
) -> (Vec<LayoutPoint>, bool) {
    let source_center = source_box.center();
    let target_center = target_box.center();
    let vertical_first =
        (target_center.y - source_center.y).abs() >= (target_center.x - source_center.x).abs();

    // Candidates are built with y as the primary axis and swapped back for
    // horizontal-first routing.
    let to_local = |point: LayoutPoint| {
        if vertical_first {
            point
        } else {
            LayoutPoint::new(point.y, point.x)
        }
    };
    let to_world = to_local;
    let (source_local, target_local) = (to_local(source_center), to_local(target_center));
    let (source_half, target_half) = if vertical_first {
        (source_box.height / 2.0, target_box.height / 2.0)
    } else {
        (source_box.width / 2.0, target_box.width / 2.0)
    };

    let sign = if target_local.y >= source_local.y { 1.0 } else { -1.0 };
    let start = LayoutPoint::new(source_local.x, source_local.y + sign * source_half);
    let end = LayoutPoint::new(target_local.x, target_local.y - sign * target_half);

    let evaluate = |local: [LayoutPoint; 6]| {
        let world: Vec<LayoutPoint> = local.iter().copied().map(to_world).collect();
        let world = simplify_polyline(world);
        let hits = obstacles.hits(&world);
        (world, hits)
    };

    let mid_line = (start.y + end.y) / 2.0;
    let (points, hits) = evaluate([
        start,
        LayoutPoint::new(start.x, mid_line),
        LayoutPoint::new(start.x, mid_line),
        LayoutPoint::new(end.x, mid_line),
        LayoutPoint::new(end.x, mid_line),
        end,
    ]);
    if hits == 0 {
        return (points, true);
    }
    let mut best = (points, hits);

    let leave = start.y + sign * config.stub_length;
    let arrive = end.y - sign * config.stub_length;
    let origin = (start.x + end.x) / 2.0;
    for attempt in 1..=config.detour_attempts {
        let distance = attempt.div_ceil(2) as f32 * config.detour_step;
        let channel = if attempt % 2 == 1 {
            origin + distance
        } else {
            origin - distance
        };
        let (points, hits) = evaluate([
            start,
            LayoutPoint::new(start.x, leave),
            LayoutPoint::new(channel, leave),
            LayoutPoint::new(channel, arrive),
            LayoutPoint::new(end.x, arrive),
            end,
        ]);
        if hits == 0 {
            return (points, true);
        }
        if hits < best.1 {
            best = (points, hits);
        }
    }

    (best.0, false)
}

/// Boundary point of a node facing `toward`.
fn shape_anchor(shape: NodeShape, rect: LayoutRect, toward: LayoutPoint) -> LayoutPoint {
    let center = rect.center();
    let dx = toward.x - center.x;
    let dy = toward.y - center.y;
    if dx.abs() < EPSILON && dy.abs() < EPSILON {
        return center;
    }
    let half_width = rect.width / 2.0;
    let half_height = rect.height / 2.0;

    match shape {
        NodeShape::Circle => {
            let angle = dy.atan2(dx);
            LayoutPoint::new(
                center.x + half_width * angle.cos(),
                center.y + half_height * angle.sin(),
            )
        }
        NodeShape::Hexagon => {
            // In box-normalized units the outline is |y| = 1 on the flat faces
            // and |x| + (1 - HEXAGON_FACE) * |y| = 1 on the slanted ones.
            let ux = dx / half_width.max(EPSILON);
            let uy = dy / half_height.max(EPSILON);
            let reach = uy.abs().max(ux.abs() + (1.0 - HEXAGON_FACE) * uy.abs());
            LayoutPoint::new(
                center.x + ux / reach * half_width,
                center.y + uy / reach * half_height,
            )
        }
        _ => {
            if dx.abs() / half_width.max(EPSILON) >= dy.abs() / half_height.max(EPSILON) {
                LayoutPoint::new(center.x + half_width.copysign(dx), center.y)
            } else {
                LayoutPoint::new(center.x, center.y + half_height.copysign(dy))
            }
        }
    }
}

/// Outward normals of the sides a self-loop may use, in order of preference.
const LOOP_SIDES: [(f32, f32); 4] = [(1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)];

/// Small loop leaving and re-entering one side of the node.
///
/// The right side is tried first, then the left, bottom and top; the first
/// loop that stays clear of other nodes wins. When every side is blocked the
/// loop touching the fewest obstacles is kept and marked unclear.
fn self_loop_edge(
    edge_index: usize,
    rect: LayoutRect,
    obstacles: &Obstacles<'_>,
    back_edge: bool,
) -> RoutedEdge {
    let mut best: Option<([LayoutPoint; 4], usize)> = None;
    for (nx, ny) in LOOP_SIDES {
        let points = loop_points(rect, nx, ny);
        let hits = obstacles.hits(&points);
        if best.as_ref().is_none_or(|(_, fewest)| hits < *fewest) {
            best = Some((points, hits));
        }
        if hits == 0 {
            break;
        }
    }
    let (points, hits) = best.unwrap_or_else(|| (loop_points(rect, 1.0, 0.0), 0));

    RoutedEdge {
        edge_index,
        anchor_from: points[0],
        anchor_to: points[3],
        waypoints: vec![points[1], points[2]],
        control_point: None,
        kind: RouteKind::SelfLoop,
        back_edge,
        clear: hits == 0,
    }
}

fn loop_points(rect: LayoutRect, nx: f32, ny: f32) -> [LayoutPoint; 4] {
    let center = rect.center();
    if nx.abs() > ny.abs() {
        let side = center.x + nx * rect.width / 2.0;
        let outer = side + nx * SELF_LOOP_SIZE;
        let (upper, lower) = (rect.y + rect.height * 0.3, rect.y + rect.height * 0.7);
        [
            LayoutPoint::new(side, upper),
            LayoutPoint::new(outer, upper),
            LayoutPoint::new(outer, lower),
            LayoutPoint::new(side, lower),
        ]
    } else {
        let side = center.y + ny * rect.height / 2.0;
        let outer = side + ny * SELF_LOOP_SIZE;
        let (left, right) = (rect.x + rect.width * 0.3, rect.x + rect.width * 0.7);
        [
            LayoutPoint::new(left, side),
            LayoutPoint::new(left, outer),
            LayoutPoint::new(right, outer),
            LayoutPoint::new(right, side),
        ]
    }
}

fn simplify_polyline(points: Vec<LayoutPoint>) -> Vec<LayoutPoint> {
    if points.len() <= 2 {
        return points;
    }

    let mut simplified = Vec::with_capacity(points.len());
    for point in points {
        if simplified.last() == Some(&point) {
            continue;
        }
        simplified.push(point);

        while simplified.len() >= 3 {
            let c = simplified[simplified.len() - 1];
            let b = simplified[simplified.len() - 2];
            let a = simplified[simplified.len() - 3];
            if is_axis_aligned_collinear(a, b, c) {
                simplified.remove(simplified.len() - 2);
            } else {
                break;
            }
        }
    }

    simplified
}

fn is_axis_aligned_collinear(a: LayoutPoint, b: LayoutPoint, c: LayoutPoint) -> bool {
    ((a.x - b.x).abs() < EPSILON && (b.x - c.x).abs() < EPSILON)
        || ((a.y - b.y).abs() < EPSILON && (b.y - c.y).abs() < EPSILON)
}

/// Segment against the rectangle's area: endpoints inside, or any crossing
/// with one of its four sides.
pub(crate) fn segment_intersects_rect(a: LayoutPoint, b: LayoutPoint, rect: &LayoutRect) -> bool {
    let (right, bottom) = (rect.x + rect.width, rect.y + rect.height);
    if a.x.max(b.x) < rect.x
        || a.x.min(b.x) > right
        || a.y.max(b.y) < rect.y
        || a.y.min(b.y) > bottom
    {
        return false;
    }
    if rect.contains(a) || rect.contains(b) {
        return true;
    }

    let corners = [
        LayoutPoint::new(rect.x, rect.y),
        LayoutPoint::new(right, rect.y),
        LayoutPoint::new(right, bottom),
        LayoutPoint::new(rect.x, bottom),
    ];
    (0..4).any(|side| segments_intersect(a, b, corners[side], corners[(side + 1) % 4]))
}

fn segments_intersect(a: LayoutPoint, b: LayoutPoint, c: LayoutPoint, d: LayoutPoint) -> bool {
    fn orient(a: LayoutPoint, b: LayoutPoint, c: LayoutPoint) -> f32 {
        (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
    }
    fn on_segment(a: LayoutPoint, b: LayoutPoint, c: LayoutPoint) -> bool {
        c.x >= a.x.min(b.x) - 1e-6
            && c.x <= a.x.max(b.x) + 1e-6
            && c.y >= a.y.min(b.y) - 1e-6
            && c.y <= a.y.max(b.y) + 1e-6
    }

    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if (o1 > 0.0 && o2 < 0.0 || o1 < 0.0 && o2 > 0.0)
        && (o3 > 0.0 && o4 < 0.0 || o3 < 0.0 && o4 > 0.0)
    {
        return true;
    }
    (o1.abs() <= 1e-6 && on_segment(a, b, c))
        || (o2.abs() <= 1e-6 && on_segment(a, b, d))
        || (o3.abs() <= 1e-6 && on_segment(c, d, a))
        || (o4.abs() <= 1e-6 && on_segment(c, d, b))
}
