//! Decomposition of a Cartesian move into waypoints.
//!
//! Three strategies are used, in the order of checking:
//! - **Direct**: the target is (nearly) where the tip already is, the path is the target only.
//! - **Arc**: the bearing around the base changes by more than `arc_threshold_deg`. Moving
//!   straight (or spherically) would sweep the arm through the base column, so the path
//!   rises to the safe height, goes round the base on a horizontal arc, and descends to
//!   the target.
//! - **Spherical**: everything else, spherical interpolation from start to target.

use std::f64::consts::PI;

use tracing::debug;

use crate::annotations::{AnnotatedPosition, PathFlags};
use crate::kinematic_traits::Position;
use crate::path_plan::interpolator::slerp;

/// Horizontal distance from the base axis (meters) below which the bearing is undefined.
const MIN_BEARING_RADIUS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Spherical,
    Arc,
}

#[derive(Debug, Clone)]
pub struct PathPlanner {
    /// Height (meters) of the horizontal arc detour.
    pub safe_height: f64,

    /// Moves shorter than this (meters) go directly to the target.
    pub direct_threshold: f64,

    /// Bearing change (degrees) above which the arc detour is taken.
    pub arc_threshold_deg: f64,

    /// Arc radius (meters) below which the arc detour is replaced by the spherical path.
    pub min_arc_radius: f64,

    /// Points on the arc, the arc entry excluded and the exit included.
    pub arc_points: usize,

    /// Points of each transition into and out of the arc.
    pub transition_points: usize,

    /// Points of the spherical path.
    pub spherical_points: usize,
}

impl Default for PathPlanner {
    fn default() -> Self {
        PathPlanner {
            safe_height: 0.25,
            direct_threshold: 0.01,
            arc_threshold_deg: 120.0,
            min_arc_radius: 0.01,
            arc_points: 5,
            transition_points: 3,
            spherical_points: 6,
        }
    }
}

/// Bearing change between two horizontal projections, in radians (0 to PI).
/// None if either projection is too close to the base axis.
fn bearing_change(start: &Position, target: &Position) -> Option<f64> {
    let a = start.xy();
    let b = target.xy();
    let (na, nb) = (a.norm(), b.norm());
    if na <= MIN_BEARING_RADIUS || nb <= MIN_BEARING_RADIUS {
        return None;
    }
    Some((a.dot(&b) / (na * nb)).clamp(-1.0, 1.0).acos())
}

/// Wraps the angle into (-PI, PI].
fn wrap_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

impl PathPlanner {
    /// Planner with the given safe height in meters and default settings otherwise.
    pub fn with_safe_height(safe_height: f64) -> Self {
        PathPlanner { safe_height, ..Default::default() }
    }

    pub fn strategy(&self, start: &Position, target: &Position) -> Strategy {
        if (target - start).norm() < self.direct_threshold {
            return Strategy::Direct;
        }
        match bearing_change(start, target) {
            Some(change) if change > self.arc_threshold_deg.to_radians() => {
                if self.arc_radius(start, target) < self.min_arc_radius {
                    Strategy::Spherical
                } else {
                    Strategy::Arc
                }
            }
            _ => Strategy::Spherical,
        }
    }

    /// Waypoints from `start` (not included) to `target` (always the last one).
    pub fn plan(&self, start: &Position, target: &Position) -> Vec<Position> {
        self.plan_annotated(start, target)
            .into_iter()
            .map(|step| step.position)
            .collect()
    }

    /// Same as `plan` but every waypoint is tagged with the part of the path it belongs to.
    pub fn plan_annotated(&self, start: &Position, target: &Position) -> Vec<AnnotatedPosition> {
        let strategy = self.strategy(start, target);
        debug!("Planning {:?} path from {:?} to {:?}", strategy, start.as_slice(), target.as_slice());
        let mut path = match strategy {
            Strategy::Direct => vec![AnnotatedPosition::new(*target, PathFlags::DIRECT)],
            Strategy::Spherical => slerp(start, target, self.spherical_points)
                .into_iter()
                .map(|p| AnnotatedPosition::new(p, PathFlags::SPHERICAL))
                .collect(),
            Strategy::Arc => self.arc_path(start, target),
        };
        if let Some(last) = path.last_mut() {
            last.position = *target;
            last.flags |= PathFlags::TARGET;
        }
        path
    }

    fn arc_radius(&self, start: &Position, target: &Position) -> f64 {
        start.xy().norm().min(target.xy().norm())
    }

    /// Transition up to the arc entry, the arc itself, and the transition down to the target.
    fn arc_path(&self, start: &Position, target: &Position) -> Vec<AnnotatedPosition> {
        let radius = self.arc_radius(start, target);
        let start_bearing = start.y.atan2(start.x);
        let target_bearing = target.y.atan2(target.x);
        let sweep = wrap_angle(target_bearing - start_bearing);

        let on_arc = |bearing: f64| {
            Position::new(radius * bearing.cos(), radius * bearing.sin(), self.safe_height)
        };
        let entry = on_arc(start_bearing);
        let exit = on_arc(target_bearing);

        let tagged = |points: Vec<Position>, flags: PathFlags| {
            points.into_iter().map(move |p| AnnotatedPosition::new(p, flags))
        };

        let arc: Vec<Position> = (1..=self.arc_points)
            .map(|i| on_arc(start_bearing + sweep * i as f64 / self.arc_points as f64))
            .collect();

        tagged(slerp(start, &entry, self.transition_points), PathFlags::TRANSITION_IN)
            .chain(tagged(arc, PathFlags::ARC))
            .chain(tagged(slerp(&exit, target, self.transition_points), PathFlags::TRANSITION_OUT))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(1.5 * PI) + 0.5 * PI).abs() < EPSILON);
        assert!((wrap_angle(-1.5 * PI) - 0.5 * PI).abs() < EPSILON);
        assert!((wrap_angle(-PI) - PI).abs() < EPSILON);
        assert!((wrap_angle(0.3) - 0.3).abs() < EPSILON);
    }

    #[test]
    fn test_direct_for_tiny_move() {
        let planner = PathPlanner::default();
        let start = Position::new(0.15, 0.0, 0.2);
        let target = Position::new(0.155, 0.0, 0.2);
        assert_eq!(planner.strategy(&start, &target), Strategy::Direct);
        let path = planner.plan_annotated(&start, &target);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].flags, PathFlags::DIRECT | PathFlags::TARGET);
    }

    #[test]
    fn test_spherical_for_small_bearing_change() {
        let planner = PathPlanner::default();
        let start = Position::new(0.15, 0.0, 0.2);
        let target = Position::new(0.0, 0.2, 0.1);
        assert_eq!(planner.strategy(&start, &target), Strategy::Spherical);
        let path = planner.plan(&start, &target);
        assert_eq!(path.len(), 6);
        assert!((path[5] - target).norm() < EPSILON);
    }

    #[test]
    fn test_arc_path() {
        let planner = PathPlanner::default();
        let start = Position::new(0.15, 0.02, 0.05);
        let target = Position::new(-0.2, -0.01, 0.08);
        assert_eq!(planner.strategy(&start, &target), Strategy::Arc);

        let path = planner.plan_annotated(&start, &target);
        assert_eq!(path.len(), 3 + 5 + 3);

        let radius = start.xy().norm();
        for step in path.iter().filter(|s| s.flags.contains(PathFlags::ARC)) {
            assert!((step.position.z - 0.25).abs() < EPSILON);
            assert!((step.position.xy().norm() - radius).abs() < EPSILON);
        }
        // Transition in ends at the arc entry, above the start
        let entry = path[2].position;
        assert!((entry.z - 0.25).abs() < EPSILON);
        assert!((entry.y / entry.x - start.y / start.x).abs() < EPSILON);

        assert!(path[10].flags.contains(PathFlags::TARGET | PathFlags::TRANSITION_OUT));
        assert!((path[10].position - target).norm() < EPSILON);
    }

    #[test]
    fn test_arc_takes_shorter_way_round() {
        let planner = PathPlanner::default();
        // From bearing +100 to -100 degrees, the short way passes through 180
        let at_bearing = |deg: f64| {
            Position::new(0.2 * deg.to_radians().cos(), 0.2 * deg.to_radians().sin(), 0.1)
        };
        let (start, target) = (at_bearing(100.0), at_bearing(-100.0));
        assert_eq!(planner.strategy(&start, &target), Strategy::Arc);
        let path = planner.plan_annotated(&start, &target);
        assert_eq!(path.iter().filter(|s| s.flags.contains(PathFlags::ARC)).count(), 5);
        for step in path.iter().filter(|s| s.flags.contains(PathFlags::ARC)) {
            assert!(step.position.x < 0.0, "{:?}", step);
        }
    }

    #[test]
    fn test_arc_falls_back_near_axis() {
        let planner = PathPlanner::default();
        let start = Position::new(0.005, 0.0, 0.3);
        let target = Position::new(-0.005, 0.001, 0.1);
        assert_eq!(planner.strategy(&start, &target), Strategy::Spherical);
        let path = planner.plan(&start, &target);
        assert!(!path.is_empty());
        assert!(path.iter().all(|p| p.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_point_on_axis_is_spherical() {
        let planner = PathPlanner::default();
        let start = Position::new(0.0, 0.0, 0.446);
        let target = Position::new(-0.15, 0.0, 0.1);
        assert_eq!(planner.strategy(&start, &target), Strategy::Spherical);
    }
}
