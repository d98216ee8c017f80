//! Pickup and place points of the automated task, in millimeters.

use std::fmt::Write;

use crate::error::ArmError;
use crate::parameters::Workspace;
use crate::utils::{is_valid, mm_to_position};

/// Point in millimeters, as entered by the operator and stored in task files.
pub type PointMm = [f64; 3];

/// Pickup and place points. Pickup `i` belongs to place `i`; the lists may differ in
/// length while being edited, but must match when the task starts.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPoints {
    pickup: Vec<PointMm>,
    place: Vec<PointMm>,
    workspace: Workspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    Pickup,
    Place,
}

impl TaskPoints {
    pub fn new(workspace: Workspace) -> Self {
        TaskPoints { pickup: Vec::new(), place: Vec::new(), workspace }
    }

    fn list(&self, kind: PointKind) -> &Vec<PointMm> {
        match kind {
            PointKind::Pickup => &self.pickup,
            PointKind::Place => &self.place,
        }
    }

    fn list_mut(&mut self, kind: PointKind) -> &mut Vec<PointMm> {
        match kind {
            PointKind::Pickup => &mut self.pickup,
            PointKind::Place => &mut self.place,
        }
    }

    /// Rejects points with non-finite coordinates or outside the workspace.
    pub fn check(&self, point: &PointMm) -> Result<(), ArmError> {
        if !is_valid(point) {
            return Err(ArmError::Validation(format!("point {:?} is not a number", point)));
        }
        let p = mm_to_position(point);
        if !self.workspace.contains(&[p.x, p.y, p.z]) {
            return Err(ArmError::Validation(format!(
                "point [{:.1}, {:.1}, {:.1}] mm is outside the workspace",
                point[0], point[1], point[2]
            )));
        }
        Ok(())
    }

    pub fn add(&mut self, kind: PointKind, point: PointMm) -> Result<usize, ArmError> {
        self.check(&point)?;
        let list = self.list_mut(kind);
        list.push(point);
        Ok(list.len() - 1)
    }

    pub fn update(&mut self, kind: PointKind, index: usize, point: PointMm) -> Result<(), ArmError> {
        self.check(&point)?;
        let list = self.list_mut(kind);
        let len = list.len();
        let slot = list.get_mut(index).ok_or(ArmError::NotFound { index, len })?;
        *slot = point;
        Ok(())
    }

    pub fn remove(&mut self, kind: PointKind, index: usize) -> Result<PointMm, ArmError> {
        let list = self.list_mut(kind);
        if index >= list.len() {
            return Err(ArmError::NotFound { index, len: list.len() });
        }
        Ok(list.remove(index))
    }

    pub fn get(&self, kind: PointKind, index: usize) -> Result<PointMm, ArmError> {
        let list = self.list(kind);
        list.get(index).copied().ok_or(ArmError::NotFound { index, len: list.len() })
    }

    pub fn add_pickup(&mut self, point: PointMm) -> Result<usize, ArmError> {
        self.add(PointKind::Pickup, point)
    }

    pub fn add_place(&mut self, point: PointMm) -> Result<usize, ArmError> {
        self.add(PointKind::Place, point)
    }

    pub fn pickup_points(&self) -> &[PointMm] {
        &self.pickup
    }

    pub fn place_points(&self) -> &[PointMm] {
        &self.place
    }

    pub fn clear(&mut self) {
        self.pickup.clear();
        self.place.clear();
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Pickup and place pairs, ready to be executed. Fails unless both lists are
    /// non-empty and of equal length.
    pub fn pairs(&self) -> Result<Vec<(PointMm, PointMm)>, ArmError> {
        if self.pickup.is_empty() || self.place.is_empty() {
            return Err(ArmError::Validation(
                "at least one pickup and one place point are required".into(),
            ));
        }
        if self.pickup.len() != self.place.len() {
            return Err(ArmError::Validation(format!(
                "{} pickup points but {} place points, the counts must match",
                self.pickup.len(),
                self.place.len()
            )));
        }
        Ok(self.pickup.iter().copied().zip(self.place.iter().copied()).collect())
    }

    /// Human readable summary: every pair with its travel distance, and the coordinate
    /// ranges of all points.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Pickup points: {}, place points: {}", self.pickup.len(), self.place.len());

        for (i, (pickup, place)) in self.pickup.iter().zip(self.place.iter()).enumerate() {
            let distance = (mm_to_position(place) - mm_to_position(pickup)).norm() * 1000.0;
            let _ = writeln!(
                out,
                "Task {}: [{:.1}, {:.1}, {:.1}] -> [{:.1}, {:.1}, {:.1}], {:.1} mm",
                i + 1, pickup[0], pickup[1], pickup[2], place[0], place[1], place[2], distance
            );
        }

        let all: Vec<&PointMm> = self.pickup.iter().chain(self.place.iter()).collect();
        if !all.is_empty() {
            for (axis, name) in ["x", "y", "z"].iter().enumerate() {
                let (lo, hi) = all.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                    (lo.min(p[axis]), hi.max(p[axis]))
                });
                let _ = writeln!(out, "{} range: {:.1} .. {:.1} mm", name, lo, hi);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ArmParameters;

    fn points() -> TaskPoints {
        TaskPoints::new(ArmParameters::wearm().workspace)
    }

    #[test]
    fn test_crud() {
        let mut tp = points();
        assert_eq!(tp.add_pickup([150.0, 0.0, 50.0]).unwrap(), 0);
        assert_eq!(tp.add_pickup([100.0, 50.0, 50.0]).unwrap(), 1);
        tp.update(PointKind::Pickup, 1, [120.0, 50.0, 40.0]).unwrap();
        assert_eq!(tp.get(PointKind::Pickup, 1).unwrap(), [120.0, 50.0, 40.0]);
        assert_eq!(tp.remove(PointKind::Pickup, 0).unwrap(), [150.0, 0.0, 50.0]);
        assert_eq!(tp.pickup_points().len(), 1);
        tp.clear();
        assert!(tp.pickup_points().is_empty());
    }

    #[test]
    fn test_out_of_range_index() {
        let mut tp = points();
        tp.add_place([150.0, 0.0, 50.0]).unwrap();
        assert!(matches!(tp.remove(PointKind::Place, 1), Err(ArmError::NotFound { index: 1, len: 1 })));
        assert!(matches!(tp.update(PointKind::Pickup, 0, [0.0, 0.0, 0.0]),
                         Err(ArmError::NotFound { index: 0, len: 0 })));
        assert!(tp.get(PointKind::Place, 5).is_err());
    }

    #[test]
    fn test_workspace_check() {
        let mut tp = points();
        assert!(matches!(tp.add_pickup([700.0, 0.0, 50.0]), Err(ArmError::Validation(_))));
        assert!(matches!(tp.add_pickup([100.0, 0.0, -5.0]), Err(ArmError::Validation(_))));
        assert!(matches!(tp.add_pickup([f64::NAN, 0.0, 5.0]), Err(ArmError::Validation(_))));
        assert!(tp.pickup_points().is_empty());
    }

    #[test]
    fn test_pairs_preconditions() {
        let mut tp = points();
        assert!(tp.pairs().is_err());
        tp.add_pickup([150.0, 0.0, 50.0]).unwrap();
        assert!(tp.pairs().is_err());
        tp.add_place([0.0, 150.0, 50.0]).unwrap();
        tp.add_place([0.0, -150.0, 50.0]).unwrap();
        let err = tp.pairs().unwrap_err();
        assert!(err.to_string().contains("1 pickup points but 2 place points"));
        tp.remove(PointKind::Place, 1).unwrap();
        assert_eq!(tp.pairs().unwrap(), vec![([150.0, 0.0, 50.0], [0.0, 150.0, 50.0])]);
    }

    #[test]
    fn test_report() {
        let mut tp = points();
        tp.add_pickup([100.0, 0.0, 50.0]).unwrap();
        tp.add_place([100.0, 0.0, 150.0]).unwrap();
        let report = tp.report();
        assert!(report.contains("Task 1:"), "{}", report);
        assert!(report.contains("100.0 mm"), "{}", report);
        assert!(report.contains("z range: 50.0 .. 150.0 mm"), "{}", report);
    }
}
