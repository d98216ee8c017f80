//! Helper functions

use crate::kinematic_traits::{Position, ServoAngles};

/// Checks if all elements in the slice are finite
pub fn is_valid(values: &[f64]) -> bool {
    values.iter().all(|&q| q.is_finite())
}

/// Millimeter triple (as used by the operator and in task files) to position in meters.
pub fn mm_to_position(mm: &[f64; 3]) -> Position {
    Position::new(mm[0] / 1000.0, mm[1] / 1000.0, mm[2] / 1000.0)
}

/// Position in meters to millimeter triple.
pub fn position_to_mm(p: &Position) -> [f64; 3] {
    [p.x * 1000.0, p.y * 1000.0, p.z * 1000.0]
}

/// Largest absolute difference between two angle sets.
pub fn max_angle_change(a: &ServoAngles, b: &ServoAngles) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Format servo angles in degrees, as the arm would receive them.
pub fn format_angles(angles: &ServoAngles) -> String {
    let mut row_str = String::new();
    for angle in angles {
        row_str.push_str(&format!("{:6.2} ", angle));
    }
    format!("[{}]", row_str.trim_end())
}

/// Print servo angles.
#[allow(dead_code)]
pub fn dump_angles(angles: &ServoAngles) {
    println!("{}", format_angles(angles));
}

/// Format position in millimeters.
pub fn format_mm(p: &Position) -> String {
    let mm = position_to_mm(p);
    format!("x: {:.1}, y: {:.1}, z: {:.1} mm", mm[0], mm[1], mm[2])
}

/// formatting for YAML output
pub(crate) fn deg(x: &f64) -> String {
    if *x == 0.0 {
        return "0".to_string();
    }
    format!("deg({:.4})", x.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_with_all_finite() {
        assert!(is_valid(&[0.0, 1.0, -1.0, 0.5, -0.5, 190.0]));
    }

    #[test]
    fn test_is_valid_with_nan() {
        assert!(!is_valid(&[0.0, f64::NAN, 1.0]));
    }

    #[test]
    fn test_is_valid_with_infinity() {
        assert!(!is_valid(&[0.0, f64::INFINITY, 1.0]));
    }

    #[test]
    fn test_mm_conversion() {
        let p = mm_to_position(&[150.0, 0.0, 200.0]);
        assert!((p - Position::new(0.15, 0.0, 0.2)).norm() < 1e-12);
        let back = position_to_mm(&p);
        assert!((back[0] - 150.0).abs() < 1e-9);
        assert!((back[2] - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_angle_change() {
        let a = [190.0, 130.0, 130.0, 130.0, 130.0, 100.0];
        let b = [190.5, 128.0, 130.0, 130.0, 130.0, 100.0];
        assert_eq!(max_angle_change(&a, &b), 2.0);
    }

    #[test]
    fn test_deg() {
        assert_eq!(deg(&0.0), "0");
        assert_eq!(deg(&std::f64::consts::PI), "deg(180.0000)");
    }
}
