use crate::kinematic_traits::Position;
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Flags that can be set on AnnotatedPosition in the planner output
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PathFlags: u32 {
        const NONE = 0b0000_0000;

        /// Position is part of the transition from the start to the entry of the
        /// horizontal arc (rising to the safe height).
        const TRANSITION_IN =       0b0000_0001;

        /// Position lies on the horizontal arc around the base, at constant radius and
        /// safe height.
        const ARC =                 0b0000_0010;

        /// Position is part of the transition from the arc exit down to the target.
        const TRANSITION_OUT =      0b0000_0100;

        /// Position is on the spherical interpolation between start and target.
        const SPHERICAL =           0b0000_1000;

        /// Target was close enough to the start to move there directly.
        const DIRECT =              0b0001_0000;

        /// Position is the requested target (the last position of every path).
        const TARGET =              0b0010_0000;

        /// Combined flag for all positions of an arc detour
        const DETOUR = Self::TRANSITION_IN.bits() | Self::ARC.bits() | Self::TRANSITION_OUT.bits();
    }
}

/// Waypoint of the planned path, with the flags telling which part of the path
/// it belongs to.
#[derive(Clone, Copy)]
pub struct AnnotatedPosition {
    pub position: Position,
    pub flags: PathFlags,
}

impl AnnotatedPosition {
    pub fn new(position: Position, flags: PathFlags) -> Self {
        AnnotatedPosition { position, flags }
    }
}

fn flag_representation(flags: &PathFlags) -> String {
    const FLAG_MAP: &[(PathFlags, &str)] = &[
        (PathFlags::TRANSITION_IN, "TRANSITION_IN"),
        (PathFlags::ARC, "ARC"),
        (PathFlags::TRANSITION_OUT, "TRANSITION_OUT"),
        (PathFlags::SPHERICAL, "SPHERICAL"),
        (PathFlags::DIRECT, "DIRECT"),
        (PathFlags::TARGET, "TARGET"),
    ];

    FLAG_MAP
        .iter()
        .filter(|(flag, _)| flags.contains(*flag))
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(" | ")
}

impl fmt::Debug for PathFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", flag_representation(self))
    }
}

impl fmt::Debug for AnnotatedPosition {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.position;
        write!(
            formatter,
            "{:>8.1} {:>8.1} {:>8.1} mm | {:?}",
            p.x * 1000.0, p.y * 1000.0, p.z * 1000.0, self.flags
        )
    }
}
