//! Execution of planned waypoints: inverse kinematics per waypoint, command dispatch and
//! timing, under cooperative pause and stop control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::command::{CommandSink, ServoCommand};
use crate::error::ArmError;
use crate::kinematic_traits::{Kinematics, Position, ServoAngles, KINEMATIC_SERVOS};
use crate::utils::format_angles;

/// Longest uninterrupted sleep, bounds the reaction time to stop and pause.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pause and stop flags shared between the controlling thread and the worker.
#[derive(Debug, Default)]
pub struct ControlSignals {
    stop: AtomicBool,
    pause: AtomicBool,
}

impl ControlSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.pause.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    /// Clears both flags before a new run.
    pub fn reset(&self) {
        self.stop.store(false, Ordering::SeqCst);
        self.pause.store(false, Ordering::SeqCst);
    }

    /// Blocks while paused. Returns false if stopped (before or during the pause).
    pub fn wait_while_paused(&self) -> bool {
        while self.is_paused() && !self.is_stopped() {
            thread::sleep(POLL_INTERVAL);
        }
        !self.is_stopped()
    }

    /// Sleeps for `duration` in slices of at most `POLL_INTERVAL`. Returns false if
    /// stopped meanwhile, the rest of the sleep is then skipped.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(POLL_INTERVAL));
        }
    }

    /// Converts the stop flag into the `Interrupted` outcome.
    pub fn check(&self) -> Result<(), ArmError> {
        if self.is_stopped() { Err(ArmError::Interrupted) } else { Ok(()) }
    }
}

/// Locks the shared angles. A panic in another holder does not make the angles
/// themselves invalid, so poisoning is ignored.
pub fn lock_angles(angles: &Mutex<ServoAngles>) -> MutexGuard<'_, ServoAngles> {
    angles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Walks waypoints on the arm. The last known servo angles are shared with the owner
/// (the automation engine or an interactive caller).
#[derive(Clone)]
pub struct MotionExecutor {
    kinematics: Arc<dyn Kinematics>,
    sink: Arc<dyn CommandSink>,
    signals: Arc<ControlSignals>,
    current: Arc<Mutex<ServoAngles>>,
}

impl MotionExecutor {
    pub fn new(
        kinematics: Arc<dyn Kinematics>,
        sink: Arc<dyn CommandSink>,
        signals: Arc<ControlSignals>,
        current: Arc<Mutex<ServoAngles>>,
    ) -> Self {
        MotionExecutor { kinematics, sink, signals, current }
    }

    pub fn current_angles(&self) -> ServoAngles {
        *lock_angles(&self.current)
    }

    /// Tip position for the current angles.
    pub fn current_position(&self) -> Position {
        self.kinematics.forward(&self.current_angles())
    }

    pub fn signals(&self) -> &Arc<ControlSignals> {
        &self.signals
    }

    /// Moves through `waypoints`, the first of which is the current position and is not
    /// visited. `total_duration` is shared evenly by the segments between waypoints.
    ///
    /// Waypoints without inverse kinematics solution are skipped, except the last one.
    /// The gripper is never commanded. Stop ends the walk with `Interrupted` at the next
    /// waypoint or during the segment sleep.
    pub fn execute(&self, waypoints: &[Position], total_duration: Duration, speed: u32)
                   -> Result<(), ArmError> {
        if waypoints.len() <= 1 {
            return Ok(());
        }
        let segments = waypoints.len() - 1;
        let segment_duration = total_duration / segments as u32;

        for (i, waypoint) in waypoints.iter().enumerate().skip(1) {
            self.signals.check()?;
            if !self.signals.wait_while_paused() {
                return Err(ArmError::Interrupted);
            }

            let current = self.current_angles();
            let solution = match self.kinematics.inverse(waypoint, &current) {
                Ok(solution) => solution,
                Err(e) if i < segments => {
                    warn!("Skipping waypoint {} of {}: {}", i, segments, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let command = ServoCommand::joints(&solution.angles, speed);
            if let Err(reason) = self.sink.send(&command) {
                error!("Sending waypoint {} of {} failed: {}", i, segments, reason);
                return Err(ArmError::Transport(reason));
            }
            {
                let mut angles = lock_angles(&self.current);
                angles[..KINEMATIC_SERVOS].copy_from_slice(&solution.angles[..KINEMATIC_SERVOS]);
                debug!("Waypoint {}/{} at {}", i, segments, format_angles(&angles));
            }

            if !self.signals.sleep(segment_duration) {
                return Err(ArmError::Interrupted);
            }
        }
        Ok(())
    }
}
