//! States, steps and parameters of the pick and place automation.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ArmError;
use crate::utils::is_valid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationState {
    Idle,
    Running,
    Paused,
    Completed,
    Error,
}

impl AutomationState {
    /// Running or paused, the worker is (or is about to be) busy.
    pub fn is_active(&self) -> bool {
        matches!(self, AutomationState::Running | AutomationState::Paused)
    }
}

impl fmt::Display for AutomationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AutomationState::Idle => "idle",
            AutomationState::Running => "running",
            AutomationState::Paused => "paused",
            AutomationState::Completed => "completed",
            AutomationState::Error => "error",
        };
        f.write_str(text)
    }
}

/// Phase of a single pick and place cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationStep {
    MoveToSafeHeight,
    MoveAbovePickup,
    MoveToPickup,
    GripClose,
    MoveUpFromPickup,
    MoveAbovePlace,
    MoveToPlace,
    GripOpen,
    MoveUpFromPlace,
    ReturnHome,
    Complete,
}

impl AutomationStep {
    /// Steps of one pick and place cycle, in order of execution.
    pub const CYCLE: [AutomationStep; 9] = [
        AutomationStep::MoveToSafeHeight,
        AutomationStep::MoveAbovePickup,
        AutomationStep::MoveToPickup,
        AutomationStep::GripClose,
        AutomationStep::MoveUpFromPickup,
        AutomationStep::MoveAbovePlace,
        AutomationStep::MoveToPlace,
        AutomationStep::GripOpen,
        AutomationStep::MoveUpFromPlace,
    ];
}

impl fmt::Display for AutomationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AutomationStep::MoveToSafeHeight => "moving to safe height",
            AutomationStep::MoveAbovePickup => "moving above pickup point",
            AutomationStep::MoveToPickup => "moving to pickup point",
            AutomationStep::GripClose => "closing gripper",
            AutomationStep::MoveUpFromPickup => "lifting from pickup point",
            AutomationStep::MoveAbovePlace => "moving above place point",
            AutomationStep::MoveToPlace => "moving to place point",
            AutomationStep::GripOpen => "opening gripper",
            AutomationStep::MoveUpFromPlace => "lifting from place point",
            AutomationStep::ReturnHome => "returning home",
            AutomationStep::Complete => "task complete",
        };
        f.write_str(text)
    }
}

/// Tunable parameters of the automated task. Lengths in millimeters, delays in seconds.
/// Missing fields take their default values when read from a task file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskParameters {
    /// Height of the first move of every cycle and of the arc detours.
    pub safe_height: f64,

    /// How high above pickup and place points the gripper approaches and leaves.
    pub height_offset: f64,

    /// Wait after the gripper command.
    pub grip_delay: f64,

    /// Duration of every move.
    pub move_delay: f64,

    /// Servo speed sent with every command.
    pub auto_speed: u32,

    /// Return to home after all tasks succeeded.
    pub return_home: bool,
}

impl Default for TaskParameters {
    fn default() -> Self {
        TaskParameters {
            safe_height: 250.0,
            height_offset: 30.0,
            grip_delay: 2.0,
            move_delay: 3.0,
            auto_speed: 2,
            return_home: true,
        }
    }
}

/// Longest accepted grip or move delay in seconds.
pub const MAX_DELAY: f64 = 3600.0;

impl TaskParameters {
    /// Heights must be finite, delays between 0 and `MAX_DELAY`.
    pub fn validate(&self) -> Result<(), ArmError> {
        if !is_valid(&[self.safe_height, self.height_offset]) {
            return Err(ArmError::Validation("heights must be finite numbers".into()));
        }
        for (name, delay) in [("grip_delay", self.grip_delay), ("move_delay", self.move_delay)] {
            if !(0.0..=MAX_DELAY).contains(&delay) {
                return Err(ArmError::Validation(format!(
                    "{} must be between 0 and {} seconds, not {}", name, MAX_DELAY, delay
                )));
            }
        }
        Ok(())
    }

    pub fn move_duration(&self) -> Result<Duration, ArmError> {
        seconds("move_delay", self.move_delay)
    }

    pub fn grip_duration(&self) -> Result<Duration, ArmError> {
        seconds("grip_delay", self.grip_delay)
    }

    /// Settle time after the return home, longer than a normal move.
    pub fn home_duration(&self) -> Result<Duration, ArmError> {
        seconds("move_delay", self.move_delay * 1.5)
    }
}

fn seconds(name: &str, delay: f64) -> Result<Duration, ArmError> {
    let clamped = if delay < 0.0 { 0.0 } else { delay };
    Duration::try_from_secs_f64(clamped)
        .map_err(|e| ArmError::Validation(format!("{} of {} s: {}", name, delay, e)))
}

/// Receives notifications of the automation engine. Called from the worker thread,
/// implementations must return quickly.
pub trait AutomationObserver: Send + Sync {
    fn on_status(&self, _state: AutomationState, _step: AutomationStep, _task_index: usize) {}

    fn on_progress(&self, _current: usize, _total: usize) {}

    fn on_error(&self, _message: &str) {}
}

/// Observer that ignores everything.
pub struct NoObserver;

impl AutomationObserver for NoObserver {}
