//! State machine running pick and place cycles on a worker thread.

use std::iter::once;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::automation::state::{
    AutomationObserver, AutomationState, AutomationStep, TaskParameters,
};
use crate::automation::store::{TaskFile, TaskStore};
use crate::automation::task_points::{PointKind, PointMm, TaskPoints};
use crate::command::{CommandSink, ServoCommand};
use crate::constraints::ServoLimits;
use crate::error::ArmError;
use crate::executor::{lock_angles, ControlSignals, MotionExecutor};
use crate::kinematic_traits::{Kinematics, Position, ServoAngles, Solution, GRIPPER, KINEMATIC_SERVOS};
use crate::parameters::ArmParameters;
use crate::path_plan::planner::PathPlanner;
use crate::utils::{format_angles, mm_to_position, position_to_mm};

/// Manual moves leaving more than this (meters) are sent, but with a warning.
pub const MANUAL_WARN_ERROR: f64 = 0.05;

/// Inverse kinematics outcome for one task point.
#[derive(Debug, Clone)]
pub struct Reachability {
    pub kind: PointKind,
    pub index: usize,
    pub point: PointMm,
    /// Remaining distance in millimeters, or the reason why there is no solution.
    pub error_mm: Result<f64, String>,
}

impl Reachability {
    /// Reachable within the given tolerance in millimeters.
    pub fn is_reachable(&self, tolerance_mm: f64) -> bool {
        matches!(self.error_mm, Ok(e) if e <= tolerance_mm)
    }
}

#[derive(Debug, Clone)]
struct Status {
    state: AutomationState,
    step: AutomationStep,
    task_index: usize,
    total: usize,
    last_error: Option<String>,
}

/// Everything the worker thread needs, shared with the engine.
struct Shared {
    kinematics: Arc<dyn Kinematics>,
    sink: Arc<dyn CommandSink>,
    observer: Arc<dyn AutomationObserver>,
    signals: Arc<ControlSignals>,
    current: Arc<Mutex<ServoAngles>>,
    status: Mutex<Status>,
    limits: ServoLimits,
    home: ServoAngles,
    gripper_open: f64,
    gripper_closed: f64,
}

impl Shared {
    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reports the status and the progress to the observer.
    fn notify(&self) {
        let status = self.status().clone();
        self.observer.on_status(status.state, status.step, status.task_index);
        let current = if status.state.is_active() { status.task_index + 1 } else { 0 };
        self.observer.on_progress(current, status.total);
    }

    fn send(&self, command: &ServoCommand) -> Result<(), ArmError> {
        self.sink.send(command).map_err(ArmError::Transport)
    }

    fn set_step(&self, step: AutomationStep, task_index: usize) {
        {
            let mut status = self.status();
            status.step = step;
            status.task_index = task_index;
        }
        self.notify();
    }
}

/// Runs the pick and place task. Points and parameters are edited on the engine and
/// copied to the worker when the task starts.
pub struct AutomationEngine {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    points: TaskPoints,
    parameters: TaskParameters,
}

impl AutomationEngine {
    pub fn new(
        arm: &ArmParameters,
        kinematics: Arc<dyn Kinematics>,
        sink: Arc<dyn CommandSink>,
        observer: Arc<dyn AutomationObserver>,
    ) -> Self {
        // Home and gripper angles go to the servos without inverse kinematics clamping
        let limits = ServoLimits::new(&arm.servo_limits);
        let home = limits.clamped_all(&arm.home);
        if home != arm.home {
            warn!("Home {} is outside the servo limits, using {}",
                  format_angles(&arm.home), format_angles(&home));
        }
        let gripper = |name: &str, angle: f64| {
            let clamped = angle.clamp(limits.from[GRIPPER], limits.to[GRIPPER]);
            if clamped != angle {
                warn!("Gripper {} angle {} is outside the servo limits, using {}", name, angle, clamped);
            }
            clamped
        };
        let gripper_open = gripper("open", arm.gripper_open);
        let gripper_closed = gripper("closed", arm.gripper_closed);

        let shared = Arc::new(Shared {
            kinematics,
            sink,
            observer,
            signals: Arc::new(ControlSignals::new()),
            current: Arc::new(Mutex::new(home)),
            status: Mutex::new(Status {
                state: AutomationState::Idle,
                step: AutomationStep::MoveToSafeHeight,
                task_index: 0,
                total: 0,
                last_error: None,
            }),
            limits,
            home,
            gripper_open,
            gripper_closed,
        });
        AutomationEngine {
            shared,
            worker: None,
            points: TaskPoints::new(arm.workspace),
            parameters: TaskParameters::default(),
        }
    }

    pub fn state(&self) -> AutomationState {
        self.shared.status().state
    }

    pub fn step(&self) -> AutomationStep {
        self.shared.status().step
    }

    pub fn task_index(&self) -> usize {
        self.shared.status().task_index
    }

    /// Reason of the last failure, cleared when a new task starts.
    pub fn last_error(&self) -> Option<String> {
        self.shared.status().last_error.clone()
    }

    pub fn points(&self) -> &TaskPoints {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut TaskPoints {
        &mut self.points
    }

    pub fn parameters(&self) -> &TaskParameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: TaskParameters) -> Result<(), ArmError> {
        parameters.validate()?;
        self.parameters = parameters;
        Ok(())
    }

    pub fn current_angles(&self) -> ServoAngles {
        *lock_angles(&self.shared.current)
    }

    /// Home pose within the servo limits.
    pub fn home(&self) -> ServoAngles {
        self.shared.home
    }

    /// The worker thread has not exited yet. It may still be, for a moment, after `stop()`.
    fn worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }

    /// The worker owns the angles and the arm while the task is active or stopping.
    fn ensure_manual(&self) -> Result<(), ArmError> {
        if self.state().is_active() {
            return Err(ArmError::Validation(
                "the arm is under automatic control, stop the task first".into(),
            ));
        }
        if self.worker_alive() {
            return Err(ArmError::Validation("the task is still stopping".into()));
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), ArmError> {
        if !self.shared.sink.is_connected() {
            return Err(ArmError::Validation("the arm is not connected".into()));
        }
        Ok(())
    }

    /// Sets the servo angles after a move made outside the engine. Nothing is sent.
    pub fn set_current_angles(&self, angles: ServoAngles) -> Result<(), ArmError> {
        self.ensure_manual()?;
        self.shared.limits.validate(&angles)?;
        *lock_angles(&self.shared.current) = angles;
        Ok(())
    }

    /// Moves the tip to `point` (millimeters) with a single joint command. The gripper
    /// stays as it is. A solution that misses by more than [`MANUAL_WARN_ERROR`] is still
    /// sent.
    pub fn move_to_mm(&self, point: PointMm, speed: u32) -> Result<Solution, ArmError> {
        self.ensure_manual()?;
        self.ensure_connected()?;
        self.points.check(&point)?;

        let current = self.current_angles();
        let solution = self.shared.kinematics.inverse(&mm_to_position(&point), &current)?;
        if solution.error > MANUAL_WARN_ERROR {
            warn!("Cannot reach {:?} mm exactly, {:.1} mm off", point, solution.error * 1000.0);
        }
        self.shared.send(&ServoCommand::joints(&solution.angles, speed))?;
        lock_angles(&self.shared.current)[..KINEMATIC_SERVOS]
            .copy_from_slice(&solution.angles[..KINEMATIC_SERVOS]);
        info!("Moved to {:?} mm, error {:.2} mm", point, solution.error * 1000.0);
        Ok(solution)
    }

    /// Shifts the tip by `delta` millimeters from where it is now.
    pub fn jog(&self, delta: PointMm, speed: u32) -> Result<Solution, ArmError> {
        self.ensure_manual()?;
        let here = position_to_mm(&self.shared.kinematics.forward(&self.current_angles()));
        self.move_to_mm([here[0] + delta[0], here[1] + delta[1], here[2] + delta[2]], speed)
    }

    /// Sends all six servo angles as given.
    pub fn move_servos(&self, angles: ServoAngles, speed: u32) -> Result<(), ArmError> {
        self.ensure_manual()?;
        self.ensure_connected()?;
        self.shared.limits.validate(&angles)?;
        self.shared.send(&ServoCommand::All { angles, speed })?;
        *lock_angles(&self.shared.current) = angles;
        Ok(())
    }

    /// Opens or closes the gripper. Returns the angle sent.
    pub fn gripper(&self, closed: bool, speed: u32) -> Result<f64, ArmError> {
        self.ensure_manual()?;
        self.ensure_connected()?;
        let angle = if closed { self.shared.gripper_closed } else { self.shared.gripper_open };
        self.shared.send(&ServoCommand::Gripper { angle, speed })?;
        lock_angles(&self.shared.current)[GRIPPER] = angle;
        Ok(angle)
    }

    /// Sends every servo, the gripper included, to the home pose.
    pub fn go_home(&self, speed: u32) -> Result<(), ArmError> {
        self.move_servos(self.shared.home, speed)
    }

    /// Starts the task on a new worker thread. Returns the number of pick and place
    /// cycles to run.
    pub fn start(&mut self) -> Result<usize, ArmError> {
        let pairs = self.points.pairs()?;
        self.parameters.validate()?;
        if !self.shared.sink.is_connected() {
            return Err(ArmError::Validation("the arm is not connected".into()));
        }
        if self.state().is_active() {
            return Err(ArmError::Validation("the task is already running".into()));
        }
        if let Some(worker) = self.worker.take() {
            if !worker.is_finished() {
                self.worker = Some(worker);
                return Err(ArmError::Validation("the previous task is still stopping".into()));
            }
            if worker.join().is_err() {
                error!("Previous automation worker panicked");
            }
        }

        let total = pairs.len();
        self.shared.signals.reset();
        {
            let mut status = self.shared.status();
            *status = Status {
                state: AutomationState::Running,
                step: AutomationStep::MoveToSafeHeight,
                task_index: 0,
                total,
                last_error: None,
            };
        }
        self.shared.notify();
        info!("Starting {} pick and place tasks", total);

        let shared = self.shared.clone();
        let parameters = self.parameters.clone();
        let spawned = thread::Builder::new()
            .name("automation::worker".into())
            .spawn(move || worker_thread(shared, pairs, parameters));
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(total)
            }
            Err(e) => {
                self.shared.status().state = AutomationState::Error;
                self.shared.notify();
                Err(ArmError::IoError(e))
            }
        }
    }

    /// Toggles between running and paused. Returns true if paused now.
    pub fn pause(&self) -> bool {
        let paused = {
            let mut status = self.shared.status();
            match status.state {
                AutomationState::Running => status.state = AutomationState::Paused,
                AutomationState::Paused => status.state = AutomationState::Running,
                _ => return false,
            }
            status.state == AutomationState::Paused
        };
        self.shared.signals.set_paused(paused);
        info!("Task {}", if paused { "paused" } else { "resumed" });
        self.shared.notify();
        paused
    }

    /// Requests the worker to stop and goes idle immediately. The worker exits at its
    /// next check point.
    pub fn stop(&self) {
        self.shared.signals.stop();
        self.shared.signals.set_paused(false);
        self.shared.status().state = AutomationState::Idle;
        info!("Task stopped");
        self.shared.notify();
    }

    /// Waits for the worker to finish and returns the final state.
    pub fn wait(&mut self) -> AutomationState {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Automation worker panicked");
                let mut status = self.shared.status();
                status.state = AutomationState::Error;
                status.last_error = Some("worker thread panicked".into());
            }
        }
        self.state()
    }

    /// Solves inverse kinematics for all task points, from the home pose, in parallel.
    pub fn check_reachability(&self) -> Vec<Reachability> {
        let pickup = self.points.pickup_points().iter().enumerate()
            .map(|(i, p)| (PointKind::Pickup, i, *p));
        let place = self.points.place_points().iter().enumerate()
            .map(|(i, p)| (PointKind::Place, i, *p));
        let all: Vec<(PointKind, usize, PointMm)> = pickup.chain(place).collect();

        let kinematics = &self.shared.kinematics;
        let home = self.shared.home;
        all.par_iter()
            .map(|&(kind, index, point)| Reachability {
                kind,
                index,
                point,
                error_mm: kinematics
                    .inverse(&mm_to_position(&point), &home)
                    .map(|solution| solution.error * 1000.0)
                    .map_err(|e| e.to_string()),
            })
            .collect()
    }

    pub fn task_file(&self) -> TaskFile {
        TaskFile {
            pickup_points: self.points.pickup_points().to_vec(),
            place_points: self.points.place_points().to_vec(),
            parameters: self.parameters.clone(),
        }
    }

    /// Replaces points and parameters. Every point is checked against the workspace,
    /// nothing changes if any check fails.
    pub fn apply_task_file(&mut self, file: TaskFile) -> Result<(), ArmError> {
        if self.state().is_active() {
            return Err(ArmError::Validation("cannot load tasks while the task is running".into()));
        }
        file.parameters.validate()?;
        let mut points = TaskPoints::new(*self.points.workspace());
        for p in file.pickup_points {
            points.add(PointKind::Pickup, p)?;
        }
        for p in file.place_points {
            points.add(PointKind::Place, p)?;
        }
        self.points = points;
        self.parameters = file.parameters;
        Ok(())
    }

    pub fn load_from(&mut self, store: &dyn TaskStore) -> Result<(), ArmError> {
        let file = store.load()?;
        self.apply_task_file(file)
    }

    pub fn save_to(&self, store: &dyn TaskStore) -> Result<(), ArmError> {
        store.save(&self.task_file())
    }
}

impl Drop for AutomationEngine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.shared.signals.stop();
            if worker.join().is_err() {
                error!("Automation worker panicked");
            }
        }
    }
}

/// Settles the final state after the run.
fn finish(shared: &Shared, result: Result<(), ArmError>) {
    let failure = {
        let mut status = shared.status();
        if shared.signals.is_stopped() {
            status.state = AutomationState::Idle;
            None
        } else {
            match result {
                Ok(()) => {
                    status.state = AutomationState::Completed;
                    status.step = AutomationStep::Complete;
                    None
                }
                Err(ArmError::Interrupted) => {
                    status.state = AutomationState::Idle;
                    None
                }
                Err(e) => {
                    let message = e.to_string();
                    status.state = AutomationState::Error;
                    status.last_error = Some(message.clone());
                    Some(message)
                }
            }
        }
    };
    if let Some(message) = &failure {
        error!("Task failed: {}", message);
        shared.observer.on_error(message);
    }
    shared.notify();
}

fn worker_thread(shared: Arc<Shared>, pairs: Vec<(PointMm, PointMm)>, parameters: TaskParameters) {
    // The state always settles, panics included
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        Worker::new(&shared, parameters).run(&pairs)
    }))
    .unwrap_or_else(|_| Err(ArmError::Internal("automation worker panicked".into())));
    finish(&shared, result);
}

/// Runs the cycles on the worker thread.
struct Worker<'a> {
    shared: &'a Shared,
    executor: MotionExecutor,
    planner: PathPlanner,
    parameters: TaskParameters,
}

impl<'a> Worker<'a> {
    fn new(shared: &'a Shared, parameters: TaskParameters) -> Self {
        let executor = MotionExecutor::new(
            shared.kinematics.clone(),
            shared.sink.clone(),
            shared.signals.clone(),
            shared.current.clone(),
        );
        let planner = PathPlanner::with_safe_height(parameters.safe_height / 1000.0);
        Worker { shared, executor, planner, parameters }
    }

    fn run(&self, pairs: &[(PointMm, PointMm)]) -> Result<(), ArmError> {
        for (index, (pickup, place)) in pairs.iter().enumerate() {
            self.shared.signals.check()?;
            info!("Task {}/{}: pickup {:?}, place {:?}", index + 1, pairs.len(), pickup, place);
            self.run_cycle(index, pickup, place)?;
        }

        if self.parameters.return_home {
            self.shared.signals.check()?;
            self.shared.set_step(AutomationStep::ReturnHome, pairs.len().saturating_sub(1));
            self.return_home()?;
        }
        Ok(())
    }

    fn run_cycle(&self, index: usize, pickup: &PointMm, place: &PointMm) -> Result<(), ArmError> {
        for step in AutomationStep::CYCLE {
            self.shared.signals.check()?;
            if !self.shared.signals.wait_while_paused() {
                return Err(ArmError::Interrupted);
            }
            self.shared.set_step(step, index);
            info!("Step: {}", step);

            let outcome = match step {
                AutomationStep::MoveToSafeHeight => {
                    let current = self.executor.current_position();
                    self.move_to(Position::new(current.x, current.y, self.planner.safe_height))
                }
                AutomationStep::MoveAbovePickup | AutomationStep::MoveUpFromPickup => {
                    self.move_to(self.above(pickup))
                }
                AutomationStep::MoveToPickup => self.move_to(mm_to_position(pickup)),
                AutomationStep::GripClose => self.grip(self.shared.gripper_closed),
                AutomationStep::MoveAbovePlace | AutomationStep::MoveUpFromPlace => {
                    self.move_to(self.above(place))
                }
                AutomationStep::MoveToPlace => self.move_to(mm_to_position(place)),
                AutomationStep::GripOpen => self.grip(self.shared.gripper_open),
                AutomationStep::ReturnHome | AutomationStep::Complete => Ok(()),
            };
            if let Err(e) = outcome {
                if !e.is_interrupted() {
                    warn!("Step '{}' of task {} failed: {}", step, index + 1, e);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn above(&self, point: &PointMm) -> Position {
        mm_to_position(&[point[0], point[1], point[2] + self.parameters.height_offset])
    }

    fn move_to(&self, target: Position) -> Result<(), ArmError> {
        let start = self.executor.current_position();
        let waypoints: Vec<Position> = once(start).chain(self.planner.plan(&start, &target)).collect();
        self.executor.execute(&waypoints, self.parameters.move_duration()?, self.parameters.auto_speed)
    }

    fn grip(&self, angle: f64) -> Result<(), ArmError> {
        let pause = self.parameters.grip_duration()?;
        self.shared.send(&ServoCommand::Gripper { angle, speed: self.parameters.auto_speed })?;
        lock_angles(&self.shared.current)[GRIPPER] = angle;
        if !self.shared.signals.sleep(pause) {
            return Err(ArmError::Interrupted);
        }
        Ok(())
    }

    fn return_home(&self) -> Result<(), ArmError> {
        info!("All tasks done, returning home");
        let pause = self.parameters.home_duration()?;
        let command = ServoCommand::All { angles: self.shared.home, speed: self.parameters.auto_speed };
        self.shared.send(&command)?;
        *lock_angles(&self.shared.current) = self.shared.home;
        if !self.shared.signals.sleep(pause) {
            return Err(ArmError::Interrupted);
        }
        Ok(())
    }
}
