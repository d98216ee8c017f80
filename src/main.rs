use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use wearm_kinematics::automation::{
    AutomationEngine, AutomationObserver, AutomationState, AutomationStep, TaskParameters,
    TaskStore,
};
use wearm_kinematics::command::{CommandSink, ServoCommand};
use wearm_kinematics::kinematic_traits::{Kinematics, ServoAngles};
use wearm_kinematics::kinematics_impl::ArmKinematics;
use wearm_kinematics::parameters::ArmParameters;
use wearm_kinematics::parameters_from_file::YamlTaskStore;
use wearm_kinematics::path_plan::planner::PathPlanner;
use wearm_kinematics::utils::{format_angles, format_mm, mm_to_position};

/// Kinematics, path planning and pick and place for the five axis servo arm.
#[derive(Parser, Debug)]
#[command(name = "wearm", version)]
struct Args {
    /// Arm parameters (YAML). Built-in parameters are used if not given.
    #[arg(long, global = true)]
    params: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tip position for six servo angles (degrees, comma separated)
    Fk {
        #[arg(value_parser = parse_list::<6>, allow_hyphen_values = true)]
        angles: [f64; 6],
    },

    /// Servo angles reaching the given point (millimeters)
    Ik {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true)]
        z: f64,

        /// Servo angles to start from, home if not given
        #[arg(long, value_parser = parse_list::<6>, allow_hyphen_values = true)]
        from: Option<[f64; 6]>,
    },

    /// Waypoints of the move between two points (millimeters, comma separated)
    Plan {
        #[arg(long, value_parser = parse_list::<3>, allow_hyphen_values = true)]
        from: [f64; 3],

        #[arg(long, value_parser = parse_list::<3>, allow_hyphen_values = true)]
        to: [f64; 3],

        /// Height of the arc detour in millimeters
        #[arg(long, default_value_t = 250.0)]
        safe_height: f64,
    },

    /// Check that all points of the task file can be reached
    Check {
        tasks: PathBuf,

        /// Largest acceptable error in millimeters
        #[arg(long, default_value_t = 5.0)]
        tolerance: f64,
    },

    /// Run the task file without hardware, logging the commands
    Run {
        tasks: PathBuf,

        /// Keep the delays of the task file instead of running at full speed
        #[arg(long)]
        realtime: bool,
    },

    /// Move the tip from home to a point (millimeters), logging the command
    Move {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true)]
        z: f64,

        #[arg(long, default_value_t = 2)]
        speed: u32,
    },

    /// Open the gripper, or close it with --close
    Gripper {
        #[arg(long)]
        close: bool,

        #[arg(long, default_value_t = 2)]
        speed: u32,
    },

    /// Send all servos to the home pose
    Home {
        #[arg(long, default_value_t = 2)]
        speed: u32,
    },

    /// Print the arm parameters as YAML
    Params,
}

/// Parses `a,b,c` into a fixed number of values.
fn parse_list<const N: usize>(text: &str) -> Result<[f64; N], String> {
    let values = text
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<Result<Vec<_>, _>>()?;
    values
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected {} values, found {}", N, v.len()))
}

/// Sink standing in for the serial port.
struct LoggingSink;

impl CommandSink for LoggingSink {
    fn is_connected(&self) -> bool {
        true
    }

    fn send(&self, command: &ServoCommand) -> Result<(), String> {
        info!("-> {}", command.encode());
        Ok(())
    }
}

struct LoggingObserver;

impl AutomationObserver for LoggingObserver {
    fn on_status(&self, state: AutomationState, step: AutomationStep, task_index: usize) {
        info!("[{}] task {}: {}", state, task_index + 1, step);
    }

    fn on_error(&self, message: &str) {
        warn!("{}", message);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let parameters = match &args.params {
        Some(path) => ArmParameters::from_yaml_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => ArmParameters::wearm(),
    };

    match args.command {
        Command::Fk { angles } => {
            let robot = ArmKinematics::new(parameters);
            robot.limits().validate(&angles)?;
            println!("{}", format_mm(&robot.forward(&angles)));
        }

        Command::Ik { x, y, z, from } => {
            let start: ServoAngles = from.unwrap_or(parameters.home);
            let robot = ArmKinematics::new(parameters);
            let solution = robot.inverse_mm(&[x, y, z], &start)?;
            println!("{}", format_angles(&solution.angles));
            println!("error {:.2} mm after {} iterations, reached {}",
                     solution.error * 1000.0, solution.iterations,
                     format_mm(&robot.forward(&solution.angles)));
        }

        Command::Plan { from, to, safe_height } => {
            let planner = PathPlanner::with_safe_height(safe_height / 1000.0);
            let (start, target) = (mm_to_position(&from), mm_to_position(&to));
            println!("{:?} path", planner.strategy(&start, &target));
            for step in planner.plan_annotated(&start, &target) {
                println!("{:?}", step);
            }
        }

        Command::Check { tasks, tolerance } => {
            let file = YamlTaskStore::new(&tasks).load()
                .with_context(|| format!("reading {}", tasks.display()))?;
            let mut engine = engine(parameters, Arc::new(LoggingObserver));
            engine.apply_task_file(file)?;
            print!("{}", engine.points().report());

            let mut unreachable = 0;
            for r in engine.check_reachability() {
                let verdict = match &r.error_mm {
                    Ok(e) if r.is_reachable(tolerance) => format!("ok ({:.2} mm)", e),
                    Ok(e) => format!("off by {:.1} mm", e),
                    Err(reason) => reason.clone(),
                };
                if !r.is_reachable(tolerance) {
                    unreachable += 1;
                }
                println!("{:?} {}: {:?} {}", r.kind, r.index + 1, r.point, verdict);
            }
            if unreachable > 0 {
                bail!("{} points can not be reached within {} mm", unreachable, tolerance);
            }
        }

        Command::Run { tasks, realtime } => {
            let file = YamlTaskStore::new(&tasks).load()
                .with_context(|| format!("reading {}", tasks.display()))?;
            let mut engine = engine(parameters, Arc::new(LoggingObserver));
            engine.apply_task_file(file)?;
            if !realtime {
                engine.set_parameters(TaskParameters {
                    grip_delay: 0.0,
                    move_delay: 0.0,
                    ..engine.parameters().clone()
                })?;
            }
            engine.start()?;
            let state = engine.wait();
            if state != AutomationState::Completed {
                bail!("task ended {}: {}", state, engine.last_error().unwrap_or_default());
            }
        }

        Command::Move { x, y, z, speed } => {
            let engine = engine(parameters, Arc::new(LoggingObserver));
            let solution = engine.move_to_mm([x, y, z], speed)?;
            println!("{}", format_angles(&engine.current_angles()));
            println!("error {:.2} mm", solution.error * 1000.0);
        }

        Command::Gripper { close, speed } => {
            let angle = engine(parameters, Arc::new(LoggingObserver)).gripper(close, speed)?;
            println!("gripper at {}", angle);
        }

        Command::Home { speed } => engine(parameters, Arc::new(LoggingObserver)).go_home(speed)?,

        Command::Params => print!("{}", parameters.to_yaml()),
    }
    Ok(())
}

fn engine(parameters: ArmParameters, observer: Arc<dyn AutomationObserver>) -> AutomationEngine {
    let kinematics = Arc::new(ArmKinematics::new(parameters.clone()));
    AutomationEngine::new(&parameters, kinematics, Arc::new(LoggingSink), observer)
}
