//! Reading arm parameters and task files from YAML (optional)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_saphyr::Options;

use crate::automation::state::TaskParameters;
use crate::automation::store::{TaskFile, TaskStore};
use crate::automation::task_points::PointMm;
use crate::constraints::ServoLimits;
use crate::error::ArmError;
use crate::kinematic_traits::GRIPPER;
use crate::parameters::{ArmParameters, Workspace};

#[derive(Deserialize)]
struct WorkspaceYaml {
    #[serde(default)]
    min: Option<Vec<f64>>,
    #[serde(default)]
    max: Option<Vec<f64>>,
}

/// Every key is optional. Lists are read with any length and checked afterwards, so
/// the error can name the key.
#[derive(Deserialize, Default)]
#[serde(default)]
struct Root {
    link_lengths: Option<Vec<f64>>,
    zero_points: Option<Vec<f64>>,
    sign_corrections: Option<Vec<i8>>,
    joint_bounds: Option<Vec<Vec<f64>>>,
    servo_limits: Option<Vec<Vec<f64>>>,
    home: Option<Vec<f64>>,
    gripper_open: Option<f64>,
    gripper_closed: Option<f64>,
    workspace: Option<WorkspaceYaml>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TaskRoot {
    version: Option<i64>,
    pickup_points: Option<Vec<Vec<f64>>>,
    place_points: Option<Vec<Vec<f64>>>,
    parameters: TaskParameters,
}

/// Nothing but blank lines and comments. Such a document has no mapping to read.
fn is_blank(contents: &str) -> bool {
    contents.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}

fn parse<T: for<'de> Deserialize<'de> + Default>(contents: &str) -> Result<T, ArmError> {
    if is_blank(contents) {
        return Ok(T::default());
    }
    serde_saphyr::from_str_with_options(
        contents,
        Options { angle_conversions: true, ..Default::default() },
    )
    .map_err(|e| ArmError::ParseError(format!("{}", e)))
}

/// Fixed length array from a list, `default` if the key is missing.
fn to_array<const N: usize>(values: Option<Vec<f64>>, what: &str, default: [f64; N])
                            -> Result<[f64; N], ArmError> {
    let Some(values) = values else {
        return Ok(default);
    };
    let out: [f64; N] = values.as_slice().try_into().map_err(|_| {
        ArmError::ParseError(format!("{}: expected {} values, found {}", what, N, values.len()))
    })?;
    for (i, x) in out.iter().enumerate() {
        if !x.is_finite() {
            return Err(ArmError::ParseError(format!("{}[{}] must be finite (got {})", what, i, x)));
        }
    }
    Ok(out)
}

/// Fixed length array of `[lower, upper]` pairs, `default` if the key is missing.
fn to_ranges<const N: usize>(values: Option<Vec<Vec<f64>>>, what: &str, default: [(f64, f64); N])
                             -> Result<[(f64, f64); N], ArmError> {
    let Some(values) = values else {
        return Ok(default);
    };
    if values.len() != N {
        return Err(ArmError::ParseError(format!(
            "{}: expected {} values, found {}", what, N, values.len()
        )));
    }
    let mut out = [(0.0, 0.0); N];
    for (i, pair) in values.into_iter().enumerate() {
        let name = format!("{}[{}]", what, i);
        let [lower, upper] = to_array(Some(pair), &name, [0.0; 2])?;
        if lower > upper {
            return Err(ArmError::ParseError(format!(
                "{}: lower bound {} is above upper {}", name, lower, upper
            )));
        }
        out[i] = (lower, upper);
    }
    Ok(out)
}

fn to_scalar(value: Option<f64>, what: &str, default: f64) -> Result<f64, ArmError> {
    match value {
        None => Ok(default),
        Some(x) if x.is_finite() => Ok(x),
        Some(x) => Err(ArmError::ParseError(format!("{} must be finite (got {})", what, x))),
    }
}

impl ArmParameters {
    /// Read the arm parameters from YAML file. The file has the layout of `to_yaml`:
    /// ```yaml
    /// link_lengths: [0.09, 0.1, 0.1, 0.065, 0.001, 0.09]
    /// zero_points: [190, 130, 130, 130, 130]
    /// sign_corrections: [1, -1, 1, 1, -1]
    /// joint_bounds: [[deg(-190), deg(80)], [deg(-80), deg(80)], [deg(-110), deg(120)],
    ///                [deg(-90), deg(80)], [deg(-180), deg(180)]]
    /// servo_limits: [[0, 270], [50, 210], [20, 250], [40, 210], [40, 210], [100, 175]]
    /// home: [190, 130, 130, 130, 130, 130]
    /// gripper_open: 100
    /// gripper_closed: 175
    /// workspace:
    ///   min: [-0.6, -0.6, 0]
    ///   max: [0.6, 0.6, 0.6]
    /// ```
    /// Every key is optional, missing ones take the values of `ArmParameters::wearm()`.
    /// Joint bounds are in radians; `deg(angle)` can be used to give them in degrees
    /// (serde_saphyr angle conversions).
    ///
    /// Home and both gripper angles must be within the servo limits.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ArmError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ArmError> {
        let root: Root = parse(contents)?;
        let defaults = ArmParameters::wearm();

        let sign_corrections: [i8; 5] = match root.sign_corrections {
            None => defaults.sign_corrections,
            Some(signs) => signs.as_slice().try_into().map_err(|_| {
                ArmError::ParseError(format!(
                    "sign_corrections: expected 5 values, found {}", signs.len()
                ))
            })?,
        };
        for (i, &s) in sign_corrections.iter().enumerate() {
            if s != -1 && s != 1 {
                return Err(ArmError::ParseError(format!(
                    "sign_corrections[{}] must be -1 or 1 (got {})", i, s
                )));
            }
        }

        let link_lengths = to_array(root.link_lengths, "link_lengths", defaults.link_lengths)?;
        if link_lengths.iter().any(|&l| l < 0.0) {
            return Err(ArmError::ParseError("link lengths must not be negative".into()));
        }

        let workspace = match root.workspace {
            None => defaults.workspace,
            Some(w) => Workspace {
                min: to_array(w.min, "workspace.min", defaults.workspace.min)?,
                max: to_array(w.max, "workspace.max", defaults.workspace.max)?,
            },
        };

        let parameters = ArmParameters {
            link_lengths,
            zero_points: to_array(root.zero_points, "zero_points", defaults.zero_points)?,
            sign_corrections,
            joint_bounds: to_ranges(root.joint_bounds, "joint_bounds", defaults.joint_bounds)?,
            servo_limits: to_ranges(root.servo_limits, "servo_limits", defaults.servo_limits)?,
            home: to_array(root.home, "home", defaults.home)?,
            gripper_open: to_scalar(root.gripper_open, "gripper_open", defaults.gripper_open)?,
            gripper_closed: to_scalar(root.gripper_closed, "gripper_closed", defaults.gripper_closed)?,
            workspace,
        };
        check_servo_targets(&parameters)?;
        Ok(parameters)
    }
}

/// Home and gripper angles are sent to the servos unchanged, so they must be in range.
fn check_servo_targets(parameters: &ArmParameters) -> Result<(), ArmError> {
    let limits = ServoLimits::new(&parameters.servo_limits);
    limits.validate(&parameters.home)
        .map_err(|e| ArmError::ParseError(format!("home: {}", e)))?;
    let (lower, upper) = (limits.from[GRIPPER], limits.to[GRIPPER]);
    for (what, angle) in [
        ("gripper_open", parameters.gripper_open),
        ("gripper_closed", parameters.gripper_closed),
    ] {
        if angle < lower || angle > upper {
            return Err(ArmError::ParseError(format!(
                "{} {} is outside the gripper servo range [{}, {}]", what, angle, lower, upper
            )));
        }
    }
    Ok(())
}

fn to_points(values: Option<Vec<Vec<f64>>>, what: &str) -> Result<Vec<PointMm>, ArmError> {
    values
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, xyz)| to_array(Some(xyz), &format!("{}[{}]", what, i), [0.0; 3]))
        .collect()
}

impl TaskFile {
    /// Parses the task file written by `to_yaml`. Missing parameters take their
    /// default values; the parameters must pass `TaskParameters::validate`.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ArmError> {
        let root: TaskRoot = parse(contents)?;

        if let Some(version) = root.version {
            if version > Self::VERSION {
                return Err(ArmError::ParseError(format!(
                    "task file version {} is newer than supported {}", version, Self::VERSION
                )));
            }
        }
        root.parameters.validate()?;

        Ok(TaskFile {
            pickup_points: to_points(root.pickup_points, "pickup_points")?,
            place_points: to_points(root.place_points, "place_points")?,
            parameters: root.parameters,
        })
    }
}

/// Task file on disk in YAML.
pub struct YamlTaskStore {
    path: PathBuf,
}

impl YamlTaskStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        YamlTaskStore { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskStore for YamlTaskStore {
    fn load(&self) -> Result<TaskFile, ArmError> {
        let contents = fs::read_to_string(&self.path)?;
        TaskFile::from_yaml_str(&contents)
    }

    fn save(&self, file: &TaskFile) -> Result<(), ArmError> {
        fs::write(&self.path, file.to_yaml())?;
        Ok(())
    }
}
