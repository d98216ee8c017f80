#[cfg(test)]
mod tests {
    use std::fs;

    use crate::automation::store::{TaskFile, TaskStore};
    use crate::automation::TaskParameters;
    use crate::kinematic_traits::{Kinematics, Position, HOME_ANGLES};
    use crate::kinematics_impl::ArmKinematics;
    use crate::parameters::ArmParameters;
    use crate::parameters_from_file::YamlTaskStore;

    const READ_ERROR: &str = "Failed to load parameters from file";

    #[test]
    fn test_parameters_from_yaml() {
        let filename = "src/tests/data/wearm.yaml";
        let loaded = ArmParameters::from_yaml_file(filename).expect(READ_ERROR);
        let expected = ArmParameters::wearm();

        assert_eq!(expected.link_lengths, loaded.link_lengths);
        assert_eq!(expected.zero_points, loaded.zero_points);
        assert_eq!(expected.sign_corrections, loaded.sign_corrections);
        assert_eq!(expected.servo_limits, loaded.servo_limits);
        assert_eq!(expected.home, loaded.home);
        assert_eq!(expected.gripper_open, loaded.gripper_open);
        assert_eq!(expected.gripper_closed, loaded.gripper_closed);
        assert_eq!(expected.workspace, loaded.workspace);
        for (a, b) in expected.joint_bounds.iter().zip(loaded.joint_bounds.iter()) {
            assert!((a.0 - b.0).abs() < 1e-12 && (a.1 - b.1).abs() < 1e-12);
        }
    }

    #[test]
    fn test_partial_parameters() {
        let filename = "src/tests/data/wearm_long_tool.yaml";
        let loaded = ArmParameters::from_yaml_file(filename).expect(READ_ERROR);
        let defaults = ArmParameters::wearm();

        assert_eq!(loaded.link_lengths[5], 0.120);
        assert_eq!(loaded.sign_corrections, [1, 1, 1, 1, -1]);
        assert_eq!(loaded.gripper_closed, 168.5);
        assert_eq!(loaded.zero_points, defaults.zero_points);
        assert_eq!(loaded.servo_limits, defaults.servo_limits);

        // Home is still straight up, the tool adds 30 mm
        let robot = ArmKinematics::new(loaded);
        let tip = robot.forward(&HOME_ANGLES);
        assert!((tip - Position::new(0.0, 0.0, 0.476)).norm() < 1e-9, "{:?}", tip);
    }

    #[test]
    fn test_missing_file() {
        let result = ArmParameters::from_yaml_file("src/tests/data/no_such_arm.yaml");
        assert!(matches!(result, Err(crate::error::ArmError::IoError(_))));
    }

    #[test]
    fn test_home_outside_servo_limits() {
        let result = ArmParameters::from_yaml_file("src/tests/data/wearm_bad_home.yaml");
        match result {
            Err(crate::error::ArmError::ParseError(msg)) => assert!(msg.contains("home"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_task_file_from_yaml() {
        let store = YamlTaskStore::new("src/tests/data/tasks.yaml");
        let file = store.load().expect("Failed to load task file");

        assert_eq!(file.pickup_points, vec![[200.0, 0.0, 30.0], [150.0, 100.0, 80.0]]);
        assert_eq!(file.place_points, vec![[-150.0, 0.0, 200.0], [-100.0, -150.0, 100.0]]);
        assert_eq!(file.parameters, TaskParameters {
            safe_height: 240.0,
            height_offset: 25.5,
            grip_delay: 1.0,
            move_delay: 2.5,
            auto_speed: 3,
            return_home: false,
        });
    }

    #[test]
    fn test_task_file_defaults() {
        let store = YamlTaskStore::new("src/tests/data/tasks_minimal.yaml");
        let file = store.load().expect("Failed to load task file");
        assert_eq!(file.pickup_points.len(), 1);
        assert_eq!(file.place_points, vec![[0.0, 180.0, 60.0]]);
        assert_eq!(file.parameters, TaskParameters::default());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("wearm_tasks_{}.yaml", std::process::id()));
        let store = YamlTaskStore::new(&path);
        let file = TaskFile {
            pickup_points: vec![[120.25, -40.0, 50.0]],
            place_points: vec![[0.0, 180.0, 60.0]],
            parameters: TaskParameters { auto_speed: 5, ..Default::default() },
        };

        store.save(&file).unwrap();
        let loaded = store.load();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded.unwrap(), file);
    }
}
