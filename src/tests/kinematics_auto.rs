#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::chain::KinematicChain;
    use crate::constraints::ServoLimits;
    use crate::error::ArmError;
    use crate::kinematic_traits::{
        ChainAngles, Kinematics, Position, ServoAngles, HOME_ANGLES, KINEMATIC_SERVOS,
    };
    use crate::kinematics_impl::{ArmKinematics, MAX_IK_ITERATIONS};
    use crate::parameters::ArmParameters;
    use crate::solver::IkSolver;

    const ACCEPTED_ERROR: f64 = 0.005;

    fn robot() -> ArmKinematics {
        ArmKinematics::new(ArmParameters::wearm())
    }

    #[test]
    fn test_servo_chain_round_trip() {
        let robot = robot();
        let mut rng = StdRng::from_seed([0u8; 32]);

        for _ in 0..2048 {
            let angles = robot.limits().random_angles(&mut rng);
            let back = robot.chain().chain_to_servo(&robot.chain().servo_to_chain(&angles), 0.0);
            for i in 0..KINEMATIC_SERVOS {
                assert!((angles[i] - back[i]).abs() < 1e-9,
                        "Servo {}: {} came back as {}", i, angles[i], back[i]);
            }
        }
    }

    /// Seed for the inverse kinematics: the answer shifted by up to 10 degrees per servo.
    fn nearby(limits: &ServoLimits, angles: &ServoAngles, rng: &mut StdRng) -> ServoAngles {
        let mut seed = *angles;
        for angle in seed.iter_mut().take(KINEMATIC_SERVOS) {
            *angle += rng.gen_range(-10.0..10.0);
        }
        limits.clamp(&mut seed);
        seed
    }

    #[test]
    fn test_inverse_of_forward() {
        let robot = robot();
        let mut rng = StdRng::from_seed([1u8; 32]);

        for case in 0..100 {
            let angles = robot.limits().random_angles(&mut rng);
            let target = robot.forward(&angles);

            let solution = robot.inverse(&target, &angles).unwrap();
            assert!(solution.error < 1e-6, "Case {}: {:?} seeded with the answer", case, angles);

            let seed = nearby(robot.limits(), &angles, &mut rng);
            let solution = robot.inverse(&target, &seed).unwrap();
            if solution.error >= ACCEPTED_ERROR {
                println!("Target {:?}, angles {:?}, seed {:?}", target.as_slice(), angles, seed);
                println!("Found {:?}", solution);
                panic!("Case {} leaves {:.1} mm", case, solution.error * 1000.0);
            }
        }
    }

    #[test]
    fn test_results_within_limits() {
        let robot = robot();
        let mut rng = StdRng::from_seed([2u8; 32]);

        // Many of these are out of reach
        for _ in 0..64 {
            let target = Position::new(
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
                rng.gen_range(0.0..0.5),
            );
            let solution = robot.inverse(&target, &HOME_ANGLES).unwrap();
            assert!(robot.limits().compliant(&solution.angles),
                    "{:?} for {:?}", solution.angles, target.as_slice());
            assert!(solution.iterations >= 1 && solution.iterations <= MAX_IK_ITERATIONS);
            assert_eq!(solution.angles[5], HOME_ANGLES[5]);
        }
    }

    /// Returns the exact answer on the first pass and a pose beyond the joint bounds
    /// afterwards. The later passes are clamped and end up further from the target.
    struct DegradingSolver {
        answer: ChainAngles,
        calls: AtomicUsize,
    }

    impl IkSolver for DegradingSolver {
        fn solve(&self, _chain: &KinematicChain, _target: &Position, _seed: &ChainAngles)
                 -> Result<ChainAngles, ArmError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(self.answer);
            }
            let mut wild = self.answer;
            wild[2] = 3.0;
            wild[4] = -3.0;
            Ok(wild)
        }
    }

    #[test]
    fn test_best_pass_wins() {
        let parameters = ArmParameters::wearm();
        let chain = KinematicChain::new(&parameters);
        let answer_servo = [200.0, 150.0, 200.0, 160.0, 130.0, 130.0];
        let answer = chain.servo_to_chain(&answer_servo);
        let target = chain.position(&answer);

        let robot = ArmKinematics::with_solver(
            parameters, DegradingSolver { answer, calls: AtomicUsize::new(0) });
        let solution = robot.inverse(&target, &HOME_ANGLES).unwrap();

        assert_eq!(solution.iterations, 1);
        assert!(solution.error < 1e-9);
        for i in 0..KINEMATIC_SERVOS {
            assert!((solution.angles[i] - answer_servo[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reaches_point_in_front() {
        let robot = robot();
        let target = Position::new(150.0, 0.0, 200.0) / 1000.0;
        let solution = robot.inverse(&target, &HOME_ANGLES).unwrap();
        assert!(solution.error < ACCEPTED_ERROR, "{:?}", solution);
        assert!(solution.iterations <= MAX_IK_ITERATIONS);
        assert!((robot.forward(&solution.angles) - target).norm() < ACCEPTED_ERROR);
    }

    #[test]
    fn test_reaches_points_all_around() {
        let robot = robot();
        let targets = [
            [0.2, 0.1, 0.1],
            [-0.15, 0.0, 0.2],
            [0.0, 0.15, 0.05],
            [0.1, -0.1, 0.25],
            [0.15, 0.1, 0.08],
            [-0.1, -0.15, 0.1],
            [0.2, 0.0, 0.03],
        ];
        for [x, y, z] in targets {
            let target = Position::new(x, y, z);
            let solution = robot.inverse(&target, &HOME_ANGLES).unwrap();
            assert!(solution.error < ACCEPTED_ERROR,
                    "{:?} leaves {:.1} mm", target.as_slice(), solution.error * 1000.0);
        }
    }
}
