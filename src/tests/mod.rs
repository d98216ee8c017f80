
mod kinematics_auto;

#[cfg(feature = "allow_filesystem")]
mod test_from_yaml;
