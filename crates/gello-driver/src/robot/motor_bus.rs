//! 串口电机总线主臂（GELLO / Dynamixel）

use super::{Observations, RobotAdapter, check_dofs};
use crate::calibration::CalibrationRecord;
use crate::session::{DeviceError, MotorBus, MotorBusConnector};
use crate::DriverError;
use std::f64::consts::TAU;

/// 电机总线主臂
///
/// 读数换算：`q_i = (raw_i - offset_i) * sign_i`，夹爪按标定的张开/闭合角度归一化。
pub struct MotorBusRobot {
    identifier: String,
    calibration: CalibrationRecord,
    /// 生效偏置（按起始位姿对齐后可能与标定值相差 2π 的整数倍）
    offsets: Vec<f64>,
    bus: Box<dyn MotorBus + Send>,
}

impl MotorBusRobot {
    /// 在已打开的总线上构建
    ///
    /// 总线的电机 ID 顺序必须与标定一致（手臂关节 + 夹爪）。
    pub fn new(
        identifier: impl Into<String>,
        calibration: CalibrationRecord,
        bus: Box<dyn MotorBus + Send>,
    ) -> Result<Self, DriverError> {
        let expected = calibration.motor_ids();
        if bus.motor_ids() != expected.as_slice() {
            return Err(DriverError::InvalidInput(format!(
                "motor bus ids {:?} do not match calibration ids {:?}",
                bus.motor_ids(),
                expected
            )));
        }

        Ok(Self {
            identifier: identifier.into(),
            offsets: calibration.joint_offsets().to_vec(),
            calibration,
            bus,
        })
    }

    /// 通过连接器打开设备并构建
    pub fn open(
        identifier: &str,
        calibration: CalibrationRecord,
        connector: &dyn MotorBusConnector,
    ) -> Result<Self, DriverError> {
        let bus = connector.open(identifier, &calibration.motor_ids())?;
        tracing::info!(
            identifier,
            joints = calibration.num_joints(),
            "Opened motor bus"
        );
        Self::new(identifier, calibration, bus)
    }

    /// 按起始位姿对齐偏置
    ///
    /// 编码器读数只在一圈内唯一：对每个关节选择 2π 的整数倍，使当前读数最接近声明的起始角度。
    pub fn with_start_joints(mut self, start_joints: &[f64]) -> Result<Self, DriverError> {
        check_dofs(self.calibration.num_joints(), start_joints)?;

        let current = self.get_joint_state()?;
        for (idx, start) in start_joints.iter().enumerate() {
            let turns = ((current[idx] - start) / TAU).round();
            let sign = f64::from(self.calibration.joint_signs()[idx]);
            self.offsets[idx] += TAU * turns * sign;
        }

        tracing::debug!(identifier = %self.identifier, offsets = ?self.offsets, "Aligned offsets to start joints");
        Ok(self)
    }

    /// 开关电机力矩
    pub fn set_torque_mode(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.bus.set_torque_enabled(enabled)?;
        Ok(())
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn calibration(&self) -> &CalibrationRecord {
        &self.calibration
    }

    /// 当前生效的关节偏置
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    fn read_raw(&mut self) -> Result<Vec<f64>, DriverError> {
        let raw = self.bus.read_positions()?;
        let expected = self.num_dofs();
        if raw.len() != expected {
            return Err(DeviceError::InvalidResponse {
                expected,
                actual: raw.len(),
            }
            .into());
        }
        Ok(raw)
    }
}

impl RobotAdapter for MotorBusRobot {
    fn num_dofs(&self) -> usize {
        self.calibration.num_joints() + 1
    }

    fn get_joint_state(&mut self) -> Result<Vec<f64>, DriverError> {
        let raw = self.read_raw()?;
        let n = self.calibration.num_joints();

        let mut state: Vec<f64> = raw[..n]
            .iter()
            .zip(&self.offsets)
            .zip(self.calibration.joint_signs())
            .map(|((raw, offset), sign)| (raw - offset) * f64::from(*sign))
            .collect();
        state.push(self.calibration.gripper_config().normalize(raw[n]));
        Ok(state)
    }

    fn command_joint_state(&mut self, joint_state: &[f64]) -> Result<(), DriverError> {
        check_dofs(self.num_dofs(), joint_state)?;
        let n = self.calibration.num_joints();

        let mut raw: Vec<f64> = joint_state[..n]
            .iter()
            .zip(&self.offsets)
            .zip(self.calibration.joint_signs())
            .map(|((q, offset), sign)| q * f64::from(*sign) + offset)
            .collect();
        raw.push(self.calibration.gripper_config().denormalize(joint_state[n]));

        self.bus.write_positions(&raw)?;
        Ok(())
    }

    fn get_observations(&mut self) -> Result<Observations, DriverError> {
        Ok(Observations::from_joint_state(self.get_joint_state()?))
    }
}

impl std::fmt::Debug for MotorBusRobot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorBusRobot")
            .field("identifier", &self.identifier)
            .field("calibration", &self.calibration)
            .field("offsets", &self.offsets)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::GripperConfig;
    use crate::mock::{SimulatedConnector, SimulatedMotorBus};
    use std::f64::consts::{FRAC_PI_2, PI};

    fn calibration() -> CalibrationRecord {
        CalibrationRecord::new(
            vec![1, 2, 3],
            vec![PI, FRAC_PI_2, 0.0],
            vec![1, -1, 1],
            GripperConfig::new(4, 198.0, 148.0),
        )
        .unwrap()
    }

    fn robot_with(raw: Vec<f64>) -> (MotorBusRobot, crate::mock::SimHandle) {
        let bus = SimulatedMotorBus::new(vec![1, 2, 3, 4], raw);
        let handle = bus.handle();
        let robot = MotorBusRobot::new("/dev/ttyUSB0", calibration(), Box::new(bus)).unwrap();
        (robot, handle)
    }

    #[test]
    fn test_num_dofs_includes_gripper() {
        let (robot, _) = robot_with(vec![0.0; 4]);
        assert_eq!(robot.num_dofs(), 4);
    }

    #[test]
    fn test_joint_state_applies_offsets_and_signs() {
        let (mut robot, _) = robot_with(vec![PI + 0.1, FRAC_PI_2 + 0.2, -0.3, 173f64.to_radians()]);
        let state = robot.get_joint_state().unwrap();
        assert_eq!(state.len(), 4);
        assert!((state[0] - 0.1).abs() < 1e-9);
        assert!((state[1] + 0.2).abs() < 1e-9);
        assert!((state[2] + 0.3).abs() < 1e-9);
        assert!((state[3] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_command_inverts_state() {
        let (mut robot, handle) = robot_with(vec![0.0; 4]);
        let target = [0.1, -0.2, 0.3, 1.0];
        robot.command_joint_state(&target).unwrap();

        let written = handle.positions();
        assert!((written[0] - (PI + 0.1)).abs() < 1e-9);
        assert!((written[1] - (FRAC_PI_2 + 0.2)).abs() < 1e-9);
        assert!((written[2] - 0.3).abs() < 1e-9);
        assert!((written[3] - 148f64.to_radians()).abs() < 1e-9);

        let state = robot.get_joint_state().unwrap();
        for (a, b) in state.iter().zip(target) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_command_wrong_length() {
        let (mut robot, _) = robot_with(vec![0.0; 4]);
        assert!(matches!(
            robot.command_joint_state(&[0.0; 3]),
            Err(DriverError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_mismatched_bus_ids_rejected() {
        let bus = SimulatedMotorBus::new(vec![1, 2, 3], vec![0.0; 3]);
        assert!(matches!(
            MotorBusRobot::new("/dev/ttyUSB0", calibration(), Box::new(bus)),
            Err(DriverError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_short_read_is_device_error() {
        let (mut robot, handle) = robot_with(vec![0.0; 4]);
        handle.set_positions(vec![0.0; 2]);
        assert!(matches!(
            robot.get_joint_state(),
            Err(DriverError::Device(DeviceError::InvalidResponse { expected: 4, actual: 2 }))
        ));
    }

    #[test]
    fn test_read_failure_propagates() {
        let (mut robot, handle) = robot_with(vec![0.0; 4]);
        handle.fail_reads(true);
        assert!(matches!(
            robot.get_joint_state(),
            Err(DriverError::Device(DeviceError::Io(_)))
        ));
    }

    #[test]
    fn test_start_joints_shift_by_full_turns() {
        // 第一关节读数比起始位姿多一整圈
        let (robot, _) = robot_with(vec![PI + TAU + 0.05, FRAC_PI_2, 0.0, 198f64.to_radians()]);
        let mut robot = robot.with_start_joints(&[0.0, 0.0, 0.0]).unwrap();
        assert!((robot.offsets()[0] - (PI + TAU)).abs() < 1e-9);
        assert!((robot.offsets()[1] - FRAC_PI_2).abs() < 1e-9);

        let state = robot.get_joint_state().unwrap();
        assert!((state[0] - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_start_joints_wrong_length() {
        let (robot, _) = robot_with(vec![0.0; 4]);
        assert!(matches!(
            robot.with_start_joints(&[0.0; 4]),
            Err(DriverError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_torque_mode() {
        let (mut robot, handle) = robot_with(vec![0.0; 4]);
        robot.set_torque_mode(true).unwrap();
        assert!(handle.torque_enabled());
        robot.set_torque_mode(false).unwrap();
        assert!(!handle.torque_enabled());
    }

    #[test]
    fn test_open_through_connector() {
        let connector = SimulatedConnector::new();
        let robot = MotorBusRobot::open("/dev/ttyUSB3", calibration(), &connector).unwrap();
        assert_eq!(robot.identifier(), "/dev/ttyUSB3");
        assert!(connector.handle("/dev/ttyUSB3").is_some());
    }
}
