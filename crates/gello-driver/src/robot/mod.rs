//! # 机器人适配层
//!
//! [`RobotAdapter`] 把不同设备家族统一成同一个关节状态向量：
//!
//! ```text
//! [q_1, q_2, ..., q_N, gripper]
//!  └─ 手臂关节（弧度）   └─ 夹爪（归一化，0 张开，1 闭合）
//! ```
//!
//! 变体集合是封闭的（[`Robot`]），通过 `match` 静态分发。

mod motor_bus;
mod networked;

pub use motor_bus::MotorBusRobot;
pub use networked::{
    DEFAULT_ARM_PORT, DEFAULT_GRIPPER_PORT, DEFAULT_RESET_POSE, MAX_GRIPPER_OPENING,
    NETWORKED_ARM_JOINTS, NetworkedArmConfig, NetworkedArmRobot,
};

use crate::DriverError;
use serde::Serialize;

/// 观测量
///
/// 字段固定。设备无法提供的量为 `None`，调用方应当视为“未提供”而不是“静止”。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observations {
    /// 完整关节状态（含夹爪）
    pub joint_positions: Vec<f64>,
    pub joint_velocities: Option<Vec<f64>>,
    /// 末端位置 + 四元数
    pub ee_pos_quat: Option<Vec<f64>>,
    /// 夹爪位置（单元素）
    pub gripper_position: Vec<f64>,
}

impl Observations {
    /// 只有关节位置的观测（速度、位姿未提供）
    pub fn from_joint_state(joint_state: Vec<f64>) -> Self {
        let gripper_position = joint_state.last().map(|g| vec![*g]).unwrap_or_default();
        Self {
            joint_positions: joint_state,
            joint_velocities: None,
            ee_pos_quat: None,
            gripper_position,
        }
    }
}

/// 机器人统一接口
pub trait RobotAdapter {
    /// 可控自由度总数（含夹爪）
    fn num_dofs(&self) -> usize;

    /// 读取当前关节状态，长度为 `num_dofs()`，最后一位是夹爪
    fn get_joint_state(&mut self) -> Result<Vec<f64>, DriverError>;

    /// 下发关节状态（手臂关节 + 夹爪）
    fn command_joint_state(&mut self, joint_state: &[f64]) -> Result<(), DriverError>;

    /// 读取观测量
    fn get_observations(&mut self) -> Result<Observations, DriverError> {
        Ok(Observations::from_joint_state(self.get_joint_state()?))
    }
}

/// 检查下发向量长度
pub(crate) fn check_dofs(expected: usize, joint_state: &[f64]) -> Result<(), DriverError> {
    if joint_state.len() != expected {
        return Err(DriverError::InvalidInput(format!(
            "expected {} joint values, got {}",
            expected,
            joint_state.len()
        )));
    }
    Ok(())
}

/// 所有受支持的硬件变体
pub enum Robot {
    /// 串口电机总线主臂
    MotorBus(MotorBusRobot),
    /// 网络机械臂 + 夹爪控制器
    Networked(NetworkedArmRobot),
}

impl Robot {
    /// 变体名称（日志用）
    pub fn kind(&self) -> &'static str {
        match self {
            Robot::MotorBus(_) => "motor-bus",
            Robot::Networked(_) => "networked",
        }
    }
}

impl RobotAdapter for Robot {
    fn num_dofs(&self) -> usize {
        match self {
            Robot::MotorBus(robot) => robot.num_dofs(),
            Robot::Networked(robot) => robot.num_dofs(),
        }
    }

    fn get_joint_state(&mut self) -> Result<Vec<f64>, DriverError> {
        match self {
            Robot::MotorBus(robot) => robot.get_joint_state(),
            Robot::Networked(robot) => robot.get_joint_state(),
        }
    }

    fn command_joint_state(&mut self, joint_state: &[f64]) -> Result<(), DriverError> {
        match self {
            Robot::MotorBus(robot) => robot.command_joint_state(joint_state),
            Robot::Networked(robot) => robot.command_joint_state(joint_state),
        }
    }

    fn get_observations(&mut self) -> Result<Observations, DriverError> {
        match self {
            Robot::MotorBus(robot) => robot.get_observations(),
            Robot::Networked(robot) => robot.get_observations(),
        }
    }
}

impl From<MotorBusRobot> for Robot {
    fn from(robot: MotorBusRobot) -> Self {
        Robot::MotorBus(robot)
    }
}

impl From<NetworkedArmRobot> for Robot {
    fn from(robot: NetworkedArmRobot) -> Self {
        Robot::Networked(robot)
    }
}

impl std::fmt::Debug for Robot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Robot")
            .field("kind", &self.kind())
            .field("num_dofs", &self.num_dofs())
            .finish()
    }
}
