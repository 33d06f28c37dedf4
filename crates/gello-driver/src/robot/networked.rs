//! 网络机械臂 + 夹爪控制器
//!
//! 手臂与夹爪分别是独立的 RPC 会话（同一 IP，不同端口）。自由度固定为 7 + 1，
//! 不需要标定记录。

use super::{Observations, RobotAdapter, check_dofs};
use crate::DriverError;
use crate::session::{ArmClient, DeviceError, GripperClient, GripperCommand};

/// 手臂关节数
pub const NETWORKED_ARM_JOINTS: usize = 7;

/// 夹爪最大开口（米）
pub const MAX_GRIPPER_OPENING: f64 = 0.09;

/// 手臂控制器默认端口
pub const DEFAULT_ARM_PORT: u16 = 50051;

/// 夹爪控制器默认端口
pub const DEFAULT_GRIPPER_PORT: u16 = 50052;

/// 默认复位位姿
pub const DEFAULT_RESET_POSE: [f64; NETWORKED_ARM_JOINTS] =
    [0.2719, -0.5165, 0.2650, -1.6160, -0.0920, 1.6146, -1.9760];

/// 夹爪指令阈值：大于该值闭合
const GRIPPER_CLOSE_THRESHOLD: f64 = 0.5;

/// 网络控制器连接参数
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkedArmConfig {
    pub ip: String,
    pub arm_port: u16,
    pub gripper_port: u16,
    pub reset_pose: Vec<f64>,
}

impl NetworkedArmConfig {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }

    pub fn arm_endpoint(&self) -> String {
        format!("{}:{}", self.ip, self.arm_port)
    }

    pub fn gripper_endpoint(&self) -> String {
        format!("{}:{}", self.ip, self.gripper_port)
    }
}

impl Default for NetworkedArmConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            arm_port: DEFAULT_ARM_PORT,
            gripper_port: DEFAULT_GRIPPER_PORT,
            reset_pose: DEFAULT_RESET_POSE.to_vec(),
        }
    }
}

/// 网络机械臂
pub struct NetworkedArmRobot {
    config: NetworkedArmConfig,
    arm: Box<dyn ArmClient + Send>,
    gripper: Box<dyn GripperClient + Send>,
}

impl NetworkedArmRobot {
    /// 连接手臂、复位、再连接夹爪
    ///
    /// 任一控制器连接失败都视为设备不存在。
    pub fn connect(
        config: NetworkedArmConfig,
        mut arm: Box<dyn ArmClient + Send>,
        mut gripper: Box<dyn GripperClient + Send>,
    ) -> Result<Self, DriverError> {
        check_dofs(NETWORKED_ARM_JOINTS, &config.reset_pose)?;

        arm.connect().map_err(|e| {
            DriverError::DeviceNotFound(format!("arm at {}: {}", config.arm_endpoint(), e))
        })?;
        arm.reset(&config.reset_pose)?;

        gripper.connect().map_err(|e| {
            DriverError::DeviceNotFound(format!(
                "gripper at {}: {}",
                config.gripper_endpoint(),
                e
            ))
        })?;

        tracing::info!(
            arm = %config.arm_endpoint(),
            gripper = %config.gripper_endpoint(),
            "Connected networked arm"
        );
        Ok(Self {
            config,
            arm,
            gripper,
        })
    }

    pub fn config(&self) -> &NetworkedArmConfig {
        &self.config
    }
}

impl RobotAdapter for NetworkedArmRobot {
    fn num_dofs(&self) -> usize {
        NETWORKED_ARM_JOINTS + 1
    }

    fn get_joint_state(&mut self) -> Result<Vec<f64>, DriverError> {
        let mut state = self.arm.joint_positions()?;
        if state.len() != NETWORKED_ARM_JOINTS {
            return Err(DeviceError::InvalidResponse {
                expected: NETWORKED_ARM_JOINTS,
                actual: state.len(),
            }
            .into());
        }
        state.push(self.gripper.width()? / MAX_GRIPPER_OPENING);
        Ok(state)
    }

    fn command_joint_state(&mut self, joint_state: &[f64]) -> Result<(), DriverError> {
        check_dofs(self.num_dofs(), joint_state)?;

        self.arm
            .apply_joint_positions(&joint_state[..NETWORKED_ARM_JOINTS])?;

        let command = if joint_state[NETWORKED_ARM_JOINTS] > GRIPPER_CLOSE_THRESHOLD {
            GripperCommand::Close
        } else {
            GripperCommand::Open
        };
        self.gripper.apply(command)?;
        Ok(())
    }

    fn get_observations(&mut self) -> Result<Observations, DriverError> {
        Ok(Observations::from_joint_state(self.get_joint_state()?))
    }
}

impl std::fmt::Debug for NetworkedArmRobot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkedArmRobot")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
