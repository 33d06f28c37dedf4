//! Agent：服务端持有的设备会话
//!
//! Agent 独占一个 [`Robot`]，对外只暴露读取状态。服务循环只通过 Agent 访问设备。

use gello_driver::{
    CalibrationRecord, CalibrationStore, DriverError, MotorBusConnector, MotorBusRobot, Robot,
    RobotAdapter,
};
use std::path::Path;
use tracing::info;

/// 主臂 Agent
#[derive(Debug)]
pub struct Agent {
    identifier: String,
    robot: Robot,
}

impl Agent {
    /// 包装一个已构建的机器人（网络机械臂、测试）
    pub fn new(identifier: impl Into<String>, robot: impl Into<Robot>) -> Self {
        Self {
            identifier: identifier.into(),
            robot: robot.into(),
        }
    }

    /// 打开电机总线主臂
    ///
    /// - 传入 `calibration` 时直接使用
    /// - 否则设备标识必须是已存在的路径，再从 `store` 加载该设备的标定
    ///
    /// `start_joints` 非空时按起始位姿对齐偏置的整圈数。
    ///
    /// # 错误
    /// - `DriverError::DeviceNotFound`: 设备路径不存在或打开失败
    /// - `DriverError::Calibration`: 没有标定记录或记录无效
    pub fn connect(
        identifier: &str,
        calibration: Option<CalibrationRecord>,
        store: &CalibrationStore,
        connector: &dyn MotorBusConnector,
        start_joints: Option<&[f64]>,
    ) -> Result<Self, DriverError> {
        let calibration = match calibration {
            Some(record) => record,
            None => {
                if !Path::new(identifier).exists() {
                    return Err(DriverError::DeviceNotFound(identifier.to_string()));
                }
                store.load(identifier)?
            },
        };

        let mut robot = MotorBusRobot::open(identifier, calibration, connector)?;
        if let Some(start) = start_joints {
            robot = robot.with_start_joints(start)?;
        }

        info!(identifier, dofs = robot.num_dofs(), "Agent ready");
        Ok(Self::new(identifier, robot))
    }

    /// 读取完整关节状态（手臂关节 + 夹爪），不做任何过滤
    pub fn read_state(&mut self) -> Result<Vec<f64>, DriverError> {
        self.robot.get_joint_state()
    }

    /// 自由度总数（含夹爪）
    pub fn num_dofs(&self) -> usize {
        self.robot.num_dofs()
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }
}
