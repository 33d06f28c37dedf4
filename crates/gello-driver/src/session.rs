//! 设备会话 trait
//!
//! 每种设备家族一个不透明句柄。具体的串口电机驱动和网络 RPC 客户端由外部 crate 实现，
//! 本 crate 只依赖这里定义的最小接口。

use thiserror::Error;

/// 设备会话错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// 设备不存在或无法打开
    #[error("Device not found: {0}")]
    NotFound(String),

    /// 会话未连接
    #[error("Device not connected")]
    NotConnected,

    /// 读写失败
    #[error("{0}")]
    Io(String),

    /// 设备返回的数据数量不符
    #[error("Invalid response: expected {expected} values, got {actual}")]
    InvalidResponse { expected: usize, actual: usize },
}

/// 串口多电机总线（如 Dynamixel）
///
/// 位置单位均为电机原始角度（弧度），顺序与 [`motor_ids`](MotorBus::motor_ids) 一致。
pub trait MotorBus {
    /// 总线上参与读写的电机 ID
    fn motor_ids(&self) -> &[u32];

    /// 读取所有电机的原始角度
    fn read_positions(&mut self) -> Result<Vec<f64>, DeviceError>;

    /// 写入所有电机的目标角度
    fn write_positions(&mut self, positions: &[f64]) -> Result<(), DeviceError>;

    /// 开关力矩（主臂通常关闭力矩以便手动拖动）
    fn set_torque_enabled(&mut self, enabled: bool) -> Result<(), DeviceError>;
}

/// 按设备标识打开电机总线
///
/// 由串口驱动实现；服务端在各自线程内调用，会话不会跨线程共享。
pub trait MotorBusConnector: Send + Sync {
    fn open(
        &self,
        identifier: &str,
        motor_ids: &[u32],
    ) -> Result<Box<dyn MotorBus + Send>, DeviceError>;
}

/// 网络机械臂控制器 RPC 会话
pub trait ArmClient {
    fn connect(&mut self) -> Result<(), DeviceError>;

    /// 回到复位位姿
    fn reset(&mut self, pose: &[f64]) -> Result<(), DeviceError>;

    /// 当前关节位置（弧度）
    fn joint_positions(&mut self) -> Result<Vec<f64>, DeviceError>;

    fn apply_joint_positions(&mut self, positions: &[f64]) -> Result<(), DeviceError>;
}

/// 夹爪开合指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripperCommand {
    Open,
    Close,
}

impl GripperCommand {
    /// 控制器使用的原始指令值（张开 1，闭合 -1）
    pub fn as_raw(&self) -> i8 {
        match self {
            GripperCommand::Open => 1,
            GripperCommand::Close => -1,
        }
    }
}

/// 网络夹爪控制器 RPC 会话
pub trait GripperClient {
    fn connect(&mut self) -> Result<(), DeviceError>;

    /// 当前开口宽度（米）
    fn width(&mut self) -> Result<f64, DeviceError>;

    fn apply(&mut self, command: GripperCommand) -> Result<(), DeviceError>;
}
