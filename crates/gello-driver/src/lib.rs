//! # GELLO Driver
//!
//! 主臂硬件抽象层，提供：
//! - 设备会话 trait（串口电机总线、网络机械臂/夹爪控制器），具体驱动由外部提供
//! - 标定记录及其存储、标定流程
//! - 统一的 [`RobotAdapter`] 接口及两种硬件变体
//!
//! ```text
//! Agent (gello-relay)
//!     ↓ RobotAdapter
//! Robot { MotorBus | Networked }
//!     ↓ MotorBus / ArmClient + GripperClient
//! Hardware
//! ```

pub mod calibration;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod robot;
pub mod session;

pub use calibration::{
    CalibrationError, CalibrationRecord, CalibrationStore, CalibrationStoreConfig, GripperConfig,
};
pub use error::DriverError;
pub use robot::{MotorBusRobot, NetworkedArmConfig, NetworkedArmRobot, Observations, Robot, RobotAdapter};
pub use session::{
    ArmClient, DeviceError, GripperClient, GripperCommand, MotorBus, MotorBusConnector,
};
