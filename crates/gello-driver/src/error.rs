//! 驱动层错误类型定义

use crate::calibration::CalibrationError;
use crate::session::DeviceError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 设备标识无法解析到实际设备（路径不存在或连接失败）
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// 设备读写失败
    #[error("Device IO error: {0}")]
    Device(DeviceError),

    /// 标定加载/校验失败
    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    /// 无效输入（如关节向量长度不匹配）
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<DeviceError> for DriverError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::NotFound(id) => DriverError::DeviceNotFound(id),
            other => DriverError::Device(other),
        }
    }
}
