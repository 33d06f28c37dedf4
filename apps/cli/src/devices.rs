//! 设备连接器选择
//!
//! 本程序不链接串口电机驱动：真实硬件由外部 crate 实现 [`MotorBusConnector`] 后接入，
//! 这里只提供模拟设备和一个明确报错的占位连接器。

use gello_driver::mock::SimulatedConnector;
use gello_driver::{CalibrationRecord, DeviceError, GripperConfig, MotorBus, MotorBusConnector};

/// 模拟读数噪声（弧度）
const SIMULATED_NOISE: f64 = 1e-4;

/// 未链接串口驱动时使用的连接器
#[derive(Debug, Default)]
pub struct NoSerialDriver;

impl MotorBusConnector for NoSerialDriver {
    fn open(
        &self,
        identifier: &str,
        _motor_ids: &[u32],
    ) -> Result<Box<dyn MotorBus + Send>, DeviceError> {
        Err(DeviceError::NotFound(format!(
            "{} (no serial motor driver is linked into this build; use --simulate)",
            identifier
        )))
    }
}

/// 按是否模拟选择连接器
pub fn connector(simulate: bool) -> Box<dyn MotorBusConnector> {
    if simulate {
        Box::new(SimulatedConnector::new().with_noise(SIMULATED_NOISE))
    } else {
        Box::new(NoSerialDriver)
    }
}

/// 模拟主臂的默认标定：六关节，零偏置，夹爪 ID 7
pub fn simulated_calibration() -> Result<CalibrationRecord, gello_driver::CalibrationError> {
    CalibrationRecord::new(
        vec![1, 2, 3, 4, 5, 6],
        vec![0.0; 6],
        vec![1, 1, -1, 1, 1, 1],
        GripperConfig::new(7, 200.0, 158.0),
    )
}
