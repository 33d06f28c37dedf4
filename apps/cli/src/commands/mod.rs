//! 命令定义和实现

pub mod calibrate;
pub mod serve;

pub use calibrate::CalibrateCommand;
pub use serve::ServeCommand;
