//! 中继配置
//!
//! [`RelayConfig`] 可以从 TOML 文件加载，命令行参数再覆盖其中的字段：
//!
//! ```toml
//! mode = "bimanual"
//! host = "127.0.0.1"
//! hardware_port_left = "/dev/serial/by-id/usb-FTDI_USB__-__Serial_Converter_FT94ER3L-if00-port0"
//! hardware_port_right = "/dev/serial/by-id/usb-FTDI_USB__-__Serial_Converter_FT94EVRT-if00-port0"
//! server_port_left = 6000
//! server_port_right = 6001
//! poll_interval_ms = 1000
//! invalid_method_policy = "continue"
//! ```

use crate::supervisor::{ArmEndpoint, Mode};
use gello_driver::CalibrationStoreConfig;
use gello_protocol::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_RIGHT_PORT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HARDWARE_PORT: &str =
    "/dev/serial/by-id/usb-FTDI_USB__-__Serial_Converter_FT94ER3L-if00-port0";
const DEFAULT_HARDWARE_PORT_RIGHT: &str =
    "/dev/serial/by-id/usb-FTDI_USB__-__Serial_Converter_FT94EVRT-if00-port0";

/// 默认轮询间隔（毫秒）
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// 默认帧超时（毫秒）
pub const DEFAULT_FRAME_TIMEOUT_MS: u64 = 5000;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 收到未知方法时的处理策略
///
/// 两种策略都会先发出错误应答，区别只在于之后是否继续服务。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidMethodPolicy {
    /// 应答错误后继续服务
    #[default]
    Continue,
    /// 应答错误后停止服务，`serve()` 返回协议错误
    Terminate,
}

/// 单个服务的运行参数
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 等待请求的轮询间隔，同时决定停止信号的响应粒度
    pub poll_interval: Duration,
    /// 帧开始后接收剩余字节的上限
    pub frame_timeout: Duration,
    pub invalid_method_policy: InvalidMethodPolicy,
}

impl ServerConfig {
    /// `host:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 同样参数，换一个端口
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            frame_timeout: Duration::from_millis(DEFAULT_FRAME_TIMEOUT_MS),
            invalid_method_policy: InvalidMethodPolicy::default(),
        }
    }
}

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    #[default]
    Unimanual,
    Bimanual,
}

impl std::str::FromStr for ModeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unimanual" => Ok(ModeKind::Unimanual),
            "bimanual" => Ok(ModeKind::Bimanual),
            other => Err(ConfigError::Invalid(format!(
                "Mode {} not implemented!",
                other
            ))),
        }
    }
}

/// 中继配置（配置文件的形态）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub mode: ModeKind,
    pub host: String,

    /// 单臂模式的设备标识
    pub hardware_port: String,
    pub server_port: u16,

    /// 双臂模式左右臂的设备标识
    pub hardware_port_left: String,
    pub hardware_port_right: String,
    pub server_port_left: u16,
    pub server_port_right: u16,

    /// 标定目录，未设置时使用 [`CalibrationStoreConfig::default_directory`]
    pub calibration_dir: Option<PathBuf>,

    pub poll_interval_ms: u64,
    pub frame_timeout_ms: u64,
    pub invalid_method_policy: InvalidMethodPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mode: ModeKind::Unimanual,
            host: DEFAULT_HOST.to_string(),
            hardware_port: DEFAULT_HARDWARE_PORT.to_string(),
            server_port: DEFAULT_PORT,
            hardware_port_left: DEFAULT_HARDWARE_PORT.to_string(),
            hardware_port_right: DEFAULT_HARDWARE_PORT_RIGHT.to_string(),
            server_port_left: DEFAULT_PORT,
            server_port_right: DEFAULT_RIGHT_PORT,
            calibration_dir: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            frame_timeout_ms: DEFAULT_FRAME_TIMEOUT_MS,
            invalid_method_policy: InvalidMethodPolicy::Continue,
        }
    }
}

impl RelayConfig {
    /// 解析 TOML 文本（未出现的字段取默认值）
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.frame_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "frame_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.mode == ModeKind::Bimanual {
            if self.server_port_left == self.server_port_right {
                return Err(ConfigError::Invalid(format!(
                    "left and right servers share port {}",
                    self.server_port_left
                )));
            }
            if self.hardware_port_left == self.hardware_port_right {
                return Err(ConfigError::Invalid(format!(
                    "left and right arms share device {}",
                    self.hardware_port_left
                )));
            }
        }
        Ok(())
    }

    /// 服务参数（端口由模式决定，这里取单臂端口）
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.server_port,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            frame_timeout: Duration::from_millis(self.frame_timeout_ms),
            invalid_method_policy: self.invalid_method_policy,
        }
    }

    /// 监督器模式
    pub fn mode(&self) -> Mode {
        match self.mode {
            ModeKind::Unimanual => Mode::Unimanual(ArmEndpoint::new(
                self.hardware_port.clone(),
                self.server_port,
            )),
            ModeKind::Bimanual => Mode::Bimanual {
                left: ArmEndpoint::new(self.hardware_port_left.clone(), self.server_port_left),
                right: ArmEndpoint::new(self.hardware_port_right.clone(), self.server_port_right),
            },
        }
    }

    /// 标定存储配置
    pub fn calibration_store_config(&self) -> CalibrationStoreConfig {
        match &self.calibration_dir {
            Some(dir) => CalibrationStoreConfig::new(dir.clone()),
            None => CalibrationStoreConfig::default(),
        }
    }
}
