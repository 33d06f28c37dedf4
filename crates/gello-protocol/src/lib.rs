//! # GELLO Protocol
//!
//! 主臂状态中继的线路协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `message`: 请求/响应消息与方法枚举
//! - `codec`: 长度前缀帧编解码
//! - `channel`: 严格一问一答（lock-step）的请求/应答通道
//!
//! ## 帧格式
//!
//! ```text
//! [Length: 4 bytes, big-endian][Payload: UTF-8 JSON]
//! ```

pub mod channel;
pub mod codec;
pub mod message;

pub use channel::{Poll, ReplyChannel, RequestChannel};
pub use codec::{MAX_FRAME_LEN, decode_payload, encode_payload, read_frame, write_frame};
pub use message::{ArmState, Method, Request, Response};

use thiserror::Error;

/// 默认服务端口（单臂 / 双臂左臂）
pub const DEFAULT_PORT: u16 = 6000;

/// 双臂模式右臂默认端口
pub const DEFAULT_RIGHT_PORT: u16 = 6001;

/// 默认监听地址
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// 协议层错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// 未知方法名
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// 载荷无法解析
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// 帧长度超过上限
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// 违反一问一答时序
    #[error("Lock-step violation: {0}")]
    LockStep(&'static str),

    /// 对端关闭连接
    #[error("Peer closed the connection")]
    Disconnected,

    /// 等待帧超时
    #[error("Timed out waiting for frame")]
    Timeout,

    /// 底层 IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// 是否为违反协议的错误（而不是传输层故障）
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidMethod(_)
                | ProtocolError::Malformed(_)
                | ProtocolError::FrameTooLarge { .. }
                | ProtocolError::LockStep(_)
        )
    }
}
