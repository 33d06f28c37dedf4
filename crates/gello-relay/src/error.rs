//! 中继层错误类型定义

use gello_driver::DriverError;
use gello_protocol::ProtocolError;
use thiserror::Error;

/// 服务端错误
///
/// 返回到 `serve()` 之外的错误都是致命的，服务随之停止。
#[derive(Error, Debug)]
pub enum ServerError {
    /// 端口绑定失败
    #[error("Failed to bind tcp://{addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// 协议错误（`InvalidMethodPolicy::Terminate` 下的非法请求）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 设备错误（读写失败不在中继内恢复）
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 监听套接字错误
    #[error("Listener error: {0}")]
    Io(#[from] std::io::Error),

    /// 状态机不允许的操作
    #[error("Invalid server state: {0}")]
    InvalidState(&'static str),
}

/// 客户端错误
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 服务端返回了错误应答
    #[error("Server replied with error: {0}")]
    Server(String),

    /// 应答类型与请求不符
    #[error("Unexpected response to {method}")]
    UnexpectedResponse { method: &'static str },
}

/// 监督器错误
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// 模式配置无效（如双臂共用端口）
    #[error("Invalid supervisor configuration: {0}")]
    InvalidConfig(String),

    /// 工作线程创建失败
    #[error("Failed to spawn server thread: {0}")]
    Spawn(std::io::Error),
}
