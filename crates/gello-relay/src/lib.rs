//! # GELLO Relay
//!
//! 把主臂的关节/夹爪状态通过一问一答的网络服务转发给从臂控制进程。
//!
//! ## 结构
//!
//! ```text
//! Supervisor ──┬── CommandServer (left)  ── Agent ── Robot ── device
//!              └── CommandServer (right) ── Agent ── Robot ── device
//! ```
//!
//! - 每个 [`CommandServer`] 独占一个 [`Agent`]，单线程同步处理请求
//! - 双臂模式下两个服务各占一个线程，不共享任何状态
//! - 停止是协作式的：在下一个轮询节拍生效，正在处理的请求一定会被应答

pub mod agent;
pub mod client;
pub mod config;
mod error;
pub mod server;
pub mod supervisor;

pub use agent::Agent;
pub use client::RelayClient;
pub use config::{ConfigError, InvalidMethodPolicy, ModeKind, RelayConfig, ServerConfig};
pub use error::{ClientError, ServerError, SupervisorError};
pub use server::{CommandServer, ServerState, StopHandle, dispatch};
pub use supervisor::{
    AgentFactory, ArmEndpoint, ArmOutcome, ArmSide, Mode, Supervisor, SupervisorEvent,
    SupervisorReport,
};

// 重新导出协议层常用类型
pub use gello_protocol::{ArmState, Method, Request, Response};
