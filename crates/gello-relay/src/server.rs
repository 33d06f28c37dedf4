//! 命令服务
//!
//! 单线程同步的一问一答服务，独占一个 [`Agent`]：
//!
//! ```text
//! Idle ──bind()──> Bound ──serve()──> Serving ──stop / fatal error──> Stopped
//! ```
//!
//! 服务循环：
//! 1. 没有对端时最多等待一个轮询间隔接受连接
//! 2. 有对端时最多等待一个轮询间隔接收请求，超时只是空闲节拍；
//!    空闲节拍时若有新连接在等待，新连接接替当前对端（对端崩溃后重连不会被旧连接挡住）
//! 3. 解析请求并按方法分派，每个请求恰好应答一次
//!
//! 停止是协作式的：[`StopHandle::stop`] 在下一个轮询节拍生效，正在处理的请求一定会被应答。

use crate::agent::Agent;
use crate::config::{InvalidMethodPolicy, ServerConfig};
use crate::error::ServerError;
use gello_driver::{DeviceError, DriverError};
use gello_protocol::{
    ArmState, Method, Poll, ProtocolError, ReplyChannel, Request, Response, decode_payload,
    encode_payload,
};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 等待连接时的休眠粒度
const ACCEPT_SLICE: Duration = Duration::from_millis(10);

/// 服务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Bound,
    Serving,
    Stopped,
}

/// 停止信号（可跨线程克隆）
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求停止，在下一个轮询节拍生效
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 命令服务
pub struct CommandServer {
    config: ServerConfig,
    agent: Agent,
    state: ServerState,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    stop: StopHandle,
}

impl CommandServer {
    pub fn new(config: ServerConfig, agent: Agent) -> Self {
        Self::with_stop_handle(config, agent, StopHandle::new())
    }

    /// 使用外部提供的停止信号（监督器在启动前就需要拿到它）
    pub fn with_stop_handle(config: ServerConfig, agent: Agent, stop: StopHandle) -> Self {
        Self {
            config,
            agent,
            state: ServerState::Idle,
            listener: None,
            local_addr: None,
            stop,
        }
    }

    /// 绑定 `tcp://host:port`
    pub fn bind(&mut self) -> Result<SocketAddr, ServerError> {
        if self.state != ServerState::Idle {
            return Err(ServerError::InvalidState("bind() requires an idle server"));
        }

        let addr = self.config.addr();
        info!(identifier = self.agent.identifier(), "Binding tcp://{}", addr);

        let listener =
            TcpListener::bind(&addr).map_err(|source| ServerError::Bind { addr, source })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        self.listener = Some(listener);
        self.local_addr = Some(local_addr);
        self.state = ServerState::Bound;
        Ok(local_addr)
    }

    /// 实际监听地址（绑定端口 0 时用于获取分配的端口）
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// 运行服务循环，直到停止信号或致命错误
    ///
    /// # 错误
    /// - `ServerError::Driver`: 设备读取失败（已向当前请求应答错误）
    /// - `ServerError::Protocol`: `InvalidMethodPolicy::Terminate` 下收到非法请求
    /// - `ServerError::Io`: 监听套接字故障
    pub fn serve(&mut self) -> Result<(), ServerError> {
        if self.state != ServerState::Bound {
            return Err(ServerError::InvalidState("serve() requires a bound server"));
        }
        let listener = self
            .listener
            .take()
            .ok_or(ServerError::InvalidState("listener missing"))?;

        self.state = ServerState::Serving;
        let result = self.run(&listener);
        self.state = ServerState::Stopped;

        match &result {
            Ok(()) => info!(identifier = self.agent.identifier(), "Server stopped"),
            Err(e) => error!(identifier = self.agent.identifier(), error = %e, "Server failed"),
        }
        result
    }

    fn run(&mut self, listener: &TcpListener) -> Result<(), ServerError> {
        let mut peer: Option<ReplyChannel> = None;

        while !self.stop.is_stopped() {
            let Some(channel) = peer.as_mut() else {
                peer = self.accept(listener)?;
                continue;
            };

            match channel.poll_request(self.config.poll_interval) {
                Ok(Poll::Idle) => {
                    trace!(peer = %channel.peer_addr(), "No request within poll interval");
                    if let Some(next) = self.try_accept(listener)? {
                        info!(
                            idle = %channel.peer_addr(),
                            peer = %next.peer_addr(),
                            "Replacing idle peer"
                        );
                        peer = Some(next);
                    }
                },
                Ok(Poll::Ready(frame)) => {
                    if !self.handle_frame(channel, &frame)? {
                        peer = None;
                    }
                },
                Err(ProtocolError::Disconnected) => {
                    info!(peer = %channel.peer_addr(), "Peer disconnected");
                    peer = None;
                },
                Err(e) => {
                    warn!(peer = %channel.peer_addr(), error = %e, "Dropping peer");
                    peer = None;
                },
            }
        }
        Ok(())
    }

    /// 最多等待一个轮询间隔接受连接
    fn accept(&self, listener: &TcpListener) -> Result<Option<ReplyChannel>, ServerError> {
        let deadline = Instant::now() + self.config.poll_interval;
        loop {
            if let Some(channel) = self.try_accept(listener)? {
                return Ok(Some(channel));
            }
            let now = Instant::now();
            if now >= deadline || self.stop.is_stopped() {
                trace!("No connection within poll interval");
                return Ok(None);
            }
            thread::sleep(ACCEPT_SLICE.min(deadline - now));
        }
    }

    /// 非阻塞地接受一个等待中的连接
    fn try_accept(&self, listener: &TcpListener) -> Result<Option<ReplyChannel>, ServerError> {
        match listener.accept() {
            Ok((stream, addr)) => match ReplyChannel::new(stream, self.config.frame_timeout) {
                Ok(channel) => {
                    info!(peer = %addr, "Peer connected");
                    Ok(Some(channel))
                },
                Err(e) => {
                    warn!(peer = %addr, error = %e, "Failed to set up peer");
                    Ok(None)
                },
            },
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock
                        | io::ErrorKind::Interrupted
                        | io::ErrorKind::ConnectionAborted
                ) =>
            {
                Ok(None)
            },
            Err(e) => Err(ServerError::Io(e)),
        }
    }

    /// 处理一个请求帧并应答
    ///
    /// 返回 `Ok(false)` 表示应答发送失败，应丢弃该对端。
    fn handle_frame(
        &mut self,
        channel: &mut ReplyChannel,
        frame: &[u8],
    ) -> Result<bool, ServerError> {
        let (response, failure) = match decode_request(frame) {
            Ok(method) => match dispatch(method, &mut self.agent) {
                Ok(response) => {
                    debug!(method = %method, "Handled request");
                    (response, None)
                },
                Err(e) => (Response::error(&e), Some(ServerError::Driver(e))),
            },
            Err(e) => {
                warn!(peer = %channel.peer_addr(), error = %e, "Rejected request");
                let response = Response::error(&e);
                let failure = match self.config.invalid_method_policy {
                    InvalidMethodPolicy::Continue => None,
                    InvalidMethodPolicy::Terminate => Some(ServerError::Protocol(e)),
                };
                (response, failure)
            },
        };

        let delivered = match send_response(channel, &response) {
            Ok(()) => true,
            Err(e) => {
                warn!(peer = %channel.peer_addr(), error = %e, "Failed to send reply");
                false
            },
        };

        match failure {
            Some(err) => Err(err),
            None => Ok(delivered),
        }
    }
}

impl std::fmt::Debug for CommandServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandServer")
            .field("addr", &self.config.addr())
            .field("state", &self.state)
            .field("agent", &self.agent)
            .finish()
    }
}

/// 解析请求帧得到方法
pub fn decode_request(frame: &[u8]) -> Result<Method, ProtocolError> {
    let request: Request = decode_payload(frame)?;
    request.method()
}

/// 按方法读取 Agent 状态并构造应答
///
/// 状态向量 `[q_1, ..., q_N, gripper]`：
/// - `GetJointState` → `ArmState { joint_pos: [q_1, ..., q_N] }`
/// - `GetGripperState` → `[gripper]`
pub fn dispatch(method: Method, agent: &mut Agent) -> Result<Response, DriverError> {
    let state = agent.read_state()?;
    let Some((gripper, joints)) = state.split_last() else {
        return Err(DeviceError::InvalidResponse {
            expected: agent.num_dofs(),
            actual: 0,
        }
        .into());
    };

    Ok(match method {
        Method::GetJointState => {
            Response::JointState(ArmState::from_joint_positions(joints.to_vec()))
        },
        Method::GetGripperState => Response::gripper(*gripper),
    })
}

fn send_response(channel: &mut ReplyChannel, response: &Response) -> Result<(), ProtocolError> {
    let payload = encode_payload(response)?;
    channel.send_reply(&payload)
}
