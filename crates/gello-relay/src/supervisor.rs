//! 服务监督器
//!
//! - 单臂：在调用线程上运行一个服务（阻塞）
//! - 双臂：左右臂各一个具名线程，各自构建 Agent、各自绑定端口，互不共享状态
//!
//! 一侧失败（设备故障、线程 panic）不会停止另一侧；监督器等待两侧都结束后汇总结果。

use crate::agent::Agent;
use crate::config::ServerConfig;
use crate::error::{ServerError, SupervisorError};
use crate::server::{CommandServer, StopHandle};
use crossbeam_channel::{Receiver, Sender};
use gello_driver::DriverError;
use std::fmt;
use std::net::SocketAddr;
use std::thread;
use tracing::{error, info};

/// 手臂位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmSide {
    /// 单臂模式
    Single,
    Left,
    Right,
}

impl ArmSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArmSide::Single => "single",
            ArmSide::Left => "left",
            ArmSide::Right => "right",
        }
    }

    fn thread_name(&self) -> &'static str {
        match self {
            ArmSide::Single => "gello-single",
            ArmSide::Left => "gello-left",
            ArmSide::Right => "gello-right",
        }
    }
}

impl fmt::Display for ArmSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条手臂：设备标识 + 服务端口
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmEndpoint {
    pub identifier: String,
    pub port: u16,
}

impl ArmEndpoint {
    pub fn new(identifier: impl Into<String>, port: u16) -> Self {
        Self {
            identifier: identifier.into(),
            port,
        }
    }
}

/// 运行模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Unimanual(ArmEndpoint),
    Bimanual { left: ArmEndpoint, right: ArmEndpoint },
}

impl Mode {
    /// 各手臂及其端点
    pub fn arms(&self) -> Vec<(ArmSide, &ArmEndpoint)> {
        match self {
            Mode::Unimanual(arm) => vec![(ArmSide::Single, arm)],
            Mode::Bimanual { left, right } => vec![(ArmSide::Left, left), (ArmSide::Right, right)],
        }
    }
}

/// Agent 工厂
///
/// 在服务线程内调用，设备会话只在所属线程上创建和使用。
pub trait AgentFactory: Send + Sync {
    fn create(&self, side: ArmSide, endpoint: &ArmEndpoint) -> Result<Agent, DriverError>;
}

impl<F> AgentFactory for F
where
    F: Fn(ArmSide, &ArmEndpoint) -> Result<Agent, DriverError> + Send + Sync,
{
    fn create(&self, side: ArmSide, endpoint: &ArmEndpoint) -> Result<Agent, DriverError> {
        self(side, endpoint)
    }
}

/// 监督器事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// 服务已绑定，`addr` 为实际监听地址
    Bound { arm: ArmSide, addr: SocketAddr },
    /// 服务正常停止
    Stopped { arm: ArmSide },
    /// 服务失败（Agent 创建失败、绑定失败、设备故障、线程 panic）
    Failed { arm: ArmSide, reason: String },
}

/// 单臂运行结果
#[derive(Debug)]
pub enum ArmOutcome {
    Stopped,
    Failed(ServerError),
    Panicked,
}

impl ArmOutcome {
    pub fn is_stopped(&self) -> bool {
        matches!(self, ArmOutcome::Stopped)
    }
}

/// 运行报告
#[derive(Debug)]
pub struct SupervisorReport {
    pub outcomes: Vec<(ArmSide, ArmOutcome)>,
}

impl SupervisorReport {
    pub fn outcome(&self, side: ArmSide) -> Option<&ArmOutcome> {
        self.outcomes
            .iter()
            .find(|(arm, _)| *arm == side)
            .map(|(_, outcome)| outcome)
    }

    /// 所有手臂都正常停止
    pub fn all_stopped(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_stopped())
    }
}

/// 服务监督器
pub struct Supervisor {
    mode: Mode,
    config: ServerConfig,
    stops: Vec<(ArmSide, StopHandle)>,
    event_tx: Sender<SupervisorEvent>,
    event_rx: Receiver<SupervisorEvent>,
}

impl Supervisor {
    /// 创建监督器
    ///
    /// `config` 提供公共参数，端口取自各手臂的 [`ArmEndpoint`]。
    /// 双臂模式下两臂的设备标识必须不同，端口必须不同（都为 0 时由系统分配）。
    pub fn new(mode: Mode, config: ServerConfig) -> Result<Self, SupervisorError> {
        if let Mode::Bimanual { left, right } = &mode {
            if left.port != 0 && left.port == right.port {
                return Err(SupervisorError::InvalidConfig(format!(
                    "left and right servers share port {}",
                    left.port
                )));
            }
            if left.identifier == right.identifier {
                return Err(SupervisorError::InvalidConfig(format!(
                    "left and right arms share device {}",
                    left.identifier
                )));
            }
        }

        let stops = mode
            .arms()
            .into_iter()
            .map(|(side, _)| (side, StopHandle::new()))
            .collect();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        Ok(Self {
            mode,
            config,
            stops,
            event_tx,
            event_rx,
        })
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// 各手臂的停止信号（在 `run()` 之前获取）
    pub fn stop_handles(&self) -> Vec<(ArmSide, StopHandle)> {
        self.stops.clone()
    }

    pub fn stop_all(&self) {
        for (_, stop) in &self.stops {
            stop.stop();
        }
    }

    /// 事件接收端
    pub fn events(&self) -> Receiver<SupervisorEvent> {
        self.event_rx.clone()
    }

    /// 运行所有服务，直到全部结束
    pub fn run(self, factory: &dyn AgentFactory) -> Result<SupervisorReport, SupervisorError> {
        let stop_for = |side: ArmSide| {
            self.stops
                .iter()
                .find(|(arm, _)| *arm == side)
                .map(|(_, stop)| stop.clone())
                .unwrap_or_default()
        };

        match &self.mode {
            Mode::Unimanual(endpoint) => {
                let outcome = run_arm(
                    ArmSide::Single,
                    endpoint,
                    &self.config,
                    stop_for(ArmSide::Single),
                    factory,
                    &self.event_tx,
                );
                Ok(SupervisorReport {
                    outcomes: vec![(ArmSide::Single, outcome)],
                })
            },
            Mode::Bimanual { left, right } => {
                let left_stop = stop_for(ArmSide::Left);
                let right_stop = stop_for(ArmSide::Right);
                let config = &self.config;
                let events = &self.event_tx;

                thread::scope(|scope| {
                    let left_thread = thread::Builder::new()
                        .name(ArmSide::Left.thread_name().to_string())
                        .spawn_scoped(scope, {
                            let stop = left_stop.clone();
                            move || run_arm(ArmSide::Left, left, config, stop, factory, events)
                        })
                        .map_err(SupervisorError::Spawn)?;

                    let right_thread = match thread::Builder::new()
                        .name(ArmSide::Right.thread_name().to_string())
                        .spawn_scoped(scope, {
                            let stop = right_stop.clone();
                            move || run_arm(ArmSide::Right, right, config, stop, factory, events)
                        }) {
                        Ok(handle) => handle,
                        Err(e) => {
                            left_stop.stop();
                            let _ = left_thread.join();
                            return Err(SupervisorError::Spawn(e));
                        },
                    };

                    let left_outcome = join_arm(ArmSide::Left, left_thread, events);
                    let right_outcome = join_arm(ArmSide::Right, right_thread, events);

                    Ok(SupervisorReport {
                        outcomes: vec![
                            (ArmSide::Left, left_outcome),
                            (ArmSide::Right, right_outcome),
                        ],
                    })
                })
            },
        }
    }
}

/// 在当前线程上构建 Agent 并运行服务
fn run_arm(
    side: ArmSide,
    endpoint: &ArmEndpoint,
    config: &ServerConfig,
    stop: StopHandle,
    factory: &dyn AgentFactory,
    events: &Sender<SupervisorEvent>,
) -> ArmOutcome {
    let failed = |error: ServerError| {
        error!(arm = %side, identifier = %endpoint.identifier, error = %error, "Arm server failed");
        let _ = events.send(SupervisorEvent::Failed {
            arm: side,
            reason: error.to_string(),
        });
        ArmOutcome::Failed(error)
    };

    let agent = match factory.create(side, endpoint) {
        Ok(agent) => agent,
        Err(e) => return failed(ServerError::Driver(e)),
    };

    let mut server =
        CommandServer::with_stop_handle(config.with_port(endpoint.port), agent, stop);
    let addr = match server.bind() {
        Ok(addr) => addr,
        Err(e) => return failed(e),
    };
    info!(arm = %side, identifier = %endpoint.identifier, %addr, "Arm server bound");
    let _ = events.send(SupervisorEvent::Bound { arm: side, addr });

    match server.serve() {
        Ok(()) => {
            let _ = events.send(SupervisorEvent::Stopped { arm: side });
            ArmOutcome::Stopped
        },
        Err(e) => failed(e),
    }
}

fn join_arm(
    side: ArmSide,
    handle: thread::ScopedJoinHandle<'_, ArmOutcome>,
    events: &Sender<SupervisorEvent>,
) -> ArmOutcome {
    handle.join().unwrap_or_else(|_| {
        error!(arm = %side, "Arm server thread panicked");
        let _ = events.send(SupervisorEvent::Failed {
            arm: side,
            reason: "server thread panicked".to_string(),
        });
        ArmOutcome::Panicked
    })
}
