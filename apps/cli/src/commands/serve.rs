//! 中继服务命令
//!
//! 配置优先级：命令行参数 > 配置文件 > 默认值

use crate::devices;
use anyhow::{Context, Result};
use clap::Args;
use gello_driver::{CalibrationStore, DriverError};
use gello_relay::{
    Agent, ArmEndpoint, ArmOutcome, ArmSide, InvalidMethodPolicy, ModeKind, RelayConfig,
    Supervisor,
};
use std::path::PathBuf;
use tracing::{info, warn};

/// 服务命令参数
#[derive(Args, Debug, Default)]
pub struct ServeCommand {
    /// TOML 配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 运行模式（unimanual / bimanual）
    #[arg(long)]
    pub mode: Option<ModeKind>,

    /// 单臂设备路径
    #[arg(long)]
    pub hardware_port: Option<String>,

    /// 双臂左臂设备路径
    #[arg(long)]
    pub hardware_port_left: Option<String>,

    /// 双臂右臂设备路径
    #[arg(long)]
    pub hardware_port_right: Option<String>,

    /// 监听地址
    #[arg(long)]
    pub host: Option<String>,

    /// 单臂服务端口
    #[arg(long)]
    pub server_port: Option<u16>,

    /// 双臂左臂服务端口
    #[arg(long)]
    pub server_port_left: Option<u16>,

    /// 双臂右臂服务端口
    #[arg(long)]
    pub server_port_right: Option<u16>,

    /// 标定目录
    #[arg(long)]
    pub calibration_dir: Option<PathBuf>,

    /// 轮询间隔（毫秒）
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// 收到未知方法后应答错误并停止服务
    #[arg(long)]
    pub terminate_on_invalid_method: bool,

    /// 起始关节角（弧度，逗号分隔），用于对齐偏置的整圈数
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub start_joints: Option<Vec<f64>>,

    /// 使用模拟主臂
    #[arg(long)]
    pub simulate: bool,
}

impl ServeCommand {
    /// 合并配置文件与命令行参数
    pub fn resolve(&self) -> Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::load(path)
                .with_context(|| format!("加载配置文件失败: {}", path.display()))?,
            None => RelayConfig::default(),
        };

        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(port) = &self.hardware_port {
            config.hardware_port = port.clone();
        }
        if let Some(port) = &self.hardware_port_left {
            config.hardware_port_left = port.clone();
        }
        if let Some(port) = &self.hardware_port_right {
            config.hardware_port_right = port.clone();
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.server_port {
            config.server_port = port;
        }
        if let Some(port) = self.server_port_left {
            config.server_port_left = port;
        }
        if let Some(port) = self.server_port_right {
            config.server_port_right = port;
        }
        if let Some(dir) = &self.calibration_dir {
            config.calibration_dir = Some(dir.clone());
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if self.terminate_on_invalid_method {
            config.invalid_method_policy = InvalidMethodPolicy::Terminate;
        }

        config.validate()?;
        Ok(config)
    }

    /// 运行服务，阻塞直到所有手臂停止
    pub fn execute(&self) -> Result<()> {
        let config = self.resolve()?;
        let store = CalibrationStore::new(config.calibration_store_config());
        let connector = devices::connector(self.simulate);
        let start_joints = self.start_joints.as_deref();
        let simulate = self.simulate;

        let supervisor = Supervisor::new(config.mode(), config.server_config())?;
        let stops = supervisor.stop_handles();
        ctrlc::set_handler(move || {
            eprintln!("\nReceived interrupt signal. Shutting down...");
            for (_, stop) in &stops {
                stop.stop();
            }
        })
        .context("Failed to set signal handler")?;

        eprintln!("GELLO relay starting...");
        eprintln!("  Mode: {:?}", config.mode);
        for (side, endpoint) in config.mode().arms() {
            eprintln!(
                "  {}: {} -> tcp://{}:{}",
                side, endpoint.identifier, config.host, endpoint.port
            );
        }
        eprintln!("  Calibration: {}", store.directory().display());
        if simulate {
            eprintln!("  Devices: simulated");
        }

        let factory = |_: ArmSide, endpoint: &ArmEndpoint| -> Result<Agent, DriverError> {
            // 模拟设备没有真实路径：优先使用已保存的标定，否则使用默认标定
            let calibration = if simulate {
                if store.contains(&endpoint.identifier) {
                    Some(store.load(&endpoint.identifier)?)
                } else {
                    Some(devices::simulated_calibration()?)
                }
            } else {
                None
            };
            Agent::connect(
                &endpoint.identifier,
                calibration,
                &store,
                connector.as_ref(),
                start_joints,
            )
        };

        eprintln!("GELLO relay started. Press Ctrl+C to stop.");
        info!(mode = ?config.mode, host = %config.host, "Relay starting");
        let report = supervisor.run(&factory)?;

        let mut failed = 0;
        for (side, outcome) in &report.outcomes {
            match outcome {
                ArmOutcome::Stopped => {
                    info!(arm = %side, "Arm server stopped");
                    eprintln!("  {}: stopped", side);
                },
                ArmOutcome::Failed(e) => {
                    failed += 1;
                    warn!(arm = %side, error = %e, "Arm server failed");
                    eprintln!("  {}: failed: {}", side, e);
                },
                ArmOutcome::Panicked => {
                    failed += 1;
                    warn!(arm = %side, "Arm server thread panicked");
                    eprintln!("  {}: server thread panicked", side);
                },
            }
        }

        if failed > 0 {
            anyhow::bail!("{} arm server(s) failed", failed);
        }
        Ok(())
    }
}
