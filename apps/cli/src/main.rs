//! # GELLO Relay CLI
//!
//! 主臂状态中继的命令行入口。
//!
//! ```bash
//! # 单臂（默认 tcp://127.0.0.1:6000）
//! gello-relay serve --hardware-port /dev/serial/by-id/usb-FTDI_...-port0
//!
//! # 双臂（6000 / 6001）
//! gello-relay serve --mode bimanual
//!
//! # 无硬件演示
//! gello-relay serve --simulate
//!
//! # 标定
//! gello-relay calibrate --port /dev/serial/by-id/usb-FTDI_...-port0 \
//!     --start-joints 0,0,0,0,0,0 --joint-signs 1,1,-1,1,1,1
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod devices;

use commands::{CalibrateCommand, ServeCommand};

/// GELLO Relay - 主臂状态中继
#[derive(Parser, Debug)]
#[command(name = "gello-relay")]
#[command(about = "Relay GELLO leader-arm state over a request/reply socket", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动中继服务（单臂或双臂）
    Serve {
        #[command(flatten)]
        args: ServeCommand,
    },

    /// 标定主臂并保存偏置
    Calibrate {
        #[command(flatten)]
        args: CalibrateCommand,
    },
}

/// 默认日志过滤：`RUST_LOG` 之外，三个库 crate 都输出 info 级别
fn log_filter() -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive("gello_relay=info".parse()?)
        .add_directive("gello_driver=info".parse()?)
        .add_directive("gello_protocol=info".parse()?))
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt().with_env_filter(log_filter()?).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { args } => args.execute(),
        Commands::Calibrate { args } => args.execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_covers_library_crates() {
        let filter = log_filter().unwrap().to_string();
        for target in ["gello_relay=info", "gello_driver=info", "gello_protocol=info"] {
            assert!(filter.contains(target), "{} missing from {}", target, filter);
        }
    }
}
