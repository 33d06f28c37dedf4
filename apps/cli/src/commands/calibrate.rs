//! 标定命令
//!
//! 把主臂摆到起始位姿后运行，读取各电机原始角度，计算偏置并确认后保存。

use crate::devices;
use anyhow::{Context, Result};
use clap::Args;
use gello_driver::calibration::procedure::{DEFAULT_WARMUP_READS, read_warm};
use gello_driver::calibration::{CalibrationReport, CalibrationRequest};
use gello_driver::{CalibrationStore, CalibrationStoreConfig};
use std::path::PathBuf;
use tracing::info;

/// 标定命令参数
#[derive(Args, Debug)]
pub struct CalibrateCommand {
    /// 主臂设备路径
    #[arg(short, long)]
    pub port: String,

    /// 起始位姿关节角（弧度，逗号分隔）
    #[arg(
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        default_values_t = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
    )]
    pub start_joints: Vec<f64>,

    /// 关节符号（±1，逗号分隔）
    #[arg(
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        default_values_t = [1, 1, -1, 1, 1, 1]
    )]
    pub joint_signs: Vec<i8>,

    /// 主臂没有夹爪
    #[arg(long)]
    pub no_gripper: bool,

    /// 预热读取次数
    #[arg(long, default_value_t = DEFAULT_WARMUP_READS)]
    pub warmup: usize,

    /// 标定目录
    #[arg(long)]
    pub calibration_dir: Option<PathBuf>,

    /// 不询问，直接保存
    #[arg(short, long)]
    pub yes: bool,

    /// 使用模拟主臂
    #[arg(long)]
    pub simulate: bool,
}

impl CalibrateCommand {
    pub fn execute(&self) -> Result<()> {
        let request = CalibrationRequest::new(
            self.start_joints.clone(),
            self.joint_signs.clone(),
            !self.no_gripper,
        )?;

        let connector = devices::connector(self.simulate);
        let mut bus = connector
            .open(&self.port, &request.motor_ids())
            .with_context(|| format!("打开设备失败: {}", self.port))?;

        println!("📏 读取 {} 个电机...", request.num_motors());
        let readings = read_warm(&mut *bus, self.warmup)?;
        let report = request.compute(&readings)?;
        info!(port = %self.port, offsets = ?report.precise_offsets, "Calibration computed");
        print_report(&report);

        if report.gripper.is_none() {
            println!("⚠️  未标定夹爪，结果不会保存");
            return Ok(());
        }

        let confirmed = self.yes
            || inquire::Confirm::new("保存此标定？")
                .with_default(false)
                .prompt()
                .map_err(|e| anyhow::anyhow!("用户交互失败: {}", e))?;
        if !confirmed {
            println!("❌ 已取消");
            return Ok(());
        }

        let store = CalibrationStore::new(match &self.calibration_dir {
            Some(dir) => CalibrationStoreConfig::new(dir.clone()),
            None => CalibrationStoreConfig::default(),
        });
        let path = store.store(&report.into_record()?, &self.port)?;
        info!(port = %self.port, path = %path.display(), "Calibration saved");
        println!("✅ 标定已保存: {}", path.display());
        Ok(())
    }
}

fn print_report(report: &CalibrationReport) {
    println!();
    println!("joint positions  [{}]", format_values(&report.joint_positions));
    println!("joint signs      {:?}", report.joint_signs);
    println!("best offsets     [{}]", report.quarter_turn_labels().join(", "));
    println!("precise offsets  [{}]", format_values(&report.precise_offsets));
    if let Some(gripper) = report.gripper {
        println!(
            "gripper          id {}, open {}°, closed {}°",
            gripper.joint_id(),
            gripper.open_degrees(),
            gripper.closed_degrees()
        );
    }
    println!();
}

fn format_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{:.3}", v))
        .collect::<Vec<_>>()
        .join(", ")
}
