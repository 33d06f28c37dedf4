//! 标定流程
//!
//! 把主臂摆到已知的起始位姿，读取各电机原始角度，反推关节偏置：
//!
//! ```text
//! offset_i = raw_i - sign_i * start_i
//! ```
//!
//! 同时给出最接近的 π/2 整数倍，便于人工核对。夹爪在张开状态下读取：
//! 张开角度 = 当前角度 - 0.2°，闭合角度 = 当前角度 - 42°。

use super::{CalibrationError, CalibrationRecord, GripperConfig};
use crate::session::{DeviceError, MotorBus};
use std::f64::consts::FRAC_PI_2;

/// 预热读取次数（丢弃总线刚打开时的不稳定读数）
pub const DEFAULT_WARMUP_READS: usize = 10;

/// 张开角度相对当前读数的余量（度）
const GRIPPER_OPEN_MARGIN_DEG: f64 = 0.2;

/// 闭合角度相对当前读数的行程（度）
const GRIPPER_CLOSED_TRAVEL_DEG: f64 = 42.0;

/// 标定参数
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRequest {
    start_joints: Vec<f64>,
    joint_signs: Vec<i8>,
    with_gripper: bool,
}

impl CalibrationRequest {
    pub fn new(
        start_joints: Vec<f64>,
        joint_signs: Vec<i8>,
        with_gripper: bool,
    ) -> Result<Self, CalibrationError> {
        if start_joints.is_empty() {
            return Err(CalibrationError::ConfigValidation(
                "start_joints must not be empty".to_string(),
            ));
        }
        if start_joints.len() != joint_signs.len() {
            return Err(CalibrationError::ConfigValidation(format!(
                "{} start joints but {} joint signs",
                start_joints.len(),
                joint_signs.len()
            )));
        }
        for (idx, sign) in joint_signs.iter().enumerate() {
            if *sign != 1 && *sign != -1 {
                return Err(CalibrationError::ConfigValidation(format!(
                    "Joint idx: {} should be -1 or 1, but got {}.",
                    idx, sign
                )));
            }
        }

        Ok(Self {
            start_joints,
            joint_signs,
            with_gripper,
        })
    }

    /// 手臂关节数
    pub fn num_robot_joints(&self) -> usize {
        self.start_joints.len()
    }

    /// 参与读取的电机数（含夹爪）
    pub fn num_motors(&self) -> usize {
        self.num_robot_joints() + usize::from(self.with_gripper)
    }

    /// 电机 ID：从 1 开始连续编号，夹爪排在最后
    pub fn motor_ids(&self) -> Vec<u32> {
        (1..=self.num_motors() as u32).collect()
    }

    pub fn joint_signs(&self) -> &[i8] {
        &self.joint_signs
    }

    /// 由原始读数计算标定结果
    pub fn compute(&self, readings: &[f64]) -> Result<CalibrationReport, CalibrationError> {
        if readings.len() != self.num_motors() {
            return Err(CalibrationError::ConfigValidation(format!(
                "expected {} motor readings, got {}",
                self.num_motors(),
                readings.len()
            )));
        }

        let n = self.num_robot_joints();
        let joint_positions = readings[..n].to_vec();
        let precise_offsets: Vec<f64> = joint_positions
            .iter()
            .zip(&self.start_joints)
            .zip(&self.joint_signs)
            .map(|((raw, start), sign)| raw - f64::from(*sign) * start)
            .collect();
        let quarter_turns = precise_offsets
            .iter()
            .map(|offset| (offset / FRAC_PI_2).round() as i64)
            .collect();

        let gripper = self.with_gripper.then(|| {
            let current = readings[n].to_degrees();
            GripperConfig::new(
                self.num_motors() as u32,
                (current - GRIPPER_OPEN_MARGIN_DEG).trunc(),
                (current - GRIPPER_CLOSED_TRAVEL_DEG).trunc(),
            )
        });

        Ok(CalibrationReport {
            joint_positions,
            precise_offsets,
            quarter_turns,
            joint_signs: self.joint_signs.clone(),
            gripper,
        })
    }
}

/// 标定结果
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    /// 手臂关节原始读数
    pub joint_positions: Vec<f64>,
    /// 精确偏置
    pub precise_offsets: Vec<f64>,
    /// 最接近的 π/2 倍数
    pub quarter_turns: Vec<i64>,
    pub joint_signs: Vec<i8>,
    pub gripper: Option<GripperConfig>,
}

impl CalibrationReport {
    /// 以 `k*π/2` 形式展示偏置
    pub fn quarter_turn_labels(&self) -> Vec<String> {
        self.quarter_turns
            .iter()
            .map(|k| format!("{}*π/2", k))
            .collect()
    }

    /// 生成标定记录（关节 ID 为 1..=N，保存精确偏置）
    ///
    /// 记录要求有夹爪配置；未启用夹爪时返回 `ConfigValidation`。
    pub fn into_record(self) -> Result<CalibrationRecord, CalibrationError> {
        let gripper = self.gripper.ok_or_else(|| {
            CalibrationError::ConfigValidation(
                "a calibration record requires a gripper configuration".to_string(),
            )
        })?;
        let joint_ids = (1..=self.precise_offsets.len() as u32).collect();
        CalibrationRecord::new(joint_ids, self.precise_offsets, self.joint_signs, gripper)
    }
}

/// 预热后读取一次原始角度
pub fn read_warm(bus: &mut dyn MotorBus, warmup: usize) -> Result<Vec<f64>, DeviceError> {
    for _ in 0..warmup {
        bus.read_positions()?;
    }
    bus.read_positions()
}
