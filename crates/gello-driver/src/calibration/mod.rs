//! # 标定
//!
//! 标定记录把电机编码器原始角度映射到规范关节角：
//!
//! ```text
//! joint_i  = (raw_i - offset_i) * sign_i
//! gripper  = (deg(raw_g) - open) / (closed - open), 限幅到 [0, 1]
//! ```
//!
//! 记录由标定流程生成，以设备标识为键持久化，构造 Agent 时只读加载，之后不再修改。

pub mod procedure;
pub mod store;

pub use procedure::{CalibrationReport, CalibrationRequest};
pub use store::{CalibrationStore, CalibrationStoreConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

/// 标定错误
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// 标定记录违反长度/取值约束
    #[error("Invalid calibration: {0}")]
    ConfigValidation(String),

    /// 该设备没有标定记录
    #[error("No calibration stored for '{identifier}' (expected at {})", path.display())]
    NotFound { identifier: String, path: PathBuf },

    /// 文件内容无法解析
    #[error("Failed to parse calibration file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// 文件读写失败
    #[error("Calibration IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// 夹爪标定：`(gripper_joint_id, open_angle_degrees, closed_angle_degrees)`
///
/// 序列化为三元素数组，例如 `[8, 198, 148]`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GripperConfig(u32, f64, f64);

impl GripperConfig {
    pub fn new(joint_id: u32, open_degrees: f64, closed_degrees: f64) -> Self {
        Self(joint_id, open_degrees, closed_degrees)
    }

    pub fn joint_id(&self) -> u32 {
        self.0
    }

    pub fn open_degrees(&self) -> f64 {
        self.1
    }

    pub fn closed_degrees(&self) -> f64 {
        self.2
    }

    /// 原始角度（弧度）→ 归一化开合量，0 张开，1 闭合
    pub fn normalize(&self, raw: f64) -> f64 {
        let g = (raw.to_degrees() - self.1) / (self.2 - self.1);
        g.clamp(0.0, 1.0)
    }

    /// 归一化开合量 → 原始角度（弧度）
    pub fn denormalize(&self, g: f64) -> f64 {
        let g = g.clamp(0.0, 1.0);
        (self.1 + g * (self.2 - self.1)).to_radians()
    }
}

/// 标定记录
///
/// 字段私有：只能通过 [`CalibrationRecord::new`] 或反序列化创建，两者都会校验约束。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCalibrationRecord")]
pub struct CalibrationRecord {
    joint_ids: Vec<u32>,
    joint_offsets: Vec<f64>,
    joint_signs: Vec<i8>,
    gripper_config: GripperConfig,
}

/// 未校验的记录（文件中的原始形态）
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCalibrationRecord {
    joint_ids: Vec<u32>,
    joint_offsets: Vec<f64>,
    joint_signs: Vec<i8>,
    gripper_config: GripperConfig,
}

impl TryFrom<RawCalibrationRecord> for CalibrationRecord {
    type Error = CalibrationError;

    fn try_from(raw: RawCalibrationRecord) -> Result<Self, Self::Error> {
        CalibrationRecord::new(
            raw.joint_ids,
            raw.joint_offsets,
            raw.joint_signs,
            raw.gripper_config,
        )
    }
}

impl CalibrationRecord {
    /// 创建并校验标定记录
    ///
    /// # 错误
    /// - 三个关节序列长度不一致或为空
    /// - 符号不是 ±1
    /// - 关节 ID 重复或与夹爪 ID 冲突
    /// - 偏置不是有限值
    /// - 夹爪张开/闭合角度相同
    ///
    /// 偏置建议为 π/2 的整数倍，但标定流程保存的是精确值，这里不强制。
    pub fn new(
        joint_ids: Vec<u32>,
        joint_offsets: Vec<f64>,
        joint_signs: Vec<i8>,
        gripper_config: GripperConfig,
    ) -> Result<Self, CalibrationError> {
        let n = joint_ids.len();
        if n == 0 {
            return Err(CalibrationError::ConfigValidation(
                "joint_ids must not be empty".to_string(),
            ));
        }
        if joint_offsets.len() != n || joint_signs.len() != n {
            return Err(CalibrationError::ConfigValidation(format!(
                "length mismatch: {} joint_ids, {} joint_offsets, {} joint_signs",
                n,
                joint_offsets.len(),
                joint_signs.len()
            )));
        }
        if let Some((idx, sign)) = joint_signs
            .iter()
            .enumerate()
            .find(|(_, s)| **s != 1 && **s != -1)
        {
            return Err(CalibrationError::ConfigValidation(format!(
                "joint {} sign should be -1 or 1, but got {}",
                idx, sign
            )));
        }
        if let Some((idx, _)) = joint_offsets.iter().enumerate().find(|(_, o)| !o.is_finite()) {
            return Err(CalibrationError::ConfigValidation(format!(
                "joint {} offset is not finite",
                idx
            )));
        }

        let mut seen = HashSet::with_capacity(n + 1);
        for id in joint_ids.iter().chain(std::iter::once(&gripper_config.joint_id())) {
            if !seen.insert(*id) {
                return Err(CalibrationError::ConfigValidation(format!(
                    "motor id {} is used more than once",
                    id
                )));
            }
        }

        let (open, closed) = (gripper_config.open_degrees(), gripper_config.closed_degrees());
        if !open.is_finite() || !closed.is_finite() || open == closed {
            return Err(CalibrationError::ConfigValidation(format!(
                "gripper open ({}) and closed ({}) angles must be finite and distinct",
                open, closed
            )));
        }

        Ok(Self {
            joint_ids,
            joint_offsets,
            joint_signs,
            gripper_config,
        })
    }

    /// 手臂关节数（不含夹爪）
    pub fn num_joints(&self) -> usize {
        self.joint_ids.len()
    }

    pub fn joint_ids(&self) -> &[u32] {
        &self.joint_ids
    }

    pub fn joint_offsets(&self) -> &[f64] {
        &self.joint_offsets
    }

    pub fn joint_signs(&self) -> &[i8] {
        &self.joint_signs
    }

    pub fn gripper_config(&self) -> GripperConfig {
        self.gripper_config
    }

    /// 总线读写顺序：手臂关节 + 夹爪
    pub fn motor_ids(&self) -> Vec<u32> {
        let mut ids = self.joint_ids.clone();
        ids.push(self.gripper_config.joint_id());
        ids
    }
}
