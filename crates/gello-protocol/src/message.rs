//! 请求/响应消息定义
//!
//! 请求载荷是一个 JSON 对象 `{"method": ..., "args": {...}}`，`args` 目前保留未用。
//! 响应载荷按方法不同有三种形态：
//!
//! ```text
//! get_joint_state   -> {"joint_pos": [...], "joint_vel": null, "ee_pos": null, "ee_vel": null}
//! get_gripper_state -> [g]
//! 错误              -> {"error": "..."}
//! ```

use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// 中继服务支持的方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// 读取手臂关节位置（不含夹爪）
    GetJointState,
    /// 读取夹爪位置（单个标量）
    GetGripperState,
}

impl Method {
    /// 所有方法（按分发表顺序）
    pub const ALL: [Method; 2] = [Method::GetJointState, Method::GetGripperState];

    /// 线路上使用的方法名
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GetJointState => "get_joint_state",
            Method::GetGripperState => "get_gripper_state",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get_joint_state" => Ok(Method::GetJointState),
            "get_gripper_state" => Ok(Method::GetGripperState),
            other => Err(ProtocolError::InvalidMethod(other.to_string())),
        }
    }
}

/// 客户端请求
///
/// `method` 保持为原始字符串，以便服务端对未知方法给出带名字的错误应答。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl Request {
    /// 构造已知方法的请求
    pub fn new(method: Method) -> Self {
        Self::raw(method.as_str())
    }

    /// 构造任意方法名的请求
    pub fn raw(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args: Map::new(),
        }
    }

    /// 解析方法名
    pub fn method(&self) -> Result<Method, ProtocolError> {
        self.method.parse()
    }
}

/// 手臂状态
///
/// 目前只填充 `joint_pos`，其余字段保留给能提供速度/末端位姿的设备。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmState {
    /// 关节位置（弧度）
    pub joint_pos: Vec<f64>,
    /// 关节速度（rad/s）
    #[serde(default)]
    pub joint_vel: Option<Vec<f64>>,
    /// 末端位姿
    #[serde(default)]
    pub ee_pos: Option<Vec<f64>>,
    /// 末端速度
    #[serde(default)]
    pub ee_vel: Option<Vec<f64>>,
}

impl ArmState {
    /// 仅包含关节位置的状态
    pub fn from_joint_positions(joint_pos: Vec<f64>) -> Self {
        Self {
            joint_pos,
            joint_vel: None,
            ee_pos: None,
            ee_vel: None,
        }
    }
}

/// 服务端应答
///
/// 每个请求恰好对应一个应答。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    JointState(ArmState),
    GripperState(Vec<f64>),
    Error { error: String },
}

impl Response {
    /// 构造错误应答
    pub fn error(message: impl fmt::Display) -> Self {
        Response::Error {
            error: message.to_string(),
        }
    }

    /// 构造夹爪应答
    pub fn gripper(value: f64) -> Self {
        Response::GripperState(vec![value])
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}
