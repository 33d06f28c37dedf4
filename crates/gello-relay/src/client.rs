//! 请求端客户端（从臂控制进程使用）

use crate::error::ClientError;
use gello_protocol::{
    ArmState, Method, RequestChannel, Request, Response, decode_payload, encode_payload,
};
use std::net::ToSocketAddrs;
use std::time::Duration;

/// 中继客户端
///
/// 每次调用都是一次完整的请求-应答；上一次调用超时后应丢弃客户端重新连接。
pub struct RelayClient {
    channel: RequestChannel,
}

impl RelayClient {
    /// 连接中继服务，`timeout` 同时作为连接与应答超时
    pub fn connect(addr: impl ToSocketAddrs, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            channel: RequestChannel::connect(addr, timeout)?,
        })
    }

    /// 发送任意请求并返回应答（错误应答原样返回）
    pub fn call(&mut self, request: &Request) -> Result<Response, ClientError> {
        let payload = encode_payload(request)?;
        self.channel.send(&payload)?;
        let reply = self.channel.recv()?;
        Ok(decode_payload(&reply)?)
    }

    /// 读取手臂关节状态（不含夹爪）
    pub fn get_joint_state(&mut self) -> Result<ArmState, ClientError> {
        match self.call(&Request::new(Method::GetJointState))? {
            Response::JointState(state) => Ok(state),
            Response::Error { error } => Err(ClientError::Server(error)),
            Response::GripperState(_) => Err(ClientError::UnexpectedResponse {
                method: Method::GetJointState.as_str(),
            }),
        }
    }

    /// 读取夹爪开合量（0 张开，1 闭合）
    pub fn get_gripper_state(&mut self) -> Result<f64, ClientError> {
        match self.call(&Request::new(Method::GetGripperState))? {
            Response::GripperState(values) if values.len() == 1 => Ok(values[0]),
            Response::Error { error } => Err(ClientError::Server(error)),
            _ => Err(ClientError::UnexpectedResponse {
                method: Method::GetGripperState.as_str(),
            }),
        }
    }
}
