//! 测试辅助：模拟主臂与后台服务

#![allow(dead_code)]

use gello_driver::mock::{SimHandle, SimulatedConnector};
use gello_driver::{CalibrationRecord, CalibrationStore, CalibrationStoreConfig, GripperConfig};
use gello_relay::{Agent, CommandServer, ServerConfig, ServerError, StopHandle};
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

/// 六关节主臂的关节符号
pub const JOINT_SIGNS: [i8; 6] = [1, 1, -1, 1, 1, 1];

/// 六关节 + 夹爪（ID 7，张开 200°，闭合 158°）的标定
pub fn six_dof_record() -> CalibrationRecord {
    CalibrationRecord::new(
        vec![1, 2, 3, 4, 5, 6],
        vec![0.0; 6],
        JOINT_SIGNS.to_vec(),
        GripperConfig::new(7, 200.0, 158.0),
    )
    .unwrap()
}

/// 原始读数：六个关节角 + 夹爪角度（度）
pub fn raw_pose(joints: [f64; 6], gripper_degrees: f64) -> Vec<f64> {
    let mut pose = joints.to_vec();
    pose.push(gripper_degrees.to_radians());
    pose
}

/// 标定偏置为 0 时原始读数对应的关节角
pub fn expected_joints(joints: [f64; 6]) -> Vec<f64> {
    joints
        .iter()
        .zip(JOINT_SIGNS)
        .map(|(q, sign)| q * f64::from(sign))
        .collect()
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        poll_interval: Duration::from_millis(100),
        frame_timeout: Duration::from_secs(2),
        ..ServerConfig::default()
    }
}

pub fn sim_agent(connector: &SimulatedConnector, identifier: &str) -> Agent {
    let dir = TempDir::new().unwrap();
    let store = CalibrationStore::new(CalibrationStoreConfig::new(dir.path()));
    Agent::connect(identifier, Some(six_dof_record()), &store, connector, None).unwrap()
}

/// 在后台线程运行的服务
pub struct RunningServer {
    pub addr: SocketAddr,
    pub stop: StopHandle,
    pub sim: SimHandle,
    pub thread: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    pub fn start(config: ServerConfig, pose: Vec<f64>, noise: f64) -> Self {
        let connector = SimulatedConnector::new()
            .with_pose("sim-leader", pose)
            .with_noise(noise);
        let agent = sim_agent(&connector, "sim-leader");
        let sim = connector.handle("sim-leader").unwrap();

        let mut server = CommandServer::new(config, agent);
        let addr = server.bind().unwrap();
        let stop = server.stop_handle();
        let thread = thread::spawn(move || server.serve());

        Self {
            addr,
            stop,
            sim,
            thread,
        }
    }

    /// 停止并等待服务线程结束
    pub fn shutdown(self) -> Result<(), ServerError> {
        self.stop.stop();
        self.thread.join().unwrap()
    }
}
