//! 双臂隔离测试
//!
//! 验证双臂模式下：
//! 1. 两个服务各自应答自己的设备，交错请求没有串线
//! 2. 一侧设备故障或线程 panic 不影响另一侧

mod common;

use common::{expected_joints, raw_pose, six_dof_record, test_config};
use crossbeam_channel::Receiver;
use gello_driver::mock::SimulatedConnector;
use gello_driver::{CalibrationStore, CalibrationStoreConfig, DriverError};
use gello_relay::{
    Agent, ArmEndpoint, ArmOutcome, ArmSide, ClientError, Mode, RelayClient, ServerError,
    Supervisor, SupervisorEvent,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);
const LEFT_JOINTS: [f64; 6] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
const RIGHT_JOINTS: [f64; 6] = [-1.1, -1.2, -1.3, -1.4, -1.5, -1.6];

fn bimanual_mode() -> Mode {
    Mode::Bimanual {
        left: ArmEndpoint::new("left-leader", 0),
        right: ArmEndpoint::new("right-leader", 0),
    }
}

fn connector() -> SimulatedConnector {
    SimulatedConnector::new()
        .with_pose("left-leader", raw_pose(LEFT_JOINTS, 200.0))
        .with_pose("right-leader", raw_pose(RIGHT_JOINTS, 179.0))
}

/// 等待两侧的 Bound 事件
fn wait_bound(events: &Receiver<SupervisorEvent>) -> HashMap<ArmSide, SocketAddr> {
    let mut addrs = HashMap::new();
    while addrs.len() < 2 {
        match events.recv_timeout(Duration::from_secs(5)).unwrap() {
            SupervisorEvent::Bound { arm, addr } => {
                addrs.insert(arm, addr);
            },
            other => panic!("Unexpected event before both arms bound: {:?}", other),
        }
    }
    addrs
}

fn assert_joints(actual: &[f64], expected: [f64; 6]) {
    assert_eq!(actual.len(), 6);
    for (a, e) in actual.iter().zip(expected_joints(expected)) {
        assert!((a - e).abs() < 1e-9, "got {:?}, expected {:?}", actual, expected);
    }
}

#[test]
fn test_interleaved_requests_no_cross_talk() {
    let dir = TempDir::new().unwrap();
    let store = CalibrationStore::new(CalibrationStoreConfig::new(dir.path()));
    let connector = connector();
    let factory = |_: ArmSide, endpoint: &ArmEndpoint| -> Result<Agent, DriverError> {
        Agent::connect(&endpoint.identifier, Some(six_dof_record()), &store, &connector, None)
    };

    let supervisor = Supervisor::new(bimanual_mode(), test_config()).unwrap();
    let events = supervisor.events();
    let stops = supervisor.stop_handles();

    thread::scope(|scope| {
        let runner = scope.spawn(move || supervisor.run(&factory));
        let addrs = wait_bound(&events);
        assert_ne!(addrs[&ArmSide::Left], addrs[&ArmSide::Right]);

        let mut left = RelayClient::connect(addrs[&ArmSide::Left], CLIENT_TIMEOUT).unwrap();
        let mut right = RelayClient::connect(addrs[&ArmSide::Right], CLIENT_TIMEOUT).unwrap();

        for i in 0..120 {
            if i % 2 == 0 {
                assert_joints(&left.get_joint_state().unwrap().joint_pos, LEFT_JOINTS);
                assert!((right.get_gripper_state().unwrap() - 0.5).abs() < 1e-9);
            } else {
                assert_joints(&right.get_joint_state().unwrap().joint_pos, RIGHT_JOINTS);
                assert!(left.get_gripper_state().unwrap().abs() < 1e-9);
            }
        }

        for (_, stop) in &stops {
            stop.stop();
        }
        let report = runner.join().unwrap().unwrap();
        assert!(report.all_stopped());
    });
}

#[test]
fn test_concurrent_clients_on_both_arms() {
    let dir = TempDir::new().unwrap();
    let store = CalibrationStore::new(CalibrationStoreConfig::new(dir.path()));
    let connector = connector();
    let factory = |_: ArmSide, endpoint: &ArmEndpoint| -> Result<Agent, DriverError> {
        Agent::connect(&endpoint.identifier, Some(six_dof_record()), &store, &connector, None)
    };

    let supervisor = Supervisor::new(bimanual_mode(), test_config()).unwrap();
    let events = supervisor.events();
    let stops = supervisor.stop_handles();

    thread::scope(|scope| {
        let runner = scope.spawn(move || supervisor.run(&factory));
        let addrs = wait_bound(&events);

        let clients: Vec<_> = [
            (addrs[&ArmSide::Left], LEFT_JOINTS),
            (addrs[&ArmSide::Right], RIGHT_JOINTS),
        ]
        .into_iter()
        .map(|(addr, expected)| {
            scope.spawn(move || {
                let mut client = RelayClient::connect(addr, CLIENT_TIMEOUT).unwrap();
                for _ in 0..100 {
                    assert_joints(&client.get_joint_state().unwrap().joint_pos, expected);
                }
            })
        })
        .collect();

        for client in clients {
            client.join().unwrap();
        }

        for (_, stop) in &stops {
            stop.stop();
        }
        assert!(runner.join().unwrap().unwrap().all_stopped());
    });
}

#[test]
fn test_device_fault_isolated_to_one_arm() {
    let dir = TempDir::new().unwrap();
    let store = CalibrationStore::new(CalibrationStoreConfig::new(dir.path()));
    let connector = connector();
    let factory = |_: ArmSide, endpoint: &ArmEndpoint| -> Result<Agent, DriverError> {
        Agent::connect(&endpoint.identifier, Some(six_dof_record()), &store, &connector, None)
    };

    let supervisor = Supervisor::new(bimanual_mode(), test_config()).unwrap();
    let events = supervisor.events();
    let stops = supervisor.stop_handles();

    thread::scope(|scope| {
        let runner = scope.spawn(move || supervisor.run(&factory));
        let addrs = wait_bound(&events);

        let mut left = RelayClient::connect(addrs[&ArmSide::Left], CLIENT_TIMEOUT).unwrap();
        let mut right = RelayClient::connect(addrs[&ArmSide::Right], CLIENT_TIMEOUT).unwrap();
        left.get_joint_state().unwrap();

        connector.handle("left-leader").unwrap().fail_reads(true);
        assert!(matches!(left.get_joint_state(), Err(ClientError::Server(_))));

        match events.recv_timeout(Duration::from_secs(5)).unwrap() {
            SupervisorEvent::Failed { arm, .. } => assert_eq!(arm, ArmSide::Left),
            other => panic!("Expected left failure, got {:?}", other),
        }

        // 右臂继续服务
        for _ in 0..20 {
            assert_joints(&right.get_joint_state().unwrap().joint_pos, RIGHT_JOINTS);
        }

        for (_, stop) in &stops {
            stop.stop();
        }
        let report = runner.join().unwrap().unwrap();
        assert!(matches!(
            report.outcome(ArmSide::Left),
            Some(ArmOutcome::Failed(ServerError::Driver(_)))
        ));
        assert!(matches!(report.outcome(ArmSide::Right), Some(ArmOutcome::Stopped)));
    });
}

#[test]
fn test_panicking_arm_does_not_stop_the_other() {
    let dir = TempDir::new().unwrap();
    let store = CalibrationStore::new(CalibrationStoreConfig::new(dir.path()));
    let connector = connector();
    let factory = |side: ArmSide, endpoint: &ArmEndpoint| -> Result<Agent, DriverError> {
        if side == ArmSide::Right {
            panic!("right arm factory blew up");
        }
        Agent::connect(&endpoint.identifier, Some(six_dof_record()), &store, &connector, None)
    };

    let supervisor = Supervisor::new(bimanual_mode(), test_config()).unwrap();
    let events = supervisor.events();
    let stops = supervisor.stop_handles();

    thread::scope(|scope| {
        let runner = scope.spawn(move || supervisor.run(&factory));

        let addr = match events.recv_timeout(Duration::from_secs(5)).unwrap() {
            SupervisorEvent::Bound { arm, addr } => {
                assert_eq!(arm, ArmSide::Left);
                addr
            },
            other => panic!("Expected left bound, got {:?}", other),
        };

        let mut left = RelayClient::connect(addr, CLIENT_TIMEOUT).unwrap();
        for _ in 0..10 {
            assert_joints(&left.get_joint_state().unwrap().joint_pos, LEFT_JOINTS);
        }

        for (_, stop) in &stops {
            stop.stop();
        }
        let report = runner.join().unwrap().unwrap();
        assert!(matches!(report.outcome(ArmSide::Left), Some(ArmOutcome::Stopped)));
        assert!(matches!(report.outcome(ArmSide::Right), Some(ArmOutcome::Panicked)));
    });
}

#[test]
fn test_unimanual_runs_on_calling_thread() {
    let dir = TempDir::new().unwrap();
    let store = CalibrationStore::new(CalibrationStoreConfig::new(dir.path()));
    let connector = connector();
    let factory = |_: ArmSide, endpoint: &ArmEndpoint| -> Result<Agent, DriverError> {
        Agent::connect(&endpoint.identifier, Some(six_dof_record()), &store, &connector, None)
    };

    let supervisor = Supervisor::new(
        Mode::Unimanual(ArmEndpoint::new("left-leader", 0)),
        test_config(),
    )
    .unwrap();
    let events = supervisor.events();
    let stops = supervisor.stop_handles();
    assert_eq!(stops.len(), 1);

    thread::scope(|scope| {
        scope.spawn(|| {
            let addr = match events.recv_timeout(Duration::from_secs(5)).unwrap() {
                SupervisorEvent::Bound { arm, addr } => {
                    assert_eq!(arm, ArmSide::Single);
                    addr
                },
                other => panic!("Expected bound, got {:?}", other),
            };
            let mut client = RelayClient::connect(addr, CLIENT_TIMEOUT).unwrap();
            assert_joints(&client.get_joint_state().unwrap().joint_pos, LEFT_JOINTS);
            stops[0].1.stop();
        });

        let report = supervisor.run(&factory).unwrap();
        assert!(report.all_stopped());
    });
}
