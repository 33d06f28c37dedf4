//! Mock 设备
//!
//! 用于测试和无硬件演示的模拟会话。每个模拟设备配一个可克隆的句柄，
//! 测试可以通过句柄修改读数、注入故障、检查下发的指令。

use crate::session::{
    ArmClient, DeviceError, GripperClient, GripperCommand, MotorBus, MotorBusConnector,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// ============================================================================
// Motor bus
// ============================================================================

#[derive(Debug, Default)]
struct BusState {
    positions: Vec<f64>,
    torque_enabled: bool,
    fail_reads: bool,
    reads: u64,
    writes: u64,
}

/// 模拟电机总线的控制句柄
#[derive(Debug, Clone, Default)]
pub struct SimHandle(Arc<Mutex<BusState>>);

impl SimHandle {
    /// 当前原始角度
    pub fn positions(&self) -> Vec<f64> {
        self.0.lock().positions.clone()
    }

    /// 替换原始角度（模拟手动拖动主臂）
    pub fn set_positions(&self, positions: Vec<f64>) {
        self.0.lock().positions = positions;
    }

    /// 让后续读取失败
    pub fn fail_reads(&self, fail: bool) {
        self.0.lock().fail_reads = fail;
    }

    pub fn torque_enabled(&self) -> bool {
        self.0.lock().torque_enabled
    }

    pub fn read_count(&self) -> u64 {
        self.0.lock().reads
    }

    pub fn write_count(&self) -> u64 {
        self.0.lock().writes
    }
}

/// 模拟电机总线
pub struct SimulatedMotorBus {
    ids: Vec<u32>,
    handle: SimHandle,
    noise: f64,
    rng: StdRng,
}

impl SimulatedMotorBus {
    pub fn new(ids: Vec<u32>, positions: Vec<f64>) -> Self {
        let handle = SimHandle::default();
        handle.set_positions(positions);
        Self {
            ids,
            handle,
            noise: 0.0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// 给每次读数叠加 `[-amplitude, amplitude]` 的均匀噪声
    pub fn with_noise(mut self, amplitude: f64, seed: u64) -> Self {
        self.noise = amplitude.abs();
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }
}

impl MotorBus for SimulatedMotorBus {
    fn motor_ids(&self) -> &[u32] {
        &self.ids
    }

    fn read_positions(&mut self) -> Result<Vec<f64>, DeviceError> {
        let mut state = self.handle.0.lock();
        state.reads += 1;
        if state.fail_reads {
            return Err(DeviceError::Io("simulated read failure".to_string()));
        }

        let mut positions = state.positions.clone();
        drop(state);

        if self.noise > 0.0 {
            for p in &mut positions {
                *p += self.rng.gen_range(-self.noise..=self.noise);
            }
        }
        Ok(positions)
    }

    fn write_positions(&mut self, positions: &[f64]) -> Result<(), DeviceError> {
        if positions.len() != self.ids.len() {
            return Err(DeviceError::InvalidResponse {
                expected: self.ids.len(),
                actual: positions.len(),
            });
        }
        let mut state = self.handle.0.lock();
        state.writes += 1;
        state.positions = positions.to_vec();
        Ok(())
    }

    fn set_torque_enabled(&mut self, enabled: bool) -> Result<(), DeviceError> {
        self.handle.0.lock().torque_enabled = enabled;
        Ok(())
    }
}

/// 模拟连接器：按设备标识打开模拟总线，并记录每个设备的句柄
#[derive(Default)]
pub struct SimulatedConnector {
    poses: Mutex<HashMap<String, Vec<f64>>>,
    handles: Mutex<HashMap<String, SimHandle>>,
    missing: Mutex<HashSet<String>>,
    noise: f64,
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置某个设备的原始角度（未预置的设备全部读数为 0）
    pub fn with_pose(self, identifier: impl Into<String>, positions: Vec<f64>) -> Self {
        self.poses.lock().insert(identifier.into(), positions);
        self
    }

    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise = amplitude.abs();
        self
    }

    /// 让某个设备在打开时报告不存在
    pub fn mark_missing(&self, identifier: impl Into<String>) {
        self.missing.lock().insert(identifier.into());
    }

    /// 已打开设备的句柄
    pub fn handle(&self, identifier: &str) -> Option<SimHandle> {
        self.handles.lock().get(identifier).cloned()
    }
}

impl MotorBusConnector for SimulatedConnector {
    fn open(
        &self,
        identifier: &str,
        motor_ids: &[u32],
    ) -> Result<Box<dyn MotorBus + Send>, DeviceError> {
        if self.missing.lock().contains(identifier) {
            return Err(DeviceError::NotFound(identifier.to_string()));
        }

        let positions = self
            .poses
            .lock()
            .get(identifier)
            .cloned()
            .unwrap_or_else(|| vec![0.0; motor_ids.len()]);

        let seed = identifier.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let bus = SimulatedMotorBus::new(motor_ids.to_vec(), positions).with_noise(self.noise, seed);
        self.handles
            .lock()
            .insert(identifier.to_string(), bus.handle());
        Ok(Box::new(bus))
    }
}

// ============================================================================
// Networked arm / gripper
// ============================================================================

#[derive(Debug, Default)]
struct ArmState {
    positions: Vec<f64>,
    connected: bool,
    fail_connect: bool,
}

/// 模拟网络手臂的控制句柄
#[derive(Debug, Clone, Default)]
pub struct ArmHandle(Arc<Mutex<ArmState>>);

impl ArmHandle {
    pub fn positions(&self) -> Vec<f64> {
        self.0.lock().positions.clone()
    }

    pub fn set_positions(&self, positions: Vec<f64>) {
        self.0.lock().positions = positions;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.0.lock().fail_connect = fail;
    }
}

/// 模拟网络手臂
#[derive(Debug, Default)]
pub struct SimulatedArm {
    handle: ArmHandle,
}

impl SimulatedArm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> ArmHandle {
        self.handle.clone()
    }
}

impl ArmClient for SimulatedArm {
    fn connect(&mut self) -> Result<(), DeviceError> {
        let mut state = self.handle.0.lock();
        if state.fail_connect {
            return Err(DeviceError::Io("connection refused".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    fn reset(&mut self, pose: &[f64]) -> Result<(), DeviceError> {
        self.apply_joint_positions(pose)
    }

    fn joint_positions(&mut self) -> Result<Vec<f64>, DeviceError> {
        let state = self.handle.0.lock();
        if !state.connected {
            return Err(DeviceError::NotConnected);
        }
        Ok(state.positions.clone())
    }

    fn apply_joint_positions(&mut self, positions: &[f64]) -> Result<(), DeviceError> {
        let mut state = self.handle.0.lock();
        if !state.connected {
            return Err(DeviceError::NotConnected);
        }
        state.positions = positions.to_vec();
        Ok(())
    }
}

#[derive(Debug, Default)]
struct GripperState {
    width: f64,
    connected: bool,
    last_command: Option<GripperCommand>,
}

/// 模拟夹爪的控制句柄
#[derive(Debug, Clone, Default)]
pub struct GripperHandle(Arc<Mutex<GripperState>>);

impl GripperHandle {
    pub fn set_width(&self, width: f64) {
        self.0.lock().width = width;
    }

    pub fn last_command(&self) -> Option<GripperCommand> {
        self.0.lock().last_command
    }
}

/// 模拟夹爪
#[derive(Debug, Default)]
pub struct SimulatedGripper {
    handle: GripperHandle,
}

impl SimulatedGripper {
    pub fn new(width: f64) -> Self {
        let gripper = Self::default();
        gripper.handle.set_width(width);
        gripper
    }

    pub fn handle(&self) -> GripperHandle {
        self.handle.clone()
    }
}

impl GripperClient for SimulatedGripper {
    fn connect(&mut self) -> Result<(), DeviceError> {
        self.handle.0.lock().connected = true;
        Ok(())
    }

    fn width(&mut self) -> Result<f64, DeviceError> {
        let state = self.handle.0.lock();
        if !state.connected {
            return Err(DeviceError::NotConnected);
        }
        Ok(state.width)
    }

    fn apply(&mut self, command: GripperCommand) -> Result<(), DeviceError> {
        let mut state = self.handle.0.lock();
        if !state.connected {
            return Err(DeviceError::NotConnected);
        }
        state.last_command = Some(command);
        Ok(())
    }
}
