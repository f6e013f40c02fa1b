//! 模拟设备
//!
//! 在进程内扮演链路另一端的机器人，用于演示程序和测试：
//!
//! - FSM 按合法转换表响应请求，非法请求被拒绝并计数
//! - LowLevelControl 下关节理想跟随（`q = q_des`），不做动力学
//! - 以 500Hz（或手动 [`SimRobot::step`]）发布反馈
//! - [`SimRobot::subscribe`] 可以旁路收到每条命令
//!
//! ```rust
//! use magic_driver::sim::{SimConfig, SimRobot};
//! use magic_driver::ExchangeChannel;
//!
//! let robot = SimRobot::new(SimConfig::default());
//! let exchange = robot.exchange();
//! assert!(!exchange.is_connected());
//! robot.step();
//! assert!(exchange.is_connected());
//! ```

use crate::channel::{CommandSink, Exchange, FeedbackSlot};
use crate::error::DriverError;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use magic_protocol::{
    DEVICE_PERIOD_SECS, DEVICE_RATE_HZ, FsmState, InputData, JOINT_COUNT, JointArray, MotorData,
    OutputData,
};
use parking_lot::Mutex;
use spin_sleep::SpinSleeper;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 趴下姿态（每条腿 HAA, HFE, KFE）
pub const LYING_POSTURE: [f32; 3] = [0.0, 1.3, -2.7];

/// 模拟设备参数
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// 上电时的 FSM 状态
    pub initial_state: FsmState,
    /// 上电时的关节位置
    pub initial_q: JointArray<f32>,
    /// 转换生效前需要经过的设备周期数（0 表示收到命令立即生效）
    pub transition_steps: u32,
    /// 每收到一条命令就立即发布一次反馈
    ///
    /// 同步测试中没有设备线程，依靠它让控制循环看到状态变化。
    pub publish_on_command: bool,
    /// 主机侧判定断线的超时
    pub connection_timeout: Duration,
    /// 旁路通道容量
    pub tap_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_state: FsmState::Passive,
            initial_q: JointArray::from_leg_pattern(LYING_POSTURE),
            transition_steps: 0,
            publish_on_command: true,
            connection_timeout: Duration::from_millis(100),
            tap_capacity: 4096,
        }
    }
}

#[derive(Debug)]
struct DeviceState {
    fsm: FsmState,
    pending: Option<(FsmState, u32)>,
    motor: MotorData,
    last_command: Option<OutputData>,
    timestamp_ns: i64,
}

/// 进程内模拟机器人
pub struct SimRobot {
    config: SimConfig,
    state: Mutex<DeviceState>,
    feedback: Arc<FeedbackSlot>,
    connected: AtomicBool,
    stuck: AtomicBool,
    taps: Mutex<Vec<Sender<OutputData>>>,
    commands_received: AtomicU64,
    rejected_transitions: AtomicU64,
}

impl SimRobot {
    pub fn new(config: SimConfig) -> Arc<Self> {
        let motor = MotorData {
            q: config.initial_q,
            ..Default::default()
        };
        let state = DeviceState {
            fsm: config.initial_state,
            pending: None,
            motor,
            last_command: None,
            timestamp_ns: 0,
        };
        Arc::new(Self {
            feedback: Arc::new(FeedbackSlot::new(config.connection_timeout)),
            state: Mutex::new(state),
            connected: AtomicBool::new(true),
            stuck: AtomicBool::new(false),
            taps: Mutex::new(Vec::new()),
            commands_received: AtomicU64::new(0),
            rejected_transitions: AtomicU64::new(0),
            config,
        })
    }

    /// 主机侧交换通道（接到本设备）
    pub fn exchange(self: &Arc<Self>) -> Exchange<SimLink> {
        Exchange::new(
            Arc::clone(&self.feedback),
            SimLink {
                robot: Arc::clone(self),
            },
        )
    }

    /// 订阅设备收到的命令
    pub fn subscribe(&self) -> Receiver<OutputData> {
        let (tx, rx) = crossbeam_channel::bounded(self.config.tap_capacity);
        self.taps.lock().push(tx);
        rx
    }

    /// 当前 FSM 状态
    pub fn fsm_state(&self) -> FsmState {
        self.state.lock().fsm
    }

    /// 当前关节反馈
    pub fn motor_data(&self) -> MotorData {
        self.state.lock().motor
    }

    pub fn last_command(&self) -> Option<OutputData> {
        self.state.lock().last_command
    }

    pub fn commands_received(&self) -> u64 {
        self.commands_received.load(Ordering::Relaxed)
    }

    /// 设备拒绝的非法转换请求数
    pub fn rejected_transitions(&self) -> u64 {
        self.rejected_transitions.load(Ordering::Relaxed)
    }

    /// 直接设置 FSM 状态（模拟遥控器或上一次会话留下的状态）
    pub fn force_state(&self, state: FsmState) {
        let mut device = self.state.lock();
        device.fsm = state;
        device.pending = None;
    }

    /// 冻结 FSM：之后的转换请求全部忽略
    pub fn set_stuck(&self, stuck: bool) {
        self.stuck.store(stuck, Ordering::Relaxed);
    }

    /// 模拟链路通断
    ///
    /// 断开时停止发布反馈，主机侧立即判定离线；命令发送返回错误。
    pub fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::Relaxed);
        if was && !connected {
            info!("Simulated link down");
            self.feedback.monitor().mark_lost();
        } else if !was && connected {
            info!("Simulated link up");
        }
    }

    pub fn is_link_up(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// 推进一个设备周期并发布反馈
    pub fn step(&self) {
        let snapshot = {
            let mut device = self.state.lock();
            if let Some((target, remaining)) = device.pending {
                if remaining <= 1 {
                    debug!("Simulated FSM {} -> {}", device.fsm, target);
                    device.fsm = target;
                    device.pending = None;
                } else {
                    device.pending = Some((target, remaining - 1));
                }
            }
            device.timestamp_ns += (DEVICE_PERIOD_SECS * 1e9) as i64;
            self.input_snapshot(&device)
        };
        self.publish(snapshot);
    }

    /// 在后台线程以设备频率运行 `step`
    pub fn spawn(self: &Arc<Self>) -> std::io::Result<SimThread> {
        self.spawn_with_rate(DEVICE_RATE_HZ)
    }

    pub fn spawn_with_rate(self: &Arc<Self>, rate_hz: f64) -> std::io::Result<SimThread> {
        let stop = Arc::new(AtomicBool::new(false));
        let robot = Arc::clone(self);
        let flag = Arc::clone(&stop);
        let period = Duration::from_secs_f64(1.0 / rate_hz);

        let handle = std::thread::Builder::new()
            .name("magic-sim".to_string())
            .spawn(move || {
                let sleeper = SpinSleeper::default();
                let mut next = Instant::now();
                while !flag.load(Ordering::Relaxed) {
                    robot.step();
                    next += period;
                    let now = Instant::now();
                    if next > now {
                        sleeper.sleep(next - now);
                    } else {
                        next = now;
                    }
                }
            })?;

        Ok(SimThread {
            stop,
            handle: Some(handle),
        })
    }

    fn apply_command(&self, cmd: &OutputData) -> Result<(), DriverError> {
        if !self.is_link_up() {
            return Err(DriverError::NotConnected);
        }
        self.commands_received.fetch_add(1, Ordering::Relaxed);

        let snapshot = {
            let mut device = self.state.lock();
            device.last_command = Some(*cmd);
            self.request_transition(&mut device, cmd.robot_fsm_cmd);

            if device.fsm == FsmState::LowLevelControl {
                let motor = &mut device.motor;
                let tau = cmd.motor_cmd.final_torque(motor);
                for i in 0..JOINT_COUNT {
                    if cmd.motor_cmd.kp[i] > 0.0 || cmd.motor_cmd.kd[i] > 0.0 {
                        motor.q[i] = cmd.motor_cmd.q_des[i];
                        motor.dq[i] = cmd.motor_cmd.dq_des[i];
                    }
                }
                motor.tau_est = tau;
            } else {
                device.motor.dq = JointArray::splat(0.0);
                device.motor.tau_est = JointArray::splat(0.0);
            }

            self.config.publish_on_command.then(|| self.input_snapshot(&device))
        };

        self.forward_to_taps(cmd);
        if let Some(snapshot) = snapshot {
            self.publish(snapshot);
        }
        Ok(())
    }

    fn request_transition(&self, device: &mut DeviceState, requested: FsmState) {
        if self.stuck.load(Ordering::Relaxed) || requested == device.fsm {
            return;
        }
        if matches!(device.pending, Some((target, _)) if target == requested) {
            return;
        }
        if !device.fsm.can_transition_to(requested) {
            self.rejected_transitions.fetch_add(1, Ordering::Relaxed);
            warn!("Simulated device rejected {} -> {}", device.fsm, requested);
            return;
        }
        if self.config.transition_steps == 0 {
            debug!("Simulated FSM {} -> {}", device.fsm, requested);
            device.fsm = requested;
            device.pending = None;
        } else {
            device.pending = Some((requested, self.config.transition_steps));
        }
    }

    fn input_snapshot(&self, device: &DeviceState) -> InputData {
        let mut input = InputData {
            robot_fsm_data: device.fsm.code(),
            motor_data: device.motor,
            ..Default::default()
        };
        input.imu_data.quat = [1.0, 0.0, 0.0, 0.0];
        input.imu_data.acc = [0.0, 0.0, 9.81];
        input.estimate_data.timestamp = device.timestamp_ns;
        input.estimate_data.quat = [0.0, 0.0, 0.0, 1.0];
        if device.fsm == FsmState::Trot {
            input.estimate_data.contact = [1.0; 4];
        }
        input
    }

    fn publish(&self, input: InputData) {
        if self.is_link_up() {
            self.feedback.publish(input);
        }
    }

    fn forward_to_taps(&self, cmd: &OutputData) {
        let mut taps = self.taps.lock();
        taps.retain(|tap| match tap.try_send(*cmd) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

/// 接到 [`SimRobot`] 的命令出口
#[derive(Clone)]
pub struct SimLink {
    robot: Arc<SimRobot>,
}

impl SimLink {
    pub fn robot(&self) -> &Arc<SimRobot> {
        &self.robot
    }
}

impl CommandSink for SimLink {
    fn publish(&self, cmd: &OutputData) -> Result<(), DriverError> {
        self.robot.apply_command(cmd)
    }
}

/// 后台设备线程句柄，`stop()` 或 drop 时停止并 join
pub struct SimThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimThread {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Simulated device thread panicked");
        }
    }
}

impl Drop for SimThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ExchangeChannel;
    use magic_protocol::MotorCmd;

    #[test]
    fn test_offline_until_first_step() {
        let robot = SimRobot::new(SimConfig::default());
        let exchange = robot.exchange();
        assert!(!exchange.is_connected());
        robot.step();
        assert!(exchange.is_connected());
        let telemetry = exchange.receive_telemetry();
        assert_eq!(telemetry.data.fsm_state(), Ok(FsmState::Passive));
    }

    #[test]
    fn test_legal_transition_applied() {
        let robot = SimRobot::new(SimConfig::default());
        let exchange = robot.exchange();
        robot.step();

        exchange.send_command(&OutputData::fsm(FsmState::RecoveryStand)).unwrap();
        assert_eq!(robot.fsm_state(), FsmState::RecoveryStand);
        assert_eq!(
            exchange.receive_telemetry().data.robot_fsm_data,
            FsmState::RecoveryStand.code()
        );
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let robot = SimRobot::new(SimConfig::default());
        robot.force_state(FsmState::Trot);
        let exchange = robot.exchange();

        exchange.send_command(&OutputData::fsm(FsmState::RecoveryStand)).unwrap();
        assert_eq!(robot.fsm_state(), FsmState::Trot);
        assert_eq!(robot.rejected_transitions(), 1);
    }

    #[test]
    fn test_transition_delay() {
        let robot = SimRobot::new(SimConfig {
            transition_steps: 3,
            ..Default::default()
        });
        let exchange = robot.exchange();
        exchange.send_command(&OutputData::fsm(FsmState::LowLevelControl)).unwrap();
        assert_eq!(robot.fsm_state(), FsmState::Passive);
        robot.step();
        robot.step();
        assert_eq!(robot.fsm_state(), FsmState::Passive);
        robot.step();
        assert_eq!(robot.fsm_state(), FsmState::LowLevelControl);
    }

    #[test]
    fn test_joint_echo_in_low_level() {
        let robot = SimRobot::new(SimConfig::default());
        robot.force_state(FsmState::LowLevelControl);
        let exchange = robot.exchange();

        let target = JointArray::from_leg_pattern([0.0, 1.0477, -2.0944]);
        let cmd = OutputData::fsm(FsmState::LowLevelControl)
            .with_motor(MotorCmd::position(target, 100.0, 1.2));
        exchange.send_command(&cmd).unwrap();

        let telemetry = exchange.receive_telemetry();
        assert_eq!(telemetry.data.motor_data.q, target);
        assert!(telemetry.data.estimate().is_none());
    }

    #[test]
    fn test_joints_hold_outside_low_level() {
        let robot = SimRobot::new(SimConfig::default());
        let exchange = robot.exchange();
        let cmd = OutputData::fsm(FsmState::Passive)
            .with_motor(MotorCmd::position(JointArray::splat(0.5), 100.0, 1.2));
        exchange.send_command(&cmd).unwrap();
        assert_eq!(robot.motor_data().q, JointArray::from_leg_pattern(LYING_POSTURE));
    }

    #[test]
    fn test_link_down() {
        let robot = SimRobot::new(SimConfig::default());
        let exchange = robot.exchange();
        robot.step();
        assert!(exchange.is_connected());

        robot.set_connected(false);
        assert!(!exchange.is_connected());
        assert!(matches!(
            exchange.send_command(&OutputData::default()),
            Err(DriverError::NotConnected)
        ));
        robot.step();
        assert!(!exchange.is_connected());

        robot.set_connected(true);
        robot.step();
        assert!(exchange.is_connected());
    }

    #[test]
    fn test_command_tap() {
        let robot = SimRobot::new(SimConfig::default());
        let rx = robot.subscribe();
        let exchange = robot.exchange();
        exchange.send_command(&OutputData::fsm(FsmState::RecoveryStand)).unwrap();
        assert_eq!(rx.try_recv().unwrap().robot_fsm_cmd, FsmState::RecoveryStand);
    }

    #[test]
    fn test_background_thread_publishes() {
        let robot = SimRobot::new(SimConfig::default());
        let exchange = robot.exchange();
        let thread = robot.spawn().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!(exchange.is_connected());
        let first = exchange.receive_telemetry().sequence;
        std::thread::sleep(Duration::from_millis(10));
        assert!(exchange.receive_telemetry().sequence > first);
        thread.stop();
    }
}
