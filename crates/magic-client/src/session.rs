//! 会话层接口
//!
//! RPC 会话和高层运动服务只以 trait 的形式出现在这里：
//! [`RobotSession`] 负责初始化、连接、控制层级切换和各能力对象的访问，
//! [`HighLevelMotion`] 负责步态、特技和摇杆命令。其余能力见 [`crate::capability`]。
//!
//! 远端调用的结果统一用 [`Status`] 表示，`Status::into_result()`
//! 把非 OK 的状态码转换为 [`SessionError`]。
//!
//! [`SimSession`] / [`SimHighLevelMotion`] 是进程内实现，记录所有调用，
//! 用于演示程序和测试。

use crate::capability::{Audio, Capability, FaceDisplay, LowLevelMotion, Sensors, SimLowLevelMotion, StateMonitor};
use crate::teleop::JoystickCommand;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// 远端调用状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    /// 服务未就绪
    ServiceNotReady = 1,
    /// 调用超时
    Timeout = 2,
    /// 内部错误
    InternalError = 3,
    /// 服务端错误
    ServiceError = 4,
}

/// 远端调用结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: ErrorCode,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Status {
            code: ErrorCode::Ok,
            message: String::new(),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Status {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::Ok
    }

    pub fn into_result(self) -> Result<(), SessionError> {
        let Status { code, message } = self;
        match code {
            ErrorCode::Ok => Ok(()),
            ErrorCode::ServiceNotReady => Err(SessionError::ServiceNotReady(message)),
            ErrorCode::Timeout => Err(SessionError::Timeout(message)),
            ErrorCode::InternalError => Err(SessionError::Internal(message)),
            ErrorCode::ServiceError => Err(SessionError::Service(message)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code: {}, message: {}", i32::from(self.code), self.message)
    }
}

/// 会话层错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Service not ready: {0}")]
    ServiceNotReady(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service error: {0}")]
    Service(String),

    /// 步态切换后在超时时间内未生效
    #[error("Gait did not switch to {target:?} within {waited:?} (last reported {reported:?})")]
    GaitTimeout {
        target: GaitMode,
        reported: GaitMode,
        waited: Duration,
    },
}

impl SessionError {
    /// 重试是否可能成功
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::ServiceNotReady(_) | SessionError::Timeout(_) | SessionError::GaitTimeout { .. }
        )
    }
}

/// 运动控制层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(i8)]
pub enum ControllerLevel {
    Unknown = 0,
    /// 高层控制（步态、特技、摇杆）
    HighLevel = 1,
    /// 底层控制（关节级）
    LowLevel = 2,
}

/// 高层步态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(i32)]
pub enum GaitMode {
    /// 电机失能
    Passive = 0,
    /// 位控站立（RecoveryStand）
    StandR = 2,
    /// 力控站立（BalanceStand）
    StandB = 3,
    RunFast = 8,
    /// 下楼梯，也用作摇杆行走步态
    DownClimbStairs = 9,
    Trot = 10,
    Pronk = 11,
    Bound = 12,
    Amble = 14,
    Crawl = 29,
    LowLevelSdk = 30,
    Walk = 39,
    UpClimbStairs = 56,
    RlTerrain = 110,
    RlFallRecovery = 111,
    RlHandStand = 112,
    RlFootStand = 113,
    EnterRl = 1001,
    DefaultGait = 99,
    /// 无步态
    NoGait = 9999,
}

/// 高层特技动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(i32)]
pub enum TrickAction {
    NoAction = 0,
    WiggleHip = 26,
    SwingBody = 27,
    Stretch = 28,
    Stomp = 29,
    JumpJack = 30,
    SpaceWalk = 31,
    Imitate = 32,
    ShakeHead = 33,
    PushUp = 34,
    CheerUp = 35,
    HighFives = 36,
    Scratch = 37,
    HighJump = 38,
    SwingDance = 39,
    LeapFrog = 40,
    BackFlip = 41,
    FrontFlip = 42,
    SpinJumpLeft = 43,
    SpinJumpRight = 44,
    JumpFront = 45,
    ActCute = 46,
    Boxing = 47,
    SideSomersault = 48,
    RandomDance = 49,
    LeftSideSomersault = 84,
    RightSideSomersault = 85,
    Dance2 = 91,
    EmergencyStop = 101,
    LieDown = 102,
    RecoveryStand = 103,
    HappyNewYear = 105,
    SlowGoFront = 108,
    SlowGoBack = 109,
    BackHome = 110,
    LeaveHome = 111,
    TurnAround = 112,
    Dance = 115,
    RollAbout = 116,
    ShakeRightHand = 117,
    ShakeLeftHand = 118,
    SitDown = 119,
}

/// 高层运动服务
///
/// 摇杆命令由独立线程发送，因此要求 `Send + Sync`。
pub trait HighLevelMotion: Send + Sync {
    fn set_gait(&self, gait: GaitMode) -> Status;

    /// 查询当前步态
    fn get_gait(&self) -> Result<GaitMode, SessionError>;

    fn execute_trick(&self, action: TrickAction) -> Status;

    fn send_joystick_command(&self, command: &JoystickCommand) -> Status;
}

impl<M: HighLevelMotion + ?Sized> HighLevelMotion for Arc<M> {
    fn set_gait(&self, gait: GaitMode) -> Status {
        (**self).set_gait(gait)
    }

    fn get_gait(&self) -> Result<GaitMode, SessionError> {
        (**self).get_gait()
    }

    fn execute_trick(&self, action: TrickAction) -> Status {
        (**self).execute_trick(action)
    }

    fn send_joystick_command(&self, command: &JoystickCommand) -> Status {
        (**self).send_joystick_command(command)
    }
}

/// 机器人会话
///
/// 能力对象由会话持有，各自独立 `initialize()` / `shutdown()`；
/// 会话 `shutdown()` 时关闭所有能力对象并移除它们的回调。
pub trait RobotSession {
    type Motion: HighLevelMotion + Capability;
    type LowLevel: LowLevelMotion;

    /// 绑定本机网卡地址（与机器人直连的那块）
    fn initialize(&mut self, local_ip: &str) -> bool;

    /// 远端调用超时
    fn set_timeout(&mut self, timeout_ms: u64);

    fn connect(&mut self) -> Status;

    fn disconnect(&mut self) -> Status;

    fn set_motion_control_level(&mut self, level: ControllerLevel) -> Status;

    /// 高层运动服务句柄
    fn high_level_motion(&self) -> Arc<Self::Motion>;

    /// 底层运动服务句柄
    fn low_level_motion(&self) -> Arc<Self::LowLevel>;

    /// 音频服务（`None` 表示该会话不提供）
    fn audio(&self) -> Option<Arc<dyn Audio>> {
        None
    }

    fn sensors(&self) -> Option<Arc<dyn Sensors>> {
        None
    }

    fn display(&self) -> Option<Arc<dyn FaceDisplay>> {
        None
    }

    fn state_monitor(&self) -> Option<Arc<dyn StateMonitor>> {
        None
    }

    /// 释放所有资源，之后需要重新 `initialize()`
    fn shutdown(&mut self);
}

#[derive(Debug)]
struct SimMotionState {
    gait: GaitMode,
    pending: Option<(GaitMode, Instant)>,
    gait_requests: Vec<GaitMode>,
    tricks: Vec<TrickAction>,
    last_joystick: Option<JoystickCommand>,
    joystick_count: u64,
}

/// 进程内高层运动服务
///
/// 步态切换在 `gait_switch_delay` 之后才在 `get_gait()` 中生效。
#[derive(Debug)]
pub struct SimHighLevelMotion {
    state: Mutex<SimMotionState>,
    gait_switch_delay: Duration,
    available: AtomicBool,
}

impl Default for SimHighLevelMotion {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHighLevelMotion {
    pub fn new() -> Self {
        Self::with_gait_switch_delay(Duration::ZERO)
    }

    pub fn with_gait_switch_delay(delay: Duration) -> Self {
        SimHighLevelMotion {
            state: Mutex::new(SimMotionState {
                gait: GaitMode::Passive,
                pending: None,
                gait_requests: Vec::new(),
                tricks: Vec::new(),
                last_joystick: None,
                joystick_count: 0,
            }),
            gait_switch_delay: delay,
            available: AtomicBool::new(true),
        }
    }

    /// 模拟服务不可用（所有调用返回 ServiceNotReady）
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn gait_requests(&self) -> Vec<GaitMode> {
        self.state.lock().gait_requests.clone()
    }

    pub fn tricks(&self) -> Vec<TrickAction> {
        self.state.lock().tricks.clone()
    }

    pub fn last_joystick(&self) -> Option<JoystickCommand> {
        self.state.lock().last_joystick
    }

    pub fn joystick_count(&self) -> u64 {
        self.state.lock().joystick_count
    }

    fn unavailable(&self) -> Option<Status> {
        if self.available.load(Ordering::Acquire) {
            None
        } else {
            Some(Status::error(ErrorCode::ServiceNotReady, "motion service unavailable"))
        }
    }
}

impl Capability for SimHighLevelMotion {
    fn initialize(&self) -> bool {
        self.set_available(true);
        true
    }

    fn shutdown(&self) {
        self.set_available(false);
    }
}

impl HighLevelMotion for SimHighLevelMotion {
    fn set_gait(&self, gait: GaitMode) -> Status {
        if let Some(status) = self.unavailable() {
            return status;
        }
        let mut state = self.state.lock();
        state.gait_requests.push(gait);
        if self.gait_switch_delay.is_zero() {
            state.gait = gait;
            state.pending = None;
        } else {
            state.pending = Some((gait, Instant::now() + self.gait_switch_delay));
        }
        debug!("sim gait request {:?}", gait);
        Status::ok()
    }

    fn get_gait(&self) -> Result<GaitMode, SessionError> {
        if let Some(status) = self.unavailable() {
            status.into_result()?;
        }
        let mut state = self.state.lock();
        if let Some((gait, due)) = state.pending
            && Instant::now() >= due
        {
            state.gait = gait;
            state.pending = None;
        }
        Ok(state.gait)
    }

    fn execute_trick(&self, action: TrickAction) -> Status {
        if let Some(status) = self.unavailable() {
            return status;
        }
        self.state.lock().tricks.push(action);
        Status::ok()
    }

    fn send_joystick_command(&self, command: &JoystickCommand) -> Status {
        if let Some(status) = self.unavailable() {
            return status;
        }
        let mut state = self.state.lock();
        state.last_joystick = Some(*command);
        state.joystick_count += 1;
        Status::ok()
    }
}

/// 进程内机器人会话
#[derive(Debug)]
pub struct SimSession {
    motion: Arc<SimHighLevelMotion>,
    low_level: Arc<SimLowLevelMotion>,
    local_ip: Option<String>,
    timeout_ms: u64,
    connected: bool,
    level: ControllerLevel,
}

impl SimSession {
    pub fn new(motion: Arc<SimHighLevelMotion>) -> Self {
        SimSession {
            motion,
            low_level: Arc::new(SimLowLevelMotion::new()),
            local_ip: None,
            timeout_ms: 5000,
            connected: false,
            level: ControllerLevel::Unknown,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn level(&self) -> ControllerLevel {
        self.level
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }
}

impl RobotSession for SimSession {
    type Motion = SimHighLevelMotion;
    type LowLevel = SimLowLevelMotion;

    fn initialize(&mut self, local_ip: &str) -> bool {
        if local_ip.parse::<std::net::IpAddr>().is_err() {
            return false;
        }
        self.local_ip = Some(local_ip.to_string());
        true
    }

    fn set_timeout(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    fn connect(&mut self) -> Status {
        let Some(ip) = &self.local_ip else {
            return Status::error(ErrorCode::ServiceNotReady, "session is not initialized");
        };
        info!("Sim session connected from {}", ip);
        self.connected = true;
        Status::ok()
    }

    fn disconnect(&mut self) -> Status {
        if !self.connected {
            return Status::error(ErrorCode::ServiceNotReady, "session is not connected");
        }
        self.connected = false;
        Status::ok()
    }

    fn set_motion_control_level(&mut self, level: ControllerLevel) -> Status {
        if !self.connected {
            return Status::error(ErrorCode::ServiceNotReady, "session is not connected");
        }
        if level == ControllerLevel::Unknown {
            return Status::error(ErrorCode::ServiceError, "unknown controller level");
        }
        self.low_level.enable_send(level == ControllerLevel::LowLevel);
        self.level = level;
        Status::ok()
    }

    fn high_level_motion(&self) -> Arc<SimHighLevelMotion> {
        Arc::clone(&self.motion)
    }

    fn low_level_motion(&self) -> Arc<SimLowLevelMotion> {
        Arc::clone(&self.low_level)
    }

    fn shutdown(&mut self) {
        self.low_level.shutdown();
        self.motion.shutdown();
        self.connected = false;
        self.local_ip = None;
        self.level = ControllerLevel::Unknown;
    }
}
