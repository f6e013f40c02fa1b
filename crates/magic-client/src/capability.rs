//! 会话提供的能力对象
//!
//! 会话为高层运动、底层运动、音频、传感器、表情屏和状态监控各提供一个能力对象，
//! 每个能力对象可以独立 `initialize()` / `shutdown()`。
//!
//! 传感器和音频数据以推送回调的方式送达。回调的生命周期绑定在能力对象上：
//! 销毁前必须 `unsubscribe()` 或 `shutdown()`，`shutdown()` 会移除该对象上的所有回调。
//!
//! ```rust
//! use magic_client::capability::{Capability, FeedCallback, LowLevelMotion, SimLowLevelMotion};
//! use magic_protocol::InputData;
//! use std::sync::Arc;
//!
//! let low = SimLowLevelMotion::new();
//! assert!(low.initialize());
//! let callback: FeedCallback<InputData> = Arc::new(|data: &InputData| {
//!     let _ = data.robot_fsm_data;
//! });
//! let id = low.subscribe_state(callback);
//! low.deliver(&InputData::default());
//! assert!(low.unsubscribe(id));
//! low.shutdown();
//! ```

use crate::session::{ErrorCode, SessionError, Status};
use magic_protocol::{InputData, OutputData};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// 可独立初始化/关闭的能力对象
pub trait Capability: Send + Sync {
    /// 建立该能力的连接
    fn initialize(&self) -> bool;

    /// 释放资源并移除所有回调
    fn shutdown(&self);
}

/// 推送回调
///
/// 在传输层的接收线程中调用，实现不应阻塞。
pub type FeedCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// 订阅句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 回调列表
///
/// 能力对象的实现用它保存订阅，并在收到数据时 `trigger_all()`。
pub struct FeedHooks<T> {
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(SubscriptionId, FeedCallback<T>)>>,
}

impl<T> Default for FeedHooks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FeedHooks<T> {
    pub fn new() -> Self {
        FeedHooks {
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    pub fn add_callback(&self, callback: FeedCallback<T>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().push((id, callback));
        id
    }

    /// 移除一个回调，句柄未知时返回 `false`
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub fn clear(&self) {
        self.callbacks.write().clear();
    }

    /// 调用所有回调，返回调用次数
    pub fn trigger_all(&self, value: &T) -> usize {
        let callbacks = self.callbacks.read();
        for (_, callback) in callbacks.iter() {
            callback(value);
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

impl<T> std::fmt::Debug for FeedHooks<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHooks").field("callbacks", &self.len()).finish()
    }
}

/// 底层运动服务（关节级命令和腿部状态推送）
pub trait LowLevelMotion: Capability {
    /// 控制周期，小于 1ms 时服务端使用默认的 2ms
    fn set_period_ms(&self, period_ms: u64);

    /// 底层命令通道开关：高层控制时关闭，底层控制时打开
    fn enable_send(&self, enable: bool);

    fn publish_command(&self, command: &OutputData) -> Status;

    fn subscribe_state(&self, callback: FeedCallback<InputData>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// 传感器数据流
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorStream {
    Imu,
    Tof,
    Ultrasonic,
    HeadTouch,
    LaserScan,
    RgbdColor,
    RgbdDepth,
    BinocularLeft,
    BinocularRight,
    Depth,
}

/// 一帧传感器数据（负载格式由传输层定义）
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    pub stream: SensorStream,
    pub stamp_ns: u64,
    pub data: Vec<u8>,
}

/// 传感器服务
pub trait Sensors: Capability {
    /// 打开一路数据流（激光雷达、相机等需要先打开才会推送）
    fn open(&self, stream: SensorStream) -> Status;

    fn close(&self, stream: SensorStream) -> Status;

    fn subscribe(&self, stream: SensorStream, callback: FeedCallback<SensorFrame>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// 语音数据流
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceStream {
    /// 原始多通道录音
    Origin,
    /// 波束成形后的单通道
    Beamformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChunk {
    pub stream: VoiceStream,
    pub data: Vec<u8>,
}

/// 音频服务
pub trait Audio: Capability {
    fn set_volume(&self, volume: u8) -> Status;

    fn get_volume(&self) -> Result<u8, SessionError>;

    /// 选择推送哪些语音数据流
    fn control_voice_stream(&self, origin: bool, beamformed: bool) -> Status;

    fn subscribe_voice(&self, stream: VoiceStream, callback: FeedCallback<VoiceChunk>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// 表情屏
pub trait FaceDisplay: Capability {
    fn set_face_expression(&self, expression_id: i32) -> Status;

    fn get_face_expression(&self) -> Result<i32, SessionError>;
}

/// 电池状态
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryStatus {
    /// 剩余电量（0..=100）
    pub percentage: f32,
    pub health: f32,
    pub charging: bool,
}

/// 聚合的机器人运行状态
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RobotHealth {
    /// 当前故障码（文本表由会话层提供，仅用于诊断显示）
    pub fault_codes: Vec<i32>,
    pub battery: BatteryStatus,
}

/// 状态监控
pub trait StateMonitor: Capability {
    fn current_state(&self) -> RobotHealth;
}

/// 进程内底层运动服务
///
/// 记录发布的命令，`deliver()` 把一帧状态推给所有订阅者。
#[derive(Debug, Default)]
pub struct SimLowLevelMotion {
    initialized: AtomicBool,
    send_enabled: AtomicBool,
    period_ms: AtomicU64,
    published: Mutex<Vec<OutputData>>,
    hooks: FeedHooks<InputData>,
}

impl SimLowLevelMotion {
    pub fn new() -> Self {
        SimLowLevelMotion {
            period_ms: AtomicU64::new(2),
            ..Default::default()
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms.load(Ordering::Relaxed)
    }

    pub fn published(&self) -> Vec<OutputData> {
        self.published.lock().clone()
    }

    pub fn subscribers(&self) -> usize {
        self.hooks.len()
    }

    /// 推送一帧状态，未初始化时丢弃
    pub fn deliver(&self, data: &InputData) -> usize {
        if !self.is_initialized() {
            return 0;
        }
        self.hooks.trigger_all(data)
    }
}

impl Capability for SimLowLevelMotion {
    fn initialize(&self) -> bool {
        self.initialized.store(true, Ordering::Release);
        true
    }

    fn shutdown(&self) {
        self.initialized.store(false, Ordering::Release);
        self.send_enabled.store(false, Ordering::Release);
        if !self.hooks.is_empty() {
            debug!("dropping {} leg state subscriptions on shutdown", self.hooks.len());
        }
        self.hooks.clear();
    }
}

impl LowLevelMotion for SimLowLevelMotion {
    fn set_period_ms(&self, period_ms: u64) {
        let period_ms = if period_ms < 1 { 2 } else { period_ms };
        self.period_ms.store(period_ms, Ordering::Relaxed);
    }

    fn enable_send(&self, enable: bool) {
        self.send_enabled.store(enable, Ordering::Release);
    }

    fn publish_command(&self, command: &OutputData) -> Status {
        if !self.is_initialized() {
            return Status::error(ErrorCode::ServiceNotReady, "low level motion is not initialized");
        }
        if !self.send_enabled.load(Ordering::Acquire) {
            warn!("low level command dropped, send channel disabled");
            return Status::error(ErrorCode::ServiceError, "low level send channel disabled");
        }
        if let Err(e) = command.motor_cmd.validate() {
            return Status::error(ErrorCode::ServiceError, e.to_string());
        }
        self.published.lock().push(*command);
        Status::ok()
    }

    fn subscribe_state(&self, callback: FeedCallback<InputData>) -> SubscriptionId {
        self.hooks.add_callback(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hooks.remove(id)
    }
}
