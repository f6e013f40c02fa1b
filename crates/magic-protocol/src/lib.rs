//! # Magic Protocol
//!
//! 四足机器人主机与设备之间交换的数据模型（无传输依赖）
//!
//! ## 模块
//!
//! - `joint`: 12 关节的顺序约定与类型安全的数组
//! - `fsm`: FSM 状态与合法转换表
//! - `data`: `InputData` / `OutputData` 及其子结构
//! - `limits`: 各 FSM 状态下运动指令的物理范围
//!
//! ## 单位
//!
//! 角度 rad，角速度 rad/s，线速度 m/s，长度 m，力矩 N·m。
//! 数组字段与设备端结构体一一对应，使用 `f32`。

pub mod data;
pub mod error;
pub mod fsm;
pub mod joint;
pub mod limits;

pub use data::*;
pub use error::{IllegalTransition, ProtocolError};
pub use fsm::{FsmState, attempt_transition};
pub use joint::{JOINT_COUNT, JOINTS_PER_LEG, JointArray, JointId, LEG_COUNT, Leg, LegJoint};
pub use limits::MotionLimits;

/// 设备端反馈/命令的更新频率上限（Hz）
///
/// 主机以更高频率读取只会拿到重复的快照。
pub const DEVICE_RATE_HZ: f64 = 500.0;

/// 设备周期（秒）
pub const DEVICE_PERIOD_SECS: f64 = 1.0 / DEVICE_RATE_HZ;
