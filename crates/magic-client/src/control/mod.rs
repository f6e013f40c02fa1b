//! 控制模块
//!
//! - `TickController` trait - 控制器通用接口
//! - `ExchangeLoop` - 固定周期控制循环（连接等待、安全检查、FSM 转换检查）
//! - `SegmentPlan` / `SegmentRunner` - 分段关节插值
//! - `PhaseTable` - 按计数切分的 FSM 相位表
//! - `JointInterpolationDemo` - 底层关节插值演示
//! - `LocomotionDemo` - 站立、姿态、小跑演示

pub mod controller;
pub mod high_level;
pub mod loop_runner;
pub mod low_level;
pub mod phase;
pub mod trajectory;

// 重新导出常用类型
pub use controller::{Step, TickController};
pub use high_level::{LocomotionDemo, locomotion_table};
pub use loop_runner::{ExchangeLoop, LoopEvent, LoopStats, LoopSummary, StopReason};
pub use low_level::{JointInterpolationDemo, body_cycle_plan};
pub use phase::{AngleProfile, MotionProfile, Phase, PhaseLookup, PhaseTable};
pub use trajectory::{Endpoint, Segment, SegmentPlan, SegmentRunner, SegmentSample, lerp, ramp_fraction};
