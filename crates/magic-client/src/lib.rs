//! 客户端控制层
//!
//! 在驱动层的交换通道之上提供：
//! - `ExchangeLoop` - 固定周期控制循环（连接等待、首次进入安全检查、FSM 转换检查）
//! - `FsmGate` - 发送前的 FSM 转换过滤
//! - 分段插值与相位表，以及两个演示控制器
//! - 会话层 trait（`RobotSession` / `HighLevelMotion`）和能力对象（底层运动、音频、传感器等）
//! - 摇杆遥控（单槽邮箱 + 固定频率发送线程）
//! - `LoopConfig` - 控制循环配置（TOML）
//!
//! # 示例
//!
//! ```rust,no_run
//! use magic_client::control::{ExchangeLoop, JointInterpolationDemo};
//! use magic_client::{ControlError, LoopConfig};
//! use magic_driver::sim::{SimConfig, SimRobot};
//!
//! # fn main() -> Result<(), ControlError> {
//! let robot = SimRobot::new(SimConfig::default());
//! let _device = robot
//!     .spawn()
//!     .map_err(|source| ControlError::Spawn { name: "sim", source })?;
//!
//! let config = LoopConfig {
//!     max_ticks: Some(5000),
//!     ..LoopConfig::default()
//! };
//! let mut control = ExchangeLoop::new(robot.exchange(), JointInterpolationDemo::new()?, config)?;
//! control.run()?;
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod config;
pub mod control;
mod error;
pub mod gate;
pub mod session;
pub mod teleop;

pub use capability::{Capability, FeedCallback, LowLevelMotion, SimLowLevelMotion, SubscriptionId};
pub use config::LoopConfig;
pub use control::{ExchangeLoop, LoopEvent, LoopSummary, Step, StopReason, TickController};
pub use error::{ControlError, Result};
pub use gate::FsmGate;
pub use session::{
    ControllerLevel, ErrorCode, GaitMode, HighLevelMotion, RobotSession, SessionError,
    SimHighLevelMotion, SimSession, Status, TrickAction,
};
pub use teleop::{JoystickCommand, JoystickPublisher, TeleopAction, TeleopSession};
