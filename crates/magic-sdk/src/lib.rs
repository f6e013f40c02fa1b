//! Magic SDK - Magiclab 四足机器人 Rust SDK
//!
//! 主机侧 500Hz 实时控制：遥测/命令交换、FSM 转换约束、关节插值。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 数据模型、关节顺序、FSM 状态与合法转换表、运动意图范围
//! - **驱动层** (`driver`): 交换通道、连接监视、固定周期时钟、单槽邮箱、模拟设备
//! - **客户端层** (`client`): 控制循环、FSM 转换检查、演示控制器、会话接口、摇杆遥控
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use magic_sdk::prelude::*;
//!
//! # fn main() -> Result<(), ControlError> {
//! magic_sdk::init_logging();
//!
//! let robot = SimRobot::new(SimConfig::default());
//! let _device = robot
//!     .spawn()
//!     .map_err(|source| ControlError::Spawn { name: "sim", source })?;
//!
//! let mut control = ExchangeLoop::new(robot.exchange(), LocomotionDemo::new()?, LoopConfig::default())?;
//! control.run()?;
//! # Ok(())
//! # }
//! ```

pub use magic_client as client;
pub use magic_driver as driver;
pub use magic_protocol as protocol;

mod logging;
pub mod prelude;

pub use logging::{DEFAULT_LOG_FILTER, init_logging, init_logging_with};

// 协议层
pub use protocol::{FsmState, InputData, JointArray, JointId, MotionCmd, MotorCmd, OutputData, ProtocolError};

// 驱动层
pub use driver::{DriverError, Exchange, ExchangeChannel};

// 客户端层
pub use client::{ControlError, ExchangeLoop, FsmGate, LoopConfig, TickController};
