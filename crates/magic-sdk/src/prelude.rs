//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use magic_sdk::prelude::*;
//! ```

// 协议层
pub use crate::protocol::{
    FsmState, InputData, JointArray, JointId, Leg, LegJoint, MotionCmd, MotionLimits, MotorCmd,
    OutputData,
};

// 驱动层
pub use crate::driver::sim::{SimConfig, SimRobot};
pub use crate::driver::{CycleClock, DriftPolicy, Exchange, ExchangeChannel, Mailbox};

// 客户端层
pub use crate::client::control::{
    ExchangeLoop, JointInterpolationDemo, LocomotionDemo, LoopEvent, LoopSummary, Step, StopReason,
    TickController,
};
pub use crate::client::{
    Capability, ControllerLevel, FsmGate, GaitMode, HighLevelMotion, JoystickCommand, LoopConfig,
    LowLevelMotion, RobotSession, Status, TeleopSession, TrickAction,
};

// 错误类型
pub use crate::client::{ControlError, SessionError};
pub use crate::driver::DriverError;
pub use crate::protocol::{IllegalTransition, ProtocolError};
