//! 协议层错误类型

use crate::fsm::FsmState;
use crate::joint::JointId;
use thiserror::Error;

/// 协议层错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// 未知的 FSM 状态码
    #[error("Unknown FSM state code: {0}")]
    UnknownFsmState(i8),

    /// 增益为负或非有限值
    #[error("Invalid {gain} gain on joint {joint}: {value} (must be finite and >= 0)")]
    InvalidGain {
        joint: JointId,
        gain: &'static str,
        value: f32,
    },

    /// 非有限的关节目标值（NaN / Inf）
    #[error("Non-finite {field} on joint {joint}: {value}")]
    NonFiniteTarget {
        joint: JointId,
        field: &'static str,
        value: f32,
    },

    /// 运动指令超出当前状态允许的范围
    #[error("Motion field {field} out of range in {state}: {value:.3} (allowed {min:.3} ~ {max:.3})")]
    OutOfRange {
        state: FsmState,
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

/// 非法状态转换
///
/// 本地不变量违反：必须在发送前拦截，不会作为远端 `Status` 返回。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Illegal FSM transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: FsmState,
    pub to: FsmState,
}
