//! 机器人 FSM 状态与合法转换表
//!
//! ```text
//! 0 Passive          -> 2, 5
//! 1 PureDamper       -> 0
//! 2 RecoveryStand    -> 0, 1, 3, 4, 5
//! 3 BalanceStand     -> 0, 1, 2, 4
//! 4 Trot             -> 0, 1, 3
//! 5 LowLevelControl  -> 0, 1, 2
//! ```
//!
//! 远端不会替我们过滤非法转换，任何发送前的状态切换都必须经过
//! [`attempt_transition`]。

use crate::error::{IllegalTransition, ProtocolError};
use std::fmt;

/// FSM 状态（线上为 `int8`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i8)]
pub enum FsmState {
    /// 掉电（电机失能）
    Passive = 0,
    /// 纯阻尼
    PureDamper = 1,
    /// 位控站立
    RecoveryStand = 2,
    /// 力控站立（姿态展示）
    BalanceStand = 3,
    /// 小跑
    Trot = 4,
    /// 底层关节控制
    LowLevelControl = 5,
}

impl FsmState {
    pub const ALL: [FsmState; 6] = [
        FsmState::Passive,
        FsmState::PureDamper,
        FsmState::RecoveryStand,
        FsmState::BalanceStand,
        FsmState::Trot,
        FsmState::LowLevelControl,
    ];

    /// 从线上状态码解析
    pub fn from_code(code: i8) -> Result<Self, ProtocolError> {
        FsmState::try_from(code).map_err(|_| ProtocolError::UnknownFsmState(code))
    }

    /// 线上状态码
    #[inline]
    pub fn code(self) -> i8 {
        self.into()
    }

    /// 从当前状态出发允许的目标状态
    pub const fn allowed_targets(self) -> &'static [FsmState] {
        use FsmState::*;
        match self {
            Passive => &[RecoveryStand, LowLevelControl],
            PureDamper => &[Passive],
            RecoveryStand => &[Passive, PureDamper, BalanceStand, Trot, LowLevelControl],
            BalanceStand => &[Passive, PureDamper, RecoveryStand, Trot],
            Trot => &[Passive, PureDamper, BalanceStand],
            LowLevelControl => &[Passive, PureDamper, RecoveryStand],
        }
    }

    /// 转换表中是否存在 `self -> target`
    ///
    /// 不包含自环：保持当前状态不是转换，由 [`attempt_transition`] 单独处理。
    pub fn can_transition_to(self, target: FsmState) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub const fn name(self) -> &'static str {
        match self {
            FsmState::Passive => "Passive",
            FsmState::PureDamper => "PureDamper",
            FsmState::RecoveryStand => "RecoveryStand",
            FsmState::BalanceStand => "BalanceStand",
            FsmState::Trot => "Trot",
            FsmState::LowLevelControl => "LowLevelControl",
        }
    }
}

// 不使用 `#[default]`：num_enum 会把它当成未知状态码的兜底值
impl Default for FsmState {
    fn default() -> Self {
        FsmState::Passive
    }
}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 检查一次状态请求
///
/// - `requested == current`：保持，返回 `Ok(current)`
/// - 转换表允许：返回 `Ok(requested)`
/// - 其他：`Err(IllegalTransition)`，调用方不得发送该请求
pub fn attempt_transition(
    current: FsmState,
    requested: FsmState,
) -> Result<FsmState, IllegalTransition> {
    if requested == current || current.can_transition_to(requested) {
        Ok(requested)
    } else {
        Err(IllegalTransition {
            from: current,
            to: requested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for state in FsmState::ALL {
            assert_eq!(FsmState::from_code(state.code()), Ok(state));
        }
        assert_eq!(FsmState::from_code(6), Err(ProtocolError::UnknownFsmState(6)));
        assert_eq!(FsmState::from_code(-1), Err(ProtocolError::UnknownFsmState(-1)));
    }

    #[test]
    fn test_transition_table_matches_contract() {
        use FsmState::*;
        let expected: [(FsmState, &[FsmState]); 6] = [
            (Passive, &[RecoveryStand, LowLevelControl]),
            (PureDamper, &[Passive]),
            (RecoveryStand, &[Passive, PureDamper, BalanceStand, Trot, LowLevelControl]),
            (BalanceStand, &[Passive, PureDamper, RecoveryStand, Trot]),
            (Trot, &[Passive, PureDamper, BalanceStand]),
            (LowLevelControl, &[Passive, PureDamper, RecoveryStand]),
        ];
        for (from, targets) in expected {
            for to in FsmState::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    targets.contains(&to),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_trot_to_recovery_is_illegal() {
        let err = attempt_transition(FsmState::Trot, FsmState::RecoveryStand).unwrap_err();
        assert_eq!(err.from, FsmState::Trot);
        assert_eq!(err.to, FsmState::RecoveryStand);
    }

    #[test]
    fn test_hold_is_accepted() {
        for state in FsmState::ALL {
            assert_eq!(attempt_transition(state, state), Ok(state));
        }
    }

    #[test]
    fn test_every_state_can_reach_passive_except_passive() {
        for state in FsmState::ALL {
            if state != FsmState::Passive {
                assert!(state.can_transition_to(FsmState::Passive), "{}", state);
            }
        }
    }
}
