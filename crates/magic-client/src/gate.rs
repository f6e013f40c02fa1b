//! 发送前的 FSM 转换检查
//!
//! 每条命令里的 `robot_fsm_cmd` 都要先经过 [`FsmGate`]。
//! 合法性以设备上报的状态为准（未收到上报前以最后一次发出的目标为准）：
//!
//! - 请求等于当前状态：保持
//! - 转换表允许：放行
//! - 否则拒绝：记 `error` 日志、计数，并改发最后一次发出的目标；
//!   若它相对当前状态也不合法，则改发当前状态（保持）
//!
//! 因此发到链路上的状态请求相对设备状态永远合法。

use magic_protocol::{FsmState, IllegalTransition, attempt_transition};
use tracing::error;

#[derive(Debug, Clone, Default)]
pub struct FsmGate {
    confirmed: Option<FsmState>,
    issued: Option<FsmState>,
    rejections: u64,
}

impl FsmGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录设备上报的状态
    pub fn observe(&mut self, reported: FsmState) {
        self.confirmed = Some(reported);
    }

    /// 记录已发出的目标
    pub fn mark_issued(&mut self, target: FsmState) {
        self.issued = Some(target);
    }

    /// 设备最近一次上报的状态
    pub fn confirmed(&self) -> Option<FsmState> {
        self.confirmed
    }

    /// 最近一次发出的目标
    pub fn issued(&self) -> Option<FsmState> {
        self.issued
    }

    /// 累计拒绝次数
    pub fn rejections(&self) -> u64 {
        self.rejections
    }

    /// 断线重连后清空状态（拒绝计数保留）
    pub fn reset(&mut self) {
        self.confirmed = None;
        self.issued = None;
    }

    fn reference(&self) -> Option<FsmState> {
        self.confirmed.or(self.issued)
    }

    /// 检查一次请求，不修改状态
    ///
    /// 既没有上报也没有发出过目标时以 Passive 为起点判定。
    pub fn check(&self, requested: FsmState) -> Result<FsmState, IllegalTransition> {
        attempt_transition(self.reference().unwrap_or_default(), requested)
    }

    /// 检查请求，非法时返回替代目标
    pub fn filter(&mut self, requested: FsmState) -> FsmState {
        match self.check(requested) {
            Ok(target) => target,
            Err(rejected) => {
                self.rejections += 1;
                let fallback = self
                    .issued
                    .filter(|issued| self.check(*issued).is_ok())
                    .unwrap_or_else(|| self.reference().unwrap_or_default());
                error!("{}; holding {} instead", rejected, fallback);
                fallback
            },
        }
    }
}
