//! TickController - 控制器通用接口
//!
//! 控制器只负责计算：给定本周期的遥测，产出本周期的命令。
//! 连接等待、首次进入的安全检查、FSM 转换检查、定时都由
//! [`ExchangeLoop`](super::ExchangeLoop) 负责。
//!
//! # 生命周期
//!
//! 1. 安全检查通过后调用一次 `start()`，传入同一周期的遥测
//! 2. 之后每个周期调用 `tick()`
//! 3. 时钟放弃追赶时调用 `on_time_jump()`，传入跳过的周期数
//! 4. 断线后调用 `reset()`，重连后从 `start()` 重新开始
//!
//! # 示例
//!
//! ```rust
//! use magic_client::control::{Step, TickController};
//! use magic_client::ControlError;
//! use magic_protocol::{FsmState, InputData, OutputData};
//!
//! struct StandStill {
//!     ticks: u64,
//! }
//!
//! impl TickController for StandStill {
//!     type Error = ControlError;
//!
//!     fn tick(&mut self, _input: &InputData) -> Result<Step, Self::Error> {
//!         self.ticks += 1;
//!         if self.ticks > 100 {
//!             return Ok(Step::Finished);
//!         }
//!         Ok(Step::Command(OutputData::fsm(FsmState::RecoveryStand)))
//!     }
//!
//!     fn reset(&mut self) {
//!         self.ticks = 0;
//!     }
//! }
//! ```

use magic_protocol::{InputData, OutputData};

/// 一个周期的控制输出
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// 发送这条命令
    Command(OutputData),
    /// 控制序列结束，本周期不发送
    Finished,
}

/// 控制器通用接口
///
/// 不要求 `Send`：控制循环在调用线程上运行。
pub trait TickController {
    type Error: std::error::Error + Send + 'static;

    /// 安全检查通过后的第一个周期
    fn start(&mut self, _input: &InputData) -> Result<(), Self::Error> {
        Ok(())
    }

    /// 计算一个周期的命令
    fn tick(&mut self, input: &InputData) -> Result<Step, Self::Error>;

    /// 时钟跳过了 `skipped_ticks` 个周期
    ///
    /// 默认什么都不做（跳过的周期被整体平移）。
    fn on_time_jump(&mut self, _skipped_ticks: u64) -> Result<(), Self::Error> {
        Ok(())
    }

    /// 回到初始状态（计数器、锚点全部清空）
    fn reset(&mut self);
}

impl<C: TickController + ?Sized> TickController for Box<C> {
    type Error = C::Error;

    fn start(&mut self, input: &InputData) -> Result<(), Self::Error> {
        (**self).start(input)
    }

    fn tick(&mut self, input: &InputData) -> Result<Step, Self::Error> {
        (**self).tick(input)
    }

    fn on_time_jump(&mut self, skipped_ticks: u64) -> Result<(), Self::Error> {
        (**self).on_time_jump(skipped_ticks)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
