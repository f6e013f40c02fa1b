//! ExchangeLoop - 固定周期控制循环
//!
//! 每个周期：
//!
//! 1. 探测链路，未连接则等待下一周期（不发送任何命令）
//! 2. 读取最新遥测
//! 3. 首次进入（或重连后）的安全检查：设备不在 Passive 时先请求 Passive，
//!    等待 `settle_period` 后重新读取，仍不是 Passive 则本轮放弃
//! 4. 控制器计算命令
//! 5. FSM 转换检查，运动意图按当前状态的范围饱和
//! 6. 发送，睡到下一个周期边界
//!
//! 运行中断线会重置控制器并重新武装安全检查：重连后从头开始，
//! 不会从轨迹中途继续。
//!
//! ```rust,no_run
//! use magic_client::control::{ExchangeLoop, LocomotionDemo};
//! use magic_client::LoopConfig;
//! use magic_driver::sim::{SimConfig, SimRobot};
//!
//! # fn main() -> Result<(), magic_client::ControlError> {
//! let robot = SimRobot::new(SimConfig::default());
//! let _device = robot.spawn().map_err(|source| magic_client::ControlError::Spawn { name: "sim", source })?;
//! let mut control = ExchangeLoop::new(robot.exchange(), LocomotionDemo::new()?, LoopConfig::default())?;
//! let summary = control.run()?;
//! println!("{:?}", summary);
//! # Ok(())
//! # }
//! ```

use super::controller::{Step, TickController};
use crate::config::LoopConfig;
use crate::error::ControlError;
use crate::gate::FsmGate;
use magic_driver::{CycleClock, ExchangeChannel, Telemetry};
use magic_protocol::{FsmState, MotionLimits, OutputData};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// 单个周期的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// 链路未连接，本周期未发送
    Disconnected,
    /// 安全检查未通过（设备未回到 Passive），本周期未运行控制器
    SafetyGatePending,
    /// 已发送第 `tick` 条控制命令
    Commanded { tick: u64, fsm: FsmState },
    /// 控制器已计算命令，但发送遇到瞬时错误（不计入已发送）
    SendFailed { fsm: FsmState },
    /// 控制器结束
    Finished,
}

/// 循环停止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Finished,
    MaxTicks,
    Shutdown,
}

/// 循环运行统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopStats {
    /// 周期数（含未连接、安全检查周期）
    pub cycles: u64,
    /// 已成功交给传输层的控制命令数
    pub commanded: u64,
    /// 未连接的周期数
    pub disconnected_cycles: u64,
    /// 安全检查请求 Passive 的次数
    pub safety_requests: u64,
    /// 被拒绝的 FSM 请求数
    pub rejected_transitions: u64,
    /// 运动意图被饱和的次数
    pub clamped_motions: u64,
    /// 瞬时发送失败次数
    pub send_failures: u64,
    /// 周期超时次数
    pub overruns: u64,
    /// 因落后过多跳过的周期数
    pub skipped_periods: u64,
    /// 断线重置次数
    pub resets: u64,
}

/// [`ExchangeLoop::run`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub reason: StopReason,
    pub stats: LoopStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// 等待连接 + 安全检查
    Gate,
    Running,
    Finished,
}

/// 固定周期控制循环
pub struct ExchangeLoop<Ch, C> {
    channel: Ch,
    controller: C,
    config: LoopConfig,
    clock: CycleClock,
    gate: FsmGate,
    stage: Stage,
    stats: LoopStats,
    shutdown: Arc<AtomicBool>,
}

impl<Ch, C> ExchangeLoop<Ch, C>
where
    Ch: ExchangeChannel,
    C: TickController,
    ControlError: From<C::Error>,
{
    pub fn new(channel: Ch, controller: C, config: LoopConfig) -> Result<Self, ControlError> {
        config.validate()?;
        let clock = CycleClock::new(config.period())
            .with_policy(config.drift_policy)
            .with_max_lag_periods(config.max_lag_periods);
        Ok(Self {
            channel,
            controller,
            config,
            clock,
            gate: FsmGate::new(),
            stage: Stage::Gate,
            stats: LoopStats::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// 停止标志，置位后 `run()` 在下一个周期返回
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn channel(&self) -> &Ch {
        &self.channel
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn gate(&self) -> &FsmGate {
        &self.gate
    }

    pub fn stats(&self) -> LoopStats {
        LoopStats {
            rejected_transitions: self.gate.rejections(),
            overruns: self.clock.overruns(),
            ..self.stats
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Finished
    }

    /// 运行一个周期（含周期末的等待）
    pub fn run_once(&mut self) -> Result<LoopEvent, ControlError> {
        if self.stage == Stage::Finished {
            return Ok(LoopEvent::Finished);
        }

        let start = self.clock.begin_cycle();
        self.stats.cycles += 1;
        let mut settled = false;
        let event = self.cycle(start, &mut settled)?;

        if event == LoopEvent::Finished {
            return Ok(event);
        }

        if settled {
            // 安全检查的等待已经占用了本周期，从当前时刻重新定锚
            self.clock.reanchor();
        } else {
            let report = self.clock.wait_until_next(start, self.config.period());
            if report.skipped_periods > 0 {
                self.stats.skipped_periods += report.skipped_periods;
                if self.stage == Stage::Running {
                    self.controller.on_time_jump(report.skipped_periods)?;
                }
            }
        }
        Ok(event)
    }

    /// 循环直到控制器结束、达到 `max_ticks` 或收到停止信号
    pub fn run(&mut self) -> Result<LoopSummary, ControlError> {
        info!(
            "Control loop starting at {} Hz (settle {} ms)",
            self.config.frequency_hz, self.config.settle_period_ms
        );
        let reason = loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, leaving control loop");
                break StopReason::Shutdown;
            }
            if let Some(max) = self.config.max_ticks
                && self.stats.cycles >= max
            {
                info!("Reached max_ticks ({})", max);
                break StopReason::MaxTicks;
            }
            if self.run_once()? == LoopEvent::Finished {
                break StopReason::Finished;
            }
        };

        let stats = self.stats();
        info!(
            "Control loop stopped ({:?}): {} cycles, {} commands, {} rejected transitions, {} overruns",
            reason, stats.cycles, stats.commanded, stats.rejected_transitions, stats.overruns
        );
        Ok(LoopSummary { reason, stats })
    }

    fn cycle(&mut self, start: Instant, settled: &mut bool) -> Result<LoopEvent, ControlError> {
        if !self.channel.is_connected() {
            if self.stage == Stage::Running {
                warn!("Connection lost, resetting controller and re-arming safety gate");
                self.controller.reset();
                self.gate.reset();
                self.stage = Stage::Gate;
                self.stats.resets += 1;
            }
            self.stats.disconnected_cycles += 1;
            if self.stats.disconnected_cycles == 1 || self.stats.disconnected_cycles % 500 == 0 {
                info!("Building connection ...");
            }
            return Ok(LoopEvent::Disconnected);
        }

        let mut telemetry = self.channel.receive_telemetry();

        if self.stage == Stage::Gate {
            if !is_passive(&telemetry) {
                *settled = true;
                telemetry = match self.request_passive(start, &telemetry)? {
                    Some(telemetry) => telemetry,
                    None => return Ok(LoopEvent::SafetyGatePending),
                };
            }
            info!("Robot is Passive, starting controller");
            self.gate.reset();
            self.gate.observe(FsmState::Passive);
            self.controller.start(&telemetry.data)?;
            self.stage = Stage::Running;
        }

        match telemetry.data.fsm_state() {
            Ok(state) => self.gate.observe(state),
            Err(e) => warn!("Ignoring telemetry FSM state: {}", e),
        }

        let mut cmd = match self.controller.tick(&telemetry.data)? {
            Step::Command(cmd) => cmd,
            Step::Finished => {
                info!("Controller finished");
                self.stage = Stage::Finished;
                return Ok(LoopEvent::Finished);
            },
        };

        cmd.robot_fsm_cmd = self.gate.filter(cmd.robot_fsm_cmd);
        if MotionLimits::for_state(cmd.robot_fsm_cmd).clamp(&mut cmd.motion_cmd) {
            self.stats.clamped_motions += 1;
            warn!(
                "Motion command clamped to {} limits: {:?}",
                cmd.robot_fsm_cmd, cmd.motion_cmd
            );
        }

        match self.channel.send_command(&cmd) {
            Ok(()) => self.gate.mark_issued(cmd.robot_fsm_cmd),
            Err(e) if e.is_transient() => {
                self.stats.send_failures += 1;
                warn!("Send failed, continuing: {}", e);
                return Ok(LoopEvent::SendFailed {
                    fsm: cmd.robot_fsm_cmd,
                });
            },
            Err(e) => {
                error!("Send failed: {}", e);
                return Err(e.into());
            },
        }

        self.stats.commanded += 1;
        trace!(
            "tick {} fsm={} stale={}",
            self.stats.commanded, cmd.robot_fsm_cmd, telemetry.stale
        );
        Ok(LoopEvent::Commanded {
            tick: self.stats.commanded,
            fsm: cmd.robot_fsm_cmd,
        })
    }

    /// 请求 Passive 并等待，返回等待后的遥测（仍不是 Passive 时返回 `None`）
    fn request_passive(
        &mut self,
        start: Instant,
        telemetry: &Telemetry,
    ) -> Result<Option<Telemetry>, ControlError> {
        self.stats.safety_requests += 1;
        info!(
            "Robot reports FSM code {}, requesting Passive before start",
            telemetry.data.robot_fsm_data
        );

        if let Err(e) = self.channel.send_command(&OutputData::fsm(FsmState::Passive)) {
            if !e.is_transient() {
                return Err(e.into());
            }
            warn!("Failed to request Passive: {}", e);
            self.clock.sleep_until(start + self.config.period());
            return Ok(None);
        }

        self.clock.sleep_until(start + self.config.settle_period());
        let telemetry = self.channel.receive_telemetry();
        if is_passive(&telemetry) {
            Ok(Some(telemetry))
        } else {
            debug!(
                "Robot still reports FSM code {} after settle period",
                telemetry.data.robot_fsm_data
            );
            Ok(None)
        }
    }

    /// 拆出内部的通道和控制器
    pub fn into_parts(self) -> (Ch, C) {
        (self.channel, self.controller)
    }
}

fn is_passive(telemetry: &Telemetry) -> bool {
    telemetry.data.fsm_state() == Ok(FsmState::Passive)
}
