//! 摇杆遥控
//!
//! 生产者/消费者结构：
//!
//! - 按键处理线程把最新的摇杆值写进单槽 [`Mailbox`]
//! - [`JoystickPublisher`] 的后台线程以固定频率（默认 100Hz）读取最新值并发送
//!
//! 发送的值最多比写入晚一个发送周期。停止时置位标志并 join 线程。
//!
//! 按键：
//!
//! | 键 | 动作 |
//! |----|------|
//! | ESC | 退出 |
//! | 1 | 位控站立 |
//! | 2 | 力控站立 |
//! | 3 | 特技：趴下 |
//! | w / x | 前进 / 后退 |
//! | a / d | 左移 / 右移 |
//! | t / g | 左转 / 右转 |
//! | s | 停止 |
//!
//! 移动类按键会先确保步态为 `DownClimbStairs`。

use crate::error::ControlError;
use crate::session::{GaitMode, HighLevelMotion, SessionError, TrickAction};
use magic_driver::{CycleClock, Mailbox};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// ESC 的键码
pub const KEY_ESC: u8 = 27;

/// 摇杆命令发送频率
pub const JOYSTICK_RATE_HZ: f64 = 100.0;

/// 步态切换的轮询间隔
pub const GAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// 步态切换的默认等待上限
pub const DEFAULT_GAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// 摇杆命令，各轴取值 [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JoystickCommand {
    /// 左摇杆 X：-1 左移，1 右移
    pub left_x: f32,
    /// 左摇杆 Y：-1 后退，1 前进
    pub left_y: f32,
    /// 右摇杆 X：-1 左转，1 右转
    pub right_x: f32,
    pub right_y: f32,
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) }
}

impl JoystickCommand {
    /// 全零（停止）
    pub const STOP: JoystickCommand = JoystickCommand {
        left_x: 0.0,
        left_y: 0.0,
        right_x: 0.0,
        right_y: 0.0,
    };

    /// 越界的轴被饱和到 [-1, 1]，NaN 视为 0
    pub fn new(left_x: f32, left_y: f32, right_x: f32, right_y: f32) -> Self {
        JoystickCommand {
            left_x: clamp_axis(left_x),
            left_y: clamp_axis(left_y),
            right_x: clamp_axis(right_x),
            right_y: clamp_axis(right_y),
        }
    }

    pub fn is_stop(&self) -> bool {
        *self == Self::STOP
    }
}

/// 按键对应的动作
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TeleopAction {
    Quit,
    SetGait(GaitMode),
    Trick(TrickAction),
    /// 切到行走步态后发送摇杆值
    Move(JoystickCommand),
}

impl TeleopAction {
    pub fn from_key(key: u8) -> Option<Self> {
        let action = match key {
            KEY_ESC => TeleopAction::Quit,
            b'1' => TeleopAction::SetGait(GaitMode::StandR),
            b'2' => TeleopAction::SetGait(GaitMode::StandB),
            b'3' => TeleopAction::Trick(TrickAction::LieDown),
            b'w' => TeleopAction::Move(JoystickCommand::new(0.0, 1.0, 0.0, 0.0)),
            b'x' => TeleopAction::Move(JoystickCommand::new(0.0, -1.0, 0.0, 0.0)),
            b'a' => TeleopAction::Move(JoystickCommand::new(-1.0, 0.0, 0.0, 0.0)),
            b'd' => TeleopAction::Move(JoystickCommand::new(1.0, 0.0, 0.0, 0.0)),
            b't' => TeleopAction::Move(JoystickCommand::new(0.0, 0.0, -1.0, 0.0)),
            b'g' => TeleopAction::Move(JoystickCommand::new(0.0, 0.0, 1.0, 0.0)),
            b's' => TeleopAction::Move(JoystickCommand::STOP),
            _ => return None,
        };
        Some(action)
    }
}

/// 固定频率发送摇杆命令的后台线程
pub struct JoystickPublisher {
    mailbox: Mailbox<JoystickCommand>,
    running: Arc<AtomicBool>,
    sent: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl JoystickPublisher {
    pub fn spawn<M>(motion: Arc<M>, rate_hz: f64) -> Result<Self, ControlError>
    where
        M: HighLevelMotion + ?Sized + 'static,
    {
        if !rate_hz.is_finite() || rate_hz <= 0.0 {
            return Err(ControlError::Config(format!(
                "Invalid joystick rate: {} (must be > 0)",
                rate_hz
            )));
        }

        let mailbox = Mailbox::new(JoystickCommand::STOP);
        let running = Arc::new(AtomicBool::new(true));
        let sent = Arc::new(AtomicU64::new(0));
        let failures = Arc::new(AtomicU64::new(0));
        let period = Duration::from_secs_f64(1.0 / rate_hz);

        let handle = {
            let mailbox = mailbox.clone();
            let running = Arc::clone(&running);
            let sent = Arc::clone(&sent);
            let failures = Arc::clone(&failures);
            std::thread::Builder::new()
                .name("magic-joystick".to_string())
                .spawn(move || {
                    let mut clock = CycleClock::new(period);
                    while running.load(Ordering::Acquire) {
                        let start = clock.begin_cycle();
                        let command = *mailbox.latest();
                        let status = motion.send_joystick_command(&command);
                        if status.is_ok() {
                            sent.fetch_add(1, Ordering::Relaxed);
                        } else {
                            failures.fetch_add(1, Ordering::Relaxed);
                            warn!("send joystick command failed, {}", status);
                        }
                        clock.wait_until_next(start, period);
                    }
                    debug!("joystick publisher stopped");
                })
                .map_err(|source| ControlError::Spawn {
                    name: "joystick",
                    source,
                })?
        };

        Ok(JoystickPublisher {
            mailbox,
            running,
            sent,
            failures,
            handle: Some(handle),
        })
    }

    /// 写入新的摇杆值，下一个发送周期生效
    pub fn post(&self, command: JoystickCommand) {
        self.mailbox.post(command);
    }

    pub fn mailbox(&self) -> Mailbox<JoystickCommand> {
        self.mailbox.clone()
    }

    /// 成功发送的次数
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// 置位停止标志并等待线程退出
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("joystick publisher thread panicked");
        }
    }
}

impl Drop for JoystickPublisher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 一次按键的处理结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyOutcome {
    Quit,
    Handled(TeleopAction),
    /// 未绑定的按键
    Ignored,
}

/// 按键遥控会话
pub struct TeleopSession<M: HighLevelMotion + ?Sized + 'static> {
    motion: Arc<M>,
    publisher: JoystickPublisher,
    gait_timeout: Duration,
    poll_interval: Duration,
}

impl<M: HighLevelMotion + ?Sized + 'static> TeleopSession<M> {
    /// 以默认频率启动摇杆发送线程
    pub fn start(motion: Arc<M>) -> Result<Self, ControlError> {
        Self::with_rate(motion, JOYSTICK_RATE_HZ)
    }

    pub fn with_rate(motion: Arc<M>, rate_hz: f64) -> Result<Self, ControlError> {
        let publisher = JoystickPublisher::spawn(Arc::clone(&motion), rate_hz)?;
        Ok(TeleopSession {
            motion,
            publisher,
            gait_timeout: DEFAULT_GAIT_TIMEOUT,
            poll_interval: GAIT_POLL_INTERVAL,
        })
    }

    pub fn with_gait_timeout(mut self, timeout: Duration) -> Self {
        self.gait_timeout = timeout;
        self
    }

    pub fn publisher(&self) -> &JoystickPublisher {
        &self.publisher
    }

    /// 处理一次按键
    ///
    /// 远端调用失败时返回错误，会话本身仍可继续使用。
    pub fn handle_key(&mut self, key: u8) -> Result<KeyOutcome, SessionError> {
        let Some(action) = TeleopAction::from_key(key) else {
            return Ok(KeyOutcome::Ignored);
        };
        match action {
            TeleopAction::Quit => return Ok(KeyOutcome::Quit),
            TeleopAction::SetGait(gait) => {
                self.motion.set_gait(gait).into_result()?;
                info!("robot gait set to {:?} successfully", gait);
            },
            TeleopAction::Trick(trick) => {
                self.motion.execute_trick(trick).into_result()?;
                info!("robot trick {:?} executed successfully", trick);
            },
            TeleopAction::Move(command) => {
                self.ensure_gait(GaitMode::DownClimbStairs)?;
                self.publisher.post(command);
            },
        }
        Ok(KeyOutcome::Handled(action))
    }

    /// 确保当前步态为 `target`：不同则切换，并轮询直到生效或超时
    pub fn ensure_gait(&self, target: GaitMode) -> Result<(), SessionError> {
        let mut reported = self.motion.get_gait()?;
        if reported == target {
            return Ok(());
        }

        self.motion.set_gait(target).into_result()?;
        let started = Instant::now();
        loop {
            reported = self.motion.get_gait()?;
            if reported == target {
                debug!("gait switched to {:?} after {:?}", target, started.elapsed());
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= self.gait_timeout {
                return Err(SessionError::GaitTimeout {
                    target,
                    reported,
                    waited,
                });
            }
            spin_sleep::sleep(self.poll_interval);
        }
    }

    /// 停止摇杆发送线程
    pub fn stop(&mut self) {
        self.publisher.post(JoystickCommand::STOP);
        self.publisher.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SimHighLevelMotion;

    #[test]
    fn test_key_map() {
        assert_eq!(TeleopAction::from_key(KEY_ESC), Some(TeleopAction::Quit));
        assert_eq!(
            TeleopAction::from_key(b'w'),
            Some(TeleopAction::Move(JoystickCommand::new(0.0, 1.0, 0.0, 0.0)))
        );
        assert_eq!(
            TeleopAction::from_key(b't'),
            Some(TeleopAction::Move(JoystickCommand::new(0.0, 0.0, -1.0, 0.0)))
        );
        assert_eq!(
            TeleopAction::from_key(b'3'),
            Some(TeleopAction::Trick(TrickAction::LieDown))
        );
        assert_eq!(TeleopAction::from_key(b'q'), None);
    }

    #[test]
    fn test_axis_clamped() {
        let cmd = JoystickCommand::new(2.0, -3.0, f32::NAN, 0.5);
        assert_eq!(cmd, JoystickCommand::new(1.0, -1.0, 0.0, 0.5));
        assert!(JoystickCommand::default().is_stop());
    }

    #[test]
    fn test_publisher_sends_latest() {
        let motion = Arc::new(SimHighLevelMotion::new());
        let mut publisher = JoystickPublisher::spawn(Arc::clone(&motion), 200.0).unwrap();
        publisher.post(JoystickCommand::new(0.0, 0.3, 0.0, 0.0));
        publisher.post(JoystickCommand::new(0.0, 1.0, 0.0, 0.0));
        std::thread::sleep(Duration::from_millis(50));
        publisher.stop();

        assert!(!publisher.is_running());
        assert!(publisher.sent() > 0);
        assert_eq!(
            motion.last_joystick(),
            Some(JoystickCommand::new(0.0, 1.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_publisher_rejects_bad_rate() {
        let motion = Arc::new(SimHighLevelMotion::new());
        assert!(JoystickPublisher::spawn(motion, 0.0).is_err());
    }

    #[test]
    fn test_move_switches_gait_first() {
        let motion = Arc::new(SimHighLevelMotion::with_gait_switch_delay(Duration::from_millis(30)));
        let mut session = TeleopSession::start(Arc::clone(&motion)).unwrap();

        let outcome = session.handle_key(b'w').unwrap();
        assert!(matches!(outcome, KeyOutcome::Handled(TeleopAction::Move(_))));
        assert_eq!(motion.get_gait().unwrap(), GaitMode::DownClimbStairs);
        assert_eq!(motion.gait_requests(), vec![GaitMode::DownClimbStairs]);

        // 已经是行走步态，不再切换
        session.handle_key(b'd').unwrap();
        assert_eq!(motion.gait_requests().len(), 1);
        session.stop();
    }

    #[test]
    fn test_gait_timeout() {
        let motion = Arc::new(SimHighLevelMotion::with_gait_switch_delay(Duration::from_secs(10)));
        let mut session = TeleopSession::start(Arc::clone(&motion))
            .unwrap()
            .with_gait_timeout(Duration::from_millis(30));

        let err = session.handle_key(b'w').unwrap_err();
        assert!(matches!(
            err,
            SessionError::GaitTimeout {
                target: GaitMode::DownClimbStairs,
                reported: GaitMode::Passive,
                ..
            }
        ));
        assert_eq!(session.handle_key(b'z').unwrap(), KeyOutcome::Ignored);
        assert_eq!(session.handle_key(KEY_ESC).unwrap(), KeyOutcome::Quit);
        session.stop();
    }
}
