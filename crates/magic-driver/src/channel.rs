//! 遥测/命令交换通道
//!
//! 传输层分成两半：
//!
//! - 接收端把最新的 [`InputData`] 写进 [`FeedbackSlot`]（ArcSwap，写入即覆盖）
//! - 发送端实现 [`CommandSink`]，负责把 [`OutputData`] 交给链路
//!
//! [`Exchange`] 把两者组合成控制循环使用的 [`ExchangeChannel`]。
//! 读取永不阻塞：没有新快照时返回上一次的值并标记 `stale`。

use crate::error::DriverError;
use crate::heartbeat::ConnectionMonitor;
use crate::metrics::ExchangeMetrics;
use arc_swap::ArcSwap;
use magic_protocol::{InputData, OutputData};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

/// 一次遥测读取的结果
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Telemetry {
    /// 最新快照（离线时为最后一次已知值）
    pub data: InputData,
    /// 快照序号，从 1 开始；0 表示从未收到反馈
    pub sequence: u64,
    /// 自上次读取以来没有新快照，或链路已断开
    pub stale: bool,
}

/// 控制循环看到的交换通道
pub trait ExchangeChannel {
    /// 链路是否存活（非阻塞）
    fn is_connected(&self) -> bool;

    /// 读取最新遥测（非阻塞）
    fn receive_telemetry(&self) -> Telemetry;

    /// 发送一条命令（不等待设备确认）
    fn send_command(&self, cmd: &OutputData) -> Result<(), DriverError>;
}

impl<T: ExchangeChannel + ?Sized> ExchangeChannel for Arc<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn receive_telemetry(&self) -> Telemetry {
        (**self).receive_telemetry()
    }

    fn send_command(&self, cmd: &OutputData) -> Result<(), DriverError> {
        (**self).send_command(cmd)
    }
}

impl<T: ExchangeChannel + ?Sized> ExchangeChannel for &T {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn receive_telemetry(&self) -> Telemetry {
        (**self).receive_telemetry()
    }

    fn send_command(&self, cmd: &OutputData) -> Result<(), DriverError> {
        (**self).send_command(cmd)
    }
}

/// 传输层的命令出口
pub trait CommandSink: Send + Sync {
    fn publish(&self, cmd: &OutputData) -> Result<(), DriverError>;
}

impl<T: CommandSink + ?Sized> CommandSink for Arc<T> {
    fn publish(&self, cmd: &OutputData) -> Result<(), DriverError> {
        (**self).publish(cmd)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Sample {
    data: InputData,
    sequence: u64,
}

/// 最新反馈快照的存放处
///
/// 单写者（传输接收端）多读者。写入同时刷新连接监视器并计入指标，
/// 接在同一个反馈槽上的 [`Exchange`] 共享这份指标。
#[derive(Debug)]
pub struct FeedbackSlot {
    latest: ArcSwap<Sample>,
    next_sequence: AtomicU64,
    monitor: ConnectionMonitor,
    metrics: Arc<ExchangeMetrics>,
}

impl FeedbackSlot {
    pub fn new(connection_timeout: Duration) -> Self {
        Self {
            latest: ArcSwap::from_pointee(Sample::default()),
            next_sequence: AtomicU64::new(1),
            monitor: ConnectionMonitor::new(connection_timeout),
            metrics: Arc::new(ExchangeMetrics::new()),
        }
    }

    /// 写入新快照，返回分配的序号
    pub fn publish(&self, data: InputData) -> u64 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.latest.store(Arc::new(Sample { data, sequence }));
        self.monitor.register_feedback();
        self.metrics.feedback_updates.fetch_add(1, Ordering::Relaxed);
        sequence
    }

    /// 最新快照及其序号
    pub fn latest(&self) -> (InputData, u64) {
        let sample = self.latest.load();
        (sample.data, sample.sequence)
    }

    pub fn is_alive(&self) -> bool {
        self.monitor.check_connection()
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    pub fn metrics(&self) -> &Arc<ExchangeMetrics> {
        &self.metrics
    }
}

/// [`FeedbackSlot`] + [`CommandSink`] 组成的交换通道
///
/// 发送前校验关节命令（增益非负、目标有限），不合法的命令不会到达传输层。
pub struct Exchange<S> {
    feedback: Arc<FeedbackSlot>,
    sink: S,
    last_read: AtomicU64,
    metrics: Arc<ExchangeMetrics>,
}

impl<S: CommandSink> Exchange<S> {
    pub fn new(feedback: Arc<FeedbackSlot>, sink: S) -> Self {
        let metrics = Arc::clone(feedback.metrics());
        Self {
            feedback,
            sink,
            last_read: AtomicU64::new(0),
            metrics,
        }
    }

    pub fn feedback(&self) -> &Arc<FeedbackSlot> {
        &self.feedback
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn metrics(&self) -> &Arc<ExchangeMetrics> {
        &self.metrics
    }
}

impl<S: CommandSink> ExchangeChannel for Exchange<S> {
    fn is_connected(&self) -> bool {
        self.feedback.is_alive()
    }

    fn receive_telemetry(&self) -> Telemetry {
        let (data, sequence) = self.feedback.latest();
        let previous = self.last_read.swap(sequence, Ordering::Relaxed);
        let stale = sequence == 0 || sequence == previous || !self.feedback.is_alive();

        self.metrics.telemetry_reads.fetch_add(1, Ordering::Relaxed);
        if stale {
            self.metrics.stale_reads.fetch_add(1, Ordering::Relaxed);
        }
        trace!("telemetry seq={} stale={}", sequence, stale);

        Telemetry {
            data,
            sequence,
            stale,
        }
    }

    fn send_command(&self, cmd: &OutputData) -> Result<(), DriverError> {
        let result = cmd
            .motor_cmd
            .validate()
            .map_err(DriverError::from)
            .and_then(|()| self.sink.publish(cmd));

        match &result {
            Ok(()) => self.metrics.commands_sent.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.metrics.send_failures.fetch_add(1, Ordering::Relaxed),
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magic_protocol::{FsmState, JointArray, MotorCmd};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<OutputData>>,
    }

    impl CommandSink for RecordingSink {
        fn publish(&self, cmd: &OutputData) -> Result<(), DriverError> {
            self.sent.lock().push(*cmd);
            Ok(())
        }
    }

    fn exchange() -> Exchange<RecordingSink> {
        let slot = Arc::new(FeedbackSlot::new(Duration::from_secs(1)));
        Exchange::new(slot, RecordingSink::default())
    }

    #[test]
    fn test_disconnected_until_first_feedback() {
        let ex = exchange();
        assert!(!ex.is_connected());

        let telemetry = ex.receive_telemetry();
        assert_eq!(telemetry.sequence, 0);
        assert!(telemetry.stale);

        ex.feedback().publish(InputData::default());
        assert!(ex.is_connected());
    }

    #[test]
    fn test_duplicate_reads_are_stale_not_errors() {
        let ex = exchange();
        let mut input = InputData::default();
        input.robot_fsm_data = FsmState::Trot.code();
        ex.feedback().publish(input);

        let first = ex.receive_telemetry();
        assert!(!first.stale);
        assert_eq!(first.data.robot_fsm_data, 4);

        let second = ex.receive_telemetry();
        assert!(second.stale);
        assert_eq!(second.sequence, first.sequence);
        assert_eq!(second.data, first.data);

        ex.feedback().publish(input);
        assert!(!ex.receive_telemetry().stale);

        let snap = ex.metrics().snapshot();
        assert_eq!(snap.feedback_updates, 2);
        assert_eq!(snap.telemetry_reads, 3);
        assert_eq!(snap.stale_reads, 1);
    }

    #[test]
    fn test_lost_link_keeps_last_known_value() {
        let ex = exchange();
        let mut input = InputData::default();
        input.robot_fsm_data = FsmState::BalanceStand.code();
        ex.feedback().publish(input);
        ex.feedback().monitor().mark_lost();

        let telemetry = ex.receive_telemetry();
        assert!(telemetry.stale);
        assert_eq!(telemetry.data.robot_fsm_data, FsmState::BalanceStand.code());
    }

    #[test]
    fn test_send_rejects_negative_gain() {
        let ex = exchange();
        let mut motor = MotorCmd::position(JointArray::splat(0.0), 100.0, 1.2);
        motor.kp[5] = -1.0;
        let cmd = OutputData::fsm(FsmState::LowLevelControl).with_motor(motor);

        assert!(matches!(ex.send_command(&cmd), Err(DriverError::Protocol(_))));
        assert!(ex.sink().sent.lock().is_empty());
        assert_eq!(ex.metrics().snapshot().send_failures, 1);
    }

    #[test]
    fn test_send_forwards_valid_command() {
        let ex = exchange();
        let cmd = OutputData::fsm(FsmState::Passive);
        ex.send_command(&cmd).unwrap();
        assert_eq!(ex.sink().sent.lock().as_slice(), &[cmd]);
        assert_eq!(ex.metrics().snapshot().commands_sent, 1);
    }
}
