//! 驱动层
//!
//! 主机与机器人之间的遥测/命令交换，包括：
//! - 交换通道（最新快照无锁读取，发送前校验）
//! - 连接监视（单调时间，无锁）
//! - 固定周期时钟（`spin_sleep` 低抖动等待）
//! - 单槽邮箱（最新值覆盖）
//! - 进程内模拟设备
//!
//! 本 crate 不包含网络传输；真实链路只需实现 [`CommandSink`] 并向
//! [`FeedbackSlot`] 写入反馈。

pub mod channel;
pub mod cycle;
mod error;
pub mod heartbeat;
pub mod mailbox;
pub mod metrics;
pub mod sim;

pub use channel::{CommandSink, Exchange, ExchangeChannel, FeedbackSlot, Telemetry};
pub use cycle::{CycleClock, CycleReport, DriftPolicy};
pub use error::{DriverError, Result};
pub use heartbeat::ConnectionMonitor;
pub use mailbox::Mailbox;
pub use metrics::{ExchangeMetrics, ExchangeMetricsSnapshot};
pub use sim::{SimConfig, SimRobot};
