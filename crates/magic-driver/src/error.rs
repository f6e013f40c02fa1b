//! 驱动层错误类型定义

use magic_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 协议校验错误（命令在发送前被拒绝）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 命令出口已关闭（传输端退出）
    #[error("Command sink closed")]
    SinkClosed,

    /// 链路未连接
    #[error("Link not connected")]
    NotConnected,

    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(String),

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,
}

impl DriverError {
    /// 是否为瞬时错误（下一个周期重试即可）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DriverError::NotConnected | DriverError::Transport(_) | DriverError::Timeout
        )
    }
}

/// 驱动层 Result 别名
pub type Result<T> = std::result::Result<T, DriverError>;
