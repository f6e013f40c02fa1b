//! 控制层错误类型

use magic_driver::DriverError;
use magic_protocol::{IllegalTransition, ProtocolError};
use std::path::PathBuf;
use thiserror::Error;

/// 控制层错误
#[derive(Error, Debug)]
pub enum ControlError {
    /// 交换通道错误
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 协议错误（如未知 FSM 状态码）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 非法 FSM 转换
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    /// 配置无效
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// 配置文件读取失败
    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 轨迹或相位表无效
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// 控制器内部错误
    #[error("Controller error: {0}")]
    Controller(String),

    /// 后台线程启动失败
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl ControlError {
    /// 下一个周期重试是否可能成功
    pub fn is_retryable(&self) -> bool {
        match self {
            ControlError::Driver(e) => e.is_transient(),
            _ => false,
        }
    }

    /// 是否为配置类错误（启动前即可发现）
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ControlError::Config(_) | ControlError::ConfigIo { .. } | ControlError::InvalidPlan(_)
        )
    }
}

/// 控制层 Result 别名
pub type Result<T> = std::result::Result<T, ControlError>;
