//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 输出，过滤规则取自 `RUST_LOG`，
//! 未设置时使用 [`DEFAULT_LOG_FILTER`]。依赖中通过 `log` 输出的记录
//! 经 `tracing-log` 转发。重复调用不会报错。

use tracing_subscriber::EnvFilter;

/// 默认过滤规则（库和示例程序都输出 info 及以上）
pub const DEFAULT_LOG_FILTER: &str = "info";

/// 以默认过滤规则初始化日志，返回本次调用是否完成了安装
pub fn init_logging() -> bool {
    init_logging_with(DEFAULT_LOG_FILTER)
}

/// 以指定的默认过滤规则初始化日志（`RUST_LOG` 优先）
pub fn init_logging_with(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    // 已有其他 log 实现时保持原样
    let _ = tracing_log::LogTracer::init();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_keeps_example_targets() {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(DEFAULT_LOG_FILTER))
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "magic_client::control::loop_runner", tracing::Level::INFO));
            assert!(tracing::enabled!(target: "high_level_walk", tracing::Level::INFO));
            assert!(tracing::enabled!(target: "joystick_teleop", tracing::Level::INFO));
            assert!(!tracing::enabled!(target: "high_level_walk", tracing::Level::DEBUG));
        });
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        assert!(!init_logging());
        assert!(!init_logging_with("debug"));
    }
}
