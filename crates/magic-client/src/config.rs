//! 控制循环配置
//!
//! 可以直接构造，也可以从 TOML 加载（缺省字段取默认值）：
//!
//! ```toml
//! frequency_hz = 500.0
//! settle_period_ms = 1000
//! connection_timeout_ms = 100
//! max_lag_periods = 50
//! drift_policy = "accumulate"
//! max_ticks = 30000
//! ```

use crate::error::ControlError;
use magic_driver::DriftPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// 控制循环配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    /// 控制频率（Hz），设备端为 500Hz
    pub frequency_hz: f64,

    /// 首次进入时等待设备回到 Passive 的时长（ms）
    pub settle_period_ms: u64,

    /// 多久没有反馈视为断线（ms）
    pub connection_timeout_ms: u64,

    /// 超过多少个周期的落后放弃追赶（0 表示永远追赶）
    pub max_lag_periods: u32,

    /// 超时后的锚点策略
    pub drift_policy: DriftPolicy,

    /// 最多运行多少个周期（`None` 表示直到控制器结束或收到停止信号）
    pub max_ticks: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            frequency_hz: 500.0,
            settle_period_ms: 1000,
            connection_timeout_ms: 100,
            max_lag_periods: 50,
            drift_policy: DriftPolicy::Accumulate,
            max_ticks: None,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), ControlError> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(ControlError::Config(format!(
                "Invalid frequency_hz: {} (must be > 0)",
                self.frequency_hz
            )));
        }
        if self.frequency_hz > 10000.0 {
            return Err(ControlError::Config(format!(
                "Invalid frequency_hz: {} (must be <= 10000)",
                self.frequency_hz
            )));
        }
        if self.frequency_hz > 500.0 {
            warn!(
                "Control frequency {} Hz exceeds the 500 Hz device rate; telemetry will repeat",
                self.frequency_hz
            );
        }
        if self.connection_timeout_ms == 0 {
            return Err(ControlError::Config(
                "connection_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.connection_timeout() <= self.period() {
            return Err(ControlError::Config(format!(
                "connection_timeout_ms ({}) must exceed one control period ({:?})",
                self.connection_timeout_ms,
                self.period()
            )));
        }
        Ok(())
    }

    /// 控制周期
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency_hz)
    }

    pub fn settle_period(&self) -> Duration {
        Duration::from_millis(self.settle_period_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(text: &str) -> Result<Self, ControlError> {
        let config: LoopConfig =
            toml::from_str(text).map_err(|e| ControlError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ControlError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ControlError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, ControlError> {
        toml::to_string(self).map_err(|e| ControlError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_device() {
        let config = LoopConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.period(), Duration::from_millis(2));
        assert_eq!(config.settle_period(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = LoopConfig::from_toml_str("settle_period_ms = 50\ndrift_policy = \"reset\"").unwrap();
        assert_eq!(config.settle_period_ms, 50);
        assert_eq!(config.drift_policy, DriftPolicy::Reset);
        assert_eq!(config.frequency_hz, 500.0);
        assert_eq!(config.max_ticks, None);
    }

    #[test]
    fn test_rejects_unknown_field() {
        let err = LoopConfig::from_toml_str("frequency = 500.0").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_rejects_bad_frequency() {
        assert!(LoopConfig::from_toml_str("frequency_hz = 0.0").is_err());
        assert!(LoopConfig::from_toml_str("frequency_hz = -5.0").is_err());
        assert!(LoopConfig::from_toml_str("frequency_hz = 20000.0").is_err());
    }

    #[test]
    fn test_rejects_timeout_shorter_than_period() {
        let config = LoopConfig {
            frequency_hz: 100.0,
            connection_timeout_ms: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "frequency_hz = 250.0").unwrap();
        writeln!(file, "max_ticks = 1000").unwrap();

        let config = LoopConfig::load(file.path()).unwrap();
        assert_eq!(config.frequency_hz, 250.0);
        assert_eq!(config.max_ticks, Some(1000));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoopConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ControlError::ConfigIo { .. }));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = LoopConfig {
            max_ticks: Some(42),
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(LoopConfig::from_toml_str(&text).unwrap(), config);
    }
}
