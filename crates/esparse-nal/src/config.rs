//! 解析器配置.
//!
//! 可以直接构造, 也可以从 JSON 加载; 缺省字段取默认值.

use esparse_core::{EsError, EsResult};
use serde::{Deserialize, Serialize};

/// 基本流解析器配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ParserConfig {
    /// 输出帧与配置记录中 NALU 长度前缀的字节数 (1-4)
    pub nalu_size_length: usize,
    /// 是否保留 SPS 中的宽高比信息; 为 false 时 SPS 被重写为不含 aspect_ratio_info
    pub keep_ar_info: bool,
    /// 强制使用的帧时长 (纳秒), 优先于码流中的 timing 信息
    pub forced_default_duration: Option<i64>,
    /// 容器提供的默认帧时长 (纳秒)
    pub container_default_duration: Option<i64>,
    /// NALU 超出长度前缀范围时只告警并截断写入, 不返回错误
    pub ignore_nalu_size_length_errors: bool,
    /// 只统计时间戳和帧时长, 丢弃帧数据 (仅探测头部)
    pub discard_actual_frames: bool,
    /// 自上一关键帧以来没有出现 B 切片时, 把非随机访问类型的 I 帧也视为关键帧
    pub keyframes_without_b_frames: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            nalu_size_length: 4,
            keep_ar_info: true,
            forced_default_duration: None,
            container_default_duration: None,
            ignore_nalu_size_length_errors: false,
            discard_actual_frames: false,
            keyframes_without_b_frames: false,
        }
    }
}

impl ParserConfig {
    /// 从 JSON 文本加载配置并校验
    pub fn from_json(text: &str) -> EsResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| EsError::InvalidArgument(format!("解析配置失败: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置取值
    pub fn validate(&self) -> EsResult<()> {
        if !(1..=4).contains(&self.nalu_size_length) {
            return Err(EsError::InvalidArgument(format!(
                "nalu_size_length 必须为 1-4, 实际为 {}",
                self.nalu_size_length
            )));
        }
        for (name, value) in [
            ("forced_default_duration", self.forced_default_duration),
            ("container_default_duration", self.container_default_duration),
        ] {
            if value.is_some_and(|v| v <= 0) {
                return Err(EsError::InvalidArgument(format!(
                    "{} 必须为正数",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.nalu_size_length, 4);
        assert!(config.keep_ar_info);
        assert!(!config.keyframes_without_b_frames);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = ParserConfig::from_json(r#"{"nalu_size_length": 2, "keep_ar_info": false}"#)
            .unwrap();
        assert_eq!(config.nalu_size_length, 2);
        assert!(!config.keep_ar_info);
        assert_eq!(config.forced_default_duration, None, "缺省字段应取默认值");
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(ParserConfig::from_json(r#"{"nalu_size_length": 8}"#).is_err());
        assert!(ParserConfig::from_json(r#"{"forced_default_duration": -1}"#).is_err());
        assert!(ParserConfig::from_json("not json").is_err());
    }
}
