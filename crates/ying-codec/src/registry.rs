//! 音频解码后端注册表.
//!
//! 后端按固定优先级排列 (内置在前, 外部在后). 查询编码能力用 [`CodecRegistry::prepare`],
//! 创建解码器用 [`CodecRegistry::create`]; 没有后端能处理时返回空解码器而不是 `None`,
//! 调用方可以统一地把 "没有解码器" 当作 "一个立即出错的解码器" 处理.
//!
//! 注册表是普通的值, 在启动时构造一次后传入音频管线, 不存在全局状态.

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use ying_core::YingError;

use crate::audio_format::AudioFormat;
use crate::codec_id::AudioCodec;
use crate::decoder::AudioDecoder;
use crate::decoders::BuiltinBackend;
use crate::decoders::null::NullDecoder;

/// 能力查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// 可以解码
    Ready,
    /// 无法解码, 附带缺失组件的描述 (用于提示用户安装)
    Missing { description: String },
}

impl Prepared {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// 解码后端
pub trait CodecBackend: Send + Sync {
    /// 后端名称
    fn name(&self) -> &str;

    /// 查询是否能解码, 不分配任何资源
    fn prepare(&self, codec: AudioCodec, format: AudioFormat) -> Prepared;

    /// 创建解码器, 不处理该编码时返回 None
    fn create(&self, codec: AudioCodec, format: AudioFormat) -> Option<Box<dyn AudioDecoder>>;
}

/// 后端种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 内置 PCM / ADPCM
    Builtin,
    /// symphonia MP3
    Symphonia,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::Symphonia => write!(f, "symphonia"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = YingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "builtin" => Ok(Self::Builtin),
            "symphonia" => Ok(Self::Symphonia),
            other => Err(YingError::InvalidArgument(format!("未知的解码后端: {}", other))),
        }
    }
}

/// 注册表配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// 按优先级排列的后端
    pub backends: Vec<BackendKind>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            backends: vec![BackendKind::Builtin, BackendKind::Symphonia],
        }
    }
}

/// 解码后端注册表
pub struct CodecRegistry {
    backends: Vec<Box<dyn CodecBackend>>,
}

impl CodecRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// 按配置构造注册表
    ///
    /// 未编译进来的后端会被跳过并告警.
    pub fn from_config(config: &CodecConfig) -> Self {
        let mut registry = Self::new();
        for kind in &config.backends {
            match kind {
                BackendKind::Builtin => registry.register_backend(Box::new(BuiltinBackend)),
                BackendKind::Symphonia => {
                    #[cfg(feature = "symphonia-backend")]
                    registry.register_backend(Box::new(crate::decoders::SymphoniaBackend));
                    #[cfg(not(feature = "symphonia-backend"))]
                    warn!("未启用 symphonia-backend 特性, 忽略 symphonia 后端");
                }
            }
        }
        registry
    }

    /// 追加一个后端 (优先级低于已注册的后端)
    pub fn register_backend(&mut self, backend: Box<dyn CodecBackend>) {
        debug!("注册音频解码后端: {}", backend.name());
        self.backends.push(backend);
    }

    /// 已注册的后端名称, 按优先级排列
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// 查询是否有后端能解码
    ///
    /// 全部后端都不能处理时, 返回第一个后端给出的缺失描述.
    pub fn prepare(&self, codec: AudioCodec, format: AudioFormat) -> Prepared {
        let mut missing = None;
        for backend in &self.backends {
            match backend.prepare(codec, format) {
                Prepared::Ready => return Prepared::Ready,
                other => {
                    missing.get_or_insert(other);
                }
            }
        }
        missing.unwrap_or_else(|| Prepared::Missing {
            description: format!("{} 音频解码器", codec),
        })
    }

    /// 按优先级尝试每个后端创建解码器, 都失败时返回空解码器
    pub fn create(&self, codec: AudioCodec, format: AudioFormat) -> Box<dyn AudioDecoder> {
        for backend in &self.backends {
            if let Some(decoder) = backend.create(codec, format) {
                debug!(
                    "后端 {} 创建解码器 {} ({})",
                    backend.name(),
                    decoder.name(),
                    format
                );
                return decoder;
            }
        }
        warn!("没有可用的 {} 解码器 ({}), 使用空解码器", codec, format);
        Box::new(NullDecoder::new(codec, format))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::from_config(&CodecConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    struct Recording(&'static str);

    impl CodecBackend for Recording {
        fn name(&self) -> &str {
            self.0
        }

        fn prepare(&self, _codec: AudioCodec, _format: AudioFormat) -> Prepared {
            Prepared::Ready
        }

        fn create(&self, codec: AudioCodec, format: AudioFormat) -> Option<Box<dyn AudioDecoder>> {
            Some(Box::new(NullDecoder::new(codec, format)))
        }
    }

    #[test]
    fn test_内置后端能力查询() {
        let registry = CodecRegistry::from_config(&CodecConfig {
            backends: vec![BackendKind::Builtin],
        });
        let fmt = AudioFormat::from_bits(0b1111);
        assert!(registry.prepare(AudioCodec::Adpcm, fmt).is_ready());
        assert!(registry.prepare(AudioCodec::Uncompressed, fmt).is_ready());
        match registry.prepare(AudioCodec::Nellymoser, fmt) {
            Prepared::Missing { description } => assert!(description.contains("nellymoser")),
            Prepared::Ready => panic!("nellymoser 不应可用"),
        }
    }

    #[test]
    fn test_无后端时返回空解码器() {
        let registry = CodecRegistry::new();
        let fmt = AudioFormat::from_bits(0b0010);
        assert!(!registry.prepare(AudioCodec::Adpcm, fmt).is_ready());
        let mut dec = registry.create(AudioCodec::Speex, fmt);
        assert_eq!(dec.name(), "null");
        assert!(dec.has_error());
        assert!(dec.push(Some(&Bytes::from_static(&[1, 2]))).is_err());
        assert!(dec.pull().is_none());
    }

    #[test]
    fn test_后端优先级() {
        let mut registry = CodecRegistry::new();
        registry.register_backend(Box::new(BuiltinBackend));
        registry.register_backend(Box::new(Recording("fallback")));
        assert_eq!(registry.backend_names(), vec!["builtin", "fallback"]);
        let fmt = AudioFormat::from_bits(0b1110);
        assert_eq!(registry.create(AudioCodec::UncompressedLe, fmt).name(), "pcm_s16le");
        assert_eq!(registry.create(AudioCodec::Adpcm, fmt).name(), "adpcm");
        // 内置后端不支持时落到下一个后端
        assert!(registry.prepare(AudioCodec::Nellymoser8k, fmt).is_ready());
    }

    #[test]
    fn test_配置序列化() {
        let config: CodecConfig = serde_json::from_str(r#"{"backends":["symphonia"]}"#).unwrap();
        assert_eq!(config.backends, vec![BackendKind::Symphonia]);
        let config: CodecConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CodecConfig::default());
        assert_eq!("Builtin".parse::<BackendKind>().unwrap(), BackendKind::Builtin);
        assert!("gstreamer".parse::<BackendKind>().is_err());
    }

    #[cfg(feature = "symphonia-backend")]
    #[test]
    fn test_默认配置包含_symphonia() {
        let registry = CodecRegistry::default();
        assert_eq!(registry.backend_names(), vec!["builtin", "symphonia"]);
        let fmt = AudioFormat::from_bits(0b1111);
        assert!(registry.prepare(AudioCodec::Mp3, fmt).is_ready());
        assert_eq!(registry.create(AudioCodec::Mp3, fmt).name(), "mp3 (symphonia)");
    }
}
