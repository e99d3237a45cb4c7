//! # ying-codec
//!
//! Ying 音频解码管线: 编解码器标识、音频格式字段、解码器 trait 与后端注册表.
//!
//! 所有解码器输出统一的规范格式: 44.1kHz、立体声、s16 小端交错.
//! 低于 44.1kHz 的源按整数倍重复上采样.
//!
//! ## 使用示例
//!
//! ```rust
//! use bytes::Bytes;
//! use ying_codec::{AudioCodec, AudioFormat, CodecConfig, CodecRegistry};
//!
//! let registry = CodecRegistry::from_config(&CodecConfig::default());
//! let format = AudioFormat::from_bits(0b1110);
//! let mut decoder = registry.create(AudioCodec::UncompressedLe, format);
//! decoder.push(Some(&Bytes::from_static(&[0x10, 0x00]))).unwrap();
//! while let Some(buf) = decoder.pull() {
//!     assert_eq!(buf.len() % 4, 0);
//! }
//! ```

pub mod audio_format;
pub mod canonical;
pub mod codec_id;
pub mod decoder;
pub mod decoders;
pub mod registry;

// 重导出常用类型
pub use audio_format::{AudioFormat, CANONICAL_FRAME_BYTES, CANONICAL_RATE};
pub use codec_id::{AudioCodec, VideoCodec};
pub use decoder::AudioDecoder;
pub use registry::{BackendKind, CodecBackend, CodecConfig, CodecRegistry, Prepared};
