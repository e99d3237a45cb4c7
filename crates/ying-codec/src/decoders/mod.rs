//! 解码器实现模块.
//!
//! 内置后端处理未压缩 PCM 与 ADPCM; MP3 由可选的 symphonia 后端处理.

pub mod adpcm;
#[cfg(feature = "symphonia-backend")]
pub mod mp3;
pub mod null;
pub mod pcm;

use crate::audio_format::AudioFormat;
use crate::codec_id::AudioCodec;
use crate::decoder::AudioDecoder;
use crate::registry::{CodecBackend, Prepared};

/// 内置解码后端
#[derive(Debug, Default)]
pub struct BuiltinBackend;

impl CodecBackend for BuiltinBackend {
    fn name(&self) -> &str {
        "builtin"
    }

    fn prepare(&self, codec: AudioCodec, _format: AudioFormat) -> Prepared {
        match codec.resolved() {
            AudioCodec::UncompressedLe | AudioCodec::Adpcm => Prepared::Ready,
            other => Prepared::Missing {
                description: format!("{} 音频解码器", other),
            },
        }
    }

    fn create(&self, codec: AudioCodec, format: AudioFormat) -> Option<Box<dyn AudioDecoder>> {
        match codec.resolved() {
            AudioCodec::UncompressedLe => Some(Box::new(pcm::PcmDecoder::new(codec, format))),
            AudioCodec::Adpcm => Some(Box::new(adpcm::AdpcmDecoder::new(format))),
            _ => None,
        }
    }
}

/// symphonia 外部解码后端 (MP3)
#[cfg(feature = "symphonia-backend")]
#[derive(Debug, Default)]
pub struct SymphoniaBackend;

#[cfg(feature = "symphonia-backend")]
impl CodecBackend for SymphoniaBackend {
    fn name(&self) -> &str {
        "symphonia"
    }

    fn prepare(&self, codec: AudioCodec, _format: AudioFormat) -> Prepared {
        if codec == AudioCodec::Mp3 {
            Prepared::Ready
        } else {
            Prepared::Missing {
                description: format!("{} 音频解码器", codec),
            }
        }
    }

    fn create(&self, codec: AudioCodec, format: AudioFormat) -> Option<Box<dyn AudioDecoder>> {
        if codec != AudioCodec::Mp3 {
            return None;
        }
        match mp3::Mp3Decoder::new(format) {
            Ok(dec) => Some(Box::new(dec)),
            Err(e) => {
                log::warn!("创建 symphonia MP3 解码器失败: {}", e);
                None
            }
        }
    }
}
