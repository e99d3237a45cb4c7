//! 空解码器.
//!
//! 没有任何后端能处理某个编码时, 注册表返回它代替 "无解码器".
//! 它从创建起就处于错误状态, 从不产生数据.

use bytes::Bytes;
use ying_core::{YingError, YingResult};

use crate::audio_format::AudioFormat;
use crate::codec_id::AudioCodec;
use crate::decoder::AudioDecoder;

pub struct NullDecoder {
    codec: AudioCodec,
    format: AudioFormat,
}

impl NullDecoder {
    pub fn new(codec: AudioCodec, format: AudioFormat) -> Self {
        Self { codec, format }
    }
}

impl AudioDecoder for NullDecoder {
    fn codec(&self) -> AudioCodec {
        self.codec
    }

    fn name(&self) -> &str {
        "null"
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn push(&mut self, _data: Option<&Bytes>) -> YingResult<()> {
        Err(YingError::CodecNotFound(format!(
            "{} ({})",
            self.codec, self.format
        )))
    }

    fn pull(&mut self) -> Option<Bytes> {
        None
    }

    fn has_error(&self) -> bool {
        true
    }
}
