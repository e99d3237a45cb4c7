//! 未压缩 PCM 解码器.
//!
//! 8 位无符号与 16 位小端有符号两种变体共用解码逻辑.
//! 不足一个采样帧的尾部字节保留到下一次 `push`.

use bytes::Bytes;
use log::warn;
use ying_core::{BufferQueue, YingResult};

use crate::audio_format::AudioFormat;
use crate::canonical::expand_to_canonical;
use crate::codec_id::AudioCodec;
use crate::decoder::AudioDecoder;

/// PCM 格式描述, 描述各 PCM 变体的差异
struct PcmFormatDesc {
    /// 码流中每个样本的字节数
    bytes_per_sample: usize,
    /// 解码转换函数: 将码流字节转换为 s16 采样
    decode_fn: fn(&[u8], &mut Vec<i16>),
}

/// U8 转 S16: 去掉 128 偏移后左移 8 位
fn decode_u8(src: &[u8], dst: &mut Vec<i16>) {
    dst.extend(src.iter().map(|&b| (i16::from(b) - 128) << 8));
}

fn decode_s16le(src: &[u8], dst: &mut Vec<i16>) {
    dst.extend(
        src.chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]])),
    );
}

fn pcm_format_desc(format: AudioFormat) -> PcmFormatDesc {
    if format.is_16bit {
        PcmFormatDesc {
            bytes_per_sample: 2,
            decode_fn: decode_s16le,
        }
    } else {
        PcmFormatDesc {
            bytes_per_sample: 1,
            decode_fn: decode_u8,
        }
    }
}

/// 未压缩 PCM 解码器
pub struct PcmDecoder {
    codec: AudioCodec,
    format: AudioFormat,
    desc: PcmFormatDesc,
    /// 未凑满一个采样帧的残余字节
    pending: Vec<u8>,
    output: BufferQueue,
}

impl PcmDecoder {
    /// 创建解码器, `codec` 为 0 号 (平台字节序) 或 3 号 (小端)
    pub fn new(codec: AudioCodec, format: AudioFormat) -> Self {
        Self {
            codec,
            format,
            desc: pcm_format_desc(format),
            pending: Vec::new(),
            output: BufferQueue::new(),
        }
    }

    fn frame_bytes(&self) -> usize {
        self.desc.bytes_per_sample * self.format.channels()
    }
}

impl AudioDecoder for PcmDecoder {
    fn codec(&self) -> AudioCodec {
        self.codec
    }

    fn name(&self) -> &str {
        if self.format.is_16bit {
            "pcm_s16le"
        } else {
            "pcm_u8"
        }
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn push(&mut self, data: Option<&Bytes>) -> YingResult<()> {
        let Some(data) = data else {
            if !self.pending.is_empty() {
                warn!(
                    "PCM 流结束时有 {} 字节不足一个采样帧, 已丢弃",
                    self.pending.len()
                );
                self.pending.clear();
            }
            return Ok(());
        };
        self.pending.extend_from_slice(data);
        let frame_bytes = self.frame_bytes();
        let whole = self.pending.len() / frame_bytes * frame_bytes;
        if whole == 0 {
            return Ok(());
        }
        let mut samples = Vec::with_capacity(whole / self.desc.bytes_per_sample);
        (self.desc.decode_fn)(&self.pending[..whole], &mut samples);
        self.pending.drain(..whole);
        self.output.push(expand_to_canonical(
            &samples,
            self.format.channels(),
            self.format.granularity(),
        ));
        Ok(())
    }

    fn pull(&mut self) -> Option<Bytes> {
        self.output.pull_chunk()
    }
}
