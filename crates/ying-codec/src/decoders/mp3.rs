//! 基于 symphonia 的 MP3 解码后端.
//!
//! 送入的数据可能在任意位置切断 MP3 帧, 因此先在内部缓冲区中按帧头切分,
//! 凑齐一整帧后交给 symphonia 解码, 输出再转换到 44.1kHz 立体声.

use bytes::Bytes;
use log::{debug, warn};
use symphonia_bundle_mp3::MpaDecoder as SymMpaDecoder;
use symphonia_core::audio::SampleBuffer;
use symphonia_core::codecs::{
    CODEC_TYPE_MP3, CodecParameters as SymCodecParameters, Decoder as SymDecoderTrait,
    DecoderOptions as SymDecoderOptions,
};
use symphonia_core::formats::Packet as SymPacket;
use ying_core::{BufferQueue, YingError, YingResult};

use crate::audio_format::AudioFormat;
use crate::canonical::resample_to_canonical;
use crate::codec_id::AudioCodec;
use crate::decoder::AudioDecoder;

/// MPEG 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

/// MP3 帧头 (仅 Layer III)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp3FrameHeader {
    pub version: MpegVersion,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub channels: u32,
    /// 整帧字节数 (含帧头)
    pub frame_size: usize,
}

const BITRATES_V1: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V2: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

impl Mp3FrameHeader {
    /// 解析 4 字节帧头, 非 Layer III 或非法字段返回 None
    pub fn parse(header: u32) -> Option<Self> {
        if header >> 21 != 0x7FF {
            return None;
        }
        let version = match (header >> 19) & 0x3 {
            0 => MpegVersion::Mpeg25,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => return None,
        };
        // Layer III 的层字段为 01
        if (header >> 17) & 0x3 != 1 {
            return None;
        }
        let bitrate_index = ((header >> 12) & 0xF) as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let rate_index = ((header >> 10) & 0x3) as usize;
        if rate_index == 3 {
            return None;
        }
        let padding = (header >> 9) & 1;
        let channels = if (header >> 6) & 0x3 == 3 { 1 } else { 2 };

        let (bitrate_kbps, sample_rate, coefficient) = match version {
            MpegVersion::Mpeg1 => (
                BITRATES_V1[bitrate_index],
                [44100, 48000, 32000][rate_index],
                144,
            ),
            MpegVersion::Mpeg2 => (
                BITRATES_V2[bitrate_index],
                [22050, 24000, 16000][rate_index],
                72,
            ),
            MpegVersion::Mpeg25 => (
                BITRATES_V2[bitrate_index],
                [11025, 12000, 8000][rate_index],
                72,
            ),
        };
        let frame_size = (coefficient * bitrate_kbps * 1000 / sample_rate + padding) as usize;
        Some(Self {
            version,
            bitrate_kbps,
            sample_rate,
            channels,
            frame_size,
        })
    }

    /// 每帧采样数
    pub fn samples_per_frame(&self) -> u64 {
        if self.version == MpegVersion::Mpeg1 {
            1152
        } else {
            576
        }
    }
}

/// MP3 解码器
pub struct Mp3Decoder {
    format: AudioFormat,
    decoder: SymMpaDecoder,
    /// 未凑满一帧的输入
    buffer: Vec<u8>,
    output: BufferQueue,
    next_ts: u64,
}

impl Mp3Decoder {
    pub fn new(format: AudioFormat) -> YingResult<Self> {
        let params = SymCodecParameters {
            codec: CODEC_TYPE_MP3,
            ..Default::default()
        };
        let decoder = SymMpaDecoder::try_new(&params, &SymDecoderOptions::default())
            .map_err(|e| YingError::Codec(format!("symphonia mp3 初始化失败: {e}")))?;
        Ok(Self {
            format,
            decoder,
            buffer: Vec::new(),
            output: BufferQueue::new(),
            next_ts: 0,
        })
    }

    /// 从缓冲区中切出并解码所有完整帧
    fn decode_frames(&mut self) {
        let mut pos = 0;
        while pos + 4 <= self.buffer.len() {
            let word = u32::from_be_bytes([
                self.buffer[pos],
                self.buffer[pos + 1],
                self.buffer[pos + 2],
                self.buffer[pos + 3],
            ]);
            let Some(header) = Mp3FrameHeader::parse(word) else {
                pos += 1;
                continue;
            };
            if pos + header.frame_size > self.buffer.len() {
                break;
            }
            let frame = &self.buffer[pos..pos + header.frame_size];
            let packet =
                SymPacket::new_from_slice(0, self.next_ts, header.samples_per_frame(), frame);
            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut sample_buf =
                        SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    sample_buf.copy_interleaved_ref(decoded);
                    let channels = spec.channels.count();
                    let out = resample_to_canonical(sample_buf.samples(), channels, spec.rate);
                    if !out.is_empty() {
                        self.output.push(out);
                    }
                }
                Err(e) => warn!("MP3 帧解码失败, 已跳过: {}", e),
            }
            self.next_ts += header.samples_per_frame();
            pos += header.frame_size;
        }
        if pos > 0 {
            self.buffer.drain(..pos.min(self.buffer.len()));
        }
    }
}

impl AudioDecoder for Mp3Decoder {
    fn codec(&self) -> AudioCodec {
        AudioCodec::Mp3
    }

    fn name(&self) -> &str {
        "mp3 (symphonia)"
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn push(&mut self, data: Option<&Bytes>) -> YingResult<()> {
        match data {
            Some(data) => {
                self.buffer.extend_from_slice(data);
                self.decode_frames();
            }
            None => {
                if !self.buffer.is_empty() {
                    debug!("MP3 流结束, 丢弃 {} 字节不完整帧", self.buffer.len());
                    self.buffer.clear();
                }
            }
        }
        Ok(())
    }

    fn pull(&mut self) -> Option<Bytes> {
        self.output.pull_chunk()
    }
}
