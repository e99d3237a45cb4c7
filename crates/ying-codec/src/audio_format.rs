//! 音频源格式.
//!
//! 4 位格式字段: bit0 = 立体声, bit1 = 16 位, bit2-3 = 采样率等级
//! (0 = 5512Hz, 1 = 11025Hz, 2 = 22050Hz, 3 = 44100Hz).

use std::fmt;

/// 规范输出采样率
pub const CANONICAL_RATE: u32 = 44100;

/// 规范输出每个采样帧的字节数 (立体声 s16)
pub const CANONICAL_FRAME_BYTES: usize = 4;

/// 采样率等级对应的采样率
const RATES: [u32; 4] = [5512, 11025, 22050, 44100];

/// 音频源格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    /// 采样率等级 (0-3)
    rate_index: u8,
    /// 是否 16 位
    pub is_16bit: bool,
    /// 是否立体声
    pub is_stereo: bool,
}

impl AudioFormat {
    /// 规范格式: 44100Hz, 16 位, 立体声
    pub const CANONICAL: AudioFormat = AudioFormat {
        rate_index: 3,
        is_16bit: true,
        is_stereo: true,
    };

    /// 由 4 位格式字段构造, 高位被忽略
    pub fn from_bits(bits: u8) -> Self {
        Self {
            rate_index: (bits >> 2) & 0x3,
            is_16bit: bits & 0x2 != 0,
            is_stereo: bits & 0x1 != 0,
        }
    }

    /// 由采样率 (必须是四个标准值之一) 构造
    pub fn new(rate: u32, is_16bit: bool, is_stereo: bool) -> Option<Self> {
        let rate_index = RATES.iter().position(|&r| r == rate)? as u8;
        Some(Self {
            rate_index,
            is_16bit,
            is_stereo,
        })
    }

    /// 编码为 4 位格式字段
    pub fn to_bits(self) -> u8 {
        (self.rate_index << 2) | (u8::from(self.is_16bit) << 1) | u8::from(self.is_stereo)
    }

    pub fn rate_index(self) -> u8 {
        self.rate_index
    }

    /// 采样率 (Hz)
    pub fn rate(self) -> u32 {
        RATES[self.rate_index as usize]
    }

    /// 声道数
    pub fn channels(self) -> usize {
        if self.is_stereo { 2 } else { 1 }
    }

    /// 每个源采样在 44.1kHz 规范流中占据的帧数 (1/2/4/8)
    pub fn granularity(self) -> usize {
        1 << (3 - self.rate_index)
    }

    /// 源采样数换算为规范流帧数
    pub fn to_canonical_frames(self, samples: u64) -> u64 {
        samples * self.granularity() as u64
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz {}bit {}",
            self.rate(),
            if self.is_16bit { 16 } else { 8 },
            if self.is_stereo { "stereo" } else { "mono" },
        )
    }
}
