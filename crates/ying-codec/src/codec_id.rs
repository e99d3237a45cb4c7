//! 编解码器标识符.
//!
//! SWF 声音标签与 FLV 音频标签共用同一个 4 位音频编码字段,
//! FLV 视频标签使用 4 位视频编码字段.

use std::fmt;

/// 音频编解码器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    /// 未压缩, 平台字节序 (id 0)
    ///
    /// 字节序未定义, 按小端处理, 解码时等同于 [`AudioCodec::UncompressedLe`].
    Uncompressed,
    /// SWF ADPCM (id 1)
    Adpcm,
    /// MP3 (id 2)
    Mp3,
    /// 未压缩, 小端 (id 3)
    UncompressedLe,
    /// Nellymoser 16kHz 单声道 (id 4)
    Nellymoser16k,
    /// Nellymoser 8kHz 单声道 (id 5)
    Nellymoser8k,
    /// Nellymoser (id 6)
    Nellymoser,
    /// Speex (id 11)
    Speex,
    /// 其他未知编码
    Unknown(u8),
}

impl AudioCodec {
    /// 由 4 位编码字段构造
    pub fn from_id(id: u8) -> Self {
        match id {
            0 => Self::Uncompressed,
            1 => Self::Adpcm,
            2 => Self::Mp3,
            3 => Self::UncompressedLe,
            4 => Self::Nellymoser16k,
            5 => Self::Nellymoser8k,
            6 => Self::Nellymoser,
            11 => Self::Speex,
            other => Self::Unknown(other),
        }
    }

    /// 编码字段数值
    pub fn id(self) -> u8 {
        match self {
            Self::Uncompressed => 0,
            Self::Adpcm => 1,
            Self::Mp3 => 2,
            Self::UncompressedLe => 3,
            Self::Nellymoser16k => 4,
            Self::Nellymoser8k => 5,
            Self::Nellymoser => 6,
            Self::Speex => 11,
            Self::Unknown(id) => id,
        }
    }

    /// 解析平台字节序别名后的编码
    pub fn resolved(self) -> Self {
        match self {
            Self::Uncompressed => Self::UncompressedLe,
            other => other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Uncompressed => "uncompressed",
            Self::Adpcm => "adpcm",
            Self::Mp3 => "mp3",
            Self::UncompressedLe => "uncompressed_le",
            Self::Nellymoser16k => "nellymoser_16k",
            Self::Nellymoser8k => "nellymoser_8k",
            Self::Nellymoser => "nellymoser",
            Self::Speex => "speex",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(id) => write!(f, "unknown({})", id),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// 视频编解码器 (FLV / DefineVideo)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    /// Sorenson H.263 (id 2)
    H263,
    /// Screen Video (id 3)
    ScreenVideo,
    /// On2 VP6 (id 4)
    Vp6,
    /// On2 VP6 带 alpha 通道 (id 5)
    Vp6Alpha,
    /// Screen Video 2 (id 6)
    ScreenVideo2,
    /// H.264 (id 7)
    H264,
    Unknown(u8),
}

impl VideoCodec {
    pub fn from_id(id: u8) -> Self {
        match id {
            2 => Self::H263,
            3 => Self::ScreenVideo,
            4 => Self::Vp6,
            5 => Self::Vp6Alpha,
            6 => Self::ScreenVideo2,
            7 => Self::H264,
            other => Self::Unknown(other),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Self::H263 => 2,
            Self::ScreenVideo => 3,
            Self::Vp6 => 4,
            Self::Vp6Alpha => 5,
            Self::ScreenVideo2 => 6,
            Self::H264 => 7,
            Self::Unknown(id) => id,
        }
    }

    /// VP6 系列在 FLV 中每帧前多一个尺寸调整字节
    pub fn has_adjustment_byte(self) -> bool {
        matches!(self, Self::Vp6 | Self::Vp6Alpha)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::H263 => "h263",
            Self::ScreenVideo => "screen_video",
            Self::Vp6 => "vp6",
            Self::Vp6Alpha => "vp6_alpha",
            Self::ScreenVideo2 => "screen_video2",
            Self::H264 => "h264",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(id) => write!(f, "unknown({})", id),
            other => write!(f, "{}", other.name()),
        }
    }
}
