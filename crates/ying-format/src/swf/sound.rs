//! 声音相关标签: DefineSound, StartSound, SoundStreamHead, SoundStreamBlock.

use bytes::Bytes;
use log::{debug, warn};
use ying_codec::{AudioCodec, AudioFormat};
use ying_core::{BitReader, YingResult};

use super::character::Character;
use super::context::TagContext;
use super::tags;

/// 事件声音角色 (DefineSound)
#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    pub id: u16,
    pub codec: AudioCodec,
    pub format: AudioFormat,
    /// 源采样率下的采样数
    pub sample_count: u32,
    /// MP3 开头需要丢弃的采样数 (延迟)
    pub skip: u16,
    /// 编码数据
    pub data: Bytes,
}

impl Sound {
    /// 44.1kHz 规范流中的采样帧数
    pub fn canonical_samples(&self) -> u64 {
        self.format.to_canonical_frames(u64::from(self.sample_count))
    }
}

/// 音量包络控制点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopePoint {
    /// 44.1kHz 规范流中的采样位置
    pub position: u32,
    /// 0-32768
    pub left: u16,
    pub right: u16,
}

/// 包络音量上限
pub const ENVELOPE_MAX: u16 = 32768;

/// SOUNDINFO 记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundInfo {
    /// 停止该声音而不是播放
    pub stop: bool,
    /// 已在播放时不再启动
    pub no_multiple: bool,
    /// 起止位置 (44.1kHz 规范流中的采样帧)
    pub in_point: Option<u32>,
    pub out_point: Option<u32>,
    pub loops: u16,
    pub envelope: Vec<EnvelopePoint>,
}

impl Default for SoundInfo {
    fn default() -> Self {
        Self {
            stop: false,
            no_multiple: false,
            in_point: None,
            out_point: None,
            loops: 1,
            envelope: Vec::new(),
        }
    }
}

/// 读取 SOUNDINFO 记录
///
/// 超出范围的包络音量被截到 32768, 不单调的包络位置被截到前一个位置, 两者都会告警.
pub fn read_sound_info(reader: &mut BitReader) -> YingResult<SoundInfo> {
    reader.align_to_byte();
    reader.read_bits(2)?;
    let mut info = SoundInfo {
        stop: reader.read_bit()?,
        no_multiple: reader.read_bit()?,
        ..SoundInfo::default()
    };
    let has_envelope = reader.read_bit()?;
    let has_loops = reader.read_bit()?;
    let has_out = reader.read_bit()?;
    let has_in = reader.read_bit()?;
    if has_in {
        info.in_point = Some(reader.read_u32()?);
    }
    if has_out {
        info.out_point = Some(reader.read_u32()?);
    }
    if has_loops {
        info.loops = reader.read_u16()?;
    }
    if has_envelope {
        let count = reader.read_u8()?;
        let mut last = 0u32;
        for _ in 0..count {
            let mut position = reader.read_u32()?;
            let mut left = reader.read_u16()?;
            let mut right = reader.read_u16()?;
            if position < last {
                warn!("包络位置 {} 小于前一个位置 {}, 已截断", position, last);
                position = last;
            }
            if left > ENVELOPE_MAX || right > ENVELOPE_MAX {
                warn!("包络音量 ({}, {}) 超过 {}, 已截断", left, right, ENVELOPE_MAX);
                left = left.min(ENVELOPE_MAX);
                right = right.min(ENVELOPE_MAX);
            }
            last = position;
            info.envelope.push(EnvelopePoint {
                position,
                left,
                right,
            });
        }
    }
    if let (Some(i), Some(o)) = (info.in_point, info.out_point) {
        if o < i {
            warn!("声音结束位置 {} 早于开始位置 {}", o, i);
        }
    }
    Ok(info)
}

/// StartSound / StartSound2 记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSound {
    /// StartSound 使用角色 ID
    pub sound_id: Option<u16>,
    /// StartSound2 使用类名
    pub class_name: Option<String>,
    pub info: SoundInfo,
}

/// 解析 StartSound / StartSound2 的标签数据
pub fn parse_start_sound(reader: &mut BitReader, tag: u16, version: u8) -> YingResult<StartSound> {
    let (sound_id, class_name) = if tag == tags::START_SOUND2 {
        (None, Some(reader.read_string(version)?))
    } else {
        (Some(reader.read_u16()?), None)
    };
    Ok(StartSound {
        sound_id,
        class_name,
        info: read_sound_info(reader)?,
    })
}

fn read_codec_and_format(byte: u8) -> (AudioCodec, AudioFormat) {
    (AudioCodec::from_id(byte >> 4), AudioFormat::from_bits(byte & 0x0F))
}

/// 解析 DefineSound 的标签数据
pub fn parse_sound(reader: &mut BitReader) -> YingResult<Sound> {
    let id = reader.read_u16()?;
    let (codec, format) = read_codec_and_format(reader.read_u8()?);
    let sample_count = reader.read_u32()?;
    let skip = if codec == AudioCodec::Mp3 {
        let skip = reader.read_s16()?;
        if skip < 0 {
            warn!("声音 {} 的 MP3 延迟为负数 {}, 按 0 处理", id, skip);
        }
        skip.max(0) as u16
    } else {
        0
    };
    let data = reader.read_remaining();
    if !format.is_16bit && codec != AudioCodec::Uncompressed && codec != AudioCodec::UncompressedLe
    {
        debug!("声音 {} 为压缩格式但声明了 8 位采样", id);
    }
    Ok(Sound {
        id,
        codec,
        format,
        sample_count,
        skip,
        data,
    })
}

pub fn define_sound(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let sound = parse_sound(reader)?;
    debug!(
        "声音 {}: {} {}, {} 采样",
        sound.id, sound.codec, sound.format, sound.sample_count
    );
    ctx.define(sound.id, Character::Sound(sound));
    Ok(())
}

/// StartSound / StartSound2: 校验后作为时间轴动作保存
pub fn start_sound(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let raw = reader.clone().read_remaining();
    let start = parse_start_sound(reader, ctx.tag, ctx.version)?;
    if let Some(id) = start.sound_id {
        if ctx.check_reference(id) && ctx.dictionary.sound(id).is_none() {
            warn!("StartSound 引用的角色 {} 不是声音", id);
        }
    }
    ctx.sprite.push_action(ctx.tag, raw);
    Ok(())
}

/// 流式声音格式 (SoundStreamHead / SoundStreamHead2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundStreamHead {
    /// 建议的回放格式
    pub playback: AudioFormat,
    pub codec: AudioCodec,
    /// 流数据格式
    pub format: AudioFormat,
    /// 每帧平均采样数 (源采样率)
    pub samples_per_frame: u16,
    /// MP3 延迟采样数
    pub latency: i16,
}

/// 解析 SoundStreamHead 的标签数据
pub fn parse_sound_stream_head(reader: &mut BitReader) -> YingResult<SoundStreamHead> {
    let playback = AudioFormat::from_bits(reader.read_u8()? & 0x0F);
    let (codec, format) = read_codec_and_format(reader.read_u8()?);
    let samples_per_frame = reader.read_u16()?;
    let latency = if codec == AudioCodec::Mp3 && reader.bytes_left() >= 2 {
        reader.read_s16()?
    } else {
        0
    };
    Ok(SoundStreamHead {
        playback,
        codec,
        format,
        samples_per_frame,
        latency,
    })
}

pub fn sound_stream_head(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let head = parse_sound_stream_head(reader)?;
    debug!(
        "精灵 {} 第 {} 帧: 流式声音 {} {}, 每帧 {} 采样",
        ctx.sprite.id, ctx.sprite.parse_frame, head.codec, head.format, head.samples_per_frame
    );
    ctx.sprite.current_frame().sound_head = Some(head);
    Ok(())
}

/// 一帧的流式声音数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundBlock {
    /// 源采样率下的采样数
    pub samples: u16,
    /// MP3 的帧内跳过采样数
    pub seek: i16,
    pub data: Bytes,
}

/// 按当前流格式解析 SoundStreamBlock
pub fn parse_sound_block(reader: &mut BitReader, head: &SoundStreamHead) -> YingResult<SoundBlock> {
    let (samples, seek) = if head.codec == AudioCodec::Mp3 {
        (reader.read_u16()?, reader.read_s16()?)
    } else {
        (head.samples_per_frame, 0)
    };
    Ok(SoundBlock {
        samples,
        seek,
        data: reader.read_remaining(),
    })
}

pub fn sound_stream_block(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let sprite_id = ctx.sprite.id;
    let frame = ctx.sprite.current_frame();
    let Some(head) = frame.sound_head.as_ref() else {
        warn!("精灵 {} 的 SoundStreamBlock 之前没有 SoundStreamHead, 已跳过", sprite_id);
        reader.read_remaining();
        return Ok(());
    };
    let block = parse_sound_block(reader, head)?;
    let samples = head.format.to_canonical_frames(u64::from(block.samples));
    if frame.sound_block.is_some() {
        warn!("精灵 {} 的同一帧出现多个 SoundStreamBlock, 保留最后一个", sprite_id);
    }
    frame.sound_samples = u32::try_from(samples).unwrap_or(u32::MAX);
    frame.sound_block = Some(block);
    Ok(())
}
