//! 嵌入视频: DefineVideoStream 与 VideoFrame.

use bytes::Bytes;
use log::{trace, warn};
use ying_codec::VideoCodec;
use ying_core::{BitReader, YingResult};

use super::character::Character;
use super::context::TagContext;

/// 一帧编码数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub frame: u16,
    pub data: Bytes,
}

/// 视频角色
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub id: u16,
    pub num_frames: u16,
    pub width: u16,
    pub height: u16,
    /// 0 表示使用视频数据中的设置
    pub deblocking: u8,
    pub smoothing: bool,
    pub codec: VideoCodec,
    /// 按帧号递增排列
    pub frames: Vec<VideoFrame>,
}

impl Video {
    /// 帧号 ≤ `frame` 的最后一帧
    pub fn frame_at(&self, frame: u16) -> Option<&VideoFrame> {
        let idx = self.frames.partition_point(|f| f.frame <= frame);
        idx.checked_sub(1).map(|i| &self.frames[i])
    }

    /// 追加一帧, 帧号必须递增
    pub fn push_frame(&mut self, frame: VideoFrame) -> bool {
        if let Some(last) = self.frames.last() {
            if frame.frame <= last.frame {
                warn!(
                    "视频 {} 的帧 {} 不在帧 {} 之后, 已跳过",
                    self.id, frame.frame, last.frame
                );
                return false;
            }
        }
        if frame.frame >= self.num_frames {
            warn!(
                "视频 {} 的帧号 {} 超出声明的 {} 帧",
                self.id, frame.frame, self.num_frames
            );
        }
        self.frames.push(frame);
        true
    }
}

pub fn parse_video(reader: &mut BitReader) -> YingResult<Video> {
    let id = reader.read_u16()?;
    let num_frames = reader.read_u16()?;
    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    let flags = reader.read_u8()?;
    let codec = VideoCodec::from_id(reader.read_u8()?);
    Ok(Video {
        id,
        num_frames,
        width,
        height,
        deblocking: (flags >> 1) & 0x07,
        smoothing: flags & 0x01 != 0,
        codec,
        frames: Vec::new(),
    })
}

pub fn define_video(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let video = parse_video(reader)?;
    if let VideoCodec::Unknown(id) = video.codec {
        warn!("视频 {} 使用未知编解码器 {}", video.id, id);
    }
    ctx.define(video.id, Character::Video(video));
    Ok(())
}

/// VideoFrame: 把帧数据挂到视频角色上, 并作为时间轴动作保存
pub fn video_frame(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let raw = reader.clone().read_remaining();
    let stream_id = reader.read_u16()?;
    let frame = reader.read_u16()?;
    let data = reader.read_remaining();
    match ctx.dictionary.video_mut(stream_id) {
        Some(video) => {
            trace!("视频 {} 帧 {} ({} 字节)", stream_id, frame, data.len());
            video.push_frame(VideoFrame { frame, data });
        }
        None => warn!("VideoFrame 引用的视频 {} 未定义", stream_id),
    }
    ctx.sprite.push_action(ctx.tag, raw);
    Ok(())
}
