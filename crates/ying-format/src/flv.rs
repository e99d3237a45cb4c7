//! FLV (Flash Video) 增量解析器.
//!
//! # FLV 文件结构
//! ```text
//! FLV Header (≥ 9 bytes):
//!   "FLV" (3 bytes)
//!   Version (1 byte)
//!   Flags (1 byte): bit0=video, bit2=audio
//!   DataOffset (4 bytes, BE): 头部大小
//!
//! PreviousTagSize (4 bytes, BE)
//! FLV Tag:
//!   TagType (1 byte): 8=Audio, 9=Video, 18=Script
//!   DataSize (3 bytes, BE)
//!   Timestamp (3 bytes, BE) + TimestampExtended (1 byte, 高 8 位)
//!   StreamID (3 bytes, BE): 总是 0
//!   TagData (DataSize bytes)
//! PreviousTagSize ...
//! ```
//!
//! 解析器完整保留所有标签 (按时间戳排序), 以便之后向任意时间点定位.
//! FLV 没有结束标记, 输入结束时调用 [`FlvDecoder::finish`].

use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, Bytes, BytesMut};
use log::{debug, error, info, trace, warn};
use ying_codec::{AudioCodec, AudioFormat, VideoCodec};
use ying_core::{YingError, YingResult};

use crate::ParseStatus;

/// FLV Tag 类型
pub const TAG_AUDIO: u8 = 8;
pub const TAG_VIDEO: u8 = 9;
pub const TAG_SCRIPT: u8 = 18;

/// 视频帧类型: 关键帧
pub const FRAME_KEY: u8 = 1;
/// 视频帧类型: 普通帧
pub const FRAME_INTER: u8 = 2;

const FLV_HEADER_MIN: usize = 9;
const TAG_HEADER_LEN: usize = 11;

/// 解析器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvState {
    Header,
    LastTagSize,
    Tag,
    Eof,
    Error,
}

/// FLV 文件头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvHeader {
    pub version: u8,
    pub has_audio: bool,
    pub has_video: bool,
    pub header_len: u32,
}

/// 音频 Tag
#[derive(Debug, Clone, PartialEq)]
pub struct FlvAudioTag {
    /// 毫秒
    pub timestamp: u32,
    pub codec: AudioCodec,
    pub format: AudioFormat,
    /// 去掉格式字节后的编码数据
    pub data: Bytes,
}

/// 视频 Tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvVideoTag {
    pub timestamp: u32,
    pub frame_type: u8,
    pub codec: VideoCodec,
    /// 去掉帧类型字节后的数据, VP6 的尺寸调整字节仍在开头
    pub data: Bytes,
}

impl FlvVideoTag {
    pub fn is_keyframe(&self) -> bool {
        self.frame_type == FRAME_KEY
    }
}

/// 脚本数据 Tag (onMetaData 等)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvDataTag {
    pub timestamp: u32,
    pub data: Bytes,
}

/// 按时间查找的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlvLookup<'a, T> {
    pub tag: &'a T,
    pub index: usize,
    /// 下一个 Tag 的时间戳, 没有后续 Tag 时为 None
    pub next_timestamp: Option<u32>,
}

/// 解析过程中产生的通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvEvent {
    /// 第一个音频 Tag 出现, 可以创建音频解码器
    AudioCodec { codec: AudioCodec, format: AudioFormat },
    /// 第一个视频 Tag 出现
    VideoCodec { codec: VideoCodec },
}

trait Timestamped {
    fn timestamp(&self) -> u32;
}

impl Timestamped for FlvAudioTag {
    fn timestamp(&self) -> u32 {
        self.timestamp
    }
}

impl Timestamped for FlvVideoTag {
    fn timestamp(&self) -> u32 {
        self.timestamp
    }
}

impl Timestamped for FlvDataTag {
    fn timestamp(&self) -> u32 {
        self.timestamp
    }
}

/// 按时间戳插入; 乱序时二分查找插入位置
fn insert_ordered<T: Timestamped>(tags: &mut Vec<T>, tag: T, kind: &str) {
    let ts = tag.timestamp();
    match tags.last() {
        Some(last) if last.timestamp() > ts => {
            warn!(
                "{} Tag 时间戳 {} 早于上一个 Tag 的 {}, 按时间顺序插入",
                kind,
                ts,
                last.timestamp()
            );
            let idx = tags.partition_point(|t| t.timestamp() <= ts);
            tags.insert(idx, tag);
        }
        _ => tags.push(tag),
    }
}

/// 时间戳 ≤ `timestamp` 的最后一个 Tag; 早于第一个 Tag 时返回第一个
fn lookup_index<T: Timestamped>(tags: &[T], timestamp: u32) -> Option<usize> {
    if tags.is_empty() {
        return None;
    }
    let idx = tags.partition_point(|t| t.timestamp() <= timestamp);
    Some(idx.saturating_sub(1))
}

fn make_lookup<T: Timestamped>(tags: &[T], index: usize) -> FlvLookup<'_, T> {
    FlvLookup {
        tag: &tags[index],
        index,
        next_timestamp: tags.get(index + 1).map(Timestamped::timestamp),
    }
}

/// 在 AMF0 onMetaData 中查找 duration (秒)
fn scan_duration(data: &[u8]) -> Option<f64> {
    let needle = b"duration";
    let pos = data.windows(needle.len()).position(|w| w == needle)?;
    let after = pos + needle.len();
    // AMF0 Number: type(0x00) + 8 bytes IEEE 754 BE
    if data.get(after) != Some(&0x00) {
        return None;
    }
    let bytes = data.get(after + 1..after + 9)?;
    let dur = BigEndian::read_f64(bytes);
    (dur > 0.0 && dur.is_finite()).then_some(dur)
}

/// FLV 增量解析器
pub struct FlvDecoder {
    state: FlvState,
    buffer: BytesMut,
    header: Option<FlvHeader>,
    audio: Vec<FlvAudioTag>,
    video: Vec<FlvVideoTag>,
    data: Vec<FlvDataTag>,
    events: Vec<FlvEvent>,
    /// 上一个 Tag 的总长度 (含 11 字节头), 用于核对 PreviousTagSize
    last_tag_size: u32,
    duration: Option<f64>,
    bytes_parsed: u64,
}

impl FlvDecoder {
    pub fn new() -> Self {
        Self {
            state: FlvState::Header,
            buffer: BytesMut::new(),
            header: None,
            audio: Vec::new(),
            video: Vec::new(),
            data: Vec::new(),
            events: Vec::new(),
            last_tag_size: 0,
            duration: None,
            bytes_parsed: 0,
        }
    }

    /// 追加数据并解析所有完整的 Tag
    pub fn parse(&mut self, data: &[u8]) -> YingResult<ParseStatus> {
        match self.state {
            FlvState::Error => return Err(YingError::Halted),
            FlvState::Eof => {
                if !data.is_empty() {
                    warn!("FLV 已结束, 忽略多余的 {} 字节", data.len());
                }
                return Ok(ParseStatus::Eof);
            }
            _ => {}
        }
        self.buffer.extend_from_slice(data);

        loop {
            let step = match self.state {
                FlvState::Header => self.parse_header(),
                FlvState::LastTagSize => self.parse_last_tag_size(),
                FlvState::Tag => self.parse_tag(),
                FlvState::Eof => return Ok(ParseStatus::Eof),
                FlvState::Error => return Err(YingError::Halted),
            };
            match step {
                Ok(true) => {}
                Ok(false) => return Ok(ParseStatus::NeedMoreData),
                Err(e) => {
                    error!("FLV 解析失败: {}", e);
                    self.state = FlvState::Error;
                    self.buffer.clear();
                    return Err(e);
                }
            }
        }
    }

    /// 输入结束, 未解析完的 Tag 被丢弃
    pub fn finish(&mut self) -> YingResult<ParseStatus> {
        match self.state {
            FlvState::Error => Err(YingError::Halted),
            FlvState::Eof => Ok(ParseStatus::Eof),
            FlvState::Header => {
                warn!("FLV 数据被截断: 文件头不完整");
                self.state = FlvState::Eof;
                Ok(ParseStatus::Eof)
            }
            _ => {
                // 最后一个 Tag 之后的 PreviousTagSize 之外没有数据才是完整结尾
                if !self.buffer.is_empty()
                    && !(self.state == FlvState::LastTagSize && self.buffer.len() < 4)
                {
                    warn!("FLV 数据被截断, 丢弃末尾 {} 字节", self.buffer.len());
                }
                self.buffer.clear();
                info!(
                    "FLV 解析完成: 音频 {} 个, 视频 {} 个, 数据 {} 个",
                    self.audio.len(),
                    self.video.len(),
                    self.data.len()
                );
                self.state = FlvState::Eof;
                Ok(ParseStatus::Eof)
            }
        }
    }

    fn consume(&mut self, n: usize) -> Bytes {
        self.bytes_parsed += n as u64;
        self.buffer.split_to(n).freeze()
    }

    fn parse_header(&mut self) -> YingResult<bool> {
        if self.buffer.len() < FLV_HEADER_MIN {
            return Ok(false);
        }
        if &self.buffer[..3] != b"FLV" {
            return Err(YingError::Malformed("不是 FLV 文件".into()));
        }
        let header_len = BigEndian::read_u32(&self.buffer[5..9]);
        if (header_len as usize) < FLV_HEADER_MIN {
            return Err(YingError::Malformed(format!(
                "FLV 头部长度 {} 小于 9",
                header_len
            )));
        }
        if self.buffer.len() < header_len as usize {
            return Ok(false);
        }
        let flags = self.buffer[4];
        let header = FlvHeader {
            version: self.buffer[3],
            has_audio: flags & 0x04 != 0,
            has_video: flags & 0x01 != 0,
            header_len,
        };
        debug!(
            "FLV: version={} has_audio={} has_video={} header_len={}",
            header.version, header.has_audio, header.has_video, header_len
        );
        self.consume(header_len as usize);
        self.header = Some(header);
        self.state = FlvState::LastTagSize;
        Ok(true)
    }

    fn parse_last_tag_size(&mut self) -> YingResult<bool> {
        if self.buffer.len() < 4 {
            return Ok(false);
        }
        let size = self.consume(4).get_u32();
        if size != self.last_tag_size {
            debug!(
                "PreviousTagSize 为 {}, 上一个 Tag 实际 {} 字节",
                size, self.last_tag_size
            );
        }
        self.state = FlvState::Tag;
        Ok(true)
    }

    fn parse_tag(&mut self) -> YingResult<bool> {
        if self.buffer.len() < TAG_HEADER_LEN {
            return Ok(false);
        }
        let head = &self.buffer[..TAG_HEADER_LEN];
        let tag_type = head[0];
        let size = BigEndian::read_u24(&head[1..4]) as usize;
        let timestamp = BigEndian::read_u24(&head[4..7]) | (u32::from(head[7]) << 24);
        let stream_id = BigEndian::read_u24(&head[8..11]);
        if self.buffer.len() < TAG_HEADER_LEN + size {
            return Ok(false);
        }
        self.consume(TAG_HEADER_LEN);
        let payload = self.consume(size);
        self.last_tag_size = (TAG_HEADER_LEN + size) as u32;
        self.state = FlvState::LastTagSize;

        if stream_id != 0 {
            debug!("FLV Tag 的 StreamID 为 {}", stream_id);
        }
        trace!(
            "FLV Tag: type={} size={} ts={}",
            tag_type, size, timestamp
        );
        match tag_type & 0x1F {
            TAG_AUDIO => self.add_audio(timestamp, payload),
            TAG_VIDEO => self.add_video(timestamp, payload),
            TAG_SCRIPT => self.add_data(timestamp, payload),
            other => warn!("未知 FLV Tag 类型 {} ({} 字节), 已跳过", other, size),
        }
        Ok(true)
    }

    fn add_audio(&mut self, timestamp: u32, mut payload: Bytes) {
        if payload.is_empty() {
            warn!("时间戳 {} 的音频 Tag 为空, 已跳过", timestamp);
            return;
        }
        let flags = payload.get_u8();
        let tag = FlvAudioTag {
            timestamp,
            codec: AudioCodec::from_id(flags >> 4),
            format: AudioFormat::from_bits(flags & 0x0F),
            data: payload,
        };
        if self.audio.is_empty() {
            info!("FLV 音频: {} {}", tag.codec, tag.format);
            self.events.push(FlvEvent::AudioCodec {
                codec: tag.codec,
                format: tag.format,
            });
        }
        insert_ordered(&mut self.audio, tag, "音频");
    }

    fn add_video(&mut self, timestamp: u32, mut payload: Bytes) {
        if payload.is_empty() {
            warn!("时间戳 {} 的视频 Tag 为空, 已跳过", timestamp);
            return;
        }
        let flags = payload.get_u8();
        let tag = FlvVideoTag {
            timestamp,
            frame_type: flags >> 4,
            codec: VideoCodec::from_id(flags & 0x0F),
            data: payload,
        };
        if self.video.is_empty() {
            info!("FLV 视频: {}", tag.codec);
            self.events.push(FlvEvent::VideoCodec { codec: tag.codec });
        }
        insert_ordered(&mut self.video, tag, "视频");
    }

    fn add_data(&mut self, timestamp: u32, payload: Bytes) {
        if self.duration.is_none() {
            if let Some(dur) = scan_duration(&payload) {
                debug!("FLV: onMetaData duration={}s", dur);
                self.duration = Some(dur);
            }
        }
        insert_ordered(
            &mut self.data,
            FlvDataTag {
                timestamp,
                data: payload,
            },
            "数据",
        );
    }

    /// 时间戳 ≤ `timestamp` 的最后一个音频 Tag
    pub fn get_audio(&self, timestamp: u32) -> Option<FlvLookup<'_, FlvAudioTag>> {
        lookup_index(&self.audio, timestamp).map(|i| make_lookup(&self.audio, i))
    }

    /// 时间戳 ≤ `timestamp` 的最后一个视频 Tag
    ///
    /// `keyframe` 为真时继续向前找到最近的关键帧; 前面没有关键帧时返回第一个 Tag.
    pub fn get_video(&self, timestamp: u32, keyframe: bool) -> Option<FlvLookup<'_, FlvVideoTag>> {
        let mut idx = lookup_index(&self.video, timestamp)?;
        if keyframe {
            while idx > 0 && !self.video[idx].is_keyframe() {
                idx -= 1;
            }
            if !self.video[idx].is_keyframe() {
                debug!("时间戳 {} 之前没有视频关键帧", timestamp);
            }
        }
        Some(make_lookup(&self.video, idx))
    }

    pub fn get_data(&self, timestamp: u32) -> Option<FlvLookup<'_, FlvDataTag>> {
        lookup_index(&self.data, timestamp).map(|i| make_lookup(&self.data, i))
    }

    /// 取出解析过程中积累的通知
    pub fn take_events(&mut self) -> Vec<FlvEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn state(&self) -> FlvState {
        self.state
    }

    pub fn is_eof(&self) -> bool {
        self.state == FlvState::Eof
    }

    pub fn header(&self) -> Option<&FlvHeader> {
        self.header.as_ref()
    }

    /// 时长 (秒): 优先使用 onMetaData, 否则取最后一个音视频 Tag 的时间戳
    pub fn duration(&self) -> Option<f64> {
        self.duration.or_else(|| {
            let last = self
                .audio
                .last()
                .map(|t| t.timestamp)
                .max(self.video.last().map(|t| t.timestamp))?;
            Some(f64::from(last) / 1000.0)
        })
    }

    pub fn audio_tags(&self) -> &[FlvAudioTag] {
        &self.audio
    }

    pub fn video_tags(&self) -> &[FlvVideoTag] {
        &self.video
    }

    pub fn data_tags(&self) -> &[FlvDataTag] {
        &self.data
    }

    /// 已解析 (移出缓冲区) 的字节数
    pub fn bytes_parsed(&self) -> u64 {
        self.bytes_parsed
    }
}

impl Default for FlvDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// FLV 写出器, 用于生成测试数据与工具输出
pub struct FlvWriter {
    out: Vec<u8>,
}

impl FlvWriter {
    pub fn new(has_audio: bool, has_video: bool) -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(b"FLV");
        out.push(1);
        let flags = if has_audio { 0x04 } else { 0 } | if has_video { 0x01 } else { 0 };
        out.push(flags);
        out.extend_from_slice(&9u32.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes()); // PreviousTagSize0
        Self { out }
    }

    /// 写入任意 Tag
    pub fn tag(&mut self, tag_type: u8, timestamp: u32, data: &[u8]) -> &mut Self {
        let size = data.len() as u32;
        self.out.push(tag_type);
        self.out.extend_from_slice(&size.to_be_bytes()[1..]);
        self.out.extend_from_slice(&(timestamp & 0x00FF_FFFF).to_be_bytes()[1..]);
        self.out.push((timestamp >> 24) as u8);
        self.out.extend_from_slice(&[0, 0, 0]);
        self.out.extend_from_slice(data);
        self.out.extend_from_slice(&(TAG_HEADER_LEN as u32 + size).to_be_bytes());
        self
    }

    pub fn audio(
        &mut self,
        timestamp: u32,
        codec: AudioCodec,
        format: AudioFormat,
        data: &[u8],
    ) -> &mut Self {
        let mut payload = Vec::with_capacity(data.len() + 1);
        payload.push((codec.id() << 4) | format.to_bits());
        payload.extend_from_slice(data);
        self.tag(TAG_AUDIO, timestamp, &payload)
    }

    pub fn video(
        &mut self,
        timestamp: u32,
        frame_type: u8,
        codec: VideoCodec,
        data: &[u8],
    ) -> &mut Self {
        let mut payload = Vec::with_capacity(data.len() + 1);
        payload.push((frame_type << 4) | (codec.id() & 0x0F));
        payload.extend_from_slice(data);
        self.tag(TAG_VIDEO, timestamp, &payload)
    }

    /// 写入只含 duration 的 onMetaData
    pub fn metadata_duration(&mut self, seconds: f64) -> &mut Self {
        let mut amf = Vec::new();
        amf.push(0x02);
        amf.extend_from_slice(&10u16.to_be_bytes());
        amf.extend_from_slice(b"onMetaData");
        amf.push(0x08);
        amf.extend_from_slice(&1u32.to_be_bytes());
        amf.extend_from_slice(&8u16.to_be_bytes());
        amf.extend_from_slice(b"duration");
        amf.push(0x00);
        amf.extend_from_slice(&seconds.to_be_bytes());
        amf.extend_from_slice(&[0, 0, 0x09]);
        self.tag(TAG_SCRIPT, 0, &amf)
    }

    pub fn finish(&self) -> Vec<u8> {
        self.out.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm() -> (AudioCodec, AudioFormat) {
        (AudioCodec::UncompressedLe, AudioFormat::from_bits(0x0F))
    }

    fn build_minimal_flv() -> Vec<u8> {
        let (codec, format) = pcm();
        let mut w = FlvWriter::new(true, true);
        w.metadata_duration(1.5);
        w.video(0, FRAME_KEY, VideoCodec::Vp6, &[0x00, 0xDE, 0xAD]);
        w.audio(0, codec, format, &[0xBE, 0xEF]);
        w.video(33, FRAME_INTER, VideoCodec::Vp6, &[0x00, 0xCA, 0xFE]);
        w.audio(23, codec, format, &[0xF0, 0x0D]);
        w.video(66, FRAME_INTER, VideoCodec::Vp6, &[0x00, 0x01]);
        w.finish()
    }

    #[test]
    fn test_parse_minimal_flv() {
        let data = build_minimal_flv();
        let mut dec = FlvDecoder::new();
        assert_eq!(dec.parse(&data).unwrap(), ParseStatus::NeedMoreData);
        let header = dec.header().unwrap();
        assert!(header.has_audio && header.has_video);
        assert_eq!(dec.audio_tags().len(), 2);
        assert_eq!(dec.video_tags().len(), 3);
        assert_eq!(dec.data_tags().len(), 1);
        assert_eq!(dec.duration(), Some(1.5));
        assert_eq!(dec.bytes_parsed(), data.len() as u64);
        // VP6 的调整字节保留在数据开头
        assert_eq!(&dec.video_tags()[0].data[..], &[0x00, 0xDE, 0xAD]);
        assert_eq!(dec.finish().unwrap(), ParseStatus::Eof);
        assert!(dec.is_eof());
    }

    #[test]
    fn test_codec_events_emitted_once() {
        let mut dec = FlvDecoder::new();
        dec.parse(&build_minimal_flv()).unwrap();
        let (codec, format) = pcm();
        assert_eq!(
            dec.take_events(),
            vec![
                FlvEvent::VideoCodec {
                    codec: VideoCodec::Vp6
                },
                FlvEvent::AudioCodec { codec, format },
            ]
        );
        assert!(dec.take_events().is_empty());
    }

    #[test]
    fn test_keyframe_lookup() {
        let mut dec = FlvDecoder::new();
        dec.parse(&build_minimal_flv()).unwrap();
        let hit = dec.get_video(50, false).unwrap();
        assert_eq!(hit.tag.timestamp, 33);
        assert_eq!(hit.next_timestamp, Some(66));
        let key = dec.get_video(70, true).unwrap();
        assert_eq!(key.index, 0);
        assert!(key.tag.is_keyframe());
        let last = dec.get_video(1000, false).unwrap();
        assert_eq!(last.next_timestamp, None);
    }

    #[test]
    fn test_audio_search_matches_linear_scan() {
        let (codec, format) = pcm();
        let mut w = FlvWriter::new(true, false);
        let mut stamps = Vec::new();
        let mut ts = 5u32;
        let mut seed = 0x2545_F491u32;
        for _ in 0..64 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            ts += 1 + seed % 40;
            stamps.push(ts);
            w.audio(ts, codec, format, &[0; 4]);
        }
        let mut dec = FlvDecoder::new();
        dec.parse(&w.finish()).unwrap();
        for query in 0..ts + 50 {
            let expected = stamps
                .iter()
                .rposition(|&t| t <= query)
                .unwrap_or(0);
            let hit = dec.get_audio(query).unwrap();
            assert_eq!(hit.index, expected, "query {}", query);
            assert_eq!(hit.tag.timestamp, stamps[expected]);
        }
    }

    #[test]
    fn test_out_of_order_insert() {
        let (codec, format) = pcm();
        let mut w = FlvWriter::new(true, false);
        for ts in [0, 40, 80, 20, 100] {
            w.audio(ts, codec, format, &[ts as u8]);
        }
        let mut dec = FlvDecoder::new();
        dec.parse(&w.finish()).unwrap();
        let stamps: Vec<u32> = dec.audio_tags().iter().map(|t| t.timestamp).collect();
        assert_eq!(stamps, vec![0, 20, 40, 80, 100]);
    }

    #[test]
    fn test_extended_timestamp_and_split_feeding() {
        let (codec, format) = pcm();
        let mut w = FlvWriter::new(true, false);
        w.audio(0x0100_0010, codec, format, &[1, 2, 3]);
        let data = w.finish();
        for split in 0..data.len() {
            let mut dec = FlvDecoder::new();
            dec.parse(&data[..split]).unwrap();
            dec.parse(&data[split..]).unwrap();
            assert_eq!(dec.audio_tags().len(), 1, "split {}", split);
            assert_eq!(dec.audio_tags()[0].timestamp, 0x0100_0010);
        }
    }

    #[test]
    fn test_bad_signature_halts() {
        let mut dec = FlvDecoder::new();
        assert!(matches!(
            dec.parse(b"FWS\x01\x05\0\0\0\x09"),
            Err(YingError::Malformed(_))
        ));
        assert!(matches!(dec.parse(&[]), Err(YingError::Halted)));

        let mut dec = FlvDecoder::new();
        assert!(matches!(
            dec.parse(b"FLV\x01\x05\0\0\0\x05"),
            Err(YingError::Malformed(_))
        ));
    }
}
