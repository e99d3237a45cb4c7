//! SWF 增量解析引擎.
//!
//! 状态转移:
//! ```text
//! Init1 (8 字节签名) -> Init2 (影片头) -> ParseFirstTag -> ParseTag ... -> Eof
//!                                  任意状态遇到结构错误 -> Error
//! ```
//!
//! 每次 [`SwfDecoder::parse`] 都把新数据追加到累积缓冲区 (CWS 文件先经过
//! 持久的 zlib 流解压), 然后推进状态机直到数据不足、出错或读到 End 标签.
//! 所有进度都记录在缓冲区和状态字段中, 因此输入可以在任意字节处切断.

use byteorder::{ByteOrder, LittleEndian};
use bytes::{Buf, BytesMut};
use flate2::{Decompress, FlushDecompress, Status};
use log::{debug, error, info, warn};
use ying_core::{BitReader, Rect, YingError, YingResult};

use super::character::Dictionary;
use super::context::{TagContext, dispatch};
use super::movie::MovieInfo;
use super::sprite::Sprite;
use super::tags;
use crate::ParseStatus;

/// 每次调用 zlib 的输出块大小
const INFLATE_CHUNK: usize = 32 * 1024;

/// 解析器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// 等待 8 字节文件签名
    Init1,
    /// 等待影片头
    Init2,
    /// 等待第一个标签
    ParseFirstTag,
    ParseTag,
    Eof,
    /// 结构错误, 永久停止
    Error,
}

/// 文件头与影片头
#[derive(Debug, Clone, PartialEq)]
pub struct SwfHeader {
    pub compressed: bool,
    pub version: u8,
    /// 含 8 字节文件头的解压后总长度
    pub file_length: u32,
    /// 舞台矩形 (twips)
    pub frame_size: Rect,
    pub frame_rate: f32,
    pub frame_count: u16,
}

/// SWF 增量解析器
pub struct SwfDecoder {
    state: DecoderState,
    /// 签名之前收到的原始数据
    pending: BytesMut,
    /// 解压后 (或未压缩) 的影片数据, 已解析部分会被移出
    buffer: BytesMut,
    inflater: Option<Decompress>,
    inflate_done: bool,
    compressed: bool,
    version: u8,
    file_length: u32,
    /// 已接收的影片数据字节数 (不含 8 字节文件头)
    body_received: usize,
    overflow_warned: bool,
    header: Option<SwfHeader>,
    dictionary: Dictionary,
    movie: MovieInfo,
    main: Sprite,
}

impl SwfDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Init1,
            pending: BytesMut::new(),
            buffer: BytesMut::new(),
            inflater: None,
            inflate_done: false,
            compressed: false,
            version: 0,
            file_length: 0,
            body_received: 0,
            overflow_warned: false,
            header: None,
            dictionary: Dictionary::new(),
            movie: MovieInfo::default(),
            main: Sprite::new(0, 0),
        }
    }

    /// 追加数据并尽可能向前解析
    ///
    /// 结构错误只以 [`YingError::Malformed`] 报告一次, 之后每次调用都返回
    /// [`YingError::Halted`].
    pub fn parse(&mut self, data: &[u8]) -> YingResult<ParseStatus> {
        match self.state {
            DecoderState::Error => return Err(YingError::Halted),
            DecoderState::Eof => {
                if !data.is_empty() {
                    warn!("SWF 已结束, 忽略多余的 {} 字节", data.len());
                }
                return Ok(ParseStatus::Eof);
            }
            _ => {}
        }

        let fed = if self.state == DecoderState::Init1 {
            self.pending.extend_from_slice(data);
            Ok(())
        } else {
            self.push_body(data)
        };
        if let Err(e) = fed {
            return Err(self.fail(e));
        }

        loop {
            let step = match self.state {
                DecoderState::Init1 => self.parse_signature(),
                DecoderState::Init2 => self.parse_movie_header(),
                DecoderState::ParseFirstTag | DecoderState::ParseTag => self.parse_tag(),
                DecoderState::Eof => return Ok(ParseStatus::Eof),
                DecoderState::Error => return Err(YingError::Halted),
            };
            match step {
                Ok(true) => {}
                Ok(false) | Err(YingError::NeedMoreData) => return Ok(ParseStatus::NeedMoreData),
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// 输入结束
    ///
    /// 还没读到 End 标签时记录截断告警并转入 Eof, 已解析的内容保留.
    pub fn finish(&mut self) -> YingResult<ParseStatus> {
        match self.state {
            DecoderState::Error => Err(YingError::Halted),
            DecoderState::Eof => Ok(ParseStatus::Eof),
            state => {
                warn!(
                    "SWF 数据被截断 (状态 {:?}, 已解析 {} 帧)",
                    state,
                    self.frames_loaded()
                );
                self.state = DecoderState::Eof;
                self.buffer.clear();
                self.pending.clear();
                Ok(ParseStatus::Eof)
            }
        }
    }

    fn fail(&mut self, e: YingError) -> YingError {
        error!("SWF 解析失败: {}", e);
        self.state = DecoderState::Error;
        self.inflater = None;
        self.buffer.clear();
        self.pending.clear();
        e
    }

    fn parse_signature(&mut self) -> YingResult<bool> {
        if self.pending.len() < 8 {
            return Ok(false);
        }
        self.compressed = match &self.pending[..3] {
            b"FWS" => false,
            b"CWS" => true,
            b"ZWS" => {
                return Err(YingError::Malformed(
                    "LZMA 压缩的 SWF (ZWS) 不受支持".into(),
                ));
            }
            other => {
                return Err(YingError::Malformed(format!(
                    "无效的 SWF 签名 {:02X?}",
                    other
                )));
            }
        };
        self.version = self.pending[3];
        self.file_length = LittleEndian::read_u32(&self.pending[4..8]);
        if self.file_length < 8 {
            return Err(YingError::Malformed(format!(
                "文件长度 {} 小于文件头长度",
                self.file_length
            )));
        }
        debug!(
            "SWF 签名: 版本 {}, 压缩 {}, 长度 {}",
            self.version, self.compressed, self.file_length
        );
        if self.compressed {
            self.inflater = Some(Decompress::new(true));
        }
        self.pending.advance(8);
        let rest = self.pending.split();
        self.state = DecoderState::Init2;
        self.push_body(&rest)?;
        Ok(true)
    }

    /// 接收签名之后的数据, CWS 文件经 zlib 解压
    fn push_body(&mut self, data: &[u8]) -> YingResult<()> {
        if !self.compressed {
            self.append_body(data);
            return Ok(());
        }
        if self.inflate_done {
            if !data.is_empty() {
                warn!("zlib 流之后还有 {} 字节, 已忽略", data.len());
            }
            return Ok(());
        }
        let Some(mut inflater) = self.inflater.take() else {
            return Err(YingError::Internal("CWS 文件缺少解压状态".into()));
        };

        let mut input = data;
        loop {
            let mut out = Vec::with_capacity(INFLATE_CHUNK);
            let in_before = inflater.total_in();
            let status = inflater
                .decompress_vec(input, &mut out, FlushDecompress::None)
                .map_err(|e| YingError::Malformed(format!("zlib 解压失败: {}", e)))?;
            let consumed = (inflater.total_in() - in_before) as usize;
            input = &input[consumed..];
            let produced = out.len();
            self.append_body(&out);

            if status == Status::StreamEnd {
                self.inflate_done = true;
                if !input.is_empty() {
                    warn!("zlib 流之后还有 {} 字节, 已忽略", input.len());
                }
                break;
            }
            if input.is_empty() && produced < INFLATE_CHUNK {
                break;
            }
            if consumed == 0 && produced == 0 {
                break;
            }
        }

        self.inflater = Some(inflater);
        Ok(())
    }

    /// 追加影片数据, CWS 文件超出声明长度的部分被丢弃
    fn append_body(&mut self, data: &[u8]) {
        let mut len = data.len();
        if self.compressed {
            let limit = self.file_length as usize - 8;
            let room = limit.saturating_sub(self.body_received);
            if len > room {
                if !self.overflow_warned {
                    warn!(
                        "解压数据超出声明的文件长度 {}, 多余部分被丢弃",
                        self.file_length
                    );
                    self.overflow_warned = true;
                }
                len = room;
            }
        }
        self.buffer.extend_from_slice(&data[..len]);
        self.body_received += len;
    }

    fn parse_movie_header(&mut self) -> YingResult<bool> {
        let Some(&first) = self.buffer.first() else {
            return Ok(false);
        };
        let nbits = (first >> 3) as usize;
        let needed = (5 + 4 * nbits).div_ceil(8) + 4;
        if self.buffer.len() < needed {
            return Ok(false);
        }
        let mut reader = BitReader::new(self.buffer.split_to(needed).freeze());
        let frame_size = reader.read_rect()?;
        let frame_rate = reader.read_ufixed8()?;
        let frame_count = reader.read_u16()?;
        if frame_size.is_empty() {
            warn!("舞台尺寸为空: {:?}", frame_size);
        }
        info!(
            "SWF 版本 {}: {}x{} 像素, {} fps, {} 帧",
            self.version,
            frame_size.width() / 20,
            frame_size.height() / 20,
            frame_rate,
            frame_count
        );
        self.header = Some(SwfHeader {
            compressed: self.compressed,
            version: self.version,
            file_length: self.file_length,
            frame_size,
            frame_rate,
            frame_count,
        });
        self.main = Sprite::new(0, frame_count);
        self.state = DecoderState::ParseFirstTag;
        Ok(true)
    }

    /// 解析一个完整的标签; 数据不足时不消耗任何字节
    fn parse_tag(&mut self) -> YingResult<bool> {
        if self.buffer.len() < 2 {
            return Ok(false);
        }
        let code = LittleEndian::read_u16(&self.buffer[..2]);
        let tag = code >> 6;
        let mut len = (code & 0x3F) as usize;
        let mut header_len = 2;
        if len == 0x3F {
            if self.buffer.len() < 6 {
                return Ok(false);
            }
            len = LittleEndian::read_u32(&self.buffer[2..6]) as usize;
            header_len = 6;
        }
        if self.buffer.len() - header_len < len {
            return Ok(false);
        }
        self.buffer.advance(header_len);
        let payload = self.buffer.split_to(len).freeze();
        let first_tag = self.state == DecoderState::ParseFirstTag;
        self.state = DecoderState::ParseTag;

        if tag == tags::END {
            self.finish_movie(len);
            return Ok(true);
        }

        let mut ctx = TagContext {
            version: self.version,
            tag,
            dictionary: &mut self.dictionary,
            movie: &mut self.movie,
            sprite: &mut self.main,
            in_sprite: false,
        };
        dispatch(&mut ctx, BitReader::new(payload), first_tag);
        Ok(true)
    }

    fn finish_movie(&mut self, end_len: usize) {
        if end_len > 0 {
            warn!("End 标签带有 {} 字节数据", end_len);
        }
        if !self.buffer.is_empty() {
            warn!("End 标签之后还有 {} 字节, 已忽略", self.buffer.len());
            self.buffer.clear();
        }
        if !self.main.is_complete() {
            warn!(
                "主时间轴只有 {}/{} 帧",
                self.main.parse_frame,
                self.main.frame_count()
            );
        }
        info!(
            "SWF 解析完成: {} 帧, {} 个角色",
            self.main.parse_frame,
            self.dictionary.len()
        );
        self.state = DecoderState::Eof;
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_eof(&self) -> bool {
        self.state == DecoderState::Eof
    }

    /// 影片头, 解析到 Init2 之后才可用
    pub fn header(&self) -> Option<&SwfHeader> {
        self.header.as_ref()
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// 已完整解析的主时间轴帧数
    pub fn frames_loaded(&self) -> usize {
        self.main.parse_frame
    }

    /// 已接收的 (解压后) 文件字节数
    pub fn bytes_loaded(&self) -> usize {
        if self.state == DecoderState::Init1 {
            self.pending.len().min(8)
        } else {
            8 + self.body_received
        }
    }

    /// 文件头声明的总长度, 签名之前为 0
    pub fn bytes_total(&self) -> usize {
        self.file_length as usize
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn movie(&self) -> &MovieInfo {
        &self.movie
    }

    /// 主时间轴
    pub fn main_sprite(&self) -> &Sprite {
        &self.main
    }
}

impl Default for SwfDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swf::character::Character;
    use crate::swf::writer::SwfWriter;

    fn sound_payload(id: u16, samples: u32) -> Vec<u8> {
        let mut v = id.to_le_bytes().to_vec();
        v.push(0x3E);
        v.extend_from_slice(&samples.to_le_bytes());
        v.extend_from_slice(&[0; 8]);
        v
    }

    fn sample_movie(compressed: bool) -> Vec<u8> {
        let mut w = SwfWriter::new(8);
        w.compressed(compressed).frame_count(2);
        w.tag(tags::SET_BACKGROUND_COLOR, &[0xFF, 0x80, 0x00]);
        w.tag(tags::DEFINE_SOUND, &sound_payload(1, 4));
        w.tag_long(tags::DO_ACTION, &[0x07, 0x00]);
        w.show_frame();
        w.tag(tags::DEFINE_SOUND, &sound_payload(1, 99));
        w.tag(tags::FRAME_LABEL, b"end\0");
        w.show_frame();
        w.end();
        w.finish().unwrap()
    }

    #[test]
    fn test_parse_whole_file() {
        let data = sample_movie(false);
        let mut dec = SwfDecoder::new();
        assert_eq!(dec.parse(&data).unwrap(), ParseStatus::Eof);
        assert_eq!(dec.state(), DecoderState::Eof);
        let header = dec.header().unwrap();
        assert_eq!(header.frame_count, 2);
        assert_eq!(header.frame_rate, 24.0);
        assert_eq!(dec.frames_loaded(), 2);
        assert_eq!(dec.bytes_loaded(), data.len());
        assert_eq!(dec.bytes_total(), data.len());
        assert_eq!(dec.main_sprite().frame_by_label("end"), Some(1));
        assert_eq!(dec.main_sprite().frame_actions(0).len(), 1);
        // 重复 ID 被拒绝, 保留第一个定义
        match dec.dictionary().get(1) {
            Some(Character::Sound(s)) => assert_eq!(s.sample_count, 4),
            other => panic!("意外的角色: {:?}", other),
        }
        assert!(dec.movie().background.is_some());
        assert_eq!(dec.parse(b"junk").unwrap(), ParseStatus::Eof);
    }

    #[test]
    fn test_streaming_equivalence_every_split() {
        for compressed in [false, true] {
            let data = sample_movie(compressed);
            let mut whole = SwfDecoder::new();
            whole.parse(&data).unwrap();
            for split in 0..=data.len() {
                let mut dec = SwfDecoder::new();
                let first = dec.parse(&data[..split]).unwrap();
                // zlib 校验和之前的前缀就可能已经解出 End 标签
                if split < data.len() && !compressed {
                    assert_eq!(first, ParseStatus::NeedMoreData, "split {}", split);
                }
                assert_eq!(dec.parse(&data[split..]).unwrap(), ParseStatus::Eof);
                assert_eq!(dec.main_sprite(), whole.main_sprite(), "split {}", split);
                assert_eq!(dec.dictionary(), whole.dictionary());
                assert_eq!(dec.movie(), whole.movie());
            }
        }
    }

    #[test]
    fn test_byte_by_byte_feeding() {
        let data = sample_movie(true);
        let mut dec = SwfDecoder::new();
        for b in &data {
            dec.parse(std::slice::from_ref(b)).unwrap();
        }
        assert!(dec.is_eof());
        assert_eq!(dec.frames_loaded(), 2);
    }

    #[test]
    fn test_partial_tag_not_consumed() {
        let data = sample_movie(false);
        let mut dec = SwfDecoder::new();
        // 停在 DoAction 的长标签头中间
        let do_action_start = data.len() - 2 - 2 - 6 - (2 + 15) - 2 - (6 + 2);
        let header_end = do_action_start + 3;
        assert_eq!(dec.parse(&data[..header_end]).unwrap(), ParseStatus::NeedMoreData);
        assert_eq!(dec.frames_loaded(), 0);
        assert!(dec.main_sprite().actions.is_empty());
        assert_eq!(dec.parse(&data[header_end..]).unwrap(), ParseStatus::Eof);
        assert_eq!(dec.frames_loaded(), 2);
    }

    #[test]
    fn test_bad_signature_reported_once() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut dec = SwfDecoder::new();
        assert!(matches!(
            dec.parse(b"GIF89a\0\0\0\0"),
            Err(YingError::Malformed(_))
        ));
        assert_eq!(dec.state(), DecoderState::Error);
        assert!(matches!(dec.parse(b"more"), Err(YingError::Halted)));
        assert!(matches!(dec.finish(), Err(YingError::Halted)));
    }

    #[test]
    fn test_lzma_and_short_length_rejected() {
        let mut dec = SwfDecoder::new();
        assert!(matches!(
            dec.parse(b"ZWS\x0d\x20\0\0\0"),
            Err(YingError::Malformed(_))
        ));
        let mut dec = SwfDecoder::new();
        assert!(matches!(
            dec.parse(b"FWS\x08\x04\0\0\0"),
            Err(YingError::Malformed(_))
        ));
    }

    #[test]
    fn test_corrupt_zlib_halts() {
        let mut data = b"CWS\x08\x40\0\0\0".to_vec();
        data.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        let mut dec = SwfDecoder::new();
        assert!(matches!(dec.parse(&data), Err(YingError::Malformed(_))));
        assert!(matches!(dec.parse(&[0]), Err(YingError::Halted)));
        assert_eq!(dec.frames_loaded(), 0);
    }

    #[test]
    fn test_compressed_length_clamp_and_finish() {
        let plain = sample_movie(false);
        let mut data = sample_movie(true);
        // 声明长度去掉 End 标签
        let short = (plain.len() - 2) as u32;
        data[4..8].copy_from_slice(&short.to_le_bytes());
        let mut dec = SwfDecoder::new();
        assert_eq!(dec.parse(&data).unwrap(), ParseStatus::NeedMoreData);
        assert_eq!(dec.frames_loaded(), 2);
        assert_eq!(dec.bytes_loaded(), plain.len() - 2);
        assert_eq!(dec.finish().unwrap(), ParseStatus::Eof);
        assert!(dec.is_eof());
        assert_eq!(dec.frames_loaded(), 2);
    }
}
