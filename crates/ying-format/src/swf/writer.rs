//! SWF 文件写出器.
//!
//! 按标签逐个拼装 SWF 文件, 用于生成测试数据和工具输出:
//! 文件头在 [`SwfWriter::finish`] 时才写入, 因为总长度要等所有标签写完才知道.
//! CWS 文件把影片头和标签整体经 zlib 压缩.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use ying_core::{BitWriter, Rect, YingError, YingResult};

use super::tags;

/// 编码单个标签: 长度 ≥ 63 或 `force_long` 时使用 32 位长度字段
pub fn encode_tag(code: u16, payload: &[u8], force_long: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 6);
    if payload.len() < 0x3F && !force_long {
        out.extend_from_slice(&((code << 6) | payload.len() as u16).to_le_bytes());
    } else {
        out.extend_from_slice(&((code << 6) | 0x3F).to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// SWF 写出器
pub struct SwfWriter {
    version: u8,
    compressed: bool,
    frame_size: Rect,
    /// 8.8 定点
    frame_rate: u16,
    frame_count: Option<u16>,
    /// 已写出的帧数 (ShowFrame 个数)
    frames: u16,
    body: Vec<u8>,
}

impl SwfWriter {
    pub fn new(version: u8) -> Self {
        Self {
            version,
            compressed: false,
            frame_size: Rect::from_pixels(550, 400),
            frame_rate: 24 << 8,
            frame_count: None,
            frames: 0,
            body: Vec::new(),
        }
    }

    /// 输出 CWS (zlib 压缩) 文件
    pub fn compressed(&mut self, compressed: bool) -> &mut Self {
        self.compressed = compressed;
        self
    }

    pub fn frame_size(&mut self, rect: Rect) -> &mut Self {
        self.frame_size = rect;
        self
    }

    pub fn frame_rate(&mut self, fps: f32) -> &mut Self {
        self.frame_rate = (fps * 256.0).round().clamp(0.0, f32::from(u16::MAX)) as u16;
        self
    }

    /// 覆盖影片头中的帧数, 默认使用实际写出的 ShowFrame 个数
    pub fn frame_count(&mut self, count: u16) -> &mut Self {
        self.frame_count = Some(count);
        self
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// 写入一个标签
    pub fn tag(&mut self, code: u16, payload: &[u8]) -> &mut Self {
        if code == tags::SHOW_FRAME {
            self.frames = self.frames.saturating_add(1);
        }
        self.body.extend_from_slice(&encode_tag(code, payload, false));
        self
    }

    /// 写入一个强制使用 32 位长度字段的标签
    pub fn tag_long(&mut self, code: u16, payload: &[u8]) -> &mut Self {
        if code == tags::SHOW_FRAME {
            self.frames = self.frames.saturating_add(1);
        }
        self.body.extend_from_slice(&encode_tag(code, payload, true));
        self
    }

    pub fn show_frame(&mut self) -> &mut Self {
        self.tag(tags::SHOW_FRAME, &[])
    }

    pub fn end(&mut self) -> &mut Self {
        self.tag(tags::END, &[])
    }

    /// 生成完整文件
    pub fn finish(&self) -> YingResult<Vec<u8>> {
        let mut header = BitWriter::new();
        header.write_rect(&self.frame_size);
        header.write_u16(self.frame_rate);
        header.write_u16(self.frame_count.unwrap_or(self.frames));
        let mut movie = header.finish();
        movie.extend_from_slice(&self.body);

        let total = u32::try_from(movie.len() + 8)
            .map_err(|_| YingError::InvalidArgument("SWF 文件超过 4 GiB".into()))?;
        let mut out = Vec::with_capacity(movie.len() + 8);
        out.write_all(if self.compressed { b"CWS" } else { b"FWS" })?;
        out.write_u8(self.version)?;
        out.write_u32::<LittleEndian>(total)?;
        if self.compressed {
            let mut encoder = ZlibEncoder::new(out, Compression::default());
            encoder.write_all(&movie)?;
            out = encoder.finish()?;
        } else {
            out.extend_from_slice(&movie);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ying_core::BitReader;
    use ying_core::bitreader::inflate;

    #[test]
    fn test_encode_tag_short_and_long() {
        assert_eq!(encode_tag(tags::SHOW_FRAME, &[], false), vec![0x40, 0x00]);
        let long = encode_tag(tags::DO_ACTION, &[0], true);
        assert_eq!(long, vec![0x3F, 0x03, 1, 0, 0, 0, 0]);
        let big = encode_tag(tags::DO_ACTION, &[0; 63], false);
        assert_eq!(big.len(), 6 + 63);
    }

    #[test]
    fn test_finish_uncompressed_header() {
        let mut w = SwfWriter::new(6);
        w.frame_rate(12.0).show_frame().show_frame().end();
        let data = w.finish().unwrap();
        assert_eq!(&data[..3], b"FWS");
        assert_eq!(data[3], 6);
        let total = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        assert_eq!(total, data.len());

        let mut r = BitReader::from_slice(&data[8..]);
        assert_eq!(r.read_rect().unwrap(), Rect::from_pixels(550, 400));
        assert_eq!(r.read_u16().unwrap(), 12 << 8);
        assert_eq!(r.read_u16().unwrap(), 2);
    }

    #[test]
    fn test_finish_compressed_body() {
        let mut plain = SwfWriter::new(8);
        plain.show_frame().end();
        let mut packed = SwfWriter::new(8);
        packed.compressed(true).show_frame().end();
        let plain = plain.finish().unwrap();
        let packed = packed.finish().unwrap();
        assert_eq!(&packed[..3], b"CWS");
        assert_eq!(packed[4..8], plain[4..8]);
        let body = inflate(&packed[8..], None).unwrap();
        assert_eq!(&body[..], &plain[8..]);
    }
}
