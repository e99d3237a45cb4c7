//! 字体: DefineFont 1/2/3, DefineFontInfo 1/2, DefineFontName.
//!
//! 字形通过偏移表间接定位: 第 i 个偏移到第 i+1 个偏移之间是第 i 个字形的
//! SHAPE 记录, 最后一个字形延伸到表尾 (DefineFont2/3 为代码表偏移).
//! 偏移表损坏时只保留能完整解析的前若干个字形.

use bitflags::bitflags;
use bytes::Bytes;
use log::{debug, warn};
use ying_core::bitreader::decode_string;
use ying_core::{BitReader, Rect, YingError, YingResult};

use super::character::Character;
use super::context::TagContext;
use super::shape::{ShapeRecord, read_glyph_shape};
use super::tags;

bitflags! {
    /// DefineFont2/3 标志字节
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FontFlags: u8 {
        const BOLD = 0x01;
        const ITALIC = 0x02;
        const WIDE_CODES = 0x04;
        const WIDE_OFFSETS = 0x08;
        const ANSI = 0x10;
        const SMALL_TEXT = 0x20;
        const SHIFT_JIS = 0x40;
        const HAS_LAYOUT = 0x80;
    }
}

/// 字形
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub shape: Vec<ShapeRecord>,
    /// 字符码 (没有代码表时为 0)
    pub code: u16,
}

/// 字距调整
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KerningRecord {
    pub left: u16,
    pub right: u16,
    pub adjustment: i16,
}

/// 字体排版信息
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontLayout {
    pub ascent: u16,
    pub descent: u16,
    pub leading: i16,
    pub advances: Vec<i16>,
    pub bounds: Vec<Rect>,
    pub kerning: Vec<KerningRecord>,
}

/// 字体角色
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Font {
    pub id: u16,
    /// 1, 2 或 3
    pub version: u8,
    pub name: Option<String>,
    pub flags: FontFlags,
    pub language: u8,
    pub glyphs: Vec<Glyph>,
    pub layout: Option<FontLayout>,
    /// DefineFontName 提供的显示名与版权
    pub display_name: Option<String>,
    pub copyright: Option<String>,
}

impl Font {
    /// 字形坐标的 EM 方框大小 (DefineFont3 精度为 1/20)
    pub fn em_square(&self) -> u32 {
        if self.version >= 3 { 1024 * 20 } else { 1024 }
    }

    /// 按字符码查找字形下标
    pub fn glyph_for_code(&self, code: u16) -> Option<usize> {
        self.glyphs.iter().position(|g| g.code == code)
    }
}

/// 按偏移表切出字形数据并逐个解析
///
/// `offsets` 相对于 `table` 起点, `end` 是最后一个字形的结束位置.
fn parse_glyphs(font_id: u16, table: &Bytes, offsets: &[usize], end: usize) -> Vec<Glyph> {
    let mut glyphs = Vec::with_capacity(offsets.len());
    for (i, &start) in offsets.iter().enumerate() {
        let stop = offsets.get(i + 1).copied().unwrap_or(end);
        if start > stop || stop > table.len() {
            warn!(
                "字体 {} 的字形 {} 偏移 ({}..{}) 非法, 只保留前 {} 个字形",
                font_id, i, start, stop, i
            );
            break;
        }
        let mut reader = BitReader::new(table.slice(start..stop));
        match read_glyph_shape(&mut reader, 1) {
            Ok(shape) => glyphs.push(Glyph { shape, code: 0 }),
            Err(e) => {
                warn!(
                    "字体 {} 的字形 {} 解析失败 ({}), 只保留前 {} 个字形",
                    font_id, i, e, i
                );
                break;
            }
        }
    }
    glyphs
}

/// 解析 DefineFont (v1)
pub fn parse_font1(reader: &mut BitReader) -> YingResult<Font> {
    let id = reader.read_u16()?;
    let table = reader.read_remaining();
    let mut tr = BitReader::new(table.clone());
    let first = if table.is_empty() {
        0
    } else {
        tr.read_u16()? as usize
    };
    if first % 2 != 0 {
        warn!("字体 {} 的偏移表长度 {} 不是偶数", id, first);
    }
    let count = first / 2;
    let mut offsets = Vec::with_capacity(count);
    if count > 0 {
        offsets.push(first);
    }
    for _ in 1..count {
        offsets.push(tr.read_u16()? as usize);
    }
    let glyphs = parse_glyphs(id, &table, &offsets, table.len());
    Ok(Font {
        id,
        version: 1,
        glyphs,
        ..Font::default()
    })
}

/// 解析 DefineFont2 / DefineFont3
pub fn parse_font2(reader: &mut BitReader, tag: u16, version: u8) -> YingResult<Font> {
    let font_version = if tag == tags::DEFINE_FONT3 { 3 } else { 2 };
    let id = reader.read_u16()?;
    let flags = FontFlags::from_bits_retain(reader.read_u8()?);
    let language = reader.read_u8()?;
    let name_len = reader.read_u8()? as usize;
    let raw_name = reader.read_buffer(name_len)?;
    let name = decode_string(raw_name.strip_suffix(&[0]).unwrap_or(&raw_name), version);
    let num_glyphs = reader.read_u16()? as usize;

    let table = reader.read_remaining();
    let mut tr = BitReader::new(table.clone());
    let wide_offsets = flags.contains(FontFlags::WIDE_OFFSETS);
    let read_offset = |tr: &mut BitReader| -> YingResult<usize> {
        if wide_offsets {
            Ok(tr.read_u32()? as usize)
        } else {
            Ok(tr.read_u16()? as usize)
        }
    };
    let mut offsets = Vec::with_capacity(num_glyphs);
    for _ in 0..num_glyphs {
        offsets.push(read_offset(&mut tr)?);
    }
    let code_table_offset = if num_glyphs > 0 || tr.bytes_left() > 0 {
        read_offset(&mut tr)?
    } else {
        tr.position()
    };
    let glyph_end = code_table_offset.min(table.len());
    if code_table_offset > table.len() {
        warn!(
            "字体 {} 的代码表偏移 {} 超出数据长度 {}",
            id,
            code_table_offset,
            table.len()
        );
    }
    let mut glyphs = parse_glyphs(id, &table, &offsets, glyph_end);

    let mut rest = BitReader::new(table.slice(glyph_end..));
    let wide_codes = flags.contains(FontFlags::WIDE_CODES) || font_version == 3;
    for glyph in glyphs.iter_mut() {
        glyph.code = if wide_codes {
            rest.read_u16()?
        } else {
            u16::from(rest.read_u8()?)
        };
    }
    // 被截断的字形也在代码表里占位
    for _ in glyphs.len()..num_glyphs {
        if wide_codes {
            rest.read_u16()?;
        } else {
            rest.read_u8()?;
        }
    }

    let layout = if flags.contains(FontFlags::HAS_LAYOUT) {
        Some(read_layout(&mut rest, num_glyphs, wide_codes)?)
    } else {
        None
    };
    if rest.bytes_left() > 0 {
        debug!("字体 {} 末尾有 {} 字节未解析", id, rest.bytes_left());
    }

    Ok(Font {
        id,
        version: font_version,
        name: Some(name),
        flags,
        language,
        glyphs,
        layout,
        display_name: None,
        copyright: None,
    })
}

fn read_layout(reader: &mut BitReader, num_glyphs: usize, wide_codes: bool) -> YingResult<FontLayout> {
    let ascent = reader.read_u16()?;
    let descent = reader.read_u16()?;
    let leading = reader.read_s16()?;
    let advances = (0..num_glyphs)
        .map(|_| reader.read_s16())
        .collect::<YingResult<Vec<_>>>()?;
    let bounds = (0..num_glyphs)
        .map(|_| reader.read_rect())
        .collect::<YingResult<Vec<_>>>()?;
    let count = reader.read_u16()?;
    let mut kerning = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (left, right) = if wide_codes {
            (reader.read_u16()?, reader.read_u16()?)
        } else {
            (u16::from(reader.read_u8()?), u16::from(reader.read_u8()?))
        };
        kerning.push(KerningRecord {
            left,
            right,
            adjustment: reader.read_s16()?,
        });
    }
    Ok(FontLayout {
        ascent,
        descent,
        leading,
        advances,
        bounds,
        kerning,
    })
}

pub fn define_font(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let font = parse_font1(reader)?;
    debug!("字体 {}: {} 个字形", font.id, font.glyphs.len());
    ctx.define(font.id, Character::Font(font));
    Ok(())
}

pub fn define_font2(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let font = parse_font2(reader, ctx.tag, ctx.version)?;
    debug!(
        "字体 {} ({}): {} 个字形",
        font.id,
        font.name.as_deref().unwrap_or(""),
        font.glyphs.len()
    );
    ctx.define(font.id, Character::Font(font));
    Ok(())
}

/// DefineFontInfo / DefineFontInfo2: 为已有字体补充名称、标志与代码表
pub fn define_font_info(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let id = reader.read_u16()?;
    let name_len = reader.read_u8()? as usize;
    let raw_name = reader.read_buffer(name_len)?;
    let name = decode_string(raw_name.strip_suffix(&[0]).unwrap_or(&raw_name), ctx.version);
    let info_flags = reader.read_u8()?;
    let language = if ctx.tag == tags::DEFINE_FONT_INFO2 {
        reader.read_u8()?
    } else {
        0
    };
    let wide_codes = info_flags & 0x01 != 0;

    let Some(font) = ctx.dictionary.font_mut(id) else {
        warn!("{} 引用的字体 {} 未定义", tags::tag_name(ctx.tag), id);
        reader.read_remaining();
        return Ok(());
    };
    // FontInfo 的标志位排列与 DefineFont2 不同
    let mut flags = FontFlags::empty();
    flags.set(FontFlags::WIDE_CODES, wide_codes);
    flags.set(FontFlags::BOLD, info_flags & 0x02 != 0);
    flags.set(FontFlags::ITALIC, info_flags & 0x04 != 0);
    flags.set(FontFlags::ANSI, info_flags & 0x08 != 0);
    flags.set(FontFlags::SHIFT_JIS, info_flags & 0x10 != 0);
    flags.set(FontFlags::SMALL_TEXT, info_flags & 0x20 != 0);
    font.name = Some(name);
    font.flags = flags;
    font.language = language;
    for glyph in font.glyphs.iter_mut() {
        glyph.code = if wide_codes {
            reader.read_u16()?
        } else {
            u16::from(reader.read_u8()?)
        };
    }
    Ok(())
}

/// DefineFontName: 字体的显示名与版权信息
pub fn define_font_name(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let id = reader.read_u16()?;
    let name = reader.read_string(ctx.version)?;
    let copyright = reader.read_string(ctx.version)?;
    match ctx.dictionary.font_mut(id) {
        Some(font) => {
            font.display_name = Some(name);
            font.copyright = Some(copyright);
            Ok(())
        }
        None => Err(YingError::Malformed(format!(
            "DefineFontName 引用的字体 {} 未定义",
            id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ying_core::BitWriter;

    /// 一个只含一条直线的字形
    fn glyph_bytes(dx: i32) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(1, 4);
        w.write_bits(0, 4);
        w.write_bit(true);
        w.write_bit(true);
        w.write_bits(6, 4);
        w.write_bit(true);
        w.write_bits_signed(dx, 8);
        w.write_bits_signed(0, 8);
        w.write_bit(false);
        w.write_bits(0, 5);
        w.finish()
    }

    fn first_dx(glyph: &Glyph) -> i32 {
        match glyph.shape[0] {
            ShapeRecord::StraightEdge { dx, .. } => dx,
            ref other => panic!("意外的记录: {:?}", other),
        }
    }

    #[test]
    fn test_define_font1_offset_table() {
        let g0 = glyph_bytes(10);
        let g1 = glyph_bytes(20);
        let mut w = BitWriter::new();
        w.write_u16(3);
        w.write_u16(4);
        w.write_u16((4 + g0.len()) as u16);
        w.write_bytes(&g0);
        w.write_bytes(&g1);
        let mut r = BitReader::from_slice(&w.finish());
        let font = parse_font1(&mut r).unwrap();
        assert_eq!(font.glyphs.len(), 2);
        assert_eq!(first_dx(&font.glyphs[0]), 10);
        assert_eq!(first_dx(&font.glyphs[1]), 20);
        assert_eq!(font.em_square(), 1024);
    }

    #[test]
    fn test_define_font1_truncates_bad_offsets() {
        let g0 = glyph_bytes(10);
        let mut w = BitWriter::new();
        w.write_u16(3);
        w.write_u16(6);
        w.write_u16((6 + g0.len()) as u16);
        w.write_u16(500); // 越界
        w.write_bytes(&g0);
        let mut r = BitReader::from_slice(&w.finish());
        let font = parse_font1(&mut r).unwrap();
        assert_eq!(font.glyphs.len(), 1);
    }

    fn font2_bytes(with_layout: bool) -> Vec<u8> {
        let g0 = glyph_bytes(5);
        let g1 = glyph_bytes(-5);
        let mut w = BitWriter::new();
        w.write_u16(8);
        let mut flags = FontFlags::WIDE_CODES | FontFlags::BOLD;
        if with_layout {
            flags |= FontFlags::HAS_LAYOUT;
        }
        w.write_u8(flags.bits());
        w.write_u8(1);
        w.write_u8(5);
        w.write_bytes(b"Arial");
        w.write_u16(2);
        // 偏移表: 2 个字形 + 代码表偏移, 共 6 字节
        w.write_u16(6);
        w.write_u16((6 + g0.len()) as u16);
        w.write_u16((6 + g0.len() + g1.len()) as u16);
        w.write_bytes(&g0);
        w.write_bytes(&g1);
        w.write_u16(u16::from(b'A'));
        w.write_u16(u16::from(b'B'));
        if with_layout {
            w.write_u16(900);
            w.write_u16(200);
            w.write_s16(-3);
            w.write_s16(500);
            w.write_s16(600);
            w.write_rect(&Rect::new(0, 10, 0, 10));
            w.write_rect(&Rect::new(0, 20, 0, 20));
            w.write_u16(1);
            w.write_u16(u16::from(b'A'));
            w.write_u16(u16::from(b'B'));
            w.write_s16(-40);
        }
        w.finish()
    }

    #[test]
    fn test_define_font2_with_layout() {
        let mut r = BitReader::from_slice(&font2_bytes(true));
        let font = parse_font2(&mut r, tags::DEFINE_FONT2, 8).unwrap();
        assert_eq!(font.name.as_deref(), Some("Arial"));
        assert!(font.flags.contains(FontFlags::BOLD));
        assert_eq!(font.glyphs.len(), 2);
        assert_eq!(font.glyph_for_code(u16::from(b'B')), Some(1));
        assert_eq!(first_dx(&font.glyphs[1]), -5);
        let layout = font.layout.unwrap();
        assert_eq!(layout.ascent, 900);
        assert_eq!(layout.leading, -3);
        assert_eq!(layout.advances, vec![500, 600]);
        assert_eq!(layout.bounds[1], Rect::new(0, 20, 0, 20));
        assert_eq!(
            layout.kerning,
            vec![KerningRecord {
                left: 65,
                right: 66,
                adjustment: -40
            }]
        );
    }

    #[test]
    fn test_define_font3_uses_twentieths() {
        let mut r = BitReader::from_slice(&font2_bytes(false));
        let font = parse_font2(&mut r, tags::DEFINE_FONT3, 8).unwrap();
        assert_eq!(font.version, 3);
        assert_eq!(font.em_square(), 20480);
        assert!(font.layout.is_none());
    }
}
