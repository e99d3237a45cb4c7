//! 静态文本 (DefineText 1/2) 与输入文本框 (DefineEditText).

use bitflags::bitflags;
use log::debug;
use ying_core::{BitReader, Color, Matrix, Rect, YingResult};

use super::character::Character;
use super::context::TagContext;
use super::tags;

/// 字形下标与前进宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphEntry {
    pub index: u32,
    pub advance: i32,
}

/// 文本记录: 未出现的样式字段沿用上一条记录的值
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextRecord {
    pub font_id: Option<u16>,
    pub color: Option<Color>,
    pub x_offset: Option<i16>,
    pub y_offset: Option<i16>,
    pub height: Option<u16>,
    pub glyphs: Vec<GlyphEntry>,
}

/// 静态文本角色
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub id: u16,
    pub bounds: Rect,
    pub matrix: Matrix,
    pub records: Vec<TextRecord>,
}

impl Text {
    /// 文本引用的全部字体 ID (去重, 保持首次出现顺序)
    pub fn font_ids(&self) -> Vec<u16> {
        let mut ids = Vec::new();
        for id in self.records.iter().filter_map(|r| r.font_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

/// 解析 DefineText / DefineText2
pub fn parse_text(reader: &mut BitReader, tag: u16) -> YingResult<Text> {
    let with_alpha = tag == tags::DEFINE_TEXT2;
    let id = reader.read_u16()?;
    let bounds = reader.read_rect()?;
    let matrix = reader.read_matrix()?;
    let glyph_bits = u32::from(reader.read_u8()?);
    let advance_bits = u32::from(reader.read_u8()?);

    let mut records = Vec::new();
    loop {
        let flags = reader.read_u8()?;
        if flags == 0 {
            break;
        }
        let mut record = TextRecord::default();
        if flags & 0x08 != 0 {
            record.font_id = Some(reader.read_u16()?);
        }
        if flags & 0x04 != 0 {
            record.color = Some(if with_alpha {
                reader.read_color_rgba()?
            } else {
                reader.read_color_rgb()?
            });
        }
        if flags & 0x01 != 0 {
            record.x_offset = Some(reader.read_s16()?);
        }
        if flags & 0x02 != 0 {
            record.y_offset = Some(reader.read_s16()?);
        }
        if flags & 0x08 != 0 {
            record.height = Some(reader.read_u16()?);
        }
        let count = reader.read_u8()?;
        record.glyphs.reserve(count as usize);
        for _ in 0..count {
            let index = reader.read_bits(glyph_bits)?;
            let advance = reader.read_bits_signed(advance_bits)?;
            record.glyphs.push(GlyphEntry { index, advance });
        }
        reader.align_to_byte();
        records.push(record);
    }

    Ok(Text {
        id,
        bounds,
        matrix,
        records,
    })
}

pub fn define_text(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let text = parse_text(reader, ctx.tag)?;
    for font_id in text.font_ids() {
        ctx.check_reference(font_id);
    }
    debug!("文本 {}: {} 条记录", text.id, text.records.len());
    ctx.define(text.id, Character::Text(text));
    Ok(())
}

bitflags! {
    /// DefineEditText 标志 (按大端 16 位读取)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EditTextFlags: u16 {
        const HAS_TEXT = 0x8000;
        const WORD_WRAP = 0x4000;
        const MULTILINE = 0x2000;
        const PASSWORD = 0x1000;
        const READ_ONLY = 0x0800;
        const HAS_TEXT_COLOR = 0x0400;
        const HAS_MAX_LENGTH = 0x0200;
        const HAS_FONT = 0x0100;
        const HAS_FONT_CLASS = 0x0080;
        const AUTO_SIZE = 0x0040;
        const HAS_LAYOUT = 0x0020;
        const NO_SELECT = 0x0010;
        const BORDER = 0x0008;
        const WAS_STATIC = 0x0004;
        const HTML = 0x0002;
        const USE_OUTLINES = 0x0001;
    }
}

/// 段落排版参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditTextLayout {
    /// 0 左对齐, 1 右对齐, 2 居中, 3 两端对齐
    pub align: u8,
    pub left_margin: u16,
    pub right_margin: u16,
    pub indent: u16,
    pub leading: i16,
}

/// 输入文本框角色
#[derive(Debug, Clone, PartialEq)]
pub struct EditText {
    pub id: u16,
    pub bounds: Rect,
    pub flags: EditTextFlags,
    pub font_id: Option<u16>,
    pub font_class: Option<String>,
    pub height: Option<u16>,
    pub color: Option<Color>,
    pub max_length: Option<u16>,
    pub layout: Option<EditTextLayout>,
    pub variable_name: String,
    pub initial_text: Option<String>,
}

pub fn parse_edit_text(reader: &mut BitReader, version: u8) -> YingResult<EditText> {
    let id = reader.read_u16()?;
    let bounds = reader.read_rect()?;
    let flags = EditTextFlags::from_bits_retain(reader.read_bu16()?);
    let font_id = if flags.contains(EditTextFlags::HAS_FONT) {
        Some(reader.read_u16()?)
    } else {
        None
    };
    let font_class = if flags.contains(EditTextFlags::HAS_FONT_CLASS) {
        Some(reader.read_string(version)?)
    } else {
        None
    };
    let height = if flags.intersects(EditTextFlags::HAS_FONT | EditTextFlags::HAS_FONT_CLASS) {
        Some(reader.read_u16()?)
    } else {
        None
    };
    let color = if flags.contains(EditTextFlags::HAS_TEXT_COLOR) {
        Some(reader.read_color_rgba()?)
    } else {
        None
    };
    let max_length = if flags.contains(EditTextFlags::HAS_MAX_LENGTH) {
        Some(reader.read_u16()?)
    } else {
        None
    };
    let layout = if flags.contains(EditTextFlags::HAS_LAYOUT) {
        Some(EditTextLayout {
            align: reader.read_u8()?,
            left_margin: reader.read_u16()?,
            right_margin: reader.read_u16()?,
            indent: reader.read_u16()?,
            leading: reader.read_s16()?,
        })
    } else {
        None
    };
    let variable_name = reader.read_string(version)?;
    let initial_text = if flags.contains(EditTextFlags::HAS_TEXT) {
        Some(reader.read_string(version)?)
    } else {
        None
    };

    Ok(EditText {
        id,
        bounds,
        flags,
        font_id,
        font_class,
        height,
        color,
        max_length,
        layout,
        variable_name,
        initial_text,
    })
}

pub fn define_edit_text(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let text = parse_edit_text(reader, ctx.version)?;
    if let Some(font_id) = text.font_id {
        ctx.check_reference(font_id);
    }
    ctx.define(text.id, Character::EditText(text));
    Ok(())
}
