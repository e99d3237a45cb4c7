//! 形状与变形形状.
//!
//! DefineShape 1-4 共用同一套记录格式, 版本差异:
//! - v1: 样式数量最多 255, 颜色为 RGB, 形状记录中不能出现新样式
//! - v2: 样式数量可扩展到 u16, 允许新样式
//! - v3: 颜色为 RGBA
//! - v4: 增加边界框 (不含线宽) 与 LINESTYLE2, 支持焦点渐变

use log::{trace, warn};
use ying_core::{BitReader, Color, Matrix, Rect, YingError, YingResult};

use super::character::Character;
use super::context::TagContext;
use super::tags;

/// 渐变控制点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub ratio: u8,
    pub color: Color,
}

/// 渐变
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub matrix: Matrix,
    /// 0 = pad, 1 = reflect, 2 = repeat
    pub spread: u8,
    /// 0 = 普通 RGB, 1 = 线性 RGB
    pub interpolation: u8,
    pub stops: Vec<GradientStop>,
    /// 焦点位置 (-1.0 到 1.0), 仅焦点渐变使用
    pub focal_point: f32,
}

/// 填充样式
#[derive(Debug, Clone, PartialEq)]
pub enum FillStyle {
    Solid(Color),
    LinearGradient(Gradient),
    RadialGradient(Gradient),
    FocalGradient(Gradient),
    Bitmap {
        id: u16,
        matrix: Matrix,
        repeat: bool,
        smooth: bool,
    },
}

/// 线条样式
#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    /// 线宽 (twips)
    pub width: u16,
    pub color: Color,
    /// 0 = 圆头, 1 = 无, 2 = 方头
    pub start_cap: u8,
    pub end_cap: u8,
    /// 0 = 圆角, 1 = 斜角, 2 = 尖角
    pub join: u8,
    pub miter_limit: f32,
    pub no_hscale: bool,
    pub no_vscale: bool,
    pub pixel_hinting: bool,
    pub no_close: bool,
    /// LINESTYLE2 的填充线条
    pub fill: Option<FillStyle>,
}

impl LineStyle {
    fn solid(width: u16, color: Color) -> Self {
        Self {
            width,
            color,
            start_cap: 0,
            end_cap: 0,
            join: 0,
            miter_limit: 3.0,
            no_hscale: false,
            no_vscale: false,
            pixel_hinting: false,
            no_close: false,
            fill: None,
        }
    }
}

/// 新样式表 (StyleChange 中出现)
#[derive(Debug, Clone, PartialEq)]
pub struct StyleTable {
    pub fill_styles: Vec<FillStyle>,
    pub line_styles: Vec<LineStyle>,
}

/// 样式切换记录
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleChange {
    pub move_to: Option<(i32, i32)>,
    pub fill_style0: Option<u32>,
    pub fill_style1: Option<u32>,
    pub line_style: Option<u32>,
    pub new_styles: Option<StyleTable>,
}

/// 形状记录
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeRecord {
    StyleChange(StyleChange),
    StraightEdge {
        dx: i32,
        dy: i32,
    },
    CurvedEdge {
        control_dx: i32,
        control_dy: i32,
        anchor_dx: i32,
        anchor_dy: i32,
    },
}

/// 形状角色
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: u16,
    /// 1-4
    pub version: u8,
    pub bounds: Rect,
    /// 不含线宽的边界 (仅 v4)
    pub edge_bounds: Option<Rect>,
    /// v4 标志: bit2 = 填充规则为 nonzero, bit1 = 含非缩放线条, bit0 = 含缩放线条
    pub flags: u8,
    pub fill_styles: Vec<FillStyle>,
    pub line_styles: Vec<LineStyle>,
    pub records: Vec<ShapeRecord>,
}

/// 变形形状的填充样式: 起止两套
#[derive(Debug, Clone, PartialEq)]
pub struct MorphFillStyle {
    pub start: FillStyle,
    pub end: FillStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphLineStyle {
    pub start: LineStyle,
    pub end: LineStyle,
}

/// 变形形状角色 (DefineMorphShape / DefineMorphShape2)
#[derive(Debug, Clone, PartialEq)]
pub struct MorphShape {
    pub id: u16,
    /// 1 或 2
    pub version: u8,
    pub start_bounds: Rect,
    pub end_bounds: Rect,
    pub start_edge_bounds: Option<Rect>,
    pub end_edge_bounds: Option<Rect>,
    pub flags: u8,
    pub fill_styles: Vec<MorphFillStyle>,
    pub line_styles: Vec<MorphLineStyle>,
    pub start_records: Vec<ShapeRecord>,
    pub end_records: Vec<ShapeRecord>,
}

fn read_color(reader: &mut BitReader, version: u8) -> YingResult<Color> {
    if version >= 3 {
        reader.read_color_rgba()
    } else {
        reader.read_color_rgb()
    }
}

fn read_gradient(reader: &mut BitReader, version: u8, matrix: Matrix) -> YingResult<Gradient> {
    let spread = reader.read_bits(2)? as u8;
    let interpolation = reader.read_bits(2)? as u8;
    let count = reader.read_bits(4)?;
    let mut stops = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let ratio = reader.read_u8()?;
        let color = read_color(reader, version)?;
        stops.push(GradientStop { ratio, color });
    }
    Ok(Gradient {
        matrix,
        spread,
        interpolation,
        stops,
        focal_point: 0.0,
    })
}

/// 读取单个填充样式
pub fn read_fill_style(reader: &mut BitReader, version: u8) -> YingResult<FillStyle> {
    let kind = reader.read_u8()?;
    match kind {
        0x00 => Ok(FillStyle::Solid(read_color(reader, version)?)),
        0x10 | 0x12 | 0x13 => {
            let matrix = reader.read_matrix()?;
            let mut gradient = read_gradient(reader, version, matrix)?;
            Ok(match kind {
                0x10 => FillStyle::LinearGradient(gradient),
                0x12 => FillStyle::RadialGradient(gradient),
                _ => {
                    if version < 4 {
                        warn!("DefineShape{} 中出现焦点渐变", version);
                    }
                    gradient.focal_point = reader.read_fixed8()?;
                    FillStyle::FocalGradient(gradient)
                }
            })
        }
        0x40..=0x43 => {
            let id = reader.read_u16()?;
            let matrix = reader.read_matrix()?;
            Ok(FillStyle::Bitmap {
                id,
                matrix,
                repeat: kind & 0x01 == 0,
                smooth: kind & 0x02 == 0,
            })
        }
        other => Err(YingError::Malformed(format!("未知的填充类型 0x{:02X}", other))),
    }
}

fn read_style_count(reader: &mut BitReader, extended: bool) -> YingResult<usize> {
    let count = reader.read_u8()?;
    if count == 0xFF && extended {
        Ok(reader.read_u16()? as usize)
    } else {
        Ok(count as usize)
    }
}

/// 读取 FILLSTYLEARRAY
pub fn read_fill_styles(reader: &mut BitReader, version: u8) -> YingResult<Vec<FillStyle>> {
    let count = read_style_count(reader, version >= 2)?;
    (0..count).map(|_| read_fill_style(reader, version)).collect()
}

/// 读取单个线条样式 (v4 为 LINESTYLE2)
pub fn read_line_style(reader: &mut BitReader, version: u8) -> YingResult<LineStyle> {
    let width = reader.read_u16()?;
    if version < 4 {
        return Ok(LineStyle::solid(width, read_color(reader, version)?));
    }
    let mut style = LineStyle::solid(width, Color::BLACK);
    style.start_cap = reader.read_bits(2)? as u8;
    style.join = reader.read_bits(2)? as u8;
    let has_fill = reader.read_bit()?;
    style.no_hscale = reader.read_bit()?;
    style.no_vscale = reader.read_bit()?;
    style.pixel_hinting = reader.read_bit()?;
    reader.read_bits(5)?;
    style.no_close = reader.read_bit()?;
    style.end_cap = reader.read_bits(2)? as u8;
    if style.join == 2 {
        style.miter_limit = reader.read_fixed8()?;
    }
    if has_fill {
        style.fill = Some(read_fill_style(reader, version)?);
    } else {
        style.color = reader.read_color_rgba()?;
    }
    Ok(style)
}

/// 读取 LINESTYLEARRAY
pub fn read_line_styles(reader: &mut BitReader, version: u8) -> YingResult<Vec<LineStyle>> {
    let count = read_style_count(reader, true)?;
    (0..count).map(|_| read_line_style(reader, version)).collect()
}

/// 读取形状记录直到结束记录, 读完后对齐
pub fn read_shape_records(
    reader: &mut BitReader,
    version: u8,
    mut fill_bits: u32,
    mut line_bits: u32,
) -> YingResult<Vec<ShapeRecord>> {
    let mut records = Vec::new();
    loop {
        let is_edge = reader.read_bit()?;
        if !is_edge {
            let flags = reader.read_bits(5)?;
            if flags == 0 {
                break;
            }
            let mut change = StyleChange::default();
            if flags & 0x01 != 0 {
                let nbits = reader.read_bits(5)?;
                let x = reader.read_bits_signed(nbits)?;
                let y = reader.read_bits_signed(nbits)?;
                change.move_to = Some((x, y));
            }
            if flags & 0x02 != 0 {
                change.fill_style0 = Some(reader.read_bits(fill_bits)?);
            }
            if flags & 0x04 != 0 {
                change.fill_style1 = Some(reader.read_bits(fill_bits)?);
            }
            if flags & 0x08 != 0 {
                change.line_style = Some(reader.read_bits(line_bits)?);
            }
            if flags & 0x10 != 0 {
                if version < 2 {
                    return Err(YingError::Malformed(
                        "DefineShape1 的形状记录中出现新样式".into(),
                    ));
                }
                let fill_styles = read_fill_styles(reader, version)?;
                let line_styles = read_line_styles(reader, version)?;
                fill_bits = reader.read_bits(4)?;
                line_bits = reader.read_bits(4)?;
                change.new_styles = Some(StyleTable {
                    fill_styles,
                    line_styles,
                });
            }
            records.push(ShapeRecord::StyleChange(change));
            continue;
        }

        let straight = reader.read_bit()?;
        let nbits = reader.read_bits(4)? + 2;
        if straight {
            let (dx, dy) = if reader.read_bit()? {
                (reader.read_bits_signed(nbits)?, reader.read_bits_signed(nbits)?)
            } else if reader.read_bit()? {
                (0, reader.read_bits_signed(nbits)?)
            } else {
                (reader.read_bits_signed(nbits)?, 0)
            };
            records.push(ShapeRecord::StraightEdge { dx, dy });
        } else {
            records.push(ShapeRecord::CurvedEdge {
                control_dx: reader.read_bits_signed(nbits)?,
                control_dy: reader.read_bits_signed(nbits)?,
                anchor_dx: reader.read_bits_signed(nbits)?,
                anchor_dy: reader.read_bits_signed(nbits)?,
            });
        }
    }
    reader.align_to_byte();
    Ok(records)
}

/// 读取不带样式表的 SHAPE 记录 (字形与变形形状使用)
pub fn read_glyph_shape(reader: &mut BitReader, version: u8) -> YingResult<Vec<ShapeRecord>> {
    reader.align_to_byte();
    let fill_bits = reader.read_bits(4)?;
    let line_bits = reader.read_bits(4)?;
    read_shape_records(reader, version, fill_bits, line_bits)
}

fn shape_version(tag: u16) -> u8 {
    match tag {
        tags::DEFINE_SHAPE2 => 2,
        tags::DEFINE_SHAPE3 => 3,
        tags::DEFINE_SHAPE4 => 4,
        _ => 1,
    }
}

/// 解析 DefineShape 1-4 的标签数据
pub fn parse_shape(reader: &mut BitReader, tag: u16) -> YingResult<Shape> {
    let version = shape_version(tag);
    let id = reader.read_u16()?;
    let bounds = reader.read_rect()?;
    let (edge_bounds, flags) = if version >= 4 {
        let edge = reader.read_rect()?;
        (Some(edge), reader.read_u8()?)
    } else {
        (None, 0)
    };
    let fill_styles = read_fill_styles(reader, version)?;
    let line_styles = read_line_styles(reader, version)?;
    let fill_bits = reader.read_bits(4)?;
    let line_bits = reader.read_bits(4)?;
    let records = read_shape_records(reader, version, fill_bits, line_bits)?;
    Ok(Shape {
        id,
        version,
        bounds,
        edge_bounds,
        flags,
        fill_styles,
        line_styles,
        records,
    })
}

pub fn define_shape(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let shape = parse_shape(reader, ctx.tag)?;
    trace!(
        "形状 {}: {} 填充, {} 线条, {} 记录",
        shape.id,
        shape.fill_styles.len(),
        shape.line_styles.len(),
        shape.records.len()
    );
    ctx.define(shape.id, Character::Shape(shape));
    Ok(())
}

fn read_morph_gradient(
    reader: &mut BitReader,
    version: u8,
    start_matrix: Matrix,
    end_matrix: Matrix,
) -> YingResult<(Gradient, Gradient)> {
    let head = reader.read_u8()?;
    // DefineMorphShape2 在高 4 位存放 spread 与插值模式
    let (spread, interpolation) = if version >= 2 {
        (head >> 6, (head >> 4) & 0x03)
    } else {
        (0, 0)
    };
    let count = head & 0x0F;
    let mut start = Vec::with_capacity(count as usize);
    let mut end = Vec::with_capacity(count as usize);
    for _ in 0..count {
        start.push(GradientStop {
            ratio: reader.read_u8()?,
            color: reader.read_color_rgba()?,
        });
        end.push(GradientStop {
            ratio: reader.read_u8()?,
            color: reader.read_color_rgba()?,
        });
    }
    let make = |matrix, stops| Gradient {
        matrix,
        spread,
        interpolation,
        stops,
        focal_point: 0.0,
    };
    Ok((make(start_matrix, start), make(end_matrix, end)))
}

fn read_morph_fill_style(reader: &mut BitReader, version: u8) -> YingResult<MorphFillStyle> {
    let kind = reader.read_u8()?;
    match kind {
        0x00 => Ok(MorphFillStyle {
            start: FillStyle::Solid(reader.read_color_rgba()?),
            end: FillStyle::Solid(reader.read_color_rgba()?),
        }),
        0x10 | 0x12 | 0x13 => {
            let start_matrix = reader.read_matrix()?;
            let end_matrix = reader.read_matrix()?;
            let (mut start, mut end) =
                read_morph_gradient(reader, version, start_matrix, end_matrix)?;
            Ok(match kind {
                0x10 => MorphFillStyle {
                    start: FillStyle::LinearGradient(start),
                    end: FillStyle::LinearGradient(end),
                },
                0x12 => MorphFillStyle {
                    start: FillStyle::RadialGradient(start),
                    end: FillStyle::RadialGradient(end),
                },
                _ => {
                    start.focal_point = reader.read_fixed8()?;
                    end.focal_point = reader.read_fixed8()?;
                    MorphFillStyle {
                        start: FillStyle::FocalGradient(start),
                        end: FillStyle::FocalGradient(end),
                    }
                }
            })
        }
        0x40..=0x43 => {
            let id = reader.read_u16()?;
            let start_matrix = reader.read_matrix()?;
            let end_matrix = reader.read_matrix()?;
            let make = |matrix| FillStyle::Bitmap {
                id,
                matrix,
                repeat: kind & 0x01 == 0,
                smooth: kind & 0x02 == 0,
            };
            Ok(MorphFillStyle {
                start: make(start_matrix),
                end: make(end_matrix),
            })
        }
        other => Err(YingError::Malformed(format!(
            "未知的变形填充类型 0x{:02X}",
            other
        ))),
    }
}

fn read_morph_line_style(reader: &mut BitReader, version: u8) -> YingResult<MorphLineStyle> {
    let start_width = reader.read_u16()?;
    let end_width = reader.read_u16()?;
    if version < 2 {
        let start_color = reader.read_color_rgba()?;
        let end_color = reader.read_color_rgba()?;
        return Ok(MorphLineStyle {
            start: LineStyle::solid(start_width, start_color),
            end: LineStyle::solid(end_width, end_color),
        });
    }
    let mut start = LineStyle::solid(start_width, Color::BLACK);
    start.start_cap = reader.read_bits(2)? as u8;
    start.join = reader.read_bits(2)? as u8;
    let has_fill = reader.read_bit()?;
    start.no_hscale = reader.read_bit()?;
    start.no_vscale = reader.read_bit()?;
    start.pixel_hinting = reader.read_bit()?;
    reader.read_bits(5)?;
    start.no_close = reader.read_bit()?;
    start.end_cap = reader.read_bits(2)? as u8;
    if start.join == 2 {
        start.miter_limit = reader.read_fixed8()?;
    }
    let mut end = start.clone();
    end.width = end_width;
    if has_fill {
        let fill = read_morph_fill_style(reader, version)?;
        start.fill = Some(fill.start);
        end.fill = Some(fill.end);
    } else {
        start.color = reader.read_color_rgba()?;
        end.color = reader.read_color_rgba()?;
    }
    Ok(MorphLineStyle { start, end })
}

/// 解析 DefineMorphShape / DefineMorphShape2 的标签数据
pub fn parse_morph_shape(reader: &mut BitReader, tag: u16) -> YingResult<MorphShape> {
    let version = if tag == tags::DEFINE_MORPH_SHAPE2 { 2 } else { 1 };
    let id = reader.read_u16()?;
    let start_bounds = reader.read_rect()?;
    let end_bounds = reader.read_rect()?;
    let (start_edge_bounds, end_edge_bounds, flags) = if version >= 2 {
        let s = reader.read_rect()?;
        let e = reader.read_rect()?;
        (Some(s), Some(e), reader.read_u8()?)
    } else {
        (None, None, 0)
    };
    // 结束边记录相对于本字段之后的偏移
    let offset = reader.read_u32()? as usize;
    let body = reader.read_remaining();
    if offset > body.len() {
        return Err(YingError::Malformed(format!(
            "变形形状 {} 的结束边偏移 {} 超出数据长度 {}",
            id,
            offset,
            body.len()
        )));
    }
    let mut start_reader = BitReader::new(body.slice(..offset));
    let mut end_reader = BitReader::new(body.slice(offset..));

    let count = read_style_count(&mut start_reader, true)?;
    let fill_styles = (0..count)
        .map(|_| read_morph_fill_style(&mut start_reader, version))
        .collect::<YingResult<Vec<_>>>()?;
    let count = read_style_count(&mut start_reader, true)?;
    let line_styles = (0..count)
        .map(|_| read_morph_line_style(&mut start_reader, version))
        .collect::<YingResult<Vec<_>>>()?;
    let start_records = read_glyph_shape(&mut start_reader, 3)?;
    if start_reader.bytes_left() > 0 {
        warn!(
            "变形形状 {} 的起始边之后有 {} 字节未解析",
            id,
            start_reader.bytes_left()
        );
    }
    let end_records = read_glyph_shape(&mut end_reader, 3)?;
    if end_reader.bytes_left() > 0 {
        warn!(
            "变形形状 {} 的结束边之后有 {} 字节未解析",
            id,
            end_reader.bytes_left()
        );
    }

    Ok(MorphShape {
        id,
        version,
        start_bounds,
        end_bounds,
        start_edge_bounds,
        end_edge_bounds,
        flags,
        fill_styles,
        line_styles,
        start_records,
        end_records,
    })
}

pub fn define_morph_shape(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let morph = parse_morph_shape(reader, ctx.tag)?;
    ctx.define(morph.id, Character::MorphShape(morph));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ying_core::BitWriter;
    use ying_core::bitwriter::signed_bits_for;

    /// 写一段边记录: 直线 (dx, dy) 与一条曲线
    fn write_edges(w: &mut BitWriter, fill_bits: u32, line_bits: u32) {
        // 样式切换: moveTo + fill1 + line
        w.write_bit(false);
        w.write_bits(0b01101, 5);
        let nbits = signed_bits_for(&[100, -40]);
        w.write_bits(nbits, 5);
        w.write_bits_signed(100, nbits);
        w.write_bits_signed(-40, nbits);
        w.write_bits(1, fill_bits);
        w.write_bits(1, line_bits);
        // 一般直线
        w.write_bit(true);
        w.write_bit(true);
        w.write_bits(6, 4); // nbits = 8
        w.write_bit(true);
        w.write_bits_signed(50, 8);
        w.write_bits_signed(-20, 8);
        // 竖线
        w.write_bit(true);
        w.write_bit(true);
        w.write_bits(6, 4);
        w.write_bit(false);
        w.write_bit(true);
        w.write_bits_signed(-100, 8);
        // 曲线
        w.write_bit(true);
        w.write_bit(false);
        w.write_bits(3, 4); // nbits = 5
        for v in [1, 2, -3, 4] {
            w.write_bits_signed(v, 5);
        }
        // 结束
        w.write_bit(false);
        w.write_bits(0, 5);
        w.align_to_byte();
    }

    fn expected_edges() -> Vec<ShapeRecord> {
        vec![
            ShapeRecord::StyleChange(StyleChange {
                move_to: Some((100, -40)),
                fill_style0: None,
                fill_style1: Some(1),
                line_style: Some(1),
                new_styles: None,
            }),
            ShapeRecord::StraightEdge { dx: 50, dy: -20 },
            ShapeRecord::StraightEdge { dx: 0, dy: -100 },
            ShapeRecord::CurvedEdge {
                control_dx: 1,
                control_dy: 2,
                anchor_dx: -3,
                anchor_dy: 4,
            },
        ]
    }

    #[test]
    fn test_parse_define_shape3() {
        let mut w = BitWriter::new();
        w.write_u16(12);
        w.write_rect(&Rect::new(0, 2000, 0, 1000));
        // 两个填充: 纯色 + 线性渐变
        w.write_u8(2);
        w.write_u8(0x00);
        w.write_color_rgba(Color::rgba(255, 0, 0, 128));
        w.write_u8(0x10);
        w.write_matrix(&Matrix::IDENTITY);
        w.write_bits(0, 2);
        w.write_bits(0, 2);
        w.write_bits(2, 4);
        w.write_u8(0);
        w.write_color_rgba(Color::BLACK);
        w.write_u8(255);
        w.write_color_rgba(Color::WHITE);
        // 一个线条
        w.write_u8(1);
        w.write_u16(20);
        w.write_color_rgba(Color::rgb(0, 0, 255));
        w.write_bits(2, 4);
        w.write_bits(1, 4);
        write_edges(&mut w, 2, 1);

        let mut r = BitReader::from_slice(&w.finish());
        let shape = parse_shape(&mut r, tags::DEFINE_SHAPE3).unwrap();
        assert_eq!(shape.id, 12);
        assert_eq!(shape.version, 3);
        assert_eq!(shape.bounds, Rect::new(0, 2000, 0, 1000));
        assert_eq!(
            shape.fill_styles[0],
            FillStyle::Solid(Color::rgba(255, 0, 0, 128))
        );
        match &shape.fill_styles[1] {
            FillStyle::LinearGradient(g) => {
                assert_eq!(g.stops.len(), 2);
                assert_eq!(g.stops[1].ratio, 255);
            }
            other => panic!("意外的填充: {:?}", other),
        }
        assert_eq!(shape.line_styles[0].width, 20);
        assert_eq!(shape.records, expected_edges());
        assert!(r.is_eof());
    }

    #[test]
    fn test_parse_define_shape4_linestyle2() {
        let mut w = BitWriter::new();
        w.write_u16(3);
        w.write_rect(&Rect::new(0, 100, 0, 100));
        w.write_rect(&Rect::new(10, 90, 10, 90));
        w.write_u8(0x01);
        w.write_u8(0); // 无填充
        w.write_u8(1);
        w.write_u16(40);
        w.write_bits(2, 2); // 方头
        w.write_bits(2, 2); // 尖角
        w.write_bit(false);
        w.write_bit(true);
        w.write_bit(false);
        w.write_bit(false);
        w.write_bits(0, 5);
        w.write_bit(true);
        w.write_bits(1, 2);
        w.write_u16(0x0300); // miter 3.0
        w.write_color_rgba(Color::rgba(1, 2, 3, 4));
        w.write_bits(0, 4);
        w.write_bits(1, 4);
        w.write_bit(false);
        w.write_bits(0, 5);
        w.align_to_byte();

        let mut r = BitReader::from_slice(&w.finish());
        let shape = parse_shape(&mut r, tags::DEFINE_SHAPE4).unwrap();
        assert_eq!(shape.edge_bounds, Some(Rect::new(10, 90, 10, 90)));
        assert_eq!(shape.flags, 1);
        let line = &shape.line_styles[0];
        assert_eq!((line.start_cap, line.join, line.end_cap), (2, 2, 1));
        assert!(line.no_hscale && line.no_close);
        assert_eq!(line.miter_limit, 3.0);
        assert_eq!(line.color, Color::rgba(1, 2, 3, 4));
        assert!(shape.records.is_empty());
    }

    #[test]
    fn test_new_styles_rejected_in_v1() {
        let mut w = BitWriter::new();
        w.write_bit(false);
        w.write_bits(0x10, 5);
        w.align_to_byte();
        let mut r = BitReader::from_slice(&w.finish());
        assert!(matches!(
            read_shape_records(&mut r, 1, 0, 0),
            Err(YingError::Malformed(_))
        ));
    }

    #[test]
    fn test_bitmap_fill_flags() {
        let mut w = BitWriter::new();
        w.write_u8(0x43);
        w.write_u16(9);
        w.write_matrix(&Matrix::IDENTITY);
        let mut r = BitReader::from_slice(&w.finish());
        assert_eq!(
            read_fill_style(&mut r, 3).unwrap(),
            FillStyle::Bitmap {
                id: 9,
                matrix: Matrix::IDENTITY,
                repeat: false,
                smooth: false,
            }
        );
        let mut r = BitReader::from_slice(&[0x20]);
        assert!(read_fill_style(&mut r, 3).is_err());
    }

    #[test]
    fn test_parse_morph_shape() {
        let mut styles = BitWriter::new();
        styles.write_u8(1);
        styles.write_u8(0x00);
        styles.write_color_rgba(Color::BLACK);
        styles.write_color_rgba(Color::WHITE);
        styles.write_u8(1);
        styles.write_u16(20);
        styles.write_u16(40);
        styles.write_color_rgba(Color::rgb(1, 1, 1));
        styles.write_color_rgba(Color::rgb(2, 2, 2));
        styles.write_bits(1, 4);
        styles.write_bits(1, 4);
        write_edges(&mut styles, 1, 1);
        let start = styles.finish();

        let mut end = BitWriter::new();
        end.write_bits(0, 4);
        end.write_bits(0, 4);
        end.write_bit(true);
        end.write_bit(true);
        end.write_bits(6, 4);
        end.write_bit(true);
        end.write_bits_signed(10, 8);
        end.write_bits_signed(10, 8);
        end.write_bit(false);
        end.write_bits(0, 5);
        let end = end.finish();

        let mut w = BitWriter::new();
        w.write_u16(40);
        w.write_rect(&Rect::new(0, 10, 0, 10));
        w.write_rect(&Rect::new(0, 30, 0, 30));
        w.write_u32(start.len() as u32);
        w.write_bytes(&start);
        w.write_bytes(&end);

        let mut r = BitReader::from_slice(&w.finish());
        let morph = parse_morph_shape(&mut r, tags::DEFINE_MORPH_SHAPE).unwrap();
        assert_eq!(morph.id, 40);
        assert_eq!(morph.fill_styles[0].end, FillStyle::Solid(Color::WHITE));
        assert_eq!(morph.line_styles[0].end.width, 40);
        assert_eq!(morph.start_records.len(), 4);
        assert_eq!(
            morph.end_records,
            vec![ShapeRecord::StraightEdge { dx: 10, dy: 10 }]
        );
        let c = Character::MorphShape(morph);
        assert_eq!(c.bounds(), Some(Rect::new(0, 30, 0, 30)));
    }

    #[test]
    fn test_morph_offset_out_of_range() {
        let mut w = BitWriter::new();
        w.write_u16(1);
        w.write_rect(&Rect::EMPTY);
        w.write_rect(&Rect::EMPTY);
        w.write_u32(1000);
        w.write_bytes(&[0, 0]);
        let mut r = BitReader::from_slice(&w.finish());
        assert!(parse_morph_shape(&mut r, tags::DEFINE_MORPH_SHAPE).is_err());
    }
}
