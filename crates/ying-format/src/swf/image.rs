//! 位图: DefineBits / JPEGTables / DefineBitsJPEG2 / DefineBitsJPEG3 /
//! DefineBitsLossless 1/2.
//!
//! JPEG 数据保持编码状态, 只做两件事: 去掉早期编码器留下的 `FF D9 FF D8`
//! 错误文件头, 以及把 JPEGTables 与图像数据拼成一个完整的 JPEG 流.
//! 无损位图在这里直接解压成 RGBA8 像素.

use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use ying_core::bitreader::inflate;
use ying_core::{BitReader, YingError, YingResult};

use super::character::Character;
use super::context::TagContext;
use super::tags;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const ERRONEOUS_HEADER: &[u8] = &[0xFF, 0xD9, 0xFF, 0xD8];

/// RGBA8 像素表面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    /// 颜色分量是否已乘以 alpha
    pub premultiplied: bool,
    /// 行优先, 每像素 4 字节 (R, G, B, A), 无行填充
    pub pixels: Vec<u8>,
}

impl Surface {
    /// (x, y) 处的像素
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let p = self.pixels.get(i..i + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}

/// 图像数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageData {
    /// 完整的 JPEG 流, DefineBitsJPEG3 可附带 width*height 字节的 alpha 平面
    Jpeg { data: Bytes, alpha: Option<Bytes> },
    Png(Bytes),
    Gif(Bytes),
    Lossless(Surface),
}

/// 位图角色
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: u16,
    /// 像素尺寸, 无法从数据中得知时为 0
    pub width: u32,
    pub height: u32,
    pub data: ImageData,
}

/// 去掉开头的 `FF D9 FF D8` 错误文件头
pub fn strip_erroneous_header(data: &Bytes) -> Bytes {
    if data.starts_with(ERRONEOUS_HEADER) {
        data.slice(ERRONEOUS_HEADER.len()..)
    } else {
        data.clone()
    }
}

/// 拼接 JPEGTables 与 DefineBits 的图像数据
///
/// 表数据去掉结尾 EOI, 图像数据去掉开头 SOI, 得到单个 JPEG 流.
pub fn merge_jpeg(tables: &Bytes, image: &Bytes) -> Bytes {
    let tables = strip_erroneous_header(tables);
    let image = strip_erroneous_header(image);
    if tables.is_empty() {
        return image;
    }
    let tables_end = if tables.ends_with(&[0xFF, 0xD9]) {
        tables.len() - 2
    } else {
        tables.len()
    };
    let image_start = if image.starts_with(&[0xFF, 0xD8]) { 2 } else { 0 };
    let mut out = BytesMut::with_capacity(tables_end + image.len() - image_start);
    out.extend_from_slice(&tables[..tables_end]);
    out.extend_from_slice(&image[image_start..]);
    out.freeze()
}

/// 扫描 JPEG 段, 从 SOF 段取出 (宽, 高)
pub fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut i = 0;
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = data[i + 1];
        match marker {
            // 填充字节与无长度的标记
            0xFF => {
                i += 1;
                continue;
            }
            0x00 | 0x01 | 0xD0..=0xD9 => {
                i += 2;
                continue;
            }
            _ => {}
        }
        let len = u16::from_be_bytes([*data.get(i + 2)?, *data.get(i + 3)?]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let height = u16::from_be_bytes([*data.get(i + 5)?, *data.get(i + 6)?]);
            let width = u16::from_be_bytes([*data.get(i + 7)?, *data.get(i + 8)?]);
            return Some((u32::from(width), u32::from(height)));
        }
        i += 2 + len;
    }
    None
}

fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let ihdr = data.get(16..24)?;
    Some((
        u32::from_be_bytes([ihdr[0], ihdr[1], ihdr[2], ihdr[3]]),
        u32::from_be_bytes([ihdr[4], ihdr[5], ihdr[6], ihdr[7]]),
    ))
}

fn gif_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let dims = data.get(6..10)?;
    Some((
        u32::from(u16::from_le_bytes([dims[0], dims[1]])),
        u32::from(u16::from_le_bytes([dims[2], dims[3]])),
    ))
}

fn is_gif(data: &[u8]) -> bool {
    data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")
}

/// 由编码数据构造图像, 按签名识别 PNG 与 GIF
fn encoded_image(id: u16, data: Bytes, alpha: Option<Bytes>) -> Image {
    if data.starts_with(PNG_SIGNATURE) {
        let (width, height) = png_dimensions(&data).unwrap_or((0, 0));
        return Image {
            id,
            width,
            height,
            data: ImageData::Png(data),
        };
    }
    if is_gif(&data) {
        let (width, height) = gif_dimensions(&data).unwrap_or((0, 0));
        return Image {
            id,
            width,
            height,
            data: ImageData::Gif(data),
        };
    }
    let (width, height) = jpeg_dimensions(&data).unwrap_or_else(|| {
        warn!("图像 {} 的 JPEG 数据中找不到 SOF 段", id);
        (0, 0)
    });
    Image {
        id,
        width,
        height,
        data: ImageData::Jpeg { data, alpha },
    }
}

pub fn jpeg_tables(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let data = reader.read_remaining();
    if data.is_empty() {
        debug!("空的 JPEGTables");
        return Ok(());
    }
    if ctx.movie.jpeg_tables.is_some() {
        warn!("重复的 JPEGTables, 已忽略");
        return Ok(());
    }
    ctx.movie.jpeg_tables = Some(data);
    Ok(())
}

pub fn define_bits(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let id = reader.read_u16()?;
    let data = reader.read_remaining();
    let merged = match &ctx.movie.jpeg_tables {
        Some(tables) => merge_jpeg(tables, &data),
        None => {
            warn!("DefineBits {} 之前没有 JPEGTables, 按完整 JPEG 处理", id);
            strip_erroneous_header(&data)
        }
    };
    ctx.define(id, Character::Image(encoded_image(id, merged, None)));
    Ok(())
}

pub fn define_bits_jpeg2(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let id = reader.read_u16()?;
    let data = strip_erroneous_header(&reader.read_remaining());
    ctx.define(id, Character::Image(encoded_image(id, data, None)));
    Ok(())
}

/// 解析 DefineBitsJPEG3: JPEG 数据 + zlib 压缩的 alpha 平面
pub fn parse_bits_jpeg3(reader: &mut BitReader) -> YingResult<Image> {
    let id = reader.read_u16()?;
    let alpha_offset = reader.read_u32()? as usize;
    let data = strip_erroneous_header(&reader.read_buffer(alpha_offset)?);
    let compressed_alpha = reader.read_remaining();

    let mut image = encoded_image(id, data, None);
    if let ImageData::Jpeg { alpha, .. } = &mut image.data {
        let len = (image.width * image.height) as usize;
        if len > 0 && !compressed_alpha.is_empty() {
            match inflate(&compressed_alpha, Some(len)) {
                Ok(plane) => *alpha = Some(plane),
                Err(e) => warn!("图像 {} 的 alpha 平面无法解压: {}", id, e),
            }
        }
    } else if !compressed_alpha.is_empty() {
        debug!("图像 {} 不是 JPEG, 忽略 alpha 平面", id);
    }
    Ok(image)
}

pub fn define_bits_jpeg3(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let image = parse_bits_jpeg3(reader)?;
    ctx.define(image.id, Character::Image(image));
    Ok(())
}

fn expand5(c: u16) -> u8 {
    let c = (c & 0x1F) as u8;
    (c << 3) | (c >> 2)
}

/// 解析 DefineBitsLossless / DefineBitsLossless2
pub fn parse_bits_lossless(reader: &mut BitReader, tag: u16) -> YingResult<Image> {
    let with_alpha = tag == tags::DEFINE_BITS_LOSSLESS2;
    let id = reader.read_u16()?;
    let format = reader.read_u8()?;
    let width = u32::from(reader.read_u16()?);
    let height = u32::from(reader.read_u16()?);
    let w = width as usize;
    let h = height as usize;
    // 尺寸来自未校验的头部, 解压成功后再按实际数据预留
    let mut pixels = Vec::new();

    match format {
        3 => {
            let table_size = reader.read_u8()? as usize + 1;
            let entry = if with_alpha { 4 } else { 3 };
            let stride = (w + 3) & !3;
            let data = reader.decompress(None, Some(table_size * entry + stride * h))?;
            pixels.reserve(w * h * 4);
            let (table, indices) = data.split_at(table_size * entry);
            let mut bad_index = false;
            for y in 0..h {
                for &index in &indices[y * stride..y * stride + w] {
                    let index = index as usize;
                    if index >= table_size {
                        bad_index = true;
                        pixels.extend_from_slice(&[0, 0, 0, 0]);
                        continue;
                    }
                    let c = &table[index * entry..index * entry + entry];
                    let a = if with_alpha { c[3] } else { 0xFF };
                    pixels.extend_from_slice(&[c[0], c[1], c[2], a]);
                }
            }
            if bad_index {
                warn!("图像 {} 的调色板下标超出 {} 项的颜色表", id, table_size);
            }
        }
        4 if !with_alpha => {
            let stride = (w * 2 + 3) & !3;
            let data = reader.decompress(None, Some(stride * h))?;
            pixels.reserve(w * h * 4);
            for y in 0..h {
                for px in data[y * stride..y * stride + w * 2].chunks_exact(2) {
                    let v = u16::from_be_bytes([px[0], px[1]]);
                    pixels.extend_from_slice(&[expand5(v >> 10), expand5(v >> 5), expand5(v), 0xFF]);
                }
            }
        }
        5 => {
            let data = reader.decompress(None, Some(w * h * 4))?;
            pixels.reserve(data.len());
            for px in data.chunks_exact(4) {
                let a = if with_alpha { px[0] } else { 0xFF };
                pixels.extend_from_slice(&[px[1], px[2], px[3], a]);
            }
        }
        other => {
            return Err(YingError::Malformed(format!(
                "{} 的位图格式 {} 非法",
                tags::tag_name(tag),
                other
            )));
        }
    }

    Ok(Image {
        id,
        width,
        height,
        data: ImageData::Lossless(Surface {
            width,
            height,
            premultiplied: with_alpha,
            pixels,
        }),
    })
}

pub fn define_bits_lossless(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let image = parse_bits_lossless(reader, ctx.tag)?;
    debug!("无损位图 {}: {}x{}", image.id, image.width, image.height);
    ctx.define(image.id, Character::Image(image));
    Ok(())
}
