//! PlaceObject 1/2/3, RemoveObject 1/2 以及滤镜和剪辑事件记录.
//!
//! 时间轴标签在解析阶段只做校验, 原始数据保存在精灵的动作列表中,
//! 播放端在进入对应帧时再用这里的函数解析.

use bitflags::bitflags;
use bytes::Bytes;
use log::{trace, warn};
use ying_core::{BitReader, Color, ColorTransform, Matrix, YingError, YingResult};

use super::context::TagContext;
use super::tags;

bitflags! {
    /// PlaceObject2 标志字节
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlaceFlags: u8 {
        const MOVE = 0x01;
        const HAS_CHARACTER = 0x02;
        const HAS_MATRIX = 0x04;
        const HAS_COLOR_TRANSFORM = 0x08;
        const HAS_RATIO = 0x10;
        const HAS_NAME = 0x20;
        const HAS_CLIP_DEPTH = 0x40;
        const HAS_CLIP_ACTIONS = 0x80;
    }
}

bitflags! {
    /// PlaceObject3 第二个标志字节
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlaceFlags3: u8 {
        const HAS_FILTER_LIST = 0x01;
        const HAS_BLEND_MODE = 0x02;
        const HAS_CACHE_AS_BITMAP = 0x04;
        const HAS_CLASS_NAME = 0x08;
        const HAS_IMAGE = 0x10;
        const HAS_VISIBLE = 0x20;
        const HAS_BACKGROUND = 0x40;
    }
}

/// 按键事件标志 (32 位事件格式)
pub const CLIP_EVENT_KEY_PRESS: u32 = 0x0002_0000;

/// 渐变滤镜参数 (GradientGlow / GradientBevel)
#[derive(Debug, Clone, PartialEq)]
pub struct GradientFilter {
    pub colors: Vec<Color>,
    pub ratios: Vec<u8>,
    pub blur_x: f64,
    pub blur_y: f64,
    pub angle: f64,
    pub distance: f64,
    pub strength: f32,
    pub flags: u8,
}

/// 显示对象滤镜
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    DropShadow {
        color: Color,
        blur_x: f64,
        blur_y: f64,
        angle: f64,
        distance: f64,
        strength: f32,
        flags: u8,
    },
    Blur {
        blur_x: f64,
        blur_y: f64,
        passes: u8,
    },
    Glow {
        color: Color,
        blur_x: f64,
        blur_y: f64,
        strength: f32,
        flags: u8,
    },
    Bevel {
        shadow: Color,
        highlight: Color,
        blur_x: f64,
        blur_y: f64,
        angle: f64,
        distance: f64,
        strength: f32,
        flags: u8,
    },
    GradientGlow(GradientFilter),
    Convolution {
        matrix_x: u8,
        matrix_y: u8,
        divisor: f32,
        bias: f32,
        matrix: Vec<f32>,
        default_color: Color,
        flags: u8,
    },
    ColorMatrix(Vec<f32>),
    GradientBevel(GradientFilter),
}

fn read_gradient_filter(reader: &mut BitReader) -> YingResult<GradientFilter> {
    let count = reader.read_u8()? as usize;
    let colors = (0..count)
        .map(|_| reader.read_color_rgba())
        .collect::<YingResult<Vec<_>>>()?;
    let ratios = (0..count)
        .map(|_| reader.read_u8())
        .collect::<YingResult<Vec<_>>>()?;
    Ok(GradientFilter {
        colors,
        ratios,
        blur_x: reader.read_fixed16()?,
        blur_y: reader.read_fixed16()?,
        angle: reader.read_fixed16()?,
        distance: reader.read_fixed16()?,
        strength: reader.read_fixed8()?,
        flags: reader.read_u8()?,
    })
}

/// 读取单个滤镜
pub fn read_filter(reader: &mut BitReader) -> YingResult<Filter> {
    let id = reader.read_u8()?;
    let filter = match id {
        0 => Filter::DropShadow {
            color: reader.read_color_rgba()?,
            blur_x: reader.read_fixed16()?,
            blur_y: reader.read_fixed16()?,
            angle: reader.read_fixed16()?,
            distance: reader.read_fixed16()?,
            strength: reader.read_fixed8()?,
            flags: reader.read_u8()?,
        },
        1 => Filter::Blur {
            blur_x: reader.read_fixed16()?,
            blur_y: reader.read_fixed16()?,
            passes: reader.read_u8()? >> 3,
        },
        2 => Filter::Glow {
            color: reader.read_color_rgba()?,
            blur_x: reader.read_fixed16()?,
            blur_y: reader.read_fixed16()?,
            strength: reader.read_fixed8()?,
            flags: reader.read_u8()?,
        },
        3 => Filter::Bevel {
            shadow: reader.read_color_rgba()?,
            highlight: reader.read_color_rgba()?,
            blur_x: reader.read_fixed16()?,
            blur_y: reader.read_fixed16()?,
            angle: reader.read_fixed16()?,
            distance: reader.read_fixed16()?,
            strength: reader.read_fixed8()?,
            flags: reader.read_u8()?,
        },
        4 => Filter::GradientGlow(read_gradient_filter(reader)?),
        5 => {
            let matrix_x = reader.read_u8()?;
            let matrix_y = reader.read_u8()?;
            let divisor = reader.read_float()?;
            let bias = reader.read_float()?;
            let n = usize::from(matrix_x) * usize::from(matrix_y);
            let matrix = (0..n)
                .map(|_| reader.read_float())
                .collect::<YingResult<Vec<_>>>()?;
            Filter::Convolution {
                matrix_x,
                matrix_y,
                divisor,
                bias,
                matrix,
                default_color: reader.read_color_rgba()?,
                flags: reader.read_u8()?,
            }
        }
        6 => Filter::ColorMatrix(
            (0..20)
                .map(|_| reader.read_float())
                .collect::<YingResult<Vec<_>>>()?,
        ),
        7 => Filter::GradientBevel(read_gradient_filter(reader)?),
        other => return Err(YingError::Malformed(format!("未知的滤镜类型 {}", other))),
    };
    Ok(filter)
}

/// 读取 FILTERLIST
pub fn read_filter_list(reader: &mut BitReader) -> YingResult<Vec<Filter>> {
    let count = reader.read_u8()?;
    (0..count).map(|_| read_filter(reader)).collect()
}

/// 剪辑事件动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipAction {
    pub events: u32,
    pub key_code: Option<u8>,
    pub actions: Bytes,
}

fn read_event_flags(reader: &mut BitReader, version: u8) -> YingResult<u32> {
    if version <= 5 {
        Ok(u32::from(reader.read_u16()?))
    } else {
        reader.read_u32()
    }
}

/// 读取 CLIPACTIONS 记录
///
/// SWF 5 及以下事件标志为 16 位, 之后为 32 位.
pub fn read_clip_actions(reader: &mut BitReader, version: u8) -> YingResult<Vec<ClipAction>> {
    reader.read_u16()?;
    let all_events = read_event_flags(reader, version)?;
    let mut actions = Vec::new();
    loop {
        let events = read_event_flags(reader, version)?;
        if events == 0 {
            break;
        }
        if events & !all_events != 0 {
            warn!(
                "剪辑事件 0x{:08X} 不在声明的事件集合 0x{:08X} 中",
                events, all_events
            );
        }
        let mut size = reader.read_u32()? as usize;
        let key_code = if version > 5 && events & CLIP_EVENT_KEY_PRESS != 0 {
            if size == 0 {
                return Err(YingError::Malformed("按键事件缺少键码".into()));
            }
            size -= 1;
            Some(reader.read_u8()?)
        } else {
            None
        };
        actions.push(ClipAction {
            events,
            key_code,
            actions: reader.read_buffer(size)?,
        });
    }
    Ok(actions)
}

/// PlaceObject 1/2/3 记录
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceObject {
    /// 1, 2 或 3
    pub version: u8,
    pub depth: u16,
    pub is_move: bool,
    pub character_id: Option<u16>,
    pub class_name: Option<String>,
    pub matrix: Option<Matrix>,
    pub color_transform: Option<ColorTransform>,
    pub ratio: Option<u16>,
    pub name: Option<String>,
    pub clip_depth: Option<u16>,
    pub filters: Vec<Filter>,
    pub blend_mode: Option<u8>,
    pub cache_as_bitmap: bool,
    pub visible: Option<bool>,
    pub background: Option<Color>,
    pub clip_actions: Vec<ClipAction>,
}

fn parse_place_object1(reader: &mut BitReader) -> YingResult<PlaceObject> {
    let character_id = reader.read_u16()?;
    let depth = reader.read_u16()?;
    let matrix = reader.read_matrix()?;
    let color_transform = if reader.bytes_left() > 0 {
        Some(reader.read_color_transform(false)?)
    } else {
        None
    };
    Ok(PlaceObject {
        version: 1,
        depth,
        character_id: Some(character_id),
        matrix: Some(matrix),
        color_transform,
        ..PlaceObject::default()
    })
}

/// 解析 PlaceObject 系列标签数据
///
/// `version` 是文件版本, 决定剪辑事件标志的宽度.
pub fn parse_place_object(reader: &mut BitReader, tag: u16, version: u8) -> YingResult<PlaceObject> {
    let place_version = match tag {
        tags::PLACE_OBJECT => return parse_place_object1(reader),
        tags::PLACE_OBJECT2 => 2,
        _ => 3,
    };
    let flags = PlaceFlags::from_bits_retain(reader.read_u8()?);
    let flags3 = if place_version == 3 {
        PlaceFlags3::from_bits_truncate(reader.read_u8()?)
    } else {
        PlaceFlags3::empty()
    };
    let mut place = PlaceObject {
        version: place_version,
        depth: reader.read_u16()?,
        is_move: flags.contains(PlaceFlags::MOVE),
        ..PlaceObject::default()
    };
    if flags3.contains(PlaceFlags3::HAS_CLASS_NAME)
        || (flags3.contains(PlaceFlags3::HAS_IMAGE) && flags.contains(PlaceFlags::HAS_CHARACTER))
    {
        place.class_name = Some(reader.read_string(version)?);
    }
    if flags.contains(PlaceFlags::HAS_CHARACTER) {
        place.character_id = Some(reader.read_u16()?);
    }
    if flags.contains(PlaceFlags::HAS_MATRIX) {
        place.matrix = Some(reader.read_matrix()?);
    }
    if flags.contains(PlaceFlags::HAS_COLOR_TRANSFORM) {
        place.color_transform = Some(reader.read_color_transform(true)?);
    }
    if flags.contains(PlaceFlags::HAS_RATIO) {
        place.ratio = Some(reader.read_u16()?);
    }
    if flags.contains(PlaceFlags::HAS_NAME) {
        place.name = Some(reader.read_string(version)?);
    }
    if flags.contains(PlaceFlags::HAS_CLIP_DEPTH) {
        place.clip_depth = Some(reader.read_u16()?);
    }
    if flags3.contains(PlaceFlags3::HAS_FILTER_LIST) {
        place.filters = read_filter_list(reader)?;
    }
    if flags3.contains(PlaceFlags3::HAS_BLEND_MODE) {
        place.blend_mode = Some(reader.read_u8()?);
    }
    if flags3.contains(PlaceFlags3::HAS_CACHE_AS_BITMAP) {
        place.cache_as_bitmap = reader.read_u8()? != 0;
    }
    if flags3.contains(PlaceFlags3::HAS_VISIBLE) {
        place.visible = Some(reader.read_u8()? != 0);
    }
    if flags3.contains(PlaceFlags3::HAS_BACKGROUND) {
        place.background = Some(reader.read_color_rgba()?);
    }
    if flags.contains(PlaceFlags::HAS_CLIP_ACTIONS) {
        place.clip_actions = read_clip_actions(reader, version)?;
    }
    Ok(place)
}

/// PlaceObject 1/2/3: 校验后作为时间轴动作保存
pub fn place_object(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let raw = reader.clone().read_remaining();
    let place = parse_place_object(reader, ctx.tag, ctx.version)?;
    if let Some(id) = place.character_id {
        ctx.check_reference(id);
    }
    trace!(
        "{} 深度 {} 角色 {:?}",
        ctx.tag_name(),
        place.depth,
        place.character_id
    );
    ctx.sprite.push_action(ctx.tag, raw);
    Ok(())
}

/// RemoveObject 1/2 记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveObject {
    pub depth: u16,
    /// 仅 RemoveObject (v1) 带角色 ID
    pub character_id: Option<u16>,
}

pub fn parse_remove_object(reader: &mut BitReader, tag: u16) -> YingResult<RemoveObject> {
    if tag == tags::REMOVE_OBJECT {
        let character_id = reader.read_u16()?;
        Ok(RemoveObject {
            depth: reader.read_u16()?,
            character_id: Some(character_id),
        })
    } else {
        Ok(RemoveObject {
            depth: reader.read_u16()?,
            character_id: None,
        })
    }
}

pub fn remove_object(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let raw = reader.clone().read_remaining();
    parse_remove_object(reader, ctx.tag)?;
    ctx.sprite.push_action(ctx.tag, raw);
    Ok(())
}
