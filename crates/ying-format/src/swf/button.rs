//! 按钮: DefineButton, DefineButton2, DefineButtonSound, DefineButtonCxform.
//!
//! 按钮的外形范围是所有 "点击" 状态子角色经变换后包围盒的并集.

use bitflags::bitflags;
use bytes::Bytes;
use log::{debug, warn};
use ying_core::{BitReader, ColorTransform, Matrix, Rect, YingError, YingResult};

use super::character::{Character, Dictionary};
use super::context::TagContext;
use super::place::{Filter, read_filter_list};
use super::sound::{SoundInfo, read_sound_info};

bitflags! {
    /// 按钮状态
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ButtonStates: u8 {
        const UP = 0x01;
        const OVER = 0x02;
        const DOWN = 0x04;
        const HIT = 0x08;
    }
}

/// DefineButton (v1) 的动作在此条件下触发
pub const CONDITION_OVER_DOWN_TO_OVER_UP: u16 = 0x0008;

/// 按钮子角色记录
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonRecord {
    pub states: ButtonStates,
    pub character_id: u16,
    pub depth: u16,
    pub matrix: Matrix,
    pub color_transform: Option<ColorTransform>,
    pub filters: Vec<Filter>,
    pub blend_mode: u8,
}

/// 条件动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonCondAction {
    /// 低 9 位为状态切换条件, 高 7 位为按键码
    pub conditions: u16,
    pub actions: Bytes,
}

impl ButtonCondAction {
    /// 触发该动作的按键码 (0 表示不是按键条件)
    pub fn key_code(&self) -> u8 {
        (self.conditions >> 9) as u8
    }
}

/// 按钮状态切换时播放的声音
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonSound {
    pub sound_id: u16,
    pub info: SoundInfo,
}

/// 按钮角色
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub id: u16,
    /// 1 或 2
    pub version: u8,
    pub track_as_menu: bool,
    pub records: Vec<ButtonRecord>,
    /// 点击状态子角色的包围盒并集
    pub extents: Rect,
    pub actions: Vec<ButtonCondAction>,
    /// 依次为 OverUpToIdle, IdleToOverUp, OverUpToOverDown, OverDownToOverUp
    pub sounds: [Option<ButtonSound>; 4],
    /// DefineButtonCxform 设置的整体颜色变换
    pub color_transform: Option<ColorTransform>,
}

fn read_button_records(reader: &mut BitReader, version: u8) -> YingResult<Vec<ButtonRecord>> {
    let mut records = Vec::new();
    loop {
        let flags = reader.read_u8()?;
        if flags == 0 {
            break;
        }
        let has_blend_mode = flags & 0x20 != 0;
        let has_filters = flags & 0x10 != 0;
        let states = ButtonStates::from_bits_truncate(flags);
        let character_id = reader.read_u16()?;
        let depth = reader.read_u16()?;
        let matrix = reader.read_matrix()?;
        let mut record = ButtonRecord {
            states,
            character_id,
            depth,
            matrix,
            color_transform: None,
            filters: Vec::new(),
            blend_mode: 0,
        };
        if version >= 2 {
            record.color_transform = Some(reader.read_color_transform(true)?);
            if has_filters {
                record.filters = read_filter_list(reader)?;
            }
            if has_blend_mode {
                record.blend_mode = reader.read_u8()?;
            }
        }
        records.push(record);
    }
    Ok(records)
}

/// 计算点击状态子角色经变换后的包围盒并集
///
/// 引用未定义或没有外形的角色时告警并忽略该记录.
pub fn hit_extents(records: &[ButtonRecord], dictionary: &Dictionary) -> Rect {
    records
        .iter()
        .filter(|r| r.states.contains(ButtonStates::HIT))
        .filter_map(|r| match dictionary.get(r.character_id) {
            Some(c) => c.bounds().map(|b| b.transform(&r.matrix)),
            None => {
                warn!("按钮记录引用了未定义的角色 {}", r.character_id);
                None
            }
        })
        .fold(Rect::EMPTY, |acc, b| acc.union(&b))
}

/// 解析 DefineButton (v1)
pub fn parse_button1(reader: &mut BitReader, dictionary: &Dictionary) -> YingResult<Button> {
    let id = reader.read_u16()?;
    let records = read_button_records(reader, 1)?;
    let actions = reader.read_remaining();
    Ok(Button {
        id,
        version: 1,
        track_as_menu: false,
        extents: hit_extents(&records, dictionary),
        records,
        actions: vec![ButtonCondAction {
            conditions: CONDITION_OVER_DOWN_TO_OVER_UP,
            actions,
        }],
        sounds: Default::default(),
        color_transform: None,
    })
}

/// 解析 DefineButton2
pub fn parse_button2(reader: &mut BitReader, dictionary: &Dictionary) -> YingResult<Button> {
    let id = reader.read_u16()?;
    let track_as_menu = reader.read_u8()? & 0x01 != 0;
    let action_offset = reader.read_u16()? as usize;
    let records = read_button_records(reader, 2)?;
    let mut actions = Vec::new();
    if action_offset != 0 {
        loop {
            let size = reader.read_u16()? as usize;
            let conditions = reader.read_u16()?;
            let data = if size == 0 {
                reader.read_remaining()
            } else {
                if size < 4 {
                    return Err(YingError::Malformed(format!(
                        "按钮 {} 的条件动作长度 {} 过短",
                        id, size
                    )));
                }
                reader.read_buffer(size - 4)?
            };
            actions.push(ButtonCondAction {
                conditions,
                actions: data,
            });
            if size == 0 {
                break;
            }
        }
    }
    Ok(Button {
        id,
        version: 2,
        track_as_menu,
        extents: hit_extents(&records, dictionary),
        records,
        actions,
        sounds: Default::default(),
        color_transform: None,
    })
}

pub fn define_button(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let button = parse_button1(reader, ctx.dictionary)?;
    debug!("按钮 {}: {} 条记录", button.id, button.records.len());
    ctx.define(button.id, Character::Button(button));
    Ok(())
}

pub fn define_button2(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let button = parse_button2(reader, ctx.dictionary)?;
    debug!(
        "按钮 {}: {} 条记录, {} 个条件动作",
        button.id,
        button.records.len(),
        button.actions.len()
    );
    ctx.define(button.id, Character::Button(button));
    Ok(())
}

/// DefineButtonSound: 为已有按钮设置四个状态切换声音
pub fn define_button_sound(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let id = reader.read_u16()?;
    let mut sounds: [Option<ButtonSound>; 4] = Default::default();
    for slot in &mut sounds {
        let sound_id = reader.read_u16()?;
        if sound_id != 0 {
            if ctx.dictionary.sound(sound_id).is_none() {
                warn!("按钮 {} 引用的声音 {} 未定义", id, sound_id);
            }
            *slot = Some(ButtonSound {
                sound_id,
                info: read_sound_info(reader)?,
            });
        }
    }
    match ctx.dictionary.button_mut(id) {
        Some(button) => button.sounds = sounds,
        None => warn!("DefineButtonSound 引用的按钮 {} 未定义", id),
    }
    Ok(())
}

/// DefineButtonCxform: 为已有 (v1) 按钮设置颜色变换
pub fn define_button_cxform(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let id = reader.read_u16()?;
    let cx = reader.read_color_transform(false)?;
    match ctx.dictionary.button_mut(id) {
        Some(button) => {
            if button.version != 1 {
                warn!("DefineButtonCxform 用于 DefineButton2 按钮 {}", id);
            }
            button.color_transform = Some(cx);
        }
        None => warn!("DefineButtonCxform 引用的按钮 {} 未定义", id),
    }
    Ok(())
}
