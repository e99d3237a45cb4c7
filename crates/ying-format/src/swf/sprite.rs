//! 精灵 (时间轴) 与 DefineSprite 子流解析.
//!
//! 精灵把所有帧的时间轴标签按出现顺序存放在一个扁平列表中, 帧边界由
//! ShowFrame 记录 (类型 1, 空数据) 标出. `parse_frame` 记录已完整解析的帧数,
//! 数据还没到齐时播放端只能使用前 `parse_frame` 帧.

use bytes::Bytes;
use log::{debug, warn};
use ying_core::{BitReader, YingResult};

use super::character::Character;
use super::context::{TagContext, dispatch, read_tag_header};
use super::sound::{SoundBlock, SoundStreamHead};
use super::tags;

/// 时间轴动作记录: (标签类型, 原始数据)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteAction {
    pub tag: u16,
    pub data: Bytes,
}

/// 帧信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub label: Option<String>,
    /// 本帧生效的流式声音格式 (从前一帧继承或由 SoundStreamHead 设置)
    pub sound_head: Option<SoundStreamHead>,
    pub sound_block: Option<SoundBlock>,
    /// 本帧声音块贡献的采样数 (44.1kHz 规范流)
    pub sound_samples: u32,
}

/// 精灵 (主时间轴的 ID 为 0)
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub id: u16,
    pub frames: Vec<Frame>,
    pub actions: Vec<SpriteAction>,
    /// 已完整解析的帧数
    pub parse_frame: usize,
}

impl Sprite {
    pub fn new(id: u16, frame_count: u16) -> Self {
        Self {
            id,
            frames: vec![Frame::default(); frame_count as usize],
            actions: Vec::new(),
            parse_frame: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// 是否所有声明的帧都已解析
    pub fn is_complete(&self) -> bool {
        self.parse_frame >= self.frames.len()
    }

    /// 正在解析的帧, 超出声明帧数时追加新帧 (继承上一帧的声音格式)
    pub fn current_frame(&mut self) -> &mut Frame {
        if self.parse_frame >= self.frames.len() {
            warn!(
                "精灵 {} 的帧数超过声明的 {} 帧",
                self.id,
                self.frames.len()
            );
            let appended = Frame {
                sound_head: self.frames.last().and_then(|f| f.sound_head.clone()),
                ..Frame::default()
            };
            self.frames.resize(self.parse_frame + 1, appended);
        }
        &mut self.frames[self.parse_frame]
    }

    /// 第 `frame` 帧的时间轴动作 (不含 ShowFrame 标记)
    pub fn frame_actions(&self, frame: usize) -> &[SpriteAction] {
        let mut start = 0;
        let mut current = 0;
        for (i, action) in self.actions.iter().enumerate() {
            if action.tag == tags::SHOW_FRAME {
                if current == frame {
                    return &self.actions[start..i];
                }
                current += 1;
                start = i + 1;
            }
        }
        if current == frame {
            &self.actions[start..]
        } else {
            &[]
        }
    }

    /// 按帧名查找帧号
    pub fn frame_by_label(&self, label: &str) -> Option<usize> {
        self.frames
            .iter()
            .position(|f| f.label.as_deref() == Some(label))
    }

    /// 结束一帧: 记录 ShowFrame 并把声音格式带到下一帧
    fn show_frame(&mut self) {
        let head = self.current_frame().sound_head.clone();
        self.actions.push(SpriteAction {
            tag: tags::SHOW_FRAME,
            data: Bytes::new(),
        });
        self.parse_frame += 1;
        if let Some(next) = self.frames.get_mut(self.parse_frame) {
            if next.sound_head.is_none() {
                next.sound_head = head;
            }
        }
    }

    pub(crate) fn push_action(&mut self, tag: u16, data: Bytes) {
        self.actions.push(SpriteAction { tag, data });
    }
}

pub fn show_frame(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    if reader.bytes_left() > 0 {
        debug!("ShowFrame 带有 {} 字节数据, 已忽略", reader.bytes_left());
        reader.read_remaining();
    }
    ctx.sprite.show_frame();
    Ok(())
}

pub fn do_action(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let data = reader.read_remaining();
    ctx.sprite.push_action(ctx.tag, data);
    Ok(())
}

pub fn frame_label(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let label = reader.read_string(ctx.version)?;
    // SWF 6 起可带一个命名锚点标志字节
    if reader.bytes_left() > 0 {
        reader.read_u8()?;
    }
    let frame = ctx.sprite.current_frame();
    if let Some(old) = &frame.label {
        warn!("帧已有标签 {}, 替换为 {}", old, label);
    }
    frame.label = Some(label);
    Ok(())
}

/// DefineSprite: 对内嵌子流运行同一个标签分发循环
///
/// 子流中不允许再出现 DefineSprite; 遇到时停止解析该精灵, 已解析的部分保留.
pub fn define_sprite(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let id = reader.read_u16()?;
    if ctx.dictionary.contains(id) {
        warn!("角色 {} 已定义, 忽略重复的 DefineSprite", id);
        reader.read_remaining();
        return Ok(());
    }
    let frame_count = reader.read_u16()?;
    let mut sprite = Sprite::new(id, frame_count);

    loop {
        if reader.bytes_left() == 0 {
            warn!("精灵 {} 缺少 End 标签", id);
            break;
        }
        let (tag, len) = match read_tag_header(reader) {
            Ok(header) => header,
            Err(e) => {
                warn!("精灵 {} 的标签头被截断: {}", id, e);
                reader.read_remaining();
                break;
            }
        };
        if tag == tags::END {
            break;
        }
        if tag == tags::DEFINE_SPRITE {
            warn!("精灵 {} 中嵌套了 DefineSprite, 停止解析该精灵", id);
            reader.read_remaining();
            break;
        }
        if len > reader.bytes_left() {
            warn!(
                "精灵 {} 中的 {} 声明 {} 字节, 只剩 {} 字节",
                id,
                tags::tag_name(tag),
                len,
                reader.bytes_left()
            );
            reader.read_remaining();
            break;
        }
        let payload = reader.split(len)?;
        let mut sub = TagContext {
            version: ctx.version,
            tag,
            dictionary: &mut *ctx.dictionary,
            movie: &mut *ctx.movie,
            sprite: &mut sprite,
            in_sprite: true,
        };
        dispatch(&mut sub, payload, false);
    }

    if !sprite.is_complete() {
        warn!(
            "精灵 {} 只解析了 {}/{} 帧",
            id,
            sprite.parse_frame,
            sprite.frame_count()
        );
    }
    debug!(
        "精灵 {}: {} 帧, {} 条动作",
        id,
        sprite.frame_count(),
        sprite.actions.len()
    );
    ctx.define(id, Character::Sprite(sprite));
    Ok(())
}
