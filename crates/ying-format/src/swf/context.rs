//! 标签解析上下文与分发.
//!
//! 顶层时间轴和 DefineSprite 的子时间轴共用同一个分发函数 [`dispatch`],
//! 区别只在于上下文中的目标精灵和 `in_sprite` 标志.

use log::{debug, warn};
use ying_core::{BitReader, YingError, YingResult};

use super::character::{Character, Dictionary};
use super::movie::MovieInfo;
use super::sprite::Sprite;
use super::tags::{self, TagFlags};

/// 单个标签的解析上下文
pub struct TagContext<'a> {
    /// 文件版本
    pub version: u8,
    /// 当前标签类型
    pub tag: u16,
    pub dictionary: &'a mut Dictionary,
    pub movie: &'a mut MovieInfo,
    /// 当前写入的时间轴 (主时间轴或 DefineSprite)
    pub sprite: &'a mut Sprite,
    pub in_sprite: bool,
}

impl TagContext<'_> {
    /// 当前标签名称
    pub fn tag_name(&self) -> &'static str {
        tags::tag_name(self.tag)
    }

    /// 定义新角色, ID 重复时拒绝并返回 false
    pub fn define(&mut self, id: u16, character: Character) -> bool {
        self.dictionary.insert(id, character)
    }

    /// 检查引用的角色是否已定义, 未定义时告警
    pub fn check_reference(&self, id: u16) -> bool {
        let found = self.dictionary.contains(id);
        if !found {
            warn!("{} 引用了未定义的角色 {}", self.tag_name(), id);
        }
        found
    }
}

/// 从比特流读取标签头, 返回 (类型, 长度)
pub fn read_tag_header(reader: &mut BitReader) -> YingResult<(u16, usize)> {
    let code = reader.read_u16()?;
    let tag = code >> 6;
    let mut len = (code & 0x3F) as usize;
    if len == 0x3F {
        len = reader.read_u32()? as usize;
    }
    Ok((tag, len))
}

/// 将一个标签分发给对应的处理函数
///
/// 所有问题都只记录告警: 未知标签、位置不允许、处理失败和末尾残留字节都不会中断解析.
pub fn dispatch(ctx: &mut TagContext<'_>, mut reader: BitReader, first_tag: bool) {
    let tag = ctx.tag;
    let Some(entry) = tags::lookup(tag) else {
        warn!("未知标签 {} ({} 字节), 已跳过", tag, reader.len());
        return;
    };
    if ctx.in_sprite && !entry.flags.contains(TagFlags::ALLOWED_IN_SPRITE) {
        warn!("{} 不允许出现在 DefineSprite 中, 已跳过", entry.name);
        return;
    }
    if entry.flags.contains(TagFlags::FIRST_TAG_ONLY) && !first_tag {
        warn!("{} 必须是文件的第一个标签, 已忽略", entry.name);
        return;
    }
    let Some(handler) = entry.handler else {
        debug!("忽略标签 {} ({} 字节)", entry.name, reader.len());
        return;
    };

    match handler(ctx, &mut reader) {
        Ok(()) => {
            let left = reader.bytes_left();
            if left > 0 {
                warn!("{} 末尾有 {} 字节未解析", entry.name, left);
            }
        }
        Err(YingError::NeedMoreData) => warn!("{} 数据被截断", entry.name),
        Err(e) => warn!("解析 {} 失败: {}", entry.name, e),
    }
}
