//! 角色与角色字典.
//!
//! 角色的生命周期受解码器约束, 字典按 ID 持有角色, 其他结构只通过 ID 引用.

use std::collections::HashMap;

use log::{trace, warn};
use ying_core::Rect;

use super::button::Button;
use super::font::Font;
use super::image::Image;
use super::shape::{MorphShape, Shape};
use super::sound::Sound;
use super::sprite::Sprite;
use super::text::{EditText, Text};
use super::video::Video;

/// 已定义的角色
#[derive(Debug, Clone, PartialEq)]
pub enum Character {
    Shape(Shape),
    MorphShape(MorphShape),
    Button(Button),
    Font(Font),
    Text(Text),
    EditText(EditText),
    Image(Image),
    Sound(Sound),
    Sprite(Sprite),
    Video(Video),
}

impl Character {
    /// 角色类别名称
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Shape(_) => "shape",
            Self::MorphShape(_) => "morph_shape",
            Self::Button(_) => "button",
            Self::Font(_) => "font",
            Self::Text(_) => "text",
            Self::EditText(_) => "edit_text",
            Self::Image(_) => "image",
            Self::Sound(_) => "sound",
            Self::Sprite(_) => "sprite",
            Self::Video(_) => "video",
        }
    }

    /// 角色自身坐标系下的包围盒, 没有固定外形的角色返回 None
    pub fn bounds(&self) -> Option<Rect> {
        match self {
            Self::Shape(s) => Some(s.bounds),
            Self::MorphShape(m) => Some(m.start_bounds.union(&m.end_bounds)),
            Self::Button(b) => Some(b.extents),
            Self::Text(t) => Some(t.bounds),
            Self::EditText(t) => Some(t.bounds),
            Self::Image(i) => Some(Rect::from_pixels(i.width, i.height)),
            Self::Video(v) => Some(Rect::from_pixels(
                u32::from(v.width),
                u32::from(v.height),
            )),
            Self::Font(_) | Self::Sound(_) | Self::Sprite(_) => None,
        }
    }
}

/// 角色字典: ID → 角色
///
/// 同一 ID 只能定义一次, 重复定义被拒绝而不是覆盖.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Dictionary {
    characters: HashMap<u16, Character>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入角色, ID 已存在时告警并返回 false (字典不变)
    pub fn insert(&mut self, id: u16, character: Character) -> bool {
        if let Some(existing) = self.characters.get(&id) {
            warn!(
                "角色 {} 已定义为 {}, 拒绝重复定义为 {}",
                id,
                existing.kind_name(),
                character.kind_name()
            );
            return false;
        }
        trace!("定义角色 {} ({})", id, character.kind_name());
        self.characters.insert(id, character);
        true
    }

    pub fn get(&self, id: u16) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn get_mut(&mut self, id: u16) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    pub fn contains(&self, id: u16) -> bool {
        self.characters.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// 全部角色 ID, 升序
    pub fn ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.characters.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// 按 ID 升序遍历
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Character)> {
        self.ids()
            .into_iter()
            .filter_map(move |id| self.characters.get(&id).map(|c| (id, c)))
    }

    pub fn sprite(&self, id: u16) -> Option<&Sprite> {
        match self.get(id) {
            Some(Character::Sprite(s)) => Some(s),
            _ => None,
        }
    }

    pub fn sound(&self, id: u16) -> Option<&Sound> {
        match self.get(id) {
            Some(Character::Sound(s)) => Some(s),
            _ => None,
        }
    }

    pub fn font(&self, id: u16) -> Option<&Font> {
        match self.get(id) {
            Some(Character::Font(f)) => Some(f),
            _ => None,
        }
    }

    pub fn font_mut(&mut self, id: u16) -> Option<&mut Font> {
        match self.get_mut(id) {
            Some(Character::Font(f)) => Some(f),
            _ => None,
        }
    }

    pub fn button_mut(&mut self, id: u16) -> Option<&mut Button> {
        match self.get_mut(id) {
            Some(Character::Button(b)) => Some(b),
            _ => None,
        }
    }

    pub fn video_mut(&mut self, id: u16) -> Option<&mut Video> {
        match self.get_mut(id) {
            Some(Character::Video(v)) => Some(v),
            _ => None,
        }
    }

    pub fn shape(&self, id: u16) -> Option<&Shape> {
        match self.get(id) {
            Some(Character::Shape(s)) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ying_codec::{AudioCodec, AudioFormat};

    fn sound(id: u16) -> Character {
        Character::Sound(Sound {
            id,
            codec: AudioCodec::Adpcm,
            format: AudioFormat::CANONICAL,
            sample_count: 10,
            skip: 0,
            data: Bytes::from_static(&[1, 2, 3]),
        })
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut dict = Dictionary::new();
        assert!(dict.insert(3, sound(3)));
        let before = dict.clone();
        assert!(!dict.insert(3, Character::Sprite(Sprite::new(3, 1))));
        assert_eq!(dict, before);
        assert!(dict.sound(3).is_some());
        assert!(dict.sprite(3).is_none());
    }

    #[test]
    fn test_ids_sorted_and_typed_access() {
        let mut dict = Dictionary::new();
        dict.insert(9, Character::Sprite(Sprite::new(9, 2)));
        dict.insert(2, sound(2));
        assert_eq!(dict.ids(), vec![2, 9]);
        let kinds: Vec<_> = dict.iter().map(|(id, c)| (id, c.kind_name())).collect();
        assert_eq!(kinds, vec![(2, "sound"), (9, "sprite")]);
        assert_eq!(dict.sprite(9).unwrap().frames.len(), 2);
        assert!(dict.font_mut(9).is_none());
        assert!(dict.get(1).is_none());
        assert_eq!(dict.len(), 2);
    }
}
