//! SWF 标签类型与分发表.
//!
//! 分发表是按标签类型下标直接索引的静态数组, 每项给出名称、处理函数和标志位.
//! 有名称但没有处理函数的标签是 "已知但忽略", 名称为空的是未知标签.

use bitflags::bitflags;
use ying_core::{BitReader, YingResult};

use super::context::TagContext;
use super::{button, font, image, movie, place, shape, sound, sprite, text, video};

pub const END: u16 = 0;
pub const SHOW_FRAME: u16 = 1;
pub const DEFINE_SHAPE: u16 = 2;
pub const PLACE_OBJECT: u16 = 4;
pub const REMOVE_OBJECT: u16 = 5;
pub const DEFINE_BITS: u16 = 6;
pub const DEFINE_BUTTON: u16 = 7;
pub const JPEG_TABLES: u16 = 8;
pub const SET_BACKGROUND_COLOR: u16 = 9;
pub const DEFINE_FONT: u16 = 10;
pub const DEFINE_TEXT: u16 = 11;
pub const DO_ACTION: u16 = 12;
pub const DEFINE_FONT_INFO: u16 = 13;
pub const DEFINE_SOUND: u16 = 14;
pub const START_SOUND: u16 = 15;
pub const DEFINE_BUTTON_SOUND: u16 = 17;
pub const SOUND_STREAM_HEAD: u16 = 18;
pub const SOUND_STREAM_BLOCK: u16 = 19;
pub const DEFINE_BITS_LOSSLESS: u16 = 20;
pub const DEFINE_BITS_JPEG2: u16 = 21;
pub const DEFINE_SHAPE2: u16 = 22;
pub const DEFINE_BUTTON_CXFORM: u16 = 23;
pub const PROTECT: u16 = 24;
pub const PLACE_OBJECT2: u16 = 26;
pub const REMOVE_OBJECT2: u16 = 28;
pub const DEFINE_SHAPE3: u16 = 32;
pub const DEFINE_TEXT2: u16 = 33;
pub const DEFINE_BUTTON2: u16 = 34;
pub const DEFINE_BITS_JPEG3: u16 = 35;
pub const DEFINE_BITS_LOSSLESS2: u16 = 36;
pub const DEFINE_EDIT_TEXT: u16 = 37;
pub const DEFINE_SPRITE: u16 = 39;
pub const PRODUCT_INFO: u16 = 41;
pub const FRAME_LABEL: u16 = 43;
pub const SOUND_STREAM_HEAD2: u16 = 45;
pub const DEFINE_MORPH_SHAPE: u16 = 46;
pub const DEFINE_FONT2: u16 = 48;
pub const EXPORT_ASSETS: u16 = 56;
pub const IMPORT_ASSETS: u16 = 57;
pub const ENABLE_DEBUGGER: u16 = 58;
pub const DO_INIT_ACTION: u16 = 59;
pub const DEFINE_VIDEO_STREAM: u16 = 60;
pub const VIDEO_FRAME: u16 = 61;
pub const DEFINE_FONT_INFO2: u16 = 62;
pub const DEBUG_ID: u16 = 63;
pub const ENABLE_DEBUGGER2: u16 = 64;
pub const SCRIPT_LIMITS: u16 = 65;
pub const SET_TAB_INDEX: u16 = 66;
pub const FILE_ATTRIBUTES: u16 = 69;
pub const PLACE_OBJECT3: u16 = 70;
pub const IMPORT_ASSETS2: u16 = 71;
pub const DO_ABC_DEFINE: u16 = 72;
pub const DEFINE_FONT_ALIGN_ZONES: u16 = 73;
pub const CSM_TEXT_SETTINGS: u16 = 74;
pub const DEFINE_FONT3: u16 = 75;
pub const SYMBOL_CLASS: u16 = 76;
pub const METADATA: u16 = 77;
pub const DEFINE_SCALING_GRID: u16 = 78;
pub const DO_ABC: u16 = 82;
pub const DEFINE_SHAPE4: u16 = 83;
pub const DEFINE_MORPH_SHAPE2: u16 = 84;
pub const DEFINE_SCENE_AND_FRAME_LABEL_DATA: u16 = 86;
pub const DEFINE_BINARY_DATA: u16 = 87;
pub const DEFINE_FONT_NAME: u16 = 88;
pub const START_SOUND2: u16 = 89;
pub const DEFINE_BITS_JPEG4: u16 = 90;
pub const DEFINE_FONT4: u16 = 91;

bitflags! {
    /// 标签标志位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TagFlags: u8 {
        /// 允许出现在 DefineSprite 内部
        const ALLOWED_IN_SPRITE = 0x01;
        /// 只能是文件的第一个标签
        const FIRST_TAG_ONLY = 0x02;
    }
}

/// 标签处理函数
pub type TagHandler = fn(&mut TagContext<'_>, &mut BitReader) -> YingResult<()>;

/// 分发表项
pub struct TagEntry {
    pub name: &'static str,
    pub handler: Option<TagHandler>,
    pub flags: TagFlags,
}

const fn known(name: &'static str, handler: TagHandler) -> TagEntry {
    TagEntry {
        name,
        handler: Some(handler),
        flags: TagFlags::empty(),
    }
}

const fn timeline(name: &'static str, handler: TagHandler) -> TagEntry {
    TagEntry {
        name,
        handler: Some(handler),
        flags: TagFlags::ALLOWED_IN_SPRITE,
    }
}

const fn ignored(name: &'static str) -> TagEntry {
    TagEntry {
        name,
        handler: None,
        flags: TagFlags::empty(),
    }
}

const UNKNOWN: TagEntry = ignored("");

/// 标签分发表, 下标即标签类型
static TAGS: [TagEntry; 92] = [
    TagEntry {
        name: "End",
        handler: None,
        flags: TagFlags::ALLOWED_IN_SPRITE,
    },
    timeline("ShowFrame", sprite::show_frame),
    known("DefineShape", shape::define_shape),
    ignored("FreeCharacter"),
    timeline("PlaceObject", place::place_object),
    timeline("RemoveObject", place::remove_object),
    known("DefineBits", image::define_bits),
    known("DefineButton", button::define_button),
    known("JPEGTables", image::jpeg_tables),
    known("SetBackgroundColor", movie::set_background_color),
    known("DefineFont", font::define_font),
    known("DefineText", text::define_text),
    timeline("DoAction", sprite::do_action),
    known("DefineFontInfo", font::define_font_info),
    known("DefineSound", sound::define_sound),
    timeline("StartSound", sound::start_sound),
    UNKNOWN,
    known("DefineButtonSound", button::define_button_sound),
    timeline("SoundStreamHead", sound::sound_stream_head),
    timeline("SoundStreamBlock", sound::sound_stream_block),
    known("DefineBitsLossless", image::define_bits_lossless),
    known("DefineBitsJPEG2", image::define_bits_jpeg2),
    known("DefineShape2", shape::define_shape),
    known("DefineButtonCxform", button::define_button_cxform),
    known("Protect", movie::protect),
    ignored("PathsArePostscript"),
    timeline("PlaceObject2", place::place_object),
    UNKNOWN,
    timeline("RemoveObject2", place::remove_object),
    ignored("SyncFrame"),
    UNKNOWN,
    ignored("FreeAll"),
    known("DefineShape3", shape::define_shape),
    known("DefineText2", text::define_text),
    known("DefineButton2", button::define_button2),
    known("DefineBitsJPEG3", image::define_bits_jpeg3),
    known("DefineBitsLossless2", image::define_bits_lossless),
    known("DefineEditText", text::define_edit_text),
    ignored("DefineVideo"),
    known("DefineSprite", sprite::define_sprite),
    ignored("NameCharacter"),
    ignored("ProductInfo"),
    ignored("DefineTextFormat"),
    timeline("FrameLabel", sprite::frame_label),
    UNKNOWN,
    timeline("SoundStreamHead2", sound::sound_stream_head),
    known("DefineMorphShape", shape::define_morph_shape),
    ignored("GenerateFrame"),
    known("DefineFont2", font::define_font2),
    ignored("GeneratorCommand"),
    ignored("DefineCommandObject"),
    ignored("CharacterSet"),
    ignored("ExternalFont"),
    UNKNOWN,
    UNKNOWN,
    UNKNOWN,
    known("ExportAssets", movie::export_assets),
    known("ImportAssets", movie::import_assets),
    known("EnableDebugger", movie::enable_debugger),
    known("DoInitAction", movie::do_init_action),
    known("DefineVideoStream", video::define_video),
    timeline("VideoFrame", video::video_frame),
    known("DefineFontInfo2", font::define_font_info),
    ignored("DebugID"),
    known("EnableDebugger2", movie::enable_debugger),
    known("ScriptLimits", movie::script_limits),
    known("SetTabIndex", movie::set_tab_index),
    UNKNOWN,
    UNKNOWN,
    TagEntry {
        name: "FileAttributes",
        handler: Some(movie::file_attributes),
        flags: TagFlags::FIRST_TAG_ONLY,
    },
    timeline("PlaceObject3", place::place_object),
    known("ImportAssets2", movie::import_assets),
    ignored("DoABCDefine"),
    ignored("DefineFontAlignZones"),
    ignored("CSMTextSettings"),
    known("DefineFont3", font::define_font2),
    ignored("SymbolClass"),
    known("Metadata", movie::metadata),
    known("DefineScalingGrid", movie::define_scaling_grid),
    UNKNOWN,
    UNKNOWN,
    UNKNOWN,
    ignored("DoABC"),
    known("DefineShape4", shape::define_shape),
    known("DefineMorphShape2", shape::define_morph_shape),
    UNKNOWN,
    known(
        "DefineSceneAndFrameLabelData",
        movie::define_scene_and_frame_label_data,
    ),
    ignored("DefineBinaryData"),
    known("DefineFontName", font::define_font_name),
    timeline("StartSound2", sound::start_sound),
    ignored("DefineBitsJPEG4"),
    ignored("DefineFont4"),
];

/// 查找标签的分发表项, 超出表范围或未知时返回 None
pub fn lookup(tag: u16) -> Option<&'static TagEntry> {
    TAGS.get(tag as usize).filter(|e| !e.name.is_empty())
}

/// 标签名称, 未知标签返回 "Unknown"
pub fn tag_name(tag: u16) -> &'static str {
    lookup(tag).map_or("Unknown", |e| e.name)
}
