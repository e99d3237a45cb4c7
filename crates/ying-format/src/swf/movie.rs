//! 影片级信息: 背景色、文件属性、导入导出、元数据等不属于任何角色的标签.

use bitflags::bitflags;
use bytes::Bytes;
use log::{debug, warn};
use ying_core::{BitReader, Color, Rect, YingResult};

use super::context::TagContext;
use super::tags;

bitflags! {
    /// FileAttributes 标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FileAttributes: u32 {
        const USE_NETWORK = 0x01;
        const ACTION_SCRIPT3 = 0x08;
        const HAS_METADATA = 0x10;
        const USE_GPU = 0x20;
        const USE_DIRECT_BLIT = 0x40;
    }
}

/// 导出或导入的资源: 角色 ID 与名称
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLink {
    pub id: u16,
    pub name: String,
}

/// ImportAssets 记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub url: String,
    pub assets: Vec<AssetLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub max_recursion_depth: u16,
    pub timeout_seconds: u16,
}

/// 场景: 起始帧与名称
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub frame: u32,
    pub name: String,
}

/// DefineScalingGrid: 角色的九宫格分割矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingGrid {
    pub character_id: u16,
    pub splitter: Rect,
}

/// DoInitAction: 精灵首次出现前执行的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitAction {
    pub sprite_id: u16,
    pub data: Bytes,
}

/// 影片级信息
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MovieInfo {
    pub background: Option<Color>,
    pub file_attributes: FileAttributes,
    /// DefineBits 共用的 JPEG 编码表
    pub jpeg_tables: Option<Bytes>,
    pub exports: Vec<AssetLink>,
    pub imports: Vec<Import>,
    pub metadata: Option<String>,
    pub script_limits: Option<ScriptLimits>,
    pub scenes: Vec<Scene>,
    /// DefineSceneAndFrameLabelData 中的帧名 (帧号, 名称)
    pub frame_labels: Vec<(u32, String)>,
    pub scaling_grids: Vec<ScalingGrid>,
    pub protected: bool,
    /// Protect 标签中 MD5 加密的密码
    pub protect_password: Option<String>,
    pub debugger_password: Option<String>,
    /// (深度, Tab 顺序)
    pub tab_indices: Vec<(u16, u16)>,
    pub init_actions: Vec<InitAction>,
}

impl MovieInfo {
    /// 按导出名查找角色 ID
    pub fn export_id(&self, name: &str) -> Option<u16> {
        self.exports.iter().find(|e| e.name == name).map(|e| e.id)
    }
}

pub fn set_background_color(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let color = reader.read_color_rgb()?;
    if let Some(old) = ctx.movie.background {
        debug!("背景色 {:?} 被替换为 {:?}", old, color);
    }
    ctx.movie.background = Some(color);
    Ok(())
}

pub fn protect(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    ctx.movie.protected = true;
    if reader.bytes_left() > 0 {
        // 两字节保留字段之后是 MD5 密码
        if reader.bytes_left() > 2 && reader.remaining_slice().first() != Some(&b'$') {
            reader.skip_bytes(2)?;
        }
        ctx.movie.protect_password = Some(reader.read_string(ctx.version)?);
    }
    Ok(())
}

fn read_asset_links(reader: &mut BitReader, version: u8) -> YingResult<Vec<AssetLink>> {
    let count = reader.read_u16()?;
    let mut assets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = reader.read_u16()?;
        let name = reader.read_string(version)?;
        assets.push(AssetLink { id, name });
    }
    Ok(assets)
}

pub fn export_assets(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    for asset in read_asset_links(reader, ctx.version)? {
        ctx.check_reference(asset.id);
        if ctx.movie.export_id(&asset.name).is_some() {
            warn!("导出名 {} 重复, 已忽略", asset.name);
            continue;
        }
        ctx.movie.exports.push(asset);
    }
    Ok(())
}

pub fn import_assets(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let url = reader.read_string(ctx.version)?;
    if ctx.tag == tags::IMPORT_ASSETS2 {
        reader.skip_bytes(2)?;
    }
    let assets = read_asset_links(reader, ctx.version)?;
    debug!("从 {} 导入 {} 个资源", url, assets.len());
    ctx.movie.imports.push(Import { url, assets });
    Ok(())
}

pub fn enable_debugger(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    if ctx.tag == tags::ENABLE_DEBUGGER2 {
        reader.skip_bytes(2)?;
    }
    let password = if reader.bytes_left() > 0 {
        reader.read_string(ctx.version)?
    } else {
        String::new()
    };
    ctx.movie.debugger_password = Some(password);
    Ok(())
}

pub fn do_init_action(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let sprite_id = reader.read_u16()?;
    ctx.check_reference(sprite_id);
    let data = reader.read_remaining();
    ctx.movie.init_actions.push(InitAction { sprite_id, data });
    Ok(())
}

pub fn script_limits(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    ctx.movie.script_limits = Some(ScriptLimits {
        max_recursion_depth: reader.read_u16()?,
        timeout_seconds: reader.read_u16()?,
    });
    Ok(())
}

pub fn set_tab_index(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let depth = reader.read_u16()?;
    let index = reader.read_u16()?;
    ctx.movie.tab_indices.push((depth, index));
    Ok(())
}

pub fn file_attributes(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let attributes = FileAttributes::from_bits_retain(reader.read_u32()?);
    if attributes.contains(FileAttributes::ACTION_SCRIPT3) {
        warn!("文件声明使用 ActionScript 3, DoABC 标签将被忽略");
    }
    ctx.movie.file_attributes = attributes;
    Ok(())
}

pub fn metadata(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    ctx.movie.metadata = Some(reader.read_string(ctx.version)?);
    Ok(())
}

pub fn define_scaling_grid(ctx: &mut TagContext<'_>, reader: &mut BitReader) -> YingResult<()> {
    let character_id = reader.read_u16()?;
    ctx.check_reference(character_id);
    let splitter = reader.read_rect()?;
    ctx.movie.scaling_grids.push(ScalingGrid {
        character_id,
        splitter,
    });
    Ok(())
}

pub fn define_scene_and_frame_label_data(
    ctx: &mut TagContext<'_>,
    reader: &mut BitReader,
) -> YingResult<()> {
    let scene_count = reader.read_encoded_u32()?;
    for _ in 0..scene_count {
        let frame = reader.read_encoded_u32()?;
        let name = reader.read_string(ctx.version)?;
        ctx.movie.scenes.push(Scene { frame, name });
    }
    let label_count = reader.read_encoded_u32()?;
    for _ in 0..label_count {
        let frame = reader.read_encoded_u32()?;
        let name = reader.read_string(ctx.version)?;
        ctx.movie.frame_labels.push((frame, name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swf::character::Dictionary;
    use crate::swf::sprite::Sprite;
    use ying_core::BitWriter;

    fn run(tag: u16, payload: Vec<u8>) -> MovieInfo {
        let mut dictionary = Dictionary::default();
        let mut movie = MovieInfo::default();
        let mut sprite = Sprite::new(0, 1);
        let mut ctx = TagContext {
            version: 10,
            tag,
            dictionary: &mut dictionary,
            movie: &mut movie,
            sprite: &mut sprite,
            in_sprite: false,
        };
        let handler = tags::lookup(tag).and_then(|e| e.handler).unwrap();
        let mut reader = BitReader::from_slice(&payload);
        handler(&mut ctx, &mut reader).unwrap();
        assert_eq!(reader.bytes_left(), 0);
        movie
    }

    #[test]
    fn test_export_and_import_assets() {
        let mut w = BitWriter::new();
        w.write_u16(2);
        w.write_u16(3);
        w.write_string("Hero", 10);
        w.write_u16(4);
        w.write_string("Hero", 10);
        let movie = run(tags::EXPORT_ASSETS, w.finish());
        assert_eq!(movie.exports.len(), 1);
        assert_eq!(movie.export_id("Hero"), Some(3));

        let mut w = BitWriter::new();
        w.write_string("lib.swf", 10);
        w.write_u8(1);
        w.write_u8(0);
        w.write_u16(1);
        w.write_u16(9);
        w.write_string("Coin", 10);
        let movie = run(tags::IMPORT_ASSETS2, w.finish());
        assert_eq!(movie.imports[0].url, "lib.swf");
        assert_eq!(movie.imports[0].assets[0].name, "Coin");
    }

    #[test]
    fn test_scene_and_frame_label_data() {
        let mut w = BitWriter::new();
        w.write_encoded_u32(2);
        w.write_encoded_u32(0);
        w.write_string("Intro", 10);
        w.write_encoded_u32(200);
        w.write_string("Main", 10);
        w.write_encoded_u32(1);
        w.write_encoded_u32(150);
        w.write_string("boss", 10);
        let movie = run(tags::DEFINE_SCENE_AND_FRAME_LABEL_DATA, w.finish());
        assert_eq!(
            movie.scenes,
            vec![
                Scene {
                    frame: 0,
                    name: "Intro".into()
                },
                Scene {
                    frame: 200,
                    name: "Main".into()
                },
            ]
        );
        assert_eq!(movie.frame_labels, vec![(150, "boss".to_string())]);
    }

    #[test]
    fn test_protect_and_attributes() {
        let mut w = BitWriter::new();
        w.write_u16(0);
        w.write_string("$1$xx$abc", 10);
        let movie = run(tags::PROTECT, w.finish());
        assert!(movie.protected);
        assert_eq!(movie.protect_password.as_deref(), Some("$1$xx$abc"));

        let movie = run(tags::PROTECT, Vec::new());
        assert!(movie.protected);
        assert_eq!(movie.protect_password, None);

        let movie = run(tags::FILE_ATTRIBUTES, vec![0x19, 0, 0, 0]);
        assert!(movie.file_attributes.contains(FileAttributes::HAS_METADATA));
        assert!(movie.file_attributes.contains(FileAttributes::USE_NETWORK));

        let movie = run(tags::SET_BACKGROUND_COLOR, vec![0x10, 0x20, 0x30]);
        assert_eq!(movie.background, Some(Color::rgb(0x10, 0x20, 0x30)));
    }
}
