//! ying-probe - SWF/FLV 信息探测工具
//!
//! 把文件按块送进增量解码器, 输出影片头、帧、角色、动作、声音与编码可用性的摘要.

mod logging;
mod report;

use std::fs::File;
use std::io::BufReader;
use std::process;

use clap::Parser;
use log::debug;
use ying_codec::{BackendKind, CodecConfig, CodecRegistry};

/// Ying SWF/FLV 信息探测工具
#[derive(Parser, Debug)]
#[command(name = "ying-probe", version, about = "纯 Rust SWF/FLV 信息探测工具")]
struct Cli {
    /// 输入文件路径
    input: Option<String>,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 每次送入解码器的字节数
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,

    /// 解码后端, 按优先级用逗号分隔 (builtin,symphonia)
    #[arg(long, value_delimiter = ',')]
    backend: Vec<BackendKind>,

    /// 日志详细程度 (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let Some(input_path) = cli.input.as_deref() else {
        print_banner();
        return;
    };

    logging::init("ying-probe", cli.verbose);

    let config = if cli.backend.is_empty() {
        CodecConfig::default()
    } else {
        CodecConfig {
            backends: cli.backend.clone(),
        }
    };
    debug!("解码后端配置: {:?}", config.backends);
    let registry = CodecRegistry::from_config(&config);

    let file = match File::open(input_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("错误: 无法打开文件 '{input_path}': {e}");
            process::exit(1);
        }
    };

    let report = match report::probe(
        input_path,
        BufReader::new(file),
        cli.chunk_size,
        &registry,
    ) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("错误: {e}");
            process::exit(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("错误: JSON 序列化失败: {e}");
                process::exit(1);
            }
        }
    } else {
        report::print_text(&report);
    }

    if let Some(ref error) = report.error {
        eprintln!("错误: 解析中止: {error}");
        process::exit(1);
    }
}

fn print_banner() {
    println!(
        "ying-probe 版本 {} -- 纯 Rust SWF/FLV 信息探测工具",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("用法: ying-probe [选项] <输入文件>");
    println!();
    println!("选项:");
    println!("  --json                以 JSON 格式输出");
    println!("  --chunk-size <N>      每次送入解码器的字节数 (默认 4096)");
    println!("  --backend <列表>      解码后端优先级, 如 builtin,symphonia");
    println!("  -v, -vv               提高日志详细程度 (或设置 YING_LOG)");
    println!();
    println!("使用 --help 查看完整用法.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_backend_list() {
        let cli = Cli::parse_from(["ying-probe", "a.swf", "--backend", "symphonia,builtin", "-vv"]);
        assert_eq!(cli.input.as_deref(), Some("a.swf"));
        assert_eq!(cli.backend, vec![BackendKind::Symphonia, BackendKind::Builtin]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.chunk_size, 4096);
        assert!(!cli.json);
    }

    #[test]
    fn test_cli_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["ying-probe", "a.swf", "--backend", "ffmpeg"]).is_err());
    }

    #[test]
    fn test_probe_file_on_disk() {
        let mut writer = ying_format::swf::SwfWriter::new(8);
        writer.compressed(true).show_frame().end();
        let data = writer.finish().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        let reader = BufReader::new(File::open(file.path()).unwrap());
        let registry = CodecRegistry::from_config(&CodecConfig::default());
        let report = report::probe("movie.swf", reader, 3, &registry).unwrap();
        let swf = report.swf.unwrap();
        assert!(swf.compressed);
        assert_eq!(swf.version, 8);
        assert_eq!(swf.frames_loaded, 1);
    }
}
