use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use revkv::format::{DropReader, FileHeader, FileTail};
use revkv::options::{FormatOptions, DEFAULT_BLOCK_SIZE};
use revkv::primitives::block::BlockFile;
use revkv::primitives::io::StdFileIo;
use revkv::RecordPtr;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "revkv-inspect",
    version,
    about = "Decode records from a revkv store file",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[arg(
        long,
        value_name = "BYTES",
        help = "Physical block size the file was written with"
    )]
    block_size: Option<u32>,

    #[arg(
        long,
        value_name = "PATH",
        env = "REVKV_CONFIG",
        help = "Format config (TOML) supplying the block size"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the file header.
    Header,
    /// Show a tail record (defaults to the one the header points at).
    Tail {
        #[arg(long)]
        pos: Option<u64>,
    },
    /// Decode a key-tree node.
    KeyNode {
        #[arg(long)]
        pos: u64,
    },
    /// Decode a key record.
    KeyRecord {
        #[arg(long)]
        pos: u64,
    },
    /// Decode a value-revision node.
    RevNode {
        #[arg(long)]
        pos: u64,
    },
    /// Decode a value record and show its plain bytes.
    Value {
        #[arg(long)]
        pos: u64,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct PlainValue {
    flag: u8,
    revision: u32,
    stored_len: usize,
    utf8: Option<String>,
    hex: String,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let block_size = match (cli.block_size, cli.config.as_ref()) {
        (Some(size), _) => size,
        (None, Some(path)) => FormatOptions::load(path)?.block_size,
        (None, None) => DEFAULT_BLOCK_SIZE,
    };
    let blocks = BlockFile::open(StdFileIo::open_read_only(&cli.file)?, block_size)?;
    let reader = DropReader::new(blocks);

    match cli.command {
        Command::Header => {
            let header = reader.read_header()?;
            emit(cli.format, &header, || print_header(&header))?;
        }
        Command::Tail { pos } => {
            let pos = match pos {
                Some(pos) => RecordPtr(pos),
                None => reader.read_header()?.tail,
            };
            let tail = reader.read_tail(pos)?;
            emit(cli.format, &tail, || print_tail(pos, &tail))?;
        }
        Command::KeyNode { pos } => {
            let node = reader.read_key_node(RecordPtr(pos))?;
            emit(cli.format, &node, || {
                println!("key node @{pos} leaf={}", node.is_leaf());
                for (i, key) in node.keys().iter().enumerate() {
                    println!("  key[{i}] {}", render_bytes(key));
                }
                for (i, child) in node.children().iter().enumerate() {
                    println!("  child[{i}] {child}");
                }
            })?;
        }
        Command::KeyRecord { pos } => {
            let record = reader.read_key_record(RecordPtr(pos))?;
            emit(cli.format, &record, || {
                println!("key record @{pos}");
                println!("  flag={} key={}", record.flag, render_bytes(&record.key));
                println!(
                    "  revision={} rev_root={} latest_value={}",
                    record.revision, record.rev_root, record.latest_value
                );
            })?;
        }
        Command::RevNode { pos } => {
            let node = reader.read_value_rev_node(RecordPtr(pos))?;
            emit(cli.format, &node, || {
                println!("revision node @{pos} leaf={}", node.is_leaf());
                println!("  revisions={:?}", node.revisions());
                for (i, child) in node.children().iter().enumerate() {
                    println!("  child[{i}] {child}");
                }
            })?;
        }
        Command::Value { pos } => {
            let codec = reader.read_header()?.codec()?;
            let record = reader.read_value_record(RecordPtr(pos))?;
            let plain = record.plain_value(codec)?;
            let report = PlainValue {
                flag: record.flag,
                revision: record.revision,
                stored_len: record.value.len(),
                utf8: String::from_utf8(plain.clone()).ok(),
                hex: hex::encode(&plain),
            };
            emit(cli.format, &report, || {
                println!("value record @{pos} codec={codec:?}");
                println!(
                    "  flag={} revision={} stored={}B plain={}B",
                    report.flag,
                    report.revision,
                    report.stored_len,
                    plain.len()
                );
                println!("  {}", render_bytes(&plain));
            })?;
        }
    }
    Ok(())
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_header(header: &FileHeader) {
    println!("header");
    println!("  tail={}", header.tail);
    println!(
        "  key_tree_min={} value_rev_tree_min={}",
        header.key_tree_min, header.value_rev_tree_min
    );
    println!(
        "  value_compressed={} compression_codec={} block_size={}",
        header.value_compressed, header.compression_codec, header.block_size
    );
}

fn print_tail(pos: RecordPtr, tail: &FileTail) {
    println!("tail {pos}");
    println!("  revision={} root_node={}", tail.revision, tail.root_node);
    println!(
        "  entries={} avg_key_len={} avg_value_len={}",
        tail.entry_count, tail.avg_key_len, tail.avg_value_len
    );
}

fn render_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.chars().any(char::is_control) => format!("{text:?}"),
        _ => format!("0x{}", hex::encode(bytes)),
    }
}
