use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use serde::Serialize;
use softpal_script::config::CONFIG_FILE_NAME;
use softpal_script::disasm::{self, Inst};
use softpal_script::format::{read_label_offsets, CodeImage, CODE_FILE_NAME, POINT_FILE_NAME};
use softpal_script::{FontProfiles, PatchConfig, ScriptString, Softpalizer, SoftpalScript, TextOperand};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Constants file; defaults to VNTranslationToolsConstants.json in the working directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the configuration.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dump the translatable strings of a script to JSON.
    Extract {
        #[arg(short, long, required = true)]
        input: PathBuf,

        #[arg(short, long, required = true)]
        output: PathBuf,
    },
    /// Write translated strings back into a copy of the script.
    Patch {
        #[arg(short, long, required = true)]
        input: PathBuf,

        /// JSON produced by `extract`, with the text translated.
        #[arg(short, long, required = true)]
        strings: PathBuf,

        /// Directory receiving SCRIPT.SRC, TEXT.DAT and POINT.DAT.
        #[arg(short, long, required = true)]
        output: PathBuf,
    },
    /// Write the reachable instructions and text operands as YAML.
    Disasm {
        #[arg(short, long, required = true)]
        input: PathBuf,

        #[arg(short, long, required = true)]
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct Listing {
    operands: Vec<TextOperand>,
    insts: Vec<Inst>,
}

fn load_config(path: Option<&Path>) -> Result<(PatchConfig, PathBuf)> {
    match path {
        Some(path) => {
            let config = PatchConfig::read(path).with_context(|| format!("loading config: {}", path.display()))?;
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            Ok((config, dir))
        }
        None => {
            let path = Path::new(CONFIG_FILE_NAME);
            if path.exists() {
                load_config(Some(path))
            } else {
                Ok((PatchConfig::default(), PathBuf::from(".")))
            }
        }
    }
}

fn extract(input: &Path, output: &Path, config: &PatchConfig) -> Result<()> {
    let script = SoftpalScript::load(input, config).with_context(|| format!("loading script: {}", input.display()))?;
    let strings = script
        .strings()
        .collect::<softpal_script::Result<Vec<ScriptString>>>()
        .with_context(|| format!("reading strings: {}", input.display()))?;

    let writer = BufWriter::new(File::create(output).with_context(|| format!("creating {}", output.display()))?);
    serde_json::to_writer_pretty(writer, &strings)?;
    log::info!("extracted {} strings to {}", strings.len(), output.display());
    Ok(())
}

fn patch(input: &Path, strings: &Path, output: &Path, config: &PatchConfig, font_dir: &Path) -> Result<()> {
    if output.exists() && !output.is_dir() {
        bail!("output is not a directory: {}", output.display());
    }
    let script = SoftpalScript::load(input, config).with_context(|| format!("loading script: {}", input.display()))?;

    let reader = BufReader::new(File::open(strings).with_context(|| format!("opening {}", strings.display()))?);
    let translated: Vec<ScriptString> =
        serde_json::from_reader(reader).with_context(|| format!("parsing strings: {}", strings.display()))?;

    let fonts = FontProfiles::from_config(config, font_dir).context("loading fonts")?;
    let softpalizer = Softpalizer::new(&fonts, config);

    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;
    let stats = script
        .write_patched(translated, output.join(CODE_FILE_NAME), &softpalizer)
        .with_context(|| format!("patching {}", input.display()))?;

    // labels are untouched by patching
    let point = input.with_file_name(POINT_FILE_NAME);
    let dest = output.join(POINT_FILE_NAME);
    let in_place = dest.exists() && fs::canonicalize(&point).ok() == fs::canonicalize(&dest).ok();
    if !in_place {
        fs::copy(&point, &dest).with_context(|| format!("copying {}", point.display()))?;
    }

    if stats.truncated > 0 || stats.lossy > 0 {
        log::warn!("{} strings truncated, {} with unencodable characters", stats.truncated, stats.lossy);
    }
    Ok(())
}

fn dump_listing(input: &Path, output: &Path) -> Result<()> {
    let code = CodeImage::read(input).with_context(|| format!("reading {}", input.display()))?;
    let point = input.with_file_name(POINT_FILE_NAME);
    let labels = read_label_offsets(&point).with_context(|| format!("reading {}", point.display()))?;
    let dis = disasm::disassemble_listing(code.as_bytes(), &labels).context("disassembling")?;

    let listing = Listing {
        operands: dis.operands,
        insts: dis.listing,
    };
    let mut writer = BufWriter::new(File::create(output).with_context(|| format!("creating {}", output.display()))?);
    serde_yaml::to_writer(&mut writer, &listing)?;
    log::info!(
        "{} instructions, {} text operands written to {}",
        listing.insts.len(),
        listing.operands.len(),
        output.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, font_dir) = load_config(cli.config.as_deref())?;

    let level = if cli.verbose { LevelFilter::Debug } else { config.level_filter() };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    match cli.command {
        Command::Extract { input, output } => extract(&input, &output, &config),
        Command::Patch { input, strings, output } => patch(&input, &strings, &output, &config, &font_dir),
        Command::Disasm { input, output } => dump_listing(&input, &output),
    }
}
