mod cli;

use mediasplice::{config, output, report};
use mediasplice_chapters::{parse_chapter_file, ParseOptions, UniqueIds};
use mediasplice_demux::{open_file, FileStatus, Reader};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediasplice=debug,mediasplice_demux=trace,mediasplice_chapters=trace".to_string()
        } else {
            "mediasplice=info,mediasplice_demux=warn,mediasplice_chapters=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Identify { file, json } => identify_file(&file, cli.config.as_deref(), json),
        Commands::Demux { file, output } => demux_file(&file, &output, cli.config.as_deref()),
        Commands::Chapters {
            file,
            min,
            max,
            offset,
            adjust,
            merge,
            language,
            json,
        } => {
            let edits = ChapterEdits {
                min: min.unwrap_or(0),
                max,
                offset: offset.unwrap_or(0),
                adjust,
                merge,
                language,
            };
            edit_chapters(&file, cli.config.as_deref(), &edits, json)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediasplice {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_media(file: &Path, config_path: Option<&Path>) -> Result<Box<dyn Reader>> {
    let config = config::load_config_or_default(config_path)?;

    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    open_file(file, config.demux.ps_config())
        .with_context(|| format!("Failed to open {:?}", file))
}

fn identify_file(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let reader = open_media(file, config_path)?;
    let info = reader.identify();

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print!("{}", report::render_identification(&info));
    }

    Ok(())
}

fn demux_file(file: &Path, output_dir: &Path, config_path: Option<&Path>) -> Result<()> {
    let mut reader = open_media(file, config_path)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    let mut outputs = Vec::new();
    for track in reader.tracks() {
        let path = output_dir.join(output::track_file_name(&track));
        let sink = output::FileSink::create(&path)?;
        let stats = sink.stats();
        reader.set_sink(track.index, Box::new(sink))?;
        outputs.push((track, path, stats));
    }

    tracing::info!("Demuxing {:?} into {:?}", file, output_dir);

    let mut last_progress = 0;
    loop {
        match reader.read() {
            Ok(FileStatus::MoreData) => {}
            Ok(FileStatus::Done) => break,
            Err(err) => {
                reader.finish();
                return Err(err).with_context(|| format!("Failed to demux {:?}", file));
            }
        }
        let progress = reader.progress();
        if progress >= last_progress + 10 {
            tracing::debug!("Progress: {}%", progress);
            last_progress = progress;
        }
    }
    reader.finish();

    for (track, path, stats) in &outputs {
        let stats = stats.borrow();
        if let Some(ref err) = stats.error {
            anyhow::bail!("Failed to write track {} to {:?}: {}", track.index, path, err);
        }
        println!(
            "Track {}: {} {} -> {} ({} frames, {} bytes)",
            track.index,
            track.kind,
            track.codec,
            path.display(),
            stats.frames,
            stats.bytes
        );
    }

    Ok(())
}

struct ChapterEdits {
    min: u64,
    max: Option<u64>,
    offset: u64,
    adjust: Option<i64>,
    merge: bool,
    language: Option<String>,
}

fn edit_chapters(
    file: &Path,
    config_path: Option<&Path>,
    edits: &ChapterEdits,
    json: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let mut uids = match config.chapters.uid_seed {
        Some(seed) => UniqueIds::with_seed(seed),
        None => UniqueIds::new(),
    };
    let options = ParseOptions {
        language: edits.language.clone(),
        ..ParseOptions::default()
    };

    let parsed = parse_chapter_file(file, &options, &config.chapters.defaults(), &mut uids)
        .with_context(|| format!("Failed to parse chapters from {:?}", file))?;

    let selected = parsed.and_then(|chapters| {
        chapters.select_in_timeframe(edits.min, edits.max, edits.offset)
    });
    let Some(mut chapters) = selected else {
        println!("No chapters in the selected timeframe.");
        return Ok(());
    };

    if edits.merge {
        chapters.merge_entries();
    }
    if let Some(delta) = edits.adjust {
        chapters.adjust_timecodes(delta);
    }
    chapters.fix_mandatory_elements(&mut uids);

    tracing::debug!("Kept {} chapters", chapters.atom_count());

    if json {
        println!("{}", serde_json::to_string_pretty(&chapters)?);
    } else {
        print!("{}", report::render_chapters(&chapters));
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Probe size: {} bytes", config.demux.probe_size);
    println!(
        "  Chapter language: {}",
        config.chapters.default_language.as_deref().unwrap_or("eng")
    );
    if let Some(ref country) = config.chapters.default_country {
        println!("  Chapter country: {}", country);
    }
    match config.chapters.uid_seed {
        Some(seed) => println!("  UID seed: {}", seed),
        None => println!("  UID seed: random"),
    }

    Ok(())
}
