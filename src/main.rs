use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reelmix::{animal_of, format_duration, AppConfig, Catalog, ReelMaker, RenderEvent, Sequence};
use std::collections::BTreeSet;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(p) = explicit {
        return AppConfig::from_json_file(p).with_context(|| format!("loading config {}", p.display()));
    }

    // Look for reelmix.json in app data, current dir fallback, then built-in default
    let mut tried: Vec<PathBuf> = Vec::new();
    if let Some(mut d) = dirs::data_dir() {
        d.push("reelmix");
        d.push("reelmix.json");
        tried.push(d);
    }
    tried.push(PathBuf::from("reelmix.json"));

    for p in &tried {
        if p.exists() {
            return AppConfig::from_json_file(p).with_context(|| format!("loading config {}", p.display()));
        }
    }

    Ok(AppConfig::default())
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the scanned Wall and TV categories and exit
    List,
}

#[derive(Parser, Debug)]
#[command(version, about = "Random Wall/TV clip reel builder.")]
struct Args {
    /// Optional subcommands
    #[command(subcommand)]
    cmd: Option<Command>,

    /// Asset directory containing TV and *Wall* clip directories
    /// (a directory named `list` has to be written as `./list`)
    root: Option<PathBuf>,

    /// Output video file
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// Minimum total duration of the reel in seconds
    #[arg(long)]
    min_duration: Option<f64>,

    /// Seed for a reproducible selection
    #[arg(long)]
    seed: Option<u64>,

    /// JSON config file (defaults to reelmix.json in the app data or current dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// ffprobe executable
    #[arg(long)]
    ffprobe: Option<PathBuf>,

    /// Pick clips and print the sequence without rendering
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Overwrite an existing output file without asking
    #[arg(long, short, default_value_t = false)]
    yes: bool,

    /// Write a details file next to the output and print it
    #[arg(long, default_value_t = false)]
    log_details: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut cfg = load_config(args.config.as_deref())?;
    if let Some(root) = &args.root {
        cfg.asset_root = root.clone();
    }
    if let Some(out) = &args.out {
        cfg.output_file = out.clone();
    }
    if let Some(min) = args.min_duration {
        cfg.min_duration_secs = min;
    }
    if let Some(ffmpeg) = &args.ffmpeg {
        cfg.ffmpeg_path = ffmpeg.clone();
    }
    if let Some(ffprobe) = &args.ffprobe {
        cfg.ffprobe_path = ffprobe.clone();
    }
    let maker = ReelMaker::with_config(cfg)?;
    let cfg = maker.config();

    let catalog = maker
        .scan_catalog()
        .with_context(|| format!("scanning assets in {}", cfg.asset_root.display()))?;

    if let Some(Command::List) = &args.cmd {
        print_catalog(&catalog);
        return Ok(());
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let sequence = maker
        .build_sequence(&catalog, &mut rng, |clip| println!("picked {} {}", clip.kind, clip.animal))
        .context("picking clips")?;
    let total_formatted = format_duration(sequence.total_duration());
    println!("{} clips, {}", sequence.len(), total_formatted);

    if args.dry_run {
        for path in sequence.paths() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let output = &cfg.output_file;
    if output.exists() && !args.yes {
        if !std::io::stdin().is_terminal() {
            return Err(anyhow!(
                "Output file {} already exists. Pass --yes to overwrite it.",
                output.display()
            ));
        }
        if !Confirm::new()
            .with_prompt(format!("Output file {} already exists. Overwrite?", output.display()))
            .default(false)
            .interact()?
        {
            println!("Operation cancelled.");
            return Ok(());
        }
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("creating output dir")?;
    }

    println!("\nrendering video...");
    let pb = ProgressBar::new(sequence.total_duration().ceil() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("0:00/{}", total_formatted));

    let rendered = maker.render(&sequence, |event| match event {
        RenderEvent::Started { clips } => pb.println(format!("encoding {} clips", clips)),
        RenderEvent::Progress { elapsed } => {
            pb.set_position(elapsed as u64);
            pb.set_message(format!("{}/{}", format_duration(elapsed), total_formatted));
        }
        RenderEvent::Finished => pb.finish_with_message(format!("{}/{}", total_formatted, total_formatted)),
    });
    if let Err(e) = rendered {
        pb.abandon();
        if let reelmix::ReelError::Render { stderr: Some(stderr), .. } = &e {
            if !stderr.is_empty() {
                eprintln!("{}", stderr);
            }
        }
        return Err(e).context("rendering video");
    }

    println!("finished! {}", output.display());

    if args.log_details {
        let details = details_text(cfg, &sequence, args.seed);
        let details_path = output.with_extension("details.md");
        fs::write(&details_path, &details).context("writing details file")?;
        println!("\n--- Generation Details ---");
        println!("{}", details);
    }

    Ok(())
}

fn print_catalog(catalog: &Catalog) {
    println!("Assets in {}", catalog.root().display());
    for category in catalog.categories() {
        let mut animals = BTreeSet::new();
        let mut malformed = 0usize;
        for file in &category.files {
            match animal_of(file) {
                Ok(animal) => {
                    animals.insert(animal);
                }
                Err(_) => malformed += 1,
            }
        }
        println!(
            "\n[{}] {} ({} files)",
            category.kind,
            category.path.display(),
            category.files.len()
        );
        if category.files.is_empty() {
            println!("  empty: picks from this kind will fail");
            continue;
        }
        println!("  animals: {}", animals.into_iter().collect::<Vec<_>>().join(", "));
        if malformed > 0 {
            println!("  {} file(s) without an animal token", malformed);
        }
    }
}

fn details_text(cfg: &AppConfig, sequence: &Sequence, seed: Option<u64>) -> String {
    let mut details = format!(
        "Version: {}\nAssets: {}\nMinimum: {}\nDuration: {}\nClips: {}",
        env!("CARGO_PKG_VERSION"),
        cfg.asset_root.display(),
        format_duration(cfg.min_duration_secs),
        format_duration(sequence.total_duration()),
        sequence.len()
    );
    if let Some(seed) = seed {
        details.push_str(&format!("\nSeed: {}", seed));
    }
    details.push('\n');
    for (i, clip) in sequence.clips().iter().enumerate() {
        details.push_str(&format!(
            "\n{}. [{}] {} ({}) {}",
            i + 1,
            clip.kind,
            clip.animal,
            format_duration(clip.duration),
            clip.path.display()
        ));
    }
    details
}
