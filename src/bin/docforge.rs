use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use docforge::{
    Compositor, DocumentKind, DocumentRecord, FontLibrary, FsAssetSource, GenOptions,
    RecordGenerator, RenderOptions, TemplateSet, encode_png, to_png_data_url,
};

#[derive(Parser, Debug)]
#[command(name = "docforge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a random record as JSON.
    Random(RandomArgs),
    /// Render a record to a PNG document image.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct RandomArgs {
    /// Document kind to generate.
    #[arg(long, value_enum)]
    kind: KindChoice,

    /// Deterministic RNG seed; omitted means OS entropy.
    #[arg(long)]
    seed: Option<u64>,

    /// Output JSON path; omitted prints to stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Document kind to render.
    #[arg(long, value_enum)]
    kind: KindChoice,

    /// Record JSON produced by `docforge random` (or hand-written). A
    /// random record is generated when omitted.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Directory holding `<kind>.png` templates and optional `hologram.png`.
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// Photo image attached to the record.
    #[arg(long)]
    photo: Option<PathBuf>,

    /// Font files to register (first is the default face).
    #[arg(long = "font")]
    fonts: Vec<PathBuf>,

    /// Template configuration JSON overriding the built-in set.
    #[arg(long)]
    template_config: Option<PathBuf>,

    /// Seed for grain noise and (when no record is given) record generation.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Print a base64 data URL to stdout instead of writing the PNG.
    #[arg(long)]
    data_url: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindChoice {
    IdCard,
    DrivingLicense,
    Passport,
    Visa,
}

impl From<KindChoice> for DocumentKind {
    fn from(choice: KindChoice) -> Self {
        match choice {
            KindChoice::IdCard => DocumentKind::IdCard,
            KindChoice::DrivingLicense => DocumentKind::DrivingLicense,
            KindChoice::Passport => DocumentKind::Passport,
            KindChoice::Visa => DocumentKind::Visa,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Random(args) => cmd_random(args),
        Command::Render(args) => cmd_render(args).await,
    }
}

fn cmd_random(args: RandomArgs) -> anyhow::Result<()> {
    let record = generate_record(args.kind.into(), args.seed)?;
    let json = serde_json::to_string_pretty(&record).context("serialize record")?;
    match args.out {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("write record '{}'", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let kind: DocumentKind = args.kind.into();

    let mut record = match &args.record {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("read record '{}'", path.display()))?;
            let record: DocumentRecord =
                serde_json::from_slice(&bytes).context("parse record JSON")?;
            anyhow::ensure!(
                record.kind == kind,
                "record is for {}, requested {kind}",
                record.kind
            );
            record
        }
        None => generate_record(kind, Some(args.seed))?,
    };

    if let Some(path) = &args.photo {
        record.photo = Some(
            std::fs::read(path).with_context(|| format!("read photo '{}'", path.display()))?,
        );
    }

    let fonts = if args.fonts.is_empty() {
        FontLibrary::empty()
    } else {
        FontLibrary::load(&args.fonts)?
    };

    let templates = match &args.template_config {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("read template config '{}'", path.display()))?;
            TemplateSet::from_json_slice(&bytes)?
        }
        None => TemplateSet::builtin(),
    };

    let mut compositor = Compositor::with_templates(fonts, templates)?;
    let source = FsAssetSource::new(&args.assets);
    let opts = RenderOptions {
        grain_seed: args.seed,
        with_post: true,
    };

    let frame = compositor.render(&record, &source, &opts).await?;

    if args.data_url {
        println!("{}", to_png_data_url(&frame)?);
        return Ok(());
    }

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let png = encode_png(&frame)?;
    std::fs::write(&args.out, png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn generate_record(kind: DocumentKind, seed: Option<u64>) -> anyhow::Result<DocumentRecord> {
    let mut generator = match seed {
        Some(seed) => RecordGenerator::seeded(seed),
        None => RecordGenerator::from_entropy(),
    };
    Ok(generator.generate(kind, &GenOptions::default())?)
}
