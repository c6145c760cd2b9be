use std::{
    fs::File,
    io::{BufReader, Read as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use rendersetup::{DEFAULT_LEGACY_LAYER, Engine, EngineConfig, MergeMode, Scene, SceneSnapshot};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rendersetup", version)]
struct Cli {
    /// Engine configuration JSON.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List render layer names.
    Layers(Inputs),
    /// Switch to a layer and write the evaluated scene.
    Apply(ApplyArgs),
    /// List the collections whose members include the given objects.
    Find(FindArgs),
    /// Filter objects by render layer membership.
    Members(MembersArgs),
    /// Print the legacy render-layer node backing a layer.
    LegacyLayer(LegacyLayerArgs),
    /// Decode a document into the render setup and write the result.
    Import(ImportArgs),
}

#[derive(Args, Debug)]
struct Inputs {
    /// Scene snapshot JSON; an empty scene when omitted.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Render-setup document JSON.
    #[arg(long)]
    setup: PathBuf,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    #[command(flatten)]
    inputs: Inputs,

    /// Layer to make visible (`defaultRenderLayer` for none).
    #[arg(long)]
    layer: String,

    /// Output path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FindArgs {
    #[command(flatten)]
    inputs: Inputs,

    /// Objects to look up.
    #[arg(long = "object", required = true)]
    objects: Vec<String>,

    /// Layers to search; every layer when omitted.
    #[arg(long = "layer")]
    layers: Vec<String>,

    /// List each owning layer before its collections.
    #[arg(long)]
    include_layers: bool,
}

#[derive(Args, Debug)]
struct MembersArgs {
    #[command(flatten)]
    inputs: Inputs,

    /// Layers to test membership against.
    #[arg(long = "layer", required = true)]
    layers: Vec<String>,

    /// Objects to filter; every scene node when omitted.
    #[arg(long = "object")]
    objects: Vec<String>,

    /// Keep the objects that are in none of the layers.
    #[arg(long)]
    not_in: bool,
}

#[derive(Args, Debug)]
struct LegacyLayerArgs {
    /// Render-setup document JSON.
    #[arg(long)]
    setup: PathBuf,

    /// Layer name.
    #[arg(long)]
    layer: String,
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[command(flatten)]
    inputs: Inputs,

    /// Document to decode.
    #[arg(long)]
    file: PathBuf,

    /// How the document combines with the loaded render setup.
    #[arg(long, default_value_t = MergeMode::Overwrite)]
    mode: MergeMode,

    /// Output document path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => EngineConfig::default(),
    };
    match cli.cmd {
        Command::Layers(args) => cmd_layers(args, config),
        Command::Apply(args) => cmd_apply(args, config),
        Command::Find(args) => cmd_find(args, config),
        Command::Members(args) => cmd_members(args, config),
        Command::LegacyLayer(args) => cmd_legacy_layer(args, config),
        Command::Import(args) => cmd_import(args, config),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("RENDERSETUP_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    let f = File::open(path).with_context(|| format!("open '{}'", path.display()))?;
    let mut text = String::new();
    BufReader::new(f)
        .read_to_string(&mut text)
        .with_context(|| format!("read '{}'", path.display()))?;
    Ok(text)
}

fn load_engine(inputs: &Inputs, config: EngineConfig) -> anyhow::Result<Engine> {
    let scene = match &inputs.scene {
        Some(path) => {
            let snap = SceneSnapshot::from_path(path)?;
            Scene::from_snapshot(&snap)
                .with_context(|| format!("build scene from '{}'", path.display()))?
        }
        None => Scene::new(),
    };
    let mut engine = Engine::new(scene, config)?;
    let text = read_text(&inputs.setup)?;
    let report = engine
        .import_json(&text, MergeMode::Overwrite)
        .with_context(|| format!("decode render setup '{}'", inputs.setup.display()))?;
    for w in &report.warnings {
        eprintln!("warning: {w}");
    }
    Ok(engine)
}

fn write_output(out: Option<&Path>, text: &str) -> anyhow::Result<()> {
    let Some(out) = out else {
        println!("{text}");
        return Ok(());
    };
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(out, text).with_context(|| format!("write '{}'", out.display()))?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn strs(v: &[String]) -> Vec<&str> {
    v.iter().map(String::as_str).collect()
}

fn cmd_layers(args: Inputs, config: EngineConfig) -> anyhow::Result<()> {
    let engine = load_engine(&args, config)?;
    for name in engine.render_layers() {
        println!("{name}");
    }
    Ok(())
}

fn cmd_apply(args: ApplyArgs, config: EngineConfig) -> anyhow::Result<()> {
    let mut engine = load_engine(&args.inputs, config)?;
    let layer = if args.layer == DEFAULT_LEGACY_LAYER {
        None
    } else {
        let id = engine
            .setup()
            .layer_by_name(&args.layer)
            .with_context(|| format!("unknown render layer '{}'", args.layer))?;
        Some(id)
    };
    engine.switch_to_layer(layer)?;
    let snap = engine.scene().evaluated_snapshot()?;
    write_output(args.out.as_deref(), &snap.to_json_pretty()?)
}

fn cmd_find(args: FindArgs, config: EngineConfig) -> anyhow::Result<()> {
    let mut engine = load_engine(&args.inputs, config)?;
    let found = engine.find(&strs(&args.objects), &strs(&args.layers), args.include_layers)?;
    for name in found {
        println!("{name}");
    }
    Ok(())
}

fn cmd_members(args: MembersArgs, config: EngineConfig) -> anyhow::Result<()> {
    let mut engine = load_engine(&args.inputs, config)?;
    let members =
        engine.render_layer_members(&strs(&args.objects), &strs(&args.layers), args.not_in)?;
    for name in members {
        println!("{name}");
    }
    Ok(())
}

fn cmd_legacy_layer(args: LegacyLayerArgs, config: EngineConfig) -> anyhow::Result<()> {
    let inputs = Inputs {
        scene: None,
        setup: args.setup,
    };
    let engine = load_engine(&inputs, config)?;
    println!("{}", engine.legacy_layer(&args.layer)?);
    Ok(())
}

fn cmd_import(args: ImportArgs, config: EngineConfig) -> anyhow::Result<()> {
    let mut engine = load_engine(&args.inputs, config)?;
    let text = read_text(&args.file)?;
    let report = engine
        .import_json(&text, args.mode)
        .with_context(|| format!("decode '{}'", args.file.display()))?;
    for w in &report.warnings {
        eprintln!("warning: {w}");
    }
    eprintln!(
        "imported {} layer(s) ({}, {} migrated)",
        report.layers.len(),
        args.mode,
        report.migrated
    );
    write_output(Some(&args.out), &engine.to_json()?)
}
