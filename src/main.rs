use clap::{Parser, Subcommand};
use rwd_image::engine::{Attributes, RenderFormat, RenderRequest, ResponsiveImages};
use rwd_image::media::{ImageRef, JsonMediaLibrary, RequestContext};
use rwd_image::resolve::Overrides;
use rwd_image::{config, output};
use std::path::{Path, PathBuf};

/// The request a render happens in.
#[derive(clap::Args, Clone)]
struct RequestArgs {
    /// Render as if serving a secure (https) request
    #[arg(long)]
    secure: bool,

    /// Host of the request; base URLs on this host are upgraded to https
    /// when --secure is set
    #[arg(long, default_value = "")]
    host: String,
}

impl RequestArgs {
    fn context(&self) -> RequestContext {
        RequestContext {
            secure: self.secure,
            host: self.host.clone(),
        }
    }
}

#[derive(Parser)]
#[command(name = "rwd-image")]
#[command(about = "Responsive image markup from declared sizes")]
#[command(long_about = "\
Responsive image markup from declared sizes

Sizes and responsive sets are declared in a TOML file. At render time a set
is resolved against the host's media library: for each breakpoint the engine
picks the pre-generated variant of the primary image (or of a per-breakpoint
override), never upscaling past the primary image's own resolution, and fills
the breakpoint's templates.

Inputs:

  sizes.toml     # sizes, magnifications, responsive sets and templates
  media.json     # the media library: base URL plus per-image metadata

Problems that do not stop rendering (unknown size, missing variant) are
emitted as HTML comments in front of the markup.

Run 'rwd-image gen-config' to generate a documented sizes.toml.")]
#[command(version)]
struct Cli {
    /// Size config file; repeat to layer several, later files win
    #[arg(long = "config", default_value = "sizes.toml", global = true)]
    configs: Vec<PathBuf>,

    /// Media library manifest
    #[arg(long, default_value = "media.json", global = true)]
    media: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the size config and list what it registers
    Check,
    /// Render markup for one image
    Render {
        /// Size (responsive set) key
        size: String,
        /// Primary image id
        image: u64,
        /// Per-breakpoint override image, as BREAKPOINT=ID (repeatable)
        #[arg(long = "override", value_parser = parse_override)]
        overrides: Vec<(String, u64)>,
        #[arg(long, value_enum, default_value_t = FormatArg::Picture)]
        format: FormatArg,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        alt: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        context: RequestArgs,
    },
    /// Render every request in a JSON file, in parallel
    Batch {
        /// JSON array of render requests
        requests: PathBuf,
        #[command(flatten)]
        context: RequestArgs,
    },
    /// Print a stock sizes.toml with all options documented
    GenConfig,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum FormatArg {
    Picture,
    Img,
    Background,
}

impl From<FormatArg> for RenderFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Picture => RenderFormat::Picture,
            FormatArg::Img => RenderFormat::Img,
            FormatArg::Background => RenderFormat::Background,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Check => {
            let config = load_config(&cli.configs)?;
            let registry = config.build_registry()?;
            output::print_check_output(&registry);
        }
        Command::Render {
            size,
            image,
            overrides,
            format,
            class,
            alt,
            title,
            context,
        } => {
            let engine = build_engine(&cli.configs, &cli.media)?;
            let request = RenderRequest {
                size,
                image: ImageRef::Id(image),
                overrides: overrides
                    .into_iter()
                    .map(|(breakpoint, id)| (breakpoint, ImageRef::Id(id)))
                    .collect::<Overrides>(),
                attributes: Attributes { class, alt, title },
                format: format.into(),
            };
            println!("{}", engine.render(&request, &context.context()));
        }
        Command::Batch { requests, context } => {
            let config = load_config(&cli.configs)?;
            init_thread_pool(&config.processing);
            let engine = ResponsiveImages::new(
                config.build_registry()?,
                JsonMediaLibrary::load(&cli.media)?,
            );
            let content = std::fs::read_to_string(&requests)?;
            let requests: Vec<RenderRequest> = serde_json::from_str(&content)?;
            let rendered = engine.render_batch(&requests, &context.context());
            output::print_batch_output(&requests, &rendered, engine.metadata_stats());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_config(paths: &[PathBuf]) -> Result<config::RwdConfig, config::ConfigError> {
    let paths: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
    config::load_layered(&paths)
}

fn build_engine(
    configs: &[PathBuf],
    media: &Path,
) -> Result<ResponsiveImages<JsonMediaLibrary>, Box<dyn std::error::Error>> {
    let registry = load_config(configs)?.build_registry()?;
    Ok(ResponsiveImages::new(registry, JsonMediaLibrary::load(media)?))
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Parse a `BREAKPOINT=ID` override.
fn parse_override(value: &str) -> Result<(String, u64), String> {
    let (breakpoint, id) = value
        .split_once('=')
        .ok_or_else(|| format!("expected BREAKPOINT=ID, got '{value}'"))?;
    if breakpoint.is_empty() {
        return Err(format!("missing breakpoint in '{value}'"));
    }
    let id = id
        .parse()
        .map_err(|_| format!("image id must be a number, got '{id}'"))?;
    Ok((breakpoint.to_string(), id))
}
