use anyhow::{bail, Context, Result};
use audiogen::{
    ApiToken, Error, GenerationRequest, HubClient, HubToken, LocalRuntime, ModelRef,
    OutputLayout, Pipeline, ReplicateClient, ToneModel,
};
use clap::{Args, Parser, Subcommand};
use genconf::AudiogenConfig;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::time::Duration;

mod telemetry;

const DEFAULT_DESCRIPTION: &str = "heavenly flowing pad";

/// Generate audio clips from text descriptions
#[derive(Parser, Debug)]
#[command(name = "audiogen", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of ./audiogen.toml
    #[arg(long, global = true, env = "AUDIOGEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a clip on the hosted prediction API (default)
    Generate(GenerateArgs),
    /// Render a clip with the local engine after hub setup
    Local(LocalArgs),
    /// Check hub credentials and gated model access
    Auth,
    /// Look up the configured model on the prediction API
    Check,
    /// Print the effective configuration as TOML
    Config {
        /// Also list the files and env vars that contributed
        #[arg(long)]
        sources: bool,
    },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// What the clip should sound like
    #[arg(short, long)]
    description: Option<String>,

    /// Clip length in seconds
    #[arg(long, default_value_t = 1)]
    duration: u32,

    /// Seconds to wait for the prediction (defaults to config)
    #[arg(long)]
    timeout: Option<u64>,

    /// Directory to write into (defaults to config)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl Default for GenerateArgs {
    fn default() -> Self {
        Self {
            description: None,
            duration: 1,
            timeout: None,
            output_dir: None,
        }
    }
}

#[derive(Args, Debug)]
struct LocalArgs {
    #[arg(short, long, default_value = DEFAULT_DESCRIPTION)]
    description: String,

    #[arg(long, default_value_t = 1)]
    duration: u32,

    /// Output file (defaults to the configured layout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; variables may come from the shell.
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        if !path.exists() {
            bail!("Config file {} does not exist", path.display());
        }
    }

    let (config, sources) = AudiogenConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    telemetry::init(&config.telemetry.log_level)?;

    let command = cli
        .command
        .unwrap_or(Command::Generate(GenerateArgs::default()));

    match command {
        Command::Generate(args) => generate(&config, args).await,
        Command::Local(args) => local(&config, args).await,
        Command::Auth => auth(&config).await,
        Command::Check => check(&config).await,
        Command::Config { sources: show } => {
            print!("{}", config.to_toml());
            if show {
                println!();
                if sources.files.is_empty() {
                    println!("# files: none (compiled defaults)");
                }
                for file in &sources.files {
                    println!("# file: {}", file.display());
                }
                for var in &sources.env_overrides {
                    println!("# env: {var}");
                }
            }
            Ok(())
        }
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn generate(config: &AudiogenConfig, args: GenerateArgs) -> Result<()> {
    let token = ApiToken::from_env().context("Cannot reach the prediction API")?;

    let description = args.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION);
    let request = GenerationRequest::new(description, args.duration)?;

    let mut pipeline = Pipeline::from_config(config, token)?;
    if let Some(secs) = args.timeout {
        pipeline = pipeline.with_timeout(Duration::from_secs(secs));
    }
    if let Some(dir) = args.output_dir {
        pipeline = pipeline.with_layout(OutputLayout::new(dir, &config.output.filename_template));
    }

    println!(
        "🎵 Generating {}s of {}",
        request.duration(),
        request.description().bright_cyan()
    );
    println!("   model: {}", config.remote.model.dimmed());
    println!("   timeout: {}s", pipeline.timeout().as_secs());

    let pb = spinner("Waiting for prediction...".to_string());
    let outcome = pipeline.generate(&request).await;
    pb.finish_and_clear();

    match outcome {
        Ok(audio) => {
            println!(
                "{} Saved {} ({} bytes)",
                "✓".green(),
                audio.path.display().bright_white(),
                audio.bytes
            );
            Ok(())
        }
        Err(e) => {
            if e.is_transient() {
                eprintln!(
                    "{} This may succeed if you run the same command again.",
                    "💡".yellow()
                );
            }
            Err(anyhow::Error::new(e).context("Generation failed"))
        }
    }
}

async fn local(config: &AudiogenConfig, args: LocalArgs) -> Result<()> {
    let request = GenerationRequest::new(args.description, args.duration)?;
    let token = HubToken::from_env().context("Local setup needs a hub token")?;
    let hub = HubClient::new(config.hub.endpoint.clone(), token)?;

    let engine = ToneModel::new(config.local.sample_rate);
    let runtime = LocalRuntime::setup(
        &hub,
        &config.hub.model_id,
        &config.hub.config_file,
        Box::new(engine),
    )
    .await
    .context("Local engine setup failed")?;

    println!(
        "{} Authenticated as {}",
        "✓".green(),
        runtime.user().bright_white()
    );

    let path = args
        .output
        .unwrap_or_else(|| OutputLayout::from_config(&config.output).path_for(&request));

    let written = tokio::task::spawn_blocking(move || runtime.generate_to(&request, &path))
        .await
        .context("Local generation task panicked")?
        .context("Local generation failed")?;

    println!("{} Saved {}", "✓".green(), written.display().bright_white());
    Ok(())
}

async fn auth(config: &AudiogenConfig) -> Result<()> {
    let token = HubToken::from_env()?;
    println!("Token found in {}", token.source().bright_yellow());

    let hub = HubClient::new(config.hub.endpoint.clone(), token)?;
    let user = hub.whoami().await.context("Hub authentication failed")?;
    println!("{} Logged in as {}", "✓".green(), user.name.bright_white());

    let model_id = &config.hub.model_id;
    match hub.model_info(model_id).await {
        Ok(info) => match &info.gated {
            Some(mode) => println!("{} {} is gated ({mode})", "•".cyan(), info.id),
            None => println!("{} {} is public", "•".cyan(), info.id),
        },
        Err(e) => println!("{} Could not read model info: {e}", "✗".red()),
    }

    match hub.check_file_access(model_id, &config.hub.config_file).await {
        Ok(()) => {
            println!("{} Access to {} confirmed", "✓".green(), config.hub.config_file);
            Ok(())
        }
        Err(e @ Error::GatedModel { .. }) => {
            eprintln!(
                "{} Visit {}/{} to request access",
                "💡".yellow(),
                config.hub.endpoint,
                model_id
            );
            Err(e.into())
        }
        Err(e) => Err(anyhow::Error::new(e).context("Model file check failed")),
    }
}

async fn check(config: &AudiogenConfig) -> Result<()> {
    let token = ApiToken::from_env()?;
    println!("Token: {}", token.to_string().dimmed());

    let model = ModelRef::parse(&config.remote.model, config.remote.deployment)?;
    let (owner, name) = model.owner_and_name();
    let client = ReplicateClient::new(config.remote.api_base.clone(), token)?;

    let info = client
        .model_info(owner, name)
        .await
        .context("Model lookup failed")?;

    println!("{} {}/{}", "✓".green(), info.owner, info.name.bright_white());
    if let Some(description) = &info.description {
        println!("   {description}");
    }
    match (&info.latest_version, &model) {
        (Some(latest), ModelRef::Version { version, .. }) if &latest.id != version => {
            println!(
                "   {} pinned version {} is not the latest ({})",
                "!".yellow(),
                version,
                latest.id
            );
        }
        (Some(latest), _) => println!("   latest version: {}", latest.id),
        (None, _) => println!("   no published versions"),
    }
    Ok(())
}
