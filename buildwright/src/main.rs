use anyhow::{Context, Result};
use buildwright::cancellation::CancellationToken;
use buildwright::config::PipelineConfig;
use buildwright::events::LoggingEventSink;
use buildwright::generators::{ArtifactGenerator, ContainerFileGenerator, WorkflowGenerator};
use buildwright::observability::{init_logging, parse_level, LogFormat};
use buildwright::pipeline::Orchestrator;
use buildwright::review::{ChatAssistant, CodeReviewer, DEFAULT_MESSAGE};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Generates CI/CD artifacts, builds the container image and predicts build health
#[derive(Parser, Debug)]
#[command(name = "buildwright", version, about)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, value_name = "FILE", help = "TOML configuration file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "pretty", help = "Log format: pretty or json")]
    log_format: LogFormat,

    #[arg(long, global = true, default_value = "info", value_name = "LEVEL", help = "Log level")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate artifacts, build the image and request a prediction
    Run(RunArgs),
    /// Review the changed files of a pull request
    Review(PullRequestArgs),
    /// Ask the chat assistant about a pull request
    Chat(ChatArgs),
    /// Print the rendered workflow and container build file
    Render,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, help = "Image tag to build")]
    image_tag: Option<String>,

    #[arg(long, help = "Container engine executable")]
    engine: Option<String>,

    #[arg(long, value_name = "DIR", help = "Directory artifacts are written under")]
    output_root: Option<PathBuf>,

    #[arg(long, help = "Print the full run report as JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct PullRequestArgs {
    #[arg(long, value_name = "OWNER/NAME", help = "Repository")]
    repository: Option<String>,

    #[arg(long, value_name = "NUMBER", help = "Pull request number")]
    pull_request: Option<u64>,

    #[arg(long, help = "Print the result as JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct ChatArgs {
    #[command(flatten)]
    target: PullRequestArgs,

    #[arg(long, short, help = "Message to send")]
    message: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(args.log_format, parse_level(&args.log_level));
    debug!("Arguments: {:?}", args);

    let code = match execute(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            1
        }
    };
    process::exit(code);
}

async fn execute(args: CliArgs) -> Result<i32> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!(error = %e, "Ignoring unreadable .env file");
        }
    }

    let mut config = PipelineConfig::load(args.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;

    let token = Arc::new(CancellationToken::new());
    watch_ctrl_c(Arc::clone(&token));

    match args.command {
        Commands::Run(run) => {
            if let Some(tag) = run.image_tag {
                config.build.image_tag = tag;
            }
            if let Some(engine) = run.engine {
                config.build.engine = engine;
            }
            if let Some(root) = run.output_root {
                config.output.root = root;
            }
            config.validate()?;
            handle_run(&config, token, run.json).await
        }
        Commands::Review(target) => {
            apply_target(&mut config, &target);
            let reviewer = CodeReviewer::from_config(&config, token)?;
            let reviews = reviewer.run().await?;
            if target.json {
                println!("{}", serde_json::to_string_pretty(&reviews)?);
            } else {
                for review in &reviews {
                    println!("{}\n", review.to_comment());
                }
                println!("Posted {} review comment(s)", reviews.len());
            }
            Ok(0)
        }
        Commands::Chat(chat) => {
            apply_target(&mut config, &chat.target);
            let assistant = ChatAssistant::from_config(&config, token)?;
            let message = chat.message.as_deref().unwrap_or(DEFAULT_MESSAGE);
            let outcome = assistant.run(message, None).await?;
            if chat.target.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.comment);
            }
            Ok(0)
        }
        Commands::Render => {
            config.validate()?;
            let generators: [Box<dyn ArtifactGenerator>; 2] = [
                Box::new(WorkflowGenerator::from_config(&config)),
                Box::new(ContainerFileGenerator::from_config(&config)),
            ];
            for generator in &generators {
                let artifact = generator.render();
                println!("# {} ({})\n{}", artifact.path.display(), artifact.digest(), artifact.content);
            }
            Ok(0)
        }
    }
}

async fn handle_run(config: &PipelineConfig, token: Arc<CancellationToken>, json: bool) -> Result<i32> {
    let orchestrator = Orchestrator::from_config(config, token)
        .context("failed to set up the pipeline")?
        .with_event_sink(Arc::new(LoggingEventSink::debug()));
    let report = orchestrator.run().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in report.status_lines() {
            println!("{line}");
        }
        println!("{}", report.summary());
    }
    // Phase failures are reported, not signalled through the exit code.
    Ok(0)
}

fn apply_target(config: &mut PipelineConfig, target: &PullRequestArgs) {
    if let Some(repository) = &target.repository {
        config.source_hosting.repository = Some(repository.clone());
    }
    if let Some(number) = target.pull_request {
        config.source_hosting.pull_request = Some(number);
    }
}

fn watch_ctrl_c(token: Arc<CancellationToken>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the run");
            token.cancel("interrupted by user");
        }
    });
}
