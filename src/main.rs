use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use vira::models::{AnalysisResult, SubscriptionTier, ThemeMode};
use vira::services::media::{normalize_asset, probe_file, FfmpegThumbnailer};
use vira::services::quota::format_duration_limit;
use vira::services::MockBilling;
use vira::{App, AppError, Config, GeminiClient};

#[derive(Parser, Debug)]
#[command(name = "vira", version, about = "Virality analysis for short-form content")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scores a photo or video for viral potential.
    Analyze {
        path: PathBuf,
        /// Overrides the probed video duration.
        #[arg(long)]
        duration_secs: Option<u32>,
    },

    /// Generates titles, captions and hashtags for a topic.
    Metadata { topic: String },

    /// Browses stored results.
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Shows this month's usage against the plan limits.
    Usage,

    Subscription {
        #[command(subcommand)]
        command: SubscriptionCommand,
    },

    Theme {
        #[command(subcommand)]
        command: ThemeCommand,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    List {
        /// Only photo and video results.
        #[arg(long, conflicts_with = "metadata")]
        scans: bool,
        /// Only topic results.
        #[arg(long)]
        metadata: bool,
        #[arg(long)]
        search: Option<String>,
    },
    Show { id: String },
    Delete { id: String },
    Clear,
}

#[derive(Subcommand, Debug)]
enum SubscriptionCommand {
    Status,
    Purchase { tier: SubscriptionTier },
    Restore,
    Logout,
    /// Development override of the current tier.
    SetTier { tier: SubscriptionTier },
}

#[derive(Subcommand, Debug)]
enum ThemeCommand {
    Show,
    Set { mode: ThemeMode },
    Toggle,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    init_logging(&config).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let generator = GeminiClient::new(config.gemini_api_key.clone().unwrap_or_default())
        .with_base_url(config.gemini_base_url.clone())
        .with_model(config.gemini_model.clone());
    let provider = MockBilling::new(config.mock_tier, config.mock_latency, config.mock_failure_rate);

    let app = App::load(
        &config.data_dir,
        Arc::new(generator),
        Arc::new(provider),
        config.analysis_timeout,
    )
    .await
    .context("Failed to load stored state")?;
    app.initialize().await?;

    match cli.command {
        Command::Analyze { path, duration_secs } => {
            config.require_api_key()?;
            let asset = probe_file(&path)
                .await
                .with_context(|| format!("Could not open {}", path.display()))?;
            let thumbnailer = FfmpegThumbnailer::new(config.thumbnail_dir());
            let mut input = normalize_asset(asset, &thumbnailer).await?;
            if let Some(secs) = duration_secs {
                input = input.with_duration(secs);
            }
            run_analysis(&app, input).await
        }
        Command::Metadata { topic } => {
            config.require_api_key()?;
            run_analysis(&app, vira::AnalysisInput::text(topic)).await
        }
        Command::History { command } => history(&app, command).await,
        Command::Usage => {
            let tier = app.subscription.tier().await;
            let usage = app.subscription.usage().await;
            let limits = tier.config();
            println!("Plan:       {}", tier);
            println!(
                "Analyses:   {} of {} used ({} left)",
                usage.analyses_this_month,
                limits.monthly_limit,
                app.subscription.remaining_analyses().await
            );
            println!("Max video:  {}", format_duration_limit(limits.max_video_duration));
            println!("Month of:   {}", usage.month_start.format("%B %Y"));
            if let Some(last) = usage.last_analysis_at {
                println!("Last used:  {}", last.format("%Y-%m-%d %H:%M UTC"));
            }
            Ok(())
        }
        Command::Subscription { command } => subscription(&app, command).await,
        Command::Theme { command } => {
            let mode = match command {
                ThemeCommand::Show => app.theme.mode().await,
                ThemeCommand::Set { mode } => {
                    app.theme.set_theme(mode).await?;
                    mode
                }
                ThemeCommand::Toggle => app.theme.toggle_theme().await?,
            };
            let dark = app.theme.is_dark(config.system_prefers_dark).await;
            println!("{} ({})", mode, if dark { "dark" } else { "light" });
            Ok(())
        }
    }
}

async fn run_analysis(app: &App, input: vira::AnalysisInput) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling analysis");
            on_interrupt.cancel();
        }
    });

    let mut progress = app.analysis.subscribe();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow_and_update().clone();
            if !snapshot.message.is_empty() {
                eprintln!("{}", snapshot.message);
            }
        }
    });

    let outcome = app.analyze(input, &cancel).await;
    reporter.abort();

    match outcome {
        Ok(result) => {
            print_result(&result);
            Ok(())
        }
        Err(AppError::QuotaDenied(reason)) => bail!(reason),
        Err(e) if e.is_retryable() => {
            bail!("{}\nThis can be retried: run the same command again.", e)
        }
        Err(e) => Err(e.into()),
    }
}

async fn history(app: &App, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List { scans, metadata, search } => {
            let items = match (&search, scans, metadata) {
                (Some(query), _, _) => app.analysis.search_history(query).await,
                (None, true, _) => app.analysis.scans().await,
                (None, _, true) => app.analysis.metadata_history().await,
                _ => app.analysis.history().await,
            };
            if items.is_empty() {
                println!("No results yet.");
            }
            for item in items {
                let label = item
                    .input
                    .file_name
                    .as_deref()
                    .or(item.input.text.as_deref())
                    .unwrap_or("untitled");
                println!(
                    "{}  {:>3}  {:<8}  {}  {}",
                    item.id,
                    item.display_score(),
                    item.viral_potential.to_string(),
                    item.created_at.format("%Y-%m-%d %H:%M"),
                    label
                );
            }
        }
        HistoryCommand::Show { id } => match app.analysis.get_result_by_id(&id).await {
            Some(result) => print_result(&result),
            None => bail!("No result with id {}", id),
        },
        HistoryCommand::Delete { id } => {
            if !app.analysis.delete_from_history(&id).await? {
                bail!("No result with id {}", id);
            }
            println!("Deleted {}", id);
        }
        HistoryCommand::Clear => {
            app.analysis.clear_history().await?;
            println!("History cleared.");
        }
    }
    Ok(())
}

async fn subscription(app: &App, command: SubscriptionCommand) -> Result<()> {
    let sub = &app.subscription;
    match command {
        SubscriptionCommand::Status => {}
        SubscriptionCommand::Purchase { tier } => {
            sub.purchase(tier).await?;
        }
        SubscriptionCommand::Restore => {
            sub.restore_purchases().await?;
        }
        SubscriptionCommand::Logout => sub.logout().await?,
        SubscriptionCommand::SetTier { tier } => sub.set_tier(tier).await,
    }

    let tier = sub.tier().await;
    println!("Plan:    {} ({})", tier, if sub.is_active().await { "active" } else { "inactive" });
    if let Some(price) = tier.config().price {
        println!("Price:   {}", price);
    }
    if let Some(expires) = sub.expires_at().await {
        println!("Renews:  {}", expires.format("%Y-%m-%d"));
    }
    for feature in tier.config().features {
        println!("  - {}", feature);
    }
    Ok(())
}

fn print_result(result: &AnalysisResult) {
    println!("Score:          {}/100", result.display_score());
    println!("Viral potential: {}", result.viral_potential);
    println!("Hook strength:  {}", result.hook_strength);
    println!("Pacing:         {}", result.pacing);
    if !result.keywords.is_empty() {
        println!("Keywords:       {}", result.keywords.join(", "));
    }
    if !result.improvements.is_empty() {
        println!("Improvements:");
        for tip in &result.improvements {
            println!("  - {}", tip);
        }
    }

    let seo = &result.seo;
    if !seo.titles.is_empty() {
        println!("Titles:");
        for title in &seo.titles {
            println!("  - {}", title);
        }
    }
    if !seo.caption.is_empty() {
        println!("Caption:        {}", seo.caption);
    }
    if !seo.hashtags.is_empty() {
        println!("Hashtags:       {}", seo.hashtags.join(" "));
    }
    if let Some(filename) = &seo.filename {
        println!("Filename:       {}", filename);
    }
    if let Some(platforms) = &seo.platforms {
        for (name, variant) in [
            ("TikTok", &platforms.tiktok),
            ("Instagram", &platforms.instagram),
            ("YouTube", &platforms.youtube),
        ] {
            if let Some(variant) = variant {
                println!("{}: {}", name, variant.title);
                if !variant.description.is_empty() {
                    println!("  {}", variant.description);
                }
                if !variant.tags.is_empty() {
                    println!("  {}", variant.tags.join(" "));
                }
            }
        }
    }
    println!("Id:             {}", result.id);
}

// Logs go to stderr so stdout only carries command output
fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "info,vira=debug".to_string()
        } else {
            "info,vira=info,reqwest=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Log level: {}", log_level);
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        model = %config.gemini_model,
        gemini = config.gemini_api_key.is_some(),
        mock_tier = %config.mock_tier,
        "Configuration loaded"
    );
    Ok(())
}
