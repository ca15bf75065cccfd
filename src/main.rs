// src/main.rs

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use xlikes::auth::cancel_on;
use xlikes::config::{parse_time_zone, CollectArgs, Command, CommandLineInput};
use xlikes::constants::TOKEN_EXPIRY_SKEW_SECS;
use xlikes::{
    run_with_refresh, AppPaths, Collector, CollectorConfig, CredentialSet, CredentialStore,
    CursorStore, HttpTransport, JsonlSink, LikesApi, OAuthConfig, PaginationMode,
    RateLimitedTransport, RawSnapshots, ReqwestTransport, TokenLifecycle,
};

/// Sets up logging configuration.
fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let log_file_path = std::env::temp_dir().join("xlikes.log");
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pattern = if verbose {
        "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}"
    } else {
        "{m}{n}"
    };

    let stdout_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}",
        )))
        .build(&log_file_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout_appender)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(log_level),
        )?;

    log4rs::init_config(config)?;
    log::debug!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

fn token_lifecycle(
    paths: &AppPaths,
    transport: Arc<dyn HttpTransport>,
) -> anyhow::Result<TokenLifecycle> {
    let oauth = OAuthConfig::from_env()?;
    Ok(TokenLifecycle::new(
        oauth,
        transport,
        CredentialStore::new(&paths.tokens_file),
    ))
}

fn report_tokens(paths: &AppPaths, credentials: &CredentialSet) {
    println!(
        "✓ Tokens saved to {} (access {}, refresh {})",
        paths.tokens_file.display(),
        credentials.access_token.masked(),
        credentials
            .refresh_token
            .as_ref()
            .map(|t| t.masked())
            .unwrap_or_else(|| "none".to_string())
    );
}

async fn authorize(
    paths: &AppPaths,
    transport: Arc<dyn HttpTransport>,
    timeout_secs: u64,
) -> anyhow::Result<()> {
    let lifecycle = token_lifecycle(paths, transport)?;
    let cancel = cancel_on(tokio::signal::ctrl_c());
    let credentials = lifecycle
        .authorize(Duration::from_secs(timeout_secs), cancel, |url| {
            println!("Open this URL in your browser to authorize:\n\n{}\n", url);
            println!("Waiting up to {}s for the redirect…", timeout_secs);
        })
        .await?;
    report_tokens(paths, &credentials);
    Ok(())
}

async fn refresh(paths: &AppPaths, transport: Arc<dyn HttpTransport>) -> anyhow::Result<()> {
    let lifecycle = token_lifecycle(paths, transport)?;
    let credentials = lifecycle.refresh_stored().await?;
    report_tokens(paths, &credentials);
    Ok(())
}

async fn collect(
    paths: &AppPaths,
    transport: Arc<dyn HttpTransport>,
    args: &CollectArgs,
) -> anyhow::Result<()> {
    let tz = parse_time_zone(&args.tz)?;
    let lifecycle = token_lifecycle(paths, transport.clone())?;

    let mut credentials = lifecycle.store().load()?;
    if credentials.is_expired_at(Utc::now(), TOKEN_EXPIRY_SKEW_SECS)
        && credentials.refresh_token.is_some()
    {
        log::info!("Stored access token has expired; refreshing first");
        credentials = lifecycle.refresh_stored().await?;
    }

    let config = CollectorConfig {
        pagination_mode: if args.mode.since {
            PaginationMode::Since
        } else {
            PaginationMode::Full
        },
        ..CollectorConfig::default()
    };

    let sink = JsonlSink::open(&paths.data_dir, tz)
        .with_context(|| format!("opening output files in {}", paths.data_dir.display()))?;
    let api = LikesApi::new(
        RateLimitedTransport::new(transport),
        config,
        credentials.access_token,
    );
    let mut collector = Collector::new(
        api,
        CursorStore::new(&paths.state_file),
        Box::new(sink),
        RawSnapshots::new(&paths.raw_dir),
    );

    let pages = run_with_refresh(&mut collector, &lifecycle, args.max_pages).await?;
    println!(
        "✓ Pages fetched this run: {} ({} new posts) -> {}",
        pages,
        collector.dedup_len(),
        paths.data_dir.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CommandLineInput::parse();

    setup_logging(cli.verbose).map_err(|e| anyhow::anyhow!("logging setup failed: {}", e))?;

    let paths = AppPaths::new(&cli.out_dir, cli.tokens.clone());
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);

    match &cli.command {
        Command::Auth { timeout } => authorize(&paths, transport, *timeout).await,
        Command::Refresh => refresh(&paths, transport).await,
        Command::Collect(args) => collect(&paths, transport, args).await,
    }
}
