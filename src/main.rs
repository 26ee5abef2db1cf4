use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use raylib::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::info;

use image_relay::config::Config;
use image_relay::constants::*;
use image_relay::controller::Controller;
use image_relay::observer::TracingObserver;
use image_relay::push;
use image_relay::raylib_renderer::RaylibRenderer;
use image_relay::runtime::{build_runtime, drain, inbound_channel, TokioVerifier};

#[derive(Parser, Debug)]
#[command(name = "image-relay", version, about = "Full-screen image display fed by polling and push updates")]
struct Cli {
    /// JSON config file (camelCase keys).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Default source polled every refresh interval.
    #[arg(long)]
    source: Option<String>,

    /// Do not poll; show only pushed images.
    #[arg(long, conflicts_with = "source")]
    no_poll: bool,

    #[arg(long)]
    refresh_interval_ms: Option<u64>,

    #[arg(long)]
    reveal_duration_ms: Option<u64>,

    /// Poll the default source as-is instead of adding a `random=` parameter.
    #[arg(long)]
    no_cache_bust: bool,

    /// Address for the push listener, e.g. 0.0.0.0:7878.
    #[arg(long)]
    push_listen: Option<String>,

    /// Disable the push listener.
    #[arg(long, conflicts_with = "push_listen")]
    no_push: bool,

    #[arg(long)]
    fullscreen: bool,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(source) = &cli.source {
        config.default_source = Some(source.clone());
    }
    if cli.no_poll {
        config.default_source = None;
    }
    if let Some(ms) = cli.refresh_interval_ms {
        config.refresh_interval_ms = ms;
    }
    if let Some(ms) = cli.reveal_duration_ms {
        config.reveal_duration_ms = ms;
    }
    if cli.no_cache_bust {
        config.cache_bust = false;
    }
    if let Some(addr) = &cli.push_listen {
        config.push_listen = Some(addr.clone());
    }
    if cli.no_push {
        config.push_listen = None;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(cli.log_level))
        .init();

    let config = resolve_config(&cli).context("invalid configuration")?;
    info!(
        source = config.default_source.as_deref().unwrap_or("<none>"),
        refresh_ms = config.refresh_interval_ms,
        reveal_ms = config.reveal_duration_ms,
        "starting"
    );

    // --- Background Work: fetches and the push listener ---
    let runtime = build_runtime().context("failed to start background runtime")?;
    let cancel = CancellationToken::new();
    let (events_tx, mut events_rx) = inbound_channel();

    if let Some(addr) = config.push_addr()? {
        runtime
            .block_on(push::start_listener(addr, events_tx.clone(), cancel.clone()))
            .with_context(|| format!("failed to start push listener on {addr}"))?;
    }

    let verifier = TokioVerifier::new(runtime.handle().clone(), config.fetch_limits(), events_tx);

    // --- Window ---
    let (mut rl, thread) = raylib::init()
        .size(RENDER_WIDTH, RENDER_HEIGHT)
        .title("Image Relay")
        .vsync()
        .resizable()
        .build();
    rl.set_target_fps(FPS);
    rl.set_trace_log(TraceLogLevel::LOG_ERROR);
    if cli.fullscreen {
        rl.toggle_fullscreen();
    }

    let mut controller = Controller::new(
        config.controller_config()?,
        verifier,
        RaylibRenderer::new(),
        TracingObserver,
    );
    controller.start();

    // --- Main Loop ---
    while !rl.window_should_close() {
        let dt = rl.get_frame_time();

        // 1. Results and pushes that arrived since the last frame
        drain(&mut events_rx, &mut controller);

        // 2. Periodic poll and reveal timeout
        controller.advance(Duration::from_secs_f32(dt.max(0.0)));

        // 3. Visual state
        let renderer = controller.renderer_mut();
        renderer.upload(&mut rl, &thread);
        renderer.update(dt);

        let screen_width = rl.get_screen_width() as f32;
        let screen_height = rl.get_screen_height() as f32;
        let mut d = rl.begin_drawing(&thread);
        controller.renderer().draw(&mut d, screen_width, screen_height);
    }

    controller.stop();
    cancel.cancel();
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("stopped");
    Ok(())
}
