use anyhow::{Context, Result};
use chat_model::ChatModel;
use clap::Parser;
use device_link::{DeviceLink, MockLink, NullLink};
use npc_content::ContentLibrary;
use npc_core::metrics::MetricsHub;
use npc_core::{GiftNotice, Mode, NpcConfig, NpcContext};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use voice_out::plugin::{new_tts_backend, TtsBackendKind};

mod command;
use command::{describe_transition, parse_line, Command, HELP};

const STREAK_CHECK_INTERVAL: Duration = Duration::from_millis(500);
const DRAIN_LIMIT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "npc-daemon")]
#[command(about = "Live-stream NPC: reads events on stdin, speaks and drives the animatronic")]
struct Args {
    /// JSON config file; written with defaults when missing
    #[arg(long, default_value = "npc.json")]
    config: PathBuf,

    /// Initial mode (number or key), overrides the config
    #[arg(long)]
    mode: Option<String>,

    /// Device backend: mock, serial or none
    #[arg(long, default_value = "mock")]
    device: String,

    /// Serial port, overrides the config
    #[arg(long)]
    port: Option<String>,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// TTS backend: silent, mock or command
    #[arg(long, default_value = "silent")]
    tts: String,

    /// Program for the command TTS backend
    #[arg(long)]
    tts_program: Option<String>,

    /// Argument for the TTS program, repeatable
    #[arg(long = "tts-arg")]
    tts_args: Vec<String>,

    /// Language model for open chat: none, mock or http
    #[arg(long, default_value = "none")]
    llm: String,

    /// Directory for content snapshots, overrides the config
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    if args.list_ports {
        return list_ports();
    }

    let mut config = NpcConfig::load(&args.config)
        .with_context(|| format!("loading config: {}", args.config.display()))?;
    if let Some(mode) = &args.mode {
        config.initial_mode = mode
            .parse::<Mode>()
            .map_err(|e| anyhow::anyhow!("Invalid --mode: {}", e))?;
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(port) = &args.port {
        config.device.port = Some(port.clone());
    }

    info!("npc-daemon starting");
    info!("Config: {}", args.config.display());
    info!("Initial mode: {}", config.initial_mode);

    let library = ContentLibrary::open(config.data_dir.as_deref());
    let device = open_device(&args.device, &config)?;
    info!("Device link: {}", device.name());

    let kind: TtsBackendKind = args.tts.parse().map_err(anyhow::Error::msg)?;
    let tts_command = args
        .tts_program
        .clone()
        .map(|program| (program, args.tts_args.clone()));
    let tts = new_tts_backend(kind, config.speech.tts_config(), tts_command)
        .map_err(|e| anyhow::anyhow!("Failed to create TTS backend: {}", e))?;

    let mut builder = NpcContext::builder(config.clone())
        .device_link(device)
        .tts(tts)
        .sources(library.sources())
        .gift_acknowledger(library.acknowledger());
    if let Some(model) = open_chat_model(&args.llm, &config)? {
        builder = builder.chat_model(model);
    }
    let ctx = Arc::new(builder.build().context("building NPC context")?);
    let metrics = MetricsHub::new().map_err(|e| anyhow::anyhow!("Failed to create metrics: {}", e))?;

    ctx.on_gift_notice(Box::new(print_notice));
    ctx.on_mode_change(Box::new(|new: Mode, old: Mode| {
        println!("{}", describe_transition(new, old))
    }));

    let timer_ctx = Arc::clone(&ctx);
    let streak_timer = tokio::spawn(async move {
        let mut tick = tokio::time::interval(STREAK_CHECK_INTERVAL);
        loop {
            tick.tick().await;
            if let Some(streak) = timer_ctx.check_streak_timeout() {
                info!("Gift streak of {} ended", streak);
            }
        }
    });

    info!("Ready. Type `help` for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        };
        let Some(line) = line else {
            drain(&ctx).await;
            break;
        };
        match parse_line(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(cmd)) => run(cmd, &ctx, &library, &metrics),
            Ok(None) => {}
            Err(e) => eprintln!("{e}"),
        }
    }

    streak_timer.abort();
    ctx.shutdown();
    info!("npc-daemon stopped");
    Ok(())
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cmd: Command, ctx: &Arc<NpcContext>, library: &ContentLibrary, metrics: &MetricsHub) {
    match cmd {
        Command::Submit(event) => {
            if !ctx.submit(event) {
                warn!("Event dropped");
            }
        }
        Command::Combo(events) => {
            if !ctx.submit_gift_combo(&events) {
                warn!("Gift combo dropped");
            }
        }
        Command::Mode(mode) => {
            if !ctx.change_mode(mode) {
                println!("already in {mode}");
            }
        }
        Command::Guest { name, kind } => {
            library.interview.set_default_guest(&name);
            let intro = library.interview.start(&name, kind.as_deref());
            if ctx.current_mode() == Mode::Interview {
                ctx.primary().speak(&intro);
            } else {
                println!("{intro}");
            }
        }
        Command::Status => match serde_json::to_string_pretty(&ctx.status()) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("Failed to encode status: {}", e),
        },
        Command::Metrics => {
            metrics.observe(ctx);
            print!("{}", metrics.encode_text());
        }
        Command::GiftStats => println!("{}", library.gifts.summary()),
        Command::Force => {
            if !ctx.force_process() {
                println!("nothing to process");
            }
        }
        Command::Clear => println!("cleared {} events", ctx.clear_queue()),
        Command::ResetStreak => println!("streak of {} reset", ctx.reset_streak()),
        Command::Gifts(enabled) => ctx.set_gifts_enabled(enabled),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn print_notice(notice: &GiftNotice) {
    match serde_json::to_string(notice) {
        Ok(json) => println!("notice {json}"),
        Err(e) => error!("Failed to encode gift notice: {}", e),
    }
}

/// Wait for queued input to be answered and spoken, up to [`DRAIN_LIMIT`].
async fn drain(ctx: &NpcContext) {
    let started = Instant::now();
    let settle = Duration::from_millis(ctx.config().debounce.settle_ms);
    tokio::time::sleep(settle).await;
    while started.elapsed() < DRAIN_LIMIT {
        let status = ctx.status();
        let busy = status.queue_len > 0
            || status.processing
            || status.primary_speaking
            || status.gift_speaking;
        if !busy {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    warn!("Gave up waiting for speech to finish");
}

fn open_device(kind: &str, config: &NpcConfig) -> Result<Box<dyn DeviceLink>> {
    match kind {
        "mock" => Ok(Box::new(MockLink::new())),
        "none" => Ok(Box::new(NullLink)),
        "serial" => open_serial(config),
        other => anyhow::bail!("unknown device backend: {other}"),
    }
}

#[cfg(feature = "serial")]
fn open_serial(config: &NpcConfig) -> Result<Box<dyn DeviceLink>> {
    let dev = &config.device;
    let port = match dev.port.clone() {
        Some(port) => Some(port),
        None if dev.auto_detect => device_link::find_device_port()?,
        None => None,
    };
    let Some(port) = port else {
        warn!("No controller board found, running headless");
        return Ok(Box::new(NullLink));
    };
    match device_link::SerialLink::open(&port, dev.baud_rate, Duration::from_millis(dev.settle_ms)) {
        Ok(link) => Ok(Box::new(link)),
        Err(e) => {
            warn!("Could not open {}: {}, running headless", port, e);
            Ok(Box::new(NullLink))
        }
    }
}

#[cfg(not(feature = "serial"))]
fn open_serial(_config: &NpcConfig) -> Result<Box<dyn DeviceLink>> {
    anyhow::bail!("serial backend not built; rebuild with --features serial")
}

#[cfg(feature = "serial")]
fn list_ports() -> Result<()> {
    for port in device_link::available_ports()? {
        println!("{}\t{}", port.name, port.description);
    }
    Ok(())
}

#[cfg(not(feature = "serial"))]
fn list_ports() -> Result<()> {
    anyhow::bail!("serial backend not built; rebuild with --features serial")
}

fn open_chat_model(kind: &str, config: &NpcConfig) -> Result<Option<Arc<dyn ChatModel>>> {
    match kind {
        "none" => Ok(None),
        "mock" => Ok(Some(Arc::new(chat_model::MockChatModel::new(
            "¡Qué buena pregunta! Déjame pensarlo con mi nariz roja.",
        )))),
        "http" => open_http_model(config).map(Some),
        other => anyhow::bail!("unknown llm backend: {other}"),
    }
}

#[cfg(feature = "http")]
fn open_http_model(config: &NpcConfig) -> Result<Arc<dyn ChatModel>> {
    use chat_model::{HttpChatConfig, HttpChatModel};
    let api_key = std::env::var(&config.llm.api_key_env).ok();
    if api_key.is_none() {
        warn!("{} is not set; sending requests without a key", config.llm.api_key_env);
    }
    let model = HttpChatModel::new(HttpChatConfig {
        endpoint: config.llm.endpoint.clone(),
        model: config.llm.model.clone(),
        api_key,
        timeout_ms: config.chat.llm_timeout_ms * 2,
    })?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "http"))]
fn open_http_model(_config: &NpcConfig) -> Result<Arc<dyn ChatModel>> {
    anyhow::bail!("http chat backend not built; rebuild with --features http")
}
