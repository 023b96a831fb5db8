use std::{
    io::BufRead,
    path::PathBuf,
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use clap::{Args, Parser, Subcommand};
use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use visual_core::{
    Context, Engine, OscArg, OscMessage, OscReceiver, OscSender, RecordingCanvas, VisualConfig,
    VisualError,
};

fn main() -> visual_core::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(options) => {
            init_tracing(options.verbose);
            run(options)
        }
        Commands::Send {
            address,
            args,
            ip,
            port,
        } => {
            init_tracing(false);
            send(&address, &args, &ip, port)
        }
    }
}

fn run(options: RunOptions) -> visual_core::Result<()> {
    let config = options.config()?;
    config.log_summary();

    let frame_time = Duration::from_millis(1000 / u64::from(config.frame_rate.max(1)));
    let ctx = Arc::new(Context::new(config));
    let engine = Arc::new(Mutex::new(Engine::new(Arc::clone(&ctx))));

    let mut receiver = OscReceiver::new(ctx.config().listening_port);
    if !receiver.start(Arc::clone(&engine)) {
        return Err(VisualError::msg(format!(
            "couldn't listen on port {}",
            ctx.config().listening_port
        )));
    }

    let sender = match OscSender::new(&ctx.config().sending_ip, ctx.config().sending_port) {
        Ok(sender) => Some(sender),
        Err(err) => {
            warn!(%err, "notifications disabled");
            None
        }
    };
    notify(sender.as_ref(), &ctx, "connect");

    {
        let mut engine = lock(&engine)?;
        engine.attach_ingress(receiver.ignore_switch());
        engine.setup();
    }
    let console = spawn_console();

    let mut canvas = RecordingCanvas::new();
    let mut frame: u64 = 0;
    loop {
        let started = Instant::now();
        {
            let mut engine = lock(&engine)?;
            for command in console.try_iter() {
                apply_console(&mut engine, command);
            }
            engine.update();
            engine.draw(&mut canvas);
            if engine.quit_requested() {
                break;
            }
        }
        let commands = canvas.take();
        if !commands.is_empty() {
            debug!(frame, commands = commands.len(), "frame drawn");
        }

        frame += 1;
        if options.frames.is_some_and(|limit| frame >= limit) {
            info!(frame, "frame limit reached");
            break;
        }
        if let Some(rest) = frame_time.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    receiver.stop();
    lock(&engine)?.shutdown();
    notify(sender.as_ref(), &ctx, "disconnect");
    Ok(())
}

/// Keyboard shortcuts of the windowed app, typed as lines on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    Pause,
    Next,
    Prev,
    Reload,
    Quit,
}

impl ConsoleCommand {
    fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "p" | "pause" => Some(Self::Pause),
            "n" | "next" => Some(Self::Next),
            "b" | "prev" => Some(Self::Prev),
            "r" | "reload" => Some(Self::Reload),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

fn spawn_console() -> Receiver<ConsoleCommand> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawned = thread::Builder::new()
        .name("visual-console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines().map_while(|line| line.ok()) {
                match ConsoleCommand::parse(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!(input = %line.trim(), "unknown console command"),
                }
            }
        });
    if let Err(err) = spawned {
        warn!(%err, "console disabled");
    }
    rx
}

fn apply_console(engine: &mut Engine, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Pause => {
            engine.toggle_running();
            info!(running = engine.is_running(), "running state changed");
        }
        ConsoleCommand::Next => {
            engine.scenes_mut().next_scene();
        }
        ConsoleCommand::Prev => {
            engine.scenes_mut().prev_scene();
        }
        ConsoleCommand::Reload => {
            if let Err(err) = engine.reload_script() {
                warn!(%err, "couldn't reload script");
            }
        }
        ConsoleCommand::Quit => engine.request_quit(),
    }
}

fn lock(engine: &Mutex<Engine>) -> visual_core::Result<std::sync::MutexGuard<'_, Engine>> {
    engine
        .lock()
        .map_err(|_| VisualError::msg("engine has been poisoned"))
}

fn notify(sender: Option<&OscSender>, ctx: &Context, event: &str) {
    let Some(sender) = sender else {
        return;
    };
    let config = ctx.config();
    if let Err(err) = sender.notify(&config.notification_address, event, config.connection_id) {
        warn!(%err, event, "couldn't send notification");
    }
}

fn send(address: &str, args: &[String], ip: &str, port: u16) -> visual_core::Result<()> {
    let message = OscMessage::new(address).with_args(args.iter().map(|arg| parse_arg(arg)));
    let sender = OscSender::new(ip, port)?;
    sender.send(&message)?;
    info!(%message, target = %sender.target(), "sent");
    Ok(())
}

fn parse_arg(arg: &str) -> OscArg {
    if let Ok(value) = arg.parse::<i32>() {
        OscArg::Int(value)
    } else if let Ok(value) = arg.parse::<f32>() {
        OscArg::Float(value)
    } else {
        OscArg::Str(arg.to_string())
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "OSC controlled live visuals engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the engine and listen for OSC control messages.
    Run(RunOptions),
    /// Send a single OSC message, e.g. `visual send /visual/scene/next`.
    Send {
        address: String,
        /// Arguments; integers and floats are sent typed, anything else as a
        /// string.
        args: Vec<String>,
        #[arg(short, long, default_value = "127.0.0.1")]
        ip: String,
        #[arg(short, long, default_value_t = 9990)]
        port: u16,
    },
}

#[derive(Args, Debug)]
struct RunOptions {
    /// Script to load on startup.
    script: Option<PathBuf>,
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Destination ip for outbound messages.
    #[arg(short, long)]
    ip: Option<String>,
    /// Destination port for outbound messages.
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(long)]
    listening_port: Option<u16>,
    /// Id sent with connect/disconnect notifications.
    #[arg(long)]
    connection_id: Option<i32>,
    /// Root of every routed address, e.g. `/vj`.
    #[arg(long)]
    base_address: Option<String>,
    #[arg(short, long)]
    fullscreen: bool,
    /// Exit after this many frames.
    #[arg(long)]
    frames: Option<u64>,
    #[arg(long)]
    verbose: bool,
}

impl RunOptions {
    /// Configuration file values, overridden by whatever was given on the
    /// command line.
    fn config(&self) -> visual_core::Result<VisualConfig> {
        let mut config = match &self.config {
            Some(path) => VisualConfig::from_json_file(path)?,
            None => VisualConfig::default(),
        };
        if let Some(script) = &self.script {
            config.script = Some(script.clone());
        }
        if let Some(ip) = &self.ip {
            config.sending_ip = ip.clone();
        }
        if let Some(port) = self.port {
            config.sending_port = port;
        }
        if let Some(port) = self.listening_port {
            config.listening_port = port;
        }
        if let Some(id) = self.connection_id {
            config.connection_id = id;
        }
        if let Some(base_address) = &self.base_address {
            config.set_base_address(base_address.clone());
        }
        if self.fullscreen {
            config.fullscreen = true;
        }
        Ok(config)
    }
}
