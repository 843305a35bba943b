use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use toolvisor::control::{ConsoleBinding, ControlRequest, ControlTransport, SocketBinding};
use toolvisor::{Config, Kernel};

/// Event-driven tool supervisor.
#[derive(Parser, Debug)]
#[command(name = "toolvisor", version, about)]
struct Cli {
    /// Configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Lower the log threshold to DEBUG.
    #[arg(short, long)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if cli.debug {
        cfg.log_level = LevelFilter::Debug;
    }

    toolvisor::logger::init(&cfg.log_file, cfg.log_level).context("failed to set up logging")?;

    let pid_file = cfg.pid_file.clone();
    if let Some(path) = &pid_file {
        fs::write(path, format!("{}\n", std::process::id()))
            .with_context(|| format!("failed to write pid file {}", path.display()))?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the runtime")?;
    let result = runtime.block_on(run(cfg));
    // The console's stdin read may still be parked on the blocking pool;
    // don't let it hold the process open.
    runtime.shutdown_timeout(Duration::from_millis(200));

    if let Some(path) = &pid_file {
        let _ = fs::remove_file(path);
    }
    result
}

async fn run(cfg: Config) -> anyhow::Result<()> {
    let mut kernel = Kernel::new(cfg);
    kernel.init().context("failed to register configured tools")?;

    let handle = kernel.handle();
    let shutdown = kernel.shutdown_token();

    if let Some(port) = kernel.config().control_port {
        let socket = SocketBinding::bind(port)
            .await
            .context("failed to bind the control socket")?;
        tokio::spawn(socket.serve(handle.clone(), shutdown.clone()));
    }
    tokio::spawn(ConsoleBinding::new().serve(handle.clone(), shutdown.clone()));

    let signal_handle = handle.clone();
    tokio::spawn(async move {
        if wait_for_signal().await.is_ok() {
            let _ = signal_handle.submit(ControlRequest::Shutdown).await;
        }
    });

    kernel.run().await?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
