// Type 4 Tag emulator for Linux: serves the NDEF tag to PC/SC readers through vpcd.

mod config;
mod console;
mod vpcd;

use std::sync::Arc;
use std::time::Duration;

use t4t_core::{PayloadCell, PayloadConfig};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "usage: t4t-linux [--uri <text> | --text <text>] [--print-ndef] [--version]";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = config::load();
    let mut print_ndef = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("t4t-linux {}", VERSION);
                return Ok(());
            }
            "--print-ndef" => print_ndef = true,
            "--uri" | "--text" => {
                let text = args.next().ok_or_else(|| format!("{arg} needs a value\n{USAGE}"))?;
                cfg.payload = text;
                cfg.payload_kind = config::parse_kind(arg.trim_start_matches("--"))
                    .ok_or_else(|| format!("bad payload flag {arg}"))?;
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(());
            }
            other => return Err(format!("unknown argument {other}\n{USAGE}").into()),
        }
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let initial: PayloadConfig = cfg.payload_config();
    if let Err(e) = initial.validate() {
        tracing::warn!("configured payload cannot be served: {e}");
    }
    let payload = Arc::new(PayloadCell::new(initial));

    if print_ndef {
        println!("{}", console::describe(&payload));
        let snapshot = payload.snapshot();
        if let Ok(file) = snapshot.ndef_file() {
            println!("decoded: {:?}", t4t_core::decode_file(file)?);
        }
        return Ok(());
    }

    let addr = format!("{}:{}", cfg.vpcd_host, cfg.vpcd_port);
    let retry = Duration::from_secs(cfg.reconnect_secs.max(1));
    tracing::info!(%addr, "t4t-linux {} serving {:?}", VERSION, cfg.payload_kind);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        tokio::spawn(vpcd::run_vpcd(addr, payload.clone(), retry));
        let console_payload = payload.clone();
        tokio::spawn(async move {
            if let Err(e) = console::run_console(console_payload).await {
                tracing::warn!("console stopped: {e}");
            }
        });
        shutdown_signal().await
    })?;
    tracing::info!("shutting down");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
