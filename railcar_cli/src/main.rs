#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `railcar` binary: argument parsing, logging setup, and command dispatch.

mod cli;
mod error_fmt;
mod rt;
mod run;

use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, FILE_GUARD};

fn main() {
    let cli = Cli::parse();
    if let Err(e) = color_eyre::install() {
        eprintln!("Warning: error-report hooks not installed: {e}");
    }
    let code = match dispatch(&cli) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("{}", error_fmt::humanize(&err));
            error_fmt::exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}

fn dispatch(cli: &Cli) -> eyre::Result<()> {
    let text = std::fs::read_to_string(&cli.config)
        .wrap_err_with(|| format!("failed to read config file {}", cli.config.display()))?;
    let cfg = railcar_config::load_toml(&text)
        .wrap_err_with(|| format!("invalid config TOML {}", cli.config.display()))?;
    cfg.validate()
        .wrap_err("invalid configuration")?;

    init_logging(cli, &cfg);

    match &cli.cmd {
        Commands::Run {
            ticks,
            duration_s,
            rt,
            rt_prio,
            rt_lock,
            rt_cpu,
        } => run::run(
            &cfg,
            &run::RunOpts {
                ticks: *ticks,
                duration_s: *duration_s,
                rt: *rt,
                rt_prio: *rt_prio,
                rt_lock: *rt_lock,
                rt_cpu: *rt_cpu,
            },
        ),
        Commands::CheckConfig => {
            println!(
                "config ok: device {} on {} ({} ms/tick)",
                cfg.device.device_id,
                cfg.device.effective_prefix(),
                cfg.control.sample_time_ms
            );
            Ok(())
        }
        Commands::Topics => {
            // A throwaway channel; only the topic map is consulted.
            let (tx, _rx) = crossbeam_channel::unbounded();
            let channel =
                railcar_core::ParameterChannel::new(cfg.device.effective_prefix(), tx);
            for topic in channel.subscriptions() {
                println!("{topic}");
            }
            Ok(())
        }
    }
}

/// Console logging (pretty or JSON) plus an optional JSON-lines file from
/// `[logging]`. CLI `--log-level` wins over the config, RUST_LOG over both.
fn init_logging(cli: &Cli, cfg: &railcar_config::Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer, fmt};

    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file = cfg.logging.file.as_deref().map(|p| {
        let path = std::path::Path::new(p);
        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => std::path::Path::new("."),
        };
        let name = path
            .file_name()
            .map_or_else(|| "railcar.log".into(), std::ffi::OsStr::to_os_string);
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_writer(writer).boxed()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
}
