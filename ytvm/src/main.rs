// ytvm/src/main.rs
//! `yt-vod-manager` launcher: installs the platform binary on first use and
//! hands the invocation over to it.
use std::ffi::OsString;
use std::process;

use colored::Colorize;
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use ytvm_aio::{run_delegate, ChildExit};
use ytvm_common::config::Config;
use ytvm_common::error::Result as YtvmResult;
use ytvm_common::TargetDescriptor;
use ytvm_core::Installer;

const LOG_ENV_VAR: &str = "YTVM_LOG";

fn init_logging() {
    // Quiet by default: stderr is shared with the delegated binary.
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .without_time()
        .try_init();
}

async fn run(args: Vec<OsString>) -> YtvmResult<ChildExit> {
    let config = Config::load(env!("CARGO_PKG_VERSION"))?;
    let target = TargetDescriptor::current()?;
    let installer = Installer::new(&config, target)?;

    if !installer.is_installed() {
        eprintln!(
            "{}{}",
            "==> ".bold().blue(),
            format!(
                "Installing {} {} for {}/{}",
                config.base_name, config.version, target.os_name, target.arch_name
            )
            .bold()
        );
    }
    let outcome = installer.ensure_installed().await?;
    debug!(
        "Binary ready ({}): {}",
        outcome.state(),
        outcome.binary_path().display()
    );

    run_delegate(outcome.binary_path(), &args).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    // Everything after argv[0] belongs to the delegated binary.
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();

    let code = match run(args).await {
        Ok(exit) => exit.exit_code(),
        Err(e) => {
            debug!("Launcher failed: {:?}", e);
            eprintln!(
                "{}: yt-vod-manager launcher error: {}",
                "Error".red().bold(),
                e
            );
            e.exit_code()
        }
    };
    process::exit(code);
}
