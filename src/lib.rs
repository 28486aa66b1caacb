pub mod ai;
pub mod commands;
pub mod config;
pub mod error;
pub mod formats;
pub mod models;
pub mod session;
pub mod settings;
pub mod shell;
pub mod store;
pub mod ui;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::AppState;
use crate::config::{Cli, DB_FILE};
use crate::settings::SettingsStore;
use crate::shell::repl::Repl;
use crate::store::BookStore;

/// 日志输出到 stderr，不干扰终端阅读界面
fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(env_filter)
        .try_init();
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_filter());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(start(cli))
}

async fn start(cli: Cli) -> anyhow::Result<()> {
    let data_dir = cli.data_dir();
    info!(data_dir = %data_dir.display(), "Starting ebook reader");

    let store = BookStore::new();
    if let Err(err) = store.initialize(&data_dir.join(DB_FILE)).await {
        // 书库不可用时仍可修改设置，导入被禁用
        error!("Failed to open library: {err}");
    }
    let state = AppState::new(store, SettingsStore::in_dir(&data_dir));

    let mut repl = Repl::new(state, std::io::stdout());
    if let Some(book) = &cli.book {
        if let Err(err) = repl.open_file(book).await {
            warn!(path = %book.display(), "Failed to open book from command line: {err}");
            eprintln!("错误: {}", err);
        }
    }
    repl.run().await.context("shell terminated")?;
    Ok(())
}
