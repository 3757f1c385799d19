use super::args::*;
use normeval_core::config::{load_or_default, AppConfig};
use normeval_core::engine::CancelToken;
use normeval_core::errors::ConfigError;
use normeval_core::selector::SelectionFilter;
use normeval_core::storage::Store;
use std::path::Path;

pub mod annotate;
pub mod catalog;
pub mod generate;
pub mod init;
pub mod judge;
pub mod report;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const TEST_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    let result = match cli.cmd {
        Command::Init => init::cmd_init(&global),
        Command::Generate(args) => generate::cmd_generate(&global, args).await,
        Command::Judge(args) => judge::cmd_judge(&global, args).await,
        Command::Status(args) => report::cmd_status(&global, args),
        Command::Questions(sub) => catalog::cmd_questions(&global, sub),
        Command::Models(sub) => catalog::cmd_models(&global, sub),
        Command::Configs => catalog::cmd_configs(),
        Command::Annotate(sub) => annotate::cmd_annotate(&global, sub),
        Command::Report(args) => report::cmd_report(&global, args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    };

    match result {
        Err(e) => match e.downcast_ref::<ConfigError>() {
            Some(cfg_err) => {
                eprintln!("config error: {}", cfg_err);
                Ok(exit_codes::CONFIG_ERROR)
            }
            None => Err(e),
        },
        ok => ok,
    }
}

pub(crate) fn load_app_config(global: &GlobalArgs) -> anyhow::Result<AppConfig> {
    let mut cfg = load_or_default(&global.config_file, global.strict_config)?;
    if let Some(db) = &global.db {
        cfg.database.path = db.clone();
    }
    tracing::debug!(
        event = "cli.config",
        config_file = %global.config_file.display(),
        db = %cfg.database.path.display()
    );
    Ok(cfg)
}

/// Opens the configured database, creating it (and its parent directory) if needed.
pub(crate) fn open_store(cfg: &AppConfig) -> anyhow::Result<Store> {
    ensure_parent_dir(&cfg.database.path)?;
    let store = Store::open(&cfg.database.path)?;
    store.init_schema()?;
    Ok(store)
}

pub(crate) fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub(crate) fn selection_filter(args: &BatchArgs) -> SelectionFilter {
    SelectionFilter {
        norm: args.norm.clone(),
        interesting_only: args.interesting_only,
        disputed_only: args.disputed_only,
        limit: args.limit,
        start_from: args.start_from,
        overwrite: args.overwrite,
    }
}

/// A token cancelled by the first Ctrl-C. Work already committed is kept.
pub(crate) fn cancel_on_ctrl_c() -> CancelToken {
    let token = CancelToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n⚠️  Interrupt received, stopping after the current step...");
            trigger.cancel();
        }
    });
    token
}

pub(crate) fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
