use clap::Parser;
use color_eyre::Result;
use tabfuse::export::write_csv;
use tabfuse::{
    apply_overrides, AppConfig, Args, ConfigManager, EngineError, IngestStatus, RunOptions,
    Session, APP_NAME,
};
use tracing_subscriber::EnvFilter;

/// Log to stderr so stdout only carries tables. RUST_LOG wins over the config level.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(options: &RunOptions, config: AppConfig) -> tabfuse::Result<()> {
    let sources = options.sources(&config)?;
    let mut session = Session::new(config);
    let loaded = session.load(&sources).map(|_| ());

    for report in session.reports() {
        match &report.status {
            IngestStatus::Loaded {
                rows,
                delimiter,
                skipped_rows,
            } => {
                let mut line = format!("{}: {} rows", report.file, rows);
                if let Some(d) = delimiter {
                    line.push_str(&format!(", delimiter '{}'", (*d as char).escape_default()));
                }
                if *skipped_rows > 0 {
                    line.push_str(&format!(", {} malformed rows skipped", skipped_rows));
                }
                println!("{}", line);
            }
            IngestStatus::Failed { message } => println!("{}: error: {}", report.file, message),
        }
    }
    loaded?;

    if !session.common_columns().is_empty() {
        println!("Common columns: {}", session.common_columns().join(", "));
    }

    let view = session.view(
        &options.columns,
        options.filter.as_ref().map(|f| f.as_input()),
    )?;
    if let Some(warning) = &view.warning {
        eprintln!("Warning: {} (showing unfiltered data)", warning.user_message());
    }
    println!("{}", session.preview(&view.table).frame());
    if let Some(path) = &options.export_preview {
        write_csv(&view.table, path)?;
        println!("Preview written to {}", path.display());
    }

    if let Some(spec) = &options.pivot {
        let pivot = session.pivot(options.pivot_filter.as_ref().map(|f| f.as_input()), spec)?;
        if let Some(warning) = &pivot.warning {
            eprintln!("Warning: {} (pivoting unfiltered data)", warning.user_message());
        }
        println!("{}", pivot.table.frame());
        if let Some(path) = &options.export_pivot {
            write_csv(&pivot.table, path)?;
            println!("Pivot written to {}", path.display());
        }
    }
    Ok(())
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        match ConfigManager::new(APP_NAME) {
            Ok(manager) => match manager.write_default_config(args.force) {
                Ok(path) => {
                    println!("Configuration written to {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing config: {}", e.user_message());
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e.user_message());
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let mut config = AppConfig::load(APP_NAME)?;
    apply_overrides(&mut config, &args);
    config.validate()?;
    init_logging(&config);

    let options = RunOptions::from_args_and_config(&args, &config)?;
    if let Err(e) = run(&options, config) {
        eprintln!("Error: {}", e.user_message());
        let code = match e {
            EngineError::NoCommonColumns | EngineError::PathNotFound(_) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
    Ok(())
}
