use tripane::cli::Args;
use tripane::core::{ImageCache, ImageDecoder};
use tripane::paths::{self, LOG_FILE, PathConfig, SETTINGS_FILE};
use tripane::settings::Settings;
use tripane::shell::{HELP, Reply, Shell};
use tripane::sink::{LogStatus, NullSink, PngSink, RenderSink};
use tripane::viewer::Viewer;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::{Receiver, select};
use log::{debug, error, info, trace, warn};
use std::io::BufRead;
use std::sync::Arc;
use std::thread;

fn init_logger(args: &Args, path_config: &PathConfig) -> anyhow::Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        // File logging always goes at least to debug
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| paths::data_file(LOG_FILE, path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;
        env_logger::Builder::new()
            .filter_level(log_level.max(log::LevelFilter::Debug))
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
        info!("Logging to {}", log_path.display());
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Forward stdin lines until EOF. The channel closes when the thread exits.
fn spawn_stdin() -> std::io::Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("tripane-stdin".into())
        .spawn(move || {
            trace!("stdin reader started");
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin: {}", e);
                        break;
                    }
                }
            }
            trace!("stdin reader stopped");
        })?;
    Ok(rx)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        eprintln!("Warning: {:#}", e);
    }
    init_logger(&args, &path_config)?;
    info!("tripane {}", env!("CARGO_PKG_VERSION"));

    let settings_path = paths::config_file(SETTINGS_FILE, &path_config);
    let mut settings = Settings::load_or_default(&settings_path);
    if let Some(depth) = args.prefetch {
        settings.prefetch_depth = depth;
    }
    debug!("Settings: {:?}", settings);

    let render: Box<dyn RenderSink> = match &args.out_dir {
        Some(dir) => Box::new(PngSink::new(dir).context("Cannot create output directory")?),
        None => Box::new(NullSink),
    };
    let cache = ImageCache::new(Arc::new(ImageDecoder), settings.cache_capacity)
        .context("Cannot start decode worker")?;
    let completions = cache.completions().clone();
    let viewer = Viewer::from_settings(&settings, cache, render, Box::new(LogStatus));
    let mut shell = Shell::new(viewer);

    if let Some(path) = &args.path {
        match shell.viewer_mut().open(path) {
            Ok(nav) => debug!("Open {}: {:?}", path.display(), nav),
            Err(e) => error!("Cannot open {}: {}", path.display(), e),
        }
    } else {
        println!("{}", HELP);
    }

    let lines = spawn_stdin().context("Cannot read stdin")?;
    loop {
        select! {
            recv(lines) -> line => {
                let Ok(line) = line else {
                    debug!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match shell.execute_line(&line) {
                    Ok(Reply::Quit) => break,
                    Ok(reply) => println!("{}", reply),
                    Err(e) => println!("error: {:#}", e),
                }
            }
            recv(completions) -> completion => {
                match completion {
                    Ok(completion) => shell.viewer_mut().complete(completion),
                    Err(_) => {
                        debug!("Decode worker gone");
                        break;
                    }
                }
            }
        }
    }

    let mut viewer = shell.into_viewer();
    viewer.shutdown();
    // Drain what the worker finished before stopping
    viewer.pump();
    info!("Bye");
    Ok(())
}
