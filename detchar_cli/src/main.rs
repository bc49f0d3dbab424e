use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use simplelog::{ColorChoice, CombinedLogger, LevelFilter, SharedLogger, TerminalMode};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::Duration;

use libdetchar::config::Config;
use libdetchar::process::{process, Analysis};
use libdetchar::worker_status::WorkerStatus;

const LOG_NAME: &str = "detchar.log";

fn make_template_config(path: &Path) -> Result<(), String> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).map_err(|e| e.to_string())?;
    let mut file = File::create(path).map_err(|e| e.to_string())?;
    file.write_all(yaml_str.as_bytes())
        .map_err(|e| e.to_string())
}

/// Terminal logging, plus a log file when one is given, routed around the progress bars
fn init_logging(pb_manager: &MultiProgress, log_path: Option<&Path>) -> Result<(), String> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(simplelog::TermLogger::new(
        LevelFilter::Info,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));
    if let Some(path) = log_path {
        let file = File::create(path).map_err(|e| format!("Could not create log file: {e}"))?;
        loggers.push(simplelog::WriteLogger::new(
            LevelFilter::Info,
            simplelog::Config::default(),
            file,
        ));
    }

    LogWrapper::new(pb_manager.clone(), CombinedLogger::new(loggers))
        .try_init()
        .map_err(|e| format!("Could not create logging/progress: {e}"))?;
    log::set_max_level(log::LevelFilter::Info);
    Ok(())
}

fn update_bar(pb: &ProgressBar, status: &WorkerStatus) {
    pb.set_message(status.stage.label());
    pb.set_length(status.total as u64);
    pb.set_position(status.completed as u64);
}

fn main() -> ExitCode {
    // Create a cli
    let matches = Command::new("detchar_cli")
        .about("Detector characterization: lasso channel ranking, threshold crossings, and overflows")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("lasso")
                .about("Rank auxiliary channels by their lasso correlation with a reference"),
        )
        .subcommand(Command::new("crossings").about("Find the threshold crossings of a channel"))
        .subcommand(Command::new("overflow").about("Count digital overflows on overflow counters"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    let pb_manager = MultiProgress::new();

    // Parse the cli
    let config_path = match matches.get_one::<String>("path") {
        Some(p) => PathBuf::from(p),
        None => {
            eprintln!("A configuration path is required");
            return ExitCode::FAILURE;
        }
    };

    let analysis = match matches.subcommand() {
        Some(("new", _)) => {
            if let Err(e) = init_logging(&pb_manager, None) {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
            log::info!(
                "Making a template config at {}...",
                config_path.to_string_lossy()
            );
            return match make_template_config(&config_path) {
                Ok(()) => {
                    log::info!("Done.");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    log::error!("Could not write template config: {e}");
                    ExitCode::FAILURE
                }
            };
        }
        Some(("lasso", _)) => Analysis::Lasso,
        Some(("crossings", _)) => Analysis::Crossings,
        Some(("overflow", _)) => Analysis::Overflow,
        _ => {
            eprintln!("Unknown subcommand");
            return ExitCode::FAILURE;
        }
    };

    // Load our config; the log file lives in the output directory so this comes first
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let output_dir = match config.get_output_directory() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&pb_manager, Some(&output_dir.join(LOG_NAME))) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    log::info!("Config successfully loaded from {}.", config_path.to_string_lossy());
    log::info!("Data Path: {}", config.data_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("Start: {} End: {}", config.start, config.end);
    if let Some(flag) = &config.state_flag {
        log::info!("State Flag: {flag}");
    }
    log::info!("Cadence: {:?}", config.cadence);
    log::info!("Number of Workers: {}", config.n_threads);

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(1));
    if let Ok(style) =
        ProgressStyle::with_template("{msg:>18} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    let (tx, rx) = channel::<WorkerStatus>();
    // Spawn the task!
    let handle = std::thread::spawn(move || process(config, analysis, tx));

    loop {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(status) => update_bar(&pb, &status),
            // Every sender is gone once the task is done
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if handle.is_finished() {
                    break;
                }
            }
        }
    }
    pb.finish();

    match handle.join() {
        Ok(Ok(())) => {
            log::info!("Done.");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            log::error!("Analysis failed with error: {e}");
            ExitCode::FAILURE
        }
        Err(_) => {
            log::error!("Failed to join analysis task!");
            ExitCode::FAILURE
        }
    }
}
