use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    terminal::{disable_raw_mode, enable_raw_mode},
    tty::IsTty,
};
use scanlight::{
    config::{ConfigStore, DetectorConfig, FileConfigStore},
    detector::{Evaluation, ScanDetector},
    history::ScanLog,
    source::{CrosstermKeySource, ScanMonitor},
};
use std::{
    error::Error,
    io::stdin,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

// Ctrl-C as delivered by the key source in raw mode
const ETX: u32 = 3;

/// listens on the terminal and reports barcode scans as they happen
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Watches the keyboard for bursts of characters arriving faster than a human \
                  could type and reports them as barcode scans, long trigger presses, or \
                  rejected input. Press Ctrl-C to quit."
)]
struct Cli {
    /// minimum number of characters for a valid scan
    #[clap(short = 'm', long)]
    min_length: Option<usize>,

    /// maximum allowed average milliseconds between characters
    #[clap(short = 'a', long)]
    avg_time_by_char: Option<u64>,

    /// milliseconds of silence before the accumulated input is evaluated
    #[clap(short = 't', long)]
    time_before_scan_test: Option<u64>,

    /// key codes that terminate a scan (comma separated)
    #[clap(long, value_delimiter = ',')]
    end_char: Option<Vec<u32>>,

    /// key codes that open a scan without contributing a character (comma separated)
    #[clap(long, value_delimiter = ',')]
    start_char: Option<Vec<u32>>,

    /// key code of the scanner's trigger button
    #[clap(long)]
    scan_button_key_code: Option<u32>,

    /// trigger presses above which a scan is reported as a long press
    #[clap(long)]
    scan_button_long_press_threshold: Option<u32>,

    /// evaluate a literal code and exit instead of listening to the keyboard
    #[clap(long)]
    test_code: Option<String>,

    /// path to a JSON config file (defaults to the per-user config dir)
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// append successful scans to the scan history log
    #[clap(long)]
    log_scans: bool,
}

impl Cli {
    /// Stored config overridden by whatever was passed on the command line.
    fn to_detector_config(&self) -> DetectorConfig {
        let store = match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        };
        let mut cfg = store.load();

        if let Some(v) = self.min_length {
            cfg.min_length = v;
        }
        if let Some(v) = self.avg_time_by_char {
            cfg.avg_time_by_char_ms = v;
        }
        if let Some(v) = self.time_before_scan_test {
            cfg.time_before_scan_test_ms = v;
        }
        if let Some(v) = &self.end_char {
            cfg.end_char = v.clone();
        }
        if let Some(v) = &self.start_char {
            cfg.start_char = v.clone();
        }
        if let Some(v) = self.scan_button_key_code {
            cfg.scan_button_key_code = Some(v);
        }
        if let Some(v) = self.scan_button_long_press_threshold {
            cfg.scan_button_long_press_threshold = v;
        }
        cfg
    }
}

fn report(evaluation: &Evaluation, log: Option<&ScanLog>) {
    match evaluation {
        Evaluation::Scan { code, presses } => {
            println!("scan: {code} (presses: {presses})");
            if let Some(log) = log {
                if let Err(e) = log.record(code, *presses) {
                    eprintln!("could not write scan log: {e}");
                }
            }
        }
        Evaluation::LongPress { code, presses } => {
            println!("long-press: {code} (presses: {presses})");
            if let Some(log) = log {
                if let Err(e) = log.record(code, *presses) {
                    eprintln!("could not write scan log: {e}");
                }
            }
        }
        Evaluation::Error { partial, message } => {
            println!("rejected: {message} (got \"{partial}\")");
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = cli.to_detector_config();

    let log = if cli.log_scans { ScanLog::new() } else { None };

    // Forced evaluation mode: classify the given code and exit
    if let Some(code) = &cli.test_code {
        let mut detector = ScanDetector::new(config);
        let evaluation = detector.evaluate_forced(code);
        report(&evaluation, log.as_ref());
        if !evaluation.is_success() {
            std::process::exit(1);
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let quit = Arc::new(AtomicBool::new(false));
    let detector = {
        let quit = Arc::clone(&quit);
        ScanDetector::new(config).on_key_detect(move |press| {
            if press.code == ETX {
                quit.store(true, Ordering::Relaxed);
            }
        })
    };

    let mut source = CrosstermKeySource::new();
    let mut monitor = ScanMonitor::new(detector);

    enable_raw_mode()?;
    monitor.start(&mut source);

    println!("listening for scans, Ctrl-C to quit\r");
    while !quit.load(Ordering::Relaxed) {
        if let Some(evaluation) = monitor.step() {
            // Raw mode leaves the cursor at the column of the last keystroke
            print!("\r");
            report(&evaluation, log.as_ref());
        }
    }

    monitor.stop(&mut source);
    disable_raw_mode()?;

    Ok(())
}
