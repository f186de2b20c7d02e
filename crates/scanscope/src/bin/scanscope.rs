//! scanscope CLI: prompt for a scan area and acquire it tile by tile.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use scanscope::acquire::sim::{SimulatedStage, SyntheticCamera};
use scanscope::acquire::{
    run_preview, switch_objective, PreviewControl, ScanConfig, Scanner, SessionContext,
    SystemClock,
};
use scanscope::core::WhiteBalanceEvent;
use scanscope::form::{Prompter, RequestForm, TerminalForm};
use scanscope::ScanRequest;

type CliError = Box<dyn Error>;
type CliResult<T> = Result<T, CliError>;

/// Polls the simulated stage needs before it reports the target.
const SIMULATED_SETTLE_POLLS: u32 = 2;
const PREVIEW_FRAME_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Parser, Debug)]
#[command(name = "scanscope")]
#[command(about = "Tiled brightfield scans on a motorized microscope stage")]
#[command(version)]
struct Cli {
    /// JSON scan configuration (defaults are used for missing fields).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Plan and print the positions without moving the stage.
    #[arg(long)]
    dry_run: bool,

    /// Root directory for scan folders (overrides the config).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&*err);
            wait_for_enter();
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    #[cfg(feature = "tracing")]
    let installed = scanscope::core::init_tracing(false, level).map_err(|e| e.to_string());
    #[cfg(not(feature = "tracing"))]
    let installed = scanscope::core::init_with_level(level).map_err(|e| e.to_string());

    if let Err(err) = installed {
        eprintln!("failed to install logger: {err}");
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    let mut config = match &cli.config {
        Some(path) => ScanConfig::load_json(path)?,
        None => ScanConfig::default(),
    };
    if let Some(output) = &cli.output {
        config.output_root = output.clone();
    }

    log::info!("using simulated controller");
    log::debug!(
        "controller_port {} unused without a driver binding",
        config.controller_port
    );
    let context = Arc::new(SessionContext::new());
    let mut stage = SimulatedStage::new(Some(SIMULATED_SETTLE_POLLS));

    let preview = spawn_preview(Arc::clone(&context), &config);
    let form = fill_form(cli, &config, &context, &mut stage);
    context.stop_preview();
    if preview.join().is_err() {
        log::warn!("preview thread panicked");
    }

    let Some(request) = form? else {
        log::info!("Scan cancelled.");
        return Ok(());
    };

    let clock = SystemClock::new();
    let mut scanner = Scanner::new(&config, &context, &mut stage, &clock);
    if cli.dry_run {
        return match scanner.dry_run(&request) {
            Ok(positions) => {
                print_plan(&request, &positions);
                Ok(())
            }
            Err(err) if err.is_setup() => {
                log::error!("{err}");
                Ok(())
            }
            Err(err) => Err(err.into()),
        };
    }

    let mut camera = SyntheticCamera::new();
    match scanner.run(&request, &mut camera) {
        Ok(report) => {
            println!(
                "Saved {} of {} tiles to {}",
                report.tiles.len(),
                report.planned,
                report.folder.display()
            );
            Ok(())
        }
        // Setup failures end this scan only; the operator fixes and reruns.
        Err(err) if err.is_setup() => {
            log::error!("{err}");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn spawn_preview(context: Arc<SessionContext>, config: &ScanConfig) -> thread::JoinHandle<()> {
    let resolution = config.preview_resolution;
    context.start_preview();
    thread::spawn(move || {
        let mut camera = SyntheticCamera::new();
        let shown = run_preview(&mut camera, &context, resolution, |_| {
            thread::sleep(PREVIEW_FRAME_INTERVAL);
            PreviewControl::Continue
        });
        match shown {
            Ok(n) => log::debug!("preview closed after {n} frames"),
            Err(err) => log::warn!("preview unavailable: {err}"),
        }
    })
}

/// Prompt for the request and white balance. The objective is switched as
/// soon as it is chosen, except in dry runs.
fn fill_form(
    cli: &Cli,
    config: &ScanConfig,
    context: &SessionContext,
    stage: &mut SimulatedStage,
) -> CliResult<Option<ScanRequest>> {
    let mut form: Box<dyn RequestForm> = if TerminalForm::available() {
        Box::new(TerminalForm::new())
    } else {
        Box::new(Prompter::new(io::stdin().lock(), io::stdout()))
    };

    let Some(request) = form.request(&config.default_request)? else {
        return Ok(None);
    };
    if !cli.dry_run {
        if let Err(err) = switch_objective(stage, &config.devices, request.objective) {
            log::warn!("{err}");
        }
    }

    if let Some(wb) = form.white_balance()? {
        context.begin_patch_selection(wb.gain);
        if let Some(patch) = wb.patch {
            if context.select_patch(patch) == WhiteBalanceEvent::PatchEmpty {
                log::warn!("white balance left disabled");
            }
        }
    }
    Ok(Some(request))
}

fn print_plan(request: &ScanRequest, positions: &[scanscope::Position]) {
    println!(
        "Would scan {} tiles from ({}, {}) to ({}, {})",
        positions.len(),
        request.x_left,
        request.y_top,
        request.x_right,
        request.y_bottom
    );
    for (i, p) in positions.iter().enumerate() {
        println!("Tile {:03}: X={}, Y={}", i + 1, p.x, p.y);
    }
}

fn report(err: &dyn Error) {
    eprintln!("Error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

fn wait_for_enter() {
    eprint!("Press Enter to exit...");
    let _ = io::stderr().flush();
    let mut line = String::new();
    let _ = io::stdin().read_line(&mut line);
}
