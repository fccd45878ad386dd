// Rotation trainer command-line driver

use clap::{Parser, Subcommand};
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use rotation_trainer::core::ability::{AbilityCatalog, StaticCatalog};
use rotation_trainer::core::binding::KeyChord;
use rotation_trainer::core::format::{format_cooldown, format_progress};
use rotation_trainer::core::io_traits::{PendingCall, Transport};
use rotation_trainer::core::matcher::MatchOutcome;
use rotation_trainer::core::protocol::OverlayCall;
use rotation_trainer::core::rotation::Rotation;
use rotation_trainer::core::session::{SessionEvent, TrainerSession};
use rotation_trainer::runtime::{init_logging, Config};
use rotation_trainer::transport::{select_transport, SocketTransport, TransportChoice};

const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(version, about = "Rotation trainer for combat-log overlays")]
struct Cli {
    /// Config file (defaults to rotation_trainer.toml next to the executable)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rotation to train (JSON)
    #[arg(short, long)]
    rotation: Option<PathBuf>,

    /// Per-job ability export (JSON)
    #[arg(short = 'a', long)]
    catalog: Option<PathBuf>,

    /// Job to assume before the log reports one
    #[arg(short, long)]
    job: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a live overlay host over its WebSocket
    Live {
        /// Endpoint, overrides the config
        #[arg(short, long)]
        url: Option<String>,
        /// Overlay page query string, e.g. `?OVERLAY_WS=ws://127.0.0.1:10501/ws`
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Feed a recorded network log through the matcher
    Replay {
        #[arg(short, long)]
        log: PathBuf,
    },
    /// Practice from stdin: one chord per line, `+<ms>` advances the clock
    Drill,
}

/// Everything loaded from disk before a mode starts
struct Setup {
    config: Config,
    catalog: StaticCatalog,
    rotation: Option<Rotation>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = match cli.config.clone().map(Ok).unwrap_or_else(Config::default_path) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let config_dir = config_path.parent().unwrap_or(Path::new("."));
    init_logging(config.logging.console, config.log_file_path(config_dir));

    let setup = match load_setup(&cli, config) {
        Ok(setup) => setup,
        Err(e) => {
            error!(error = %e, "[MAIN] Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let mut session = match build_session(&cli, &setup) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "[MAIN] Invalid rotation");
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Commands::Live { url, query } => run_live(&setup, &mut session, url.clone(), query.as_deref()),
        Commands::Replay { log } => run_replay(&setup, &mut session, log),
        Commands::Drill => run_drill(&setup, &mut session),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "[MAIN] Stopped");
            ExitCode::FAILURE
        }
    }
}

fn load_setup(cli: &Cli, config: Config) -> Result<Setup, String> {
    let catalog = match &cli.catalog {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
            StaticCatalog::from_json_str(&json).map_err(|e| e.to_string())?
        }
        None => StaticCatalog::new(),
    };

    let rotation = match &cli.rotation {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
            Some(Rotation::from_json_str(&json).map_err(|e| format!("{}: {}", path.display(), e))?)
        }
        None => None,
    };

    info!(
        abilities = catalog.len(),
        rotation = rotation.as_ref().map(|r| r.title.as_str()).unwrap_or(""),
        "[MAIN] Setup loaded"
    );
    Ok(Setup {
        config,
        catalog,
        rotation,
    })
}

fn build_session(cli: &Cli, setup: &Setup) -> Result<TrainerSession, String> {
    let mut session = TrainerSession::new(setup.config.trainer.session_options())
        .with_bindings(setup.config.key_bindings());

    if let Some(job_id) = cli.job.or(setup.config.trainer.job_id) {
        session.set_job(job_id);
    }
    for event in session
        .select_rotation(setup.rotation.clone())
        .map_err(|e| e.to_string())?
    {
        report(&event, &session, &setup.catalog);
    }

    // Lay the job's abilities out on the hotbars like a fresh character
    if let Some(job_id) = session.job() {
        let ids: Vec<_> = setup
            .catalog
            .abilities_for_job(job_id)
            .into_iter()
            .map(|a| a.id)
            .collect();
        let placed = session.layout_mut().auto_assign(&ids);
        info!(job_id, placed, "[MAIN] Hotbars assigned");
    }

    Ok(session)
}

// =============================================================================
// MODES
// =============================================================================

fn run_live(
    setup: &Setup,
    session: &mut TrainerSession,
    url: Option<String>,
    query: Option<&str>,
) -> Result<(), String> {
    let url = match (url, query) {
        (Some(url), _) => url,
        (None, Some(query)) => match select_transport(query, false) {
            TransportChoice::Socket(url) => url,
            other => return Err(format!("No socket endpoint in query ({:?})", other)),
        },
        (None, None) if !setup.config.transport.url.is_empty() => setup.config.transport.url.clone(),
        (None, None) => return Err("No transport url configured".to_string()),
    };

    let mut transport = SocketTransport::connect(&url, setup.config.transport.reconnect_delay());
    session.attach(&mut transport);
    let mut language: Option<PendingCall> = Some(transport.call(OverlayCall::GetLanguage));

    let started = Instant::now();
    loop {
        session.tick(started.elapsed().as_millis() as u64);
        for event in session.update(&mut transport) {
            report(&event, session, &setup.catalog);
        }

        if let Some(result) = language.as_mut().and_then(PendingCall::try_result) {
            match result {
                Ok(response) => info!(response = ?response, "[MAIN] Host language"),
                Err(e) => warn!(error = %e, "[MAIN] Language query failed"),
            }
            language = None;
        }

        thread::sleep(FRAME);
    }
}

fn run_replay(setup: &Setup, session: &mut TrainerSession, log: &Path) -> Result<(), String> {
    let file = fs::File::open(log).map_err(|e| format!("{}: {}", log.display(), e))?;
    let mut lines = 0usize;
    let mut mismatches = 0usize;

    for line in std::io::BufReader::new(file).lines() {
        let line = line.map_err(|e| e.to_string())?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }
        lines += 1;
        let fields: Vec<&str> = line.split('|').collect();
        for event in session.ingest_line(&fields) {
            if matches!(event, SessionEvent::Matched(MatchOutcome::Mismatch { .. })) {
                mismatches += 1;
            }
            report(&event, session, &setup.catalog);
        }
    }

    let state = session.matcher().state();
    info!(
        lines,
        accepted = session.history().count(),
        mismatches,
        iterations = state.iteration,
        "[MAIN] Replay finished"
    );
    Ok(())
}

fn run_drill(setup: &Setup, session: &mut TrainerSession) -> Result<(), String> {
    let stdin = std::io::stdin();
    let mut now_ms = 0u64;

    for line in stdin.lock().lines() {
        let line = line.map_err(|e| e.to_string())?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(delta) = input.strip_prefix('+') {
            let delta: u64 = delta
                .parse()
                .map_err(|_| format!("invalid delay '{}'", delta))?;
            now_ms += delta;
            session.tick(now_ms);
            continue;
        }

        let Some(chord) = KeyChord::parse(input) else {
            warn!(input, "[MAIN] Not a key chord");
            continue;
        };
        for event in session.press(&setup.catalog, &chord) {
            report(&event, session, &setup.catalog);
        }
    }
    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================

fn report<C: AbilityCatalog>(event: &SessionEvent, session: &TrainerSession, catalog: &C) {
    match event {
        SessionEvent::Triggered { ability_id, at_ms } => {
            println!("{:>8} ms  {}", at_ms, ability_name(catalog, *ability_id))
        }
        SessionEvent::OnCooldown {
            ability_id,
            remaining_ms,
        } => println!(
            "            {} not ready ({})",
            ability_name(catalog, *ability_id),
            format_cooldown(*remaining_ms)
        ),
        SessionEvent::Matched(outcome) => {
            let matcher = session.matcher();
            let state = matcher.state();
            let phase = matcher
                .rotation()
                .and_then(|r| r.phases.get(state.phase_index));
            let phase_len = phase.map(|p| p.actions.len()).unwrap_or(0);
            let next = matcher
                .expected()
                .map(|id| ability_name(catalog, id))
                .unwrap_or_default();

            let label = match outcome {
                MatchOutcome::Mismatch { expected, .. } => {
                    format!("missed {}, restart", ability_name(catalog, *expected))
                }
                MatchOutcome::PhaseCompleted { completed, .. } => {
                    format!("phase {} done", completed + 1)
                }
                MatchOutcome::Looped { iteration, .. } => format!("loop {}", iteration),
                MatchOutcome::Advanced { .. } | MatchOutcome::Idle => String::new(),
            };
            println!(
                "            [{} {}] next: {} {}",
                phase.map(|p| p.tag.as_str()).unwrap_or("-"),
                format_progress(state.action_index, phase_len),
                next,
                label
            );
        }
        SessionEvent::JobChangeRequested(job_id) => {
            println!("Switch to job {} for this rotation", job_id)
        }
        SessionEvent::JobChanged(job_id) => {
            println!("Job changed to {}, select a rotation", job_id)
        }
        SessionEvent::ConnectionChanged(status) => println!("Connection: {:?}", status),
        SessionEvent::PrimaryPlayerChanged { player_name, .. } => {
            println!("Player: {}", player_name)
        }
        SessionEvent::ZoneChanged { zone_name, .. } => println!("Zone: {}", zone_name),
        SessionEvent::LogLineRejected { .. } => {}
    }
}

fn ability_name<C: AbilityCatalog>(catalog: &C, id: u32) -> String {
    catalog
        .ability(id)
        .map(|a| a.name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("#{}", id))
}
