use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use podgen::audio::{AudioAssembler, AudioSegment};
use podgen::cli::{Cli, Commands};
use podgen::config::Config;
use podgen::daemon::run_daemon;
use podgen::ipc::client::{follow, send_command};
use podgen::ipc::protocol::{Command, Response};
use podgen::ipc::server::IpcServer;
use podgen::status::{GenerationRun, Stage, StatusUpdate};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "podgen", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    podgen::logging::init(&config.logging.level, cli.verbose, cli.quiet)?;

    let socket_path = cli
        .socket
        .or_else(|| config.daemon.socket_path.clone())
        .unwrap_or_else(IpcServer::default_socket_path);

    match cli.command {
        Commands::Daemon => {
            run_daemon(config, Some(socket_path)).await?;
        }
        Commands::Generate { podcast_id, follow } => {
            handle_generate(&socket_path, podcast_id, follow).await?;
        }
        Commands::Status { podcast_id } => {
            handle_ipc_command(&socket_path, Command::Status { podcast_id }).await?;
        }
        Commands::Cancel { podcast_id } => {
            handle_ipc_command(&socket_path, Command::Cancel { podcast_id }).await?;
        }
        Commands::Follow { podcast_id } => {
            println!("Following podcast {}... (Ctrl+C to stop)", podcast_id);
            handle_follow(&socket_path, &podcast_id, false).await?;
        }
        Commands::Assemble { inputs, output } => {
            handle_assemble(&config, &inputs, &output)?;
        }
        // Handled before the configuration is loaded.
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` must exist; the default path falls back to built-in
/// defaults. Environment overrides apply last.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides()?)
}

async fn handle_generate(socket_path: &Path, podcast_id: String, follow: bool) -> Result<()> {
    let response = connect_or_exit(socket_path, Command::Generate { podcast_id }).await;
    let podcast_id = match &response {
        Response::Started { podcast_id, .. } => podcast_id.clone(),
        _ => {
            exit_on_failure(print_response(&response));
            return Ok(());
        }
    };
    print_response(&response);

    if follow {
        handle_follow(socket_path, &podcast_id, true).await?;
    }
    Ok(())
}

async fn handle_ipc_command(socket_path: &Path, command: Command) -> Result<()> {
    let response = connect_or_exit(socket_path, command).await;
    exit_on_failure(print_response(&response));
    Ok(())
}

/// Print updates until the run ends.
///
/// With `stop_on_snapshot`, a run that is already terminal when following starts
/// ends the stream too; otherwise the next run of the podcast is awaited.
async fn handle_follow(socket_path: &Path, podcast_id: &str, stop_on_snapshot: bool) -> Result<()> {
    let mut last_stage = None;
    let mut rejected = false;

    let followed = follow(socket_path, podcast_id, |response| match response {
        Response::Run { run } => {
            print_run(run);
            last_stage = Some(run.stage);
            !(stop_on_snapshot && run.is_terminal())
        }
        Response::Update { update } => {
            print_update(update);
            last_stage = Some(update.stage);
            !update.is_terminal()
        }
        other => {
            rejected = !print_response(other);
            false
        }
    })
    .await;

    if let Err(e) = followed {
        eprintln!("{} {}", "Failed to follow daemon:".red(), e);
        eprintln!("Is the daemon running? Start it with: podgen daemon");
        std::process::exit(1);
    }
    exit_on_failure(!rejected && last_stage != Some(Stage::Error));
    Ok(())
}

fn handle_assemble(config: &Config, inputs: &[PathBuf], output: &Path) -> Result<()> {
    config.validate()?;

    let segments = inputs
        .iter()
        .enumerate()
        .map(|(sequence, path)| {
            let data = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let segment = AudioSegment::new(sequence, data);
            Ok(match path.extension().and_then(|ext| ext.to_str()) {
                Some(ext) => segment.with_codec(ext.to_ascii_lowercase()),
                None => segment,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let assembler = AudioAssembler::new(config.orchestrator_config().output);
    let audio = assembler.assemble(segments)?;
    std::fs::write(output, &audio.data)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} {} ({} segments, {:.2}s, {} Hz, {} ch)",
        "Wrote".green(),
        output.display(),
        audio.segment_count,
        audio.duration().as_secs_f64(),
        audio.sample_rate,
        audio.channels
    );
    Ok(())
}

async fn connect_or_exit(socket_path: &Path, command: Command) -> Response {
    match send_command(socket_path, command).await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("{} {}", "Failed to reach daemon:".red(), e);
            eprintln!("Is the daemon running? Start it with: podgen daemon");
            std::process::exit(1);
        }
    }
}

fn exit_on_failure(success: bool) {
    if !success {
        std::process::exit(1);
    }
}

/// Print a response; returns false for error responses.
fn print_response(response: &Response) -> bool {
    match response {
        Response::Ok => println!("{}", "OK".green()),
        Response::Started { podcast_id, run_id } => {
            println!("{} podcast {} (run {})", "Started".green(), podcast_id, run_id);
        }
        Response::Run { run } => print_run(run),
        Response::Update { update } => print_update(update),
        Response::Error { code, message } => {
            eprintln!("{} {} {}", "Error:".red(), message, format!("[{code}]").dimmed());
            return false;
        }
    }
    true
}

fn print_run(run: &GenerationRun) {
    println!("Podcast {}:", run.podcast_id);
    println!("  {}      {}", "Run:".dimmed(), run.run_id);
    println!("  {}    {}", "Stage:".dimmed(), stage_label(run.stage));
    println!("  {} {}%", "Progress:".dimmed(), run.progress);
    println!("  {}  {}", "Message:".dimmed(), run.message);
    println!(
        "  {}  {}",
        "Started:".dimmed(),
        run.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  {}  {}",
        "Updated:".dimmed(),
        run.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(reference) = &run.result_reference {
        println!("  {}   {}", "Output:".dimmed(), reference);
    }
}

fn print_update(update: &StatusUpdate) {
    println!(
        "[{:>3}%] {} {}",
        update.progress,
        stage_label(update.stage),
        update.message
    );
    if let Some(reference) = &update.result_reference {
        println!("       {} {}", "Output:".dimmed(), reference);
    }
}

fn stage_label(stage: Stage) -> String {
    match stage {
        Stage::Completed => stage.as_str().green().to_string(),
        Stage::Error => stage.as_str().red().to_string(),
        Stage::Cancelled => stage.as_str().yellow().to_string(),
        _ => stage.as_str().cyan().to_string(),
    }
}
