mod commands;

use clap::Parser;
use commands::{Command, HELP, StagedWidgets};
use reloop_core::{
    Delta, Element, IdleBehavior, OutputSink, RerunData, RunnerConfig, ScriptRunner,
    ScriptRunnerEvent, WidgetStates, WidgetValue,
};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reloop")]
#[command(about = "Run an .arc script and rerun it on request", long_about = None)]
struct Cli {
    #[arg(value_name = "SCRIPT", help = "Path to the .arc script")]
    script: PathBuf,

    #[arg(
        value_name = "ARGS",
        help = "Arguments passed to the script",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    args: Vec<String>,

    #[arg(short, long, value_name = "FILE", help = "Initial widget values (JSON)")]
    widgets: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE", help = "Runner configuration (JSON)")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Keep running and read commands from stdin")]
    interactive: bool,

    #[arg(short, long, help = "Also print widgets and empty placeholders")]
    verbose: bool,
}

#[derive(Default)]
struct Summary {
    runs: AtomicUsize,
    deltas: AtomicUsize,
    compile_errors: AtomicUsize,
    runtime_errors: AtomicUsize,
}

impl Summary {
    fn record_event(&self, event: &ScriptRunnerEvent) {
        match event {
            ScriptRunnerEvent::ScriptStarted => {
                let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
                println!("--- run {run} ---");
            }
            ScriptRunnerEvent::ScriptStoppedWithCompileError { details } => {
                self.compile_errors.fetch_add(1, Ordering::Relaxed);
                eprintln!("Compile error: {details}");
            }
            ScriptRunnerEvent::ScriptStoppedWithSuccess | ScriptRunnerEvent::Shutdown => {
                debug!("{event}");
            }
        }
    }

    fn print(&self) {
        println!();
        println!("Run Summary:");
        println!("============");
        println!("  Runs:           {}", self.runs.load(Ordering::Relaxed));
        println!("  Deltas:         {}", self.deltas.load(Ordering::Relaxed));
        println!("  Compile errors: {}", self.compile_errors.load(Ordering::Relaxed));
        println!("  Runtime errors: {}", self.runtime_errors.load(Ordering::Relaxed));
    }
}

struct CliOutput {
    verbose: bool,
    summary: Arc<Summary>,
}

impl OutputSink for CliOutput {
    fn emit(&mut self, delta: Delta) {
        self.summary.deltas.fetch_add(1, Ordering::Relaxed);
        let slot = delta.index;
        match delta.element {
            Element::Text { body } | Element::Markdown { body } => println!("[{slot:>3}] {body}"),
            Element::Exception { message } => {
                self.summary.runtime_errors.fetch_add(1, Ordering::Relaxed);
                eprintln!("[{slot:>3}] Error: {message}");
            }
            Element::Widget { id, value, .. } if self.verbose => {
                println!("[{slot:>3}] {id} = {value}");
            }
            Element::Empty if self.verbose => println!("[{slot:>3}] <empty>"),
            Element::Widget { .. } | Element::Empty => {}
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if !cli.script.exists() {
        eprintln!("Error: File not found: {}", cli.script.display());
        std::process::exit(1);
    }

    let mut config = match cli.config.as_deref().map(RunnerConfig::load) {
        None => RunnerConfig::default(),
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    };
    config.idle_behavior = if cli.interactive {
        IdleBehavior::Wait
    } else {
        IdleBehavior::ExitWhenDrained
    };

    let initial_widgets = match cli.widgets.as_deref().map(load_widget_states) {
        None => None,
        Some(Ok(states)) => Some(states),
        Some(Err(e)) => {
            eprintln!("Error loading widget values: {e}");
            std::process::exit(1);
        }
    };

    let summary = Arc::new(Summary::default());
    let output = CliOutput {
        verbose: cli.verbose,
        summary: Arc::clone(&summary),
    };

    let mut builder = ScriptRunner::builder(&cli.script, output)
        .argv(cli.args)
        .config(config);
    if let Some(states) = initial_widgets {
        builder = builder.widget_states(states);
    }
    let mut runner = builder.build();

    let observer = Arc::clone(&summary);
    runner
        .events()
        .subscribe(move |event| observer.record_event(event));

    info!(
        "Session {} running {}",
        runner.session_id(),
        cli.script.display()
    );
    runner.enqueue_rerun(RerunData::new());
    if let Err(e) = runner.start() {
        eprintln!("Error starting runner: {e}");
        std::process::exit(1);
    }

    if cli.interactive {
        read_commands(&runner);
        runner.enqueue_shutdown();
    }

    let result = runner.join();
    summary.print();

    if let Err(e) = result {
        eprintln!("Engine error: {e}");
        std::process::exit(1);
    }
    if summary.compile_errors.load(Ordering::Relaxed) > 0 {
        std::process::exit(1);
    }
}

fn load_widget_states(path: &Path) -> Result<WidgetStates, String> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file: {e}"))?;
    WidgetStates::from_json(&contents).map_err(|e| format!("Failed to parse widget values: {e}"))
}

/// Forwards stdin commands to the runner until `quit` or end of input.
fn read_commands(runner: &ScriptRunner) {
    eprintln!("{HELP}");
    let mut staged = StagedWidgets::default();

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read stdin: {e}");
                break;
            }
        };

        match commands::parse_command(&line) {
            Ok(None) => {}
            Ok(Some(Command::Rerun(args))) => runner.enqueue_rerun(staged.take_rerun(args)),
            Ok(Some(Command::Set(id, value))) => staged.stage(id, value),
            Ok(Some(Command::Click(id))) => staged.stage(id, WidgetValue::Trigger(true)),
            Ok(Some(Command::Stop)) => runner.enqueue_stop(),
            Ok(Some(Command::Help)) => eprintln!("{HELP}"),
            Ok(Some(Command::Quit)) => break,
            Err(message) => eprintln!("{message}"),
        }
    }
}
