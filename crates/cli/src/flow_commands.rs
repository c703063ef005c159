use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
    clap::Args,
    parley_common::{
        WizardContext,
        hooks::{WizardNotification, WizardObserver},
    },
    parley_config::{FlowReport, Severity, check_flow_file, load_flow},
    parley_sessions::FileSessionStore,
    parley_wizard::{RunOutcome, Wizard},
    tracing::{debug, info},
};

use crate::terminal::TerminalChannel;

#[derive(Args)]
pub struct RunArgs {
    /// Flow file (.toml, .yaml, .yml or .json).
    pub flow: PathBuf,

    /// User id the run is bound to.
    #[arg(long, env = "PARLEY_USER", default_value = "local")]
    pub user: String,

    /// Channel id recorded in the session.
    #[arg(long, default_value = "terminal")]
    pub channel: String,

    /// Continue a saved session instead of starting over.
    #[arg(long, value_name = "SESSION_ID", requires = "state_dir")]
    pub resume: Option<String>,

    /// Directory holding session snapshots. Enables persistence.
    #[arg(long, env = "PARLEY_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

/// Logs every lifecycle notification.
struct TraceObserver;

#[async_trait]
impl WizardObserver for TraceObserver {
    fn name(&self) -> &str {
        "trace"
    }

    async fn notify(&self, notification: &WizardNotification) -> Result<()> {
        debug!(
            event = ?notification.event(),
            payload = %serde_json::to_string(notification)?,
            "wizard event"
        );
        Ok(())
    }
}

pub async fn run(args: RunArgs) -> Result<()> {
    let report = check_flow_file(&args.flow);
    if report.has_errors() {
        print_report(&report, false);
        bail!("{} has errors", args.flow.display());
    }

    let mut flow = load_flow(&args.flow)?;
    if let Some(id) = &args.resume {
        flow.session_id = Some(id.clone());
    }
    if args.state_dir.is_some() {
        flow.persist = true;
    }

    let channel = Arc::new(TerminalChannel::stdio(&args.user));
    let mut builder = Wizard::from_flow(channel, &flow)?.observer(Arc::new(TraceObserver));
    if let Some(dir) = &args.state_dir {
        builder = builder.store(Arc::new(FileSessionStore::new(dir)));
    }
    let wizard = Arc::new(builder.build()?);
    if flow.persist {
        info!(session_id = %wizard.session_id(), "session snapshots enabled");
    }

    let interrupt = tokio::spawn({
        let wizard = Arc::clone(&wizard);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                wizard.cancel().await;
            }
        }
    });

    let outcome = match &args.resume {
        Some(id) => match wizard.resume(id).await? {
            Some(outcome) => outcome,
            None => {
                interrupt.abort();
                bail!("no saved session \"{id}\"");
            },
        },
        None => {
            wizard
                .start(WizardContext::new(&args.user, &args.channel))
                .await?
        },
    };
    interrupt.abort();

    match outcome {
        RunOutcome::Completed { responses } => {
            println!("{}", serde_json::to_string_pretty(&responses)?);
            Ok(())
        },
        RunOutcome::Cancelled { step_id, reason } => {
            info!(step_id = ?step_id, reason = ?reason, "run cancelled");
            std::process::exit(2);
        },
        RunOutcome::Errored { step_id, error } => {
            bail!(
                "run failed at step {}: {error}",
                step_id.as_deref().unwrap_or("-")
            )
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn check(flow: PathBuf, verbose: bool) -> Result<()> {
    eprintln!("Checking {}\n", flow.display());

    let report = check_flow_file(&flow);
    print_report(&report, verbose);

    if report.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &FlowReport, verbose: bool) {
    let mut shown = 0;
    for d in &report.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{}{RESET} {}", d.severity, d.message);
        } else {
            eprintln!(
                "  {BOLD}{color}{}{RESET} {}: {}",
                d.severity, d.path, d.message
            );
        }
        shown += 1;
    }

    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
}
