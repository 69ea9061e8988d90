//! The `think` command: provider setup, the step/command loop, and the trace.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use tracing::{info, warn};
use uuid::Uuid;

use ponder_config::{ProviderConfig, ProviderManager};
use ponder_core::{
    cost, Command, CostBreakdown, Mode, PonderError, PricingTable, SessionOptions, Transcript,
};
use ponder_engine::providers::OpenAiCompatibleTransport;
use ponder_engine::{load_system_prompt, FileDebugSink, ReasoningSession, StepOutcome};
use ponder_logging::{SessionEvent, SessionEventLogger};

use crate::commands::{AutoCommands, AutoMode, CommandSource, InteractiveCommands};
use crate::terminal_output::{
    display_auto_command, display_cost_summary, display_session_start, display_step, note_success,
    note_warn,
};
use crate::spinner::with_spinner;
use crate::trace::{save_trace, ReasoningTrace, StepData, TraceStep, TraceUsage};

/// Message shown beside the spinner during a model call.
const THINKING: &str = "Thinking";

#[derive(Debug, Clone)]
pub struct ThinkArgs {
    pub task: String,
    pub mode: Mode,
    pub language: String,
    pub max_steps: u32,
    pub provider: String,
    pub providers_dir: PathBuf,
    pub output_dir: PathBuf,
    pub auto: bool,
    pub auto_mode: AutoMode,
    pub debug: bool,
    /// Extra attempts for a step whose call or parse failed. 0 surfaces the first failure.
    pub retries: u32,
}

/// Everything a session produced, complete or not.
#[derive(Debug, Default)]
pub struct SessionRun {
    pub steps: Vec<TraceStep>,
    pub commands: Vec<Command>,
    pub total_costs: CostBreakdown,
    /// The last step carried a terminal flag.
    pub terminal: bool,
}

/// Per-run settings the loop needs besides the engine.
pub struct LoopContext<'a> {
    pub session_id: &'a str,
    pub pricing: &'a PricingTable,
    /// Keep full token usage in the trace.
    pub detailed_usage: bool,
    pub retries: u32,
}

pub async fn run_think(args: ThinkArgs) -> Result<PathBuf> {
    let manager = ProviderManager::new(&args.providers_dir);
    let provider = manager.load_provider(Some(&args.provider)).await?;

    let options = SessionOptions::new(&args.task)
        .with_mode(args.mode)
        .with_language(&args.language)
        .with_max_steps(args.max_steps);
    let session_id = Uuid::new_v4().to_string();

    let mut session = build_session(&provider).await?;
    if args.debug {
        let debug_dir = args.output_dir.join(&session_id).join("debug");
        info!(dir = %debug_dir.display(), "Debug records enabled");
        session = session.with_debug_sink(Arc::new(FileDebugSink::new(debug_dir)));
    }

    let metadata = provider.metadata();
    display_session_start(&options, &metadata);
    SessionEventLogger::log_event(
        &session_id,
        SessionEvent::SessionStarted {
            provider: metadata.name.clone(),
            model: metadata.model.clone(),
            task: options.task.clone(),
        },
    );

    let mut source: Box<dyn CommandSource> = if args.auto {
        Box::new(AutoCommands::new(args.auto_mode))
    } else {
        Box::new(InteractiveCommands::stdio())
    };

    let ctx = LoopContext {
        session_id: &session_id,
        pricing: &provider.pricing,
        detailed_usage: args.debug,
        retries: args.retries,
    };
    let mut run = SessionRun::default();
    let outcome = drive(&session, &options, source.as_mut(), &ctx, &mut run).await;

    display_cost_summary(&run.total_costs);
    SessionEventLogger::log_event(
        &session_id,
        SessionEvent::SessionFinished {
            steps: run.steps.len() as u32,
            total_cost: run.total_costs.total_cost,
            terminal: run.terminal,
        },
    );

    let trace = ReasoningTrace {
        timestamp: Local::now(),
        session_id: session_id.clone(),
        task: options.task.clone(),
        mode: options.mode,
        language: options.reasoning_language.clone(),
        max_steps: options.max_steps,
        step_data: StepData { steps: run.steps },
        commands: run.commands,
        total_costs: run.total_costs,
        provider: metadata,
    };
    let path = save_trace(&trace, &args.output_dir).await?;
    note_success(&format!("Trace saved to {}", path.display()));

    if let Err(e) = outcome {
        SessionEventLogger::log_event(&session_id, SessionEvent::Error { error_msg: format!("{e:#}") });
        return Err(e);
    }
    Ok(path)
}

async fn build_session(provider: &ProviderConfig) -> Result<ReasoningSession> {
    let mut transport = OpenAiCompatibleTransport::new(&provider.api_key, &provider.model);
    if let Some(url) = &provider.base_url {
        transport = transport.with_base_url(url);
    }
    if let Some(secs) = provider.timeout_secs {
        transport = transport.with_timeout(Duration::from_secs(secs))?;
    }
    let system_prompt = load_system_prompt(provider.system_prompt_path.as_deref()).await?;

    Ok(ReasoningSession::new(Arc::new(transport))
        .with_system_prompt(system_prompt)
        .with_sampling(provider.sampling_params()))
}

/// Run the step/command loop until a terminal step, an exit, or (for
/// automatic sources) `max_steps` steps. `run` holds whatever was produced
/// even when an error ends the loop early.
pub async fn drive(
    session: &ReasoningSession,
    options: &SessionOptions,
    source: &mut dyn CommandSource,
    ctx: &LoopContext<'_>,
    run: &mut SessionRun,
) -> Result<()> {
    let mut transcript = Transcript::new();

    let first = with_spinner(THINKING, session.start(&mut transcript, options)).await;
    let mut outcome = recover(session, &mut transcript, first, ctx.retries).await?;
    let mut step_number = 1;
    record_step(run, &outcome, step_number, options.max_steps, ctx);

    loop {
        if outcome.step.is_terminal() {
            run.terminal = true;
            info!(steps = step_number, "Reached a final result");
            break;
        }
        if source.is_automatic() && step_number >= options.max_steps {
            info!(steps = step_number, "Step limit reached without a final result");
            break;
        }

        let Some(command) = source.next_command()? else {
            info!(steps = step_number, "Session ended by user");
            break;
        };
        if source.is_automatic() {
            display_auto_command(&command);
        }
        SessionEventLogger::log_event(
            ctx.session_id,
            SessionEvent::CommandIssued {
                step_number: step_number + 1,
                command: command.to_string(),
            },
        );
        run.commands.push(command.clone());

        let next = with_spinner(THINKING, session.continue_with(&mut transcript, &command)).await;
        outcome = recover(session, &mut transcript, next, ctx.retries).await?;
        step_number += 1;
        record_step(run, &outcome, step_number, options.max_steps, ctx);
    }
    Ok(())
}

fn is_retryable(error: &PonderError) -> bool {
    matches!(
        error,
        PonderError::Transport { .. } | PonderError::ResponseFormat { .. }
    )
}

/// Re-issue the pending user turn, at most `retries` times, when asked to.
async fn recover(
    session: &ReasoningSession,
    transcript: &mut Transcript,
    mut result: Result<StepOutcome, PonderError>,
    retries: u32,
) -> Result<StepOutcome, PonderError> {
    for attempt in 1..=retries {
        match result {
            Err(e) if is_retryable(&e) && transcript.awaiting_reply() => {
                warn!(attempt, error = %e, "Step failed; retrying");
                note_warn(&format!("{e} (retry {attempt}/{retries})"));
                result = with_spinner(THINKING, session.retry_pending(transcript)).await;
            }
            other => return other,
        }
    }
    result
}

fn record_step(
    run: &mut SessionRun,
    outcome: &StepOutcome,
    step_number: u32,
    max_steps: u32,
    ctx: &LoopContext<'_>,
) {
    let costs = cost(&outcome.usage, ctx.pricing);
    run.total_costs += costs;

    display_step(&outcome.step, step_number, max_steps, &outcome.usage, &costs);
    SessionEventLogger::log_event(
        ctx.session_id,
        SessionEvent::StepCompleted {
            step_number,
            title: outcome.step.step_title.clone(),
            solution: outcome.step.solution_type().as_str().to_string(),
            total_tokens: outcome.usage.total_tokens,
            cost: costs.total_cost,
        },
    );

    run.steps.push(TraceStep {
        step: outcome.step.clone(),
        token_usage: TraceUsage::from_usage(&outcome.usage, ctx.detailed_usage),
        costs,
    });
}
