use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use ponder_core::{
    normalize, ChatTransport, Command, Completion, DebugRecord, DebugRequest, DebugResponse,
    DebugSink, PonderError, SamplingParams, SessionOptions, Step, Transcript, UsageRecord,
    DEFAULT_LANGUAGE, DEFAULT_MAX_STEPS, DEFAULT_MODE,
};

use crate::parser::{ParseStage, ResponseParser};
use crate::prompt::DEFAULT_SYSTEM_PROMPT;

/// Result of one step exchange.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: Step,
    pub usage: UsageRecord,
    pub stage: ParseStage,
    /// Assistant text as stored in the transcript.
    pub raw: String,
}

/// Build the initial task turn. Optional lines appear only for non-default values.
pub fn format_task_message(options: &SessionOptions) -> String {
    let mut message = format!("TASK: ```{}```\n", options.task);
    if options.mode != DEFAULT_MODE {
        message.push_str(&format!("MODE: {}\n", options.mode));
    }
    if options.reasoning_language != DEFAULT_LANGUAGE {
        message.push_str(&format!("REASONING_LANGUAGE: {}\n", options.reasoning_language));
    }
    if options.max_steps != DEFAULT_MAX_STEPS {
        message.push_str(&format!("MAX_STEPS: {}\n", options.max_steps));
    }
    message
}

/// Drives the step/command exchange against a chat transport.
///
/// The engine holds no per-session state besides a debug call counter: the
/// caller owns the transcript and decides when to stop looping. Failed calls
/// leave the transcript with its pending user turn so the caller can retry
/// through [`ReasoningSession::retry_pending`].
pub struct ReasoningSession {
    transport: Arc<dyn ChatTransport>,
    system_prompt: String,
    sampling: SamplingParams,
    parser: ResponseParser,
    debug_sink: Option<Arc<dyn DebugSink>>,
    call_counter: AtomicU64,
}

impl ReasoningSession {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            sampling: SamplingParams::default(),
            parser: ResponseParser::new(),
            debug_sink: None,
            call_counter: AtomicU64::new(0),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub fn sampling(&self) -> &SamplingParams {
        &self.sampling
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Number of transport calls issued so far.
    pub fn calls_made(&self) -> u64 {
        self.call_counter.load(Ordering::Relaxed)
    }

    /// Open a session on an empty transcript with the task turn.
    pub async fn start(
        &self,
        transcript: &mut Transcript,
        options: &SessionOptions,
    ) -> Result<StepOutcome, PonderError> {
        if !transcript.is_empty() {
            return Err(PonderError::Transcript(
                "a session can only start on an empty transcript".to_string(),
            ));
        }
        if options.max_steps == 0 {
            return Err(PonderError::configuration("max_steps must be at least 1"));
        }

        info!(
            provider = %self.transport.name(),
            model = %self.transport.model(),
            mode = %options.mode,
            language = %options.reasoning_language,
            max_steps = options.max_steps,
            "Starting reasoning session"
        );

        transcript.push_user(format_task_message(options))?;
        self.exchange(transcript).await
    }

    /// Send a steering command and fetch the next step.
    pub async fn continue_with(
        &self,
        transcript: &mut Transcript,
        command: &Command,
    ) -> Result<StepOutcome, PonderError> {
        if transcript.is_empty() {
            return Err(PonderError::Transcript(
                "cannot continue a session that was never started".to_string(),
            ));
        }
        debug!(command = %command, "Issuing command");
        transcript.push_user(command.to_string())?;
        self.exchange(transcript).await
    }

    /// Re-issue the transport call for an unanswered user turn.
    pub async fn retry_pending(
        &self,
        transcript: &mut Transcript,
    ) -> Result<StepOutcome, PonderError> {
        if !transcript.awaiting_reply() {
            return Err(PonderError::Transcript(
                "no pending user turn to retry".to_string(),
            ));
        }
        info!(turns = transcript.len(), "Retrying pending turn");
        self.exchange(transcript).await
    }

    async fn exchange(&self, transcript: &mut Transcript) -> Result<StepOutcome, PonderError> {
        let call_number = self.call_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();

        let completion = self
            .transport
            .complete(&self.system_prompt, transcript, &self.sampling)
            .await
            .map_err(|e| {
                warn!(provider = %self.transport.name(), error = %e, "Transport call failed");
                PonderError::Transport {
                    provider: self.transport.name().to_string(),
                    message: format!("{e:#}"),
                }
            })?;
        let elapsed = started.elapsed().as_secs_f64();

        // Every call gets a debug record, even when its usage payload is unusable.
        let normalized = normalize(&completion.usage, elapsed);
        let recorded = normalized.as_ref().copied().unwrap_or_default();
        self.emit_debug(call_number, transcript, &completion, &recorded, elapsed)
            .await;
        let usage = normalized?;

        let (step, stage) = self.parser.parse_step(&completion.content)?;
        transcript.push_assistant(completion.content.clone())?;

        info!(
            call_number,
            stage = %stage,
            title = %step.step_title,
            solution = step.solution_type().as_str(),
            total_tokens = usage.total_tokens,
            cached_tokens = usage.cached_tokens,
            elapsed_secs = elapsed,
            "Step received"
        );

        Ok(StepOutcome {
            step,
            usage,
            stage,
            raw: completion.content,
        })
    }

    async fn emit_debug(
        &self,
        call_number: u64,
        transcript: &Transcript,
        completion: &Completion,
        usage: &UsageRecord,
        elapsed: f64,
    ) {
        let Some(sink) = &self.debug_sink else { return };
        let record = DebugRecord {
            call_number,
            timestamp: Utc::now(),
            request: DebugRequest {
                provider: self.transport.name().to_string(),
                model: self.transport.model().to_string(),
                messages: transcript.with_system_prompt(&self.system_prompt),
                sampling: self.sampling.clone(),
            },
            response: DebugResponse {
                content: completion.content.clone(),
                usage: *usage,
                provider_usage: completion.usage.clone(),
                elapsed_secs: elapsed,
            },
        };
        if let Err(e) = sink.record(&record).await {
            warn!(call_number, error = %e, "Failed to write debug record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockTransport;
    use anyhow::bail;
    use async_trait::async_trait;
    use ponder_core::{Mode, Role, SolutionType};
    use serde_json::json;
    use std::sync::Mutex;

    fn step_json(title: &str, solution: &str) -> String {
        json!({
            "step_title": title,
            "step_text": format!("thinking about {title}"),
            "reasoning_language": "English",
            "confidence_level": 3,
            "solution": {"type": solution, "content": "", "completeness": 10}
        })
        .to_string()
    }

    fn usage() -> serde_json::Value {
        json!({"prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150})
    }

    #[test]
    fn default_task_message_has_only_task_line() {
        let message = format_task_message(&SessionOptions::new("X"));
        assert_eq!(message, "TASK: ```X```\n");
    }

    #[test]
    fn non_default_task_message_lists_all_options_in_order() {
        let options = SessionOptions::new("X")
            .with_mode(Mode::GoVeryWrong)
            .with_language("French")
            .with_max_steps(5);
        assert_eq!(
            format_task_message(&options),
            "TASK: ```X```\nMODE: GO_VERY_WRONG\nREASONING_LANGUAGE: French\nMAX_STEPS: 5\n"
        );
    }

    #[tokio::test]
    async fn start_sends_system_prompt_and_task() {
        let transport = Arc::new(MockTransport::new().with_reply(step_json("one", "NONE"), usage()));
        let session = ReasoningSession::new(transport.clone()).with_system_prompt("SYS");
        let mut transcript = Transcript::new();

        let outcome = session
            .start(&mut transcript, &SessionOptions::new("X"))
            .await
            .unwrap();

        assert_eq!(outcome.step.step_title, "one");
        assert_eq!(outcome.stage, ParseStage::Direct);
        assert_eq!(outcome.usage.prompt_tokens, 100);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.turns()[1].content, outcome.raw);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system_prompt, "SYS");
        assert_eq!(requests[0].transcript.turns()[0].content, "TASK: ```X```\n");
    }

    #[tokio::test]
    async fn raw_fenced_text_is_stored_unparsed() {
        let raw = format!("Here you go\n```json\n{}\n```", step_json("fenced", "PARTIAL"));
        let transport = Arc::new(MockTransport::new().with_reply(raw.clone(), usage()));
        let session = ReasoningSession::new(transport);
        let mut transcript = Transcript::new();

        let outcome = session
            .start(&mut transcript, &SessionOptions::new("X"))
            .await
            .unwrap();
        assert_eq!(outcome.stage, ParseStage::Fenced);
        assert_eq!(transcript.turns()[1].content, raw);
    }

    #[tokio::test]
    async fn transcript_grows_by_two_per_command_and_never_changes() {
        let transport = Arc::new(
            MockTransport::new()
                .with_reply(step_json("s1", "NONE"), usage())
                .with_reply(step_json("s2", "PARTIAL"), usage())
                .with_reply(step_json("s3", "PARTIAL"), usage())
                .with_reply(step_json("s4", "FINAL"), usage()),
        );
        let session = ReasoningSession::new(transport.clone());
        let mut transcript = Transcript::new();
        session
            .start(&mut transcript, &SessionOptions::new("X"))
            .await
            .unwrap();

        let commands = [
            Command::Continue,
            Command::SwitchMode(Mode::GoVeryWrong),
            Command::ReasoningLanguage("German".into()),
        ];
        let mut snapshots = vec![transcript.clone()];
        let mut last = None;
        for command in &commands {
            last = Some(session.continue_with(&mut transcript, command).await.unwrap());
            snapshots.push(transcript.clone());
        }

        // 1 task turn + assistant reply, then 2 turns per command.
        assert_eq!(transcript.len(), 2 + 2 * commands.len());
        for earlier in &snapshots {
            assert_eq!(&transcript.turns()[..earlier.len()], earlier.turns());
        }
        assert_eq!(transcript.turns()[2].content, "CONTINUE");
        assert_eq!(transcript.turns()[4].content, "GO_VERY_WRONG");
        assert_eq!(transcript.turns()[6].content, "REASONING_LANGUAGE German");
        assert_eq!(
            last.unwrap().step.solution_type(),
            SolutionType::Final
        );
        assert_eq!(session.calls_made(), 4);

        let requests = transport.requests();
        assert_eq!(requests[3].transcript.len(), 7);
        assert_eq!(requests[3].transcript.last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn transport_failure_keeps_pending_turn_for_retry() {
        let transport = Arc::new(
            MockTransport::new()
                .with_reply(step_json("s1", "NONE"), usage())
                .with_failure("502 Bad Gateway")
                .with_reply(step_json("s2", "FINAL"), usage()),
        );
        let session = ReasoningSession::new(transport.clone());
        let mut transcript = Transcript::new();
        session
            .start(&mut transcript, &SessionOptions::new("X"))
            .await
            .unwrap();

        let err = session
            .continue_with(&mut transcript, &Command::Continue)
            .await
            .unwrap_err();
        assert!(matches!(err, PonderError::Transport { .. }));
        assert_eq!(transcript.len(), 3);
        assert!(transcript.awaiting_reply());

        // A second command cannot be stacked on the unanswered turn.
        assert!(session
            .continue_with(&mut transcript, &Command::Continue)
            .await
            .is_err());

        let outcome = session.retry_pending(&mut transcript).await.unwrap();
        assert!(outcome.step.is_terminal());
        assert_eq!(transcript.len(), 4);
        assert_eq!(transport.requests()[2].transcript.len(), 3);
    }

    #[tokio::test]
    async fn unparseable_reply_is_format_error_and_not_appended() {
        let transport = Arc::new(MockTransport::new().with_reply("no structure here", usage()));
        let session = ReasoningSession::new(transport);
        let mut transcript = Transcript::new();

        let err = session
            .start(&mut transcript, &SessionOptions::new("X"))
            .await
            .unwrap_err();
        assert_eq!(err.raw_response(), Some("no structure here"));
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn start_rejects_non_empty_transcript_and_zero_steps() {
        let session = ReasoningSession::new(Arc::new(MockTransport::new()));
        let mut transcript = Transcript::new();
        let err = session
            .start(&mut transcript, &SessionOptions::new("X").with_max_steps(0))
            .await
            .unwrap_err();
        assert!(matches!(err, PonderError::Configuration(_)));
        assert!(transcript.is_empty());

        transcript.push_user("TASK").unwrap();
        let err = session
            .start(&mut transcript, &SessionOptions::new("X"))
            .await
            .unwrap_err();
        assert!(matches!(err, PonderError::Transcript(_)));
    }

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<DebugRecord>>);

    #[async_trait]
    impl DebugSink for CollectingSink {
        async fn record(&self, record: &DebugRecord) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl DebugSink for FailingSink {
        async fn record(&self, _record: &DebugRecord) -> anyhow::Result<()> {
            bail!("disk full")
        }
    }

    #[tokio::test]
    async fn debug_sink_sees_every_call_including_bad_replies() {
        let transport = Arc::new(
            MockTransport::new()
                .with_reply(step_json("s1", "NONE"), json!({
                    "prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150,
                    "prompt_cache_hit_tokens": 30
                }))
                .with_reply("garbage", usage()),
        );
        let sink = Arc::new(CollectingSink::default());
        let session = ReasoningSession::new(transport)
            .with_system_prompt("SYS")
            .with_debug_sink(sink.clone());
        let mut transcript = Transcript::new();

        session
            .start(&mut transcript, &SessionOptions::new("X"))
            .await
            .unwrap();
        assert!(session
            .continue_with(&mut transcript, &Command::Continue)
            .await
            .is_err());

        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].call_number, 1);
        assert_eq!(records[0].request.messages[0].content, "SYS");
        assert_eq!(records[0].response.usage.cached_tokens, 30);
        assert_eq!(records[1].call_number, 2);
        assert_eq!(records[1].response.content, "garbage");
    }

    #[tokio::test]
    async fn malformed_usage_is_still_recorded_before_failing() {
        let transport = Arc::new(MockTransport::new().with_reply(
            step_json("s1", "NONE"),
            json!({"prompt_tokens": -5, "completion_tokens": 50, "total_tokens": 45}),
        ));
        let sink = Arc::new(CollectingSink::default());
        let session = ReasoningSession::new(transport).with_debug_sink(sink.clone());
        let mut transcript = Transcript::new();

        let err = session
            .start(&mut transcript, &SessionOptions::new("X"))
            .await
            .unwrap_err();
        assert!(matches!(err, PonderError::Configuration(_)));

        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response.usage, UsageRecord::default());
        assert_eq!(records[0].response.provider_usage["prompt_tokens"], -5);
        assert!(transcript.awaiting_reply());
    }

    #[tokio::test]
    async fn failing_debug_sink_does_not_affect_session() {
        let transport = Arc::new(MockTransport::new().with_reply(step_json("s1", "FINAL"), usage()));
        let session = ReasoningSession::new(transport).with_debug_sink(Arc::new(FailingSink));
        let mut transcript = Transcript::new();
        let outcome = session
            .start(&mut transcript, &SessionOptions::new("X"))
            .await
            .unwrap();
        assert!(outcome.step.is_terminal());
    }

    #[tokio::test]
    async fn sampling_params_reach_transport() {
        let transport = Arc::new(MockTransport::new().with_reply(step_json("s1", "NONE"), usage()));
        let sampling = SamplingParams {
            temperature: 0.2,
            enforce_json_response: false,
            ..Default::default()
        };
        let session = ReasoningSession::new(transport.clone()).with_sampling(sampling.clone());
        let mut transcript = Transcript::new();
        session
            .start(&mut transcript, &SessionOptions::new("X"))
            .await
            .unwrap();
        assert_eq!(transport.requests()[0].params, sampling);
    }
}
