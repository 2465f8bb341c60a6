//! Flow dispatcher
//!
//! One `FlowRunner` per live channel. The walk is a plain loop over node
//! ids, never recursion: flows are legitimately cyclic (retry loops) and a
//! long call must not grow the stack. Loop bounds come from per-node retry
//! budgets in the flow itself; the engine adds no global iteration ceiling.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ivr_engine_config::Settings;
use ivr_engine_core::{
    CallSummary, Channel, EngineError, ExecutionState, FinalStatus, FlowConfig, PromptResolver,
};
use ivr_engine_reporting::{normalize_variables, OutboundCallTracker, SummarySink};
use serde_json::Value;
use tokio::time;
use tracing::{debug, info, warn};

use crate::handlers::{self, CallContext};

/// Channel variable carrying the origination correlation id on outbound
/// calls.
const OUTBOUND_CALL_ID_VAR: &str = "OUTBOUND_CALL_ID";

pub struct FlowRunner {
    channel: Arc<dyn Channel>,
    config: FlowConfig,
    settings: Settings,
    http: reqwest::Client,
    sink: Option<Arc<dyn SummarySink>>,
}

impl FlowRunner {
    pub fn new(channel: Arc<dyn Channel>, config: FlowConfig, settings: Settings) -> Self {
        Self {
            channel,
            config,
            settings,
            http: reqwest::Client::new(),
            sink: None,
        }
    }

    /// Deliver the terminal summary to this sink in addition to returning
    /// it.
    pub fn with_sink(mut self, sink: Arc<dyn SummarySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run the flow to completion on this channel and classify the outcome.
    /// Every exit path yields a summary; reporting failures never surface.
    pub async fn run(self) -> CallSummary {
        let caller_id = self.channel.caller_id().unwrap_or("unknown").to_string();
        let mut state = ExecutionState::new(
            &caller_id,
            self.channel.id(),
            &self.config.id,
            &self.config.name,
            &self.config.extension,
        );
        state.seed_variable("language", Value::String(self.config.language.clone()));
        for (name, value) in &self.settings.seed_variables {
            state.seed_variable(name, Value::String(value.clone()));
        }

        let prompts =
            PromptResolver::for_language(self.config.prompt_cache.clone(), &self.config.language);
        let tracker = self.outbound_tracker().await;

        info!(
            caller_id = %caller_id,
            channel = %self.channel.id(),
            ivr = %self.config.name,
            extension = %self.config.extension,
            "call started"
        );

        if self.channel.answer().await.is_err() {
            state.final_status = FinalStatus::CallerHangupEarly;
            return self.finish(state, tracker).await;
        }
        if let Some(tracker) = &tracker {
            tracker.answered(self.channel.id()).await;
        }
        time::sleep(Duration::from_millis(self.settings.playback.answer_settle_ms)).await;

        // the call's single DTMF subscription, lent to every handler
        let mut dtmf = self.channel.subscribe_dtmf();

        let mut next_id = Some(self.config.flow.start_node.clone());
        while let Some(id) = next_id {
            let Some(node) = self.config.flow.node(&id) else {
                debug!(node = %id, "node not in flow, ending");
                break;
            };
            state.current_node = Some(id.clone());
            state.node_history.push(id.clone());
            debug!(node = %id, kind = ?node.kind, "executing node");

            let mut ctx = CallContext {
                channel: self.channel.as_ref(),
                dtmf: &mut dtmf,
                prompts: &prompts,
                settings: &self.settings,
                http: &self.http,
                flow: &self.config.flow,
                state: &mut state,
            };
            match handlers::execute(&mut ctx, node).await {
                Ok(next) => next_id = next,
                Err(EngineError::ChannelGone) => {
                    info!(node = %id, "caller hung up mid-flow");
                    state.final_status = FinalStatus::CallerHangupEarly;
                    break;
                }
                Err(err) => {
                    warn!(node = %id, %err, "node failed");
                    match &node.on_error {
                        Some(route) => next_id = Some(route.clone()),
                        None => {
                            state.final_status = FinalStatus::Error;
                            break;
                        }
                    }
                }
            }
        }

        if state.final_status == FinalStatus::InProgress {
            state.final_status = if state.completed_flow || state.transferred {
                FinalStatus::FlowCompleted
            } else {
                FinalStatus::FlowEnded
            };
        }

        // idempotent; a transferred leg belongs to the dialplan now and a
        // lost leg is already gone
        if !state.transferred && state.final_status != FinalStatus::CallerHangupEarly {
            let _ = self.channel.hangup().await;
        }

        self.finish(state, tracker).await
    }

    async fn outbound_tracker(&self) -> Option<OutboundCallTracker> {
        match self.channel.get_variable(OUTBOUND_CALL_ID_VAR).await {
            Ok(Some(call_id)) if !call_id.is_empty() => Some(OutboundCallTracker::new(
                self.http.clone(),
                &self.settings.platform_api_url,
                &call_id,
            )),
            _ => None,
        }
    }

    async fn finish(
        &self,
        state: ExecutionState,
        tracker: Option<OutboundCallTracker>,
    ) -> CallSummary {
        let summary = CallSummary {
            ivr_id: self.config.id.clone(),
            ivr_name: self.config.name.clone(),
            extension: self.config.extension.clone(),
            caller_id: state
                .variables
                .get("caller_id")
                .map(ivr_engine_core::state::render_value)
                .unwrap_or_default(),
            start_time: state.started_at,
            end_time: Utc::now(),
            node_history: state.node_history,
            dtmf_inputs: state.dtmf_inputs,
            api_calls: state.api_calls,
            variables: normalize_variables(&state.variables, &self.config.flow.capture_variables),
            final_status: state.final_status,
            completed_flow: state.completed_flow,
        };

        info!(
            caller_id = %summary.caller_id,
            status = ?summary.final_status,
            nodes = summary.node_history.len(),
            duration_secs = summary.duration_secs(),
            "call finished"
        );

        if let Some(tracker) = tracker {
            tracker.finished(&summary).await;
        }
        if let Some(sink) = &self.sink {
            sink.record_best_effort(&summary).await;
        }
        summary
    }
}
