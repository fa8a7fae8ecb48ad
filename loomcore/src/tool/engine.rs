//! The tool execution engine: schema validation, idempotency, queue-depth
//! backpressure, and debounced coalescing in front of [`ToolRegistry`] (§4.2).

use std::sync::Arc;

use serde_json::Value;

use crate::clock::Clock;

use super::coalesce::CoalescedEntry;
use super::definition::{IdempotencyMode, Scope, ToolDefinition};
use super::errors::ToolError;
use super::hash::args_hash;
use super::registry::ToolRegistry;
use super::state::{ArgsHashOutput, CallIdOutput, ExecutionState, PendingToolCall, ToolState, DEFAULT_LEASE_MS};
use super::trace::{preview, ToolTraceRecord, TraceQos, TraceStatus};

/// Terminal outcome of one call to [`ToolExecutionEngine::execute_tool_call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteStatus {
    Ok,
    Failed,
    Skipped,
    Coalesced,
}

/// Everything the caller needs to feed a `function_call_output` item back to the model.
#[derive(Debug, Clone)]
pub struct ExecuteToolCallResult {
    pub output_string: String,
    pub status: ExecuteStatus,
    pub args_hash: String,
}

/// Inputs to one tool-call execution (§4.2.1's `executeToolCall` contract).
#[derive(Debug, Clone)]
pub struct ExecuteToolCallRequest {
    pub stage: Scope,
    pub response_id: Option<String>,
    pub call_id: String,
    pub tool_name: String,
    pub tool_args: Value,
}

impl ExecuteToolCallRequest {
    fn is_final(&self) -> bool {
        self.tool_args.get("isFinal").and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Front door for every model-issued tool call.
pub struct ToolExecutionEngine {
    registry: Arc<ToolRegistry>,
    clock: Arc<dyn Clock>,
}

impl ToolExecutionEngine {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    /// Register `callId -> {toolName, argsHash}` before the engine's idempotency and
    /// queue checks run, matching the loop skeleton's `registerPending` step (§4.4.1).
    pub fn register_pending(&self, state: &mut ToolState, call_id: &str, tool_name: &str, args_hash: &str) {
        state.pending_tool_calls.insert(
            call_id.to_string(),
            PendingToolCall {
                tool_name: tool_name.to_string(),
                args_hash: args_hash.to_string(),
                created_ts: self.clock.now_ms(),
            },
        );
    }

    /// Execute (or coalesce, or replay) one tool call end to end.
    pub async fn execute_tool_call(&self, state: &mut ToolState, req: ExecuteToolCallRequest) -> ExecuteToolCallResult {
        let now = self.clock.now_ms();
        self.drain_due_entries(state, &req.tool_name, now).await;

        let def = match self.registry.definition_of(&req.tool_name).await {
            Ok(def) => def,
            Err(_) => {
                return self.fail(state, &req, now, None, "tool not found".to_string());
            }
        };

        if let Some(errors) = validate_args(&def, &req.tool_args) {
            return self.fail_validation(state, &req, now, errors);
        }

        let hash = args_hash(&req.tool_name, &req.tool_args);

        if let Some(result) = self.check_idempotency(state, &def, &req, &hash, now) {
            return result;
        }

        state.incr_queue_depth(&req.tool_name);
        let depth = state.queue_depth(&req.tool_name);
        let over_limit = depth > def.qos.queue_depth_limit as i64;
        let is_final = req.is_final();
        let coalesce_applicable = def.qos.coalesces() && !is_final;

        if coalesce_applicable {
            let result = self.accept_coalesced(state, &def, &req, &hash, now, over_limit);
            state.decr_queue_depth(&req.tool_name);
            return result;
        }

        if over_limit {
            state.decr_queue_depth(&req.tool_name);
            return self.fail_backpressure(state, &def, &req, now, depth);
        }

        if is_final {
            self.flush_entry_if_any(state, &def, &req, now).await;
        }

        let result = self.run_now(state, &def, &req, &hash, now).await;
        state.decr_queue_depth(&req.tool_name);
        result
    }

    fn check_idempotency(
        &self,
        state: &mut ToolState,
        def: &ToolDefinition,
        req: &ExecuteToolCallRequest,
        hash: &str,
        now: i64,
    ) -> Option<ExecuteToolCallResult> {
        match def.idempotency.mode {
            IdempotencyMode::None => None,
            IdempotencyMode::ByCallId => {
                let hit = state.tool_outputs_by_call_id.get(&req.call_id).cloned();
                match hit {
                    Some(cached) if cached.execution_state == ExecutionState::Completed => Some(ExecuteToolCallResult {
                        output_string: cached.output_string,
                        status: ExecuteStatus::Skipped,
                        args_hash: hash.to_string(),
                    }),
                    Some(cached)
                        if cached.execution_state == ExecutionState::AcceptedPending
                            && cached.lease_until_ts.is_some_and(|lease| lease < now) =>
                    {
                        state.tool_outputs_by_call_id.remove(&req.call_id);
                        None
                    }
                    Some(cached) => Some(ExecuteToolCallResult {
                        output_string: cached.output_string,
                        status: ExecuteStatus::Skipped,
                        args_hash: hash.to_string(),
                    }),
                    None => None,
                }
            }
            IdempotencyMode::ByArgsHash => {
                let key = format!("{}:{hash}", req.tool_name);
                let hit = state.tool_outputs_by_args_hash.get(&key).cloned();
                match hit {
                    Some(cached) => {
                        let ttl_ok = def
                            .qos
                            .cache_ttl_ms
                            .is_none_or(|ttl| now.saturating_sub(cached.ts) <= ttl as i64);
                        if ttl_ok {
                            state.tool_outputs_by_call_id.insert(
                                req.call_id.clone(),
                                CallIdOutput {
                                    output_string: cached.output_string.clone(),
                                    tool_version: def.tool_version.clone(),
                                    args_hash: hash.to_string(),
                                    ts: now,
                                    execution_state: ExecutionState::Completed,
                                    lease_until_ts: None,
                                },
                            );
                            Some(ExecuteToolCallResult {
                                output_string: cached.output_string,
                                status: ExecuteStatus::Skipped,
                                args_hash: hash.to_string(),
                            })
                        } else {
                            None
                        }
                    }
                    None => None,
                }
            }
        }
    }

    fn accept_coalesced(
        &self,
        state: &mut ToolState,
        def: &ToolDefinition,
        req: &ExecuteToolCallRequest,
        hash: &str,
        now: i64,
        backpressured: bool,
    ) -> ExecuteToolCallResult {
        let coalesce_key = def.qos.coalesce_key.as_deref().unwrap_or_default();
        let key_value = req
            .tool_args
            .get(coalesce_key)
            .map(|v| v.as_str().map_or_else(|| v.to_string(), ToString::to_string))
            .unwrap_or_default();
        let entry_key = ToolState::entry_key(&req.tool_name, &key_value);

        let lease = now + DEFAULT_LEASE_MS.max(def.qos.debounce_ms as i64 + 1500);
        state
            .coalesced_pending
            .entry(entry_key)
            .and_modify(|e| e.accept(now, req.call_id.clone(), req.tool_args.clone()))
            .or_insert_with(|| CoalescedEntry::new(now, req.call_id.clone(), req.tool_args.clone(), def.qos.debounce_ms));

        let placeholder = serde_json::json!({"ok": true, "accepted": true, "coalesced": true}).to_string();
        state.tool_outputs_by_call_id.insert(
            req.call_id.clone(),
            CallIdOutput {
                output_string: placeholder.clone(),
                tool_version: def.tool_version.clone(),
                args_hash: hash.to_string(),
                ts: now,
                execution_state: ExecutionState::AcceptedPending,
                lease_until_ts: Some(lease),
            },
        );

        state.push_trace(ToolTraceRecord {
            seq: 0,
            ts_start: now,
            ts_end: now,
            response_id: req.response_id.clone(),
            call_id: Some(req.call_id.clone()),
            stage: Some(req.stage),
            tool_name: req.tool_name.clone(),
            tool_version: def.tool_version.clone(),
            args_hash: hash.to_string(),
            status: TraceStatus::Coalesced,
            error_code: backpressured.then(|| "TOOL_QUEUE_BACKPRESSURE".to_string()),
            result_preview: preview(&placeholder),
            qos: TraceQos {
                queue_depth: state.queue_depth(&req.tool_name).max(0) as usize,
                debounce_ms: def.qos.debounce_ms,
                coalesced_count: None,
                latency_ms: None,
            },
            lease_until_ts: Some(lease),
        });

        ExecuteToolCallResult {
            output_string: placeholder,
            status: ExecuteStatus::Coalesced,
            args_hash: hash.to_string(),
        }
    }

    async fn flush_entry_if_any(&self, state: &mut ToolState, def: &ToolDefinition, req: &ExecuteToolCallRequest, now: i64) {
        let Some(coalesce_key) = def.qos.coalesce_key.as_deref() else {
            return;
        };
        let key_value = req
            .tool_args
            .get(coalesce_key)
            .map(|v| v.as_str().map_or_else(|| v.to_string(), ToString::to_string))
            .unwrap_or_default();
        let entry_key = ToolState::entry_key(&req.tool_name, &key_value);
        if let Some(entry) = state.coalesced_pending.remove(&entry_key) {
            self.flush(state, def, &req.tool_name, req.stage, entry, now).await;
        }
    }

    /// Drain every entry for `tool_name` whose debounce window has elapsed, executing
    /// the underlying tool once per entry and writing outputs to every collected call.
    pub async fn drain_due_entries(&self, state: &mut ToolState, tool_name: &str, now: i64) {
        let due: Vec<String> = state
            .coalesced_pending
            .iter()
            .filter(|(k, entry)| {
                ToolState::decode_entry_key(k).is_some_and(|(t, _)| t == tool_name) && entry.is_due(now)
            })
            .map(|(k, _)| k.clone())
            .collect();
        for key in due {
            if let Some(entry) = state.coalesced_pending.remove(&key) {
                if let Ok(def) = self.registry.definition_of(tool_name).await {
                    self.flush(state, &def, tool_name, Scope::Execution, entry, now).await;
                }
            }
        }
    }

    async fn flush(&self, state: &mut ToolState, def: &ToolDefinition, tool_name: &str, stage: Scope, entry: CoalescedEntry, now: i64) {
        let hash = args_hash(tool_name, &entry.latest_args);
        let started = entry.started_at;
        let call_ids = entry.call_ids.clone();
        let coalesced_count = entry.coalesced_count;

        let outcome = self.registry.execute(tool_name, entry.latest_args.clone()).await;
        let (output_string, status, error_code) = match outcome {
            Ok(out) => (out, TraceStatus::Ok, None),
            Err(e) => (
                serde_json::json!({"ok": false, "error": {"code": "TOOL_EXEC_FAILED", "message": e.to_string()}}).to_string(),
                TraceStatus::Failed,
                Some("TOOL_EXEC_FAILED".to_string()),
            ),
        };

        for call_id in &call_ids {
            state.tool_outputs_by_call_id.insert(
                call_id.clone(),
                CallIdOutput {
                    output_string: output_string.clone(),
                    tool_version: def.tool_version.clone(),
                    args_hash: hash.clone(),
                    ts: now,
                    execution_state: ExecutionState::Completed,
                    lease_until_ts: def.side_effects.needs_lease().then_some(now + DEFAULT_LEASE_MS),
                },
            );
        }

        state.push_trace(ToolTraceRecord {
            seq: 0,
            ts_start: started,
            ts_end: now,
            response_id: None,
            call_id: call_ids.last().cloned(),
            stage: Some(stage),
            tool_name: tool_name.to_string(),
            tool_version: def.tool_version.clone(),
            args_hash: hash,
            status,
            error_code,
            result_preview: preview(&output_string),
            qos: TraceQos {
                queue_depth: state.queue_depth(tool_name).max(0) as usize,
                debounce_ms: def.qos.debounce_ms,
                coalesced_count: Some(coalesced_count),
                latency_ms: Some(now - started),
            },
            lease_until_ts: None,
        });
    }

    async fn run_now(
        &self,
        state: &mut ToolState,
        def: &ToolDefinition,
        req: &ExecuteToolCallRequest,
        hash: &str,
        now: i64,
    ) -> ExecuteToolCallResult {
        let outcome = self.registry.execute(&req.tool_name, req.tool_args.clone()).await;
        let (output_string, status, trace_status, error_code) = match outcome {
            Ok(out) => (out, ExecuteStatus::Ok, TraceStatus::Ok, None),
            Err(e) => (
                serde_json::json!({"ok": false, "error": {"code": e.code().as_str(), "message": e.to_string()}}).to_string(),
                ExecuteStatus::Failed,
                TraceStatus::Failed,
                Some(e.code().as_str().to_string()),
            ),
        };

        let lease_until_ts = def.side_effects.needs_lease().then_some(now + DEFAULT_LEASE_MS);

        match def.idempotency.mode {
            IdempotencyMode::ByCallId | IdempotencyMode::None => {
                state.tool_outputs_by_call_id.insert(
                    req.call_id.clone(),
                    CallIdOutput {
                        output_string: output_string.clone(),
                        tool_version: def.tool_version.clone(),
                        args_hash: hash.to_string(),
                        ts: now,
                        execution_state: ExecutionState::Completed,
                        lease_until_ts,
                    },
                );
            }
            IdempotencyMode::ByArgsHash => {
                state.tool_outputs_by_args_hash.insert(
                    format!("{}:{hash}", req.tool_name),
                    ArgsHashOutput {
                        output_string: output_string.clone(),
                        ts: now,
                    },
                );
                state.tool_outputs_by_call_id.insert(
                    req.call_id.clone(),
                    CallIdOutput {
                        output_string: output_string.clone(),
                        tool_version: def.tool_version.clone(),
                        args_hash: hash.to_string(),
                        ts: now,
                        execution_state: ExecutionState::Completed,
                        lease_until_ts,
                    },
                );
            }
        }

        state.push_trace(ToolTraceRecord {
            seq: 0,
            ts_start: now,
            ts_end: self.clock.now_ms(),
            response_id: req.response_id.clone(),
            call_id: Some(req.call_id.clone()),
            stage: Some(req.stage),
            tool_name: req.tool_name.clone(),
            tool_version: def.tool_version.clone(),
            args_hash: hash.to_string(),
            status: trace_status,
            error_code,
            result_preview: preview(&output_string),
            qos: TraceQos {
                queue_depth: state.queue_depth(&req.tool_name).max(0) as usize,
                debounce_ms: def.qos.debounce_ms,
                coalesced_count: None,
                latency_ms: None,
            },
            lease_until_ts,
        });

        ExecuteToolCallResult {
            output_string,
            status,
            args_hash: hash.to_string(),
        }
    }

    fn fail_validation(
        &self,
        state: &mut ToolState,
        req: &ExecuteToolCallRequest,
        now: i64,
        errors: Vec<String>,
    ) -> ExecuteToolCallResult {
        let hash = args_hash(&req.tool_name, &req.tool_args);
        let body = serde_json::json!({
            "ok": false,
            "error": { "code": "TOOL_ARGS_INVALID", "message": "invalid tool arguments", "paths": errors },
        })
        .to_string();
        state.tool_outputs_by_call_id.insert(
            req.call_id.clone(),
            CallIdOutput {
                output_string: body.clone(),
                tool_version: "1.0.0".to_string(),
                args_hash: hash.clone(),
                ts: now,
                execution_state: ExecutionState::Completed,
                lease_until_ts: None,
            },
        );
        state.push_trace(ToolTraceRecord {
            seq: 0,
            ts_start: now,
            ts_end: now,
            response_id: req.response_id.clone(),
            call_id: Some(req.call_id.clone()),
            stage: Some(req.stage),
            tool_name: req.tool_name.clone(),
            tool_version: "1.0.0".to_string(),
            args_hash: hash.clone(),
            status: TraceStatus::Failed,
            error_code: Some("TOOL_ARGS_INVALID".to_string()),
            result_preview: preview(&body),
            qos: TraceQos::default(),
            lease_until_ts: None,
        });
        ExecuteToolCallResult {
            output_string: body,
            status: ExecuteStatus::Failed,
            args_hash: hash,
        }
    }

    fn fail_backpressure(
        &self,
        state: &mut ToolState,
        def: &ToolDefinition,
        req: &ExecuteToolCallRequest,
        now: i64,
        depth: i64,
    ) -> ExecuteToolCallResult {
        let hash = args_hash(&req.tool_name, &req.tool_args);
        let body = serde_json::json!({
            "ok": false,
            "error": {
                "code": "TOOL_QUEUE_BACKPRESSURE",
                "message": format!("tool '{}' queue depth {depth} exceeds limit {}", req.tool_name, def.qos.queue_depth_limit),
                "suggestedActions": ["compress_context", "audit_progress"],
            },
        })
        .to_string();
        state.tool_outputs_by_call_id.insert(
            req.call_id.clone(),
            CallIdOutput {
                output_string: body.clone(),
                tool_version: def.tool_version.clone(),
                args_hash: hash.clone(),
                ts: now,
                execution_state: ExecutionState::Completed,
                lease_until_ts: None,
            },
        );
        state.push_trace(ToolTraceRecord {
            seq: 0,
            ts_start: now,
            ts_end: now,
            response_id: req.response_id.clone(),
            call_id: Some(req.call_id.clone()),
            stage: Some(req.stage),
            tool_name: req.tool_name.clone(),
            tool_version: def.tool_version.clone(),
            args_hash: hash.clone(),
            status: TraceStatus::Failed,
            error_code: Some("TOOL_QUEUE_BACKPRESSURE".to_string()),
            result_preview: preview(&body),
            qos: TraceQos {
                queue_depth: depth.max(0) as usize,
                debounce_ms: def.qos.debounce_ms,
                coalesced_count: None,
                latency_ms: None,
            },
            lease_until_ts: None,
        });
        ExecuteToolCallResult {
            output_string: body,
            status: ExecuteStatus::Failed,
            args_hash: hash,
        }
    }

    fn fail(
        &self,
        state: &mut ToolState,
        req: &ExecuteToolCallRequest,
        now: i64,
        _def: Option<&ToolDefinition>,
        message: String,
    ) -> ExecuteToolCallResult {
        let hash = args_hash(&req.tool_name, &req.tool_args);
        let body = serde_json::json!({"ok": false, "error": {"code": "TOOL_EXEC_FAILED", "message": message}}).to_string();
        state.tool_outputs_by_call_id.insert(
            req.call_id.clone(),
            CallIdOutput {
                output_string: body.clone(),
                tool_version: "1.0.0".to_string(),
                args_hash: hash.clone(),
                ts: now,
                execution_state: ExecutionState::Completed,
                lease_until_ts: None,
            },
        );
        state.push_trace(ToolTraceRecord {
            seq: 0,
            ts_start: now,
            ts_end: now,
            response_id: req.response_id.clone(),
            call_id: Some(req.call_id.clone()),
            stage: Some(req.stage),
            tool_name: req.tool_name.clone(),
            tool_version: "1.0.0".to_string(),
            args_hash: hash.clone(),
            status: TraceStatus::Failed,
            error_code: Some("TOOL_EXEC_FAILED".to_string()),
            result_preview: preview(&body),
            qos: TraceQos::default(),
            lease_until_ts: None,
        });
        ExecuteToolCallResult {
            output_string: body,
            status: ExecuteStatus::Failed,
            args_hash: hash,
        }
    }
}

/// Minimal structural schema check: every name in `parameters.required` must be
/// present in `args`. Returns up to 8 error paths, or `None` if valid.
fn validate_args(def: &ToolDefinition, args: &Value) -> Option<Vec<String>> {
    let required = def.parameters.get("required")?.as_array()?;
    let mut errors = Vec::new();
    for name in required {
        let Some(name) = name.as_str() else { continue };
        if args.get(name).is_none() {
            errors.push(format!("/{name}: missing required field"));
            if errors.len() >= 8 {
                break;
            }
        }
    }
    (!errors.is_empty()).then_some(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::tool::definition::{Idempotency, Qos, SideEffectCategory};
    use crate::tool::traits::{BoxedFuture, ToolDyn};

    struct CountingTool {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl ToolDyn for CountingTool {
        fn name(&self) -> String {
            "demo.count".to_string()
        }

        fn definition(&self) -> BoxedFuture<'_, ToolDefinition> {
            Box::pin(async {
                ToolDefinition {
                    name: "demo.count".to_string(),
                    description: "counts calls".to_string(),
                    scope: vec![Scope::Execution],
                    parameters: serde_json::json!({"type": "object"}),
                    idempotency: Idempotency::by_call_id(),
                    qos: Qos::default(),
                    side_effects: SideEffectCategory::None,
                    tool_version: "1.0.0".to_string(),
                }
            })
        }

        fn call(&self, _args: Value) -> BoxedFuture<'_, Result<String, ToolError>> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            Box::pin(async move { Ok(serde_json::json!({"n": n}).to_string()) })
        }
    }

    fn engine_with(tool: CountingTool) -> (ToolExecutionEngine, Arc<FakeClock>) {
        let mut registry = ToolRegistry::builder();
        registry = registry.tool(tool);
        let clock = Arc::new(FakeClock::new(0));
        (ToolExecutionEngine::new(Arc::new(registry.build()), clock.clone()), clock)
    }

    #[tokio::test]
    async fn by_call_id_replays_without_reexecuting() {
        let (engine, _clock) = engine_with(CountingTool {
            calls: 0.into(),
        });
        let mut state = ToolState::default();
        let req = ExecuteToolCallRequest {
            stage: Scope::Execution,
            response_id: None,
            call_id: "c1".to_string(),
            tool_name: "demo.count".to_string(),
            tool_args: serde_json::json!({}),
        };
        let first = engine.execute_tool_call(&mut state, req.clone()).await;
        let second = engine.execute_tool_call(&mut state, req).await;
        assert_eq!(first.status, ExecuteStatus::Ok);
        assert_eq!(second.status, ExecuteStatus::Skipped);
        assert_eq!(first.output_string, second.output_string);
    }

    #[tokio::test]
    async fn queue_depth_is_balanced_after_a_normal_call() {
        let (engine, _clock) = engine_with(CountingTool {
            calls: 0.into(),
        });
        let mut state = ToolState::default();
        let req = ExecuteToolCallRequest {
            stage: Scope::Execution,
            response_id: None,
            call_id: "c1".to_string(),
            tool_name: "demo.count".to_string(),
            tool_args: serde_json::json!({}),
        };
        engine.execute_tool_call(&mut state, req).await;
        assert_eq!(state.queue_depth("demo.count"), 0);
    }
}
