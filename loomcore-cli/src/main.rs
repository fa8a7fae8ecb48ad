//! Demo harness: wires an in-memory KV backend and an in-process worker port, then
//! drives one translation job through all three agent phases. An executable example
//! and manual smoke test, not a product surface.

use std::collections::HashMap;
use std::sync::Arc;

use loomcore::agent::model_client::{ModelOutputItem, ModelTurnResponse};
use loomcore::agent::{AgentRunner, AgentRunnerConfig, RemoteModelClient};
use loomcore::clock::{Clock, SystemClock};
use loomcore::job::{JobRunner, TracingMetricsSink};
use loomcore::kv::{EventLogStore, InflightStore, JobStore, MemoryBackend};
use loomcore::model::{Block, Job, JobStatus};
use loomcore::settings::effective_settings;
use loomcore::shaper::ChecklistStage;
use loomcore::tool::ToolRegistry;
use loomcore::transport::{ChannelWorkerPort, Executor, WorkerPort};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = effective_settings(&HashMap::new());
    tracing::info!(profile = ?settings.profile, max_steps = settings.max_steps, "resolved settings");
    let config = AgentRunnerConfig { max_steps: settings.max_steps, ..AgentRunnerConfig::default() }.normalized();

    let backend = Arc::new(MemoryBackend::new());
    let job_store = JobStore::new(Arc::clone(&backend) as Arc<dyn loomcore::kv::KvBackend>);
    let event_log = EventLogStore::new(Arc::clone(&backend) as Arc<dyn loomcore::kv::KvBackend>);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // The worker port stands in for the offscreen document / worker process that
    // executes both model turns and tool calls; every request lands here no matter
    // which side of the Remote Executor Transport boundary issued it (§4.5).
    //
    // This demo model only ever talks and never emits a tool call, so every phase
    // runs out its iteration and no-progress budget and falls through to the
    // deterministic path: the forced planning fallback for the planning phase, and
    // (since this demo registers no execution/proofreading tools) a checklist nudge
    // standing in for real tool-driven progress in those two phases.
    let turns = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let worker_port = Arc::new(ChannelWorkerPort::spawn(move |req| {
        if req.task_type == "model.turn" {
            let turn = turns.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let response = ModelTurnResponse {
                response_id: format!("demo-turn-{turn}"),
                output: vec![ModelOutputItem::Message { content: "thinking...".to_string() }],
            };
            serde_json::to_value(response).map_err(|e| e.to_string())
        } else {
            tracing::info!(tool = %req.tool_name, "demo worker executed a tool call");
            Ok(serde_json::json!({ "ok": true }))
        }
    }));
    worker_port.handshake().await.expect("worker handshake");

    let inflight = Arc::new(InflightStore::new(Arc::clone(&backend) as Arc<dyn loomcore::kv::KvBackend>));
    let executor = Arc::new(Executor::new(Arc::clone(&worker_port), Arc::clone(&clock), inflight));
    let model = Arc::new(RemoteModelClient::new(executor, "job-demo-1", "tab-1"));

    let registry = Arc::new(ToolRegistry::builder().build());
    let agent_runner = AgentRunner::new(registry, model, Arc::clone(&clock), config);
    let job_runner = JobRunner::new(agent_runner, Arc::clone(&clock), Arc::new(TracingMetricsSink), "demo-instance");

    let mut job = Job::new("job-demo-1", "tab-1", "fr", clock.now_ms());
    job.blocks_by_id.insert(
        "b1".to_string(),
        Block { id: "b1".to_string(), hint: Some("marketing copy".to_string()), text: Some("Welcome to our product.".to_string()) },
    );
    job.pending_block_ids.push("b1".to_string());
    job.status = JobStatus::Planning;

    event_log.append(clock.now_ms(), "job.started", serde_json::json!({ "job_id": job.job_id })).await.expect("log job start");

    loop {
        if job.status == JobStatus::AwaitingCategories {
            tracing::info!("demo: standing in for the user selecting categories");
            job.select_categories(job.agent_state.selected_categories.clone());
        }
        if job.agent_state.checklist.is_done(ChecklistStage::Plan) && job.status == JobStatus::Running {
            tracing::info!("demo: standing in for tool-driven execution progress");
            job.agent_state.checklist.mark_done(ChecklistStage::ExecuteBatches);
        }
        if job.status == JobStatus::Completing {
            job.agent_state.checklist.mark_done(ChecklistStage::Proofread);
        }

        let outcome = job_runner.step(&mut job).await;
        job_store.persist(&job).await.expect("persist job");
        event_log
            .append(clock.now_ms(), "job.stepped", serde_json::json!({ "status": format!("{:?}", job.status) }))
            .await
            .expect("log step");

        tracing::info!(status = ?job.status, ok = outcome.ok, terminal = outcome.terminal, "job step");

        if job.agent_state.planning_markers.is_complete() && !job.agent_state.checklist.is_done(ChecklistStage::Plan) {
            job.agent_state.checklist.mark_done(ChecklistStage::Plan);
        }

        if outcome.terminal {
            break;
        }
    }

    let events = event_log.since(0).await.expect("read event log");
    tracing::info!(event_count = events.len(), final_status = ?job.status, "demo job finished");
}
