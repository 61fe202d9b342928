//! mend — watches a program, and when it crashes or hits a stub, asks a
//! code model for a whole-file fix, re-runs the fix in isolation, and only
//! then replaces the original.
//!
//! ## Architecture
//!
//! - `tracer`: runs a target under a line-trace hook → `ExecutionReport`
//! - `llm`: generation service backends (Ollama, Anthropic)
//! - `generator`: mode selection, prompt building, code extraction
//! - `repair`: verify-then-commit over one file
//! - `monitor`: change notifications → debounced, guarded repair cycles
//! - `config`: YAML configuration

pub mod config;
pub mod generator;
pub mod llm;
pub mod monitor;
pub mod repair;
pub mod tracer;

use std::sync::Arc;

use config::MendConfig;
use generator::GeneratorClient;
use llm::LlmError;
use monitor::ChangeMonitor;
use repair::RepairCoordinator;
use tracer::{PythonTracer, Tracer};

/// Tracer configured from `config`.
pub fn build_tracer(config: &MendConfig) -> Arc<dyn Tracer> {
    Arc::new(PythonTracer::from_config(
        config.interpreter.clone(),
        &config.tracer,
    ))
}

/// Coordinator with the configured tracer and generation backend.
pub fn build_coordinator(config: &MendConfig) -> Result<RepairCoordinator, LlmError> {
    let backend = llm::backend_from_config(&config.generator)?;
    let generator = GeneratorClient::new(backend, config.language.clone())
        .with_trace_tail(config.generator.trace_tail);
    Ok(RepairCoordinator::new(build_tracer(config), generator))
}

/// Monitor for `config.target`.
pub fn build_monitor(config: &MendConfig) -> Result<ChangeMonitor, LlmError> {
    Ok(ChangeMonitor::new(config.target.clone(), build_coordinator(config)?)
        .with_debounce(config.debounce())
        .with_settle(config.settle()))
}
