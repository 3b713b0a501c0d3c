// pipeline.rs — Compilation state and pass orchestration
//
// Holds every artifact of a run and executes the minimal set of passes for a
// given terminal PassId. Parsing happens before the runner.
//
// Preconditions: the state was built from a successfully parsed module.
// Postconditions: artifacts for required passes are populated, or has_error is set.
// Failure modes: any pass emitting error-level diagnostics.
// Side effects: calls on_pass_complete after each pass for immediate display.

use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use crate::ast::ModuleAst;
use crate::diag::{DiagLevel, Diagnostic};
use crate::error::Error;
use crate::ir::Module;
use crate::legalize::{LegalizeConfig, RewriteRecord};
use crate::location::LineIndex;
use crate::pass::{descriptor, required_passes, PassId};

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for reproducible output.
///
/// `source_hash`: SHA-256 of the raw source text.
/// `config_fingerprint`: SHA-256 of `LegalizeConfig::canonical_json()`.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub config_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        to_hex(&self.source_hash)
    }

    /// Hex string of the config fingerprint (64 characters).
    pub fn config_fingerprint_hex(&self) -> String {
        to_hex(&self.config_fingerprint)
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Compute provenance from source text and config.
pub fn compute_provenance(source: &str, config: &LegalizeConfig) -> Provenance {
    Provenance {
        source_hash: sha256(source.as_bytes()),
        config_fingerprint: sha256(config.canonical_json().as_bytes()),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Compilation state ──────────────────────────────────────────────────────

/// All artifacts of one run plus accumulated diagnostics.
pub struct CompilationState {
    pub source: String,
    pub ast: ModuleAst,
    pub config: LegalizeConfig,
    pub module: Option<Module>,
    pub rewrites: Vec<RewriteRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
    pub provenance: Provenance,
}

impl CompilationState {
    pub fn new(source: impl Into<String>, ast: ModuleAst, config: LegalizeConfig) -> Self {
        let source = source.into();
        let provenance = compute_provenance(&source, &config);
        Self {
            source,
            ast,
            config,
            module: None,
            rewrites: Vec::new(),
            diagnostics: Vec::new(),
            has_error: false,
            provenance,
        }
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagLevel::Warning)
            .count()
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed due to error-level diagnostics in a pass.
/// The specific diagnostics are available in `CompilationState.diagnostics`.
#[derive(Debug, thiserror::Error)]
#[error("pass '{}' reported errors", .failing_pass.name())]
pub struct PipelineError {
    /// The pass that produced the error.
    pub failing_pass: PassId,
}

/// Per-pass post-processing: callback, accumulate, timing, error check.
fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = diags.iter().any(|d| d.level == DiagLevel::Error);
    state.diagnostics.extend(diags);
    info!(
        pass = descriptor(pass_id).name,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "pass complete"
    );
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_pass: pass_id,
        });
    }
    Ok(())
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → log → error check.
#[instrument(skip_all, fields(terminal = ?terminal))]
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    for pass_id in required_passes(terminal) {
        let t = Instant::now();
        let diags = match pass_id {
            PassId::Resolve => {
                let result = crate::resolve::resolve(&state.ast, &state.source);
                state.module = Some(result.module);
                result.diagnostics
            }
            PassId::Legalize => {
                let Some(module) = state.module.as_mut() else {
                    unreachable!("legalize runs after resolve");
                };
                let result = crate::legalize::legalize_module(module, &state.config);
                state.rewrites = result.rewrites;
                result.diagnostics
            }
        };
        finish_pass(state, pass_id, diags, t.elapsed(), &mut on_pass_complete)?;
    }
    Ok(())
}

/// Parse `source`, rendering syntax errors with their line and column.
pub fn parse_source(source: &str) -> Result<ModuleAst, Error> {
    let result = crate::parser::parse(source);
    if result.errors.is_empty() {
        if let Some(module) = result.module {
            return Ok(module);
        }
    }
    let lines = LineIndex::new(source);
    let mut rendered: Vec<String> = result
        .errors
        .iter()
        .map(|e| format!("{}: error: {}", lines.location(e.span().start), e))
        .collect();
    if rendered.is_empty() {
        rendered.push("parse failed with no output".to_string());
    }
    Err(Error::Parse(rendered))
}

/// Parse, resolve and legalize `source` in one call.
pub fn legalize_source(source: &str, config: LegalizeConfig) -> Result<CompilationState, Error> {
    let ast = parse_source(source)?;
    let mut state = CompilationState::new(source, ast, config);
    run_pipeline(&mut state, PassId::Legalize, |_, _| {})?;
    Ok(state)
}

// ── Summary report ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Summary {
    pub compiler_version: &'static str,
    pub source_hash: String,
    pub config_fingerprint: String,
    pub warnings: usize,
    pub rewrites: Vec<RewriteSummary>,
}

#[derive(Debug, Serialize)]
pub struct RewriteSummary {
    pub function: String,
    pub source_op: String,
    pub custom_code: String,
    pub location: String,
    pub option_bytes: usize,
    pub option_sha256: String,
    pub options: serde_json::Value,
}

/// Build the `--emit summary` report from a finished run.
pub fn summary(state: &CompilationState) -> Result<Summary, Error> {
    let rewrites = state
        .rewrites
        .iter()
        .map(|r| {
            Ok(RewriteSummary {
                function: r.function.clone(),
                source_op: r.source_op.clone(),
                custom_code: r.custom_code.clone(),
                location: r.location.to_string(),
                option_bytes: r.options.len(),
                option_sha256: to_hex(&sha256(&r.options)),
                options: crate::inspect::options_to_json(&r.options)?,
            })
        })
        .collect::<Result<_, Error>>()?;
    Ok(Summary {
        compiler_version: state.provenance.compiler_version,
        source_hash: state.provenance.source_hash_hex(),
        config_fingerprint: state.provenance.config_fingerprint_hex(),
        warnings: state.warning_count(),
        rewrites,
    })
}
