pub mod completions;
pub mod deploy;
pub mod info;
pub mod invoke;
pub mod man_pages;
pub mod remove;

use fgdeploy_core::{
    lookup_project_id, CoreError, Deployer, FailurePolicy, FunctionAction, FunctionSummary,
    ReconcileOptions, RunReport, TriggerAction, TriggerOutcome,
};
use fgdeploy_remote::config::AUTH_TOKEN_ENV;
use fgdeploy_remote::{ArtifactPackager, HttpTransport, RemoteConfig};
use fgdeploy_schema::{parse_manifest_file, NormalizeOptions, NormalizedManifest};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_REMOTE_ERROR: u8 = 3;

/// Where to find the declaration and the control plane.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub manifest: &'a Path,
    pub endpoint: Option<&'a str>,
    pub qualifier: Option<&'a str>,
}

/// Engine switches shared by deploy and remove.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineFlags {
    pub first_match_wins: bool,
    pub fail_open_listing: bool,
    pub fail_fast: bool,
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_action(action: &str) -> String {
    use console::Style;
    match action {
        "created" => Style::new().green().apply_to(action).to_string(),
        "updated" => Style::new().cyan().apply_to(action).to_string(),
        "unchanged" => Style::new().dim().apply_to(action).to_string(),
        "removed" => Style::new().yellow().apply_to(action).to_string(),
        "skipped" | "failed" => Style::new().red().apply_to(action).to_string(),
        other => other.to_owned(),
    }
}

fn action_name(action: TriggerAction) -> &'static str {
    match action {
        TriggerAction::Created => "created",
        TriggerAction::Updated => "updated",
        TriggerAction::Unchanged => "unchanged",
        TriggerAction::Removed => "removed",
        TriggerAction::Skipped => "skipped",
    }
}

/// Parse and normalize the manifest, then settle the remote endpoint.
///
/// The stored remote config supplies the project id when the manifest has
/// none; without either, the project named after the region is looked up.
/// Without a stored config the endpoint is derived from the region.
pub fn load(target: &Target<'_>) -> Result<(NormalizedManifest, RemoteConfig), String> {
    let manifest = parse_manifest_file(target.manifest).map_err(|e| e.to_string())?;
    let stored = RemoteConfig::load_default().map_err(|e| format!("remote error: {e}"))?;
    let mut config = stored
        .unwrap_or_else(|| RemoteConfig::for_region(&manifest.provider.region))
        .with_overrides(target.endpoint, std::env::var(AUTH_TOKEN_ENV).ok());
    tracing::debug!("control plane endpoint: {}", config.url);
    if is_blank(manifest.provider.project_id.as_deref()) && is_blank(config.project_id.as_deref()) {
        let transport = HttpTransport::new(config.clone());
        config.project_id = lookup_project_id(&transport, &manifest.provider.region)
            .map_err(|e| describe(&e))?;
    }
    let normalized = manifest
        .normalize(&NormalizeOptions {
            project_id: config.project_id.clone(),
            qualifier: target.qualifier.map(str::to_owned),
        })
        .map_err(|e| format!("manifest error: {e}"))?;
    Ok((normalized, config))
}

fn is_blank(value: Option<&str>) -> bool {
    value.filter(|v| !v.trim().is_empty()).is_none()
}

/// Deployer over HTTP, packaging code relative to the manifest directory.
pub fn make_deployer(config: RemoteConfig, manifest: &Path, flags: EngineFlags) -> Deployer {
    let root = manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Deployer::new(
        Box::new(HttpTransport::new(config)),
        Box::new(ArtifactPackager::new(root)),
    )
    .with_options(ReconcileOptions {
        first_match_wins: flags.first_match_wins,
        fail_open_listing: flags.fail_open_listing,
    })
    .with_failure_policy(if flags.fail_fast {
        FailurePolicy::Abort
    } else {
        FailurePolicy::Continue
    })
}

pub fn exit_code_for(error: &CoreError) -> u8 {
    if error.is_configuration() {
        EXIT_MANIFEST_ERROR
    } else if error.is_remote() {
        EXIT_REMOTE_ERROR
    } else {
        EXIT_FAILURE
    }
}

/// Message for an error that ended the whole command, prefixed so `main`
/// can pick the exit code.
pub fn describe(error: &CoreError) -> String {
    match exit_code_for(error) {
        EXIT_MANIFEST_ERROR if matches!(error, CoreError::Manifest(_)) => error.to_string(),
        EXIT_MANIFEST_ERROR => format!("manifest error: {error}"),
        EXIT_REMOTE_ERROR => format!("remote error: {error}"),
        _ => error.to_string(),
    }
}

/// Exit code of a finished run: that of the first failure, if any.
pub fn report_exit_code(report: &RunReport) -> u8 {
    if let Some(error) = report.failures().find_map(|f| f.error.as_ref()) {
        return exit_code_for(error);
    }
    if report.interrupted {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    }
}

pub fn print_summary(summary: &FunctionSummary) {
    println!("    urn:       {}", summary.urn);
    println!("    runtime:   {}", summary.runtime);
    println!("    handler:   {}", summary.handler);
    println!("    timeout:   {}s", summary.timeout);
    if let Some(size) = summary.code_size {
        println!("    code size: {size} bytes");
    }
    if let Some(project) = &summary.project_name {
        println!("    project:   {project}");
    }
    if let Some(description) = summary.description.as_deref().filter(|d| !d.is_empty()) {
        println!("    about:     {description}");
    }
}

pub fn print_trigger(outcome: &TriggerOutcome) {
    let action = colorize_action(action_name(outcome.action));
    match &outcome.summary {
        Some(summary) if !summary.trigger_id.is_empty() => {
            println!(
                "    trigger {:<16} {action} ({}, {})",
                outcome.kind, summary.trigger_id, summary.status
            );
        }
        _ => println!("    trigger {:<16} {action}", outcome.kind),
    }
}

/// Print what happened to each function, then the run's loose ends.
pub fn print_report(report: &RunReport) {
    for function in &report.functions {
        match (&function.error, &function.function) {
            (Some(error), _) => {
                println!("  {} {}", function.name, colorize_action("failed"));
                println!("    error: {error}");
            }
            (None, Some(outcome)) => {
                let action = match outcome.action {
                    FunctionAction::Created => "created",
                    FunctionAction::Updated => "updated",
                };
                println!("  {} {}", function.name, colorize_action(action));
                if outcome.code_unchanged {
                    println!("    code unchanged");
                }
                print_summary(&outcome.summary);
            }
            (None, None) if function.removed => {
                println!("  {} {}", function.name, colorize_action("removed"));
            }
            (None, None) => println!("  {}", function.name),
        }
        for trigger in &function.triggers {
            print_trigger(trigger);
        }
    }
    if !report.skipped.is_empty() {
        println!("not attempted: {}", report.skipped.join(", "));
    }
    if report.interrupted {
        println!("interrupted");
    }
}
