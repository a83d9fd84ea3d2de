use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::access::{AccessResolver, UserIdentity, write_key_file};
use crate::config::{AppConfig, REPOSITORY_URL};
use crate::docker::options::{self, RunOption};
use crate::docker::{InterruptHandle, LaunchEngine, RunSpec};
use crate::error::AppError;
use crate::path::{resolve_absolute, results_artifact};
use crate::prompt::ConfirmPrompt;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub repository: PathBuf,
    pub external_rules: Option<PathBuf>,
    pub ignore_default_rules: bool,
    pub skip_dependency_download: bool,
    pub disable_deduplication: bool,
    pub overwrite: bool,
    pub debug: bool,
}

/// Collaborators the scan command needs, injected by the caller.
pub struct ScanContext<'a> {
    pub app: &'a AppConfig,
    pub access: &'a dyn AccessResolver,
    pub prompt: &'a dyn ConfirmPrompt,
    pub engine: &'a LaunchEngine,
    pub interrupt: InterruptHandle,
}

pub async fn execute_scan(options: ScanOptions, ctx: ScanContext<'_>) -> Result<(), AppError> {
    let external_rules = match &options.external_rules {
        Some(path) => Some(resolve_absolute(path).map_err(|_| {
            AppError::config(format!("Could not validate the config directory: {}", path.display()))
        })?),
        None => None,
    };

    if options.ignore_default_rules && external_rules.is_none() {
        return Err(AppError::config(
            "Default rules cannot be ignored without any external config.\n\
             You can specify your own rules and config using the `-c or --config` option.\n\n\
             For more info, run: 'privado help'",
        ));
    }

    let repository = resolve_absolute(&options.repository)?;

    if !options.overwrite && !confirm_overwrite(&repository, ctx.app, ctx.prompt)? {
        return Err(AppError::Cancelled);
    }

    if ctx.interrupt.is_requested() {
        return Err(AppError::Interrupted { forced: false });
    }

    println!("> Scanning directory: {}", repository.display());

    let access_key = ctx.access.resolve().map_err(|err| match err {
        AppError::Access(reason) => AppError::Access(format!(
            "{reason}\nPlease try again or raise an issue at {REPOSITORY_URL}"
        )),
        other => other,
    })?;
    let identity = UserIdentity::from_access_key(&access_key);
    stage_host_resources(ctx.app, &identity, &access_key)?;

    let run_options = scan_run_options(&options, ctx.app, &repository, external_rules.as_deref(), &identity);
    let spec = RunSpec::from_options(run_options)?.freeze()?;
    debug!(image = %spec.image, args = ?spec.args, "run specification frozen");

    ctx.engine.launch(spec, ctx.interrupt.clone()).await?.into_result()
}

fn confirm_overwrite(repository: &Path, app: &AppConfig, prompt: &dyn ConfirmPrompt) -> Result<bool, AppError> {
    let results = results_artifact(repository, &app.results_path_suffix);
    if !results.exists() {
        return Ok(true);
    }

    println!("> Scan report already exists ({})", app.results_path_suffix.display());
    println!("\n> Rescan will overwrite existing results");
    let confirmed = prompt.confirm("Continue?")?;
    if confirmed {
        println!();
    }
    Ok(confirmed)
}

/// Ordered option list for one scan. The entrypoint arguments always carry the
/// internal rules directory, even when default rules are ignored.
pub fn scan_run_options(
    scan: &ScanOptions,
    app: &AppConfig,
    repository: &Path,
    external_rules: Option<&Path>,
    identity: &UserIdentity,
) -> Vec<RunOption> {
    let paths = &app.container;
    let mut run_options = vec![
        options::with_image(app.image.clone()),
        options::with_container_name(container_name(identity)),
        options::with_latest_image(false),
        options::with_args([paths.source_code_dir.as_str(), "-ic", paths.internal_rules_dir.as_str()]),
        options::with_attached_output(),
        options::with_source_volume(repository, paths),
        options::with_user_config_volume(&app.user_config_path, paths),
        options::with_user_key_volume(&app.user_key_path, paths),
    ];
    run_options.extend(options::with_package_cache_volumes(&app.package_caches));
    run_options.extend(options::with_external_rules_volume(external_rules, paths));
    run_options.extend(options::with_ignore_default_rules(scan.ignore_default_rules));
    run_options.extend(options::with_skip_dependency_download(scan.skip_dependency_download));
    run_options.extend(options::with_disabled_deduplication(scan.disable_deduplication));
    run_options.extend(options::with_debug(scan.debug));
    run_options.push(options::with_environment(engine_environment(app, repository, identity)));
    run_options.push(options::with_browser_triggers(app.browser_triggers.clone()));
    run_options.push(options::with_interrupt(app.grace_period));
    run_options
}

fn container_name(identity: &UserIdentity) -> String {
    let suffix: String = identity.session_id.chars().take(12).collect();
    format!("privado-scan-{suffix}")
}

/// Environment contract of the scanning engine.
pub fn engine_environment(app: &AppConfig, repository: &Path, identity: &UserIdentity) -> Vec<(String, String)> {
    vec![
        ("PRIVADO_VERSION_CLI".to_string(), VERSION.to_string()),
        ("PRIVADO_HOST_SCAN_DIR".to_string(), repository.display().to_string()),
        ("PRIVADO_USER_HASH".to_string(), identity.user_hash.clone()),
        ("PRIVADO_SESSION_ID".to_string(), identity.session_id.clone()),
        ("PRIVADO_SYNC_TO_CLOUD".to_string(), bool_flag(app.sync_to_cloud)),
        ("PRIVADO_METRICS_ENABLED".to_string(), bool_flag(app.metrics_enabled)),
    ]
}

fn bool_flag(value: bool) -> String {
    value.to_string().to_uppercase()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserConfiguration<'a> {
    user_hash: &'a str,
    session_id: &'a str,
    sync_to_privado_cloud: bool,
    metrics_enabled: bool,
}

/// Create the host files and directories the container mounts.
fn stage_host_resources(app: &AppConfig, identity: &UserIdentity, access_key: &str) -> Result<(), AppError> {
    for cache in &app.package_caches {
        fs::create_dir_all(&cache.host_dir)?;
    }

    write_key_file(&app.user_key_path, access_key)?;

    let user_config = UserConfiguration {
        user_hash: &identity.user_hash,
        session_id: &identity.session_id,
        sync_to_privado_cloud: app.sync_to_cloud,
        metrics_enabled: app.metrics_enabled,
    };
    if let Some(dir) = app.user_config_path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&app.user_config_path, serde_json::to_string_pretty(&user_config)?)?;
    Ok(())
}
