mod api_call;
pub mod backed_up_files;
pub mod expire_snapshots;
pub mod list_views;
mod store_password;

use std::io;

use anyhow::{bail, Result};
use serde_json::Value;

use crate::api::ApiClient;
use crate::cli::{AuthArgs, Cli, Commands};
use crate::transport::Method;

/// Run one command and return the process exit code.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::ListViews {
            auth,
            name,
            show_settings,
            units,
        } => {
            let api = connect(&auth, true)?;
            let opts = list_views::ListViews {
                name,
                show_settings,
                units,
            };
            list_views::run(&api, &opts, &mut out)
        }
        Commands::ExpireSnapshots {
            auth,
            job_names,
            job_list,
            days_to_keep,
            expire,
            confirm_replication,
            confirm_archive,
            num_runs,
        } => {
            let job_names = expire_snapshots::gather_list(&job_names, job_list.as_deref())?;
            // a wrong password must not trigger a re-prompt in unattended runs
            let api = connect(&auth, false)?;
            let opts = expire_snapshots::ExpireSnapshots {
                job_names,
                days_to_keep,
                expire,
                confirm_replication,
                confirm_archive,
                num_runs,
            };
            expire_snapshots::run(&api, &opts, &mut out)
        }
        Commands::BackedUpFiles {
            auth,
            source_servers,
            job_name,
            show_versions,
            list_files,
            start,
            end,
            run_id,
            file_date,
            start_path,
            no_index,
            show_stats,
        } => {
            let api = connect(&auth, true)?;
            let opts = backed_up_files::BackedUpFiles {
                servers: source_servers,
                job_name,
                show_versions,
                list_files,
                start,
                end,
                run_id,
                file_date,
                start_path,
                use_librarian: !no_index,
                stat_files: show_stats,
                output_dir: std::env::current_dir()?,
            };
            backed_up_files::run(&api, &opts, &mut out)
        }
        Commands::StorePassword { auth, file } => {
            let api = ApiClient::from_env()?;
            store_password::run(&api, &auth, file, &mut out)
        }
        Commands::Api {
            auth,
            method,
            path,
            data,
            endpoint,
            props,
        } => {
            let method: Method = method.parse().map_err(anyhow::Error::msg)?;
            let body: Option<Value> = data.as_deref().map(serde_json::from_str).transpose()?;
            let api = connect(&auth, true)?;
            api_call::run(
                &api,
                method,
                &path,
                body.as_ref(),
                endpoint.into(),
                props.as_deref(),
                &mut out,
            )
        }
    }
}

/// Build a client from the environment and authenticate it.
pub fn connect(auth: &AuthArgs, retry: bool) -> Result<ApiClient> {
    let mut api = ApiClient::from_env()?;
    if let Err(failure) = api.authenticate(&auth.options(retry)) {
        bail!("authentication failed: {failure}");
    }
    if let Some(cluster) = &auth.cluster {
        if !api.helios_cluster(cluster) {
            bail!("cluster {cluster} is not connected to Helios");
        }
    }
    Ok(api)
}

// JSON accessors shared by the commands. Missing or mistyped fields read as
// empty/zero, which the listings treat as "not present".

pub(crate) fn str_of<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

pub(crate) fn i64_of(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or_default()
}

pub(crate) fn items(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Drop the one-letter type marker of an enum value (`kNfsOnly` -> `NfsOnly`).
pub(crate) fn strip_marker(s: &str) -> &str {
    let mut chars = s.chars();
    chars.next();
    chars.as_str()
}
