//! `expire-snapshots`: find local snapshots older than N days and, when
//! asked, expire them.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};

use super::{i64_of, items, str_of};
use crate::api::{ApiClient, ApiResponse};
use crate::dates::{datetime_to_usecs, now, time_ago, usecs_to_date, DEFAULT_FORMAT};
use crate::session::EndpointKind;
use crate::transport::{Method, Transport};
use crate::ui::Prompter;

pub struct ExpireSnapshots {
    pub job_names: Vec<String>,
    pub days_to_keep: i64,
    pub expire: bool,
    pub confirm_replication: bool,
    pub confirm_archive: bool,
    pub num_runs: u32,
}

/// Names from the command line followed by the non-blank lines of `file`.
pub fn gather_list(names: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    let mut all = names.to_vec();
    if let Some(file) = file {
        let text = fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        all.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }
    Ok(all)
}

/// One protection run as far as expiry cares.
struct Run<'a> {
    raw: &'a Value,
    start_usecs: i64,
}

impl<'a> Run<'a> {
    fn new(raw: &'a Value) -> Self {
        let start_usecs = items(raw.get("copyRun"))
            .first()
            .map(|c| i64_of(c, "runStartTimeUsecs"))
            .unwrap_or_default();
        Run { raw, start_usecs }
    }

    fn copied_to(&self, target_type: &str) -> bool {
        items(self.raw.get("copyRun")).iter().any(|c| {
            c.get("target").map(|t| str_of(t, "type")) == Some(target_type)
                && str_of(c, "status") == "kSuccess"
        })
    }

    fn snapshots_deleted(&self) -> bool {
        self.raw
            .pointer("/backupRun/snapshotsDeleted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

pub fn run<T: Transport, P: Prompter>(
    api: &ApiClient<T, P>,
    opts: &ExpireSnapshots,
    out: &mut impl Write,
) -> Result<i32> {
    let Some(jobs) = api.get("protectionJobs").into_value() else {
        bail!("unable to list protection jobs");
    };
    let jobs = items(Some(&jobs));

    let wanted: Vec<String> = opts.job_names.iter().map(|n| n.to_lowercase()).collect();
    let known: Vec<String> = jobs.iter().map(|j| str_of(j, "name").to_lowercase()).collect();
    let missing: Vec<&str> = opts
        .job_names
        .iter()
        .filter(|n| !known.contains(&n.to_lowercase()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        writeln!(out, "Jobs not found: {}", missing.join(", "))?;
        return Ok(1);
    }

    let now_usecs = datetime_to_usecs(&now());
    let cutoff = time_ago(opts.days_to_keep, "days").unwrap_or(now_usecs);

    writeln!(out, "Searching for old snapshots...")?;

    let mut failed = false;
    let mut selected: Vec<&Value> = jobs
        .iter()
        .filter(|j| wanted.is_empty() || wanted.contains(&str_of(j, "name").to_lowercase()))
        .collect();
    selected.sort_by_key(|j| str_of(j, "name").to_lowercase());

    for job in selected {
        writeln!(out, "\n{}", str_of(job, "name"))?;
        let job_id = i64_of(job, "id");
        let mut end_usecs = now_usecs;
        loop {
            let page = api
                .get(&format!(
                    "protectionRuns?jobId={job_id}&numRuns={}&endTimeUsecs={end_usecs}&excludeTasks=true",
                    opts.num_runs
                ))
                .into_value()
                .unwrap_or_default();
            let runs = items(Some(&page));
            let Some(last) = runs.last() else {
                break;
            };
            let next_end = last
                .pointer("/backupRun/stats/startTimeUsecs")
                .and_then(Value::as_i64)
                .map(|start| start - 1);

            for raw in runs {
                let run = Run::new(raw);
                if run.start_usecs >= cutoff || run.snapshots_deleted() {
                    continue;
                }
                let start_date = usecs_to_date(run.start_usecs, DEFAULT_FORMAT);
                if opts.confirm_replication && !run.copied_to("kRemote") {
                    writeln!(out, "    Skipping {start_date} (not replicated)")?;
                } else if opts.confirm_archive && !run.copied_to("kArchival") {
                    writeln!(out, "    Skipping {start_date} (not archived)")?;
                } else if opts.expire {
                    match expire_run(api, job_id, run.start_usecs) {
                        Ok(()) => writeln!(out, "    Expiring {start_date}")?,
                        Err(reason) => {
                            writeln!(out, "    Failed to expire {start_date}: {reason}")?;
                            failed = true;
                        }
                    }
                } else {
                    writeln!(out, "    {start_date}")?;
                }
            }

            // stop instead of refetching the same page
            match next_end {
                Some(next) if next < end_usecs => end_usecs = next,
                _ => break,
            }
        }
    }
    Ok(if failed { 1 } else { 0 })
}

/// Zero the local retention of one run. `Err` carries the reason to report.
fn expire_run<T: Transport, P: Prompter>(
    api: &ApiClient<T, P>,
    job_id: i64,
    start_usecs: i64,
) -> std::result::Result<(), String> {
    let exact = api
        .get(&format!(
            "/backupjobruns?exactMatchStartTimeUsecs={start_usecs}&id={job_id}"
        ))
        .into_value()
        .unwrap_or_default();
    let Some(job_uid) = exact.pointer("/0/backupJobRuns/protectionRuns/0/backupRun/base/jobUid") else {
        return Err("run not found".to_string());
    };
    let body = json!({
        "jobRuns": [{
            "expiryTimeUsecs": 0,
            "jobUid": {
                "clusterId": job_uid.get("clusterId"),
                "clusterIncarnationId": job_uid.get("clusterIncarnationId"),
                "id": job_uid.get("objectId"),
            },
            "runStartTimeUsecs": start_usecs,
            "copyRunTargets": [{"daysToKeep": 0, "type": "kLocal"}],
        }]
    });
    let response = api.call(Method::Put, "protectionRuns", Some(&body), EndpointKind::V1);
    if let Some(record) = response.error_record() {
        return Err(str_of(&record, "error").to_string());
    }
    match response {
        ApiResponse::Value(_) | ApiResponse::Empty => Ok(()),
        ApiResponse::Error { code, .. } => Err(code),
        ApiResponse::NotFound => Err("not found".to_string()),
        ApiResponse::NotConnected => Err("not connected".to_string()),
        ApiResponse::Unreachable(reason) => Err(reason),
    }
}
