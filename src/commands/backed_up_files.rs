//! `backed-up-files`: list the versions of a protected server, or walk the
//! file tree of one version and save the listing to a text file.

use std::cmp::Reverse;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use urlencoding::encode;

use super::{i64_of, items, str_of};
use crate::api::ApiClient;
use crate::dates::{date_to_usecs, usecs_to_date, DEFAULT_FORMAT};
use crate::transport::Transport;
use crate::ui::{self, Prompter};

const ENTITY_TYPES: [&str; 17] = [
    "kView",
    "kAcropolis",
    "kAWS",
    "kAWSNative",
    "kAWSSnapshotManager",
    "kAzure",
    "kAzureNative",
    "kFlashBlade",
    "kGCP",
    "kGenericNas",
    "kHyperV",
    "kHyperVVSS",
    "kIsilon",
    "kKVM",
    "kNetapp",
    "kPhysical",
    "kVMware",
];

/// Backup types whose snapshots are browsed volume by volume.
const VOLUME_BACKUP_TYPES: [i64; 2] = [1, 6];

pub struct BackedUpFiles {
    pub servers: Vec<String>,
    pub job_name: String,
    pub show_versions: bool,
    pub list_files: bool,
    pub start: Option<String>,
    pub end: Option<String>,
    pub run_id: Option<i64>,
    pub file_date: Option<String>,
    pub start_path: String,
    pub use_librarian: bool,
    pub stat_files: bool,
    /// Where the listing files are written.
    pub output_dir: PathBuf,
}

/// A snapshot of one object together with the search document it came from.
struct Version<'a> {
    doc: &'a Value,
    raw: &'a Value,
}

impl Version<'_> {
    fn timestamp(&self) -> i64 {
        i64_of(self.raw, "snapshotTimestampUsecs")
    }

    fn instance(&self, key: &str) -> Option<&Value> {
        self.raw.get("instanceId").and_then(|i| i.get(key))
    }

    fn run_id(&self) -> i64 {
        self.instance("jobInstanceId")
            .and_then(Value::as_i64)
            .unwrap_or_default()
    }

    fn run_start(&self) -> i64 {
        self.instance("jobStartTimeUsecs")
            .and_then(Value::as_i64)
            .unwrap_or_default()
    }

    /// Query string identifying this snapshot to the browse endpoints.
    fn query(&self) -> String {
        let object = |pointer: &str| scalar(self.doc.pointer(pointer));
        format!(
            "attemptNum={}&clusterId={}&clusterIncarnationId={}&entityId={}&jobId={}&jobInstanceId={}&jobStartTimeUsecs={}&jobUidObjectId={}",
            scalar(self.instance("attemptNum")),
            object("/objectId/jobUid/clusterId"),
            object("/objectId/jobUid/clusterIncarnationId"),
            object("/objectId/entity/id"),
            object("/objectId/jobId"),
            self.run_id(),
            self.run_start(),
            object("/objectId/jobUid/objectId"),
        )
    }
}

fn scalar(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn parse_date(date: Option<&str>) -> Result<Option<i64>> {
    date.map(|d| date_to_usecs(d).ok_or_else(|| anyhow!("invalid date: {d}")))
        .transpose()
}

fn search_path(server: &str) -> String {
    let types: String = ENTITY_TYPES
        .iter()
        .map(|t| format!("entityTypes={t}&"))
        .collect();
    format!("/searchvms?{types}vmName={}", encode(server))
}

/// True for the job itself or a job that was renamed from/to it.
fn job_matches(job_name: &str, wanted: &str) -> bool {
    let job_name = job_name.to_lowercase();
    let wanted = wanted.to_lowercase();
    job_name == wanted
        || job_name.contains(&format!("old name: {wanted}"))
        || job_name.contains(&format!("{wanted} (old name"))
}

/// Search documents of `server` in `job` that have at least one version, or
/// the message explaining why there are none.
fn documents<'a>(search: &'a Value, server: &str, job: &str) -> Result<Vec<&'a Value>, String> {
    let found: Vec<&Value> = items(search.get("vms"))
        .iter()
        .filter_map(|vm| vm.get("vmDocument"))
        .filter(|doc| str_of(doc, "objectName").eq_ignore_ascii_case(server))
        .collect();
    if found.is_empty() {
        return Err(format!("no backups found for {server}"));
    }
    let protected: Vec<&Value> = found
        .into_iter()
        .filter(|doc| job_matches(str_of(doc, "jobName"), job))
        .collect();
    if protected.is_empty() {
        return Err(format!("{server} not protected by {job}"));
    }
    let with_versions: Vec<&Value> = protected
        .into_iter()
        .filter(|doc| !items(doc.get("versions")).is_empty())
        .collect();
    if with_versions.is_empty() {
        return Err(format!("No backups available for {server} in {job}"));
    }
    Ok(with_versions)
}

pub fn run<T: Transport, P: Prompter>(
    api: &ApiClient<T, P>,
    opts: &BackedUpFiles,
    out: &mut impl Write,
) -> Result<i32> {
    let start = parse_date(opts.start.as_deref())?;
    let end = parse_date(opts.end.as_deref())?;
    let file_date = parse_date(opts.file_date.as_deref())?;

    let mut code = 0;
    for server in &opts.servers {
        writeln!(out, "\n{server}:\n")?;

        let spinner = ui::spinner(format!("Searching for {server}..."));
        let search = api.get(&search_path(server)).into_value().unwrap_or_default();
        spinner.finish_and_clear();

        let docs = match documents(&search, server, &opts.job_name) {
            Ok(docs) => docs,
            Err(reason) => {
                writeln!(out, "{reason}")?;
                code = 1;
                continue;
            }
        };
        let mut versions: Vec<Version> = docs
            .into_iter()
            .flat_map(|doc| items(doc.get("versions")).iter().map(move |raw| Version { doc, raw }))
            .collect();
        versions.sort_by_key(|v| Reverse(v.timestamp()));

        if opts.show_versions || opts.list_files || start.is_some() || end.is_some() {
            versions.retain(|v| {
                start.map_or(true, |s| s <= v.timestamp()) && end.map_or(true, |e| e >= v.timestamp())
            });
            if opts.list_files {
                for version in &versions {
                    writeln!(out, "\n==============================")?;
                    writeln!(out, "   runId: {}", version.run_id())?;
                    writeln!(out, " runDate: {}", usecs_to_date(version.run_start(), DEFAULT_FORMAT))?;
                    writeln!(out, "==============================\n")?;
                    show_files(api, opts, server, version, out)?;
                }
            } else {
                writeln!(out, "{:>10}  runDate", "runId")?;
                writeln!(out, "{:>10}  -------", "-----")?;
                for version in &versions {
                    writeln!(
                        out,
                        "{:>10}  {}",
                        version.run_id(),
                        usecs_to_date(version.run_start(), DEFAULT_FORMAT)
                    )?;
                }
            }
            continue;
        }

        let selected = if let Some(run_id) = opts.run_id {
            versions.iter().find(|v| v.run_id() == run_id).ok_or("Run ID not found")
        } else if let Some(date) = file_date {
            // oldest version at or after the date
            versions
                .iter()
                .filter(|v| v.timestamp() >= date)
                .last()
                .ok_or("No backups from the specified date")
        } else {
            versions.first().ok_or("No backups available")
        };
        match selected {
            Ok(version) => show_files(api, opts, server, version, out)?,
            Err(reason) => {
                writeln!(out, "{reason}")?;
                code = 1;
            }
        }
    }
    Ok(code)
}

struct Volume {
    cookie: String,
    name: String,
}

/// Walks a snapshot's directory tree, echoing each file to the terminal and
/// the listing file.
struct Lister<'a, T, P> {
    api: &'a ApiClient<T, P>,
    query: String,
    use_librarian: bool,
    stat_files: bool,
    out: &'a mut dyn Write,
    file: BufWriter<File>,
}

fn show_files<T: Transport, P: Prompter>(
    api: &ApiClient<T, P>,
    opts: &BackedUpFiles,
    server: &str,
    version: &Version,
    out: &mut impl Write,
) -> Result<()> {
    let name = format!(
        "backedUpFiles-{}-{}-{}.txt",
        server.replace(['/', '\\'], "-"),
        version.run_id(),
        usecs_to_date(version.run_start(), "%Y-%m-%d_%H-%M-%S")
    );
    let path = opts.output_dir.join(name);
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;

    let mut lister = Lister {
        api,
        query: version.query(),
        use_librarian: opts.use_librarian,
        stat_files: opts.stat_files,
        out,
        file: BufWriter::new(file),
    };

    if VOLUME_BACKUP_TYPES.contains(&i64_of(version.doc, "backupType")) {
        let info = api
            .get(&format!("/vm/volumeInfo?{}&statFileEntries={}", lister.query, opts.stat_files))
            .into_value()
            .unwrap_or_default();
        let cookie = scalar(info.get("volumeInfoCookie"));
        let mut names: Vec<&str> = items(info.get("volumeInfos"))
            .iter()
            .map(|v| str_of(v, "name"))
            .collect();
        names.sort_unstable();
        for name in names {
            let volume = Volume {
                cookie: cookie.clone(),
                name: name.to_string(),
            };
            lister.list_dir(&opts.start_path, Some(&volume))?;
        }
    } else {
        lister.list_dir(&opts.start_path, None)?;
    }
    lister.file.flush()?;
    Ok(())
}

fn child_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

impl<T: Transport, P: Prompter> Lister<'_, T, P> {
    fn list_dir(&mut self, dir: &str, volume: Option<&Volume>) -> Result<()> {
        let mut cookie: Option<String> = None;
        loop {
            let mut path = format!(
                "/vm/directoryList?{}&useLibrarian={}&statFileEntries={}&dirPath={}",
                self.query,
                self.use_librarian,
                self.stat_files,
                encode(dir)
            );
            if let Some(volume) = volume {
                path.push_str(&format!(
                    "&volumeInfoCookie={}&volumeName={}",
                    encode(&volume.cookie),
                    encode(&volume.name)
                ));
            }
            if let Some(cookie) = &cookie {
                path.push_str(&format!("&cookie={}", encode(cookie)));
            }

            let Some(listing) = self.api.get(&path).into_value() else {
                return Ok(());
            };
            let mut entries: Vec<&Value> = items(listing.get("entries")).iter().collect();
            entries.sort_by(|a, b| str_of(a, "name").cmp(str_of(b, "name")));
            for entry in entries {
                if str_of(entry, "type") == "kDirectory" {
                    self.list_dir(&child_path(dir, str_of(entry, "name")), volume)?;
                } else {
                    self.emit(entry)?;
                }
            }

            match listing.get("cookie").and_then(Value::as_str) {
                Some(next) => cookie = Some(next.to_string()),
                None => return Ok(()),
            }
        }
    }

    fn emit(&mut self, entry: &Value) -> Result<()> {
        let full_path = str_of(entry, "fullPath");
        let line = match entry.get("fstatInfo") {
            Some(stat) if self.stat_files => format!(
                "{full_path} ({}) [{} bytes]",
                usecs_to_date(i64_of(stat, "mtimeUsecs"), DEFAULT_FORMAT),
                i64_of(stat, "size")
            ),
            _ => full_path.to_string(),
        };
        writeln!(self.out, "{line}")?;
        writeln!(self.file, "{line}")?;
        Ok(())
    }
}
