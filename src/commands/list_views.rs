//! `list-views`: a protocol/name table, or the detailed settings of each view.

use std::io::Write;

use anyhow::{bail, Result};
use serde_json::Value;

use super::{i64_of, items, str_of, strip_marker};
use crate::api::ApiClient;
use crate::cli::Units;
use crate::dates::{usecs_to_date, DEFAULT_FORMAT};
use crate::transport::Transport;
use crate::ui::Prompter;

pub struct ListViews {
    pub name: Option<String>,
    pub show_settings: bool,
    pub units: Units,
}

pub fn run<T: Transport, P: Prompter>(
    api: &ApiClient<T, P>,
    opts: &ListViews,
    out: &mut impl Write,
) -> Result<i32> {
    let Some(listing) = api.get("views").into_value() else {
        bail!("unable to list views");
    };
    if i64_of(&listing, "count") == 0 {
        return Ok(0);
    }

    let mut views: Vec<&Value> = items(listing.get("views"))
        .iter()
        .filter(|v| match &opts.name {
            Some(name) => str_of(v, "name").eq_ignore_ascii_case(name),
            None => true,
        })
        .collect();
    if let (Some(name), true) = (&opts.name, views.is_empty()) {
        writeln!(out, "view {name} not found")?;
        return Ok(1);
    }
    views.sort_by_key(|v| str_of(v, "name").to_lowercase());

    if opts.show_settings || opts.name.is_some() {
        for view in views {
            write_settings(view, opts.units, out)?;
        }
        writeln!(out)?;
    } else {
        writeln!(out, "\nProto  Name")?;
        writeln!(out, "-----  ----")?;
        for view in views {
            writeln!(out, " {:<4}  {}", protocol(view), str_of(view, "name"))?;
        }
        writeln!(out)?;
    }
    Ok(0)
}

fn protocol(view: &Value) -> String {
    strip_marker(str_of(view, "protocolAccess")).replace("Only", "")
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `days:hh:mm:ss` for a duration in milliseconds.
pub(crate) fn time_string(msecs: i64) -> String {
    let secs = msecs / 1000;
    format!(
        "{}:{:02}:{:02}:{:02}",
        secs / 86_400,
        (secs % 86_400) / 3_600,
        (secs / 60) % 60,
        secs % 60
    )
}

fn write_settings(view: &Value, units: Units, out: &mut impl Write) -> Result<()> {
    let label = units.label();
    let scaled = |bytes: f64| bytes / units.multiplier();

    writeln!(out, "\n                      Name: {}", str_of(view, "name"))?;
    writeln!(
        out,
        "               Create Date: {}",
        usecs_to_date(i64_of(view, "createTimeMsecs") * 1000, DEFAULT_FORMAT)
    )?;
    writeln!(out, "            Storage Domain: {}", str_of(view, "viewBoxName"))?;
    writeln!(out, "                  Protocol: {}", protocol(view))?;
    for (key, caption) in [
        ("nfsMountPath", "            NFS Mount Path"),
        ("smbMountPath", "            SMB Mount Path"),
        ("s3AccessPath", "             S3 Mount Path"),
    ] {
        if view.get(key).is_some() {
            writeln!(out, "{caption}: {}", str_of(view, key))?;
        }
    }
    let protected = if view.get("viewProtection").is_some() { "True" } else { "False" };
    writeln!(out, "                 Protected: {protected}")?;
    let logical = view
        .get("logicalUsageBytes")
        .and_then(Value::as_f64)
        .unwrap_or_default();
    writeln!(out, "             Logical Usage: {} {label}", round2(scaled(logical)))?;
    if let Some(quota) = view.get("logicalQuota") {
        let limit = |key: &str| scaled(quota.get(key).and_then(Value::as_f64).unwrap_or_default()).round() as i64;
        writeln!(out, "             Logical Quota: {} {label}", limit("hardLimitBytes"))?;
        writeln!(out, "               Quota Alert: {} {label}", limit("alertLimitBytes"))?;
    }
    let qos = view.get("qos").map(|q| str_of(q, "principalName")).unwrap_or_default();
    writeln!(out, "                QOS Policy: {qos}")?;

    if let Some(whitelist) = view.get("subnetWhitelist") {
        writeln!(out, "                 Whitelist:")?;
        for (i, entry) in items(Some(whitelist)).iter().enumerate() {
            if i > 0 {
                writeln!(out)?;
            }
            let squash = entry
                .get("nfsRootSquash")
                .map(|v| match v {
                    Value::Bool(true) => "True".to_string(),
                    Value::Bool(false) => "False".to_string(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "n/a".to_string());
            let pad = " ".repeat(28);
            writeln!(out, "{pad}{}/{}", str_of(entry, "ip"), i64_of(entry, "netmaskBits"))?;
            writeln!(out, "{pad}nfsRootSquash: {squash}")?;
            writeln!(out, "{pad}nfsAccess: {}", strip_marker(str_of(entry, "nfsAccess")))?;
            writeln!(out, "{pad}smbAccess: {}", strip_marker(str_of(entry, "smbAccess")))?;
        }
    }

    if let Some(lock) = view.get("fileLockConfig") {
        let or_none = |key: &str| lock.get(key).and_then(Value::as_str).unwrap_or("kNone");
        writeln!(out, "             Datalock Mode: {}", strip_marker(or_none("mode")))?;
        if let Some(idle) = lock.get("autoLockAfterDurationIdle").and_then(Value::as_f64) {
            writeln!(out, "    Auto Lock Idle Minutes: {}", idle / 60_000.0)?;
        }
        if lock.get("defaultFileRetentionDurationMsecs").is_some() {
            let period = time_string(i64_of(lock, "defaultFileRetentionDurationMsecs"));
            writeln!(out, "       Default Lock Period: {period}")?;
        }
        writeln!(out, "  Manual Datalock Protocol: {}", strip_marker(or_none("lockingProtocol")))?;
        if lock.get("minRetentionDurationMsecs").is_some() {
            let period = time_string(i64_of(lock, "minRetentionDurationMsecs"));
            writeln!(out, "       Minimum Lock Period: {period}")?;
        }
        if lock.get("maxRetentionDurationMsecs").is_some() {
            let period = time_string(i64_of(lock, "maxRetentionDurationMsecs"));
            writeln!(out, "       Maximum Lock Period: {period}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{connected_client, ScriptedPrompter, ScriptedTransport};
    use serde_json::json;
    use tempfile::TempDir;

    fn views() -> Value {
        json!({
            "count": 2,
            "views": [
                {"name": "zeta", "protocolAccess": "kNfsOnly", "viewBoxName": "sd1",
                 "createTimeMsecs": 0, "logicalUsageBytes": 1610612736_i64,
                 "qos": {"principalName": "TestAndDev High"},
                 "logicalQuota": {"hardLimitBytes": 10737418240_i64, "alertLimitBytes": 9663676416_i64},
                 "subnetWhitelist": [{"ip": "10.0.0.0", "netmaskBits": 8,
                                      "nfsAccess": "kReadWrite", "smbAccess": "kReadOnly"}]},
                {"name": "Alpha", "protocolAccess": "kSMBOnly", "viewBoxName": "sd1",
                 "createTimeMsecs": 0, "logicalUsageBytes": 0,
                 "qos": {"principalName": "Backup Target Low"}}
            ]
        })
    }

    #[test]
    fn time_string_formats_days_and_clock() {
        assert_eq!(time_string(0), "0:00:00:00");
        assert_eq!(time_string((86_400 + 3_600 + 61) * 1000), "1:01:01:01");
    }

    #[test]
    fn table_is_sorted_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new().reply_json(200, views());
        let prompter = ScriptedPrompter::new(&[]);
        let api = connected_client(&transport, &prompter, dir.path());
        let opts = ListViews {
            name: None,
            show_settings: false,
            units: Units::Gib,
        };

        let mut out = Vec::new();
        assert_eq!(run(&api, &opts, &mut out).unwrap(), 0);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "\nProto  Name\n-----  ----\n SMB   Alpha\n Nfs   zeta\n\n");
    }

    #[test]
    fn named_view_prints_settings() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new().reply_json(200, views());
        let prompter = ScriptedPrompter::new(&[]);
        let api = connected_client(&transport, &prompter, dir.path());
        let opts = ListViews {
            name: Some("ZETA".to_string()),
            show_settings: false,
            units: Units::Gib,
        };

        let mut out = Vec::new();
        assert_eq!(run(&api, &opts, &mut out).unwrap(), 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Name: zeta"));
        assert!(text.contains("Logical Usage: 1.5 GiB"));
        assert!(text.contains("Logical Quota: 10 GiB"));
        assert!(text.contains("Quota Alert: 9 GiB"));
        assert!(text.contains("10.0.0.0/8"));
        assert!(text.contains("nfsRootSquash: n/a"));
        assert!(text.contains("smbAccess: ReadOnly"));
        assert!(!text.contains("Alpha"));
    }

    #[test]
    fn unknown_view_exits_one() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new().reply_json(200, views());
        let prompter = ScriptedPrompter::new(&[]);
        let api = connected_client(&transport, &prompter, dir.path());
        let opts = ListViews {
            name: Some("missing".to_string()),
            show_settings: false,
            units: Units::Mib,
        };

        let mut out = Vec::new();
        assert_eq!(run(&api, &opts, &mut out).unwrap(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "view missing not found\n");
    }
}
