//! Session context: base URLs, auth headers and the authenticated flag.
//!
//! A context is a plain value. `ApiClient` keeps a default one for
//! single-cluster scripts; callers working against several clusters export
//! each authenticated context and pass it explicitly to
//! [`ApiClient::call_in`](crate::api::ApiClient::call_in).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Backend URL root a call is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndpointKind {
    /// `/irisservices/api/v1`. Paths not starting with `/` go under `/public/`.
    V1,
    V2,
    /// Hosted multi-cluster service.
    Mcm,
    McmV2,
    ReportingV2,
}

impl EndpointKind {
    pub const ALL: [EndpointKind; 5] = [
        EndpointKind::V1,
        EndpointKind::V2,
        EndpointKind::Mcm,
        EndpointKind::McmV2,
        EndpointKind::ReportingV2,
    ];

    fn suffix(self) -> &'static str {
        match self {
            EndpointKind::V1 => "/irisservices/api/v1",
            EndpointKind::V2 => "/v2/",
            EndpointKind::Mcm => "/mcm/",
            EndpointKind::McmV2 => "/v2/mcm/",
            EndpointKind::ReportingV2 => "/heliosreporting/api/v1/public/",
        }
    }
}

/// Cluster registered with the hosted service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeliosCluster {
    pub cluster_id: serde_json::Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub software_version: String,
    #[serde(default)]
    pub connected_to_cluster: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub roots: BTreeMap<EndpointKind, String>,
    pub headers: BTreeMap<String, String>,
    pub authenticated: bool,
    #[serde(default)]
    pub helios_clusters: Vec<HeliosCluster>,
}

impl SessionContext {
    /// Unauthenticated context for `vip`, with every URL root populated and
    /// JSON content headers set. `vip` may carry its own scheme; bare hosts
    /// use https.
    pub fn for_vip(vip: &str) -> Self {
        let base = if vip.starts_with("http://") || vip.starts_with("https://") {
            vip.trim_end_matches('/').to_string()
        } else {
            format!("https://{vip}")
        };
        let roots = EndpointKind::ALL
            .iter()
            .map(|kind| (*kind, format!("{base}{}", kind.suffix())))
            .collect();

        let mut ctx = SessionContext {
            roots,
            ..Default::default()
        };
        ctx.set_header("accept", "application/json");
        ctx.set_header("content-type", "application/json");
        ctx
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_string(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Full URL for `path` under the `kind` root.
    pub fn url(&self, kind: EndpointKind, path: &str) -> Option<String> {
        let root = self.roots.get(&kind)?;
        let url = match kind {
            EndpointKind::V1 if !path.starts_with('/') => format!("{root}/public/{path}"),
            _ => format!("{root}{path}"),
        };
        Some(url)
    }

    /// A context is installable only when it carries headers and the v1 and
    /// v2 roots.
    pub fn validate(&self) -> Result<()> {
        if self.headers.is_empty() {
            return Err(Error::InvalidContext("missing headers".into()));
        }
        for kind in [EndpointKind::V1, EndpointKind::V2] {
            if self.roots.get(&kind).map_or(true, |r| r.is_empty()) {
                return Err(Error::InvalidContext(format!("missing {kind:?} root")));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode and validate a context exported by another process.
    pub fn from_json(json: &str) -> Result<Self> {
        let ctx: SessionContext = serde_json::from_str(json)?;
        ctx.validate()?;
        Ok(ctx)
    }
}
