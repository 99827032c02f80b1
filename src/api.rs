// API client module: a small blocking client for the cluster REST API.
// It owns the default session context, the credential store and the
// transport, and exposes one generic `call` that every command builds on.

use serde_json::{json, Value};

use crate::config::Paths;
use crate::credentials::{CredentialResolver, CredentialStore};
use crate::error::Result;
use crate::logging::DebugLog;
use crate::session::{EndpointKind, HeliosCluster, SessionContext};
use crate::transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
use crate::ui::{Prompter, TerminalPrompter};

/// Normalized outcome of an API call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// Decoded JSON body.
    Value(Value),
    /// 204, a body that is not JSON, or a bare boolean/null body.
    Empty,
    /// 404.
    NotFound,
    /// Body carried an `errorCode`. The code has its leading marker
    /// character stripped (`kFoo` becomes `Foo`).
    Error { code: String, message: Option<String> },
    /// The context was not authenticated; no request was sent.
    NotConnected,
    /// Connection, DNS or TLS failure.
    Unreachable(String),
}

impl ApiResponse {
    pub fn from_http(response: &HttpResponse) -> Self {
        match response.status {
            204 => return ApiResponse::Empty,
            404 => return ApiResponse::NotFound,
            _ => {}
        }
        match response.json() {
            None | Some(Value::Bool(_)) | Some(Value::Null) => ApiResponse::Empty,
            Some(Value::Object(map)) if map.contains_key("errorCode") => {
                let code = match &map["errorCode"] {
                    Value::String(s) => s.chars().skip(1).collect(),
                    other => other.to_string(),
                };
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(String::from);
                ApiResponse::Error { code, message }
            }
            Some(value) => ApiResponse::Value(value),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ApiResponse::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            ApiResponse::Value(v) => Some(v),
            _ => None,
        }
    }

    /// `{"error": "<code>: <message>"}` for backend errors that carry a
    /// message; `None` otherwise.
    pub fn error_record(&self) -> Option<Value> {
        match self {
            ApiResponse::Error {
                code,
                message: Some(message),
            } => Some(json!({ "error": format!("{code}: {message}") })),
            _ => None,
        }
    }

    /// True for every outcome that carries no usable data.
    pub fn is_null(&self) -> bool {
        !matches!(self, ApiResponse::Value(_) | ApiResponse::Empty)
    }
}

/// Blocking API client holding the default session context.
pub struct ApiClient<T = ReqwestTransport, P = TerminalPrompter> {
    pub(crate) transport: T,
    pub(crate) prompter: P,
    pub(crate) context: SessionContext,
    pub(crate) store: CredentialStore,
    pub(crate) log: DebugLog,
}

impl ApiClient {
    /// Client using reqwest, the terminal for prompts and the store/log
    /// locations from the environment (see [`Paths::from_env`]).
    pub fn from_env() -> Result<Self> {
        let transport = ReqwestTransport::new()?;
        Ok(ApiClient::with_parts(
            transport,
            TerminalPrompter,
            &Paths::from_env(),
        ))
    }
}

impl<T: Transport, P: Prompter> ApiClient<T, P> {
    pub fn with_parts(transport: T, prompter: P, paths: &Paths) -> Self {
        ApiClient {
            transport,
            prompter,
            context: SessionContext::default(),
            store: CredentialStore::new(paths),
            log: DebugLog::new(&paths.log_file),
        }
    }

    pub fn resolver(&self) -> CredentialResolver<'_> {
        CredentialResolver::new(&self.store, &self.prompter, &self.log)
    }

    pub fn debug_log(&self) -> &DebugLog {
        &self.log
    }

    /// Copy of the default context, for use with [`ApiClient::call_in`] or
    /// for handing to another client.
    pub fn context(&self) -> SessionContext {
        self.context.clone()
    }

    /// Replace the default context. Rejected unless the context carries
    /// headers and the v1/v2 roots.
    pub fn set_context(&mut self, context: SessionContext) -> Result<()> {
        if let Err(err) = context.validate() {
            tracing::warn!("Invalid context: {err}");
            return Err(err);
        }
        self.context = context;
        Ok(())
    }

    pub fn connected(&self) -> bool {
        self.context.authenticated
    }

    pub fn drop_session(&mut self) {
        self.context.authenticated = false;
    }

    pub fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        kind: EndpointKind,
    ) -> ApiResponse {
        self.call_in(&self.context, method, path, body, kind)
    }

    pub fn get(&self, path: &str) -> ApiResponse {
        self.call(Method::Get, path, None, EndpointKind::V1)
    }

    /// Issue a call against an explicit context. Never fails: every
    /// outcome, including transport faults, is an [`ApiResponse`].
    pub fn call_in(
        &self,
        context: &SessionContext,
        method: Method,
        path: &str,
        body: Option<&Value>,
        kind: EndpointKind,
    ) -> ApiResponse {
        if !context.authenticated {
            tracing::warn!("Not Connected");
            return ApiResponse::NotConnected;
        }
        let Some(url) = context.url(kind, path) else {
            tracing::warn!(?kind, "context has no root for endpoint");
            return ApiResponse::NotConnected;
        };

        let request = HttpRequest {
            method,
            url,
            headers: context.headers.clone(),
            body: body.cloned(),
        };
        let response = match self.transport.send(&request) {
            Ok(response) => response,
            Err(err) => {
                self.log.write(err.to_string());
                tracing::warn!("{err}");
                return ApiResponse::Unreachable(err.0);
            }
        };

        let outcome = ApiResponse::from_http(&response);
        match &outcome {
            ApiResponse::NotFound => tracing::warn!("Invalid api call: {path}"),
            ApiResponse::Error {
                code,
                message: Some(message),
            } => tracing::warn!("{code}: {message}"),
            ApiResponse::Error { code, message: None } => tracing::warn!("{code}"),
            _ => {}
        }
        outcome
    }

    /// Connected clusters of the hosted service, sorted by name.
    pub fn helios_clusters(&self) -> Vec<HeliosCluster> {
        let mut clusters = self.context.helios_clusters.clone();
        clusters.sort_by_key(|c| c.name.to_lowercase());
        clusters
    }

    /// Route subsequent hosted calls to the named cluster. Returns false
    /// when no connected cluster has that name.
    pub fn helios_cluster(&mut self, name: &str) -> bool {
        let cluster_id = self
            .context
            .helios_clusters
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| match &c.cluster_id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        match cluster_id {
            Some(id) => {
                self.context.set_header("accessClusterId", id);
                tracing::debug!("Using {name}");
                true
            }
            None => {
                tracing::warn!("Cluster {name} not connected to Helios");
                false
            }
        }
    }
}
