//! Authentication handshakes.
//!
//! Three target shapes are supported:
//!
//! - the hosted multi-cluster service (API key, then a connection-status check)
//! - a cluster with an API key (one verifying `cluster` call)
//! - a cluster with username/password (access token, falling back to a v2
//!   session when the token endpoint answers "access denied")
//!
//! A rejection caused by a possibly stale stored secret is retried exactly
//! once with a forced credential refresh.

use serde_json::{json, Value};
use thiserror::Error;

use crate::api::{ApiClient, ApiResponse};
use crate::config::HELIOS_HOST;
use crate::credentials::{CredentialRequest, Identity, PromptMode};
use crate::session::{EndpointKind, HeliosCluster, SessionContext};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::ui::Prompter;

// Backend wording that drives the fallbacks. Matched as substrings.
const AUTH_FAILED: &str = "Authentication failed";
const ACCESS_DENIED: &str = "access denied";
const INVALID_USERNAME: &str = "invalid username";

#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub vip: String,
    /// May carry the domain as `DOMAIN\user` or `DOMAIN/user`.
    pub username: String,
    pub domain: String,
    pub password: Option<String>,
    pub prompt: PromptMode,
    pub use_api_key: bool,
    /// Treat `vip` as the hosted multi-cluster service.
    pub helios: bool,
    pub tenant_id: Option<String>,
    pub region_id: Option<String>,
    /// Allow one retry with a refreshed credential.
    pub retry: bool,
    pub mfa_type: String,
    pub mfa_code: Option<String>,
    pub email_mfa: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        AuthOptions {
            vip: HELIOS_HOST.to_string(),
            username: "helios".to_string(),
            domain: "local".to_string(),
            password: None,
            prompt: PromptMode::Fallback,
            use_api_key: false,
            helios: false,
            tenant_id: None,
            region_id: None,
            retry: true,
            mfa_type: "Totp".to_string(),
            mfa_code: None,
            email_mfa: false,
        }
    }
}

impl AuthOptions {
    pub fn new(vip: impl Into<String>, username: impl Into<String>) -> Self {
        AuthOptions {
            vip: vip.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn hosted(&self) -> bool {
        self.helios || self.vip.eq_ignore_ascii_case(HELIOS_HOST)
    }

    /// `(domain, username)` with any `DOMAIN\user` prefix split off.
    pub fn account(&self) -> (String, String) {
        match self.username.split_once(['\\', '/']) {
            Some((domain, user)) => (domain.to_string(), user.to_string()),
            None => (self.domain.clone(), self.username.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("no credential available")]
    NoCredential,
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Transport(String),
    #[error("Authentication Failed")]
    Unverified,
}

/// Failed attempt. `stale_secret` marks rejections that a refreshed
/// credential may fix.
struct Rejection {
    failure: AuthFailure,
    stale_secret: bool,
}

impl Rejection {
    fn fatal(failure: AuthFailure) -> Self {
        Rejection {
            failure,
            stale_secret: false,
        }
    }

    fn stale(failure: AuthFailure) -> Self {
        Rejection {
            failure,
            stale_secret: true,
        }
    }
}

fn message_of(response: &HttpResponse) -> String {
    response
        .json()
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl<T: Transport, P: Prompter> ApiClient<T, P> {
    /// Authenticate and install the resulting context as the default one.
    ///
    /// Any failure leaves the default context unauthenticated and is
    /// returned as a value.
    pub fn authenticate(&mut self, opts: &AuthOptions) -> Result<SessionContext, AuthFailure> {
        let (domain, username) = opts.account();
        let identity = Identity::new(&opts.vip, &domain, &username, opts.use_api_key, opts.hosted());
        self.context = SessionContext::for_vip(&opts.vip);

        let mut last = AuthFailure::NoCredential;
        for refresh in [false, true] {
            if refresh && !opts.retry {
                break;
            }
            match self.attempt(opts, &identity, refresh) {
                Ok(mut ctx) => {
                    if let Some(tenant) = &opts.tenant_id {
                        ctx.set_header("x-impersonate-tenant-id", format!("{tenant}/"));
                    }
                    ctx.authenticated = true;
                    self.context = ctx;
                    tracing::info!("Connected!");
                    return Ok(self.context.clone());
                }
                Err(rejection) => {
                    last = rejection.failure;
                    if !rejection.stale_secret {
                        break;
                    }
                }
            }
        }
        self.context.authenticated = false;
        Err(last)
    }

    fn attempt(
        &self,
        opts: &AuthOptions,
        identity: &Identity,
        refresh: bool,
    ) -> Result<SessionContext, Rejection> {
        let request = CredentialRequest {
            password: if refresh { None } else { opts.password.as_deref() },
            prompt: opts.prompt,
            force_refresh: refresh,
        };
        let secret = self
            .resolver()
            .resolve(identity, &request)
            .ok_or(Rejection::fatal(AuthFailure::NoCredential))?;

        let ctx = SessionContext::for_vip(&opts.vip);
        if opts.hosted() {
            self.hosted_handshake(ctx, opts, &secret)
        } else if opts.use_api_key {
            self.api_key_handshake(ctx, opts, &secret)
        } else {
            let (domain, username) = opts.account();
            self.password_handshake(ctx, opts, &domain, &username, &secret)
        }
    }

    fn send(
        &self,
        ctx: &SessionContext,
        method: Method,
        kind: EndpointKind,
        path: &str,
        body: Option<Value>,
    ) -> Result<HttpResponse, Rejection> {
        let url = ctx
            .url(kind, path)
            .ok_or(Rejection::fatal(AuthFailure::Unverified))?;
        let request = HttpRequest {
            method,
            url,
            headers: ctx.headers.clone(),
            body,
        };
        self.transport.send(&request).map_err(|err| {
            self.log.write(err.to_string());
            tracing::warn!("{err}");
            Rejection::fatal(AuthFailure::Transport(err.0))
        })
    }

    fn hosted_handshake(
        &self,
        mut ctx: SessionContext,
        opts: &AuthOptions,
        secret: &str,
    ) -> Result<SessionContext, Rejection> {
        ctx.set_header("apiKey", secret);
        if let Some(region) = &opts.region_id {
            ctx.set_header("regionid", region.clone());
        }

        let status = self.send(&ctx, Method::Get, EndpointKind::Mcm, "clusters/connectionStatus", None)?;
        match status.json() {
            Some(Value::Object(map)) if map.contains_key("message") => {
                let message = map["message"].as_str().unwrap_or_default().to_string();
                tracing::warn!("{message}");
                let failure = AuthFailure::Rejected(message.clone());
                if message.contains(AUTH_FAILED) {
                    Err(Rejection::stale(failure))
                } else {
                    Err(Rejection::fatal(failure))
                }
            }
            Some(Value::Array(items)) => {
                ctx.helios_clusters = items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value::<HeliosCluster>(item).ok())
                    .filter(|c| c.connected_to_cluster)
                    .collect();
                Ok(ctx)
            }
            _ => {
                // region-based backend: the cluster list is not available
                let regions = self.send(&ctx, Method::Get, EndpointKind::McmV2, "dms/regions", None)?;
                match regions.json() {
                    Some(Value::Object(map)) if map.contains_key("message") => {
                        let message = map["message"].as_str().unwrap_or_default().to_string();
                        tracing::warn!("{message}");
                        Err(Rejection::fatal(AuthFailure::Rejected(message)))
                    }
                    Some(Value::Object(map)) if map.contains_key("errorCode") => {
                        Err(Rejection::fatal(AuthFailure::Unverified))
                    }
                    Some(_) => Ok(ctx),
                    None => Err(Rejection::fatal(AuthFailure::Unverified)),
                }
            }
        }
    }

    fn api_key_handshake(
        &self,
        mut ctx: SessionContext,
        opts: &AuthOptions,
        secret: &str,
    ) -> Result<SessionContext, Rejection> {
        ctx.set_header("apiKey", secret);
        if let Some(tenant) = &opts.tenant_id {
            ctx.set_header("x-impersonate-tenant-id", format!("{tenant}/"));
        }
        ctx.authenticated = true;

        let cluster = self.call_in(&ctx, Method::Get, "cluster", None, EndpointKind::V1);
        let verified = matches!(&cluster, ApiResponse::Value(v) if v.get("id").is_some());
        if verified {
            Ok(ctx)
        } else {
            tracing::warn!("Authentication Failed");
            Err(Rejection::stale(AuthFailure::Unverified))
        }
    }

    fn password_handshake(
        &self,
        mut ctx: SessionContext,
        opts: &AuthOptions,
        domain: &str,
        username: &str,
        secret: &str,
    ) -> Result<SessionContext, Rejection> {
        let mut mfa_type = opts.mfa_type.clone();
        let mut mfa_code = opts.mfa_code.clone();
        if opts.email_mfa {
            let dispatch = json!({ "domain": domain, "password": secret, "username": username });
            self.send(&ctx, Method::Post, EndpointKind::V2, "email-otp", Some(dispatch))?;
            mfa_code = self.prompter.password("Enter emailed MFA code");
            mfa_type = "Email".to_string();
        }

        let creds = json!({
            "domain": domain,
            "password": secret,
            "username": username,
            "otpType": mfa_type,
            "otpCode": mfa_code,
        });
        let response = self.send(&ctx, Method::Post, EndpointKind::V1, "/public/accessTokens", Some(creds))?;
        if response.status == 201 {
            let body = response.json().unwrap_or_default();
            let token = body.get("accessToken").and_then(Value::as_str);
            let token_type = body.get("tokenType").and_then(Value::as_str);
            let (Some(token), Some(token_type)) = (token, token_type) else {
                return Err(Rejection::fatal(AuthFailure::Unverified));
            };
            ctx.set_header("authorization", format!("{token_type} {token}"));
            return Ok(ctx);
        }

        let message = message_of(&response);
        if !message.to_lowercase().contains(ACCESS_DENIED) {
            return Err(self.rejected(message));
        }

        let creds = json!({
            "domain": domain,
            "password": secret,
            "username": username,
            "otpType": mfa_type.to_lowercase(),
            "otpCode": mfa_code,
        });
        let response = self.send(&ctx, Method::Post, EndpointKind::V2, "users/sessions", Some(creds))?;
        if response.status == 201 {
            let session_id = response
                .json()
                .as_ref()
                .and_then(|v| v.get("sessionId"))
                .and_then(Value::as_str)
                .map(String::from);
            let Some(session_id) = session_id else {
                return Err(Rejection::fatal(AuthFailure::Unverified));
            };
            ctx.set_header("session-id", session_id);
            return Ok(ctx);
        }
        Err(self.rejected(message_of(&response)))
    }

    /// Log a backend refusal. Only an "invalid username" answer is worth a
    /// retry with a fresh secret.
    fn rejected(&self, message: String) -> Rejection {
        self.log.write(&message);
        tracing::warn!("{message}");
        let stale = message.to_lowercase().contains(INVALID_USERNAME);
        let failure = AuthFailure::Rejected(message);
        if stale {
            Rejection::stale(failure)
        } else {
            Rejection::fatal(failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use crate::credentials::CredentialResolver;
    use crate::testing::{ScriptedPrompter, ScriptedTransport};
    use tempfile::TempDir;

    fn client<'a>(
        transport: &'a ScriptedTransport,
        prompter: &'a ScriptedPrompter,
        dir: &TempDir,
    ) -> ApiClient<&'a ScriptedTransport, &'a ScriptedPrompter> {
        let paths = Paths::in_dir(dir.path());
        paths.ensure_config_dir();
        ApiClient::with_parts(transport, prompter, &paths)
    }

    fn seed(api: &ApiClient<&ScriptedTransport, &ScriptedPrompter>, identity: &Identity, secret: &str) {
        let resolver: CredentialResolver<'_> = api.resolver();
        resolver.set_password(identity, Some(secret)).unwrap();
    }

    #[test]
    fn password_auth_stores_bearer_token() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .reply_json(201, json!({"accessToken": "tok", "tokenType": "Bearer"}));
        let prompter = ScriptedPrompter::new(&[]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            domain: "local".into(),
            password: Some("x".into()),
            ..AuthOptions::new("c1", "bob")
        };
        let ctx = api.authenticate(&opts).unwrap();
        assert!(ctx.authenticated);
        assert_eq!(ctx.header("authorization"), Some("Bearer tok"));
        assert!(api.connected());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url,
            "https://c1/irisservices/api/v1/public/accessTokens"
        );
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["domain"], "local");
        assert_eq!(body["username"], "bob");
        assert_eq!(body["password"], "x");
        assert_eq!(body["otpType"], "Totp");
        assert_eq!(prompter.count(), 0);
    }

    #[test]
    fn access_denied_falls_back_to_session_auth() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .reply_json(401, json!({"message": "Access denied for token"}))
            .reply_json(201, json!({"sessionId": "sess-1"}));
        let prompter = ScriptedPrompter::new(&[]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("x".into()),
            tenant_id: Some("org1".into()),
            ..AuthOptions::new("c1", "bob")
        };
        let ctx = api.authenticate(&opts).unwrap();
        assert_eq!(ctx.header("session-id"), Some("sess-1"));
        assert_eq!(ctx.header("x-impersonate-tenant-id"), Some("org1/"));

        let requests = transport.requests();
        assert_eq!(requests[1].url, "https://c1/v2/users/sessions");
        assert_eq!(requests[1].body.as_ref().unwrap()["otpType"], "totp");
    }

    #[test]
    fn invalid_username_retries_once_with_refreshed_secret() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .reply_json(401, json!({"message": "Invalid username or password"}))
            .reply_json(401, json!({"message": "Invalid username or password"}));
        let prompter = ScriptedPrompter::new(&["fresh"]);
        let mut api = client(&transport, &prompter, &dir);
        let identity = Identity::new("c1", "local", "bob", false, false);
        seed(&api, &identity, "stale");

        let opts = AuthOptions::new("c1", "bob");
        let failure = api.authenticate(&opts).unwrap_err();
        assert!(matches!(failure, AuthFailure::Rejected(_)));
        assert!(!api.connected());
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(prompter.count(), 1);

        let bodies: Vec<Value> = transport
            .requests()
            .into_iter()
            .map(|r| r.body.unwrap()["password"].clone())
            .collect();
        assert_eq!(bodies, vec![json!("stale"), json!("fresh")]);
        assert_eq!(api.store.lookup(&identity).as_deref(), Some("fresh"));
    }

    #[test]
    fn invalid_username_after_session_fallback_retries_once() {
        let dir = TempDir::new().unwrap();
        let denied = json!({"message": "Access denied for token"});
        let invalid = json!({"message": "Invalid username or password"});
        let transport = ScriptedTransport::new()
            .reply_json(401, denied.clone())
            .reply_json(401, invalid.clone())
            .reply_json(401, denied)
            .reply_json(401, invalid);
        let prompter = ScriptedPrompter::new(&["fresh"]);
        let mut api = client(&transport, &prompter, &dir);
        let identity = Identity::new("c1", "local", "bob", false, false);
        seed(&api, &identity, "stale");

        let opts = AuthOptions::new("c1", "bob");
        assert_eq!(
            api.authenticate(&opts),
            Err(AuthFailure::Rejected("Invalid username or password".into()))
        );
        assert_eq!(prompter.count(), 1);
        assert!(!api.connected());

        let requests = transport.requests();
        let urls: Vec<&str> = requests.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://c1/irisservices/api/v1/public/accessTokens",
                "https://c1/v2/users/sessions",
                "https://c1/irisservices/api/v1/public/accessTokens",
                "https://c1/v2/users/sessions",
            ]
        );
        assert_eq!(requests[1].body.as_ref().unwrap()["password"], "stale");
        assert_eq!(requests[3].body.as_ref().unwrap()["password"], "fresh");
    }

    #[test]
    fn other_rejections_are_not_retried() {
        let dir = TempDir::new().unwrap();
        let transport =
            ScriptedTransport::new().reply_json(401, json!({"message": "Account locked"}));
        let prompter = ScriptedPrompter::new(&["unused"]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("x".into()),
            ..AuthOptions::new("c1", "bob")
        };
        assert_eq!(
            api.authenticate(&opts),
            Err(AuthFailure::Rejected("Account locked".into()))
        );
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(prompter.count(), 0);
        let log = std::fs::read_to_string(api.debug_log().path()).unwrap();
        assert!(log.contains("Account locked"));
    }

    #[test]
    fn hosted_auth_failure_retries_exactly_once() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .reply_json(200, json!({"message": "Authentication failed"}))
            .reply_json(200, json!({"message": "Authentication failed"}))
            .reply_json(200, json!({"message": "Authentication failed"}));
        let prompter = ScriptedPrompter::new(&["key-2", "key-3"]);
        let mut api = client(&transport, &prompter, &dir);
        let identity = Identity::new(HELIOS_HOST, "local", "helios", false, true);
        seed(&api, &identity, "key-1");

        let opts = AuthOptions::default();
        assert!(api.authenticate(&opts).is_err());
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(prompter.count(), 1);
        assert!(!api.connected());
    }

    #[test]
    fn hosted_auth_without_retry_gives_up() {
        let dir = TempDir::new().unwrap();
        let transport =
            ScriptedTransport::new().reply_json(200, json!({"message": "Authentication failed"}));
        let prompter = ScriptedPrompter::new(&["unused"]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("key".into()),
            retry: false,
            ..AuthOptions::default()
        };
        assert_eq!(
            api.authenticate(&opts),
            Err(AuthFailure::Rejected("Authentication failed".into()))
        );
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(prompter.count(), 0);
    }

    #[test]
    fn hosted_auth_caches_connected_clusters() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new().reply_json(
            200,
            json!([
                {"clusterId": 1, "name": "b", "softwareVersion": "7", "connectedToCluster": true},
                {"clusterId": 2, "name": "a", "softwareVersion": "7", "connectedToCluster": false},
                {"clusterId": 3, "name": "A2", "softwareVersion": "6", "connectedToCluster": true}
            ]),
        );
        let prompter = ScriptedPrompter::new(&[]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("key".into()),
            region_id: Some("us-east".into()),
            ..AuthOptions::default()
        };
        let ctx = api.authenticate(&opts).unwrap();
        assert_eq!(ctx.header("apiKey"), Some("key"));
        assert_eq!(ctx.header("regionid"), Some("us-east"));
        assert_eq!(
            transport.urls(),
            vec!["https://helios.cohesity.com/mcm/clusters/connectionStatus"]
        );
        let names: Vec<String> = api.helios_clusters().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["A2", "b"]);
    }

    #[test]
    fn hosted_region_backend_checks_regions() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .reply_json(200, json!({"errorCode": "kNotSupported"}))
            .reply_json(200, json!({"regions": []}));
        let prompter = ScriptedPrompter::new(&[]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("key".into()),
            ..AuthOptions::new("dmaas.example.com", "helios")
        };
        let opts = AuthOptions { helios: true, ..opts };
        assert!(api.authenticate(&opts).is_ok());
        assert_eq!(
            transport.urls()[1],
            "https://dmaas.example.com/v2/mcm/dms/regions"
        );
    }

    #[test]
    fn hosted_regions_refusal_fails_without_retry() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .reply_json(200, json!({"errorCode": "kNotSupported"}))
            .reply_json(403, json!({"errorCode": "kPermissionDenied", "message": "no region access"}));
        let prompter = ScriptedPrompter::new(&["unused"]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("key".into()),
            ..AuthOptions::default()
        };
        assert_eq!(
            api.authenticate(&opts),
            Err(AuthFailure::Rejected("no region access".into()))
        );
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(prompter.count(), 0);
        assert!(!api.connected());
    }

    #[test]
    fn hosted_regions_error_code_is_unverified() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .reply_json(200, json!({"errorCode": "kNotSupported"}))
            .reply_json(500, json!({"errorCode": "kInternal"}));
        let prompter = ScriptedPrompter::new(&[]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("key".into()),
            ..AuthOptions::default()
        };
        assert_eq!(api.authenticate(&opts), Err(AuthFailure::Unverified));
        assert!(!api.connected());
    }

    #[test]
    fn hosted_success_sets_tenant_header() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new().reply_json(
            200,
            json!([{"clusterId": 1, "name": "c1", "softwareVersion": "7", "connectedToCluster": true}]),
        );
        let prompter = ScriptedPrompter::new(&[]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("key".into()),
            tenant_id: Some("t1".into()),
            ..AuthOptions::default()
        };
        let ctx = api.authenticate(&opts).unwrap();
        assert_eq!(ctx.header("x-impersonate-tenant-id"), Some("t1/"));
        assert_eq!(api.context().header("x-impersonate-tenant-id"), Some("t1/"));
        assert!(transport.requests()[0]
            .headers
            .get("x-impersonate-tenant-id")
            .is_none());
    }

    #[test]
    fn api_key_auth_verifies_with_cluster_call() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new().reply_json(200, json!({"id": 123, "name": "c1"}));
        let prompter = ScriptedPrompter::new(&[]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("api-key".into()),
            use_api_key: true,
            tenant_id: Some("org1".into()),
            ..AuthOptions::new("c1", "admin")
        };
        let ctx = api.authenticate(&opts).unwrap();
        assert_eq!(ctx.header("apiKey"), Some("api-key"));
        let requests = transport.requests();
        assert_eq!(requests[0].url, "https://c1/irisservices/api/v1/public/cluster");
        assert_eq!(
            requests[0].headers.get("x-impersonate-tenant-id").map(String::as_str),
            Some("org1/")
        );
    }

    #[test]
    fn api_key_failure_refreshes_once() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .reply_json(401, json!({"errorCode": "kUnauthorized", "message": "bad key"}))
            .reply_json(200, json!({"id": 1}));
        let prompter = ScriptedPrompter::new(&["good-key"]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("bad-key".into()),
            use_api_key: true,
            ..AuthOptions::new("c1", "admin")
        };
        let ctx = api.authenticate(&opts).unwrap();
        assert_eq!(ctx.header("apiKey"), Some("good-key"));
        assert_eq!(prompter.count(), 1);
    }

    #[test]
    fn missing_credential_aborts_without_request() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new();
        let prompter = ScriptedPrompter::new(&[]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            prompt: PromptMode::Never,
            ..AuthOptions::new("c1", "bob")
        };
        assert_eq!(api.authenticate(&opts), Err(AuthFailure::NoCredential));
        assert!(transport.requests().is_empty());
        assert!(!api.connected());
    }

    #[test]
    fn transport_failure_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new().fail("dns error");
        let prompter = ScriptedPrompter::new(&[]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("x".into()),
            ..AuthOptions::new("c1", "bob")
        };
        assert_eq!(
            api.authenticate(&opts),
            Err(AuthFailure::Transport("dns error".into()))
        );
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn email_mfa_dispatches_code_first() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .reply(200, "")
            .reply_json(201, json!({"accessToken": "t", "tokenType": "Bearer"}));
        let prompter = ScriptedPrompter::new(&["123456"]);
        let mut api = client(&transport, &prompter, &dir);

        let opts = AuthOptions {
            password: Some("x".into()),
            email_mfa: true,
            ..AuthOptions::new("c1", "bob")
        };
        api.authenticate(&opts).unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].url, "https://c1/v2/email-otp");
        assert!(requests[0].body.as_ref().unwrap().get("otpType").is_none());
        let creds = requests[1].body.as_ref().unwrap();
        assert_eq!(creds["otpType"], "Email");
        assert_eq!(creds["otpCode"], "123456");
    }

    #[test]
    fn domain_prefixed_username_is_split() {
        let opts = AuthOptions::new("c1", "CORP\\bob");
        assert_eq!(opts.account(), ("CORP".to_string(), "bob".to_string()));
        let opts = AuthOptions::new("c1", "corp.net/alice");
        assert_eq!(opts.account(), ("corp.net".to_string(), "alice".to_string()));
        let opts = AuthOptions::new("c1", "admin");
        assert_eq!(opts.account(), ("local".to_string(), "admin".to_string()));
    }
}
