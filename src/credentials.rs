//! Credential resolution and on-disk secret storage.
//!
//! Secrets come from, in order: an explicit password, an interactive prompt
//! (when forced), the shared credential store, a per-identity secret file,
//! and finally a prompt whose answer is cached in a per-identity file.
//!
//! # Storage format
//!
//! The shared store holds one record per line:
//!
//! ```text
//! scope:domain:username:True|False:base64(secret)
//! ```
//!
//! Per-identity files live in the config directory, are named
//! `scope-domain-username-True|False` and contain only the base64 secret.
//!
//! # Not a security boundary
//!
//! Base64 is an obfuscation, not encryption. Anyone who can read these files
//! can recover the secrets. The format is kept as-is for compatibility with
//! existing stores; protect the files with filesystem permissions.

use std::fs;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::{Paths, HELIOS_HOST};
use crate::error::{Error, Result};
use crate::logging::DebugLog;
use crate::ui::Prompter;

/// Scope shared by every endpoint for a directory (non-local) account.
pub const WILDCARD_SCOPE: &str = "--";

const PASSWORD_PROMPT: &str = "Enter your password";
const REENTER_PROMPT: &str = "Re-enter your password";

pub fn obfuscate(secret: &str) -> String {
    STANDARD.encode(secret.as_bytes())
}

pub fn reveal(encoded: &str) -> Result<String> {
    let bytes = STANDARD.decode(encoded.trim().as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}

/// When to ask the operator for a secret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptMode {
    /// Always prompt and never touch storage.
    Always,
    /// Prompt only when nothing is stored, then cache the answer.
    #[default]
    Fallback,
    /// Never prompt.
    Never,
}

/// Key under which a secret is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub scope: String,
    pub domain: String,
    pub username: String,
    pub use_api_key: bool,
}

impl Identity {
    /// Build the storage key for an endpoint. Directory accounts on a
    /// cluster share one secret across every cluster, so their scope
    /// collapses to [`WILDCARD_SCOPE`].
    pub fn new(vip: &str, domain: &str, username: &str, use_api_key: bool, helios: bool) -> Self {
        let shared = !domain.eq_ignore_ascii_case("local")
            && !helios
            && !vip.eq_ignore_ascii_case(HELIOS_HOST)
            && !use_api_key;
        Identity {
            scope: if shared { WILDCARD_SCOPE.to_string() } else { vip.to_string() },
            domain: domain.to_string(),
            username: username.to_string(),
            use_api_key,
        }
    }

    fn key_flag(&self) -> &'static str {
        if self.use_api_key {
            "True"
        } else {
            "False"
        }
    }

    fn matches(&self, record: &CredentialRecord) -> bool {
        record.scope.eq_ignore_ascii_case(&self.scope)
            && record.domain.eq_ignore_ascii_case(&self.domain)
            && record.username.eq_ignore_ascii_case(&self.username)
            && record.use_api_key == self.use_api_key
    }

    /// Name of the per-identity secret file. Path separators (a vip given
    /// as a URL, a `DOMAIN\user` name) become `-`.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.scope,
            self.domain,
            self.username,
            self.key_flag()
        )
        .replace(['/', '\\'], "-")
    }
}

/// One line of the shared store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub scope: String,
    pub domain: String,
    pub username: String,
    pub use_api_key: bool,
    pub obfuscated: String,
}

impl CredentialRecord {
    pub fn new(identity: &Identity, secret: &str) -> Self {
        CredentialRecord {
            scope: identity.scope.clone(),
            domain: identity.domain.clone(),
            username: identity.username.clone(),
            use_api_key: identity.use_api_key,
            obfuscated: obfuscate(secret),
        }
    }

    /// Parse a store line. Fields are taken from the right, so a scope may
    /// itself contain `:` (`host:port`). A line without a `True`/`False` key
    /// flag in fourth position from the right is rejected.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim().rsplitn(4, ':');
        let obfuscated = fields.next()?;
        let flag = fields.next()?;
        let username = fields.next()?;
        let (scope, domain) = fields.next()?.rsplit_once(':')?;
        let use_api_key = match flag {
            "True" => true,
            "False" => false,
            _ => return None,
        };
        Some(CredentialRecord {
            scope: scope.to_string(),
            domain: domain.to_string(),
            username: username.to_string(),
            use_api_key,
            obfuscated: obfuscated.to_string(),
        })
    }

    pub fn to_line(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.scope,
            self.domain,
            self.username,
            if self.use_api_key { "True" } else { "False" },
            self.obfuscated
        )
    }

    pub fn secret(&self) -> Result<String> {
        reveal(&self.obfuscated)
    }
}

/// Shared store file plus the per-identity secret directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    store_file: PathBuf,
    config_dir: PathBuf,
}

impl CredentialStore {
    pub fn new(paths: &Paths) -> Self {
        CredentialStore {
            store_file: paths.store_file.clone(),
            config_dir: paths.config_dir.clone(),
        }
    }

    fn lines(&self) -> Vec<String> {
        match fs::read_to_string(&self.store_file) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Secret for `identity` from the shared store. Malformed lines and
    /// undecodable secrets are skipped one by one.
    pub fn lookup(&self, identity: &Identity) -> Option<String> {
        self.lines()
            .iter()
            .filter_map(|line| CredentialRecord::parse(line))
            .filter(|record| identity.matches(record))
            .find_map(|record| record.secret().ok())
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.lines()
            .iter()
            .filter_map(|line| CredentialRecord::parse(line))
            .any(|record| identity.matches(&record))
    }

    /// Replace the record for `identity` in place, or append one. Every
    /// other line is written back untouched.
    pub fn upsert(&self, identity: &Identity, secret: &str) -> Result<()> {
        let replacement = CredentialRecord::new(identity, secret).to_line();
        let mut found = false;
        let mut out = String::new();
        for line in self.lines() {
            let is_match = CredentialRecord::parse(&line)
                .map(|record| identity.matches(&record))
                .unwrap_or(false);
            if is_match && !found {
                out.push_str(&replacement);
                found = true;
            } else if !is_match {
                out.push_str(&line);
            } else {
                continue;
            }
            out.push('\n');
        }
        if !found {
            out.push_str(&replacement);
            out.push('\n');
        }
        fs::write(&self.store_file, out).map_err(|e| Error::store(&self.store_file, e))
    }

    pub fn identity_file(&self, identity: &Identity) -> PathBuf {
        self.config_dir.join(identity.file_name())
    }

    pub fn read_identity_file(&self, identity: &Identity) -> Option<String> {
        let encoded = fs::read_to_string(self.identity_file(identity)).ok()?;
        reveal(&encoded).ok()
    }

    pub fn write_identity_file(&self, identity: &Identity, secret: &str) -> Result<()> {
        let path = self.identity_file(identity);
        fs::write(&path, obfuscate(secret)).map_err(|e| Error::store(path, e))
    }

    pub fn remove_identity_file(&self, identity: &Identity) {
        let path = self.identity_file(identity);
        if path.is_file() {
            if let Err(err) = fs::remove_file(&path) {
                tracing::debug!(path = %path.display(), error = %err, "cannot remove secret file");
            }
        }
    }
}

/// Inputs for one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct CredentialRequest<'a> {
    pub password: Option<&'a str>,
    pub prompt: PromptMode,
    pub force_refresh: bool,
}

pub struct CredentialResolver<'a> {
    store: &'a CredentialStore,
    prompter: &'a dyn Prompter,
    log: &'a DebugLog,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(store: &'a CredentialStore, prompter: &'a dyn Prompter, log: &'a DebugLog) -> Self {
        CredentialResolver {
            store,
            prompter,
            log,
        }
    }

    /// Produce a secret for `identity`, or `None` when every source is
    /// exhausted. `None` is an ordinary outcome, not a failure.
    pub fn resolve(&self, identity: &Identity, request: &CredentialRequest<'_>) -> Option<String> {
        if let Some(password) = request.password {
            return Some(password.to_string());
        }
        if request.prompt == PromptMode::Always {
            return self.prompter.password(PASSWORD_PROMPT);
        }

        if self.store.contains(identity) {
            if request.force_refresh {
                return self.set_password(identity, None).ok();
            }
            if let Some(secret) = self.store.lookup(identity) {
                return Some(secret);
            }
        }

        if request.force_refresh {
            self.store.remove_identity_file(identity);
        } else if let Some(secret) = self.store.read_identity_file(identity) {
            return Some(secret);
        }

        self.log.write("prompting for password...");
        if request.prompt == PromptMode::Never {
            return None;
        }
        let secret = self.prompter.password(PASSWORD_PROMPT)?;
        if let Err(err) = self.store.write_identity_file(identity, &secret) {
            tracing::warn!(error = %err, "error storing password");
        }
        Some(secret)
    }

    /// Write `identity` into the shared store, prompting when no password
    /// is given. Returns the stored secret.
    pub fn set_password(&self, identity: &Identity, password: Option<&str>) -> Result<String> {
        let secret = match password {
            Some(p) => p.to_string(),
            None => {
                let prompt = format!(
                    "Enter password for {}/{} at {}",
                    identity.domain, identity.username, identity.scope
                );
                self.prompter.password(&prompt).ok_or(Error::NoSecret)?
            }
        };
        self.store.upsert(identity, &secret)?;
        Ok(secret)
    }

    /// Prompt for a fresh secret twice until both entries match, caching it
    /// in the per-identity file.
    pub fn store_password(&self, identity: &Identity, password: Option<&str>) -> Option<String> {
        let request = CredentialRequest {
            password,
            prompt: PromptMode::Fallback,
            force_refresh: true,
        };
        loop {
            let first = self.resolve(identity, &request)?;
            let second = self.prompter.password(REENTER_PROMPT)?;
            if first == second {
                return Some(first);
            }
            tracing::warn!("Passwords do not match! Please re-enter...");
        }
    }

    /// Cache a known secret in the per-identity file without prompting.
    pub fn store_password_from_input(&self, identity: &Identity, password: &str) -> Result<()> {
        self.store.write_identity_file(identity, password)
    }
}
