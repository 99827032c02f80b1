//! `store-password`: save a secret for later unattended runs.

use std::io::Write;

use anyhow::{anyhow, Result};

use crate::api::ApiClient;
use crate::cli::AuthArgs;
use crate::credentials::Identity;
use crate::transport::Transport;
use crate::ui::Prompter;

/// Write the secret to the shared store, or with `per_identity` to the
/// identity's own file. Prompts when `--password` is absent.
pub fn run<T: Transport, P: Prompter>(
    api: &ApiClient<T, P>,
    auth: &AuthArgs,
    per_identity: bool,
    out: &mut impl Write,
) -> Result<i32> {
    let opts = auth.options(false);
    let (domain, username) = opts.account();
    let identity = Identity::new(&opts.vip, &domain, &username, opts.use_api_key, opts.hosted());
    let resolver = api.resolver();

    if per_identity {
        match opts.password.as_deref() {
            Some(password) => resolver.store_password_from_input(&identity, password)?,
            None => {
                resolver
                    .store_password(&identity, None)
                    .ok_or_else(|| anyhow!("no password entered"))?;
            }
        }
    } else {
        resolver.set_password(&identity, opts.password.as_deref())?;
    }
    writeln!(out, "password stored for {}/{} at {}", identity.domain, identity.username, identity.scope)?;
    Ok(0)
}
