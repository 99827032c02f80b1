use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::auth::AuthOptions;
use crate::credentials::PromptMode;
use crate::session::EndpointKind;

#[derive(Parser, Debug)]
#[command(name = "cohesity")]
#[command(about = "Query and maintain Cohesity clusters from the command line")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (--verbose debug, twice for trace)
    #[arg(long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection and credential flags shared by every command.
#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// Cluster name or address (or the hosted service hostname)
    #[arg(short = 'v', long)]
    pub vip: String,

    /// Username, optionally as DOMAIN\user
    #[arg(short = 'u', long, default_value = "helios")]
    pub username: String,

    /// User domain
    #[arg(short = 'd', long, default_value = "local")]
    pub domain: String,

    /// Authenticate with an API key instead of a password
    #[arg(short = 'i', long)]
    pub use_api_key: bool,

    /// Password or API key (skips the credential store)
    #[arg(long)]
    pub password: Option<String>,

    /// Treat the vip as the hosted multi-cluster service
    #[arg(long)]
    pub helios: bool,

    /// Hosted service: cluster to route calls to
    #[arg(short = 'c', long)]
    pub cluster: Option<String>,

    /// Hosted service: region id
    #[arg(long)]
    pub region_id: Option<String>,

    /// Impersonate this tenant
    #[arg(long)]
    pub tenant_id: Option<String>,

    /// Multi-factor code
    #[arg(long)]
    pub mfa_code: Option<String>,

    /// Have the cluster email a multi-factor code
    #[arg(long)]
    pub email_mfa: bool,

    /// Always prompt for the password, never use stored secrets
    #[arg(long, conflicts_with = "no_prompt")]
    pub prompt: bool,

    /// Never prompt; fail when no secret is stored
    #[arg(long)]
    pub no_prompt: bool,
}

impl AuthArgs {
    pub fn prompt_mode(&self) -> PromptMode {
        if self.prompt {
            PromptMode::Always
        } else if self.no_prompt {
            PromptMode::Never
        } else {
            PromptMode::Fallback
        }
    }

    pub fn options(&self, retry: bool) -> AuthOptions {
        AuthOptions {
            domain: self.domain.clone(),
            password: self.password.clone(),
            prompt: self.prompt_mode(),
            use_api_key: self.use_api_key,
            helios: self.helios,
            tenant_id: self.tenant_id.clone(),
            region_id: self.region_id.clone(),
            retry,
            mfa_code: self.mfa_code.clone(),
            email_mfa: self.email_mfa,
            ..AuthOptions::new(&self.vip, &self.username)
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Units {
    #[value(name = "MiB", alias = "mib")]
    Mib,
    #[default]
    #[value(name = "GiB", alias = "gib")]
    Gib,
}

impl Units {
    pub fn multiplier(self) -> f64 {
        match self {
            Units::Mib => 1024.0 * 1024.0,
            Units::Gib => 1024.0 * 1024.0 * 1024.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Units::Mib => "MiB",
            Units::Gib => "GiB",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List views, or show their settings
    ListViews {
        #[command(flatten)]
        auth: AuthArgs,
        /// Only this view
        #[arg(short = 'n', long)]
        name: Option<String>,
        /// Show detailed settings
        #[arg(short = 's', long)]
        show_settings: bool,
        #[arg(short = 'x', long, value_enum, default_value = "GiB")]
        units: Units,
    },

    /// List (and optionally expire) local snapshots older than N days
    ExpireSnapshots {
        #[command(flatten)]
        auth: AuthArgs,
        /// Protection job name (repeatable)
        #[arg(short = 'j', long = "job-name")]
        job_names: Vec<String>,
        /// File with one job name per line
        #[arg(short = 'l', long)]
        job_list: Option<PathBuf>,
        /// Keep snapshots newer than this many days
        #[arg(short = 'k', long)]
        days_to_keep: i64,
        /// Expire the snapshots instead of listing them
        #[arg(short = 'e', long)]
        expire: bool,
        /// Skip runs that were not replicated
        #[arg(short = 'r', long)]
        confirm_replication: bool,
        /// Skip runs that were not archived
        #[arg(short = 'a', long)]
        confirm_archive: bool,
        /// Runs fetched per page
        #[arg(short = 'n', long, default_value_t = 1000)]
        num_runs: u32,
    },

    /// List files in the backups of one or more servers
    BackedUpFiles {
        #[command(flatten)]
        auth: AuthArgs,
        /// Source server name (repeatable)
        #[arg(short = 's', long = "source-server", required = true)]
        source_servers: Vec<String>,
        /// Protection job that backs up the servers
        #[arg(short = 'j', long)]
        job_name: String,
        /// List available versions
        #[arg(short = 'l', long)]
        show_versions: bool,
        /// List files of every selected version
        #[arg(short = 'k', long)]
        list_files: bool,
        /// Only versions at or after this date
        #[arg(short = 't', long)]
        start: Option<String>,
        /// Only versions at or before this date
        #[arg(short = 'e', long)]
        end: Option<String>,
        /// Use this job run
        #[arg(short = 'r', long)]
        run_id: Option<i64>,
        /// Use the first version at or after this date
        #[arg(short = 'f', long)]
        file_date: Option<String>,
        /// Directory to start listing from
        #[arg(short = 'p', long, default_value = "/")]
        start_path: String,
        /// Do not use the index service
        #[arg(short = 'n', long)]
        no_index: bool,
        /// Include size and modification time
        #[arg(long)]
        show_stats: bool,
    },

    /// Save a password or API key for later runs
    StorePassword {
        #[command(flatten)]
        auth: AuthArgs,
        /// Write a per-identity file instead of the shared store
        #[arg(long)]
        file: bool,
    },

    /// Issue a raw API call and print the response
    Api {
        #[command(flatten)]
        auth: AuthArgs,
        /// get, post, put or delete
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
        #[arg(long, value_enum, default_value = "v1")]
        endpoint: Endpoint,
        /// Print leaf properties whose path contains this text
        #[arg(long)]
        props: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Endpoint {
    V1,
    V2,
    Mcm,
    McmV2,
    Reporting,
}

impl From<Endpoint> for EndpointKind {
    fn from(e: Endpoint) -> Self {
        match e {
            Endpoint::V1 => EndpointKind::V1,
            Endpoint::V2 => EndpointKind::V2,
            Endpoint::Mcm => EndpointKind::Mcm,
            Endpoint::McmV2 => EndpointKind::McmV2,
            Endpoint::Reporting => EndpointKind::ReportingV2,
        }
    }
}
