use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "ums-console", about = "Multi-tenant user-management console")]
pub struct Cli {
    /// Keep the session in memory instead of the session file.
    #[arg(long, global = true)]
    pub in_memory: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sign in and persist the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "UMS_PASSWORD", hide_env_values = true)]
        password: String,
        /// Tenant name or id; defaults to the backend's home tenant.
        #[arg(long)]
        tenant: Option<String>,
    },
    /// Print the current session.
    Status,
    /// Refresh the access token if it is close to expiry.
    Refresh,
    Logout,
    /// List all tenants.
    Tenants,
    /// List records of the signed-in tenant.
    List {
        #[arg(value_enum)]
        kind: RecordKind,
    },
    /// Keep the session alive with the background timers.
    Run {
        #[arg(long, default_value_t = 600)]
        secs: u64,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Organizations,
    Users,
    Roles,
    Privileges,
    LegalEntities,
}
