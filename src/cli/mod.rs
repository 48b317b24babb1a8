pub mod dre;
pub mod session;

use std::io::IsTerminal;

use clap::{Parser, Subcommand};

use crate::models::Modelo;
use crate::settings::Profile;

#[derive(Parser)]
#[command(name = "painel", about = "Management dashboard for DRE income-statement reports.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Income statement (DRE) by account level, month by month.
    Dre(DreArgs),
    /// Manage the stored session (token and organization).
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

impl Commands {
    /// True when the command takes over the terminal with a ratatui view.
    pub fn is_interactive(&self) -> bool {
        match self {
            Commands::Dre(args) => !args.text && std::io::stdout().is_terminal(),
            Commands::Session { .. } => false,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct DreArgs {
    /// Report year (default: current year)
    #[arg(long)]
    pub year: Option<i32>,
    /// Transaction subset feeding the report
    #[arg(long, value_enum, default_value_t = Modelo::Cmv)]
    pub modelo: Modelo,
    /// Months for Total/Average/Var%: `all`, or a list like `1,2,6-9`
    /// (default: past months of the current year, or all for other years)
    #[arg(long)]
    pub months: Option<String>,
    /// Read the DRE document from a JSON file instead of the API
    #[arg(long)]
    pub input: Option<String>,
    /// Print a plain-text table even on a terminal
    #[arg(long)]
    pub text: bool,
    /// Open every group in text output
    #[arg(long = "expand-all")]
    pub expand_all: bool,
    /// Scaled K/M/B amounts
    #[arg(long)]
    pub compact: bool,
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Show the stored session.
    Show,
    /// Store token and organization context.
    Set {
        /// Bearer token (prompted when omitted)
        #[arg(long)]
        token: Option<String>,
        /// Active organization id
        #[arg(long)]
        org: Option<i64>,
        /// Active organization name
        #[arg(long = "org-name")]
        org_name: Option<String>,
        /// Display name of the logged-in user
        #[arg(long)]
        user: Option<String>,
        /// Profile type
        #[arg(long, value_enum)]
        profile: Option<Profile>,
        /// Organization granted to an assessor, as ID=NAME (repeatable)
        #[arg(long = "assessor-org")]
        assessor_orgs: Vec<String>,
        /// Backend base URL
        #[arg(long = "api-url")]
        api_url: Option<String>,
    },
    /// Switch the active organization.
    UseOrg {
        /// Organization id
        id: i64,
    },
    /// Remove the stored session.
    Clear,
}
