//! Command-line surface. Each invocation is one event: it rehydrates the session, performs one
//! login/logout or one navigation, and exits.

use clap::{Args as ClapArgs, Subcommand};

use crate::client::models::{CatalogEntryCreate, CatalogEntryUpdate, CatalogKind};
use crate::router::ViewInput;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show whether you are signed in, and with which role
    Status,
    /// Sign in and open the landing page
    Login(Credentials),
    /// Create an account, then open the sign-in page
    Register(Credentials),
    /// Sign out and forget the stored session
    Logout,
    /// Open a page, e.g. `/history` or `/admin`
    Open {
        path: String,
    },
    /// Submit a prescription for disease prediction
    Predict {
        /// Prescription text, e.g. "黄芪 白术 防风"
        #[arg(required = true, num_args = 1..)]
        prescription: Vec<String>,
    },
    /// Show your diagnosis history
    History,
    /// Manage the herb and disease catalogs (admin only)
    Admin {
        #[command(subcommand)]
        catalog: CatalogCommand,
    },
}

#[derive(ClapArgs, Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    #[arg(long, env = "TCMCTL_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CatalogCommand {
    Herbs {
        #[command(subcommand)]
        action: CatalogAction,
    },
    Diseases {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CatalogAction {
    /// List every entry
    List,
    /// Add an entry
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change the name and/or description of an entry
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
}

impl CatalogCommand {
    /// The admin-view input this command translates to.
    pub fn into_input(self) -> ViewInput {
        let (kind, action) = match self {
            CatalogCommand::Herbs { action } => (CatalogKind::Herb, action),
            CatalogCommand::Diseases { action } => (CatalogKind::Disease, action),
        };
        match action {
            CatalogAction::List => ViewInput::Show,
            CatalogAction::Add { name, description } => ViewInput::CreateEntry {
                kind,
                entry: CatalogEntryCreate { name, description },
            },
            CatalogAction::Update { id, name, description } => ViewInput::UpdateEntry {
                kind,
                id,
                update: CatalogEntryUpdate { name, description },
            },
        }
    }
}
