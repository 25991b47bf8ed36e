// Command line surface.

use crate::connection::AuthInput;
use crate::server::{DEFAULT_BIND, DEFAULT_PORT};
use crate::settings::DEFAULT_CONFIG_FILE;
use crate::template::DEFAULT_SCAFFOLD_URL;
use crate::update::{DEFAULT_REGISTRY_URL, TOOLS_VERSION};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zat", version = TOOLS_VERSION)]
#[command(about = "Tools to build, package and deploy helpdesk apps", long_about = None)]
pub struct Cli {
    /// Print debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,
    /// Do not look for a newer release of the tools
    #[arg(
        long,
        global = true,
        env = "ZAT_SKIP_UPDATE_CHECK",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub skip_update_check: bool,
    /// Registry endpoint used for the version check
    #[arg(long, global = true, env = "ZAT_REGISTRY_URL", default_value = DEFAULT_REGISTRY_URL, hide = true)]
    pub registry_url: String,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new app
    New(NewArgs),
    /// Validate the app in --path
    Validate(PathArgs),
    /// Package the app into tmp/ for upload
    Package(PathArgs),
    /// Remove app packages from tmp/
    Clean(PathArgs),
    /// Serve the app locally for development
    Server(ServerArgs),
    /// Upload the app and create it on your account
    Create(CreateArgs),
    /// Upload the app and update it on your account
    Update(UpdateArgs),
    /// Print the version of the tools
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// App directory
    #[arg(long, default_value = "./")]
    pub path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    #[command(flatten)]
    pub path: PathArgs,
    /// Start from the scaffold project instead of the bundled template
    #[arg(long)]
    pub scaffold: bool,
    /// Archive downloaded by --scaffold
    #[arg(long, env = "ZAT_SCAFFOLD_URL", default_value = DEFAULT_SCAFFOLD_URL, hide = true)]
    pub scaffold_url: String,
}

#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// Account subdomain or full URL including the protocol
    #[arg(long, env = "ZAT_SUBDOMAIN")]
    pub subdomain: Option<String>,
    /// Account email (append /token to authenticate with an API token)
    #[arg(long, env = "ZAT_USERNAME")]
    pub username: Option<String>,
    /// Password or API token
    #[arg(long, env = "ZAT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Never prompt; fail when a value is missing
    #[arg(long)]
    pub unattended: bool,
}

impl AuthArgs {
    pub fn to_input(&self) -> AuthInput {
        AuthInput {
            subdomain: self.subdomain.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    #[command(flatten)]
    pub path: PathArgs,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_BIND)]
    pub bind: String,
    /// Settings file for the local installation
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[command(flatten)]
    pub path: PathArgs,
    #[command(flatten)]
    pub auth: AuthArgs,
    /// Upload this package instead of packaging --path
    #[arg(long)]
    pub zipfile: Option<PathBuf>,
    /// Settings file used with --install
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    /// Install the app once it is created
    #[arg(long)]
    pub install: bool,
    /// Forget cached values before running
    #[arg(long)]
    pub clean: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub path: PathArgs,
    #[command(flatten)]
    pub auth: AuthArgs,
    /// Upload this package instead of packaging --path
    #[arg(long)]
    pub zipfile: Option<PathBuf>,
    /// Id of the app to update (defaults to the cached id)
    #[arg(long)]
    pub app_id: Option<String>,
    /// Forget cached values before running
    #[arg(long)]
    pub clean: bool,
}
