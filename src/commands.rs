// Command dispatch: one function per subcommand, each a short sequential
// pipeline over the library modules.

use crate::api::ApiClient;
use crate::cache::Cache;
use crate::cli::{Cli, Commands, CreateArgs, NewArgs, PathArgs, ServerArgs, UpdateArgs};
use crate::connection::prepare_api_auth;
use crate::deploy::{CreateOptions, Deployer, UpdateOptions};
use crate::error::ZatError;
use crate::manifest;
use crate::package;
use crate::server::{self, ServerState};
use crate::template;
use crate::ui::{self, TerminalPrompter, Tone};
use crate::update::{UpdateChecker, UpdateStatus, TOOLS_VERSION};
use anyhow::{Context, Result};
use std::net::ToSocketAddrs;
use std::path::Path;

/// Options shared by every subcommand.
struct Global {
    skip_update_check: bool,
    registry_url: String,
}

pub fn run(cli: Cli) -> Result<()> {
    let global = Global {
        skip_update_check: cli.skip_update_check,
        registry_url: cli.registry_url,
    };
    match cli.command {
        Commands::New(args) => new_app(&args),
        Commands::Validate(args) => {
            check_for_update(&args.path, &global);
            validate(&args.path)
        }
        Commands::Package(args) => {
            check_for_update(&args.path, &global);
            package_app(&args)
        }
        Commands::Clean(args) => clean(&args),
        Commands::Server(args) => {
            check_for_update(&args.path.path, &global);
            serve(&args)
        }
        Commands::Create(args) => create(&args, &global),
        Commands::Update(args) => update(&args, &global),
        Commands::Version => {
            println!("{}", TOOLS_VERSION);
            Ok(())
        }
    }
}

/// Look for a newer release. Failures are logged and never stop the command.
fn check_for_update(app_dir: &Path, global: &Global) {
    if global.skip_update_check || !app_dir.is_dir() {
        return;
    }
    let cache = Cache::open(app_dir);
    let today = chrono::Local::now().date_naive();
    match UpdateChecker::new(&global.registry_url).and_then(|checker| checker.check(&cache, today)) {
        Ok(UpdateStatus::Outdated { latest }) => log::debug!("newer release available: {}", latest),
        Ok(status) => log::debug!("update check: {:?}", status),
        Err(e) => log::warn!("update check failed: {:#}", e),
    }
}

fn validate_dir(app_dir: &Path) -> Result<()> {
    let problems = manifest::validate(app_dir);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ZatError::Invalid(problems).into())
    }
}

fn new_app(args: &NewArgs) -> Result<()> {
    let prompter = TerminalPrompter::new(false);
    let app = template::ask(&prompter)?;
    let root = if args.scaffold {
        template::write_scaffold(&app, &args.path.path, &args.scaffold_url)?
    } else {
        template::write(&app, &args.path.path)?
    };
    ui::say_status("create", &root.display().to_string(), Tone::Success);
    Ok(())
}

fn validate(app_dir: &Path) -> Result<()> {
    validate_dir(app_dir)?;
    ui::say_status("validate", "OK", Tone::Success);
    Ok(())
}

fn package_app(args: &PathArgs) -> Result<()> {
    validate_dir(&args.path)?;
    let zip = package::package(&args.path)?;
    ui::say_status("package", &format!("created at {}", zip.display()), Tone::Success);
    Ok(())
}

fn clean(args: &PathArgs) -> Result<()> {
    let removed = package::clean(&args.path)?;
    ui::say_status("clean", &format!("removed {} package(s)", removed), Tone::Success);
    Ok(())
}

fn serve(args: &ServerArgs) -> Result<()> {
    let app_dir = &args.path.path;
    // The manifest is read per request; fail early if it is missing.
    manifest::Manifest::load(app_dir)?;
    let addr = (args.bind.as_str(), args.port)
        .to_socket_addrs()
        .with_context(|| format!("Invalid bind address {}", args.bind))?
        .next()
        .with_context(|| format!("{} did not resolve to an address", args.bind))?;

    ui::say_status("server", &format!("listening on http://{}", addr), Tone::Info);
    let state = ServerState::new(app_dir, &args.config);
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(server::serve(addr, state))
}

fn create(args: &CreateArgs, global: &Global) -> Result<()> {
    let app_dir = &args.path.path;
    let cache = Cache::open(app_dir);
    if args.clean {
        cache.clear()?;
    }
    check_for_update(app_dir, global);

    let prompter = TerminalPrompter::new(args.auth.unattended);
    let connection = prepare_api_auth(&args.auth.to_input(), &cache, &prompter)?;
    let api = ApiClient::new(&connection)?;
    let options = CreateOptions {
        zipfile: args.zipfile.clone(),
        config: args.config.clone(),
        install: args.install,
    };
    let app_id = Deployer::new(&api, &cache, &prompter, app_dir).create(&options)?;
    log::info!("created app {} on {}", app_id, api.base_url());
    Ok(())
}

fn update(args: &UpdateArgs, global: &Global) -> Result<()> {
    let app_dir = &args.path.path;
    let cache = Cache::open(app_dir);
    if args.clean {
        cache.clear()?;
    }
    check_for_update(app_dir, global);

    let prompter = TerminalPrompter::new(args.auth.unattended);
    let connection = prepare_api_auth(&args.auth.to_input(), &cache, &prompter)?;
    let api = ApiClient::new(&connection)?;
    let options = UpdateOptions {
        zipfile: args.zipfile.clone(),
        app_id: args.app_id.clone(),
    };
    let app_id = Deployer::new(&api, &cache, &prompter, app_dir).update(&options)?;
    log::info!("updated app {} on {}", app_id, api.base_url());
    Ok(())
}
