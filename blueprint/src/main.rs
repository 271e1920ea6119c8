//! Inspect and manage product installations in a storage directory.
//!
//! Storage is a local directory standing in for the remote filesystem,
//! configured in `blueprint.toml` (see [`blueprint::io::config`]).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;

use blueprint::io::config::{CliConfig, load_config, write_config};
use blueprint::io::product::ProductInfo;
use blueprint::io::release;
use blueprint::{Error, Installation, LocalStorage, Storage, exit_codes, logging};

#[derive(Parser)]
#[command(
    name = "blueprint",
    version,
    about = "Typed configuration storage for installed products"
)]
struct Cli {
    /// Path to the CLI configuration file.
    #[arg(long, global = true, default_value = "blueprint.toml")]
    config: PathBuf,

    /// Override the configured product name.
    #[arg(long, global = true)]
    product: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a `blueprint.toml` at the `--config` path.
    Init {
        /// Local directory standing in for remote storage.
        #[arg(long)]
        root: Option<PathBuf>,
        /// Identity used for per-user installations.
        #[arg(long)]
        identity: Option<String>,
        /// Replace an existing config file.
        #[arg(long)]
        force: bool,
    },
    /// Create the install folder (per-user unless `--global`).
    Install {
        #[arg(long)]
        global: bool,
    },
    /// Print the install folder of the current installation.
    Whereis {
        /// Fall back to the caller's per-user installation.
        #[arg(long)]
        user: bool,
    },
    /// Delete the current installation and everything in it.
    Uninstall {
        /// Fall back to the caller's per-user installation.
        #[arg(long)]
        user: bool,
    },
    /// List every installation of the product.
    Existing,
    /// List files of the current installation.
    Files,
    /// Print a stored file as JSON.
    Show { file: String },
    /// Upload a local file into the current installation.
    Upload { name: String, local: PathBuf },
    /// Upload a release artifact and record it in `version.json`.
    Publish {
        /// Semantic version being published.
        #[arg(long = "release")]
        release: String,
        artifact: PathBuf,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        let not_found = err
            .downcast_ref::<Error>()
            .is_some_and(Error::is_not_found);
        std::process::exit(if not_found {
            exit_codes::NOT_FOUND
        } else {
            exit_codes::INVALID
        });
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let open = || -> Result<(Arc<dyn Storage>, String)> {
        let cfg = load_config(&cli.config)?;
        let product = cli.product.clone().unwrap_or_else(|| cfg.product.clone());
        Ok((open_storage(&cli.config, &cfg), product))
    };
    match cli.command {
        Command::Init {
            root,
            identity,
            force,
        } => cmd_init(&cli.config, cli.product.clone(), root, identity, force),
        Command::Install { global } => {
            open().and_then(|(storage, product)| cmd_install(storage, &product, global))
        }
        Command::Uninstall { user } => {
            open().and_then(|(storage, product)| cmd_uninstall(storage, &product, user))
        }
        Command::Whereis { user } => {
            open().and_then(|(storage, product)| cmd_whereis(storage, &product, user))
        }
        Command::Existing => open().and_then(|(storage, product)| cmd_existing(storage, &product)),
        Command::Files => open().and_then(|(storage, product)| cmd_files(storage, &product)),
        Command::Show { file } => {
            open().and_then(|(storage, product)| cmd_show(storage, &product, &file))
        }
        Command::Upload { name, local } => open()
            .and_then(|(storage, product)| cmd_upload(storage, &product, &name, &local)),
        Command::Publish { release, artifact } => open()
            .and_then(|(storage, product)| cmd_publish(storage, &product, &release, &artifact)),
    }
}

fn open_storage(config_path: &Path, cfg: &CliConfig) -> Arc<dyn Storage> {
    let base = config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Arc::new(LocalStorage::new(cfg.storage_root(base), cfg.identity.clone()))
}

fn cmd_install(storage: Arc<dyn Storage>, product: &str, global: bool) -> Result<()> {
    let installation = if global {
        Installation::assume_global(Arc::clone(&storage), product)?
    } else {
        Installation::assume_user_home(Arc::clone(&storage), product)?
    };
    storage.mkdirs(installation.install_folder())?;
    println!("{}", installation.install_folder());
    Ok(())
}

fn cmd_init(
    path: &Path,
    product: Option<String>,
    root: Option<PathBuf>,
    identity: Option<String>,
    force: bool,
) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (pass --force to replace it)", path.display());
    }
    let defaults = CliConfig::default();
    let cfg = CliConfig {
        root: root.unwrap_or(defaults.root),
        identity: identity.unwrap_or(defaults.identity),
        product: product.unwrap_or(defaults.product),
    };
    write_config(path, &cfg)?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_uninstall(storage: Arc<dyn Storage>, product: &str, user: bool) -> Result<()> {
    let installation = Installation::current(storage, product, user)?;
    installation.remove()?;
    println!("{}", installation.install_folder());
    Ok(())
}

fn cmd_whereis(storage: Arc<dyn Storage>, product: &str, user: bool) -> Result<()> {
    let installation = Installation::current(storage, product, user)?;
    println!("{}", installation.install_folder());
    Ok(())
}

fn cmd_existing(storage: Arc<dyn Storage>, product: &str) -> Result<()> {
    for installation in Installation::existing(storage, product)? {
        let scope = if installation.is_global() { "global" } else { "user" };
        println!("{}\t{scope}", installation.install_folder());
    }
    Ok(())
}

fn cmd_files(storage: Arc<dyn Storage>, product: &str) -> Result<()> {
    let installation = Installation::current(storage, product, true)?;
    for file in installation.files()? {
        println!("{}", file.name);
    }
    Ok(())
}

fn cmd_show(storage: Arc<dyn Storage>, product: &str, file: &str) -> Result<()> {
    let installation = Installation::current(storage, product, true)?;
    let tree: Value = installation.load(Some(file))?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

fn cmd_upload(storage: Arc<dyn Storage>, product: &str, name: &str, local: &Path) -> Result<()> {
    let installation = Installation::current(storage, product, true)?;
    let raw = fs::read(local).with_context(|| format!("read {}", local.display()))?;
    println!("{}", installation.upload(name, &raw)?);
    Ok(())
}

fn cmd_publish(
    storage: Arc<dyn Storage>,
    product: &str,
    version: &str,
    artifact: &Path,
) -> Result<()> {
    let info = ProductInfo::new(product, version)?;
    let installation = Installation::current(storage, product, true)?;
    let name = artifact
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("artifact has no file name: {}", artifact.display()))?;
    let raw = fs::read(artifact).with_context(|| format!("read {}", artifact.display()))?;
    println!("{}", release::publish(&installation, &info, name, &raw)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whereis_user() {
        let cli = Cli::parse_from(["blueprint", "whereis", "--user"]);
        assert!(matches!(cli.command, Command::Whereis { user: true }));
        assert_eq!(cli.config, PathBuf::from("blueprint.toml"));
    }

    #[test]
    fn parse_init_options() {
        let cli = Cli::parse_from(["blueprint", "init", "--identity", "a@example.com", "--force"]);
        let Command::Init {
            root,
            identity,
            force,
        } = cli.command
        else {
            panic!("expected init");
        };
        assert_eq!(root, None);
        assert_eq!(identity.as_deref(), Some("a@example.com"));
        assert!(force);
    }

    #[test]
    fn parse_publish_with_product_override() {
        let cli = Cli::parse_from([
            "blueprint",
            "--product",
            "tool",
            "publish",
            "--release",
            "0.2.0",
            "dist/tool.tar.gz",
        ]);
        assert_eq!(cli.product.as_deref(), Some("tool"));
        let Command::Publish { release, artifact } = cli.command else {
            panic!("expected publish");
        };
        assert_eq!(release, "0.2.0");
        assert_eq!(artifact, PathBuf::from("dist/tool.tar.gz"));
    }
}
