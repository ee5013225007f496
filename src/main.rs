use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use usb_gadgets::gadget::manager::bound_udc;
use usb_gadgets::gadget::{list_udcs, CONFIGFS_PATH, UDC_CLASS_PATH};
use usb_gadgets::{Gadget, GadgetOptions};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// usb-gadgets command line arguments
#[derive(Parser, Debug)]
#[command(name = "usb-gadgets")]
#[command(version, about = "Compose and bind USB gadgets through configfs", long_about = None)]
struct CliArgs {
    /// ConfigFS gadget root (default: $USB_GADGET_ROOT or /sys/kernel/config/usb_gadget)
    #[arg(short = 'r', long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a gadget from a JSON description and bind it
    Up {
        /// Gadget description file
        options: PathBuf,
        /// UDC to bind (overrides the description)
        #[arg(long)]
        udc: Option<String>,
        /// Build the gadget but leave it unbound
        #[arg(long)]
        no_bind: bool,
    },
    /// Unbind and remove a gadget
    Down {
        /// Gadget name
        name: String,
    },
    /// Show which UDC a gadget is bound to
    Status {
        /// Gadget name
        name: String,
    },
    /// List available USB Device Controllers
    Udcs,
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    let root = args.root.unwrap_or_else(get_root);
    tracing::debug!("Gadget root: {}", root.display());

    match args.command {
        Command::Up {
            options,
            udc,
            no_bind,
        } => up(&root, &options, udc, no_bind),
        Command::Down { name } => {
            Gadget::remove_stale(&root, &name)?;
            println!("{} removed", name);
            Ok(())
        }
        Command::Status { name } => {
            let path = root.join(&name);
            if !path.exists() {
                anyhow::bail!("Gadget {} does not exist under {}", name, root.display());
            }
            match bound_udc(&path.join("UDC")) {
                Some(udc) => println!("{} bound to {}", name, udc),
                None => println!("{} not bound", name),
            }
            Ok(())
        }
        Command::Udcs => {
            for udc in list_udcs(Path::new(UDC_CLASS_PATH))? {
                println!("{}", udc);
            }
            Ok(())
        }
    }
}

fn up(root: &Path, options: &Path, udc: Option<String>, no_bind: bool) -> anyhow::Result<()> {
    let options = GadgetOptions::from_file(options)
        .with_context(|| format!("Failed to load {}", options.display()))?;

    if root.join(&options.name).exists() {
        tracing::warn!("Gadget {} already exists, will reconfigure", options.name);
        Gadget::remove_stale(root, &options.name)?;
    }

    let mut gadget = match Gadget::build(root, &options) {
        Ok(gadget) => gadget,
        Err(e) => {
            if let Err(cleanup) = Gadget::remove_stale(root, &options.name) {
                tracing::warn!("Cleanup after failed build also failed: {}", cleanup);
            }
            return Err(e).context(format!("Failed to build gadget {}", options.name));
        }
    };

    if no_bind {
        println!("{} built at {}", gadget.name(), gadget.path().display());
        return Ok(());
    }

    let udc = match udc.or(options.controller) {
        Some(udc) => udc,
        None => list_udcs(Path::new(UDC_CLASS_PATH))?
            .into_iter()
            .next()
            .context("No USB Device Controller (UDC) found")?,
    };

    gadget.enable(&udc)?;
    println!("{} bound to {}", gadget.name(), udc);
    Ok(())
}

/// Get the configfs gadget root
fn get_root() -> PathBuf {
    if let Ok(path) = std::env::var("USB_GADGET_ROOT") {
        return PathBuf::from(path);
    }
    PathBuf::from(CONFIGFS_PATH)
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "usb_gadgets=error",
        LogLevel::Warn => "usb_gadgets=warn",
        LogLevel::Info => "usb_gadgets=info",
        LogLevel::Debug => "usb_gadgets=debug",
        LogLevel::Trace => "usb_gadgets=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
