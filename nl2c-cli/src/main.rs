use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use console::Style;
use fern::Dispatch;
use log::{Level, LevelFilter, debug, info};
use nl2c_core::{ArtifactNames, CompileOptions, compile};

/// Compiles a netlist into a C function simulating one clock step.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Netlist source file
    netlist: PathBuf,

    /// Base path of the generated files: writes `<OUTPUT_BASENAME>.h` and `<OUTPUT_BASENAME>.c`
    output_basename: PathBuf,

    #[arg(
        long,
        value_name = "NAME",
        default_value = "netlist",
        help = "Fragment used in generated type and helper names"
    )]
    short_name: String,

    #[arg(
        long,
        value_name = "NAME",
        default_value = "simulate_netlist",
        help = "Name of the generated step function"
    )]
    function_name: String,

    #[arg(long, help = "Do not emit the print, prompt and ROM loading helpers")]
    no_helpers: bool,

    #[arg(
        long,
        conflicts_with = "no_helpers",
        help = "Also write `<OUTPUT_BASENAME>_main.c`, an interactive simulation loop"
    )]
    driver: bool,

    #[arg(short, long, help = "Show debug messages")]
    verbose: bool,

    #[arg(short, long, conflicts_with = "verbose", help = "Only show warnings and errors")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;
    execute(cli)
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    Dispatch::new()
        .format(|out, message, record| {
            let style = match record.level() {
                Level::Error => Style::new().red().bright(),
                Level::Warn => Style::new().yellow().bright(),
                Level::Info => Style::new().green().bright(),
                Level::Debug => Style::new().cyan().bright(),
                Level::Trace => Style::new().magenta().bright(),
            };
            out.finish(format_args!(
                "{} {message}",
                style.apply_to(format!("[{:<5}]", record.level()))
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .context("failed to initialise logging")
}

fn execute(cli: Cli) -> Result<()> {
    check_identifier("--short-name", &cli.short_name)?;
    check_identifier("--function-name", &cli.function_name)?;

    let file_name = cli
        .output_basename
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} does not name a file", cli.output_basename.display()))?;

    let source = fs::read_to_string(&cli.netlist)
        .with_context(|| format!("failed to read netlist {}", cli.netlist.display()))?;
    info!("compiling {}", cli.netlist.display());

    let options = CompileOptions {
        helper_functions: !cli.no_helpers,
        driver: cli.driver,
    };
    let artifact = compile(&source, &options)
        .with_context(|| format!("failed to compile {}", cli.netlist.display()))?;

    let names = ArtifactNames::new(&cli.short_name, file_name, &cli.function_name);
    debug!("include guard is {}", names.guard());
    let artifact = artifact.substitute(&names);

    write_output(&with_suffix(&cli.output_basename, ".h"), &artifact.header)?;
    write_output(&with_suffix(&cli.output_basename, ".c"), &artifact.source)?;
    if let Some(driver) = &artifact.driver {
        write_output(&with_suffix(&cli.output_basename, "_main.c"), driver)?;
    }
    Ok(())
}

fn check_identifier(flag: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("{flag} must be a C identifier, got `{name}`");
    }
    Ok(())
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}
