use std::io::{Read, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context as _;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pad::cli::{self, CliArgs};
use pad::config::Config;
use pad::kit::Kit;

fn main() -> ExitCode {
    let args = cli::parse_args();
    init_logging(&args);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("pad: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &CliArgs) {
    let filter = EnvFilter::try_from_env("PAD_LOG").unwrap_or_else(|_| EnvFilter::new(args.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &CliArgs) -> anyhow::Result<ExitCode> {
    let (mut config, errors) = Config::load();
    for e in &errors {
        warn!(file = %config.config_file().display(), "config: {e}");
    }
    if let Some(dir) = &args.stdlib {
        config.std_lib_dir = dir.clone();
    }
    if let Err(e) = config.deploy_env() {
        warn!(dir = %config.app_dir.display(), "can't create application directory: {e}");
    }

    let mut kit = Kit::unbuffered(config);
    let argv = args.program_argv();
    let result = match &args.file {
        Some(path) => {
            if !Path::new(path).is_file() {
                eprintln!("not found \"{}\"", path.display());
                return Ok(ExitCode::FAILURE);
            }
            kit.compile_from_path_args(path, &argv)
        }
        None => {
            let mut src = String::new();
            std::io::stdin().read_to_string(&mut src).context("failed to read program from stdin")?;
            kit.compile_from_str_args(&src, &argv)
        }
    };

    if let Some(code) = kit.exit_code() {
        std::io::stdout().flush().context("failed to flush stdout")?;
        return Ok(ExitCode::from((code & 0xff) as u8));
    }
    if result.is_err() {
        kit.trace_error(&mut std::io::stderr().lock(), args.debug).context("failed to write error trace")?;
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
