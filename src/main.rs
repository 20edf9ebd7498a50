use std::env;
use std::process::ExitCode;

use ninecc::{CompileError, CompileResult, generate_assembly};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn run() -> CompileResult<String> {
  let args: Vec<String> = env::args().collect();
  let [_, source] = args.as_slice() else {
    let program = args.first().map(String::as_str).unwrap_or("ninecc");
    return Err(CompileError::Usage {
      program: program.to_string(),
    });
  };
  generate_assembly(source)
}

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();

  match run() {
    Ok(asm) => {
      print!("{asm}");
      ExitCode::SUCCESS
    }
    Err(err) => {
      debug!(code = err.exit_code(), "compilation failed");
      eprintln!("{err}");
      ExitCode::from(err.exit_code())
    }
  }
}
