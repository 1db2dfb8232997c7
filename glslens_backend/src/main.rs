mod cli;

use std::io;
use std::process::ExitCode;
use clap::Parser;
use glslens::log::StderrLogger;
use glslens::Glslens;
use glslens_backend::{oneshot, server};
use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the protocol; logs go to stderr only
    Glslens::set_logger(StderrLogger);
    Glslens::set_log_level(cli.log_level.into());

    let result = if cli.oneshot {
        oneshot::run(&mut io::stdin().lock(), &mut io::stdout().lock()).map(|_| ())
    } else {
        server::serve(&mut io::stdin().lock(), &mut io::stdout().lock(), cli.max_frame_size).map(|_| ())
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.diagnostic() {
                Some(diagnostic) => eprintln!("Error: {}", diagnostic),
                None => eprintln!("Error: {}", err),
            }
            ExitCode::FAILURE
        }
    }
}
