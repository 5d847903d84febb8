// src/main.rs

use devwatch::errors::DevwatchError;
use devwatch::project::INVALID_DIRECTORY_HINT;
use devwatch::supervisor::exit_code;
use devwatch::{cli, logging, run};

#[tokio::main]
async fn main() {
    let code = match run_main().await {
        Ok(code) => code,
        Err(err) => {
            if matches!(err.downcast_ref::<DevwatchError>(), Some(DevwatchError::ProjectRoot(_))) {
                eprintln!("{INVALID_DIRECTORY_HINT}");
            }
            eprintln!("devwatch error: {err:?}");
            exit_code::CONFIG
        }
    };
    std::process::exit(code);
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level, args.color_enabled())?;
    run(args).await
}
