use std::sync::Arc;
use anyhow::{Context, Result};
use tanya::config::ServerConfig;
use tanya::servers::auth::{parse_fault_file, AuthState, FaultMessages};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut conf_file = "conf/server.yaml".to_string();
    let mut fault_file = "conf/faults.yaml".to_string();

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "--h" | "--?" | "/?" => {
                println!("Usage: auth_server [--conf FILE] [--faults FILE]");
                return Ok(());
            }
            "--conf" => {
                if i + 1 < args.len() {
                    i += 1;
                    conf_file = args[i].clone();
                } else {
                    eprintln!("Error: --conf requires a FILE argument");
                    return Ok(());
                }
            }
            "--faults" => {
                if i + 1 < args.len() {
                    i += 1;
                    fault_file = args[i].clone();
                } else {
                    eprintln!("Error: --faults requires a FILE argument");
                    return Ok(());
                }
            }
            _ => {}
        }
        i += 1;
    }

    let config: ServerConfig = {
        let content = std::fs::read_to_string(&conf_file)
            .with_context(|| format!("Cannot read config: {}", conf_file))?;
        ServerConfig::from_str(&content)
            .with_context(|| format!("Cannot parse config: {}", conf_file))?
    };

    // Fault file is optional; built-in messages cover every key.
    let faults = match std::fs::read_to_string(&fault_file) {
        Ok(content) => parse_fault_file(&content)?,
        Err(_) => FaultMessages::default(),
    };

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Cannot create data dir: {}", config.data_dir))?;
    let pool = tanya::database::connect(&config.store_path())
        .await
        .with_context(|| format!("Cannot open store: {}", config.store_path().display()))?;

    tracing::info!("[auth] [started] Auth Server Started");

    let bind = config.bind_addr();
    let state = Arc::new(AuthState::new(pool, config, faults));

    AuthState::run(state, &bind).await?;
    Ok(())
}
