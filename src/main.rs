// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use multistore::config::LoggingConfig;
use multistore::{load_config_with_env, ObjectClient};

/// Multistore - replicated, cached object storage across several backends
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload an object from a file (or stdin) to every main backend
    Put {
        container: String,
        name: String,
        /// Input file; stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Download an object to a file (or stdout)
    Get {
        container: String,
        name: String,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove an object from every main backend
    Rm { container: String, name: String },
    /// Check whether any backend holds an object
    Exists { container: String, name: String },
    /// List configured backends
    Backends,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.to_lowercase().as_str() {
        "json" => tracing::subscriber::set_global_default(builder.json().finish())?,
        _ => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config_with_env(&args.config)?;
    init_tracing(&config.logging)?;

    info!("Loaded configuration from: {:?}", args.config);

    let client = ObjectClient::from_config(&config).await?;

    let outcome = run(&client, args.command).await;
    client.shutdown().await;
    outcome
}

async fn run(client: &ObjectClient, command: Command) -> Result<()> {
    match command {
        Command::Put {
            container,
            name,
            file,
        } => {
            match file {
                Some(path) => {
                    let input = tokio::fs::File::open(&path)
                        .await
                        .with_context(|| format!("Failed to open {:?}", path))?;
                    client.put_object(&container, &name, input).await?;
                }
                None => {
                    client
                        .put_object(&container, &name, tokio::io::stdin())
                        .await?
                }
            }
            info!("Stored '{}/{}'", container, name);
        }
        Command::Get {
            container,
            name,
            output,
        } => {
            let data = client.get_object(&container, &name).await?;
            match output {
                Some(path) => tokio::fs::write(&path, &data)
                    .await
                    .with_context(|| format!("Failed to write {:?}", path))?,
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
            }
        }
        Command::Rm { container, name } => {
            client.remove_object(&container, &name).await?;
            info!("Removed '{}/{}'", container, name);
        }
        Command::Exists { container, name } => {
            let found = client.exists_object(&container, &name).await?;
            println!("{}", found);
        }
        Command::Backends => {
            for backend in client.backends() {
                let props = backend.properties();
                println!(
                    "{}\t{}\t{}\tencrypt={:?}\tcompress={:?}",
                    backend.name(),
                    backend.backend_type(),
                    if props.is_main_instance { "main" } else { "replica" },
                    props.save_encrypt,
                    props.save_compress
                );
            }
        }
    }
    Ok(())
}
