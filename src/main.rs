mod cli;

use anyhow::Context;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use warpdrive::{manifest, pipeline, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = cli::get_opts();
    match opts.subcommand.as_str() {
        "run" => {
            let config = Config::from_env();
            let result = pipeline::run_step_file(Path::new(&opts.arg), &config)
                .await
                .context("step run failed")?;
            print!("{}", serde_yaml::to_string(&result)?);
            if result.status().is_failed() {
                anyhow::bail!("step finished as {}", result.status());
            }
        }
        "validate" => {
            pipeline::validate_step_file(Path::new(&opts.arg))?;
        }
        "split" => {
            let content = std::fs::read_to_string(&opts.arg)
                .with_context(|| format!("failed to read {:?}", opts.arg))?;
            let docs = manifest::parse_manifests(&content)
                .with_context(|| format!("invalid manifest stream {:?}", opts.arg))?;
            let raw = manifest::split_manifests(&content);
            for (i, (doc, value)) in raw.iter().zip(docs.iter()).enumerate() {
                println!("# manifest-{} ({})", i, kind_of(value));
                println!("{}", doc);
            }
        }
        "image" => {
            println!("{}", manifest::get_image_name(&opts.arg));
        }
        other => {
            eprintln!("Unknown subcommand: {} (supported: run, validate, split, image)", other);
        }
    }

    Ok(())
}

fn kind_of(doc: &serde_yaml::Value) -> &str {
    doc.get("kind").and_then(|k| k.as_str()).unwrap_or("unknown")
}
