mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use syncforge::{BatchRequest, Controller, NoPicker};
use syncforge_av::ToolRegistry;
use syncforge_core::{
    Config, CropSettings, OutputOptions, PipelineInputs, PipelineParams, PipelineRequest,
    ProgressEvent, RunId,
};
use tokio::sync::broadcast::error::RecvError;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag.
    // Logs always go to stderr; in worker mode stdout carries protocol frames only.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "syncforge=trace,syncforge_core=trace,syncforge_av=trace,syncforge_pipeline=trace,syncforge_worker=trace,worker=debug".to_string()
        } else {
            "syncforge=info,syncforge_av=info,syncforge_pipeline=info,syncforge_worker=info,worker=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_pipeline(args, cli.config.as_deref()))
        }
        Commands::Batch { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_batch(&file, json, cli.config.as_deref()))
        }
        Commands::Worker {
            run_id,
            scratch_dir,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            let code = rt.block_on(run_worker(cli.config.as_deref(), run_id, scratch_dir));
            drop(rt);
            std::process::exit(code)
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("syncforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_pipeline(args: RunArgs, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let request = build_request(&args)?;

    let controller = Controller::from_config(&config, Box::new(NoPicker))?;
    if let Some(spec) = &args.crop {
        controller.crop_slot().set(parse_crop(spec)?);
    }

    let printer = (!args.json).then(|| spawn_progress_printer(&controller));
    let outcome = controller
        .process_video(request.inputs, request.params, request.output_options)
        .await;
    drop(controller);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let Some(path) = &outcome.output_path {
        println!("\nProcessing complete!");
        println!("Output: {}", path.display());
    }

    match outcome.error {
        Some(error) if !outcome.success => anyhow::bail!(error),
        _ => Ok(()),
    }
}

async fn run_batch(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read batch file {}", file.display()))?;
    let batch: BatchRequest = serde_json::from_str(&contents)
        .with_context(|| format!("invalid batch file {}", file.display()))?;

    let controller = Controller::from_config(&config, Box::new(NoPicker))?;
    let printer = (!json).then(|| spawn_progress_printer(&controller));
    let outcome = controller
        .process_video_batch(&batch.items, &batch.params, &batch.output_options)
        .await;
    drop(controller);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!();
        for (i, result) in outcome.results.iter().enumerate() {
            match (&result.output_path, &result.error) {
                (Some(path), _) => println!("  {}. ✓ {}", i + 1, path.display()),
                (None, Some(error)) => println!("  {}. ✗ {}", i + 1, error),
                (None, None) => println!("  {}. ✗", i + 1),
            }
        }
        println!(
            "\n{}/{} items succeeded",
            outcome.success_count(),
            outcome.results.len()
        );
    }

    if !outcome.success {
        anyhow::bail!("no batch item succeeded");
    }
    Ok(())
}

async fn run_worker(config_path: Option<&Path>, run_id: RunId, scratch_dir: Option<std::path::PathBuf>) -> i32 {
    let mut config = match Config::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Worker cannot load config: {e}");
            return 1;
        }
    };
    if let Some(dir) = scratch_dir {
        config.scratch.dir = dir;
    }

    match syncforge_worker::serve(tokio::io::stdin(), tokio::io::stdout(), &config, run_id).await {
        Ok(path) => {
            tracing::info!("Worker finished: {}", path.display());
            0
        }
        Err(e) => {
            tracing::error!(kind = e.kind(), "Worker failed: {e}");
            1
        }
    }
}

fn build_request(args: &RunArgs) -> Result<PipelineRequest> {
    if let Some(path) = &args.request {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request file {}", path.display()))?;
        return serde_json::from_str(&contents)
            .with_context(|| format!("invalid request file {}", path.display()));
    }

    let mut params = PipelineParams::default();
    params.text_options.custom_text = args.text.clone();

    Ok(PipelineRequest {
        inputs: PipelineInputs {
            source_a: args.source_a.clone().unwrap_or_default(),
            source_b: args.source_b.clone().unwrap_or_default(),
            reference_image: args.reference_image.clone(),
            artist: args.artist.clone(),
            title: args.title.clone(),
        },
        params,
        output_options: OutputOptions {
            output_path: args.output.clone().unwrap_or_default(),
            ..OutputOptions::default()
        },
    })
}

/// Parse `X:Y:WIDTH:HEIGHT`.
fn parse_crop(spec: &str) -> Result<CropSettings> {
    let parts: Vec<u32> = spec
        .split(':')
        .map(|p| p.trim().parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("invalid crop '{spec}', expected X:Y:WIDTH:HEIGHT"))?;
    match parts[..] {
        [x, y, width, height] => Ok(CropSettings {
            x,
            y,
            width,
            height,
            ..CropSettings::default()
        }),
        _ => anyhow::bail!("invalid crop '{spec}', expected X:Y:WIDTH:HEIGHT"),
    }
}

fn spawn_progress_printer(controller: &Controller) -> tokio::task::JoinHandle<()> {
    let mut rx = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => print_progress(&event.progress),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_progress(event: &ProgressEvent) {
    if event.is_failure() {
        println!("✗ {}", event.message);
        return;
    }
    let item = match (event.batch_item_index, event.batch_item_count) {
        (Some(index), Some(count)) => format!("[item {}/{}] ", index + 1, count),
        _ => String::new(),
    };
    println!(
        "{item}[{}/10] {} ({:.0}%)",
        event.stage,
        event.message,
        event.overall_percent()
    );
    if let Some(warning) = &event.warning {
        println!("  ⚠ {warning}");
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    for (label, script) in [
        ("alignment script", &config.scripts.align_script),
        ("overlay script", &config.scripts.overlay_script),
    ] {
        let status = if script.is_file() { "✓" } else { "✗" };
        println!("{} {} - {}", status, label, script.display());
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            Config::load(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::load_or_default(None)?
        }
    };

    println!("✓ Configuration is valid");
    println!("  Scratch dir: {}", config.scratch.dir.display());
    println!("  Alignment script: {}", config.scripts.align_script.display());
    println!("  Overlay script: {}", config.scripts.overlay_script.display());
    println!("  Reference marker: {}", config.identify.reference_marker);

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  ⚠ {warning}");
        }
    }

    Ok(())
}
