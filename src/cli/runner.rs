use std::hint::black_box;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use tracing::info;

use tilevips::{Access, Config, Image, LoadOptions, Phase, SaveOptions, Value, operation};

use super::args::{CliArgs, Command};
use super::errors::AppError;

fn show_info() -> Result<(), AppError> {
    let version: Vec<String> = (0..3)
        .map(|c| tilevips::version(c).unwrap_or_default().to_string())
        .collect();
    println!("tilevips version {}", version.join("."));

    let im = Image::black(100, 100, 1)?;
    println!("width = {}", im.width());
    println!("height = {}", im.height());
    println!("max = {}", im.max()?);

    let rows = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]];
    let im = Image::new_from_array(&rows, 8.0, 128.0)?;
    println!("scale = {}", im.get("scale")?);
    println!("offset = {}", im.get("offset")?);
    Ok(())
}

fn copy_with_progress(
    input: &Path,
    output: &Path,
    access: Access,
    quality: u8,
) -> Result<(), AppError> {
    let image = Image::new_from_file(input, &LoadOptions { access })?;
    image.set_progress(true)?;

    image.signal_connect(Phase::PreEval, |_, _| {
        println!("preeval");
        Ok(())
    })?;

    let last_percent = Arc::new(AtomicU32::new(0));
    image.signal_connect(Phase::Eval, move |_, progress| {
        if last_percent.swap(progress.percent, Ordering::Relaxed) != progress.percent {
            println!("{}%, eta {}s", progress.percent, progress.eta);
        }
        Ok(())
    })?;

    image.signal_connect(Phase::PostEval, |_, _| {
        println!("posteval");
        Ok(())
    })?;

    image.write_to_file_with(output, &SaveOptions { quality })?;
    info!("Wrote {:?} -> {:?}", input, output);
    Ok(())
}

/// Mean and fastest time per construction over all runs.
fn summarize(runs: &[Duration], loops: usize) -> (Duration, Duration) {
    let per_op = |d: &Duration| d.div_f64(loops as f64);
    let total: Duration = runs.iter().sum();
    let mean = total.div_f64((runs.len() * loops) as f64);
    let fastest = runs.iter().map(per_op).min().unwrap_or_default();
    (mean, fastest)
}

fn bench(loops: usize, runs: usize) -> Result<(), AppError> {
    if loops == 0 {
        return Err(AppError::ZeroCount {
            arg: "--loops".to_string(),
        });
    }
    if runs == 0 {
        return Err(AppError::ZeroCount {
            arg: "--runs".to_string(),
        });
    }

    let mut timings = Vec::with_capacity(runs);
    for run in 0..runs {
        let t0 = Instant::now();
        for _ in 0..loops {
            black_box(Image::black(10, 10, 1)?);
        }
        let elapsed = t0.elapsed();
        info!("Run {}: {} constructions in {:?}", run + 1, loops, elapsed);
        timings.push(elapsed);
    }

    let (mean, fastest) = summarize(&timings, loops);
    println!(
        "Image::black(10, 10): mean {:.3} us, best {:.3} us ({} runs x {} loops)",
        mean.as_secs_f64() * 1e6,
        fastest.as_secs_f64() * 1e6,
        runs,
        loops
    );

    // Same construction through the generic call surface
    let args = [Value::Int(10), Value::Int(10)];
    let t0 = Instant::now();
    for _ in 0..loops {
        black_box(operation::call("black", &args, &[])?);
    }
    println!(
        "operation::call(\"black\"): mean {:.3} us",
        t0.elapsed().div_f64(loops as f64).as_secs_f64() * 1e6
    );
    Ok(())
}

fn show_ops(name: Option<&str>) -> Result<(), AppError> {
    let json = match name {
        Some(name) => {
            let spec = operation::describe(name).ok_or_else(|| AppError::UnknownOperation {
                name: name.to_string(),
            })?;
            serde_json::to_string_pretty(spec).map_err(tilevips::Error::from)?
        }
        None => operation::to_json()?,
    };
    println!("{}", json);
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        tilevips::logging::init_logging(tracing::Level::DEBUG);
    }

    if let Some(path) = &args.config {
        let config = Config::from_json_file(path)?;
        info!("Using configuration from {:?}", path);
        tilevips::init(config)?;
    }

    match args.command {
        Command::Info => show_info()?,
        Command::Progress {
            input,
            output,
            access,
            quality,
        } => copy_with_progress(&input, &output, access, quality)?,
        Command::Bench { loops, runs } => bench(loops, runs)?,
        Command::Ops { name } => show_ops(name.as_deref())?,
    }

    Ok(())
}
