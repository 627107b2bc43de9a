use std::env;
use std::path::PathBuf;

use staff_grid::image::load_binary;
use staff_grid::image::write_json_file;
use staff_grid::{estimate_scale, sections_from_image, GridEngine, GridModel, GridParams, Scale};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

struct Options {
    input: PathBuf,
    json_out: Option<PathBuf>,
    params: Option<PathBuf>,
    threshold: u8,
    interline: Option<i32>,
}

fn run() -> Result<(), String> {
    let opts = parse_args()?;

    let page = load_binary(&opts.input, opts.threshold)?;
    let img = page.as_view();

    let scale = match opts.interline {
        Some(interline) => Scale::from_interline(interline),
        None => estimate_scale(&img)
            .ok_or("Could not estimate an interline; pass --interline explicitly")?,
    };
    let params = match &opts.params {
        Some(path) => GridParams::from_json_file(path)?,
        None => GridParams::default(),
    };

    let sections = sections_from_image(&img);
    let engine = GridEngine::new(params);
    let model = engine.process(&img, &scale, sections).map_err(|e| e.to_string())?;

    print_summary(&scale, &model);

    if let Some(path) = &opts.json_out {
        write_json_file(path, &model)?;
        println!("\nJSON report written to {}", path.display());
    }

    Ok(())
}

fn parse_args() -> Result<Options, String> {
    let mut args = env::args().skip(1);
    let mut input: Option<PathBuf> = None;
    let mut json_out = None;
    let mut params = None;
    let mut threshold = 128u8;
    let mut interline = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json-out" => {
                json_out = Some(PathBuf::from(
                    args.next().ok_or("Missing value for --json-out")?,
                ));
            }
            "--params" => {
                params = Some(PathBuf::from(args.next().ok_or("Missing value for --params")?));
            }
            "--threshold" => {
                threshold = args
                    .next()
                    .ok_or("Missing value for --threshold")?
                    .parse()
                    .map_err(|e| format!("Bad --threshold value: {e}"))?;
            }
            "--interline" => {
                interline = Some(
                    args.next()
                        .ok_or("Missing value for --interline")?
                        .parse::<i32>()
                        .map_err(|e| format!("Bad --interline value: {e}"))?,
                );
            }
            "--help" | "-h" => return Err(usage()),
            other => {
                if input.is_some() {
                    return Err(format!("Unexpected argument {other}\n{}", usage()));
                }
                input = Some(PathBuf::from(other));
            }
        }
    }

    Ok(Options {
        input: input.ok_or_else(usage)?,
        json_out,
        params,
        threshold,
        interline,
    })
}

fn usage() -> String {
    "Usage: staff_demo <image> [--json-out <path>] [--params <json>] \
     [--threshold <0-255>] [--interline <px>]"
        .to_string()
}

fn print_summary(scale: &Scale, model: &GridModel) {
    println!("Grid summary");
    println!("  interline: {} px (line thickness {})", scale.interline, scale.main_fore);
    println!("  skew slope: {:.5}", model.skew.slope);
    println!("  staves: {}", model.staves.len());
    for staff in &model.staves {
        let brace = if staff.brace.is_some() { " brace" } else { "" };
        println!(
            "    staff {}: lines={} x=[{}, {}] interline={:.2}{}",
            staff.id,
            staff.lines.len(),
            staff.left,
            staff.right,
            staff.mean_interline(),
            brace
        );
    }
    println!("  systems: {}", model.systems.len());
    for system in &model.systems {
        println!(
            "    system {}: staves {}..{}",
            system.id, system.first_staff, system.last_staff
        );
    }
    let connections = model.connections.iter().filter(|c| c.connection).count();
    println!("  peaks: {}", model.peaks.len());
    println!("  connections: {connections}");
    println!("  discarded filaments: {}", model.discarded_filaments.len());
    println!("  elapsed_ms: {:.3}", model.elapsed_ms);
}
