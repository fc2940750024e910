mod chip_stack;
mod logging;
mod sim;
mod types;
mod workers;

fn parse_usize_list(arg: &str) -> Option<Vec<usize>> {
    if arg == "-" {
        return None;
    }
    let mut values = Vec::new();
    for part in arg.split(',') {
        if part.trim().is_empty() {
            return None;
        }
        let value = part.trim().parse::<usize>().ok()?;
        values.push(value);
    }
    Some(values)
}

fn parse_u64_list(arg: &str) -> Option<Vec<u64>> {
    if arg == "-" {
        return None;
    }
    let mut values = Vec::new();
    for part in arg.split(',') {
        if part.trim().is_empty() {
            return None;
        }
        let value = part.trim().parse::<u64>().ok()?;
        values.push(value);
    }
    Some(values)
}

fn print_usage(program: &str) {
    println!("Chip Factory CLI");
    println!("Usage:");
    println!("  {program} (run demo)");
    println!("  {program} bench [workers] [chips] [interval_ms] [cost_unit_ms] [validate] [poll]");
    println!(
        "  {program} stress [worker_sets] [chip_sets] [interval_sets] [cost_unit_ms] [validate] [poll]"
    );
    println!("  {program} --help");
    println!();
    println!(
        "Sets are comma-separated lists (e.g., 1,2,4). Use \"-\" to keep defaults for worker/chip/interval sets."
    );
    println!("Omit cost_unit_ms to keep its default.");
    println!("Defaults:");
    println!("  bench  workers=4 chips=200 interval_ms=0 cost_unit_ms=1");
    println!("  stress workers=1,2,4,8 chips=10,50,100 intervals=0,1,5 cost_unit_ms=1");
    println!("Flags:");
    println!("  validate  enable duplicate and accounting checks");
    println!("  poll      use polling workers instead of blocking ones");
}

fn exit_with_usage(program: &str, message: &str) -> ! {
    eprintln!("{message}");
    print_usage(program);
    std::process::exit(2);
}

fn main() {
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "chip_factory".to_string());
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("bench") => {
            let workers = args.next().and_then(|v| v.parse::<usize>().ok());
            let chips = args.next().and_then(|v| v.parse::<usize>().ok());
            let interval_ms = args.next().and_then(|v| v.parse::<u64>().ok());
            let cost_unit_ms = args.next().and_then(|v| v.parse::<u64>().ok());
            let mut validate = false;
            let mut poll = false;
            for arg in args {
                match arg.as_str() {
                    "validate" => validate = true,
                    "poll" => poll = true,
                    _ => {}
                }
            }
            sim::run_benchmark(workers, chips, interval_ms, cost_unit_ms, validate, poll);
        }
        Some("stress") => {
            let mut worker_sets: Option<Vec<usize>> = None;
            let mut chip_sets: Option<Vec<usize>> = None;
            let mut interval_sets: Option<Vec<u64>> = None;
            let mut cost_unit_ms: Option<u64> = None;
            let mut worker_sets_skipped = false;
            let mut chip_sets_skipped = false;
            let mut interval_sets_skipped = false;
            let mut validate = false;
            let mut poll = false;

            for arg in args {
                match arg.as_str() {
                    "validate" => {
                        validate = true;
                        continue;
                    }
                    "poll" => {
                        poll = true;
                        continue;
                    }
                    _ => {}
                }

                let mut consumed = false;
                if worker_sets.is_none() && !worker_sets_skipped {
                    if arg == "-" {
                        worker_sets_skipped = true;
                        consumed = true;
                    } else if let Some(values) = parse_usize_list(&arg) {
                        worker_sets = Some(values);
                        consumed = true;
                    }
                    if !consumed {
                        exit_with_usage(&program, &format!("stress: invalid worker_sets value: {arg}"));
                    }
                    continue;
                }
                if chip_sets.is_none() && !chip_sets_skipped {
                    if arg == "-" {
                        chip_sets_skipped = true;
                        consumed = true;
                    } else if let Some(values) = parse_usize_list(&arg) {
                        chip_sets = Some(values);
                        consumed = true;
                    }
                    if !consumed {
                        exit_with_usage(&program, &format!("stress: invalid chip_sets value: {arg}"));
                    }
                    continue;
                }
                if interval_sets.is_none() && !interval_sets_skipped {
                    if arg == "-" {
                        interval_sets_skipped = true;
                        consumed = true;
                    } else if let Some(values) = parse_u64_list(&arg) {
                        interval_sets = Some(values);
                        consumed = true;
                    }
                    if !consumed {
                        exit_with_usage(
                            &program,
                            &format!("stress: invalid interval_sets value: {arg}"),
                        );
                    }
                    continue;
                }
                if cost_unit_ms.is_none() {
                    if let Ok(value) = arg.parse::<u64>() {
                        cost_unit_ms = Some(value);
                    } else {
                        exit_with_usage(&program, &format!("stress: invalid cost_unit_ms value: {arg}"));
                    }
                    continue;
                }

                exit_with_usage(&program, &format!("stress: unexpected argument: {arg}"));
            }

            sim::run_stress(
                worker_sets,
                chip_sets,
                interval_sets,
                cost_unit_ms,
                validate,
                poll,
            );
        }
        Some("--help") | Some("-h") | Some("help") => print_usage(&program),
        Some(other) => {
            exit_with_usage(&program, &format!("unknown command: {other}"));
        }
        None => sim::run_demo(),
    }
}
