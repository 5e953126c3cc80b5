mod options;
mod progress;

use cadosys::batch::{self, RunError};
use cadosys::results::{self, LogIndex, Reports, StatsCache};
use cadosys::{brute, decision, experiment, plot, replicate, sweep};
use cadosys::{ScaleConfig, ShapeTable, Workload};
use clap::Parser;
use color_eyre::eyre::{self, WrapErr};
use console::{style, Style};
use options::{Command, Options};
use std::path::PathBuf;
use std::time::Instant;

struct Loaded {
    workload: Workload,
    shapes: ShapeTable,
    hw: cadosys::HardwareParams,
}

fn load(inputs: &options::Inputs) -> eyre::Result<Loaded> {
    let workload = Workload::from_path(&inputs.workload)?;
    let shapes = ShapeTable::from_path(&inputs.shape)?;
    let hw = ScaleConfig::from_path(&inputs.config)?
        .hardware_params()
        .wrap_err_with(|| format!("invalid config {}", inputs.config.display()))?;
    log::debug!("{hw:?}");
    Ok(Loaded {
        workload,
        shapes,
        hw,
    })
}

fn root_or_cwd(root: Option<&PathBuf>) -> eyre::Result<PathBuf> {
    match root {
        Some(root) => Ok(root.clone()),
        None => Ok(std::env::current_dir()?),
    }
}

fn select(opts: &options::Select) -> eyre::Result<()> {
    let Loaded {
        workload,
        shapes,
        hw,
    } = load(&opts.inputs)?;
    let decisions = decision::plan(&workload, &shapes, &hw);
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&decisions)?);
        return Ok(());
    }
    for decision in &decisions {
        let color = if decision.primary == decision.cache_aware {
            Style::new()
        } else {
            Style::new().yellow()
        };
        let secondary = decision
            .secondary
            .map_or_else(|| "-".to_string(), |df| df.to_string());
        println!(
            "{:>20} comp={} second={} {}",
            decision.layer,
            decision.primary,
            secondary,
            color.apply_to(format!("cado={}", decision.cache_aware)),
        );
    }
    Ok(())
}

fn plan(opts: &options::Plan) -> eyre::Result<()> {
    let Loaded {
        workload,
        shapes,
        hw,
    } = load(&opts.inputs)?;
    let decisions = decision::plan(&workload, &shapes, &hw);
    let num_pe = opts.inputs.num_pe;
    decision::write_table_to_path(&opts.comp, &workload, &decisions, num_pe, decision::Table::Comp)?;
    decision::write_table_to_path(&opts.cado, &workload, &decisions, num_pe, decision::Table::Cado)?;
    println!(
        "wrote {} and {} ({} layers)",
        opts.comp.display(),
        opts.cado.display(),
        decisions.len()
    );
    Ok(())
}

fn run_experiment(opts: &options::Experiment, show_progress: bool) -> eyre::Result<()> {
    let root = root_or_cwd(opts.root.as_ref())?;
    let experiment = match opts.experiment {
        Some(ref path) => experiment::Experiment::from_path(path)?,
        None => experiment::Experiment::default(),
    };
    let jobs = experiment.jobs(&root)?;
    let bar = progress::bar(jobs.len(), show_progress);

    let mut num_failed = 0;
    for job in &jobs {
        bar.set_message(job.to_string());
        let result = experiment::run_job(job);
        bar.inc(1);
        if let Err(err) = result {
            num_failed += 1;
            bar.println(format!("{:>15} {}", style(job.to_string()).red(), err));
            log::debug!("{err:?}");
            if opts.fail_fast {
                break;
            }
        }
    }
    bar.finish();

    let failed_msg = style(format!("{num_failed} failed"));
    println!(
        "planned {} points: {}",
        jobs.len(),
        if num_failed > 0 {
            failed_msg.red()
        } else {
            failed_msg
        }
    );
    if num_failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn brute_force(opts: &options::BruteForce) -> eyre::Result<()> {
    let Loaded {
        workload,
        shapes,
        hw,
    } = load(&opts.inputs)?;
    let written = brute::generate(
        &workload,
        &shapes,
        &hw,
        opts.inputs.num_pe,
        &opts.out_dir,
        &opts.prefix,
    )?;
    println!(
        "wrote {} topologies to {}",
        written.len(),
        opts.out_dir.display()
    );
    Ok(())
}

fn generate_configs(opts: &options::GenerateConfigs) -> eyre::Result<()> {
    let base = ScaleConfig::from_path(&opts.base)?;
    let sweeps = match opts.sweeps {
        Some(ref path) => sweep::load_sweeps(path)?,
        None => sweep::default_sweeps(),
    };
    let written = sweep::generate(&sweeps, &opts.workload, &base, &opts.out_dir)?;
    println!(
        "wrote {} configs to {}",
        written.len(),
        opts.out_dir.display()
    );
    Ok(())
}

fn print_simulation_result(job: &batch::Job, result: &Result<std::time::Duration, RunError>) {
    let (color, status) = match result {
        Ok(elapsed) => (Style::new().green(), format!("succeeded in {elapsed:?}")),
        Err(RunError::Skipped) => (
            Style::new().yellow(),
            "skipped (already exists)".to_string(),
        ),
        Err(RunError::Canceled) => (Style::new().yellow(), "canceled".to_string()),
        Err(RunError::Failed(ref err)) => {
            static PREVIEW_LEN: usize = 75;
            let mut err_preview = err.to_string();
            if err_preview.len() > PREVIEW_LEN {
                let end = err_preview
                    .char_indices()
                    .map(|(idx, _)| idx)
                    .take_while(|idx| *idx <= PREVIEW_LEN)
                    .last()
                    .unwrap_or(0);
                err_preview = format!("{} ...", &err_preview[..end]);
            }
            (Style::new().red(), format!("failed: {err_preview}"))
        }
    };
    println!(
        "{:>15} {:>30} [ {} ] {}",
        "simulating",
        color.apply_to(job.to_string()),
        job.log.display(),
        color.apply_to(status),
    );
}

async fn simulate(opts: &options::Simulate, show_progress: bool) -> eyre::Result<()> {
    let start = Instant::now();
    let scale_bin = match opts.scale_bin {
        Some(ref bin) => bin.clone(),
        None => scale::locate().map_err(scale::Error::into_eyre)?,
    };
    let concurrency = opts.concurrency.unwrap_or_else(num_cpus::get_physical);
    println!("concurrency: {concurrency}");

    let jobs = batch::jobs(&opts.topologies, &opts.out_dir)?;
    let num_jobs = jobs.len();
    let run_options = batch::Options {
        scale_bin,
        config: opts.config.clone(),
        timeout: opts.timeout,
        concurrency,
        force: opts.force,
        fail_fast: opts.fail_fast,
    };

    let bar = progress::bar(num_jobs, show_progress);
    let results = batch::run_all(jobs, &run_options, &bar).await;
    bar.finish();

    for (job, result) in &results {
        print_simulation_result(job, result);
    }

    let (_succeeded, failed): (Vec<_>, Vec<_>) = utils::partition_results(
        results
            .into_iter()
            .map(|(job, result)| result.map_err(|err| (job, err))),
    );

    let mut num_failed = 0;
    let mut num_skipped = 0;
    let mut num_canceled = 0;
    for (job, err) in failed {
        match err {
            RunError::Failed(ref source) => {
                num_failed += 1;
                eprintln!(
                    "============ {} ============",
                    style(format!("{job} failed")).red()
                );
                eprintln!("{source:?}\n");
            }
            RunError::Skipped => num_skipped += 1,
            RunError::Canceled => num_canceled += 1,
        }
    }

    let failed_msg = style(format!("{num_failed} failed"));
    println!(
        "\n\n => ran {} simulations in {:?}: {} canceled, {} skipped, {}",
        num_jobs,
        start.elapsed(),
        num_canceled,
        num_skipped,
        if num_failed > 0 {
            failed_msg.red()
        } else {
            failed_msg
        },
    );

    std::process::exit(i32::from(num_failed > 0));
}

fn best(opts: &options::Best) -> eyre::Result<()> {
    let mut logs = Vec::new();
    for entry in utils::fs::multi_glob(&opts.logs) {
        let path = entry?;
        let keep = opts.contains.as_deref().map_or(true, |needle| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().contains(needle))
        });
        if keep && path.is_file() {
            logs.push(path);
        }
    }
    log::info!("comparing {} logs", logs.len());

    let mut cache = StatsCache::new(scale::parser::Options { strict: opts.strict });
    match results::best_run(logs.iter().map(PathBuf::as_path), &mut cache)? {
        Some((path, stats)) => {
            println!("{}", path.display());
            println!("{}", stats.overall);
            Ok(())
        }
        None => Err(eyre::eyre!("no logs matched {:?}", opts.logs)),
    }
}

fn report(opts: &options::Report) -> eyre::Result<()> {
    let reports = match opts.reports {
        Some(ref path) => {
            let reader = utils::fs::open_readable(path)?;
            serde_yaml::from_reader(reader)
                .wrap_err_with(|| format!("failed to parse reports {}", path.display()))?
        }
        None => Reports::default(),
    };
    let index = LogIndex::from_dir(&opts.input, &reports.workloads)?;
    log::info!("indexed {} logs in {}", index.len(), opts.input.display());
    if index.is_empty() {
        log::warn!("no simulator logs found in {}", opts.input.display());
    }

    let mut cache = StatsCache::new(scale::parser::Options { strict: opts.strict });
    let written = results::write_reports(&index, &mut cache, &reports, &opts.output)?;
    for (path, report) in &written {
        println!("wrote {}", path.display());
        if opts.no_plots || report.rows.is_empty() {
            continue;
        }
        for png in [
            plot::bar_chart(report, path, "Speedup")?,
            plot::geo_mean_chart(report, path, "Speedup")?,
        ] {
            println!("wrote {}", png.display());
        }
    }
    Ok(())
}

fn replicate_scripts(opts: &options::Replicate) -> eyre::Result<()> {
    let root = root_or_cwd(opts.root.as_ref())?;
    let written = replicate::replicate(&root, &opts.source)?;
    println!("wrote {} scripts", written.len());
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> eyre::Result<()> {
    env_logger::init();
    color_eyre::install()?;

    // load env variables from .env files
    dotenv::dotenv().ok();

    let options = Options::parse();
    let show_progress = !options.no_progress;
    log::debug!("running {}", options.command);

    match options.command {
        Command::Select(ref opts) => select(opts),
        Command::Plan(ref opts) => plan(opts),
        Command::Experiment(ref opts) => run_experiment(opts, show_progress),
        Command::BruteForce(ref opts) => brute_force(opts),
        Command::GenerateConfigs(ref opts) => generate_configs(opts),
        Command::Simulate(ref opts) => simulate(opts, show_progress).await,
        Command::Best(ref opts) => best(opts),
        Command::Report(ref opts) => report(opts),
        Command::Replicate(ref opts) => replicate_scripts(opts),
    }
}
