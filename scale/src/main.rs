use clap::Parser;
use color_eyre::eyre;
use scale::options::Options;
use std::io::Write;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let options = Options::parse();

    let scale_bin = match options.scale_bin {
        Some(ref bin) => bin.clone(),
        None => scale::locate().map_err(scale::Error::into_eyre)?,
    };

    let (output, dur) = scale::sim::simulate(
        &scale_bin,
        &options.topology,
        &options.config,
        options.timeout,
    )
    .await
    .map_err(scale::Error::into_eyre)?;
    log::info!("simulating took {:?}", dur);

    let log_file_path = options.log_file();
    {
        let mut log_file = utils::fs::open_writable(&log_file_path)?;
        log_file.write_all(&output.stdout)?;
    }

    let stats = scale::parser::parse_stats(
        std::io::Cursor::new(&output.stdout),
        &scale::parser::Options::default(),
    )?;

    if let Some(ref stats_file) = options.stats_file {
        serde_json::to_writer_pretty(utils::fs::open_writable(stats_file)?, &stats)?;
    }

    for (layer, cycles) in stats.per_layer.iter().enumerate() {
        println!(" => layer {layer}: {cycles}");
    }
    println!("total: {}", stats.overall);
    println!("log written to {}", log_file_path.display());
    Ok(())
}
