use clap::Parser;
use color_eyre::eyre;
use std::time::Instant;

fn main() -> eyre::Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let start = Instant::now();
    let options = scale::options::ParseOptions::parse();
    log::debug!("options: {:#?}", &options);

    let parse_options = scale::parser::Options {
        strict: options.strict,
    };
    let stats = scale::parser::parse(&options.log_file, &parse_options)?;

    if options.per_layer {
        for (layer, cycles) in stats.per_layer.iter().enumerate() {
            println!(" => layer {layer}: {cycles}");
        }
    }
    println!("{} layers, total: {}", stats.num_layers(), stats.overall);
    log::debug!("done after {:?}", start.elapsed());
    Ok(())
}
