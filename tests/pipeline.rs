use cadosys::experiment::{self, Experiment, Matrix, Paths};
use cadosys::results::{self, LogIndex, Reports, StatsCache, GEO_MEAN};
use cadosys::{brute, sweep, ScaleConfig, ShapeTable, Workload};
use color_eyre::eyre;
use similar_asserts as diff;
use std::path::Path;

const WORKLOAD: &str = "\
Layer name, Layer Type, IFMAP Height, IFMAP Width, Filter Height, Filter Width, Channels, Num Filter, Stride Height, Stride Width, IFMAP Source, Filter Source, PE,
Conv1, Conv, 224, 224, 11, 11, 3, 96, 4, 4, 0, 0, 1,
Pool1, Pool, 55, 55, 3, 3, 96, , 2, 2, 1, 0, 1,
Conv2, Conv, 27, 27, 5, 5, 96, 256, 1, 1, 1, 0, 1,
FC1, FC, 1, 1, 1, 1, 9216, 4096, 1, 1, 1, 0, 1,
";

const SHAPES: &str = "\
Layer name,ifmap_op_mat_H,ifmap_op_mat_W,filter_op_mat_H,filter_op_mat_W,ofmap_op_mat_H,ofmap_op_mat_W
Conv1,3025,363,363,96,3025,96
Conv2,729,2400,2400,256,729,256
FC1,1,9216,9216,4096,1,4096
";

const BASE_CONFIG: &str = "\
[general]
run_name = scale_run

[architecture_presets]
ArrayHeight = 8
ArrayWidth = 8
IfmapSramSzkB = 64
FilterSramSzkB = 64
OfmapSramSzkB = 32
Dataflow = os
Bandwidth = 10
WordSize = 1
BatchSize = 1
Unified = 1

[llc]
SizekB = 256
Assoc = 3
Partition = 8
HitLatency = 20
";

fn write_log(path: &Path, compute: u64, stall: u64) -> eyre::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log = format!("Running layer 0\nCompute cycles: {compute}\nStall cycles: {stall}\n");
    std::fs::write(path, log)?;
    Ok(())
}

fn read_rows(path: &Path) -> eyre::Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[test]
fn test_configs_to_tables() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    std::fs::create_dir_all(root.join("topologies/conv_nets"))?;
    std::fs::create_dir_all(root.join("run_scripts/alexnet"))?;
    std::fs::write(root.join("topologies/conv_nets/test_alexnet.csv"), WORKLOAD)?;
    std::fs::write(root.join("run_scripts/alexnet/alexnet_c256_ws_shape.csv"), SHAPES)?;

    let base: ScaleConfig = BASE_CONFIG.parse()?;
    let configs = sweep::generate(
        &sweep::default_sweeps(),
        "alexnet",
        &base,
        &root.join("configs/alexnet"),
    )?;
    assert!(configs.len() > 4);

    let scaled = ScaleConfig::from_path(root.join("configs/alexnet/alexnet_c256_2_1_ws.cfg"))?;
    let hw = scaled.hardware_params()?;
    diff::assert_eq!(have: hw.array_height, want: 16);
    diff::assert_eq!(have: hw.cache_capacity_bytes, want: 512 * 1024);
    diff::assert_eq!(have: hw.batch_size, want: 2);

    let experiment = Experiment {
        workloads: vec!["alexnet".to_string()],
        matrices: vec![Matrix {
            llc: vec![256, 512],
            num_pe: vec![1, 2],
            num_batch: vec![1],
        }],
        paths: Paths::default(),
    };
    let jobs = experiment.jobs(root)?;
    diff::assert_eq!(have: jobs.len(), want: 4);
    for job in &jobs {
        let decisions = experiment::run_job(job)?;
        diff::assert_eq!(have: decisions.len(), want: 4);
    }

    let comp = read_rows(&root.join("topologies/cado/alexnet_256_2_1_comp.csv"))?;
    diff::assert_eq!(have: comp.len(), want: 5);
    diff::assert_eq!(have: comp[0][0].as_str(), want: "Layer name");
    diff::assert_eq!(have: comp[0][13].as_str(), want: "Dataflow");
    diff::assert_eq!(have: comp[2][0].as_str(), want: "Pool1");
    diff::assert_eq!(have: comp[2][12].as_str(), want: "2");
    diff::assert_eq!(have: comp[2][13].as_str(), want: "os");

    let cado = read_rows(&root.join("topologies/cado/alexnet_256_2_1_cado.csv"))?;
    diff::assert_eq!(have: cado.len(), want: 5);
    diff::assert_eq!(have: cado[2][13].as_str(), want: "os");
    Ok(())
}

#[test]
fn test_brute_force_and_best_run() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let workload = Workload::from_reader(WORKLOAD.as_bytes())?;
    let shapes = ShapeTable::from_reader(SHAPES.as_bytes())?;
    let hw = BASE_CONFIG.parse::<ScaleConfig>()?.hardware_params()?;

    let out_dir = dir.path().join("brute");
    let written = brute::generate(&workload, &shapes, &hw, 1, &out_dir, "alexnet_")?;
    diff::assert_eq!(have: written.len(), want: 9);
    assert!(out_dir.join("alexnet_osos.csv").is_file());
    assert!(out_dir.join("alexnet_isis.csv").is_file());

    let logs = dir.path().join("logs");
    write_log(&logs.join("alexnet_osos.log"), 500, 100)?;
    write_log(&logs.join("alexnet_wsis.log"), 300, 50)?;
    write_log(&logs.join("alexnet_isws.log"), 300, 50)?;

    let paths = utils::fs::files_with_extension(&logs, "log")?;
    let mut cache = StatsCache::default();
    let (best, stats) = results::best_run(paths.iter().map(|p| p.as_path()), &mut cache)?
        .ok_or_else(|| eyre::eyre!("no best run"))?;
    diff::assert_eq!(have: best.file_name().and_then(|n| n.to_str()), want: Some("alexnet_isws.log"));
    diff::assert_eq!(have: stats.total_cycles(), want: 300);
    Ok(())
}

#[test]
fn test_logs_to_reports() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let logs = dir.path().join("logs");
    write_log(&logs.join("alexnet/alexnet_256_1_1_comp.log"), 400, 100)?;
    write_log(&logs.join("alexnet/alexnet_256_1_1_cado.log"), 200, 50)?;
    write_log(&logs.join("resnet18/resnet18_256_1_1_comp.log"), 100, 0)?;
    write_log(&logs.join("resnet18/resnet18_256_1_1_cado.log"), 400, 0)?;
    std::fs::write(logs.join("alexnet/notes.log"), "")?;

    let reports = Reports {
        workloads: vec!["alexnet".to_string(), "resnet18".to_string()],
        llc: vec![256],
        batches: vec![1],
        pe_llc: vec![256],
        pes: vec![1],
        assoc: vec![3],
        focus_llc: 256,
    };
    let index = LogIndex::from_dir(&logs, &reports.workloads)?;
    diff::assert_eq!(have: index.len(), want: 4);

    let mut cache = StatsCache::default();
    let prefix = dir.path().join("out/cado");
    let written = results::write_reports(&index, &mut cache, &reports, &prefix)?;
    diff::assert_eq!(have: written.len(), want: 7);

    let rows = read_rows(&dir.path().join("out/cado_1_1.csv"))?;
    diff::assert_eq!(have: rows[0].clone(), want: vec!["group", "", "Speedups"]);
    let labels: Vec<_> = rows[1..].iter().map(|row| row[1].as_str()).collect();
    diff::assert_eq!(have: labels, want: vec!["alexnet", "resnet18", GEO_MEAN]);
    diff::assert_eq!(have: rows[1][0].as_str(), want: "256KB LLC");
    diff::assert_eq!(have: rows[1][2].as_str(), want: "2");
    diff::assert_eq!(have: rows[2][2].as_str(), want: "0.25");
    let mean: f64 = rows[3][2].parse()?;
    assert!((mean - 0.5_f64.sqrt()).abs() < 1e-9);

    // no logs at 8-way associativity: only the geo-mean row remains
    let (_, assoc) = written
        .iter()
        .find(|(path, _)| path.ends_with("cado_assoc_1_1.csv"))
        .ok_or_else(|| eyre::eyre!("missing assoc report"))?;
    diff::assert_eq!(have: assoc.rows.len(), want: 1);
    diff::assert_eq!(have: assoc.rows[0].group.as_str(), want: "8-Way LLC");
    assert!(assoc.rows[0].value.is_nan());
    Ok(())
}
