use std::{collections::BTreeMap, path::PathBuf};

use anyhow::Context;
use furnisher_dataset::{DatasetArchive, IntegrityMode, Split};
use furnisher_model::CategoricalInput;
use furnisher_stats::metrics::RegressionMetrics;
use serde::Serialize;

use crate::util::{ModelArg, SourceArg, write_json_file};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EvaluateArg {
    #[clap(flatten)]
    source: SourceArg,
    /// Dataset archive produced by `rasterize`
    #[arg(long, default_value = "data/rooms.msgpack.zst")]
    archive: PathBuf,
    /// Split to evaluate on
    #[arg(long, default_value = "test")]
    split: Split,
    #[clap(flatten)]
    model: ModelArg,
    /// Write the report as JSON to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct EvaluationReport {
    model: String,
    split: Split,
    overall: RegressionMetrics,
    by_room_type: BTreeMap<String, RegressionMetrics>,
}

pub(crate) fn run(arg: &EvaluateArg) -> anyhow::Result<()> {
    let data = arg.source.load(IntegrityMode::Verify)?;
    let assignment = arg.source.split(&data)?;
    let archive = DatasetArchive::open(&arg.archive)
        .with_context(|| format!("Failed to open archive: {}", arg.archive.display()))?;
    let rows = archive.subset(&assignment, arg.split)?;

    let engine = arg.model.engine();
    let model = engine.load(arg.model.model.as_deref())?;
    log::info!(
        "evaluating '{}' on {} {} rows",
        model.meta.name,
        rows.len(),
        arg.split
    );

    let mut samples = Vec::with_capacity(rows.len());
    for row in rows.rows() {
        let categories = CategoricalInput {
            room_type: row.room_type,
            apartment_type: row.apartment_type,
        };
        let prediction = engine.predict_prepared(&model, &row.image, categories, &row.features)?;
        samples.push((
            row.room_type.label().to_owned(),
            f64::from(row.score),
            f64::from(prediction.score),
        ));
    }

    let truth = samples.iter().map(|(_, t, _)| *t).collect::<Vec<_>>();
    let pred = samples.iter().map(|(_, _, p)| *p).collect::<Vec<_>>();
    let overall = RegressionMetrics::compute(&truth, &pred)
        .with_context(|| format!("No rows in the {} split", arg.split))?;
    let report = EvaluationReport {
        model: model.meta.name.clone(),
        split: arg.split,
        overall,
        by_room_type: RegressionMetrics::grouped(samples),
    };

    print_table(&report);
    if let Some(path) = &arg.output {
        write_json_file("report", path, &report)?;
        println!("wrote report to {}", path.display());
    }
    Ok(())
}

fn print_table(report: &EvaluationReport) {
    println!("model '{}' on {} split", report.model, report.split);
    println!(
        "{:<14} {:>6} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7}",
        "room type", "n", "mae", "rmse", "r2", "acc", "f1", "naive"
    );
    let rows = report
        .by_room_type
        .iter()
        .map(|(k, m)| (k.as_str(), m))
        .chain([("all", &report.overall)]);
    for (label, m) in rows {
        println!(
            "{:<14} {:>6} {:>7.2} {:>7.2} {:>7.3} {:>7.3} {:>7.3} {:>7.2}",
            label, m.count, m.mae, m.rmse, m.r2, m.binary_accuracy, m.binary_f1, m.naive_mae
        );
    }
}
