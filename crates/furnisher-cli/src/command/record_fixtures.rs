use std::path::PathBuf;

use furnisher_model::{read_fixtures, write_fixtures};

use crate::util::ModelArg;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RecordFixturesArg {
    /// Golden fixture file to update in place
    #[arg(
        long,
        default_value = "crates/furnisher-model/tests/fixtures/test_rooms.json"
    )]
    fixtures: PathBuf,
    #[clap(flatten)]
    model: ModelArg,
}

pub(crate) fn run(arg: &RecordFixturesArg) -> anyhow::Result<()> {
    let mut rooms = read_fixtures(&arg.fixtures)?;
    let engine = arg.model.engine();
    let model_path = arg.model.model.as_deref();
    let model = engine.load(model_path)?;
    let name = model.meta.name.clone();

    for room in &mut rooms {
        let score = engine.predict(&room.query(), model_path)?.score;
        if let Some(previous) = room.expected_scores.insert(name.clone(), score) {
            log::debug!("{}: {previous:.2} -> {score:.2}", room.name);
        }
        println!("{:<24} {score:>7.2}", room.name);
    }

    write_fixtures(&arg.fixtures, &rooms)?;
    println!(
        "recorded {} scores for '{name}' in {}",
        rooms.len(),
        arg.fixtures.display()
    );
    Ok(())
}
