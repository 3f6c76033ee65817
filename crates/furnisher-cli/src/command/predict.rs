use std::path::PathBuf;

use furnisher_geometry::Point;
use furnisher_model::RoomQuery;
use serde::Deserialize;

use crate::util::{ModelArg, read_json_file};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PredictArg {
    /// JSON file with `polygon`, `door`, `room_type` and optional `apartment_type`
    input: PathBuf,
    #[clap(flatten)]
    model: ModelArg,
}

#[derive(Debug, Deserialize)]
struct RoomInput {
    polygon: Vec<Point>,
    door: Point,
    room_type: String,
    #[serde(default)]
    apartment_type: Option<String>,
}

pub(crate) fn run(arg: &PredictArg) -> anyhow::Result<()> {
    let input: RoomInput = read_json_file("room", &arg.input)?;
    let engine = arg.model.engine();
    let query = RoomQuery {
        polygon: &input.polygon,
        door: input.door,
        room_type: &input.room_type,
        apartment_type: input.apartment_type.as_deref(),
    };
    let prediction = engine.predict(&query, arg.model.model.as_deref())?;
    println!("score: {:.2}", prediction.score);
    println!("raw:   {:.4}", prediction.raw);
    Ok(())
}
