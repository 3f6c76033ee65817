use std::collections::BTreeMap;

use furnisher_dataset::{IntegrityMode, Split, rooms_by_split};
use furnisher_geometry::ApartmentType;

use crate::util::SourceArg;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct CheckDataArg {
    #[clap(flatten)]
    source: SourceArg,
    /// Accept the current source content and rewrite the manifest
    #[arg(long)]
    update: bool,
}

pub(crate) fn run(arg: &CheckDataArg) -> anyhow::Result<()> {
    let mode = if arg.update {
        IntegrityMode::Update
    } else {
        IntegrityMode::Verify
    };
    let data = arg.source.load(mode)?;
    let assignment = arg.source.split(&data)?;
    let rooms = rooms_by_split(&data.apartments, &assignment);

    let manifest = &data.manifest;
    println!("source:        {}", manifest.source);
    println!("sha256:        {}", manifest.sha256);
    println!("snapshot date: {}", manifest.snapshot_date);
    println!("apartments:    {}", manifest.rows);
    println!("active rooms:  {}", manifest.active_rooms);
    println!();

    println!("{:<8} {:>10} {:>8}", "split", "apartments", "rooms");
    for split in Split::ALL {
        println!(
            "{:<8} {:>10} {:>8}",
            split.name(),
            assignment.count(split),
            rooms[&split].len()
        );
    }
    println!();

    let mut strata = BTreeMap::<ApartmentType, BTreeMap<Split, usize>>::new();
    for apartment in &data.apartments {
        if let Some(split) = assignment.get(apartment.id) {
            *strata
                .entry(apartment.apartment_type)
                .or_default()
                .entry(split)
                .or_default() += 1;
        }
    }
    println!("{:<18} {:>6} {:>6} {:>6}", "apartment type", "train", "val", "test");
    for (apartment_type, counts) in &strata {
        let count = |split: Split| counts.get(&split).copied().unwrap_or_default();
        println!(
            "{:<18} {:>6} {:>6} {:>6}",
            apartment_type.label(),
            count(Split::Train),
            count(Split::Val),
            count(Split::Test)
        );
    }
    Ok(())
}
