use crate::{FoundLoad, Result};
use csv::Writer;
use std::io::Write;

const HEADER: [&str; 11] = [
    "Criteria",
    "Load ID",
    "Origin",
    "Destination",
    "Rate",
    "Rate/Mile",
    "Miles",
    "Weight",
    "Equipment",
    "Broker",
    "Pickup",
];

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes found loads as CSV. Unknown numbers are left empty.
pub fn write_loads_csv<W: Write>(out: W, loads: &[FoundLoad]) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(HEADER)?;
    for found in loads {
        let load = &found.details;
        writer.write_record([
            found.criteria_id.to_string(),
            found.load_id.clone(),
            load.origin.clone(),
            load.destination.clone(),
            cell(load.rate),
            cell(load.effective_rpm()),
            cell(load.distance),
            cell(load.weight),
            load.equipment.clone(),
            load.broker.clone(),
            load.pickup_date.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
