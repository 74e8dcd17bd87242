use crate::{SavedLoad, ScrapedLoad, SearchCriteria, SuggestedBackhaul};
use tabled::settings::{object::Columns, Modify, Style, Width};
use tabled::{Table, Tabled};

#[derive(Tabled)]
pub struct CriteriaTableRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Origin")]
    pub origin: String,
    #[tabled(rename = "Destination")]
    pub destination: String,
    #[tabled(rename = "Radius", display_with = "display_right_6")]
    pub radius: String,
    #[tabled(rename = "Equipment")]
    pub equipment: String,
    #[tabled(rename = "Min $", display_with = "display_right_8")]
    pub min_rate: String,
    #[tabled(rename = "Backhaul")]
    pub backhaul: String,
    #[tabled(rename = "Last scan")]
    pub scan: String,
}

#[derive(Tabled)]
pub struct LoadTableRow {
    #[tabled(rename = "Load")]
    pub id: String,
    #[tabled(rename = "Origin")]
    pub origin: String,
    #[tabled(rename = "Destination")]
    pub destination: String,
    #[tabled(rename = "Rate", display_with = "display_right_8")]
    pub rate: String,
    #[tabled(rename = "$/mi", display_with = "display_right_6")]
    pub rpm: String,
    #[tabled(rename = "Miles", display_with = "display_right_6")]
    pub distance: String,
    #[tabled(rename = "Equipment")]
    pub equipment: String,
    #[tabled(rename = "Broker")]
    pub broker: String,
    #[tabled(rename = "Pickup")]
    pub pickup: String,
}

fn display_right_6(s: &str) -> String {
    format!("{:>6}", s)
}

fn display_right_8(s: &str) -> String {
    format!("{:>8}", s)
}

fn or_any(value: Option<String>) -> String {
    value.unwrap_or_else(|| "Any".to_string())
}

fn money(value: Option<f64>) -> String {
    value
        .map(|v| format!("${}", v.round() as i64))
        .unwrap_or_else(|| "N/A".to_string())
}

impl CriteriaTableRow {
    pub fn from_criteria(criteria: &SearchCriteria) -> Self {
        let scan = match (&criteria.scan_status, criteria.last_scan_count) {
            (Some(status), Some(count)) => format!("{} ({})", status, count),
            (Some(status), None) => status.to_string(),
            (None, _) => "never".to_string(),
        };
        let id = criteria.id.map(|id| id.to_string()).unwrap_or_default();

        Self {
            id: if criteria.is_deleted() { format!("{} (deleted)", id) } else { id },
            origin: or_any(criteria.origin_label()),
            destination: or_any(criteria.destination_label()),
            radius: criteria
                .pickup_distance
                .map(|d| format!("{}mi", d))
                .unwrap_or_else(|| "-".to_string()),
            equipment: or_any(criteria.equipment_type.clone()),
            min_rate: criteria.min_rate.map(|r| money(Some(r))).unwrap_or_else(|| "-".to_string()),
            backhaul: if criteria.backhaul { "yes" } else { "no" }.to_string(),
            scan,
        }
    }
}

impl LoadTableRow {
    pub fn from_load(load: &ScrapedLoad) -> Self {
        Self {
            id: load.id.clone(),
            origin: load.origin.clone(),
            destination: load.destination.clone(),
            rate: money(load.rate),
            rpm: load
                .effective_rpm()
                .map(|r| format!("{:.2}", r))
                .unwrap_or_else(|| "N/A".to_string()),
            distance: load
                .distance
                .map(|d| (d.round() as i64).to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            equipment: load.equipment.clone(),
            broker: load.broker.clone(),
            pickup: load.pickup_date.clone(),
        }
    }
}

pub fn create_criteria_table(criteria: &[SearchCriteria]) -> String {
    let rows: Vec<CriteriaTableRow> = criteria.iter().map(CriteriaTableRow::from_criteria).collect();

    let mut table = Table::new(&rows);
    table
        .with(Style::modern())
        .with(Modify::new(Columns::single(1)).with(Width::truncate(28)))
        .with(Modify::new(Columns::single(2)).with(Width::truncate(28)));

    table.to_string()
}

pub fn create_load_table<'a>(loads: impl IntoIterator<Item = &'a ScrapedLoad>) -> String {
    let rows: Vec<LoadTableRow> = loads.into_iter().map(LoadTableRow::from_load).collect();

    let mut table = Table::new(&rows);
    table
        .with(Style::modern())
        .with(Modify::new(Columns::single(0)).with(Width::truncate(24)))
        .with(Modify::new(Columns::single(1)).with(Width::truncate(28)))
        .with(Modify::new(Columns::single(2)).with(Width::truncate(28)))
        .with(Modify::new(Columns::single(7)).with(Width::wrap(30)));

    table.to_string()
}

pub fn create_saved_load_table(saved: &[SavedLoad]) -> String {
    #[derive(Tabled)]
    struct SavedRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(inline)]
        load: LoadTableRow,
    }

    let rows: Vec<SavedRow> = saved
        .iter()
        .map(|s| SavedRow {
            id: s.id.map(|id| id.to_string()).unwrap_or_default(),
            status: s.status.to_string(),
            load: LoadTableRow::from_load(&s.details),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.to_string()
}

/// Short report of a backhaul suggestion followed by its top loads.
pub fn format_backhaul(backhaul: &SuggestedBackhaul) -> String {
    let mut result = format!("Backhaul status: {}\n", backhaul.status);
    if let Some(error) = &backhaul.error {
        result.push_str(&format!("Error: {}\n", error));
    }
    if backhaul.result_count > 0 {
        result.push_str(&format!(
            "{} matching loads, best rate {}, best $/mi {}\n",
            backhaul.result_count,
            money(backhaul.best_rate),
            backhaul
                .best_rpm
                .map(|r| format!("{:.2}", r))
                .unwrap_or_else(|| "N/A".to_string()),
        ));
        result.push_str(&create_load_table(&backhaul.top_loads));
        result.push('\n');
    }
    result
}
