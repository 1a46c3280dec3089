//! CSV export of the exposure table.
//!
//! This is the only place where per-event statistics become named columns.

use crate::core::exposure_table::ExposureTable;
use crate::types::{EventId, ExposureKind, ExposureResult};
use std::io::Write;
use std::path::Path;

/// Column naming for one exposure table
#[derive(Debug, Clone)]
pub struct ColumnNames {
    pub kind: ExposureKind,
    /// Event label prefix, e.g. `DFO`
    pub event_prefix: String,
    /// Period label used by summary columns, e.g. `2008_2020`
    pub period: String,
}

impl ColumnNames {
    pub fn new(kind: ExposureKind, event_prefix: &str, period: &str) -> Self {
        Self {
            kind,
            event_prefix: event_prefix.to_string(),
            period: period.to_string(),
        }
    }

    fn event_label(&self, event_id: EventId) -> String {
        format!("{}_{}", self.event_prefix, event_id)
    }

    pub fn event_value(&self, event_id: EventId) -> String {
        match self.kind {
            ExposureKind::Population => format!("Pop_Flood_{}", self.event_label(event_id)),
            ExposureKind::Cropland => format!("Crop_Flood_ha_{}", self.event_label(event_id)),
        }
    }

    pub fn event_percent(&self, event_id: EventId) -> String {
        match self.kind {
            ExposureKind::Population => format!("Pct_P_Flood_{}", self.event_label(event_id)),
            ExposureKind::Cropland => format!("Pct_C_Flood_{}", self.event_label(event_id)),
        }
    }

    pub fn sum(&self) -> String {
        match self.kind {
            ExposureKind::Population => format!("Pop_Flood_{}", self.period),
            ExposureKind::Cropland => format!("Crop_Flood_ha_{}", self.period),
        }
    }

    pub fn num_events(&self) -> String {
        "num_floods".to_string()
    }

    pub fn avg_value(&self) -> String {
        match self.kind {
            ExposureKind::Population => format!("avg_pop_flood_{}", self.period),
            ExposureKind::Cropland => format!("avg_crop_flood_{}", self.period),
        }
    }

    pub fn avg_percent(&self) -> String {
        match self.kind {
            ExposureKind::Population => format!("avg_p_pop_flood_{}", self.period),
            ExposureKind::Cropland => format!("avg_p_crop_flood_{}", self.period),
        }
    }
}

/// Period label from the first and last event year
pub fn period_label(first_year: i32, last_year: i32) -> String {
    format!("{}_{}", first_year, last_year)
}

/// Write the table as CSV to a file, creating parent directories
pub fn write_csv<P: AsRef<Path>>(table: &ExposureTable, names: &ColumnNames, path: P) -> ExposureResult<()> {
    log::info!("Exporting exposure table to: {}", path.as_ref().display());
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path.as_ref())?;
    write_to(table, names, file)
}

/// Write the table as CSV: one row per region, one column per (event, statistic)
/// and the summary columns when the table has been summarized
pub fn write_to<W: Write>(table: &ExposureTable, names: &ColumnNames, writer: W) -> ExposureResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let events = table.event_ids();
    let summarized = table.is_summarized();

    let mut header = vec!["region_id".to_string(), "region_name".to_string()];
    for &event_id in &events {
        header.push(names.event_value(event_id));
        header.push(names.event_percent(event_id));
    }
    if summarized {
        header.push(names.sum());
        header.push(names.num_events());
        header.push(names.avg_value());
        header.push(names.avg_percent());
    }
    csv_writer.write_record(&header)?;

    for record in table.records() {
        let mut row = vec![record.region.id.to_string(), record.region.name.clone()];
        for &event_id in &events {
            let stat = record.event_or_zero(event_id);
            row.push(format_value(stat.exposed));
            row.push(format_percent(stat.percent));
        }
        if let Some(summary) = record.summary.filter(|_| summarized) {
            row.push(format_value(summary.total_exposed));
            row.push(summary.num_events.to_string());
            row.push(format_value(summary.avg_exposed));
            row.push(format_percent(summary.avg_percent));
        }
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    log::info!("Exported {} regions x {} events", table.len(), events.len());
    Ok(())
}

fn format_value(value: f64) -> String {
    format!("{:.0}", value)
}

fn format_percent(value: f64) -> String {
    format!("{:.2}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Region;

    #[test]
    fn test_population_columns() {
        let names = ColumnNames::new(ExposureKind::Population, "DFO", "2008_2020");
        assert_eq!(names.event_value(3425), "Pop_Flood_DFO_3425");
        assert_eq!(names.event_percent(3425), "Pct_P_Flood_DFO_3425");
        assert_eq!(names.sum(), "Pop_Flood_2008_2020");
        assert_eq!(names.avg_value(), "avg_pop_flood_2008_2020");
        assert_eq!(names.avg_percent(), "avg_p_pop_flood_2008_2020");
    }

    #[test]
    fn test_cropland_columns() {
        let names = ColumnNames::new(ExposureKind::Cropland, "DFO", "2008_2022");
        assert_eq!(names.event_value(1), "Crop_Flood_ha_DFO_1");
        assert_eq!(names.event_percent(1), "Pct_C_Flood_DFO_1");
        assert_eq!(names.sum(), "Crop_Flood_ha_2008_2022");
        assert_eq!(names.num_events(), "num_floods");
    }

    #[test]
    fn test_csv_layout() {
        let mut table = ExposureTable::new(
            ExposureKind::Population,
            &[Region::new(1, "Cuamba"), Region::new(2, "Lurio")],
        );
        table.record_event_stat(1, 10, Some(1000.0), Some(250.0)).unwrap();
        table.record_event_stat(2, 10, Some(0.0), Some(0.0)).unwrap();
        table.summarize_all();

        let names = ColumnNames::new(ExposureKind::Population, "DFO", &period_label(2019, 2019));
        let mut out = Vec::new();
        write_to(&table, &names, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "region_id,region_name,Pop_Flood_DFO_10,Pct_P_Flood_DFO_10,Pop_Flood_2019_2019,num_floods,avg_pop_flood_2019_2019,avg_p_pop_flood_2019_2019\n\
             1,Cuamba,250,25.00,250,1,250,25.00\n\
             2,Lurio,0,0.00,0,0,0,0.00\n"
        );
    }

    #[test]
    fn test_csv_without_summary() {
        let mut table = ExposureTable::new(ExposureKind::Cropland, &[Region::new(5, "Mecufi")]);
        table.record_event_stat(5, 2, Some(40.0), Some(10.0)).unwrap();

        let names = ColumnNames::new(ExposureKind::Cropland, "DFO", "2022_2022");
        let mut out = Vec::new();
        write_to(&table, &names, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "region_id,region_name,Crop_Flood_ha_DFO_2,Pct_C_Flood_DFO_2\n5,Mecufi,10,25.00\n");
    }
}
