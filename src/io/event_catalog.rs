use crate::core::reclassify::flood_footprint;
use crate::core::sources::HazardSource;
use crate::io::raster_io::RasterReader;
use crate::types::{EventId, ExposureError, ExposureResult, HazardEvent, Raster};
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Default prefix of flood event rasters (Dartmouth Flood Observatory ids)
pub const DEFAULT_EVENT_PREFIX: &str = "DFO";

/// Matches `<PREFIX>_<id>_From_<yyyymmdd>_to_<yyyymmdd>` at the start of a file stem
pub struct HazardNamePattern {
    regex: Regex,
}

impl HazardNamePattern {
    pub fn new(prefix: &str) -> ExposureResult<Self> {
        let pattern = format!(
            r"^{}_(\d+)_From_(\d{{8}})_to_(\d{{8}})",
            regex::escape(prefix)
        );
        let regex = Regex::new(&pattern)
            .map_err(|e| ExposureError::Config(format!("Invalid event prefix {:?}: {}", prefix, e)))?;
        Ok(Self { regex })
    }

    /// Event id, start and end date encoded in a raster name
    pub fn parse(&self, name: &str) -> Option<(EventId, NaiveDate, NaiveDate)> {
        let caps = self.regex.captures(name)?;
        let id: EventId = caps[1].parse().ok()?;
        if id == 0 {
            return None;
        }
        let start = NaiveDate::parse_from_str(&caps[2], "%Y%m%d").ok()?;
        let end = NaiveDate::parse_from_str(&caps[3], "%Y%m%d").ok()?;
        Some((id, start, end))
    }

    /// Build the full event for a raster file
    pub fn event_for(&self, path: &Path) -> Option<HazardEvent> {
        let stem = path.file_stem()?.to_str()?;
        let (id, start, end) = self.parse(stem)?;
        let mut event = HazardEvent::new(id, start, end);
        event.source = Some(path.to_path_buf());
        Some(event)
    }
}

/// Row of a flood event list (DFO archive / EM-DAT format)
#[derive(Debug, Deserialize)]
struct EventRow {
    #[serde(rename = "ID")]
    id: EventId,
    #[serde(rename = "BEGAN")]
    began: NaiveDate,
    #[serde(rename = "ENDED")]
    ended: NaiveDate,
    #[serde(rename = "MAINCAUSE", default)]
    main_cause: Option<String>,
}

/// Set of flood events, unique by id and ordered by id
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    events: BTreeMap<EventId, HazardEvent>,
}

impl EventCatalog {
    pub fn from_events(events: impl IntoIterator<Item = HazardEvent>) -> Self {
        let mut catalog = Self::default();
        for event in events {
            if let Some(previous) = catalog.events.insert(event.id, event) {
                log::warn!("Event {} listed more than once, keeping the last entry", previous.id);
            }
        }
        catalog
    }

    /// Discover hazard rasters in a directory by file name
    pub fn discover<P: AsRef<Path>>(dir: P, prefix: &str) -> ExposureResult<Self> {
        let dir = dir.as_ref();
        log::info!("Discovering {} hazard rasters in: {}", prefix, dir.display());

        let pattern = HazardNamePattern::new(prefix)?;
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_geotiff(path))
            .collect();
        paths.sort();

        let mut events = Vec::new();
        for path in paths {
            match pattern.event_for(&path) {
                Some(event) => events.push(event),
                None => log::debug!("Ignoring raster without an event name: {}", path.display()),
            }
        }

        let catalog = Self::from_events(events);
        log::info!("Found {} hazard events", catalog.len());
        Ok(catalog)
    }

    /// Load an event list with columns ID, BEGAN, ENDED and optional MAINCAUSE
    pub fn from_csv<P: AsRef<Path>>(path: P) -> ExposureResult<Self> {
        log::info!("Reading event list from: {}", path.as_ref().display());
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> ExposureResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut events = Vec::new();

        for row in csv_reader.deserialize::<EventRow>() {
            let row = row?;
            if row.id == 0 {
                return Err(ExposureError::InvalidFormat("Event id must be positive".to_string()));
            }
            if row.ended < row.began {
                return Err(ExposureError::InvalidFormat(format!(
                    "Event {} ends ({}) before it begins ({})",
                    row.id, row.ended, row.began
                )));
            }
            let mut event = HazardEvent::new(row.id, row.began, row.ended);
            event.cause = row.main_cause.filter(|c| !c.is_empty());
            events.push(event);
        }

        Ok(Self::from_events(events))
    }

    /// Keep events starting on or after `date`
    pub fn filter_since(mut self, date: NaiveDate) -> Self {
        let before = self.events.len();
        self.events.retain(|_, event| event.start_date >= date);
        log::info!("Kept {} of {} events starting on or after {}", self.events.len(), before, date);
        self
    }

    /// Copy cause labels from an event list onto matching events
    pub fn attach_causes(&mut self, list: &EventCatalog) {
        for (id, event) in self.events.iter_mut() {
            if let Some(listed) = list.events.get(id) {
                if event.cause.is_none() {
                    event.cause = listed.cause.clone();
                }
                if listed.start_date != event.start_date {
                    log::warn!(
                        "Event {} starts {} in the raster name but {} in the event list",
                        id,
                        event.start_date,
                        listed.start_date
                    );
                }
            }
        }
    }

    /// Keep only events also present in `list`
    pub fn restrict_to(mut self, list: &EventCatalog) -> Self {
        self.events.retain(|id, _| list.events.contains_key(id));
        self
    }

    pub fn get(&self, id: EventId) -> Option<&HazardEvent> {
        self.events.get(&id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &HazardEvent> {
        self.events.values()
    }

    pub fn into_events(self) -> Vec<HazardEvent> {
        self.events.into_values().collect()
    }
}

fn is_geotiff(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
            .unwrap_or(false)
}

/// Reads event footprints from the raster file recorded on each event
#[derive(Debug, Clone)]
pub struct HazardDirectory {
    /// Band holding the "flooded" layer
    pub band: isize,
    /// Recode the band to a footprint (1 = flooded, everything else no-data)
    pub reclassify: bool,
}

impl Default for HazardDirectory {
    fn default() -> Self {
        Self {
            band: 1,
            reclassify: false,
        }
    }
}

impl HazardSource for HazardDirectory {
    fn load_hazard(&self, event: &HazardEvent) -> ExposureResult<Raster> {
        let path = event.source.as_ref().ok_or_else(|| {
            ExposureError::Processing(format!("Event {} has no raster on disk", event.id))
        })?;
        let raster = RasterReader::read_raster(path, self.band)?;
        Ok(if self.reclassify { flood_footprint(&raster) } else { raster })
    }
}
