//! Per-region exposure statistics accumulated across flood events.
//!
//! The table holds one record per region. Each processed event contributes an
//! [`EventStat`] keyed by event id; summary statistics are derived from the
//! full set of event stats in a single pass once every event has been
//! recorded. Column names only appear when the table is exported.

use crate::types::{EventId, ExposureError, ExposureKind, ExposureResult, Region, RegionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Round to the nearest integer, ties to even
pub fn round_half_even(value: f64) -> f64 {
    value.round_ties_even()
}

/// Round to `decimals` places.
///
/// Rounds the exact binary value, so 2.675 (stored just below) gives 2.67 and
/// true ties go to even.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

/// Share of the region's total exposed to the hazard, in percent.
///
/// Zero when the total is zero or missing; rounded to two decimals and
/// clamped to [0, 100].
pub fn percentage_exposed(total: Option<f64>, exposed: Option<f64>) -> f64 {
    let total = total.unwrap_or(0.0);
    let exposed = exposed.unwrap_or(0.0);
    if total <= 0.0 || !total.is_finite() || !exposed.is_finite() {
        return 0.0;
    }
    round_to(exposed / total * 100.0, 2).clamp(0.0, 100.0)
}

/// Exposure of one region to one event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventStat {
    /// Total exposure value in the region (people or hectares)
    pub total: f64,
    /// Exposure value under the hazard footprint
    pub exposed: f64,
    /// exposed / total in percent, two decimals
    pub percent: f64,
}

/// Multi-event summary for one region
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    /// Sum of exposed values over all events
    pub total_exposed: f64,
    /// Events with a non-zero exposed value
    pub num_events: u32,
    /// total_exposed / num_events, rounded; 0 without impactful events
    pub avg_exposed: f64,
    /// Mean of the non-zero percentages, two decimals
    pub avg_percent: f64,
}

/// Region row of the exposure table
#[derive(Debug, Clone)]
pub struct RegionRecord {
    pub region: Region,
    pub events: BTreeMap<EventId, EventStat>,
    pub summary: Option<RegionSummary>,
}

impl RegionRecord {
    fn new(region: Region) -> Self {
        Self {
            region,
            events: BTreeMap::new(),
            summary: None,
        }
    }

    /// Stat for an event, with unrecorded events reading as zero exposure
    pub fn event_or_zero(&self, event_id: EventId) -> EventStat {
        self.events.get(&event_id).copied().unwrap_or(EventStat {
            total: 0.0,
            exposed: 0.0,
            percent: 0.0,
        })
    }
}

/// Region attribute table extended with per-event exposure statistics
#[derive(Debug, Clone)]
pub struct ExposureTable {
    kind: ExposureKind,
    records: BTreeMap<RegionId, RegionRecord>,
    event_ids: BTreeSet<EventId>,
    summarized_events: Option<Vec<EventId>>,
}

impl ExposureTable {
    /// Create an empty table for the given regions
    pub fn new(kind: ExposureKind, regions: &[Region]) -> Self {
        let records = regions
            .iter()
            .map(|region| (region.id, RegionRecord::new(region.clone())))
            .collect();

        Self {
            kind,
            records,
            event_ids: BTreeSet::new(),
            summarized_events: None,
        }
    }

    pub fn kind(&self) -> ExposureKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ordered by region id
    pub fn records(&self) -> impl Iterator<Item = &RegionRecord> {
        self.records.values()
    }

    pub fn record(&self, region_id: RegionId) -> Option<&RegionRecord> {
        self.records.get(&region_id)
    }

    /// Event ids with at least one recorded stat, ascending
    pub fn event_ids(&self) -> Vec<EventId> {
        self.event_ids.iter().copied().collect()
    }

    pub fn event_stat(&self, region_id: RegionId, event_id: EventId) -> Option<EventStat> {
        self.records.get(&region_id)?.events.get(&event_id).copied()
    }

    pub fn summary(&self, region_id: RegionId) -> Option<RegionSummary> {
        self.records.get(&region_id)?.summary
    }

    /// Events the current summaries were derived from
    pub fn summarized_events(&self) -> &[EventId] {
        self.summarized_events.as_deref().unwrap_or(&[])
    }

    pub fn is_summarized(&self) -> bool {
        self.summarized_events.is_some()
    }

    /// Write the exposed value and percentage of one event for one region.
    ///
    /// Missing values are coerced to 0. Writing the same (region, event) pair
    /// again overwrites the earlier stat. Existing summaries are dropped since
    /// they no longer reflect the event set.
    pub fn record_event_stat(
        &mut self,
        region_id: RegionId,
        event_id: EventId,
        total: Option<f64>,
        exposed: Option<f64>,
    ) -> ExposureResult<EventStat> {
        let record = self
            .records
            .get_mut(&region_id)
            .ok_or(ExposureError::UnknownRegion(region_id))?;

        let stat = EventStat {
            total: total.unwrap_or(0.0),
            exposed: exposed.unwrap_or(0.0),
            percent: percentage_exposed(total, exposed),
        };
        record.events.insert(event_id, stat);
        self.event_ids.insert(event_id);

        if self.summarized_events.is_some() {
            self.clear_summaries();
        }

        Ok(stat)
    }

    /// Record one event for every region from per-region totals and exposed values
    pub fn record_event(
        &mut self,
        event_id: EventId,
        totals: &BTreeMap<RegionId, f64>,
        exposed: &BTreeMap<RegionId, f64>,
    ) -> ExposureResult<()> {
        let region_ids: Vec<RegionId> = self.records.keys().copied().collect();
        for region_id in region_ids {
            self.record_event_stat(
                region_id,
                event_id,
                totals.get(&region_id).copied(),
                exposed.get(&region_id).copied(),
            )?;
        }
        Ok(())
    }

    /// Derive every region summary from the stats of `event_ids`.
    ///
    /// Always recomputed from scratch. Events absent for a region count as
    /// zero exposure.
    pub fn summarize(&mut self, event_ids: &[EventId]) {
        let mut events: Vec<EventId> = event_ids.to_vec();
        events.sort_unstable();
        events.dedup();

        for record in self.records.values_mut() {
            let stats: Vec<EventStat> = events.iter().map(|id| record.event_or_zero(*id)).collect();
            record.summary = Some(summarize_stats(&stats));
        }

        log::info!(
            "Summarized {} exposure over {} events for {} regions",
            self.kind,
            events.len(),
            self.records.len()
        );
        self.summarized_events = Some(events);
    }

    /// Summarize over every recorded event
    pub fn summarize_all(&mut self) {
        let events = self.event_ids();
        self.summarize(&events);
    }

    fn clear_summaries(&mut self) {
        for record in self.records.values_mut() {
            record.summary = None;
        }
        self.summarized_events = None;
    }
}

/// Fold a region's event stats into its summary
pub fn summarize_stats(stats: &[EventStat]) -> RegionSummary {
    let total_exposed: f64 = stats.iter().map(|s| s.exposed).sum();
    let num_events = stats.iter().filter(|s| s.exposed > 0.0).count() as u32;

    let avg_exposed = if num_events > 0 {
        round_half_even(total_exposed / num_events as f64)
    } else {
        0.0
    };

    let nonzero_pcts: Vec<f64> = stats.iter().map(|s| s.percent).filter(|p| *p > 0.0).collect();
    let avg_percent = if nonzero_pcts.is_empty() {
        0.0
    } else {
        round_to(nonzero_pcts.iter().sum::<f64>() / nonzero_pcts.len() as f64, 2)
    };

    RegionSummary {
        total_exposed: round_half_even(total_exposed),
        num_events,
        avg_exposed,
        avg_percent,
    }
}
