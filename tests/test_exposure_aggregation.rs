use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use floodex::core::{
    AggregatorParams, ExposureAggregator, InMemoryExposure, InMemoryHazards, IntermediateSink, SkipKind,
};
use floodex::types::{
    EventId, ExposureError, ExposureKind, ExposureResult, GeoTransform, HazardEvent, Raster, ReferenceSystem,
    Region, ZoneRaster,
};
use ndarray::Array2;
use std::cell::RefCell;

const WGS84: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]]"#;
const UTM_37S: &str = r#"PROJCS["WGS 84 / UTM zone 37S",GEOGCS["WGS 84",DATUM["WGS_1984"]],PROJECTION["Transverse_Mercator"]]"#;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn grid() -> GeoTransform {
    GeoTransform::north_up(35.0, -14.0, 0.01)
}

fn raster(values: [f32; 4], wkt: &str) -> Raster {
    Raster::new(
        Array2::from_shape_vec((2, 2), values.to_vec()).unwrap(),
        grid(),
        ReferenceSystem::from_wkt(wkt),
    )
}

/// Region 1 covers the left column, region 2 the right column
fn zones() -> ZoneRaster {
    ZoneRaster::new(
        Array2::from_shape_vec((2, 2), vec![1, 2, 1, 2]).unwrap(),
        grid(),
        ReferenceSystem::from_wkt(WGS84),
    )
}

fn event(id: EventId, start: (i32, u32, u32)) -> HazardEvent {
    let start = NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap();
    HazardEvent::new(id, start, start + chrono::Duration::days(10))
}

struct Fixture {
    regions: Vec<Region>,
    events: Vec<HazardEvent>,
    hazards: InMemoryHazards,
    exposure: InMemoryExposure,
}

fn fixture() -> Fixture {
    let regions = vec![
        Region::new(1, "Cuamba"),
        Region::new(2, "Lurio"),
        Region::new(3, "Ilha de Mocambique"),
    ];

    // Listed out of order on purpose
    let events = vec![
        event(5, (2021, 4, 2)),
        event(1, (2021, 1, 10)),
        event(4, (2030, 1, 1)),
        event(3, (2021, 2, 1)),
        event(2, (2021, 3, 1)),
    ];

    let hazards = InMemoryHazards::new()
        .with(1, raster([1.0, 1.0, 0.0, 0.0], WGS84))
        .with(2, raster([0.0, 0.0, 0.0, 0.0], WGS84))
        .with(3, raster([1.0, 1.0, 1.0, 1.0], UTM_37S))
        .with(4, raster([1.0, 1.0, 1.0, 1.0], WGS84))
        .with(5, raster([0.0, 0.0, f32::NAN, 1.0], WGS84));

    let exposure = InMemoryExposure::new().with(2021, raster([250.0, 40.0, 750.0, 60.0], WGS84));

    Fixture {
        regions,
        events,
        hazards,
        exposure,
    }
}

#[test]
fn test_population_batch_with_skips() {
    init_logging();
    let f = fixture();

    let report = ExposureAggregator::new(AggregatorParams::population())
        .run(&f.regions, &zones(), &f.events, &f.hazards, &f.exposure)
        .unwrap();

    assert_eq!(report.processed_ids(), vec![1, 2, 5]);
    let skipped: Vec<(EventId, SkipKind)> = report.skipped.iter().map(|s| (s.event_id, s.kind)).collect();
    assert_eq!(
        skipped,
        vec![(3, SkipKind::ReferenceMismatch), (4, SkipKind::MissingExposureLayer)]
    );
    assert_eq!(report.year_span(), Some((2021, 2021)));

    let table = &report.table;
    assert_eq!(table.kind(), ExposureKind::Population);
    assert_eq!(table.event_ids(), vec![1, 2, 5]);
    assert_eq!(table.summarized_events(), &[1, 2, 5]);

    // Region 1: 1000 people, a quarter flooded once
    let stat = table.event_stat(1, 1).unwrap();
    assert_eq!((stat.total, stat.exposed), (1000.0, 250.0));
    assert_abs_diff_eq!(stat.percent, 25.0);
    assert_eq!(table.event_stat(1, 2).unwrap().exposed, 0.0);
    assert_eq!(table.event_stat(1, 5).unwrap().percent, 0.0);

    let summary = table.summary(1).unwrap();
    assert_eq!(summary.total_exposed, 250.0);
    assert_eq!(summary.num_events, 1);
    assert_eq!(summary.avg_exposed, 250.0);
    assert_abs_diff_eq!(summary.avg_percent, 25.0);

    // Region 2: flooded by events 1 and 5
    assert_abs_diff_eq!(table.event_stat(2, 1).unwrap().percent, 40.0);
    assert_abs_diff_eq!(table.event_stat(2, 5).unwrap().percent, 60.0);
    let summary = table.summary(2).unwrap();
    assert_eq!(summary.total_exposed, 100.0);
    assert_eq!(summary.num_events, 2);
    assert_eq!(summary.avg_exposed, 50.0);
    assert_abs_diff_eq!(summary.avg_percent, 50.0);

    // Skipped events leave no trace in the table
    assert!(table.event_stat(1, 3).is_none());
    assert!(table.event_stat(2, 4).is_none());
}

#[test]
fn test_region_without_exposure_reports_zero() {
    init_logging();
    let f = fixture();

    let report = ExposureAggregator::new(AggregatorParams::population())
        .run(&f.regions, &zones(), &f.events, &f.hazards, &f.exposure)
        .unwrap();

    let stat = report.table.event_stat(3, 1).unwrap();
    assert_eq!((stat.total, stat.exposed, stat.percent), (0.0, 0.0, 0.0));

    let summary = report.table.summary(3).unwrap();
    assert_eq!(summary.num_events, 0);
    assert_eq!(summary.avg_exposed, 0.0);
    assert_eq!(summary.avg_percent, 0.0);
}

#[test]
fn test_empty_inputs_are_fatal() {
    init_logging();
    let f = fixture();
    let aggregator = ExposureAggregator::new(AggregatorParams::population());

    assert!(matches!(
        aggregator.run(&[], &zones(), &f.events, &f.hazards, &f.exposure),
        Err(ExposureError::EmptyRegions)
    ));
    assert!(matches!(
        aggregator.run(&f.regions, &zones(), &[], &f.hazards, &f.exposure),
        Err(ExposureError::NoHazardEvents)
    ));
}

#[test]
fn test_cropland_on_finer_hazard_grid() {
    init_logging();
    let utm = ReferenceSystem::from_wkt(UTM_37S);
    let coarse = GeoTransform::north_up(500_000.0, 8_000_000.0, 100.0);
    let fine = GeoTransform::north_up(500_000.0, 8_000_000.0, 50.0);

    // Region 1 is the top row, region 2 the bottom row
    let zones = ZoneRaster::new(
        Array2::from_shape_vec((2, 2), vec![1, 1, 2, 2]).unwrap(),
        coarse,
        utm.clone(),
    );
    let cropland = Raster::new(
        Array2::from_shape_vec((2, 2), vec![1.0, f32::NAN, 1.0, 1.0]).unwrap(),
        coarse,
        utm.clone(),
    );
    #[rustfmt::skip]
    let flood = Raster::new(
        Array2::from_shape_vec((4, 4), vec![
            1.0, 1.0, 0.0, 0.0,
            1.0, 1.0, 0.0, 0.0,
            1.0, 1.0, 0.0, 0.0,
            1.0, 0.0, 0.0, 0.0,
        ]).unwrap(),
        fine,
        utm,
    );

    let regions = vec![Region::new(1, "Mecufi"), Region::new(2, "Metoro")];
    let events = vec![event(7, (2019, 3, 14))];
    let hazards = InMemoryHazards::new().with(7, flood);
    let exposure = InMemoryExposure::new().with(2019, cropland);

    let report = ExposureAggregator::new(AggregatorParams::cropland(None))
        .run(&regions, &zones, &events, &hazards, &exposure)
        .unwrap();

    // 50 m cells are 0.25 ha
    let top = report.table.event_stat(1, 7).unwrap();
    assert_eq!((top.total, top.exposed), (1.0, 1.0));
    assert_abs_diff_eq!(top.percent, 100.0);

    let bottom = report.table.event_stat(2, 7).unwrap();
    assert_eq!((bottom.total, bottom.exposed), (2.0, 1.0));
    assert_abs_diff_eq!(bottom.percent, 50.0);
}

/// One 4x4 km region of 1 km cropland pixels, flooded on its western half by a
/// 500 m footprint that does not reach the eastern half
fn half_flooded_district(pixel_area_m2: Option<f64>) -> (f64, f64, f64) {
    let utm = ReferenceSystem::from_wkt(UTM_37S);
    let km = GeoTransform::north_up(600_000.0, 8_400_000.0, 1000.0);

    let zones = ZoneRaster::new(Array2::from_elem((4, 4), 1), km, utm.clone());
    let cropland = Raster::new(Array2::from_elem((4, 4), 1.0), km, utm.clone());
    let flood = Raster::new(
        Array2::from_elem((8, 4), 1.0),
        GeoTransform::north_up(600_000.0, 8_400_000.0, 500.0),
        utm,
    );

    let regions = vec![Region::new(1, "Chokwe")];
    let events = vec![event(11, (2013, 1, 20))];
    let hazards = InMemoryHazards::new().with(11, flood);
    let exposure = InMemoryExposure::new().with(2013, cropland);

    let report = ExposureAggregator::new(AggregatorParams::cropland(pixel_area_m2))
        .run(&regions, &zones, &events, &hazards, &exposure)
        .unwrap();
    let stat = report.table.event_stat(1, 11).unwrap();
    (stat.total, stat.exposed, stat.percent)
}

#[test]
fn test_partial_hazard_coverage_keeps_region_total() {
    init_logging();

    let (total, exposed, percent) = half_flooded_district(None);
    assert_eq!((total, exposed), (1600.0, 800.0));
    assert_abs_diff_eq!(percent, 50.0);

    // A configured area describes the 1 km layer pixel, not the 500 m grid
    let (total, exposed, percent) = half_flooded_district(Some(1_000_000.0));
    assert_eq!((total, exposed), (1600.0, 800.0));
    assert_abs_diff_eq!(percent, 50.0);
}

#[test]
fn test_geographic_cropland_needs_pixel_area() {
    init_logging();
    let f = fixture();

    // Degree-sized pixels have no area in m2: every event with a layer fails
    let report = ExposureAggregator::new(AggregatorParams::cropland(None))
        .run(&f.regions, &zones(), &f.events, &f.hazards, &f.exposure)
        .unwrap();
    assert!(report.processed.is_empty());
    let failed: Vec<EventId> = report
        .skipped
        .iter()
        .filter(|s| s.kind == SkipKind::Failed)
        .map(|s| s.event_id)
        .collect();
    assert_eq!(failed, vec![1, 2, 5]);
    assert!(report.skipped[0].reason.contains("pixel_area_m2"));

    let report = ExposureAggregator::new(AggregatorParams::cropland(Some(10_000.0)))
        .run(&f.regions, &zones(), &f.events, &f.hazards, &f.exposure)
        .unwrap();
    assert_eq!(report.table.event_stat(1, 1).unwrap().total, 1000.0);
}

/// Sink that records which events produced an exposed raster
struct RecordingSink {
    seen: RefCell<Vec<EventId>>,
    fail: bool,
}

impl IntermediateSink for RecordingSink {
    fn exposed_raster(&self, event: &HazardEvent, _kind: ExposureKind, raster: &Raster) -> ExposureResult<()> {
        assert_eq!(raster.dim(), (2, 2));
        self.seen.borrow_mut().push(event.id);
        if self.fail {
            return Err(ExposureError::Processing("disk full".to_string()));
        }
        Ok(())
    }
}

#[test]
fn test_intermediate_sink_failures_do_not_skip_events() {
    init_logging();
    let f = fixture();
    let sink = RecordingSink {
        seen: RefCell::new(Vec::new()),
        fail: true,
    };

    let report = ExposureAggregator::new(AggregatorParams::population())
        .with_sink(&sink)
        .run(&f.regions, &zones(), &f.events, &f.hazards, &f.exposure)
        .unwrap();

    assert_eq!(*sink.seen.borrow(), vec![1, 2, 5]);
    assert_eq!(report.processed_ids(), vec![1, 2, 5]);
}
