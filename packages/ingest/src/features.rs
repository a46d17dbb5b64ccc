//! GeoJSON plots and regulation zone layers.

use std::collections::BTreeMap;
use std::path::Path;

use geo::{LineString, MultiLineString, MultiPolygon};
use geojson::{Feature, GeoJson};
use plot_gfa_config::{LayerConfig, PlotFieldsConfig};
use plot_gfa_overlay::{repair, site_area};
use plot_gfa_zoning_models::{
    IssueKind, Plot, PlotAttributes, PlotId, QualityReport, RegulationZoneLayer, RoadSegment,
    Stage, UseType, ZoneId, ZonePolygon,
};
use serde_json::Value;

use crate::{IngestError, read_text};

/// Loads plots from a GeoJSON file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or is not a GeoJSON
/// `FeatureCollection`.
pub fn load_plots(
    path: &Path,
    fields: &PlotFieldsConfig,
    report: &mut QualityReport,
) -> Result<Vec<Plot>, IngestError> {
    let text = read_text(path)?;
    parse_plots(&text, &path.display().to_string(), fields, report)
}

/// Parses plots from GeoJSON text.
///
/// Features without an id or without polygonal geometry, and later
/// features repeating an id, are skipped with a quality issue. The
/// result is sorted by plot id.
///
/// # Errors
///
/// Returns [`IngestError`] if `text` is not a GeoJSON `FeatureCollection`.
pub fn parse_plots(
    text: &str,
    source_name: &str,
    fields: &PlotFieldsConfig,
    report: &mut QualityReport,
) -> Result<Vec<Plot>, IngestError> {
    let features = feature_collection(text, source_name)?;
    let total = features.len();
    let mut plots: BTreeMap<PlotId, Plot> = BTreeMap::new();

    for (i, mut feature) in features.into_iter().enumerate() {
        let label = format!("{source_name}#{}", i + 1);

        let Some(id) = property_string(&feature, &fields.id_field).or_else(|| feature_id(&feature))
        else {
            report.record(
                label,
                Stage::Ingest,
                IssueKind::DataQuality,
                format!("feature has no '{}' property", fields.id_field),
            );
            continue;
        };
        let id = PlotId::new(id);

        let Some(geometry) = take_polygonal(&mut feature) else {
            report.record(
                id.as_str(),
                Stage::Ingest,
                IssueKind::Geometry,
                "plot has no polygonal geometry",
            );
            continue;
        };

        if plots.contains_key(&id) {
            report.record(
                id.as_str(),
                Stage::Ingest,
                IssueKind::DataQuality,
                format!("duplicate plot id, {label} skipped"),
            );
            continue;
        }

        let gross_area = repair(&geometry).map_or_else(
            |e| {
                log::debug!("Plot {id}: area taken from unrepaired geometry ({e})");
                site_area(&geometry)
            },
            |repaired| site_area(&repaired),
        );

        let attributes = PlotAttributes {
            zone_type: property_string(&feature, &fields.zone_field),
            use_type: property_string(&feature, &fields.use_type_field).map(UseType::new),
            plot_ratio: plot_ratio(&feature, &fields.plot_ratio_field, &id, report),
            gross_area,
        };

        plots.insert(
            id.clone(),
            Plot {
                id,
                geometry,
                attributes,
            },
        );
    }

    log::info!(
        "Loaded {} plots from {source_name} ({} features)",
        plots.len(),
        total
    );
    Ok(plots.into_values().collect())
}

/// Loads one regulation zone layer described by `config`.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or is not a GeoJSON
/// `FeatureCollection`.
pub fn load_layer(
    config: &LayerConfig,
    report: &mut QualityReport,
) -> Result<RegulationZoneLayer, IngestError> {
    let text = read_text(&config.path)?;
    parse_layer(&text, config, &config.zone_id_field, report)
}

/// Parses a regulation zone layer from GeoJSON text, reading zone ids from
/// `zone_id_field`.
///
/// Features sharing a zone id are merged into one multi-part zone whose
/// attributes come from the first feature. Every other property is kept as
/// a zone attribute.
///
/// # Errors
///
/// Returns [`IngestError`] if `text` is not a GeoJSON `FeatureCollection`.
pub fn parse_layer(
    text: &str,
    config: &LayerConfig,
    zone_id_field: &str,
    report: &mut QualityReport,
) -> Result<RegulationZoneLayer, IngestError> {
    let features = feature_collection(text, &config.name)?;
    let mut zones: BTreeMap<ZoneId, ZonePolygon> = BTreeMap::new();

    for (i, mut feature) in features.into_iter().enumerate() {
        let label = format!("{}#{}", config.name, i + 1);

        let Some(id) = property_string(&feature, zone_id_field).or_else(|| feature_id(&feature))
        else {
            report.record(
                label,
                Stage::Ingest,
                IssueKind::DataQuality,
                format!("zone has no '{zone_id_field}' property"),
            );
            continue;
        };
        let id = ZoneId::new(id);

        let Some(geometry) = take_polygonal(&mut feature) else {
            report.record(
                format!("{}/{id}", config.name),
                Stage::Ingest,
                IssueKind::Geometry,
                "zone has no polygonal geometry",
            );
            continue;
        };

        if let Some(existing) = zones.get_mut(&id) {
            existing.geometry.0.extend(geometry.0);
            continue;
        }

        let attributes = attributes(&feature, zone_id_field);
        zones.insert(
            id.clone(),
            ZonePolygon {
                id,
                geometry,
                attributes,
            },
        );
    }

    log::info!(
        "Loaded layer '{}' ({}): {} zones",
        config.name,
        config.theme,
        zones.len()
    );

    Ok(
        RegulationZoneLayer::new(config.name.as_str(), config.theme, zones.into_values().collect())
            .with_min_overlap_ratio(config.min_overlap_ratio),
    )
}

/// Loads road centrelines from a GeoJSON file, reading road types from
/// `type_field`.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or is not a GeoJSON
/// `FeatureCollection`.
pub fn load_road_network(
    path: &Path,
    type_field: &str,
    report: &mut QualityReport,
) -> Result<Vec<RoadSegment>, IngestError> {
    let text = read_text(path)?;
    parse_road_network(&text, &path.display().to_string(), type_field, report)
}

/// Parses road centrelines from GeoJSON text.
///
/// Features without a road type or without linear geometry are skipped
/// with a quality issue.
///
/// # Errors
///
/// Returns [`IngestError`] if `text` is not a GeoJSON `FeatureCollection`.
pub fn parse_road_network(
    text: &str,
    source_name: &str,
    type_field: &str,
    report: &mut QualityReport,
) -> Result<Vec<RoadSegment>, IngestError> {
    let features = feature_collection(text, source_name)?;
    let total = features.len();
    let mut segments = Vec::with_capacity(total);

    for (i, mut feature) in features.into_iter().enumerate() {
        let label = format!("{source_name}#{}", i + 1);

        let Some(road_type) = property_string(&feature, type_field) else {
            report.record(
                label,
                Stage::Ingest,
                IssueKind::DataQuality,
                format!("road has no '{type_field}' property"),
            );
            continue;
        };
        let Some(geometry) = take_linear(&mut feature) else {
            report.record(label, Stage::Ingest, IssueKind::Geometry, "road has no linear geometry");
            continue;
        };

        segments.push(RoadSegment {
            road_type,
            geometry,
        });
    }

    log::info!(
        "Loaded {} road segments from {source_name} ({total} features)",
        segments.len()
    );
    Ok(segments)
}

fn feature_collection(text: &str, source_name: &str) -> Result<Vec<Feature>, IngestError> {
    let geojson: GeoJson = text.parse().map_err(|e| IngestError::GeoJson {
        source_name: source_name.to_string(),
        source: Box::new(e),
    })?;

    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection.features),
        GeoJson::Feature(_) | GeoJson::Geometry(_) => {
            Err(IngestError::NotFeatureCollection(source_name.to_string()))
        }
    }
}

/// Removes the feature's geometry and converts it to a multipolygon.
/// Non-polygonal parts of a geometry collection are ignored.
fn take_polygonal(feature: &mut Feature) -> Option<MultiPolygon<f64>> {
    let geometry: geo::Geometry<f64> = feature.geometry.take()?.try_into().ok()?;
    let polygons = polygons_of(geometry);
    if polygons.is_empty() {
        None
    } else {
        Some(MultiPolygon(polygons))
    }
}

fn polygons_of(geometry: geo::Geometry<f64>) -> Vec<geo::Polygon<f64>> {
    match geometry {
        geo::Geometry::Polygon(p) => vec![p],
        geo::Geometry::MultiPolygon(mp) => mp.0,
        geo::Geometry::GeometryCollection(gc) => gc.0.into_iter().flat_map(polygons_of).collect(),
        _ => Vec::new(),
    }
}

fn take_linear(feature: &mut Feature) -> Option<MultiLineString<f64>> {
    let geometry: geo::Geometry<f64> = feature.geometry.take()?.try_into().ok()?;
    let lines = lines_of(geometry);
    if lines.is_empty() {
        None
    } else {
        Some(MultiLineString(lines))
    }
}

fn lines_of(geometry: geo::Geometry<f64>) -> Vec<LineString<f64>> {
    match geometry {
        geo::Geometry::LineString(l) => vec![l],
        geo::Geometry::MultiLineString(ml) => ml.0,
        geo::Geometry::Line(l) => vec![l.into()],
        geo::Geometry::GeometryCollection(gc) => gc.0.into_iter().flat_map(lines_of).collect(),
        _ => Vec::new(),
    }
}

fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn property_string(feature: &Feature, name: &str) -> Option<String> {
    feature.property(name).and_then(value_string)
}

fn feature_id(feature: &Feature) -> Option<String> {
    match feature.id.as_ref()? {
        geojson::feature::Id::String(s) => Some(s.clone()),
        geojson::feature::Id::Number(n) => Some(n.to_string()),
    }
}

fn attributes(feature: &Feature, zone_id_field: &str) -> BTreeMap<String, String> {
    feature
        .properties_iter()
        .filter(|(key, _)| key.as_str() != zone_id_field)
        .filter_map(|(key, value)| value_string(value).map(|v| (key.clone(), v)))
        .collect()
}

fn plot_ratio(
    feature: &Feature,
    field: &str,
    plot: &PlotId,
    report: &mut QualityReport,
) -> Option<f64> {
    let value = feature.property(field)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => return None,
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };

    match parsed {
        Some(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            report.record(
                plot.as_str(),
                Stage::Ingest,
                IssueKind::DataQuality,
                format!("unusable plot ratio {value}"),
            );
            None
        }
    }
}
