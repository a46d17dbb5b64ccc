//! Input loading shared by the commands.

use std::collections::{BTreeMap, BTreeSet};

use plot_gfa_config::RunConfig;
use plot_gfa_ingest::{load_layer, load_plots, load_road_network, read_table};
use plot_gfa_overlay::{ShapeSettings, neighbour_links, residential_properties, road_properties};
use plot_gfa_regulation::{normalize_area_table, normalize_type_table};
use plot_gfa_zoning_models::{
    AreaRegulationRecord, LayerId, LayerTheme, Plot, PlotId, QualityReport, RegulationZoneLayer,
    ResidentialProperties, RoadProperties, RoadSegment, TypeRegulationRecord,
};

use crate::PipelineError;

/// Every plot, sorted by id.
///
/// # Errors
///
/// Returns [`PipelineError::Ingest`] if the plot file cannot be loaded.
pub fn plots(config: &RunConfig, report: &mut QualityReport) -> Result<Vec<Plot>, PipelineError> {
    Ok(load_plots(&config.paths.plots, &config.plots, report)?)
}

/// Every configured layer, in configuration order.
///
/// # Errors
///
/// Returns [`PipelineError::Ingest`] if a layer file cannot be loaded.
pub fn layers(
    config: &RunConfig,
    report: &mut QualityReport,
) -> Result<Vec<RegulationZoneLayer>, PipelineError> {
    config
        .layers
        .iter()
        .map(|layer| load_layer(layer, report).map_err(PipelineError::from))
        .collect()
}

/// The scenario's alternate layer, loaded under the name of the layer it
/// replaces.
///
/// # Errors
///
/// Returns [`PipelineError::NoScenario`] without a `[scenario]` section,
/// or [`PipelineError::Ingest`] if the alternate file cannot be loaded.
pub fn alternate_layer(
    config: &RunConfig,
    report: &mut QualityReport,
) -> Result<RegulationZoneLayer, PipelineError> {
    let scenario = config.scenario.as_ref().ok_or(PipelineError::NoScenario)?;
    let baseline = config
        .layer(&scenario.layer)
        .ok_or(PipelineError::NoScenario)?;

    let mut alternate = baseline.clone();
    alternate.path.clone_from(&scenario.path);
    if let Some(field) = &scenario.zone_id_field {
        alternate.zone_id_field.clone_from(field);
    }

    log::info!(
        "Loading alternate '{}' layer from {}",
        alternate.name,
        alternate.path.display()
    );
    Ok(load_layer(&alternate, report)?)
}

/// Normalized area-based regulation records.
///
/// # Errors
///
/// Returns [`PipelineError`] if the table cannot be read or lacks its key
/// columns.
pub fn area_records(
    config: &RunConfig,
    report: &mut QualityReport,
) -> Result<Vec<AreaRegulationRecord>, PipelineError> {
    let table = read_table(&config.paths.area_regulations)?;
    Ok(normalize_area_table(&table, report)?)
}

/// Normalized type-based regulation records.
///
/// # Errors
///
/// Returns [`PipelineError`] if the table cannot be read or lacks its key
/// columns.
pub fn type_records(
    config: &RunConfig,
    report: &mut QualityReport,
) -> Result<Vec<TypeRegulationRecord>, PipelineError> {
    let table = read_table(&config.paths.type_regulations)?;
    Ok(normalize_type_table(&table, report)?)
}

/// Theme of every configured layer.
#[must_use]
pub fn themes(config: &RunConfig) -> BTreeMap<LayerId, LayerTheme> {
    config
        .layers
        .iter()
        .map(|layer| (LayerId::new(layer.name.as_str()), layer.theme))
        .collect()
}

/// Road network centrelines, or none when no road network is configured.
///
/// # Errors
///
/// Returns [`PipelineError::Ingest`] if the road network cannot be loaded.
pub fn road_network(
    config: &RunConfig,
    report: &mut QualityReport,
) -> Result<Vec<RoadSegment>, PipelineError> {
    match &config.paths.road_network {
        Some(path) => Ok(load_road_network(
            path,
            &config.enrichment.road_type_field,
            report,
        )?),
        None => {
            log::info!("No road network configured; road plots get no road type");
            Ok(Vec::new())
        }
    }
}

/// Plot relations and shape properties derived from the plots alone (and
/// the road network, when configured).
#[derive(Debug, Clone)]
pub struct PlotProperties {
    /// Neighbour pairs.
    pub links: Vec<(PlotId, PlotId)>,
    /// Fringe, corner, width and depth of residential plots.
    pub residential: Vec<ResidentialProperties>,
    /// Road type and category of road plots.
    pub roads: Vec<RoadProperties>,
}

impl PlotProperties {
    /// Road plots whose road type is one of the configured major types.
    #[must_use]
    pub fn major_roads(&self, config: &RunConfig) -> BTreeSet<PlotId> {
        let major = &config.enrichment.major_road_types;
        self.roads
            .iter()
            .filter(|road| road.road_type.as_ref().is_some_and(|t| major.contains(t)))
            .map(|road| road.plot.clone())
            .collect()
    }
}

/// Derives [`PlotProperties`] of `plots`.
///
/// # Errors
///
/// Returns [`PipelineError::Ingest`] if the road network cannot be loaded.
pub fn plot_properties(
    config: &RunConfig,
    plots: &[Plot],
    report: &mut QualityReport,
) -> Result<PlotProperties, PipelineError> {
    let enrichment = &config.enrichment;
    let links = neighbour_links(plots, enrichment.neighbour_distance);
    log::info!("Found {} neighbour pairs among {} plots", links.len(), plots.len());

    let mut residential_plots = Vec::new();
    let mut road_plots = Vec::new();
    for plot in plots {
        match plot.attributes.zone_type.as_deref() {
            Some(zone) if config.gfa.residential_zones.iter().any(|z| z == zone) => {
                residential_plots.push(plot);
            }
            Some(zone) if zone == enrichment.road_zone => road_plots.push(plot),
            _ => {}
        }
    }

    let settings = ShapeSettings {
        closing_distance: enrichment.fringe_closing_distance,
        hole_area: enrichment.fringe_hole_area,
        fringe_margin: enrichment.fringe_margin,
        edge_buffer: enrichment.edge_buffer,
        corner_overlap_ratio: enrichment.corner_overlap_ratio,
    };
    let residential = residential_properties(&residential_plots, &road_plots, &settings);

    let segments = road_network(config, report)?;
    let roads = if segments.is_empty() {
        Vec::new()
    } else {
        road_properties(&road_plots, &segments, enrichment.road_buffer)
    };

    Ok(PlotProperties {
        links,
        residential,
        roads,
    })
}
