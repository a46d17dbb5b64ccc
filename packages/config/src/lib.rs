#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Run-wide configuration for the plot GFA toolchain.
//!
//! A single [`RunConfig`] is loaded from a TOML file at command start and
//! passed by reference into every stage. Nothing downstream reads
//! configuration from ambient state.
//!
//! ```toml
//! [paths]
//! plots = "data/plots.geojson"
//! area_regulations = "data/area_regulations.csv"
//! type_regulations = "data/type_regulations.csv"
//!
//! [[layers]]
//! name = "height_control"
//! theme = "height_control"
//! path = "data/height_control.geojson"
//! min_overlap_ratio = 0.01
//!
//! [scenario]
//! layer = "height_control"
//! path = "data/height_control_relaxed.geojson"
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use plot_gfa_zoning_models::{LayerTheme, MAX_STOREYS};
use serde::Deserialize;

/// Environment variable overriding [`StoreConfig::base_url`].
pub const STORE_URL_ENV: &str = "PLOT_GFA_STORE_URL";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`RunConfig`].
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The configuration parsed but cannot drive a run.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

/// Complete configuration for one batch command.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Input and output locations.
    pub paths: PathsConfig,
    /// Plot attribute field names.
    #[serde(default)]
    pub plots: PlotFieldsConfig,
    /// Regulation zone layers, in any order.
    pub layers: Vec<LayerConfig>,
    /// Alternate layer for the scenario variant.
    #[serde(default)]
    pub scenario: Option<ScenarioConfig>,
    /// GFA engine parameters.
    #[serde(default)]
    pub gfa: GfaConfig,
    /// Plot enrichment parameters.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// Linked-data store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Input and output file locations.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Plot GeoJSON `FeatureCollection`.
    pub plots: PathBuf,
    /// Area-based regulation table (CSV).
    pub area_regulations: PathBuf,
    /// Type-based regulation table (CSV).
    pub type_regulations: PathBuf,
    /// Directory receiving result tables, quality reports and N-Quads.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Road network centrelines (GeoJSON). Road plot properties are
    /// skipped without it.
    #[serde(default)]
    pub road_network: Option<PathBuf>,
}

/// Names of the plot properties read during ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct PlotFieldsConfig {
    /// Property holding the plot identifier.
    #[serde(default = "default_plot_id_field")]
    pub id_field: String,
    /// Property holding the master plan zone type.
    #[serde(default = "default_zone_field")]
    pub zone_field: String,
    /// Property holding the permitted use type.
    #[serde(default = "default_use_type_field")]
    pub use_type_field: String,
    /// Property holding the master plan plot ratio.
    #[serde(default = "default_plot_ratio_field")]
    pub plot_ratio_field: String,
}

impl Default for PlotFieldsConfig {
    fn default() -> Self {
        Self {
            id_field: default_plot_id_field(),
            zone_field: default_zone_field(),
            use_type_field: default_use_type_field(),
            plot_ratio_field: default_plot_ratio_field(),
        }
    }
}

/// One regulation zone layer.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    /// Unique layer name, matched against the `layer` column of the area
    /// regulation table.
    pub name: String,
    /// Regulatory theme.
    #[serde(default = "default_theme")]
    pub theme: LayerTheme,
    /// Layer GeoJSON `FeatureCollection`.
    pub path: PathBuf,
    /// Property holding the zone identifier.
    #[serde(default = "default_zone_id_field")]
    pub zone_id_field: String,
    /// Overlaps at or below this share of the plot area are ignored.
    #[serde(default)]
    pub min_overlap_ratio: f64,
}

/// Alternate input for the scenario variant.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    /// Name of the layer being substituted.
    pub layer: String,
    /// Alternate GeoJSON for that layer.
    pub path: PathBuf,
    /// Zone id property of the alternate file; defaults to the baseline
    /// layer's field.
    #[serde(default)]
    pub zone_id_field: Option<String>,
}

/// Parameters of the GFA computation engine.
#[derive(Debug, Clone, Deserialize)]
pub struct GfaConfig {
    /// Candidates whose `max / min` exceeds this ratio are flagged as
    /// conflicting.
    #[serde(default = "default_tolerance_ratio")]
    pub tolerance_ratio: f64,
    /// Storey height (m) assumed for residential zone types.
    #[serde(default = "default_residential_storey_height")]
    pub residential_storey_height: f64,
    /// Storey height (m) assumed for every other zone type.
    #[serde(default = "default_storey_height")]
    pub default_storey_height: f64,
    /// Zone types treated as residential.
    #[serde(default = "default_residential_zones")]
    pub residential_zones: Vec<String>,
    /// Permitted storey counts above this are capped and reported.
    #[serde(default = "default_max_storeys")]
    pub max_storeys: u32,
    /// Plot ratios derived from surroundings for zone types without one.
    #[serde(default)]
    pub context_gpr: ContextGprConfig,
}

impl Default for GfaConfig {
    fn default() -> Self {
        Self {
            tolerance_ratio: default_tolerance_ratio(),
            residential_storey_height: default_residential_storey_height(),
            default_storey_height: default_storey_height(),
            residential_zones: default_residential_zones(),
            max_storeys: default_max_storeys(),
            context_gpr: ContextGprConfig::default(),
        }
    }
}

impl GfaConfig {
    /// Storey height for a plot of the given zone type.
    #[must_use]
    pub fn storey_height_for(&self, zone_type: Option<&str>) -> f64 {
        match zone_type {
            Some(zone) if self.residential_zones.iter().any(|z| z == zone) => {
                self.residential_storey_height
            }
            _ => self.default_storey_height,
        }
    }
}

/// Surroundings-based plot ratio rules.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextGprConfig {
    /// Mean neighbour plot ratio above which surroundings count as dense.
    #[serde(default = "default_context_threshold")]
    pub threshold: f64,
    /// Neighbour zone types that count as industrial surroundings.
    #[serde(default = "default_industrial_zones")]
    pub industrial_zones: Vec<String>,
    /// One rule per zone type.
    #[serde(default = "default_context_rules")]
    pub rules: Vec<ContextGprRule>,
}

impl Default for ContextGprConfig {
    fn default() -> Self {
        Self {
            threshold: default_context_threshold(),
            industrial_zones: default_industrial_zones(),
            rules: default_context_rules(),
        }
    }
}

impl ContextGprConfig {
    /// Rule for a plot of the given zone type.
    #[must_use]
    pub fn rule_for(&self, zone_type: Option<&str>) -> Option<&ContextGprRule> {
        let zone_type = zone_type?;
        self.rules.iter().find(|r| r.zone == zone_type)
    }
}

/// Plot ratios and storeys assigned to one zone type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContextGprRule {
    /// Master plan zone type the rule applies to.
    pub zone: String,
    /// Ratio inside a landed housing area.
    pub landed_gpr: f64,
    /// Ratio next to a landed housing area.
    pub fringe_gpr: f64,
    /// Ratio in dense or industrial surroundings.
    pub context_gpr: f64,
    /// Storeys next to a landed housing area.
    pub fringe_storeys: u32,
    /// Storeys in dense or industrial surroundings.
    pub context_storeys: u32,
}

/// Plot enrichment parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Plots closer than this many metres are neighbours.
    #[serde(default = "default_neighbour_distance")]
    pub neighbour_distance: f64,
    /// Zone type of road plots.
    #[serde(default = "default_road_zone")]
    pub road_zone: String,
    /// Road network property holding the road type code.
    #[serde(default = "default_road_type_field")]
    pub road_type_field: String,
    /// Half-width (m) given to road centrelines when matching road plots.
    #[serde(default = "default_road_buffer")]
    pub road_buffer: f64,
    /// Road types whose plots make a neighbour count as a major road.
    #[serde(default = "default_major_road_types")]
    pub major_road_types: Vec<String>,
    /// Distance (m) used to close gaps between residential plots when
    /// tracing residential areas.
    #[serde(default = "default_fringe_closing_distance")]
    pub fringe_closing_distance: f64,
    /// Holes (m²) larger than this inside a residential area are kept.
    #[serde(default = "default_fringe_hole_area")]
    pub fringe_hole_area: f64,
    /// A plot grown by this many metres that leaves its residential area
    /// is a fringe plot.
    #[serde(default = "default_fringe_margin")]
    pub fringe_margin: f64,
    /// Half-width (m) of the strip along each rectangle edge tested
    /// against road plots.
    #[serde(default = "default_edge_buffer")]
    pub edge_buffer: f64,
    /// Share of an edge strip a road must cover for the edge to face it.
    #[serde(default = "default_corner_overlap_ratio")]
    pub corner_overlap_ratio: f64,
    /// Zone attribute listing the programmes a landed housing area or
    /// street block allows, comma separated.
    #[serde(default = "default_programme_field")]
    pub programme_field: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            neighbour_distance: default_neighbour_distance(),
            road_zone: default_road_zone(),
            road_type_field: default_road_type_field(),
            road_buffer: default_road_buffer(),
            major_road_types: default_major_road_types(),
            fringe_closing_distance: default_fringe_closing_distance(),
            fringe_hole_area: default_fringe_hole_area(),
            fringe_margin: default_fringe_margin(),
            edge_buffer: default_edge_buffer(),
            corner_overlap_ratio: default_corner_overlap_ratio(),
            programme_field: default_programme_field(),
        }
    }
}

/// Linked-data store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store base URL (e.g. `http://localhost:9999/blazegraph`).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Namespace receiving baseline facts.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Namespace receiving scenario facts.
    #[serde(default = "default_scenario_namespace")]
    pub scenario_namespace: String,
    /// Prefix for every minted IRI.
    #[serde(default = "default_iri_base")]
    pub iri_base: String,
    /// Quads per upload batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Whole-batch retry attempts on transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            namespace: default_namespace(),
            scenario_namespace: default_scenario_namespace(),
            iri_base: default_iri_base(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/output")
}

fn default_plot_id_field() -> String {
    "plot_id".to_string()
}

fn default_zone_field() -> String {
    "zone".to_string()
}

fn default_use_type_field() -> String {
    "use_type".to_string()
}

fn default_plot_ratio_field() -> String {
    "gpr".to_string()
}

fn default_zone_id_field() -> String {
    "zone_id".to_string()
}

const fn default_theme() -> LayerTheme {
    LayerTheme::Other
}

const fn default_tolerance_ratio() -> f64 {
    2.0
}

const fn default_max_storeys() -> u32 {
    MAX_STOREYS
}

const fn default_residential_storey_height() -> f64 {
    3.6
}

const fn default_storey_height() -> f64 {
    5.0
}

fn default_residential_zones() -> Vec<String> {
    [
        "RESIDENTIAL",
        "RESIDENTIAL / INSTITUTION",
        "COMMERCIAL & RESIDENTIAL",
        "RESIDENTIAL WITH COMMERCIAL AT 1ST STOREY",
        "WHITE",
        "BUSINESS PARK - WHITE",
        "BUSINESS 1 - WHITE",
        "BUSINESS 2 - WHITE",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

const fn default_neighbour_distance() -> f64 {
    2.0
}

const fn default_context_threshold() -> f64 {
    1.4
}

fn default_industrial_zones() -> Vec<String> {
    ["BUSINESS 1", "BUSINESS 2", "BUSINESS PARK"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_context_rules() -> Vec<ContextGprRule> {
    let rule = |zone: &str, landed, fringe, context, fringe_storeys, context_storeys| {
        ContextGprRule {
            zone: zone.to_string(),
            landed_gpr: landed,
            fringe_gpr: fringe,
            context_gpr: context,
            fringe_storeys,
            context_storeys,
        }
    };
    vec![
        rule("PLACE OF WORSHIP", 1.0, 1.4, 1.6, 4, 5),
        rule("EDUCATIONAL INSTITUTION", 1.0, 1.0, 1.4, 3, 4),
        rule("CIVIC & COMMUNITY INSTITUTION", 1.0, 1.4, 1.4, 3, 4),
    ]
}

fn default_road_zone() -> String {
    "ROAD".to_string()
}

fn default_road_type_field() -> String {
    "RD_TYP_CD".to_string()
}

const fn default_road_buffer() -> f64 {
    5.0
}

fn default_major_road_types() -> Vec<String> {
    [
        "Expressway",
        "Semi Expressway",
        "Major Arterials/Minor Arterials",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

const fn default_fringe_closing_distance() -> f64 {
    200.0
}

const fn default_fringe_hole_area() -> f64 {
    120_000.0
}

const fn default_fringe_margin() -> f64 {
    10.0
}

const fn default_edge_buffer() -> f64 {
    3.0
}

const fn default_corner_overlap_ratio() -> f64 {
    0.3
}

fn default_programme_field() -> String {
    "programmes".to_string()
}

fn default_base_url() -> String {
    "http://localhost:9999/blazegraph".to_string()
}

fn default_namespace() -> String {
    "plot_gfa".to_string()
}

fn default_scenario_namespace() -> String {
    "plot_gfa_scenario".to_string()
}

fn default_iri_base() -> String {
    "https://www.theworldavatar.com/kg/".to_string()
}

const fn default_batch_size() -> usize {
    10_000
}

const fn default_max_retries() -> u32 {
    5
}

impl RunConfig {
    /// Reads, parses and validates a configuration file, then applies the
    /// [`STORE_URL_ENV`] override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid
    /// TOML, or fails [`RunConfig::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&text)?;

        if let Ok(url) = std::env::var(STORE_URL_ENV)
            && !url.trim().is_empty()
        {
            log::info!("Using store URL from {STORE_URL_ENV}");
            config.store.base_url = url.trim().to_string();
        }

        log::info!(
            "Loaded configuration from {} ({} layers)",
            path.display(),
            config.layers.len()
        );
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid TOML or fails
    /// [`RunConfig::validate`].
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot drive a run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layers.is_empty() {
            return Err(invalid("at least one [[layers]] entry is required"));
        }

        let mut names = BTreeSet::new();
        for layer in &self.layers {
            if layer.name.trim().is_empty() {
                return Err(invalid("layer names must not be empty"));
            }
            if layer.name == plot_gfa_zoning_models::MASTERPLAN_LAYER {
                return Err(invalid(format!(
                    "layer name '{}' is reserved",
                    layer.name
                )));
            }
            if !names.insert(layer.name.as_str()) {
                return Err(invalid(format!("duplicate layer name '{}'", layer.name)));
            }
            if !(0.0..1.0).contains(&layer.min_overlap_ratio) {
                return Err(invalid(format!(
                    "layer '{}': min_overlap_ratio must be in [0, 1)",
                    layer.name
                )));
            }
        }

        if let Some(scenario) = &self.scenario
            && !names.contains(scenario.layer.as_str())
        {
            return Err(invalid(format!(
                "scenario layer '{}' is not a configured layer",
                scenario.layer
            )));
        }

        if !self.gfa.tolerance_ratio.is_finite() || self.gfa.tolerance_ratio < 1.0 {
            return Err(invalid("gfa.tolerance_ratio must be a finite value >= 1"));
        }
        if !(self.gfa.residential_storey_height > 0.0 && self.gfa.default_storey_height > 0.0) {
            return Err(invalid("storey heights must be positive"));
        }
        if self.gfa.max_storeys == 0 {
            return Err(invalid("gfa.max_storeys must be positive"));
        }
        let enrichment = &self.enrichment;
        for (name, value) in [
            ("neighbour_distance", enrichment.neighbour_distance),
            ("road_buffer", enrichment.road_buffer),
            ("fringe_closing_distance", enrichment.fringe_closing_distance),
            ("fringe_hole_area", enrichment.fringe_hole_area),
            ("fringe_margin", enrichment.fringe_margin),
            ("edge_buffer", enrichment.edge_buffer),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(format!("enrichment.{name} must be a finite value >= 0")));
            }
        }
        if !(0.0..1.0).contains(&enrichment.corner_overlap_ratio) {
            return Err(invalid("enrichment.corner_overlap_ratio must be in [0, 1)"));
        }
        for rule in &self.gfa.context_gpr.rules {
            if ![rule.landed_gpr, rule.fringe_gpr, rule.context_gpr]
                .iter()
                .all(|v| v.is_finite() && *v >= 0.0)
            {
                return Err(invalid(format!(
                    "gfa.context_gpr rule '{}': ratios must be finite values >= 0",
                    rule.zone
                )));
            }
        }
        if self.store.batch_size == 0 {
            return Err(invalid("store.batch_size must be positive"));
        }

        Ok(())
    }

    /// Looks up a layer by name.
    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&LayerConfig> {
        self.layers.iter().find(|l| l.name == name)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [paths]
        plots = "plots.geojson"
        area_regulations = "area.csv"
        type_regulations = "type.csv"

        [[layers]]
        name = "height_control"
        theme = "height_control"
        path = "hc.geojson"
        min_overlap_ratio = 0.01
    "#;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config = RunConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.layers.len(), 1);
        assert_eq!(config.layers[0].theme, LayerTheme::HeightControl);
        assert_eq!(config.layers[0].zone_id_field, "zone_id");
        assert_eq!(config.paths.output_dir, PathBuf::from("data/output"));
        assert!((config.gfa.tolerance_ratio - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.store.batch_size, 10_000);
        assert!(config.scenario.is_none());
    }

    #[test]
    fn storey_height_depends_on_zone_type() {
        let gfa = GfaConfig::default();
        assert!((gfa.storey_height_for(Some("RESIDENTIAL")) - 3.6).abs() < f64::EPSILON);
        assert!((gfa.storey_height_for(Some("BUSINESS 1")) - 5.0).abs() < f64::EPSILON);
        assert!((gfa.storey_height_for(None) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_unknown_scenario_layer() {
        let text = format!("{MINIMAL}\n[scenario]\nlayer = \"nope\"\npath = \"x.geojson\"\n");
        let err = RunConfig::parse(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }), "{err}");
    }

    #[test]
    fn rejects_duplicate_layers() {
        let text = format!(
            "{MINIMAL}\n[[layers]]\nname = \"height_control\"\npath = \"other.geojson\"\n"
        );
        assert!(RunConfig::parse(&text).is_err());
    }

    #[test]
    fn rejects_tolerance_below_one() {
        let text = format!("{MINIMAL}\n[gfa]\ntolerance_ratio = 0.5\n");
        assert!(RunConfig::parse(&text).is_err());
    }

    #[test]
    fn enrichment_and_context_defaults() {
        let config = RunConfig::parse(MINIMAL).unwrap();
        assert!(config.paths.road_network.is_none());
        assert_eq!(config.enrichment.road_zone, "ROAD");
        assert!((config.enrichment.corner_overlap_ratio - 0.3).abs() < f64::EPSILON);

        let context = &config.gfa.context_gpr;
        let worship = context.rule_for(Some("PLACE OF WORSHIP")).unwrap();
        assert!((worship.context_gpr - 1.6).abs() < f64::EPSILON);
        assert_eq!(worship.context_storeys, 5);
        assert!(context.rule_for(Some("RESIDENTIAL")).is_none());
        assert!(context.rule_for(None).is_none());
    }

    #[test]
    fn context_rules_replace_defaults() {
        let text = format!(
            "{MINIMAL}\n[[gfa.context_gpr.rules]]\nzone = \"SPORTS & RECREATION\"\n\
             landed_gpr = 1.0\nfringe_gpr = 1.2\ncontext_gpr = 1.4\n\
             fringe_storeys = 2\ncontext_storeys = 3\n"
        );
        let config = RunConfig::parse(&text).unwrap();
        assert_eq!(config.gfa.context_gpr.rules.len(), 1);
        assert!((config.gfa.context_gpr.threshold - 1.4).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_corner_ratio_of_one() {
        let text = format!("{MINIMAL}\n[enrichment]\ncorner_overlap_ratio = 1.0\n");
        assert!(RunConfig::parse(&text).is_err());
    }

    #[test]
    fn rejects_reserved_layer_name() {
        let text = MINIMAL.replace("name = \"height_control\"", "name = \"masterplan\"");
        assert!(RunConfig::parse(&text).is_err());
    }
}
