//! Residential programmes a plot qualifies for.
//!
//! Landed programmes (bungalows, semi-detached and terrace houses) depend
//! on plot size and shape and on the zone or area allowing them. Flats and
//! condominiums need a minimum site area outside landed housing areas, and
//! serviced apartments a fringe location.

use std::collections::{BTreeMap, BTreeSet};

use plot_gfa_zoning_models::{LayerTheme, Plot, PlotId, ResidentialProperties, UseType};

use crate::context::Surroundings;

/// The master plan zone reserved for housing.
const RESIDENTIAL: &str = "RESIDENTIAL";
const RESIDENTIAL_OR_INSTITUTION: &str = "RESIDENTIAL / INSTITUTION";

/// Programme that marks a good class bungalow area.
const GOOD_CLASS_BUNGALOW: &str = "GoodClassBungalow";

/// What decides the residential programmes of one plot.
#[derive(Debug, Clone, Default)]
pub struct ResidentialFacts {
    /// Master plan zone type.
    pub zone_type: String,
    /// Site area in square metres.
    pub site_area: f64,
    /// Median width (m), zero when unknown.
    pub width: f64,
    /// Median depth (m), zero when unknown.
    pub depth: f64,
    /// Roads run along two edges.
    pub corner: bool,
    /// On the edge of a residential area.
    pub fringe: bool,
    /// Programmes allowed by the landed housing area the plot lies in.
    pub landed_programmes: BTreeSet<String>,
    /// Programmes allowed by the street block plan the plot lies in.
    pub block_programmes: BTreeSet<String>,
    /// Next to a road plot of a major road type.
    pub abuts_major_road: bool,
}

impl ResidentialFacts {
    fn allows(&self, programme: &str) -> bool {
        self.landed_programmes.contains(programme) || self.block_programmes.contains(programme)
    }

    fn in_good_class_area(&self) -> bool {
        self.landed_programmes.contains(GOOD_CLASS_BUNGALOW)
    }
}

/// Programmes `facts` qualify for, given the zone types counted as
/// residential. The result keeps a fixed programme order.
#[must_use]
pub fn allowed_residential_types(
    facts: &ResidentialFacts,
    residential_zones: &[String],
) -> Vec<UseType> {
    let zone = facts.zone_type.as_str();
    if !residential_zones.iter().any(|z| z == zone) {
        return Vec::new();
    }

    let pure = zone == RESIDENTIAL;
    let mixed = !pure && zone != RESIDENTIAL_OR_INSTITUTION;
    let gcba = facts.in_good_class_area();
    let landed = !facts.landed_programmes.is_empty();
    let (area, width, depth) = (facts.site_area, facts.width, facts.depth);

    let mut allowed = Vec::new();
    let mut allow = |name: &str, condition: bool| {
        if condition {
            allowed.push(UseType::new(name));
        }
    };

    allow(
        "Bungalow",
        area >= 400.0 && width >= 10.0 && (pure || facts.allows("Bungalow")) && !gcba,
    );
    allow(
        "Semi-DetachedHouse",
        area >= 200.0 && width >= 8.0 && (pure || facts.allows("Semi-DetachedHouse")) && !gcba,
    );

    let terrace_allowed = |programme: &str| {
        pure || facts.allows("TerraceHouse") || facts.allows(programme)
    };
    let terrace_1_size = if facts.corner {
        area >= 200.0 && width >= 8.0
    } else {
        area >= 150.0 && width >= 6.0
    };
    allow(
        "TerraceType1",
        terrace_1_size && terrace_allowed("TerraceType1") && !gcba,
    );
    let terrace_2_width = if facts.corner { 8.0 } else { 6.0 };
    allow(
        "TerraceType2",
        area >= 80.0 && width >= terrace_2_width && terrace_allowed("TerraceType2") && !gcba,
    );

    allow(
        GOOD_CLASS_BUNGALOW,
        area >= 1400.0
            && width >= 18.5
            && depth >= 30.0
            && (gcba || facts.block_programmes.contains(GOOD_CLASS_BUNGALOW)),
    );

    let high_rise = !gcba && !landed;
    allow("Flat", area >= 1000.0 && high_rise);
    allow(
        "Condominium",
        area >= 4000.0 && (pure || zone == RESIDENTIAL_OR_INSTITUTION) && high_rise,
    );
    allow(
        "ServicedApartmentResidentialZone",
        pure && high_rise && facts.fringe && facts.abuts_major_road,
    );
    allow(
        "ServicedApartmentMixedUseZone",
        mixed && high_rise && facts.fringe,
    );

    allowed
}

/// Allowed residential programmes of every plot with at least one, keyed
/// by plot.
///
/// `properties` come from the enrichment stage and `major_roads` are the
/// road plots of a major road type.
#[must_use]
pub fn residential_types(
    plots: &[Plot],
    properties: &[ResidentialProperties],
    surroundings: &Surroundings<'_>,
    major_roads: &BTreeSet<PlotId>,
    residential_zones: &[String],
) -> BTreeMap<PlotId, Vec<UseType>> {
    let by_plot: BTreeMap<&PlotId, &ResidentialProperties> =
        properties.iter().map(|p| (&p.plot, p)).collect();

    let allowed: BTreeMap<PlotId, Vec<UseType>> = plots
        .iter()
        .filter_map(|plot| {
            let zone_type = plot.attributes.zone_type.clone()?;
            let shape = by_plot.get(&plot.id);
            let facts = ResidentialFacts {
                zone_type,
                site_area: plot.attributes.gross_area,
                width: shape.and_then(|s| s.average_width).unwrap_or(0.0),
                depth: shape.and_then(|s| s.average_depth).unwrap_or(0.0),
                corner: shape.and_then(|s| s.corner).unwrap_or(false),
                fringe: shape.is_some_and(|s| s.fringe),
                landed_programmes: surroundings
                    .programmes_of(&plot.id, LayerTheme::LandedHousingArea),
                block_programmes: surroundings.programmes_of(&plot.id, LayerTheme::StreetBlockPlan),
                abuts_major_road: surroundings
                    .neighbours_of(&plot.id)
                    .iter()
                    .any(|n| major_roads.contains(n)),
            };
            let types = allowed_residential_types(&facts, residential_zones);
            (!types.is_empty()).then(|| (plot.id.clone(), types))
        })
        .collect();

    log::info!(
        "{} of {} plots qualify for a residential programme",
        allowed.len(),
        plots.len()
    );
    allowed
}

#[cfg(test)]
mod tests {
    use plot_gfa_config::GfaConfig;

    use super::*;

    fn facts(zone: &str, site_area: f64, width: f64) -> ResidentialFacts {
        ResidentialFacts {
            zone_type: zone.to_string(),
            site_area,
            width,
            depth: 40.0,
            ..ResidentialFacts::default()
        }
    }

    fn names(types: &[UseType]) -> Vec<&str> {
        types.iter().map(UseType::as_str).collect()
    }

    fn zones() -> Vec<String> {
        GfaConfig::default().residential_zones
    }

    #[test]
    fn small_residential_plot_allows_terraces_only() {
        let types = allowed_residential_types(&facts("RESIDENTIAL", 160.0, 7.0), &zones());
        assert_eq!(names(&types), vec!["TerraceType1", "TerraceType2"]);
    }

    #[test]
    fn corner_plots_need_wider_terraces() {
        let mut corner = facts("RESIDENTIAL", 160.0, 7.0);
        corner.corner = true;
        assert!(allowed_residential_types(&corner, &zones()).is_empty());
    }

    #[test]
    fn large_residential_plot_allows_high_rise() {
        let types = allowed_residential_types(&facts("RESIDENTIAL", 5000.0, 50.0), &zones());
        assert_eq!(
            names(&types),
            vec![
                "Bungalow",
                "Semi-DetachedHouse",
                "TerraceType1",
                "TerraceType2",
                "Flat",
                "Condominium"
            ]
        );
    }

    #[test]
    fn landed_area_blocks_high_rise_and_limits_programmes() {
        let mut landed = facts("RESIDENTIAL / INSTITUTION", 5000.0, 50.0);
        landed.landed_programmes = BTreeSet::from(["Semi-DetachedHouse".to_string()]);
        let types = allowed_residential_types(&landed, &zones());
        assert_eq!(names(&types), vec!["Semi-DetachedHouse"]);

        landed.landed_programmes = BTreeSet::from([GOOD_CLASS_BUNGALOW.to_string()]);
        let types = allowed_residential_types(&landed, &zones());
        assert_eq!(names(&types), vec![GOOD_CLASS_BUNGALOW]);
    }

    #[test]
    fn serviced_apartments_need_the_fringe() {
        let mut mixed = facts("WHITE", 1200.0, 30.0);
        assert_eq!(names(&allowed_residential_types(&mixed, &zones())), vec!["Flat"]);

        mixed.fringe = true;
        assert_eq!(
            names(&allowed_residential_types(&mixed, &zones())),
            vec!["Flat", "ServicedApartmentMixedUseZone"]
        );

        let mut pure = facts("RESIDENTIAL", 1200.0, 30.0);
        pure.fringe = true;
        assert!(!names(&allowed_residential_types(&pure, &zones()))
            .contains(&"ServicedApartmentResidentialZone"));
        pure.abuts_major_road = true;
        assert!(names(&allowed_residential_types(&pure, &zones()))
            .contains(&"ServicedApartmentResidentialZone"));
    }

    #[test]
    fn non_residential_zones_allow_nothing() {
        let types = allowed_residential_types(&facts("BUSINESS 1", 5000.0, 50.0), &zones());
        assert!(types.is_empty());
    }
}
