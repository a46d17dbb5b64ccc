//! Ontology IRIs.

use plot_gfa_zoning_models::{ConstraintKind, Unit};

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

pub const OM: &str = "http://www.ontology-of-units-of-measure.org/resource/om-2/";
pub const OPR: &str = "https://www.theworldavatar.com/kg/ontoplanningregulation/";
pub const OBS: &str = "https://www.theworldavatar.com/kg/ontobuildablespace/";
pub const OZ: &str = "https://www.theworldavatar.com/kg/ontozoning/";

/// Builds `<prefix><local>`.
#[must_use]
pub fn term(prefix: &str, local: &str) -> String {
    format!("{prefix}{local}")
}

/// Predicate linking a regulated subject to a constraint of `kind`.
#[must_use]
pub fn predicate_for(kind: ConstraintKind) -> String {
    let local = match kind {
        ConstraintKind::PlotRatio => "allowsGrossPlotRatio",
        ConstraintKind::SiteCoverage => "allowsSiteCoverage",
        ConstraintKind::StoreyLimit => "allowsStoreyAggregate",
        ConstraintKind::AbsoluteHeight => "allowsAbsoluteHeight",
        ConstraintKind::FloorToFloorHeight => "allowsFloorToFloorHeight",
        ConstraintKind::Setback => "requiresSetback",
        ConstraintKind::MaxGrossFloorArea => "allowsGrossFloorArea",
        ConstraintKind::StoreyFloorArea => "allowsStoreyFloorArea",
        ConstraintKind::StoreyCoverage => "allowsStoreyCoverage",
    };
    term(OPR, local)
}

/// Class of a constraint node of `kind`.
#[must_use]
pub fn class_for(kind: ConstraintKind) -> String {
    match kind {
        ConstraintKind::PlotRatio => term(OBS, "GrossPlotRatio"),
        ConstraintKind::SiteCoverage => term(OBS, "SiteCoverage"),
        ConstraintKind::StoreyLimit => term(OBS, "StoreyAggregate"),
        ConstraintKind::AbsoluteHeight => term(OM, "Height"),
        ConstraintKind::FloorToFloorHeight => term(OBS, "FloorToFloorHeight"),
        ConstraintKind::Setback => term(OBS, "Setback"),
        ConstraintKind::MaxGrossFloorArea => term(OBS, "GrossFloorArea"),
        ConstraintKind::StoreyFloorArea => term(OBS, "StoreyFloorArea"),
        ConstraintKind::StoreyCoverage => term(OBS, "StoreyCoverage"),
    }
}

/// Unit IRI, or `None` for plain counts.
#[must_use]
pub fn unit_iri(unit: Unit) -> Option<String> {
    match unit {
        Unit::Ratio | Unit::Fraction => Some(term(OM, "one")),
        Unit::Metre => Some(term(OM, "metre")),
        Unit::SquareMetre => Some(term(OM, "squareMetre")),
        Unit::Storeys => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_distinct_predicate() {
        let mut predicates: Vec<String> =
            ConstraintKind::all().iter().map(|k| predicate_for(*k)).collect();
        predicates.sort();
        predicates.dedup();
        assert_eq!(predicates.len(), ConstraintKind::all().len());
    }
}
