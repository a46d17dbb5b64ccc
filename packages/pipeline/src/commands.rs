//! One function per batch command.

use std::collections::BTreeSet;

use chrono::Utc;
use plot_gfa_analytics::{gfa_overview, regulation_overview, scenario_difference};
use plot_gfa_config::RunConfig;
use plot_gfa_engine::{
    Surroundings, apply_context_gprs, context_gprs, estimate, residential_types, run_scenario,
};
use plot_gfa_ingest::{read_gfa_results, write_csv, write_gfa_results, write_quality_report};
use plot_gfa_overlay::{ProgressCallback, neighbour_links, resolve_layer, resolve_overlay};
use plot_gfa_regulation::{RegulationIndex, link};
use plot_gfa_triples::{Emitter, NamespaceStatus, QuadSet, StoreSink};
use plot_gfa_zoning_models::{
    LayerId, PlotId, PlotOverlayResult, QualityReport, UseType, ZoneAssignment,
};

use crate::inputs;
use crate::outputs::{
    GFA_OVERVIEW, GFA_RESULTS, GFA_RESULTS_SCENARIO, Outputs, REGULATION_OVERVIEW,
    SCENARIO_DIFFERENCE, publish,
};
use crate::{Command, CommandSummary, PipelineError, RunOptions};

/// Creates the baseline namespace, and the scenario namespace when a
/// scenario is configured. Existing namespaces are left alone.
///
/// # Errors
///
/// Returns [`PipelineError::Sink`] if the store refuses a request.
pub async fn init_namespaces(
    config: &RunConfig,
    options: RunOptions,
) -> Result<CommandSummary, PipelineError> {
    let summary = CommandSummary {
        command: Command::InitNamespaces,
        quads: 0,
        uploaded: 0,
        issues: 0,
    };

    if !options.upload {
        log::info!("Upload disabled; no namespaces created");
        return Ok(summary);
    }

    let sink = StoreSink::new(&config.store)?;
    let mut namespaces = vec![config.store.namespace.as_str()];
    if config.scenario.is_some() {
        namespaces.push(config.store.scenario_namespace.as_str());
    }

    for namespace in namespaces {
        match sink.create_namespace(namespace).await? {
            NamespaceStatus::Created => log::info!("Created '{namespace}'"),
            NamespaceStatus::AlreadyExists => log::info!("'{namespace}' already present"),
        }
    }

    Ok(summary)
}

/// Publishes area-based regulations and the dominant-zone links of every
/// plot.
///
/// # Errors
///
/// Returns [`PipelineError`] if an input cannot be loaded, an output
/// cannot be written, or the upload fails.
pub async fn instantiate_area_regulations(
    config: &RunConfig,
    options: RunOptions,
    progress: &dyn ProgressCallback,
) -> Result<CommandSummary, PipelineError> {
    let mut report = QualityReport::new();
    let records = inputs::area_records(config, &mut report)?;
    let plots = inputs::plots(config, &mut report)?;
    let layers = inputs::layers(config, &mut report)?;
    let overlay = resolve_overlay(&plots, &layers, &mut report, progress)?;

    let emitter = Emitter::new(&config.store.iri_base);
    let mut quads = emitter.area_regulations(&records, &inputs::themes(config));
    quads.extend(emitter.overlay_links(&overlay));

    publish(
        config,
        options,
        Command::InstantiateAreaRegulations,
        &config.store.namespace,
        &quads,
        &report,
    )
    .await
}

/// Publishes site areas, neighbour links, residential plot properties
/// and, with a road network, road plot types.
///
/// # Errors
///
/// Returns [`PipelineError`] if the plots or road network cannot be
/// loaded, an output cannot be written, or the upload fails.
pub async fn enrich_plots(
    config: &RunConfig,
    options: RunOptions,
) -> Result<CommandSummary, PipelineError> {
    let mut report = QualityReport::new();
    let plots = inputs::plots(config, &mut report)?;
    let properties = inputs::plot_properties(config, &plots, &mut report)?;

    let emitter = Emitter::new(&config.store.iri_base);
    let mut quads = emitter.site_areas(&plots);
    quads.extend(emitter.neighbours(&properties.links));
    quads.extend(emitter.residential_properties(&properties.residential));
    quads.extend(emitter.road_properties(&properties.roads));

    publish(
        config,
        options,
        Command::EnrichPlots,
        &config.store.namespace,
        &quads,
        &report,
    )
    .await
}

/// Publishes type-based regulations and links them to plots of the
/// regulated use types, or allowed to take one of them as a residential
/// programme.
///
/// # Errors
///
/// Returns [`PipelineError`] if an input cannot be loaded, an output
/// cannot be written, or the upload fails.
pub async fn instantiate_type_regulations(
    config: &RunConfig,
    options: RunOptions,
    progress: &dyn ProgressCallback,
) -> Result<CommandSummary, PipelineError> {
    let mut report = QualityReport::new();
    let records = inputs::type_records(config, &mut report)?;
    let plots = inputs::plots(config, &mut report)?;
    let layers = inputs::layers(config, &mut report)?;
    let overlay = resolve_overlay(&plots, &layers, &mut report, progress)?;
    let properties = inputs::plot_properties(config, &plots, &mut report)?;

    let themes = inputs::themes(config);
    let surroundings = Surroundings::new(
        &overlay,
        &themes,
        &layers,
        &config.enrichment.programme_field,
        &properties.links,
    );
    let allowed = residential_types(
        &plots,
        &properties.residential,
        &surroundings,
        &properties.major_roads(config),
        &config.gfa.residential_zones,
    );

    let regulated: Vec<UseType> = records
        .iter()
        .map(|r| r.use_type.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let emitter = Emitter::new(&config.store.iri_base);
    let mut quads = emitter.type_regulations(&records);
    quads.extend(emitter.type_links(&plots, &regulated, &allowed));

    publish(
        config,
        options,
        Command::InstantiateTypeRegulations,
        &config.store.namespace,
        &quads,
        &report,
    )
    .await
}

/// Estimates the allowable GFA of every plot and publishes it.
///
/// With `scenario`, the configured scenario layer is replaced by its
/// alternate, results go to `gfa_results_scenario.csv` and the quads to
/// the scenario namespace.
///
/// # Errors
///
/// Returns [`PipelineError`] if an input cannot be loaded, an output
/// cannot be written, or the upload fails.
pub async fn estimate_gfa(
    config: &RunConfig,
    options: RunOptions,
    scenario: bool,
    progress: &dyn ProgressCallback,
) -> Result<CommandSummary, PipelineError> {
    let mut report = QualityReport::new();
    let plots = inputs::plots(config, &mut report)?;
    let layers = inputs::layers(config, &mut report)?;
    let area = inputs::area_records(config, &mut report)?;
    let types = inputs::type_records(config, &mut report)?;
    let index = RegulationIndex::new(&area, &types);
    let overlay = resolve_overlay(&plots, &layers, &mut report, progress)?;

    let themes = inputs::themes(config);
    let links = neighbour_links(&plots, config.enrichment.neighbour_distance);
    let surroundings = Surroundings::new(
        &overlay,
        &themes,
        &layers,
        &config.enrichment.programme_field,
        &links,
    );
    let contexts = context_gprs(&plots, &surroundings, &index, &config.gfa.context_gpr);

    let (command, results, label) = if scenario {
        let alternate = inputs::alternate_layer(config, &mut report)?;
        let alternate_overlay = resolve_layer(&plots, &alternate, &mut report, progress)?;
        let results = run_scenario(
            &overlay,
            &alternate.id,
            &alternate_overlay,
            &plots,
            &index,
            &contexts,
            &config.gfa,
            &mut report,
            progress,
        );
        (Command::EstimateGfaScenario, results, Some(alternate.id.to_string()))
    } else {
        let mut bundles = link(&overlay, &plots, &index, &mut report);
        apply_context_gprs(&mut bundles, &contexts);
        let results = estimate(&bundles, &config.gfa, &mut report, progress);
        (Command::EstimateGfa, results, None)
    };

    let outputs = Outputs::prepare(&config.paths.output_dir)?;
    let results_file = if scenario { GFA_RESULTS_SCENARIO } else { GFA_RESULTS };
    write_gfa_results(&outputs.path(results_file), &results)?;

    let emitter = Emitter::new(&config.store.iri_base);
    let mut quads: QuadSet = emitter.gfa_results(&results, label.as_deref());
    quads.extend(emitter.context_gprs(&contexts));
    let namespace = if scenario {
        &config.store.scenario_namespace
    } else {
        &config.store.namespace
    };

    publish(config, options, command, namespace, &quads, &report).await
}

/// Plots with a dominant zone in `layer` in any of `overlays`.
fn plots_in_layer(layer: &LayerId, overlays: &[&PlotOverlayResult]) -> BTreeSet<PlotId> {
    overlays
        .iter()
        .flat_map(|overlay| overlay.iter())
        .filter(|(_, layers)| {
            layers
                .get(layer)
                .is_some_and(|a| matches!(a, ZoneAssignment::Dominant { .. }))
        })
        .map(|(plot, _)| plot.clone())
        .collect()
}

/// Writes the regulation overview, GFA overview and, when scenario
/// results exist, the scenario difference table.
///
/// Reads the result tables written by [`estimate_gfa`].
///
/// # Errors
///
/// Returns [`PipelineError`] if an input or result table cannot be read
/// or a report cannot be written.
pub fn report(
    config: &RunConfig,
    progress: &dyn ProgressCallback,
) -> Result<CommandSummary, PipelineError> {
    let mut report = QualityReport::new();
    let plots = inputs::plots(config, &mut report)?;
    let layers = inputs::layers(config, &mut report)?;
    let area = inputs::area_records(config, &mut report)?;
    let overlay = resolve_overlay(&plots, &layers, &mut report, progress)?;

    let outputs = Outputs::prepare(&config.paths.output_dir)?;
    let generated_at = Utc::now();

    write_csv(
        &outputs.path(REGULATION_OVERVIEW),
        &regulation_overview(&plots, &layers, &area, &overlay, generated_at),
    )?;

    let baseline = read_gfa_results(&outputs.path(GFA_RESULTS))?;
    write_csv(
        &outputs.path(GFA_OVERVIEW),
        &gfa_overview(&plots, &baseline, generated_at),
    )?;

    let scenario_path = outputs.path(GFA_RESULTS_SCENARIO);
    if scenario_path.exists() {
        let scenario = read_gfa_results(&scenario_path)?;
        let scope = match &config.scenario {
            Some(_) => {
                let alternate = inputs::alternate_layer(config, &mut report)?;
                let alternate_overlay = resolve_layer(&plots, &alternate, &mut report, progress)?;
                Some(plots_in_layer(&alternate.id, &[&overlay, &alternate_overlay]))
            }
            None => None,
        };
        write_csv(
            &outputs.path(SCENARIO_DIFFERENCE),
            &scenario_difference(&baseline, &scenario, &plots, scope.as_ref(), generated_at),
        )?;
    } else {
        log::info!("No scenario results; skipping {SCENARIO_DIFFERENCE}");
    }

    write_quality_report(&outputs.quality_report(Command::Report), &report)?;

    Ok(CommandSummary {
        command: Command::Report,
        quads: 0,
        uploaded: 0,
        issues: report.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use plot_gfa_overlay::NullProgress;
    use plot_gfa_zoning_models::GfaStatus;

    use super::*;

    fn square(x0: f64, x1: f64) -> String {
        format!("[[[{x0},0],[{x1},0],[{x1},100],[{x0},100],[{x0},0]]]")
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn fixture(name: &str) -> (PathBuf, RunConfig) {
        let dir = std::env::temp_dir().join(format!(
            "plot_gfa_pipeline_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let plots = write(
            &dir,
            "plots.geojson",
            &format!(
                r#"{{"type": "FeatureCollection", "features": [
                  {{"type": "Feature",
                    "properties": {{"plot_id": "p1", "zone": "RESIDENTIAL", "use_type": "Flat", "gpr": 2.8}},
                    "geometry": {{"type": "Polygon", "coordinates": {}}}}},
                  {{"type": "Feature",
                    "properties": {{"plot_id": "p2", "zone": "COMMERCIAL"}},
                    "geometry": {{"type": "Polygon", "coordinates": {}}}}}
                ]}}"#,
                square(0.0, 100.0),
                square(101.0, 151.0)
            ),
        );
        let zone = |id: &str| {
            format!(
                r#"{{"type": "FeatureCollection", "features": [
                  {{"type": "Feature", "properties": {{"zone_id": "{id}"}},
                    "geometry": {{"type": "Polygon", "coordinates": {}}}}}
                ]}}"#,
                square(-10.0, 300.0)
            )
        };
        let height = write(&dir, "height.geojson", &zone("h1"));
        let relaxed = write(&dir, "height_relaxed.geojson", &zone("h2"));
        let area = write(
            &dir,
            "area.csv",
            "Layer,Zone,Max Storeys,Site Coverage\nheight,h1,10,50%\nheight,h2,20,50%\n",
        );
        let types = write(&dir, "types.csv", "Use Type,Storeys,Floor Area\nFlat,1-10,2000\n");
        let output = dir.join("out");

        let toml = format!(
            r#"
            [paths]
            plots = "{}"
            area_regulations = "{}"
            type_regulations = "{}"
            output_dir = "{}"

            [[layers]]
            name = "height"
            theme = "height_control"
            path = "{}"

            [scenario]
            layer = "height"
            path = "{}"
            "#,
            plots.display(),
            area.display(),
            types.display(),
            output.display(),
            height.display(),
            relaxed.display()
        );

        (output, RunConfig::parse(&toml).unwrap())
    }

    fn offline() -> RunOptions {
        RunOptions { upload: false }
    }

    fn gfa_of(results: &[plot_gfa_zoning_models::AllowableGfaResult], plot: &str) -> f64 {
        results
            .iter()
            .find(|r| r.plot.as_str() == plot)
            .and_then(|r| r.allowable_gfa)
            .unwrap()
    }

    #[tokio::test]
    async fn baseline_and_scenario_estimates() {
        let (out, config) = fixture("estimate");

        let summary = estimate_gfa(&config, offline(), false, &NullProgress)
            .await
            .unwrap();
        assert_eq!(summary.command, Command::EstimateGfa);
        assert!(summary.quads > 0);
        assert_eq!(summary.uploaded, 0);

        let baseline = read_gfa_results(&out.join(GFA_RESULTS)).unwrap();
        assert_eq!(baseline.len(), 2);
        // p1: min(2.8 * 10000, 0.5 * 10 * 10000) = 28000 vs 10 * 2000 = 20000
        assert!((gfa_of(&baseline, "p1") - 20_000.0).abs() < 1e-6);
        assert!(baseline.iter().all(|r| r.status == GfaStatus::Ok));
        // p2: 0.5 * 10 * 5000
        assert!((gfa_of(&baseline, "p2") - 25_000.0).abs() < 1e-6);

        estimate_gfa(&config, offline(), true, &NullProgress)
            .await
            .unwrap();
        let scenario = read_gfa_results(&out.join(GFA_RESULTS_SCENARIO)).unwrap();
        assert!((gfa_of(&scenario, "p1") - 20_000.0).abs() < 1e-6);
        assert!((gfa_of(&scenario, "p2") - 50_000.0).abs() < 1e-6);

        assert!(out.join("output_estimate_gfa.nq").exists());
        assert!(out.join("output_estimate_gfa_scenario.nq").exists());
        assert!(out.join("estimate_gfa_quality_report.csv").exists());

        let summary = report(&config, &NullProgress).unwrap();
        assert_eq!(summary.quads, 0);
        let difference = std::fs::read_to_string(out.join(SCENARIO_DIFFERENCE)).unwrap();
        assert!(difference.contains("total_gfa_gain_m2,25000"));
        assert!(difference.contains("affected_plots,1"));
        assert!(out.join(REGULATION_OVERVIEW).exists());
        assert!(out.join(GFA_OVERVIEW).exists());
    }

    #[tokio::test]
    async fn publishing_commands_write_identical_quads_on_rerun() {
        let (out, config) = fixture("rerun");

        for _ in 0..2 {
            instantiate_area_regulations(&config, offline(), &NullProgress)
                .await
                .unwrap();
        }
        let area = std::fs::read_to_string(out.join("output_instantiate_area_regulations.nq"))
            .unwrap();
        assert!(area.contains("appliesTo"));

        let first = instantiate_type_regulations(&config, offline(), &NullProgress)
            .await
            .unwrap();
        let type_quads =
            std::fs::read_to_string(out.join("output_instantiate_type_regulations.nq")).unwrap();
        let second = instantiate_type_regulations(&config, offline(), &NullProgress)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(
            type_quads,
            std::fs::read_to_string(out.join("output_instantiate_type_regulations.nq")).unwrap()
        );

        let enriched = enrich_plots(&config, offline()).await.unwrap();
        assert!(enriched.quads > 0);
        let enrichment = std::fs::read_to_string(out.join("output_enrich_plots.nq")).unwrap();
        // The plots are 1 m apart, within the default neighbour distance.
        assert!(enrichment.contains("hasNeighbour"));
        // p1 is the only residential plot, so it lies on its area's edge.
        assert!(enrichment.contains("isAtResidentialFringe"));
        assert!(!enrichment.contains("hasRoadCategory"));

        let init = init_namespaces(&config, offline()).await.unwrap();
        assert_eq!(init.quads, 0);
    }

    #[tokio::test]
    async fn institution_next_to_dense_housing_takes_context_ratio() {
        let (out, config) = fixture("context");
        let plots = std::fs::read_to_string(&config.paths.plots).unwrap();
        std::fs::write(
            &config.paths.plots,
            plots.replace("COMMERCIAL", "PLACE OF WORSHIP"),
        )
        .unwrap();

        estimate_gfa(&config, offline(), false, &NullProgress)
            .await
            .unwrap();
        let baseline = read_gfa_results(&out.join(GFA_RESULTS)).unwrap();
        // p2 borrows ratio 1.4 from its denser neighbour p1: 1.4 * 5000
        assert!(gfa_of(&baseline, "p2") <= 7_000.0 + 1e-6);
        assert!((gfa_of(&baseline, "p1") - 20_000.0).abs() < 1e-6);

        let quads = std::fs::read_to_string(out.join("output_estimate_gfa.nq")).unwrap();
        assert!(quads.contains("hasContextBasis"));
        assert!(quads.contains("\"surroundings\""));
    }

    #[tokio::test]
    async fn scenario_without_section_fails() {
        let (_, mut config) = fixture("no_scenario");
        config.scenario = None;
        assert!(matches!(
            estimate_gfa(&config, offline(), true, &NullProgress).await,
            Err(PipelineError::NoScenario)
        ));
    }
}
