use std::time::Instant;

use eyre::{Result, WrapErr};

use crate::algorithms::mif2::Mif2;
use crate::algorithms::pfilter::ParticleFilter;
use crate::algorithms::replicate::{replicate_pfilter, Replicates};
use crate::algorithms::search::{GlobalSearch, SearchResult};
use crate::model::{Model, Observations};
use crate::routines::logger;
use crate::routines::output::write_search_outputs;
use crate::routines::settings::Settings;
use crate::structs::parameters::ParameterVector;

/// Primary entrypoint for pompcore
///
/// Runs a global search as configured in the [Settings]: draws `search.guesses` starting points from the parameter
/// box, runs IF2 from each, evaluates every estimate with `config.replicates` clean filter runs, and writes the
/// outputs if enabled.
pub fn fit<M: Model>(model: &M, observations: &Observations, settings: &Settings) -> Result<SearchResult> {
    let now = Instant::now();
    logger::setup_log(settings)?;
    settings.validate()?;
    tracing::info!("Starting pompcore");
    tracing::info!(
        "Dataset contains {} observations from t = {} to t = {}",
        observations.len(),
        observations.t0(),
        observations.records().last().map(|r| r.time).unwrap_or(observations.t0())
    );

    match settings.output.write {
        true => tracing::info!("Output files will be written to {}", settings.output.path),
        false => tracing::info!(
            "Output files will not be written - set `output.write = true` in the settings to enable output files"
        ),
    }

    let spec = model.spec();
    let bounds = settings.parameter_box(spec)?;
    let filter = ParticleFilter::new(model, observations, settings.config.particles)?
        .parallel(settings.config.parallel);
    let evaluation = filter
        .with_particles(settings.search.particles)?
        .parallel(settings.config.parallel);
    let mif2 = Mif2::new(
        filter,
        settings.config.iterations,
        settings.cooling.schedule()?,
        settings.random_walk(spec)?,
        settings.transforms(spec)?,
    )?;

    let search = GlobalSearch::new(mif2, evaluation, settings.config.replicates, settings.config.seed)?
        .parallel(settings.config.parallel);
    let result = search
        .run(&bounds, settings.search.sampler, settings.search.guesses)
        .wrap_err("Failed to start the global search")?;

    write_search_outputs(settings, &result)?;
    tracing::info!("Total time: {:.2?}", now.elapsed());
    Ok(result)
}

/// Replicated clean likelihood evaluation of one parameter vector
///
/// Runs `config.replicates` independent filters with `search.particles` particles each.
pub fn evaluate<M: Model>(
    model: &M,
    observations: &Observations,
    params: &ParameterVector,
    settings: &Settings,
) -> Result<Replicates> {
    logger::setup_log(settings)?;
    settings.validate()?;
    let filter = ParticleFilter::new(model, observations, settings.search.particles)?
        .parallel(settings.config.parallel);
    let replicates = replicate_pfilter(&filter, params, settings.config.replicates, settings.config.seed)
        .wrap_err_with(|| format!("Failed to evaluate the likelihood at {}", params))?;
    tracing::info!(
        "Log-likelihood at {}: {:.4} (se {:.4}, {} of {} replicates failed)",
        params,
        replicates.loglik(),
        replicates.se(),
        replicates.failures(),
        replicates.logliks().len()
    );
    Ok(replicates)
}
