use eyre::Result;
use pompcore::models::death::PureDeath;
use pompcore::prelude::*;
use pompcore::routines::settings::Parameter;

fn data(model: &PureDeath) -> Result<Observations> {
    let truth = model
        .spec()
        .parameter_vector(&[("mu", 0.3), ("rho", 0.7), ("N0", 100.0)])?;
    let times: Vec<f64> = (1..=6).map(|t| t as f64 * 0.5).collect();
    Ok(simulate(model, &truth, 0.0, &times, &mut task_rng(77, 0))?.observations)
}

fn search<'a>(model: &'a PureDeath, obs: &'a Observations) -> Result<GlobalSearch<'a, PureDeath>> {
    let layout = model
        .spec()
        .parameter_vector(&[("mu", 0.3), ("rho", 0.7), ("N0", 100.0)])?;
    let filter = ParticleFilter::new(model, obs, 500)?;
    let evaluation = filter.with_particles(1000)?;
    let mif2 = Mif2::new(
        filter,
        8,
        CoolingSchedule::geometric(0.5, 10)?,
        RandomWalk::from_names(&layout, &[("mu", 0.05, false), ("rho", 0.05, false)])?,
        ParameterTransforms::from_names(&layout, &[("mu", Transform::Log), ("rho", Transform::Logit)])?,
    )?;
    Ok(GlobalSearch::new(mif2, evaluation, 3, 2024)?)
}

fn bounds(model: &PureDeath) -> Result<ParameterBox> {
    Ok(ParameterBox::new(model.spec().parameters())
        .range("mu", 0.25, 0.4)?
        .range("rho", 0.6, 0.8)?
        .fixed("N0", 100.0)?)
}

#[test]
fn test_global_search_returns_one_record_per_guess() -> Result<()> {
    let model = PureDeath::new();
    let obs = data(&model)?;
    let result = search(&model, &obs)?.run(&bounds(&model)?, Sampler::Sobol, 4)?;

    assert_eq!(result.outcomes().len(), 4);
    assert!(result.failures().is_empty());
    for (g, outcome) in result.outcomes().iter().enumerate() {
        assert_eq!(outcome.guess, g);
        assert_eq!(outcome.traces.len(), 9);
        assert_eq!(outcome.traces[0].params, outcome.start);
        let record = outcome.result.as_ref().unwrap();
        assert!(record.loglik.is_finite());
        assert!(record.loglik_se >= 0.0);
        assert_eq!(record.params.get("N0"), Some(100.0));
    }

    let sorted = result.sorted();
    assert!(sorted.windows(2).all(|w| w[0].loglik >= w[1].loglik));
    assert_eq!(result.best(), sorted.first().cloned());
    Ok(())
}

#[test]
fn test_search_is_reproducible_in_any_execution_order() -> Result<()> {
    let model = PureDeath::new();
    let obs = data(&model)?;
    let bounds = bounds(&model)?;
    let parallel = search(&model, &obs)?.run(&bounds, Sampler::Latin, 3)?;
    let sequential = search(&model, &obs)?.parallel(false).run(&bounds, Sampler::Latin, 3)?;
    assert_eq!(parallel.records(), sequential.records());
    Ok(())
}

#[test]
fn test_failed_guess_does_not_abort_siblings() -> Result<()> {
    let model = PureDeath::new();
    let obs = data(&model)?;
    let good = model
        .spec()
        .parameter_vector(&[("mu", 0.35), ("rho", 0.6), ("N0", 100.0)])?;
    // rho outside the support of its logit transform
    let bad = good.with_values(vec![0.35, 1.4, 100.0])?;

    let result = search(&model, &obs)?.run_from_starts(vec![good.clone(), bad, good]);
    assert_eq!(result.records().len(), 2);
    let failures = result.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, 1);
    assert!(matches!(failures[0].1, PompError::Domain(_)));
    assert!(result.outcomes()[1].traces.is_empty());
    Ok(())
}

#[test]
fn test_fit_writes_outputs() -> Result<()> {
    let model = PureDeath::new();
    let obs = data(&model)?;
    let folder = std::env::temp_dir().join(format!("pompcore-fit-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&folder);

    let mut settings = Settings::new();
    settings.config.particles = 300;
    settings.config.iterations = 3;
    settings.config.replicates = 2;
    settings.search.guesses = 2;
    settings.search.particles = 300;
    settings.log.write = false;
    settings.output.path = folder.to_string_lossy().to_string();
    settings.parameters = vec![
        Parameter::new("mu", 0.25, 0.4, Transform::Log, 0.05)?,
        Parameter::new("rho", 0.6, 0.8, Transform::Logit, 0.05)?,
        Parameter::fixed("N0", 100.0),
    ];

    let result = pompcore::fit(&model, &obs, &settings)?;
    assert_eq!(result.records().len(), 2);
    assert!(folder.join("settings.json").exists());
    assert!(folder.join("traces.csv").exists());

    // A second search appends to the same result file
    pompcore::fit(&model, &obs, &settings)?;
    let stored = CsvStore::new(folder.join("results.csv")).read_all()?;
    assert_eq!(stored.len(), 4);
    assert_eq!(stored[0], result.records()[0]);

    let traces = std::fs::read_to_string(folder.join("traces.csv"))?;
    assert!(traces.starts_with("guess,iteration,loglik,cooling,mu,rho,N0"));
    assert_eq!(traces.lines().count(), 1 + 2 * 4);

    std::fs::remove_dir_all(folder)?;
    Ok(())
}

#[test]
fn test_evaluate_entrypoint() -> Result<()> {
    let model = PureDeath::new();
    let obs = data(&model)?;
    let params = model
        .spec()
        .parameter_vector(&[("mu", 0.3), ("rho", 0.7), ("N0", 100.0)])?;
    let mut settings = Settings::new();
    settings.log.write = false;
    settings.output.write = false;
    settings.search.particles = 2000;
    settings.config.replicates = 4;

    let replicates = pompcore::evaluate(&model, &obs, &params, &settings)?;
    let exact = model.exact_loglik(&params, &obs)?;
    assert_eq!(replicates.logliks().len(), 4);
    assert!((replicates.loglik() - exact).abs() < 0.3);
    Ok(())
}

#[test]
fn test_profile_design_feeds_local_searches() -> Result<()> {
    let model = PureDeath::new();
    let obs = data(&model)?;
    let starts = profile_design(&bounds(&model)?, "rho", 2, 1, Sampler::Uniform, 5)?;
    assert_eq!(starts.len(), 2);
    let result = search(&model, &obs)?.run_from_starts(starts);
    assert_eq!(result.records().len(), 2);
    Ok(())
}
