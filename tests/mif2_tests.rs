use eyre::Result;
use pompcore::models::death::PureDeath;
use pompcore::prelude::*;

const TRUE_MU: f64 = 0.3;
const TRUE_RHO: f64 = 0.7;

fn setup() -> Result<(PureDeath, Observations)> {
    let model = PureDeath::new();
    let truth = model
        .spec()
        .parameter_vector(&[("mu", TRUE_MU), ("rho", TRUE_RHO), ("N0", 100.0)])?;
    let times: Vec<f64> = (1..=8).map(|t| t as f64 * 0.5).collect();
    let sim = simulate(&model, &truth, 0.0, &times, &mut task_rng(31, 0))?;
    Ok((model, sim.observations))
}

fn mif2<'a>(model: &'a PureDeath, obs: &'a Observations, iterations: usize) -> Result<Mif2<'a, PureDeath>> {
    let start = start(model)?;
    let filter = ParticleFilter::new(model, obs, 1000)?;
    let rw = RandomWalk::from_names(&start, &[("mu", 0.1, false), ("rho", 0.1, false)])?;
    let transforms = ParameterTransforms::from_names(&start, &[("mu", Transform::Log), ("rho", Transform::Logit)])?;
    Ok(Mif2::new(
        filter,
        iterations,
        CoolingSchedule::geometric(0.5, 20)?,
        rw,
        transforms,
    )?)
}

/// Row-by-row equality, treating the NaN log-likelihood of the starting row as equal to itself
fn same_traces(a: &[TraceRow], b: &[TraceRow]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.iteration == y.iteration
                && x.params == y.params
                && x.loglik.to_bits() == y.loglik.to_bits()
                && x.cooling.to_bits() == y.cooling.to_bits()
        })
}

fn start(model: &PureDeath) -> Result<ParameterVector> {
    Ok(model
        .spec()
        .parameter_vector(&[("mu", 0.5), ("rho", 0.5), ("N0", 100.0)])?)
}

#[test]
fn test_if2_climbs_the_likelihood() -> Result<()> {
    let (model, obs) = setup()?;
    let start = start(&model)?;
    let fitted = mif2(&model, &obs, 30)?.run(&start, &mut task_rng(5, 0))?;

    let before = model.exact_loglik(&start, &obs)?;
    let after = model.exact_loglik(fitted.estimate(), &obs)?;
    assert!(after > before + 1.0, "exact log-likelihood {} -> {}", before, after);

    let mu = fitted.estimate().get("mu").unwrap();
    assert!((mu / TRUE_MU).ln().abs() < (0.5 / TRUE_MU).ln().abs());
    Ok(())
}

#[test]
fn test_traces_and_fixed_parameters() -> Result<()> {
    let (model, obs) = setup()?;
    let start = start(&model)?;
    let fitted = mif2(&model, &obs, 5)?.run(&start, &mut task_rng(6, 0))?;

    let traces = fitted.traces();
    assert_eq!(traces.len(), 6);
    assert_eq!(traces[0].iteration, 0);
    assert!(traces[0].loglik.is_nan());
    assert_eq!(traces[0].params, start);
    for (m, row) in traces.iter().enumerate().skip(1) {
        assert_eq!(row.iteration, m);
        assert!(row.loglik.is_finite());
        assert_eq!(row.params.get("N0"), Some(100.0));
        let rho = row.params.get("rho").unwrap();
        assert!(rho > 0.0 && rho < 1.0);
    }
    assert_eq!(fitted.iterations(), 5);
    assert_eq!(fitted.swarm().len(), 1000);
    assert_eq!(fitted.loglik(), traces[5].loglik);
    assert_eq!(&traces[5].params, fitted.estimate());
    Ok(())
}

#[test]
fn test_cooling_in_traces_is_non_increasing() -> Result<()> {
    let (model, obs) = setup()?;
    let fitted = mif2(&model, &obs, 25)?.run(&start(&model)?, &mut task_rng(7, 0))?;
    let cooling: Vec<f64> = fitted.traces()[1..].iter().map(|r| r.cooling).collect();
    assert_eq!(cooling[0], 1.0);
    assert!(cooling.windows(2).all(|w| w[1] < w[0]));
    // Iteration 21 starts at iteration index 20, the reference
    assert!((cooling[20] - 0.5).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_continue_from_extends_the_run() -> Result<()> {
    let (model, obs) = setup()?;
    let algorithm = mif2(&model, &obs, 4)?;
    let first = algorithm.run(&start(&model)?, &mut task_rng(8, 0))?;
    let second = algorithm.continue_from(first.clone(), &mut task_rng(8, 1))?;

    assert_eq!(second.iterations(), 8);
    assert_eq!(second.traces().len(), 9);
    assert!(same_traces(&second.traces()[..5], first.traces()));
    assert!((second.traces()[5].cooling - algorithm.cooling().magnitude(4)).abs() < 1e-15);
    Ok(())
}

#[test]
fn test_reproducible_and_execution_independent() -> Result<()> {
    let (model, obs) = setup()?;
    let start = start(&model)?;
    let algorithm = mif2(&model, &obs, 3)?;
    let a = algorithm.run(&start, &mut task_rng(9, 0))?;
    let b = algorithm.run(&start, &mut task_rng(9, 0))?;
    assert_eq!(a.estimate(), b.estimate());

    let sequential = Mif2::new(
        ParticleFilter::new(&model, &obs, 1000)?.parallel(false),
        3,
        *algorithm.cooling(),
        RandomWalk::from_names(&start, &[("mu", 0.1, false), ("rho", 0.1, false)])?,
        algorithm.transforms().clone(),
    )?;
    let c = sequential.run(&start, &mut task_rng(9, 0))?;
    assert_eq!(a.estimate(), c.estimate());
    assert!(same_traces(a.traces(), c.traces()));
    Ok(())
}

#[test]
fn test_start_outside_support_fails() -> Result<()> {
    let (model, obs) = setup()?;
    let mut start = start(&model)?;
    start.set("rho", 1.5)?;
    let result = mif2(&model, &obs, 2)?.run(&start, &mut task_rng(1, 0));
    assert!(matches!(result, Err(PompError::Domain(_))));
    Ok(())
}

#[test]
fn test_initial_value_parameters_freeze_after_first_step() -> Result<()> {
    let (model, obs) = setup()?;
    let start = start(&model)?;
    let filter = ParticleFilter::new(&model, &obs, 100)?;
    // Only rho moves, and only before the first observation
    let rw = RandomWalk::from_names(&start, &[("rho", 0.5, true)])?;
    let transforms = ParameterTransforms::from_names(&start, &[("rho", Transform::Logit)])?;
    let algorithm = Mif2::new(filter, 1, CoolingSchedule::default(), rw, transforms)?;
    let fitted = algorithm.run(&start, &mut task_rng(2, 0))?;

    assert!(fitted.swarm().iter().all(|p| p.get("mu") == Some(0.5)));
    assert!(fitted.swarm().iter().any(|p| p.get("rho") != Some(0.5)));
    Ok(())
}
