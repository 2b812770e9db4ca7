use csv::WriterBuilder;
use eyre::{bail, Result};

use crate::algorithms::pfilter::PfilterOutput;
use crate::algorithms::search::SearchResult;
use crate::routines::output::OutputFile;

/// Writes the IF2 traces of every guess to `traces.csv`
///
/// One row per guess and iteration: `guess, iteration, loglik, cooling`, then one column per parameter. Iteration
/// `0` is the starting point.
pub fn write_traces(folder: &str, result: &SearchResult) -> Result<()> {
    let Some(names) = result
        .outcomes()
        .iter()
        .find_map(|o| o.traces.first().map(|row| row.params.names().to_vec()))
    else {
        tracing::debug!("No IF2 traces to write");
        return Ok(());
    };

    let outputfile = OutputFile::new(folder, "traces.csv")?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(outputfile.file());

    let mut header = vec![
        "guess".to_string(),
        "iteration".to_string(),
        "loglik".to_string(),
        "cooling".to_string(),
    ];
    header.extend(names);
    writer.write_record(&header)?;

    for outcome in result.outcomes() {
        for row in &outcome.traces {
            writer.write_field(outcome.guess.to_string())?;
            writer.write_field(row.iteration.to_string())?;
            writer.write_field(row.loglik.to_string())?;
            writer.write_field(row.cooling.to_string())?;
            for value in row.params.values() {
                writer.write_field(value.to_string())?;
            }
            writer.write_record(None::<&[u8]>)?;
        }
    }
    writer.flush()?;
    tracing::debug!("IF2 traces written to {:?}", outputfile.relative_path());
    Ok(())
}

/// Writes the per-observation diagnostics of one filter run to `pfilter.csv`
///
/// Columns are `step, time, cond_loglik, ess`, then the filter mean of every state variable.
pub fn write_pfilter(folder: &str, output: &PfilterOutput, state_names: &[String]) -> Result<()> {
    if let Some(mean) = output.filter_mean().first() {
        if mean.len() != state_names.len() {
            bail!(
                "{} state names given for filter means of length {}",
                state_names.len(),
                mean.len()
            );
        }
    }

    let outputfile = OutputFile::new(folder, "pfilter.csv")?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(outputfile.file());

    let mut header = vec![
        "step".to_string(),
        "time".to_string(),
        "cond_loglik".to_string(),
        "ess".to_string(),
    ];
    header.extend(state_names.iter().cloned());
    writer.write_record(&header)?;

    for step in 0..output.times().len() {
        writer.write_field(step.to_string())?;
        writer.write_field(output.times()[step].to_string())?;
        writer.write_field(output.cond_loglik()[step].to_string())?;
        writer.write_field(output.ess()[step].to_string())?;
        for value in &output.filter_mean()[step] {
            writer.write_field(value.to_string())?;
        }
        writer.write_record(None::<&[u8]>)?;
    }
    writer.flush()?;
    tracing::debug!("Filter diagnostics written to {:?}", outputfile.relative_path());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::pfilter::ParticleFilter;
    use crate::model::Model;
    use crate::models::death::PureDeath;
    use crate::routines::rng::task_rng;
    use crate::routines::simulation::simulate;

    #[test]
    fn test_write_pfilter() {
        let model = PureDeath::new();
        let p = model
            .spec()
            .parameter_vector(&[("mu", 0.1), ("rho", 0.7), ("N0", 50.0)])
            .unwrap();
        let sim = simulate(&model, &p, 0.0, &[1.0, 2.0, 3.0], &mut task_rng(1, 0)).unwrap();
        let filter = ParticleFilter::new(&model, &sim.observations, 100).unwrap();
        let output = filter.run(&p, &mut task_rng(1, 1)).unwrap();

        let folder = std::env::temp_dir().join(format!("pompcore-pfilter-{}", std::process::id()));
        let folder = folder.to_string_lossy().to_string();
        write_pfilter(&folder, &output, model.spec().states()).unwrap();

        let written = std::fs::read_to_string(std::path::Path::new(&folder).join("pfilter.csv")).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("step,time,cond_loglik,ess,N"));
        assert_eq!(lines.count(), 3);

        assert!(write_pfilter(&folder, &output, &[]).is_err());
        std::fs::remove_dir_all(folder).unwrap();
    }
}
