use config::Config as eConfig;
use eyre::{bail, Result, WrapErr};
use serde_derive::{Deserialize, Serialize};

use crate::algorithms::mif2::RandomWalk;
use crate::model::ModelSpec;
use crate::routines::cooling::{CoolingSchedule, CoolingType};
use crate::routines::initialization::{ParameterBox, Sampler};
use crate::routines::output::OutputFile;
use crate::structs::parameters::{ParameterTransforms, Transform};

/// Contains all settings for a pompcore run
#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    /// General configuration settings
    pub config: Config,
    /// Parameters of the model, with their search ranges and perturbations
    pub parameters: Vec<Parameter>,
    /// The IF2 cooling schedule
    pub cooling: Cooling,
    /// Configuration for the global search
    pub search: Search,
    /// Configuration for logging
    pub log: Log,
    /// Configuration for the output files
    pub output: Output,
}

impl Settings {
    pub fn new() -> Self {
        Settings::default()
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        self.cooling.schedule()?;
        self.search.validate()?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            parameter.validate()?;
            if self.parameters[..i].iter().any(|p| p.name == parameter.name) {
                bail!("Parameter '{}' is declared more than once", parameter.name);
            }
        }
        Ok(())
    }

    /// The settings entry for parameter `name`
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    fn ordered<'a>(&'a self, spec: &ModelSpec) -> Result<Vec<&'a Parameter>> {
        let unknown: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| spec.parameter_index(&p.name).is_none())
            .map(|p| p.name.as_str())
            .collect();
        if !unknown.is_empty() {
            bail!("Settings name parameters the model does not declare: {:?}", unknown);
        }
        spec.parameters()
            .iter()
            .map(|name| {
                self.parameter(name)
                    .ok_or_else(|| eyre::eyre!("Parameter '{}' is missing from the settings", name))
            })
            .collect()
    }

    /// Search ranges and fixed values, in the model's parameter order
    pub fn parameter_box(&self, spec: &ModelSpec) -> Result<ParameterBox> {
        let mut bounds = ParameterBox::new(spec.parameters());
        for parameter in self.ordered(spec)? {
            bounds = match (parameter.fixed, parameter.lower, parameter.upper) {
                (Some(value), _, _) => bounds.fixed(&parameter.name, value)?,
                (None, Some(lower), Some(upper)) => bounds.range(&parameter.name, lower, upper)?,
                _ => bail!("Parameter '{}' needs bounds or a fixed value", parameter.name),
            };
        }
        Ok(bounds)
    }

    /// Estimation-scale transforms, in the model's parameter order
    pub fn transforms(&self, spec: &ModelSpec) -> Result<ParameterTransforms> {
        Ok(ParameterTransforms::new(
            self.ordered(spec)?.iter().map(|p| p.transform).collect(),
        ))
    }

    /// Random-walk magnitudes, in the model's parameter order; fixed parameters are not perturbed
    pub fn random_walk(&self, spec: &ModelSpec) -> Result<RandomWalk> {
        let ordered = self.ordered(spec)?;
        let sd = ordered
            .iter()
            .map(|p| if p.fixed.is_some() { 0.0 } else { p.rw_sd })
            .collect();
        let ivp = ordered.iter().map(|p| p.ivp).collect();
        Ok(RandomWalk::new(sd, ivp)?)
    }

    /// Writes a copy of the settings to `settings.json` in the output folder
    pub fn write(&self) -> Result<()> {
        write_settings_to_file(self)
    }
}

/// General configuration settings
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Number of particles used inside IF2
    pub particles: usize,
    /// Number of IF2 iterations per starting point
    pub iterations: usize,
    /// Number of independent filter runs in each likelihood evaluation
    pub replicates: usize,
    /// Master seed for all random-number streams
    pub seed: u64,
    /// If true (default), evaluate particles and independent runs in parallel
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            particles: 2000,
            iterations: 50,
            replicates: 10,
            seed: 347,
            parallel: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.particles == 0 {
            bail!("The number of particles must be at least 1");
        }
        if self.replicates == 0 {
            bail!("The number of replicates must be at least 1");
        }
        Ok(())
    }
}

/// Defines a model parameter
///
/// Estimated parameters are searched over `[lower, upper]` and perturbed by IF2 with standard deviation `rw_sd` on
/// the scale given by `transform`. Parameters with a `fixed` value are held constant.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub rw_sd: f64,
    /// Perturb only before the first observation
    #[serde(default)]
    pub ivp: bool,
    #[serde(default)]
    pub fixed: Option<f64>,
}

impl Parameter {
    /// An estimated parameter
    pub fn new(name: impl Into<String>, lower: f64, upper: f64, transform: Transform, rw_sd: f64) -> Result<Self> {
        let parameter = Self {
            name: name.into(),
            lower: Some(lower),
            upper: Some(upper),
            transform,
            rw_sd,
            ivp: false,
            fixed: None,
        };
        parameter.validate()?;
        Ok(parameter)
    }

    /// A parameter held at `value`
    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            lower: None,
            upper: None,
            transform: Transform::Identity,
            rw_sd: 0.0,
            ivp: false,
            fixed: Some(value),
        }
    }

    /// Perturb this parameter only before the first observation
    pub fn initial_value(mut self) -> Self {
        self.ivp = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rw_sd >= 0.0 && self.rw_sd.is_finite()) {
            bail!(
                "In parameter '{}', the random-walk standard deviation must be non-negative, got {}",
                self.name,
                self.rw_sd
            );
        }
        if let Some(value) = self.fixed {
            if !self.transform.admits(value) {
                bail!(
                    "In parameter '{}', the fixed value {} is outside the support of the {:?} transform",
                    self.name,
                    value,
                    self.transform
                );
            }
            return Ok(());
        }
        let (Some(lower), Some(upper)) = (self.lower, self.upper) else {
            bail!("Parameter '{}' needs both bounds or a fixed value", self.name);
        };
        if lower >= upper {
            bail!(
                "In parameter '{}', lower bound ({}) is not less than upper bound ({})",
                self.name,
                lower,
                upper
            );
        }
        if !self.transform.admits(lower) || !self.transform.admits(upper) {
            bail!(
                "In parameter '{}', the bounds [{}, {}] are outside the support of the {:?} transform",
                self.name,
                lower,
                upper,
                self.transform
            );
        }
        Ok(())
    }
}

/// The IF2 cooling schedule
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Cooling {
    /// Either `geometric` or `hyperbolic`
    #[serde(rename = "type")]
    pub kind: CoolingType,
    /// Fraction of the initial random-walk magnitude left after `reference` iterations
    pub fraction: f64,
    pub reference: usize,
}

impl Default for Cooling {
    fn default() -> Self {
        Cooling {
            kind: CoolingType::Geometric,
            fraction: 0.5,
            reference: 50,
        }
    }
}

impl Cooling {
    pub fn schedule(&self) -> Result<CoolingSchedule> {
        CoolingSchedule::new(self.kind, self.fraction, self.reference).wrap_err("Invalid cooling settings")
    }
}

/// Configuration for the global search
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Search {
    /// Number of starting points
    pub guesses: usize,
    /// The sampler used to draw the starting points
    pub sampler: Sampler,
    /// Number of particles in the clean likelihood evaluations
    pub particles: usize,
}

impl Default for Search {
    fn default() -> Self {
        Search {
            guesses: 20,
            sampler: Sampler::Sobol,
            particles: 5000,
        }
    }
}

impl Search {
    pub fn validate(&self) -> Result<()> {
        if self.particles == 0 {
            bail!("The number of evaluation particles must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Log {
    /// The maximum log level to display
    ///
    /// One of `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// The file to write the log to, inside the output folder
    pub file: String,
    /// Whether to write logs
    ///
    /// If set to `false`, no global subscriber is set. This is useful when the caller installs its own subscriber,
    /// or for benchmarks.
    pub write: bool,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            level: String::from("info"),
            file: String::from("log.txt"),
            write: true,
        }
    }
}

/// Configuration for the output files
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Output {
    /// Whether to write the output files
    pub write: bool,
    /// The (relative) path to write the output files to
    pub path: String,
}

impl Default for Output {
    fn default() -> Self {
        Output {
            write: true,
            path: String::from("outputs/"),
        }
    }
}

impl Output {
    /// Parses the output folder location
    ///
    /// If a `#` symbol is found, it is replaced by the smallest number for which the folder does not exist yet.
    pub fn parse_output_folder(&mut self) -> Result<()> {
        if self.path.is_empty() {
            self.path = Output::default().path;
        }

        let count = self.path.matches('#').count();
        match count {
            0 => Ok(()),
            1 => {
                let mut num = 1;
                while std::path::Path::new(&self.path.replace('#', &num.to_string())).exists() {
                    num += 1;
                }
                self.path = self.path.replace('#', &num.to_string());
                Ok(())
            }
            _ => {
                bail!("Only one `#` symbol is allowed in the output path, got '{}'", self.path)
            }
        }
    }
}

/// Parses the settings from a TOML configuration file
///
/// The settings are validated, the output folder is resolved, and a copy of the settings is written to it.
///
/// Entries in the TOML file may be overridden by environment variables prefixed with `POMPCORE_`, using a single
/// underscore as the separator for nested entries. For example, `POMPCORE_CONFIG_SEED=1` sets the master seed.
pub fn read(path: impl Into<String>) -> Result<Settings> {
    let settings_path = path.into();

    let parsed = eConfig::builder()
        .add_source(config::File::with_name(&settings_path).format(config::FileFormat::Toml))
        .add_source(config::Environment::with_prefix("POMPCORE").separator("_"))
        .build()
        .wrap_err_with(|| format!("Unable to read settings from '{}'", settings_path))?;

    let mut settings: Settings = parsed
        .try_deserialize()
        .wrap_err_with(|| format!("Unable to parse settings in '{}'", settings_path))?;

    settings.validate()?;
    settings.output.parse_output_folder()?;

    if settings.output.write {
        write_settings_to_file(&settings).wrap_err("Could not write settings to file")?;
    }

    Ok(settings)
}

/// Writes a copy of the parsed settings to `settings.json` in the output folder
pub fn write_settings_to_file(settings: &Settings) -> Result<()> {
    let serialized = serde_json::to_string_pretty(settings)?;

    let outputfile = OutputFile::new(settings.output.path.as_str(), "settings.json")?;
    let mut file = outputfile.file_owned();
    std::io::Write::write_all(&mut file, serialized.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ModelSpec {
        ModelSpec::new(&["N"], &["mu", "rho", "N0"], &["reports"])
    }

    fn settings() -> Settings {
        Settings {
            parameters: vec![
                Parameter::new("rho", 0.1, 0.9, Transform::Logit, 0.02).unwrap(),
                Parameter::new("mu", 0.01, 1.0, Transform::Log, 0.05).unwrap(),
                Parameter::fixed("N0", 100.0),
            ],
            ..Settings::default()
        }
    }

    #[test]
    fn test_model_order() {
        let settings = settings();
        let bounds = settings.parameter_box(&spec()).unwrap();
        assert_eq!(bounds.names(), spec().parameters());
        assert_eq!(bounds.free(), vec![0, 1]);

        let transforms = settings.transforms(&spec()).unwrap();
        assert_eq!(transforms.get(0), Transform::Log);
        assert_eq!(transforms.get(1), Transform::Logit);

        let rw = settings.random_walk(&spec()).unwrap();
        assert_eq!(rw.sd(), &[0.05, 0.02, 0.0]);
    }

    #[test]
    fn test_missing_and_unknown_parameters() {
        let mut settings = settings();
        settings.parameters.pop();
        assert!(settings.parameter_box(&spec()).is_err());
        settings.parameters.push(Parameter::fixed("gamma", 1.0));
        assert!(settings.transforms(&spec()).is_err());
    }

    #[test]
    fn test_validation() {
        assert!(settings().validate().is_ok());
        assert!(Parameter::new("a", 1.0, 1.0, Transform::Identity, 0.1).is_err());
        assert!(Parameter::new("a", 0.0, 1.0, Transform::Log, 0.1).is_err());
        assert!(Parameter::new("a", 0.1, 1.0, Transform::Logit, 0.1).is_err());
        assert!(Parameter::new("a", 0.1, 0.9, Transform::Logit, -0.1).is_err());

        let mut settings = settings();
        settings.config.particles = 0;
        assert!(settings.validate().is_err());

        let mut settings = self::settings();
        settings.cooling.fraction = 1.5;
        assert!(settings.validate().is_err());

        let mut settings = self::settings();
        settings.parameters.push(Parameter::fixed("mu", 0.3));
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_output_folder_increment() {
        let mut output = Output {
            write: false,
            path: "pompcore-does-not-exist-#/".to_string(),
        };
        output.parse_output_folder().unwrap();
        assert_eq!(output.path, "pompcore-does-not-exist-1/");

        let mut output = Output {
            write: false,
            path: "a#b#".to_string(),
        };
        assert!(output.parse_output_folder().is_err());
    }
}
