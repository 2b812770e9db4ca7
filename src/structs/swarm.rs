use crate::error::{PompError, PompResult};
use crate::structs::parameters::ParameterVector;

/// A state vector, ordered as the model's declared state names
pub type State = Vec<f64>;

/// One state vector with the parameter values it is propagated under
///
/// Every particle owns its state and its parameters. Under plain filtering all particles carry equal
/// parameters; under iterated filtering each particle carries its own perturbed copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub state: State,
    pub params: ParameterVector,
}

impl Particle {
    pub fn new(state: State, params: ParameterVector) -> Self {
        Self { state, params }
    }
}

/// An equally weighted particle swarm at a given time
#[derive(Debug, Clone, PartialEq)]
pub struct Swarm {
    time: f64,
    particles: Vec<Particle>,
    initialized: bool,
}

impl Swarm {
    /// A swarm whose states are still to be drawn by the model's initializer at `t0`
    pub fn uninitialized(t0: f64, params: Vec<ParameterVector>) -> PompResult<Self> {
        if params.is_empty() {
            return Err(PompError::domain("a particle swarm needs at least one particle"));
        }
        let particles = params
            .into_iter()
            .map(|p| Particle::new(Vec::new(), p))
            .collect();
        Ok(Self {
            time: t0,
            particles,
            initialized: false,
        })
    }

    /// A swarm of existing particles at `time`
    pub fn from_particles(time: f64, particles: Vec<Particle>) -> PompResult<Self> {
        if particles.is_empty() {
            return Err(PompError::domain("a particle swarm needs at least one particle"));
        }
        Ok(Self {
            time,
            particles,
            initialized: true,
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn into_particles(self) -> Vec<Particle> {
        self.particles
    }

    /// The parameter vectors of all particles
    pub fn params(&self) -> Vec<ParameterVector> {
        self.particles.iter().map(|p| p.params.clone()).collect()
    }

    pub(crate) fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Replaces the swarm by the particles at `indices`, copying every selected particle
    pub(crate) fn select(&mut self, indices: &[usize], time: f64) {
        let selected: Vec<Particle> = indices.iter().map(|&i| self.particles[i].clone()).collect();
        self.particles = selected;
        self.time = time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_copies_particles() {
        let p = ParameterVector::from_pairs(&[("a", 1.0)]).unwrap();
        let particles = vec![
            Particle::new(vec![1.0], p.clone()),
            Particle::new(vec![2.0], p.clone()),
        ];
        let mut swarm = Swarm::from_particles(0.0, particles).unwrap();
        swarm.select(&[1, 1], 1.0);
        assert_eq!(swarm.len(), 2);
        assert_eq!(swarm.time(), 1.0);

        // Duplicated slots are independent values
        swarm.particles_mut()[0].state[0] = 5.0;
        assert_eq!(swarm.particles()[1].state[0], 2.0);
    }

    #[test]
    fn test_empty_swarm_rejected() {
        assert!(Swarm::uninitialized(0.0, vec![]).is_err());
    }
}
