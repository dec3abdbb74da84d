//! The released particles.

use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::action::{ActionContext, ActionError, ActionSet};
use crate::particle::{Mortality, Particle};

/// Particles in release order; a particle's index is its position.
#[derive(Clone, Debug, Default)]
pub struct Population {
    particles: Vec<Particle>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn extend(&mut self, particles: impl IntoIterator<Item = Particle>) {
        self.particles.extend(particles);
    }

    pub fn n_alive(&self) -> usize {
        self.particles.iter().filter(|p| p.is_living()).count()
    }

    /// Number of particles per death cause, living ones under
    /// [`Mortality::Alive`].
    pub fn mortality_counts(&self) -> BTreeMap<Mortality, usize> {
        let mut counts = BTreeMap::new();
        for p in &self.particles {
            *counts.entry(p.death_cause()).or_insert(0) += 1;
        }
        counts
    }

    /// Step every living particle.
    ///
    /// Particles only touch their own state and random stream, so the
    /// parallel path gives the same result as the sequential one.
    pub fn step(&mut self, actions: &ActionSet, ctx: &ActionContext) -> Result<(), ActionError> {
        #[cfg(feature = "parallel")]
        {
            self.particles
                .par_iter_mut()
                .filter(|p| p.is_living())
                .try_for_each(|p| actions.step(p, ctx))
        }

        #[cfg(not(feature = "parallel"))]
        {
            for p in self.particles.iter_mut().filter(|p| p.is_living()) {
                actions.step(p, ctx)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::basin;
    use crate::action::{Advection, AgeMonitoring, CoastlineBehavior, MoveAction};
    use crate::time::Calendar;
    use crate::types::GridPos;
    use crate::zone::ZoneManager;

    #[test]
    fn test_step_and_counts() {
        let ds = basin(0.1, 0.0, 1);
        let zones = ZoneManager::new();
        let actions = ActionSet::new(AgeMonitoring::new(7200.0, false), MoveAction::new(CoastlineBehavior::Beaching))
            .with_action(Advection::default());

        let mut population = Population::new();
        population.extend((0..3).map(|i| Particle::from_grid(i, GridPos::new(5.0, 5.0 + i as f64, 0.0), 0.0, 1)));
        population.particles[2].kill(Mortality::Beached);
        for p in &mut population.particles {
            actions.init_particle(p, &ds, &zones);
        }

        let ctx = ActionContext::new(&ds, &zones, 0.0, 3600.0, Calendar::Gregorian);
        population.step(&actions, &ctx).unwrap();

        let p = &population.particles()[0];
        assert!(p.pos().x > 5.0);
        assert_eq!(p.age(), 3600.0);
        // dead particles are left alone
        assert_eq!(population.particles()[2].age(), 0.0);

        let counts = population.mortality_counts();
        assert_eq!(counts[&Mortality::Alive], 2);
        assert_eq!(counts[&Mortality::Beached], 1);
        assert_eq!(population.n_alive(), 2);
    }
}
