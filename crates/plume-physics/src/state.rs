//! A set of named grids that effects and gravity act on.

use std::collections::BTreeMap;

use plume_core::{PlumeError, Result, VECTOR_DIM};
use plume_field::CenteredGrid;
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::effect::{effect_applied, FieldEffect};
use crate::gravity::Gravity;

/// Name of the grid [`FluidState::apply_gravity`] accelerates.
pub const VELOCITY: &str = "velocity";

/// Simulation grids keyed by name (`density`, `velocity`, `temperature`, ...).
///
/// Updates return a new state; the original is left untouched.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FluidState {
    grids: BTreeMap<String, CenteredGrid>,
}

impl FluidState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a grid.
    pub fn with_grid(mut self, name: impl Into<String>, grid: CenteredGrid) -> Self {
        self.grids.insert(name.into(), grid);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CenteredGrid> {
        self.grids.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.grids.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    /// Applies every effect, in order, to each of its targets present in
    /// this state. Targets without a grid are skipped.
    pub fn apply_effects(&self, effects: &[FieldEffect], dt: f64) -> Result<FluidState> {
        debug!(effects = effects.len(), dt, "applying effects");
        let mut grids = self.grids.clone();
        for effect in effects {
            for target in effect.targets() {
                let Some(grid) = grids.get(target) else {
                    trace!(target = %target, "no grid for effect target");
                    continue;
                };
                let updated = effect_applied(effect, grid, dt)?;
                grids.insert(target.clone(), updated);
            }
        }
        Ok(FluidState { grids })
    }

    /// Accelerates the `velocity` grid by `gravity * dt`.
    pub fn apply_gravity(&self, gravity: &Gravity, dt: f64) -> Result<FluidState> {
        let velocity = self
            .grids
            .get(VELOCITY)
            .ok_or_else(|| PlumeError::invalid("state has no velocity grid"))?;
        if !velocity.shape().contains(VECTOR_DIM) {
            return Err(PlumeError::shape_mismatch(
                VECTOR_DIM,
                "velocity grid needs a vector channel",
            ));
        }
        let acceleration = gravity
            .gravity_tensor(velocity.spatial_rank())?
            .scale(dt)
            .cast(velocity.dtype());
        let accelerated = velocity.with_values(velocity.values().try_add(&acceleration)?)?;
        let mut grids = self.grids.clone();
        grids.insert(VELOCITY.to_string(), accelerated);
        Ok(FluidState { grids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{inflow, EffectMode};
    use plume_core::{spatial, Dim, Extrapolation, Tensor};
    use plume_field::Field;
    use plume_geom::Cuboid;

    fn scalar_grid(value: f64) -> CenteredGrid {
        CenteredGrid::uniform(
            spatial(&[("x", 2), ("y", 2)]),
            Tensor::vector(&[0.0, 0.0]),
            Tensor::vector(&[2.0, 2.0]),
            value,
            Extrapolation::Zero,
        )
        .unwrap()
    }

    fn velocity_grid() -> CenteredGrid {
        let grid = scalar_grid(0.0);
        let values = grid.values().expand(Dim::vector(2)).unwrap();
        grid.with_values(values).unwrap()
    }

    #[test]
    fn test_apply_effects_to_present_targets() {
        let state = FluidState::new().with_grid("density", scalar_grid(1.0));
        let everywhere = Cuboid::from_bounds(Tensor::vector(&[0.0, 0.0]), Tensor::vector(&[2.0, 2.0])).unwrap();
        let heat = FieldEffect::new(Field::from(Tensor::scalar(1.0)), &["temperature"], EffectMode::Add).unwrap();
        let next = state.apply_effects(&[inflow(everywhere, 2.0), heat], 0.5).unwrap();
        assert_eq!(next.get("density").unwrap().values().values(), vec![2.0; 4]);
        assert!(next.get("temperature").is_none());
        assert_eq!(state.get("density").unwrap().values().values(), vec![1.0; 4]);
    }

    #[test]
    fn test_effects_apply_in_order() {
        let state = FluidState::new().with_grid("density", scalar_grid(0.0));
        let add = FieldEffect::new(Tensor::scalar(1.0), &["density"], EffectMode::Add).unwrap();
        let twice = state.apply_effects(&[add.clone(), add], 1.0).unwrap();
        assert_eq!(twice.get("density").unwrap().values().values(), vec![2.0; 4]);
    }

    #[test]
    fn test_apply_gravity() {
        let state = FluidState::new().with_grid(VELOCITY, velocity_grid());
        let down = Gravity::downward(-9.81, 2).unwrap();
        let next = state.apply_gravity(&down, 0.1).unwrap();
        let velocity = next.get(VELOCITY).unwrap().values();
        assert_eq!(velocity.component("x").unwrap().sum(), 0.0);
        let vy = velocity.component("y").unwrap().values();
        assert!(vy.iter().all(|v| (v + 0.981).abs() < 1e-12));
    }

    #[test]
    fn test_gravity_steps_compose() {
        let state = FluidState::new().with_grid(VELOCITY, velocity_grid());
        let g1 = Gravity::new(1.0);
        let g2 = Gravity::vector(&[0.0, -2.0]).unwrap();
        let stepwise = state
            .apply_gravity(&g1, 0.5)
            .unwrap()
            .apply_gravity(&g2, 0.5)
            .unwrap();
        let combined = state.apply_gravity(&g1.try_add(&g2).unwrap(), 0.5).unwrap();
        assert!(stepwise
            .get(VELOCITY)
            .unwrap()
            .values()
            .all_close(combined.get(VELOCITY).unwrap().values(), 1e-12));
    }

    #[test]
    fn test_apply_gravity_requires_velocity() {
        let state = FluidState::new().with_grid("density", scalar_grid(0.0));
        assert!(matches!(
            state.apply_gravity(&Gravity::default(), 0.1),
            Err(PlumeError::InvalidConfiguration(_))
        ));
        let scalar_velocity = FluidState::new().with_grid(VELOCITY, scalar_grid(0.0));
        assert!(matches!(
            scalar_velocity.apply_gravity(&Gravity::default(), 0.1),
            Err(PlumeError::ShapeMismatch { .. })
        ));
    }
}
