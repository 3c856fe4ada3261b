//! Effects: fields that perturb simulation grids every step.

use std::fmt;
use std::str::FromStr;

use plume_backend::{global_scheduler, BinaryOp};
use plume_core::{PlumeError, Result, Tensor};
use plume_field::{CenteredGrid, Field, GeometryMask};
use plume_geom::Geometry;
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How an effect combines with the grid it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EffectMode {
    /// Adds the effect scaled by the timestep.
    Grow,
    /// Adds the effect once, independent of the timestep.
    Add,
    /// Overwrites the grid inside the effect's bounds.
    Fix,
}

impl EffectMode {
    pub fn name(self) -> &'static str {
        match self {
            EffectMode::Grow => "grow",
            EffectMode::Add => "add",
            EffectMode::Fix => "fix",
        }
    }
}

impl fmt::Display for EffectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectMode {
    type Err = PlumeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "grow" => Ok(EffectMode::Grow),
            "add" => Ok(EffectMode::Add),
            "fix" => Ok(EffectMode::Fix),
            other => Err(PlumeError::invalid(format!(
                "unknown effect mode '{other}', expected grow, add or fix"
            ))),
        }
    }
}

/// A field applied to one or more named grids.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldEffect {
    field: Field,
    mode: EffectMode,
    targets: Vec<String>,
    tags: Vec<String>,
}

impl FieldEffect {
    /// Creates an effect tagged `effect`.
    pub fn new(field: impl Into<Field>, targets: &[&str], mode: EffectMode) -> Result<Self> {
        Self::with_tags(field, targets, mode, &["effect"])
    }

    /// Creates an effect with the given tags. A `<target>_effect` tag is
    /// added for every target.
    pub fn with_tags(
        field: impl Into<Field>,
        targets: &[&str],
        mode: EffectMode,
        tags: &[&str],
    ) -> Result<Self> {
        if targets.is_empty() {
            return Err(PlumeError::invalid("an effect needs at least one target"));
        }
        Ok(Self::build(field.into(), targets, mode, tags))
    }

    fn build(field: Field, targets: &[&str], mode: EffectMode, tags: &[&str]) -> Self {
        let tags = tags
            .iter()
            .map(|t| t.to_string())
            .chain(targets.iter().map(|t| format!("{t}_effect")))
            .collect();
        Self {
            field,
            mode,
            targets: targets.iter().map(|t| t.to_string()).collect(),
            tags,
        }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn mode(&self) -> EffectMode {
        self.mode
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn targets_field(&self, name: &str) -> bool {
        self.targets.iter().any(|t| t == name)
    }
}

impl fmt::Display for FieldEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({} to {})",
            self.mode,
            self.field.variant_name(),
            self.targets.join(", ")
        )
    }
}

/// Combines `effect` with `field` over a timestep `dt`.
///
/// The effect's field is first resampled onto `field`'s grid and cast to
/// its precision.
///
/// - [`EffectMode::Grow`]: `field + resampled * dt`
/// - [`EffectMode::Add`]: `field + resampled`
/// - [`EffectMode::Fix`]: `field * (1 - mask) + resampled * mask`, where
///   `mask` is the effect field's bounds evaluated at the grid's cell
///   centers. Fails with [`PlumeError::InvalidConfiguration`] if the effect
///   field has no bounds.
pub fn effect_applied(effect: &FieldEffect, field: &CenteredGrid, dt: f64) -> Result<CenteredGrid> {
    trace!(effect = %effect, dt, "applying effect");
    let resampled = effect.field.at(field)?.values().cast(field.dtype());
    let values = field.values();
    let combined = match effect.mode {
        EffectMode::Grow => {
            let dt = Tensor::scalar(dt).cast(field.dtype());
            dispatch(BinaryOp::Add, values, &dispatch(BinaryOp::Mul, &resampled, &dt)?)?
        }
        EffectMode::Add => dispatch(BinaryOp::Add, values, &resampled)?,
        EffectMode::Fix => {
            if effect.field.bounds().is_none() {
                return Err(PlumeError::invalid(format!(
                    "fix effect on {} needs a field with bounds",
                    effect.targets.join(", ")
                )));
            }
            let mask = effect.field.bounds_mask(&field.points()?)?;
            let keep = mask.map(|m| 1.0 - m);
            let kept = dispatch(BinaryOp::Mul, values, &keep)?;
            dispatch(BinaryOp::Add, &kept, &dispatch(BinaryOp::Mul, &resampled, &mask)?)?
        }
    };
    field.with_values(combined.cast(field.dtype()))
}

fn dispatch(op: BinaryOp, a: &Tensor, b: &Tensor) -> Result<Tensor> {
    Ok(global_scheduler().binary(op, a, b)?)
}

// ============================================================================
// Named effects
// ============================================================================

/// Adds density at `rate` per unit time inside `geometry`.
pub fn inflow(geometry: impl Into<Geometry>, rate: f64) -> FieldEffect {
    FieldEffect::build(
        GeometryMask::new("inflow", geometry, rate).into(),
        &["density"],
        EffectMode::Grow,
        &["inflow", "effect"],
    )
}

/// Accelerates the velocity inside `geometry`.
pub fn fan(geometry: impl Into<Geometry>, acceleration: impl Into<Tensor>) -> FieldEffect {
    FieldEffect::build(
        GeometryMask::new("fan", geometry, acceleration).into(),
        &["velocity"],
        EffectMode::Grow,
        &["fan", "effect"],
    )
}

/// Holds the density at a fixed value inside `geometry`.
pub fn constant_density(geometry: impl Into<Geometry>, density: f64) -> FieldEffect {
    FieldEffect::build(
        GeometryMask::new("constant-density", geometry, density).into(),
        &["density"],
        EffectMode::Fix,
        &["effect"],
    )
}

/// Holds the temperature at a fixed value inside `geometry`.
pub fn constant_temperature(geometry: impl Into<Geometry>, temperature: f64) -> FieldEffect {
    FieldEffect::build(
        GeometryMask::new("constant-temperature", geometry, temperature).into(),
        &["temperature"],
        EffectMode::Fix,
        &["effect"],
    )
}

/// Raises the temperature at `rate` per unit time inside `geometry`.
pub fn heat_source(geometry: impl Into<Geometry>, rate: f64) -> FieldEffect {
    FieldEffect::build(
        GeometryMask::new("heat-source", geometry, rate).into(),
        &["temperature"],
        EffectMode::Grow,
        &["effect"],
    )
}

/// Lowers the temperature at `rate` per unit time inside `geometry`.
pub fn cold_source(geometry: impl Into<Geometry>, rate: f64) -> FieldEffect {
    FieldEffect::build(
        GeometryMask::new("heat-source", geometry, -rate).into(),
        &["temperature"],
        EffectMode::Grow,
        &["effect"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::{spatial, DType, Dim, Extrapolation};
    use plume_geom::{Cuboid, Sphere};

    fn density_grid() -> CenteredGrid {
        CenteredGrid::new(
            Tensor::wrap(&[1.0, 2.0, 3.0, 4.0], Dim::spatial("x", 0)).unwrap(),
            Tensor::vector(&[0.0]),
            Tensor::vector(&[4.0]),
            Extrapolation::Zero,
        )
        .unwrap()
    }

    fn left_half() -> Cuboid {
        Cuboid::from_bounds(Tensor::vector(&[0.0]), Tensor::vector(&[2.0])).unwrap()
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("grow".parse::<EffectMode>().unwrap(), EffectMode::Grow);
        assert_eq!("fix".parse::<EffectMode>().unwrap(), EffectMode::Fix);
        assert!(matches!(
            "multiply".parse::<EffectMode>(),
            Err(PlumeError::InvalidConfiguration(_))
        ));
        assert_eq!(EffectMode::Add.to_string(), "add");
    }

    #[test]
    fn test_tags() {
        let effect = inflow(left_half(), 1.0);
        assert_eq!(effect.tags(), ["inflow", "effect", "density_effect"]);
        assert!(effect.targets_field("density"));

        let custom = FieldEffect::new(Tensor::scalar(1.0), &["density", "velocity"], EffectMode::Add).unwrap();
        assert_eq!(custom.tags(), ["effect", "density_effect", "velocity_effect"]);
        assert!(custom.has_tag("velocity_effect"));
        assert!(FieldEffect::new(Tensor::scalar(1.0), &[], EffectMode::Add).is_err());
    }

    #[test]
    fn test_grow_is_linear_in_dt() {
        let grid = density_grid();
        let effect = inflow(left_half(), 2.0);
        let once = effect_applied(&effect, &grid, 0.5).unwrap();
        let twice = effect_applied(&effect, &grid, 1.0).unwrap();
        assert_eq!(once.values().values(), vec![2.0, 3.0, 3.0, 4.0]);
        let delta_once = once.try_sub(&grid).unwrap();
        let delta_twice = twice.try_sub(&grid).unwrap();
        assert!(delta_twice.values().all_close(&delta_once.values().scale(2.0), 1e-12));
    }

    #[test]
    fn test_add_ignores_dt() {
        let grid = density_grid();
        let effect = FieldEffect::new(
            GeometryMask::new("bump", left_half(), 1.0),
            &["density"],
            EffectMode::Add,
        )
        .unwrap();
        let a = effect_applied(&effect, &grid, 0.1).unwrap();
        let b = effect_applied(&effect, &grid, 10.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.values().values(), vec![2.0, 3.0, 3.0, 4.0]);
    }

    #[test]
    fn test_fix_blends_by_mask() {
        let grid = density_grid();
        let effect = constant_density(left_half(), 9.0);
        let fixed = effect_applied(&effect, &grid, 1.0).unwrap();
        assert_eq!(fixed.values().values(), vec![9.0, 9.0, 3.0, 4.0]);
    }

    #[test]
    fn test_fix_soft_mask_is_convex() {
        let grid = density_grid();
        let ball = Sphere::new(Tensor::vector(&[0.0]), 1.5).unwrap();
        let mask = GeometryMask::new("soft", ball, 9.0).soft(2.0).unwrap();
        let effect = FieldEffect::new(mask.clone(), &["density"], EffectMode::Fix).unwrap();
        let fixed = effect_applied(&effect, &grid, 1.0).unwrap().values().values();
        let weights = mask.mask_at(&grid.points().unwrap()).unwrap().values();
        assert!(weights.iter().any(|w| *w > 0.0 && *w < 1.0));
        let original = grid.values().values();
        for ((value, w), before) in fixed.iter().zip(&weights).zip(&original) {
            let source = 9.0 * w;
            let expected = before * (1.0 - w) + source * w;
            assert!((value - expected).abs() < 1e-12);
            assert!(*value >= before.min(source) - 1e-12 && *value <= before.max(source) + 1e-12);
        }
    }

    #[test]
    fn test_fix_without_bounds() {
        let effect = FieldEffect::new(Tensor::scalar(3.0), &["density"], EffectMode::Fix).unwrap();
        assert!(matches!(
            effect_applied(&effect, &density_grid(), 1.0),
            Err(PlumeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_grow_keeps_grid_precision() {
        let grid = density_grid();
        let grid = grid.with_values(grid.values().cast(DType::Float32)).unwrap();
        let grown = effect_applied(&inflow(left_half(), 1.0), &grid, 0.1).unwrap();
        assert_eq!(grown.dtype(), DType::Float32);
        assert_eq!(grown.values().values()[0], (1.0f32 + 0.1f32) as f64);
    }

    #[test]
    fn test_cold_source_negates_rate() {
        let grid = CenteredGrid::uniform(
            spatial(&[("x", 4)]),
            Tensor::vector(&[0.0]),
            Tensor::vector(&[4.0]),
            20.0,
            Extrapolation::Zero,
        )
        .unwrap();
        let heated = effect_applied(&heat_source(left_half(), 2.0), &grid, 1.0).unwrap();
        let cooled = effect_applied(&cold_source(left_half(), 2.0), &grid, 1.0).unwrap();
        assert_eq!(heated.values().values(), vec![22.0, 22.0, 20.0, 20.0]);
        assert_eq!(cooled.values().values(), vec![18.0, 18.0, 20.0, 20.0]);
        let Field::Mask(mask) = cold_source(left_half(), 2.0).field().clone() else {
            panic!("named effects use geometry masks");
        };
        assert_eq!(mask.name(), "heat-source");
    }

    #[test]
    fn test_fan_vector_acceleration() {
        let velocity = CenteredGrid::new(
            Tensor::zeros(spatial(&[("x", 2), ("y", 2)]))
                .expand(Dim::vector(2))
                .unwrap(),
            Tensor::vector(&[0.0, 0.0]),
            Tensor::vector(&[2.0, 2.0]),
            Extrapolation::Zero,
        )
        .unwrap();
        let region = Cuboid::from_bounds(Tensor::vector(&[0.0, 0.0]), Tensor::vector(&[1.0, 2.0])).unwrap();
        let blown = effect_applied(&fan(region, Tensor::vector(&[1.0, 0.0])), &velocity, 1.0).unwrap();
        let vx = blown.values().component("x").unwrap();
        assert_eq!(vx.select("x", 0usize).unwrap().values(), vec![1.0, 1.0]);
        assert_eq!(vx.select("x", 1usize).unwrap().values(), vec![0.0, 0.0]);
        assert_eq!(blown.values().component("y").unwrap().sum(), 0.0);
    }
}
