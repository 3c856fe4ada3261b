//! Physical effects for plume simulations.
//!
//! # Core Types
//!
//! - [`FieldEffect`] - A field applied to named targets in one of three
//!   [`EffectMode`]s
//! - [`effect_applied`] - Combines an effect with the grid it targets
//! - [`Gravity`] - Scalar or per-axis acceleration, combined with
//!   [`Gravity::try_add`]
//! - [`FluidState`] - Named grids that effects and gravity act on
//!
//! Named effects ([`inflow`], [`fan`], [`heat_source`], ...) build the
//! common recipes.

mod effect;
mod gravity;
mod state;

pub use effect::{
    cold_source, constant_density, constant_temperature, effect_applied, fan, heat_source, inflow,
    EffectMode, FieldEffect,
};
pub use gravity::{Gravity, GravityTerm, GravityValue, DEFAULT_GRAVITY};
pub use state::{FluidState, VELOCITY};
