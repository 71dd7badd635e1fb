//! Open-system propagation of small quantum systems and linear absorption spectra.
//!
//! A [`Hamiltonian`](oqs::Hamiltonian) couples a system to harmonic baths
//! described by spectral densities. Either propagator family
//! ([`RedfieldPropagator`](oqs::RedfieldPropagator) or
//! [`HEOMPropagator`](oqs::HEOMPropagator)) evolves density matrices under it,
//! and [`spec`] turns that evolution into an absorption spectrum.

extern crate approx;
extern crate log;
extern crate nalgebra;

pub use qrho_core::{c64, Op};

pub mod config;
pub mod error;
pub mod ode;
pub mod oqs;
pub mod spec;
pub mod therm;

pub use error::{Error, Result};
