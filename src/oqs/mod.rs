/// Simulation methods for open quantum systems
///

pub mod bath;
pub mod ham;
pub mod heom;
pub mod hierarchy;
pub mod propagator;
pub mod redfield;

pub use bath::{BathCorrelationTerm, BathModel, HalfFourier, SpectralDensity, SpectralForm};
pub use ham::{Hamiltonian, HamiltonianBuilder};
pub use heom::{HEOMPropagator, Terminator};
pub use propagator::{Evolution, Propagator};
pub use redfield::{Method, RedfieldPropagator};
