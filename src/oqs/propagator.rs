use log::{debug, trace};
use num_complex::Complex64 as c64;
use qrho_core::util::all_finite;
use qrho_core::{Op, LC};

use crate::error::{NumericalInstabilityError, ValidationError};
use crate::ode::{ODEState, RK4Solver};
use crate::oqs::ham::Hamiltonian;

/// Capability shared by every open-system propagator: advance a packed
/// state under a right-hand side that depends on (t, state).
///
/// The packed state is whatever layout the propagator works in
/// (a density matrix in the energy eigenbasis for Redfield, the stacked
/// hierarchy for HEOM). Callers only exchange site-basis density matrices
/// through `pack` and `unpack`.
pub trait Propagator {
    fn hamiltonian(&self) -> &Hamiltonian;

    fn dim(&self) -> usize {
        self.hamiltonian().dim()
    }

    /// Packed initial state for the site-basis density matrix `rho`
    fn pack(&self, rho: &Op) -> Op;

    /// Site-basis physical density matrix of a packed state
    fn unpack(&self, state: &Op) -> Op;

    /// out = d(state)/dt at time t since preparation
    fn rhs(&self, t: f64, state: &Op, out: &mut Op);

    /// Name the part of a packed state holding the first non-finite entry,
    /// or None if the state is finite
    fn locate_instability(&self, state: &Op) -> Option<String> {
        if all_finite(state) {
            None
        } else {
            Some("density matrix".to_string())
        }
    }

    /// Lazily propagate `rho0` over [0, t_final] with fixed step `dt`
    fn evolve<'a>(&'a self, rho0: &Op, t_final: f64, dt: f64) -> Result<Evolution<'a, Self>, ValidationError>
    where
        Self: Sized,
    {
        Evolution::new(self, rho0, t_final, dt)
    }
}

/// Upper bound on the number of steps of one evolution
pub const MAX_STEPS: usize = 10_000_000;

type BoxedRhs<'a> = Box<dyn FnMut(f64, &Op, &mut Op) + 'a>;

/// Lazy sequence of (t, rho(t)) samples on the grid t_k = k dt, k = 0..=n_steps.
///
/// The first sample is the initial state itself. Each further sample costs
/// one RK4 step. Iteration stops after the first non-finite state, which is
/// reported as an error.
pub struct Evolution<'a, P: Propagator + ?Sized> {
    prop: &'a P,
    rho0: Op,
    solver: RK4Solver<Op, BoxedRhs<'a>, LC<c64>>,
    started: bool,
    finished: bool,
}

impl<'a, P: Propagator + ?Sized> Evolution<'a, P> {
    pub fn new(prop: &'a P, rho0: &Op, t_final: f64, dt: f64) -> Result<Self, ValidationError> {
        let n = prop.dim();
        if rho0.shape() != (n, n) {
            return Err(ValidationError::DimensionMismatch {
                name: "initial density matrix".to_string(),
                expected: format!("{}x{}", n, n),
                actual: format!("{}x{}", rho0.nrows(), rho0.ncols()),
            });
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ValidationError::positive("time step", dt));
        }
        if !(t_final.is_finite() && t_final > 0.0) {
            return Err(ValidationError::positive("final time", t_final));
        }
        let ratio = (t_final / dt).round();
        if ratio > MAX_STEPS as f64 {
            return Err(ValidationError::InvalidParameter {
                name: "number of time steps t_final / dt".to_string(),
                requirement: "at most 10000000",
                value: ratio,
            });
        }
        let n_steps = (ratio as usize).max(1);
        debug!("Propagating {} steps of dt = {} (t_final = {})", n_steps, dt, t_final);

        let rhs: BoxedRhs<'a> = Box::new(move |t: f64, x: &Op, y: &mut Op| prop.rhs(t, x, y));
        let solver = RK4Solver::new_with_lc(rhs, 0.0, prop.pack(rho0), dt, n_steps, LC::default());

        Ok(Self {
            prop,
            rho0: rho0.clone(),
            solver,
            started: false,
            finished: false,
        })
    }

    pub fn n_steps(&self) -> usize {
        self.solver.n_steps()
    }

    pub fn dt(&self) -> f64 {
        self.solver.ode_data().h
    }

    /// Time of the last sample, n_steps * dt
    pub fn final_time(&self) -> f64 {
        self.n_steps() as f64 * self.dt()
    }
}

impl<'a, P: Propagator + ?Sized> Iterator for Evolution<'a, P> {
    type Item = Result<(f64, Op), NumericalInstabilityError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(Ok((0.0, self.rho0.clone())));
        }
        match self.solver.step() {
            ODEState::Done => {
                self.finished = true;
                None
            }
            ODEState::Ok(_) => {
                let dat = self.solver.ode_data();
                if let Some(entity) = self.prop.locate_instability(&dat.x) {
                    self.finished = true;
                    return Some(Err(NumericalInstabilityError {
                        time: dat.t,
                        step: dat.step,
                        entity,
                    }));
                }
                trace!("t = {:.4}", dat.t);
                Some(Ok((dat.t, self.prop.unpack(&dat.x))))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        let remaining = self.n_steps() - self.solver.ode_data().step + if self.started { 0 } else { 1 };
        (0, Some(remaining))
    }
}
