//! Fixed-step explicit integration of linear-space ODEs
//!     dx/dt = f(t, x)
//!
//! The solver only touches the state through a [`LinearCombination`]
//! helper, so it integrates plain density matrices and packed hierarchy
//! states alike.

use std::marker::PhantomData;

use num_complex::Complex64 as c64;
use qrho_core::LinearCombination;

/// Outcome of a single solver step
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ODEStep {
    /// A step of the given size was taken
    Step(f64),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ODEState {
    Ok(ODEStep),
    Done,
}

/// Current time, state and step size of a solver
#[derive(Clone, Debug)]
pub struct ODEData<V> {
    pub t: f64,
    pub x: V,
    pub h: f64,
    pub step: usize,
}

/// Classical fourth-order Runge-Kutta with a fixed step h.
/// Times are evaluated as t0 + k h, so no rounding accumulates over long runs.
pub struct RK4Solver<V, F, L> {
    f: F,
    dat: ODEData<V>,
    t0: f64,
    n_steps: usize,
    k1: V,
    k2: V,
    k3: V,
    k4: V,
    tmp: V,
    _lc: PhantomData<L>,
}

impl<V, F, L> RK4Solver<V, F, L>
where
    V: Clone,
    F: FnMut(f64, &V, &mut V),
    L: LinearCombination<c64, V>,
{
    /// Integrate `n_steps` steps of size `h` starting from (t0, x0)
    pub fn new_with_lc(f: F, t0: f64, x0: V, h: f64, n_steps: usize, _lc: L) -> Self {
        let k1 = x0.clone();
        let k2 = x0.clone();
        let k3 = x0.clone();
        let k4 = x0.clone();
        let tmp = x0.clone();
        Self {
            f,
            dat: ODEData { t: t0, x: x0, h, step: 0 },
            t0,
            n_steps,
            k1,
            k2,
            k3,
            k4,
            tmp,
            _lc: PhantomData,
        }
    }

    pub fn ode_data(&self) -> &ODEData<V> {
        &self.dat
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Consume the solver and return the current (t, x)
    pub fn into_current(self) -> (f64, V) {
        (self.dat.t, self.dat.x)
    }

    pub fn step(&mut self) -> ODEState {
        if self.dat.step >= self.n_steps {
            return ODEState::Done;
        }
        let h = self.dat.h;
        let t = self.dat.t;
        let half = c64::new(h / 2.0, 0.0);
        let full = c64::new(h, 0.0);
        let sixth = c64::new(h / 6.0, 0.0);
        let third = c64::new(h / 3.0, 0.0);

        (self.f)(t, &self.dat.x, &mut self.k1);

        L::scalar_multiply_to(&self.k1, half, &mut self.tmp);
        L::add_assign_ref(&mut self.tmp, &self.dat.x);
        (self.f)(t + h / 2.0, &self.tmp, &mut self.k2);

        L::scalar_multiply_to(&self.k2, half, &mut self.tmp);
        L::add_assign_ref(&mut self.tmp, &self.dat.x);
        (self.f)(t + h / 2.0, &self.tmp, &mut self.k3);

        L::scalar_multiply_to(&self.k3, full, &mut self.tmp);
        L::add_assign_ref(&mut self.tmp, &self.dat.x);
        (self.f)(t + h, &self.tmp, &mut self.k4);

        L::add_scalar_mul(&mut self.dat.x, sixth, &self.k1);
        L::add_scalar_mul(&mut self.dat.x, third, &self.k2);
        L::add_scalar_mul(&mut self.dat.x, third, &self.k3);
        L::add_scalar_mul(&mut self.dat.x, sixth, &self.k4);

        self.dat.step += 1;
        self.dat.t = self.t0 + (self.dat.step as f64) * h;

        ODEState::Ok(ODEStep::Step(h))
    }
}
