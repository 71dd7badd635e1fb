//! Second-order (Redfield-type) master equations.
//!
//! In the energy eigenbasis of the system Hamiltonian, each bath with
//! coupling A contributes
//!     d(rho)/dt += L rho A + A rho L^dag - A L rho - rho L^dag A
//! where
//!     L[c, d] = A[c, d] G(w_dc, t),    w_dc = E_d - E_c
//! and G is the one-sided transform of the bath correlation function.
//! TC2 uses the Markovian limit t -> infinity, TCL2 keeps the elapsed time.

use std::fmt;
use std::str::FromStr;

use log::info;
use num_complex::Complex64 as c64;
use num_traits::Zero;
use qrho_core::liouville::{liouvillian, spost, spre, sprepost, unvectorize, vectorize};
use qrho_core::Op;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::oqs::bath::HalfFourier;
use crate::oqs::ham::Hamiltonian;
use crate::oqs::propagator::Propagator;

pub const DEFAULT_MATSUBARA_TERMS: usize = 64;

/// Transition frequency differences below this are treated as degenerate
/// by the secular approximation
pub const SECULAR_TOL: f64 = 1.0e-8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// Time-convolution, Markovian limit
    #[serde(alias = "TNL", alias = "tc2")]
    TC2,
    /// Time-convolutionless, time-dependent tensor
    #[serde(alias = "TL", alias = "tcl2")]
    TCL2,
}

impl FromStr for Method {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TC2" | "TNL" => Ok(Method::TC2),
            "TCL2" | "TL" => Ok(Method::TCL2),
            _ => Err(ValidationError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::TC2 => write!(f, "TC2"),
            Method::TCL2 => write!(f, "TCL2"),
        }
    }
}

/// Redfield propagator over a borrowed Hamiltonian.
/// The packed state is the column-vectorized density matrix in the energy eigenbasis.
pub struct RedfieldPropagator<'a> {
    ham: &'a Hamiltonian,
    method: Method,
    secular: bool,
    n_matsubara: usize,
    tables: Vec<HalfFourier>,
    coherent: Op,
    markov: Op,
}

impl<'a> RedfieldPropagator<'a> {
    pub fn create(ham: &'a Hamiltonian, method: Method) -> Self {
        let n = ham.dim();
        let mut prop = Self {
            ham,
            method,
            secular: false,
            n_matsubara: DEFAULT_MATSUBARA_TERMS,
            tables: Vec::new(),
            coherent: liouvillian(&Op::from_diagonal(&ham.eigen().vals.map(|e| c64::new(e, 0.0)))),
            markov: Op::zeros(n * n, n * n),
        };
        prop.rebuild();
        prop
    }

    /// Keep only dissipative couplings between coherences of equal frequency
    pub fn secular(mut self, secular: bool) -> Self {
        self.secular = secular;
        self.rebuild();
        self
    }

    /// Number of correlation-function terms used for G(w, t)
    pub fn with_matsubara_terms(mut self, k: usize) -> Self {
        self.n_matsubara = k.max(1);
        self.rebuild();
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn is_secular(&self) -> bool {
        self.secular
    }

    fn rebuild(&mut self) {
        let k = self.n_matsubara;
        self.tables = self.ham.baths().iter().map(|b| b.density.half_fourier(k)).collect();
        self.markov = &self.coherent + self.relaxation_tensor(None);
        let n = self.ham.dim();
        info!(
            "Redfield {}: {}x{} tensor, {} bath(s), {} correlation terms, secular: {}",
            self.method,
            n * n,
            n * n,
            self.tables.len(),
            k,
            self.secular
        );
    }

    /// Dissipative part of the generator in Liouville space (eigenbasis).
    /// `None` evaluates the Markovian limit.
    pub fn relaxation_tensor(&self, t: Option<f64>) -> Op {
        let n = self.ham.dim();
        let omega = self.ham.omega();
        let mut r = Op::zeros(n * n, n * n);

        for (b, table) in self.tables.iter().enumerate() {
            let a = self.ham.coupling_eigen(b);
            let mut lambda = a.clone();
            for d in 0..n {
                for c in 0..n {
                    let w = omega[(d, c)];
                    lambda[(c, d)] *= match t {
                        Some(t) => table.at(w, t),
                        None => table.markov(w),
                    };
                }
            }
            let lambda_dag = lambda.adjoint();
            r += sprepost(&lambda, a) + sprepost(a, &lambda_dag)
                - spre(&(a * &lambda))
                - spost(&(&lambda_dag * a));
        }

        if self.secular {
            //  Column (c + n d) feeds row (a + n b) only if w_ab = w_cd
            for col in 0..n * n {
                let (c, d) = (col % n, col / n);
                for row in 0..n * n {
                    let (a, b) = (row % n, row / n);
                    if (omega[(a, b)] - omega[(c, d)]).abs() > SECULAR_TOL {
                        r[(row, col)] = c64::zero();
                    }
                }
            }
        }

        r
    }

    /// Full Liouville-space generator at elapsed time t
    pub fn generator(&self, t: f64) -> Op {
        match self.method {
            Method::TC2 => self.markov.clone(),
            Method::TCL2 => &self.coherent + self.relaxation_tensor(Some(t)),
        }
    }
}

impl<'a> Propagator for RedfieldPropagator<'a> {
    fn hamiltonian(&self) -> &Hamiltonian {
        self.ham
    }

    fn pack(&self, rho: &Op) -> Op {
        vectorize(&self.ham.to_eigen(rho))
    }

    fn unpack(&self, state: &Op) -> Op {
        self.ham.to_site(&unvectorize(state, self.ham.dim()))
    }

    fn rhs(&self, t: f64, state: &Op, out: &mut Op) {
        match self.method {
            Method::TC2 => self.markov.mul_to(state, out),
            Method::TCL2 => self.generator(t).mul_to(state, out),
        }
    }
}
