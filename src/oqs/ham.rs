use log::info;
use nalgebra::DMatrix;
use qrho_core::eig::{eigh, HermitianEig};
use qrho_core::util::{all_finite, change_basis, hermiticity_deviation, outer_zip_to, unchange_basis};
use qrho_core::Op;

use crate::error::ValidationError;
use crate::oqs::bath::{BathCorrelationTerm, BathModel, SpectralDensity, SpectralForm};

/// Maximum tolerated max |M - M^dag| for the system Hamiltonian and couplings
pub const HERMITICITY_TOL: f64 = 1.0e-10;

/// System Hamiltonian together with its bath couplings.
/// Derived eigenbasis quantities are computed once on construction
/// and shared read-only by every propagator built from it.
#[derive(Clone, Debug)]
pub struct Hamiltonian {
    system: Op,
    baths: Vec<BathModel>,
    eig: HermitianEig,
    /// omega[a, b] = E_a - E_b
    omega: DMatrix<f64>,
    /// Coupling operators in the energy eigenbasis
    couplings_eigen: Vec<Op>,
}

impl Hamiltonian {
    /// Build from a system Hamiltonian, one coupling operator per bath and
    /// a spectral density form per bath, all at a shared temperature
    pub fn build(
        h_sys: Op,
        couplings: Vec<Op>,
        forms: &[SpectralForm],
        temperature: f64,
    ) -> Result<Self, ValidationError> {
        if couplings.len() != forms.len() {
            return Err(ValidationError::DimensionMismatch {
                name: "spectral densities".to_string(),
                expected: format!("{} (one per coupling operator)", couplings.len()),
                actual: forms.len().to_string(),
            });
        }
        let mut builder = HamiltonianBuilder::new(h_sys);
        for (a, &form) in couplings.into_iter().zip(forms.iter()) {
            builder = builder.bath(a, SpectralDensity::new(form, temperature)?);
        }
        builder.build()
    }

    pub fn builder(h_sys: Op) -> HamiltonianBuilder {
        HamiltonianBuilder::new(h_sys)
    }

    pub fn dim(&self) -> usize {
        self.system.nrows()
    }

    pub fn system(&self) -> &Op {
        &self.system
    }

    pub fn baths(&self) -> &[BathModel] {
        &self.baths
    }

    pub fn nbath(&self) -> usize {
        self.baths.len()
    }

    pub fn eigen(&self) -> &HermitianEig {
        &self.eig
    }

    /// Transition frequencies omega[a, b] = E_a - E_b
    pub fn omega(&self) -> &DMatrix<f64> {
        &self.omega
    }

    /// Coupling operator of bath `b` in the energy eigenbasis
    pub fn coupling_eigen(&self, b: usize) -> &Op {
        &self.couplings_eigen[b]
    }

    /// U^dag A U
    pub fn to_eigen(&self, op: &Op) -> Op {
        change_basis(op, &self.eig.vecs)
    }

    /// U A U^dag
    pub fn to_site(&self, op: &Op) -> Op {
        unchange_basis(op, &self.eig.vecs)
    }

    /// Exponential terms of the correlation function of bath `b`
    pub fn correlation_terms(&self, b: usize, k: usize) -> Vec<BathCorrelationTerm> {
        self.baths[b].density.correlation_terms(k)
    }
}

/// Incremental construction of a [`Hamiltonian`], allowing each bath its own
/// spectral density and temperature
pub struct HamiltonianBuilder {
    system: Op,
    baths: Vec<BathModel>,
}

impl HamiltonianBuilder {
    pub fn new(h_sys: Op) -> Self {
        Self { system: h_sys, baths: Vec::new() }
    }

    pub fn bath(mut self, coupling: Op, density: SpectralDensity) -> Self {
        self.baths.push(BathModel::new(coupling, density));
        self
    }

    pub fn build(self) -> Result<Hamiltonian, ValidationError> {
        let n = self.system.nrows();
        if n == 0 || self.system.ncols() != n {
            return Err(ValidationError::DimensionMismatch {
                name: "system Hamiltonian".to_string(),
                expected: "non-empty square matrix".to_string(),
                actual: format!("{}x{}", n, self.system.ncols()),
            });
        }
        check_hermitian("system Hamiltonian", &self.system)?;
        for (i, bath) in self.baths.iter().enumerate() {
            let name = format!("coupling operator {}", i);
            if bath.coupling.shape() != (n, n) {
                return Err(ValidationError::DimensionMismatch {
                    name,
                    expected: format!("{}x{}", n, n),
                    actual: format!("{}x{}", bath.coupling.nrows(), bath.coupling.ncols()),
                });
            }
            check_hermitian(&name, &bath.coupling)?;
        }

        let eig = eigh(&self.system);
        let mut omega = DMatrix::zeros(n, n);
        outer_zip_to(&eig.vals, &eig.vals, &mut omega, |a, b| *a - *b);
        let couplings_eigen = self
            .baths
            .iter()
            .map(|bath| change_basis(&bath.coupling, &eig.vecs))
            .collect();

        info!(
            "Hamiltonian: dimension {}, {} bath(s), spectrum [{:.4}, {:.4}]",
            n,
            self.baths.len(),
            eig.vals[0],
            eig.vals[n - 1]
        );

        Ok(Hamiltonian {
            system: self.system,
            baths: self.baths,
            eig,
            omega,
            couplings_eigen,
        })
    }
}

fn check_hermitian(name: &str, op: &Op) -> Result<(), ValidationError> {
    if !all_finite(op) {
        return Err(ValidationError::NonFinite { name: name.to_string() });
    }
    let deviation = hermiticity_deviation(op);
    if deviation > HERMITICITY_TOL || deviation.is_nan() {
        return Err(ValidationError::NonHermitian { name: name.to_string(), deviation });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64 as c64;
    use qrho_core::op_from_real_rows;

    fn dimer() -> (Op, Vec<Op>) {
        let h = op_from_real_rows(3, &[
            0.0, 0.0, 0.0,
            0.0, 0.0, -1.0,
            0.0, -1.0, 0.0]);
        let a1 = op_from_real_rows(3, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let a2 = op_from_real_rows(3, &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        (h, vec![a1, a2])
    }

    fn drude() -> SpectralForm {
        SpectralForm::OhmicLorentz { lambda: 0.5, omega_c: 1.0 }
    }

    #[test]
    fn test_build_and_transforms() {
        let (h, a) = dimer();
        let ham = Hamiltonian::build(h.clone(), a, &[drude(), drude()], 1.0).unwrap();
        assert_eq!(ham.dim(), 3);
        assert_eq!(ham.nbath(), 2);
        assert_abs_diff_eq!(ham.eigen().vals[0], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ham.omega()[(2, 0)], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ham.omega()[(0, 2)], -2.0, epsilon = 1e-12);

        let d = ham.to_eigen(&h);
        assert_abs_diff_eq!(d[(1, 1)], c64::new(0.0, 0.0), epsilon = 1e-12);
        assert_abs_diff_eq!(d[(0, 1)].norm(), 0.0, epsilon = 1e-12);
        let back = ham.to_site(&d);
        assert_abs_diff_eq!((back - h).norm(), 0.0, epsilon = 1e-12);

        assert_eq!(ham.correlation_terms(0, 3).len(), 3);
    }

    #[test]
    fn test_rejects_bad_input() {
        let (h, a) = dimer();
        let mut bad = h.clone();
        bad[(0, 1)] = c64::new(0.1, 0.0);
        match Hamiltonian::build(bad, a.clone(), &[drude(), drude()], 1.0) {
            Err(ValidationError::NonHermitian { name, .. }) => assert_eq!(name, "system Hamiltonian"),
            other => panic!("unexpected {:?}", other),
        }

        let mut a_bad = a.clone();
        a_bad[1][(0, 2)] = c64::new(0.0, 1.0);
        match Hamiltonian::build(h.clone(), a_bad, &[drude(), drude()], 1.0) {
            Err(ValidationError::NonHermitian { name, .. }) => assert_eq!(name, "coupling operator 1"),
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            Hamiltonian::build(h.clone(), a.clone(), &[drude()], 1.0),
            Err(ValidationError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            Hamiltonian::build(h.clone(), vec![Op::identity(2, 2)], &[drude()], 1.0),
            Err(ValidationError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            Hamiltonian::build(h.clone(), a.clone(), &[drude(), drude()], 0.0),
            Err(ValidationError::InvalidParameter { .. })
        ));
        assert!(Hamiltonian::build(Op::zeros(0, 0), vec![], &[], 1.0).is_err());
    }

    #[test]
    fn test_rejects_non_finite_operators() {
        let (h, a) = dimer();
        let mut bad = h.clone();
        bad[(1, 1)] = c64::new(f64::NAN, 0.0);
        match Hamiltonian::build(bad, a.clone(), &[drude(), drude()], 1.0) {
            Err(ValidationError::NonFinite { name }) => assert_eq!(name, "system Hamiltonian"),
            other => panic!("unexpected {:?}", other),
        }

        // symmetric infinities would otherwise cancel in A - A^dag
        let mut inf = h.clone();
        inf[(1, 2)] = c64::new(f64::INFINITY, 0.0);
        inf[(2, 1)] = c64::new(f64::INFINITY, 0.0);
        assert!(matches!(
            Hamiltonian::build(inf, a.clone(), &[drude(), drude()], 1.0),
            Err(ValidationError::NonFinite { .. })
        ));

        let mut a_bad = a.clone();
        a_bad[0][(1, 1)] = c64::new(f64::NAN, 0.0);
        match Hamiltonian::build(h.clone(), a_bad, &[drude(), drude()], 1.0) {
            Err(ValidationError::NonFinite { name }) => assert_eq!(name, "coupling operator 0"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_builder_per_bath_temperature() {
        let (h, a) = dimer();
        let hot = SpectralDensity::new(drude(), 2.0).unwrap();
        let cold = SpectralDensity::new(drude(), 0.5).unwrap();
        let ham = Hamiltonian::builder(h)
            .bath(a[0].clone(), hot)
            .bath(a[1].clone(), cold)
            .build()
            .unwrap();
        assert_abs_diff_eq!(ham.baths()[0].density.temperature(), 2.0);
        assert_abs_diff_eq!(ham.baths()[1].density.beta(), 2.0);
    }
}
