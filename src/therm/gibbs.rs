use ndarray::Array1;
use num_complex::Complex64 as c64;
use qrho_core::eig::eigh;
use qrho_core::util::unchange_basis;
use qrho_core::Op;

/// Boltzmann weights exp(-beta (E_i - E_0)) in the eigenbasis of a Hamiltonian,
/// with E_0 the ground energy
pub struct GibbsResult {
    pub boltz_weights: Array1<f64>,
    pub partition_z: f64,
    pub evecs: Op,
}

pub fn gibbs_weights(haml: &Op, beta: f64) -> GibbsResult {
    let eig = eigh(haml);
    let mut vals: Array1<f64> = eig.vals.iter().cloned().collect();
    let e0 = vals.iter().cloned().fold(f64::INFINITY, f64::min);
    vals.mapv_inplace(|e| (-beta * (e - e0)).exp());
    let z_partfn = vals.sum();

    GibbsResult { boltz_weights: vals, partition_z: z_partfn, evecs: eig.vecs }
}

/// Normalized thermal state exp(-beta H) / Z in the basis of `haml`
pub fn gibbs_state(haml: &Op, beta: f64) -> Op {
    let g = gibbs_weights(haml, beta);
    let diag = Op::from_diagonal(&nalgebra::DVector::from_iterator(
        g.boltz_weights.len(),
        g.boltz_weights.iter().map(|&w| c64::new(w / g.partition_z, 0.0)),
    ));
    unchange_basis(&diag, &g.evecs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use qrho_core::{op_from_real_rows, qtrace};

    #[test]
    fn test_gibbs_state() {
        let h = op_from_real_rows(2, &[0.5, 0.0, 0.0, -0.5]);
        let rho = gibbs_state(&h, 2.0);
        assert_abs_diff_eq!(qtrace(&rho).re, 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(rho[(0, 0)].re / rho[(1, 1)].re, (-2.0_f64).exp(), epsilon = 1e-12);

        let g = gibbs_weights(&h, 2.0);
        assert_abs_diff_eq!(g.boltz_weights[0], 1.0);
        assert_abs_diff_eq!(g.partition_z, 1.0 + (-2.0_f64).exp(), epsilon = 1e-14);
    }

    #[test]
    fn test_gibbs_off_diagonal() {
        let h = op_from_real_rows(2, &[0.0, -1.0, -1.0, 0.0]);
        let rho = gibbs_state(&h, 1.0);
        // <sx> = tanh(beta)
        assert_abs_diff_eq!(2.0 * rho[(0, 1)].re, 1.0_f64.tanh(), epsilon = 1e-12);
        assert_abs_diff_eq!(rho[(0, 0)].re, 0.5, epsilon = 1e-12);
    }
}
