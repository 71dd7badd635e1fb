//! Hierarchical equations of motion.
//!
//! Bath correlation functions are expanded as C_b(t) = sum_k c_k exp(-nu_k t);
//! every (bath, term) pair is one hierarchy mode j. With s_j = |c_j| the
//! scaled auxiliary operators obey
//!
//! ```text
//!     d(rho_n)/dt = -i[H, rho_n] - (sum_j n_j nu_j) rho_n - sum_b D_b [A_b, [A_b, rho_n]]
//!                   - i sum_j sqrt((n_j + 1) s_j) [A_j, rho_{n+e_j}]
//!                   - i sum_j sqrt(n_j / s_j) (c_j A_j rho_{n-e_j} - cbar_j rho_{n-e_j} A_j)
//! ```
//!
//! where D_b is the white-noise weight of the truncated Matsubara tail.
//! The level-0 member is the physical density matrix.

use log::info;
use num_complex::Complex64 as c64;
use num_traits::Zero;
use qrho_core::util::all_finite;
use qrho_core::Op;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::oqs::bath::BathCorrelationTerm;
use crate::oqs::ham::Hamiltonian;
use crate::oqs::hierarchy::{hierarchy_size, Hierarchy};
use crate::oqs::propagator::Propagator;

pub const MAX_DEPTH: usize = 64;
pub const MAX_MEMBERS: usize = 200_000;
/// Complex entries in the packed hierarchy state
pub const MAX_STATE_ENTRIES: usize = 50_000_000;

/// Closure of the hierarchy at the truncation depth
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminator {
    /// Members above the depth are slaved adiabatically to their parent
    Markovian,
    /// Members above the depth are set to zero
    Drop,
}

impl Default for Terminator {
    fn default() -> Self {
        Terminator::Markovian
    }
}

#[derive(Clone, Copy, Debug)]
enum CouplingKind {
    /// -i coef [A, rho_src]
    Raise { coef: f64 },
    /// -i coef (c A rho_src - cbar rho_src A)
    Lower { coef: f64, c: c64, c_bar: c64 },
    /// -coef [A, c A rho_src - cbar rho_src A]
    Terminate { coef: c64, c: c64, c_bar: c64 },
}

#[derive(Clone, Copy, Debug)]
struct Coupling {
    source: usize,
    target: usize,
    mode: usize,
    kind: CouplingKind,
}

#[derive(Clone, Debug)]
struct Mode {
    bath: usize,
    term: BathCorrelationTerm,
    scale: f64,
}

/// HEOM propagator over a borrowed Hamiltonian.
/// The packed state is an n x (n M) matrix: member m occupies columns m n .. (m+1) n.
pub struct HEOMPropagator<'a> {
    ham: &'a Hamiltonian,
    depth: usize,
    n_matsubara: usize,
    terminator: Terminator,
    correction: bool,
    modes: Vec<Mode>,
    hierarchy: Hierarchy,
    /// sum_j n_j nu_j per member
    damping: Vec<c64>,
    /// white-noise weight of each bath's truncated tail
    tails: Vec<f64>,
    couplings: Vec<Coupling>,
}

impl<'a> HEOMPropagator<'a> {
    /// Hierarchy of depth `depth` (L) with `n_matsubara` (K) correlation terms per bath
    pub fn create(ham: &'a Hamiltonian, depth: usize, n_matsubara: usize) -> Result<Self, ConfigurationError> {
        if n_matsubara == 0 {
            return Err(ConfigurationError::Truncation {
                name: "Matsubara terms K",
                value: n_matsubara,
                range: "1 or more",
            });
        }
        if depth > MAX_DEPTH {
            return Err(ConfigurationError::Truncation {
                name: "hierarchy depth L",
                value: depth,
                range: "0..=64",
            });
        }

        let mut modes = Vec::new();
        for (b, bath) in ham.baths().iter().enumerate() {
            for term in bath.density.correlation_terms(n_matsubara) {
                let s = term.amplitude.norm();
                modes.push(Mode {
                    bath: b,
                    term,
                    scale: if s > 0.0 { s } else { 1.0 },
                });
            }
        }
        let tails = ham.baths().iter().map(|b| b.density.matsubara_tail(n_matsubara)).collect();

        let n = ham.dim();
        let members = match hierarchy_size(depth, modes.len()) {
            Some(m) if m <= MAX_MEMBERS as u128 => m as usize,
            other => {
                return Err(ConfigurationError::HierarchyTooLarge {
                    depth,
                    modes: modes.len(),
                    members: other.map_or_else(|| "more than 2^128".to_string(), |m| m.to_string()),
                    limit: MAX_MEMBERS,
                })
            }
        };
        let entries = members.saturating_mul(n * n);
        if entries > MAX_STATE_ENTRIES {
            return Err(ConfigurationError::StateTooLarge { entries, limit: MAX_STATE_ENTRIES });
        }

        let hierarchy = Hierarchy::new(depth, modes.len())?;
        let damping = hierarchy
            .iter()
            .map(|idx| {
                modes
                    .iter()
                    .enumerate()
                    .fold(c64::zero(), |acc, (j, mode)| acc + mode.term.rate * idx.occupation(j) as f64)
            })
            .collect();

        let mut prop = Self {
            ham,
            depth,
            n_matsubara,
            terminator: Terminator::default(),
            correction: true,
            modes,
            hierarchy,
            damping,
            tails,
            couplings: Vec::new(),
        };
        prop.build_couplings();
        Ok(prop)
    }

    pub fn terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self.build_couplings();
        self
    }

    /// Include the white-noise correction for the truncated Matsubara tail
    pub fn matsubara_correction(mut self, on: bool) -> Self {
        self.correction = on;
        self
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn n_matsubara(&self) -> usize {
        self.n_matsubara
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn n_members(&self) -> usize {
        self.hierarchy.len()
    }

    /// Correlation terms of every hierarchy mode, bath-major
    pub fn mode_terms(&self) -> impl Iterator<Item = &BathCorrelationTerm> {
        self.modes.iter().map(|m| &m.term)
    }

    /// Member m of a packed state
    pub fn member(&self, state: &Op, m: usize) -> Op {
        let n = self.ham.dim();
        state.columns(m * n, n).into_owned()
    }

    fn build_couplings(&mut self) {
        let mut couplings = Vec::new();
        for m in 0..self.hierarchy.len() {
            let idx = self.hierarchy.index(m);
            for (j, mode) in self.modes.iter().enumerate() {
                let nj = idx.occupation(j) as f64;
                let (c, c_bar) = (mode.term.amplitude, mode.term.conj_amplitude);
                match self.hierarchy.raise(m, j) {
                    Some(up) => couplings.push(Coupling {
                        source: up,
                        target: m,
                        mode: j,
                        kind: CouplingKind::Raise { coef: ((nj + 1.0) * mode.scale).sqrt() },
                    }),
                    None => {
                        if self.terminator == Terminator::Markovian {
                            let coef = (nj + 1.0) / (self.damping[m] + mode.term.rate);
                            couplings.push(Coupling {
                                source: m,
                                target: m,
                                mode: j,
                                kind: CouplingKind::Terminate { coef, c, c_bar },
                            });
                        }
                    }
                }
                if let Some(down) = self.hierarchy.lower(m, j) {
                    couplings.push(Coupling {
                        source: down,
                        target: m,
                        mode: j,
                        kind: CouplingKind::Lower { coef: (nj / mode.scale).sqrt(), c, c_bar },
                    });
                }
            }
        }
        info!(
            "HEOM: L = {}, K = {}, {} modes, {} members, {} couplings, {:?} terminator",
            self.depth,
            self.n_matsubara,
            self.modes.len(),
            self.hierarchy.len(),
            couplings.len(),
            self.terminator
        );
        self.couplings = couplings;
    }
}

impl<'a> Propagator for HEOMPropagator<'a> {
    fn hamiltonian(&self) -> &Hamiltonian {
        self.ham
    }

    fn pack(&self, rho: &Op) -> Op {
        let n = self.ham.dim();
        let mut state = Op::zeros(n, n * self.hierarchy.len());
        state.columns_mut(0, n).copy_from(rho);
        state
    }

    fn unpack(&self, state: &Op) -> Op {
        self.member(state, 0)
    }

    fn rhs(&self, _t: f64, state: &Op, out: &mut Op) {
        let n = self.ham.dim();
        let h = self.ham.system();
        let baths = self.ham.baths();
        let mi = c64::new(0.0, -1.0);

        //  Diagonal part: coherent evolution, damping and tail correction
        for m in 0..self.hierarchy.len() {
            let rho = state.columns(m * n, n);
            let mut d = (h * &rho - &rho * h) * mi - &rho * self.damping[m];
            if self.correction {
                for (bath, &tail) in baths.iter().zip(self.tails.iter()) {
                    if tail != 0.0 {
                        let a = &bath.coupling;
                        let ar = a * &rho;
                        let ra = &rho * a;
                        d -= (a * &ar - &ar * a - a * &ra + &ra * a) * c64::new(tail, 0.0);
                    }
                }
            }
            out.columns_mut(m * n, n).copy_from(&d);
        }

        //  Off-diagonal couplings between members
        for cpl in self.couplings.iter() {
            let a = &baths[self.modes[cpl.mode].bath].coupling;
            let src = state.columns(cpl.source * n, n);
            let contrib = match cpl.kind {
                CouplingKind::Raise { coef } => (a * &src - &src * a) * (mi * coef),
                CouplingKind::Lower { coef, c, c_bar } => {
                    (a * &src * c - &src * a * c_bar) * (mi * coef)
                }
                CouplingKind::Terminate { coef, c, c_bar } => {
                    let x = a * &src * c - &src * a * c_bar;
                    (a * &x - &x * a) * (-coef)
                }
            };
            let mut block = out.columns_mut(cpl.target * n, n);
            block += &contrib;
        }
    }

    fn locate_instability(&self, state: &Op) -> Option<String> {
        let n = self.ham.dim();
        (0..self.hierarchy.len())
            .find(|&m| !all_finite(&state.columns(m * n, n)))
            .map(|m| {
                let idx = self.hierarchy.index(m);
                format!("hierarchy member {} (level {})", idx, idx.level())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oqs::bath::SpectralForm;
    use approx::assert_abs_diff_eq;
    use qrho_core::util::hermiticity_deviation;
    use qrho_core::{op_from_real_rows, qtrace};

    fn dimer(lambda: f64) -> Hamiltonian {
        let h = op_from_real_rows(3, &[
            0.0, 0.0, 0.0,
            0.0, 0.0, -1.0,
            0.0, -1.0, 0.0]);
        let a1 = op_from_real_rows(3, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let a2 = op_from_real_rows(3, &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let form = SpectralForm::OhmicLorentz { lambda, omega_c: 1.0 };
        Hamiltonian::build(h, vec![a1, a2], &[form, form], 1.0).unwrap()
    }

    #[test]
    fn test_configuration_errors() {
        let ham = dimer(0.5);
        assert!(matches!(
            HEOMPropagator::create(&ham, 4, 0),
            Err(ConfigurationError::Truncation { value: 0, .. })
        ));
        assert!(matches!(
            HEOMPropagator::create(&ham, 65, 1),
            Err(ConfigurationError::Truncation { value: 65, .. })
        ));
        // 20 modes at depth 20: C(40, 20) members
        assert!(matches!(
            HEOMPropagator::create(&ham, 20, 10),
            Err(ConfigurationError::HierarchyTooLarge { modes: 20, .. })
        ));
    }

    #[test]
    fn test_hierarchy_layout() {
        let ham = dimer(0.5);
        let prop = HEOMPropagator::create(&ham, 4, 1).unwrap();
        assert_eq!(prop.n_members(), 15);
        assert_eq!(prop.mode_terms().count(), 2);
        let rho = op_from_real_rows(3, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let state = prop.pack(&rho);
        assert_eq!(state.shape(), (3, 45));
        assert_eq!(prop.unpack(&state), rho);
        assert_abs_diff_eq!(prop.member(&state, 3).norm(), 0.0);
    }

    #[test]
    fn test_trace_and_hermiticity() {
        let ham = dimer(0.5);
        let mut rho0 = op_from_real_rows(3, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        rho0[(1, 2)] = c64::new(0.1, 0.2);
        rho0[(2, 1)] = c64::new(0.1, -0.2);
        for &terminator in &[Terminator::Markovian, Terminator::Drop] {
            let prop = HEOMPropagator::create(&ham, 3, 2).unwrap().terminator(terminator);
            for sample in prop.evolve(&rho0, 5.0, 0.02).unwrap() {
                let (t, rho) = sample.unwrap();
                assert_abs_diff_eq!(qtrace(&rho).re, 1.0, epsilon = 1e-8);
                assert!(hermiticity_deviation(&rho) < 1e-8, "t = {}", t);
            }
        }
    }

    #[test]
    fn test_uncoupled_is_unitary() {
        let ham = dimer(0.0);
        let prop = HEOMPropagator::create(&ham, 2, 2).unwrap();
        let rho0 = op_from_real_rows(3, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let (tf, rho) = prop.evolve(&rho0, 2.0, 0.01).unwrap().last().unwrap().unwrap();
        // |1> precesses into |2> under -sigma_x in the {1, 2} block
        assert_abs_diff_eq!(rho[(1, 1)].re, tf.cos().powi(2), epsilon = 1e-8);
        assert_abs_diff_eq!(rho[(2, 2)].re, tf.sin().powi(2), epsilon = 1e-8);
    }

    #[test]
    fn test_instability_names_member() {
        let ham = dimer(0.5);
        let prop = HEOMPropagator::create(&ham, 1, 1).unwrap();
        let mut state = prop.pack(&Op::identity(3, 3));
        assert_eq!(prop.locate_instability(&state), None);
        state[(0, 3 * 2)] = c64::new(f64::NAN, 0.0);
        let entity = prop.locate_instability(&state).unwrap();
        assert!(entity.contains("[0, 1]"), "{}", entity);
        assert!(entity.contains("level 1"));
    }
}
