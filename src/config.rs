//! Lineshape sweep configuration.
//!
//! A [`Config`] fixes the system (Hamiltonian, couplings, dipole, ground
//! state), a bath form with grids over its cutoff frequency and inverse
//! temperature, the propagation methods to compare and the spectral window.
//! [`Config::jobs`] expands it into independent [`Job`]s, one per output file.
//!
//! The default reproduces the three-site lineshape sweep of
//! Chen, Zheng, Shi and Tanimura, J. Chem. Phys. 131, 094502 (2009).

use std::fs;
use std::path::{Path, PathBuf};

use itertools::iproduct;
use log::info;
use qrho_core::Op;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::oqs::bath::SpectralForm;
use crate::oqs::ham::Hamiltonian;
use crate::oqs::heom::{HEOMPropagator, Terminator};
use crate::oqs::redfield::{Method, RedfieldPropagator};
use crate::spec::{Damping, Spectroscopy, Spectrum};

/// Real matrices given as lists of rows
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub hamiltonian: Vec<Vec<f64>>,
    pub couplings: Vec<Vec<Vec<f64>>>,
    pub dipole: Vec<Vec<f64>>,
    pub ground_state: Vec<Vec<f64>>,
}

/// One spectral density form shared by every bath, swept over its
/// characteristic frequency (omega_c, or omega_0 for "underdamped") and beta
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BathConfig {
    #[serde(default = "default_form")]
    pub form: String,
    pub lambda: f64,
    pub omega_c: Vec<f64>,
    pub beta: Vec<f64>,
    /// Damping of the "underdamped" form
    #[serde(default)]
    pub gamma: Option<f64>,
}

fn default_form() -> String {
    "ohmic-lorentz".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodConfig {
    /// "HEOM", or a Redfield method tag ("TC2", "TCL2", "TNL", "TL")
    pub name: String,
    #[serde(default)]
    pub depths: Vec<usize>,
    #[serde(default)]
    pub matsubara: Vec<usize>,
    #[serde(default)]
    pub terminator: Terminator,
    #[serde(default)]
    pub secular: bool,
    /// Overrides the window's propagation time
    #[serde(default)]
    pub t_final: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub emin: f64,
    pub emax: f64,
    pub de: f64,
    pub t_final: f64,
    pub dt: f64,
    #[serde(default)]
    pub damping: Damping,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub system: SystemConfig,
    pub bath: BathConfig,
    pub methods: Vec<MethodConfig>,
    pub window: WindowConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        let site = |n: usize| {
            let mut m = vec![vec![0.0; 3]; 3];
            m[n][n] = 1.0;
            m
        };
        let heom = MethodConfig {
            name: "HEOM".to_string(),
            depths: vec![4],
            matsubara: vec![1],
            terminator: Terminator::default(),
            secular: false,
            t_final: None,
        };
        let tl = MethodConfig { name: "TL".to_string(), depths: vec![], matsubara: vec![], ..heom.clone() };
        let tnl = MethodConfig { name: "TNL".to_string(), t_final: Some(100.0), ..tl.clone() };

        Config {
            system: SystemConfig {
                hamiltonian: vec![
                    vec![0.0, 0.0, 0.0],
                    vec![0.0, 0.0, -1.0],
                    vec![0.0, -1.0, 0.0]],
                couplings: vec![site(1), site(2)],
                dipole: vec![
                    vec![0.0, 1.0, 1.0],
                    vec![1.0, 0.0, 0.0],
                    vec![1.0, 0.0, 0.0]],
                ground_state: site(0),
            },
            bath: BathConfig {
                form: default_form(),
                lambda: 0.5,
                omega_c: vec![0.1, 0.3, 1.0],
                beta: vec![1.0, 3.0],
                gamma: None,
            },
            methods: vec![heom, tl, tnl],
            window: WindowConfig {
                emin: -4.0,
                emax: 4.0,
                de: 0.02,
                t_final: 50.0,
                dt: 0.05,
                damping: Damping::Undamped,
            },
            output_dir: default_output_dir(),
        }
    }
}

/// Propagation scheme of a single job
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JobKind {
    Redfield { method: Method, secular: bool },
    Heom { depth: usize, matsubara: usize, terminator: Terminator },
}

/// One parameter combination of a sweep
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub omega_c: f64,
    pub beta: f64,
    /// Method label used in the output file name
    pub label: String,
    pub kind: JobKind,
    pub window: WindowConfig,
}

impl Job {
    pub fn file_name(&self) -> String {
        format!("abs_omegac-{:.1}_beta-{:.1}_{}.dat", self.omega_c, self.beta, self.label)
    }

    /// Build the Hamiltonian and propagator for this job and compute its spectrum
    pub fn run(&self, config: &Config) -> Result<Spectrum> {
        let sys = &config.system;
        let h = matrix_from_rows("system Hamiltonian", &sys.hamiltonian)?;
        let couplings = sys
            .couplings
            .iter()
            .enumerate()
            .map(|(i, rows)| matrix_from_rows(&format!("coupling operator {}", i), rows))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let dipole = matrix_from_rows("dipole operator", &sys.dipole)?;
        let rho_g = matrix_from_rows("ground state", &sys.ground_state)?;

        let form = config.bath.spectral_form(self.omega_c)?;
        let forms = vec![form; couplings.len()];
        let ham = Hamiltonian::build(h, couplings, &forms, self.beta.recip())?;

        let w = &self.window;
        info!("Running {}", self.file_name());
        match self.kind {
            JobKind::Redfield { method, secular } => {
                let prop = RedfieldPropagator::create(&ham, method).secular(secular);
                Spectroscopy::new(&dipole, &prop)
                    .with_window(w.damping)
                    .absorption(w.emin, w.emax, w.de, &rho_g, w.t_final, w.dt)
            }
            JobKind::Heom { depth, matsubara, terminator } => {
                let prop = HEOMPropagator::create(&ham, depth, matsubara)?.terminator(terminator);
                Spectroscopy::new(&dipole, &prop)
                    .with_window(w.damping)
                    .absorption(w.emin, w.emax, w.de, &rho_g, w.t_final, w.dt)
            }
        }
    }
}

impl BathConfig {
    fn spectral_form(&self, omega: f64) -> std::result::Result<SpectralForm, ValidationError> {
        match self.gamma {
            Some(gamma) => SpectralForm::from_descriptor(&self.form, &[self.lambda, omega, gamma]),
            None => SpectralForm::from_descriptor(&self.form, &[self.lambda, omega]),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Cartesian product omega_c x beta x method (x L x K for HEOM),
    /// in that nesting order
    pub fn jobs(&self) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for (&omega_c, &beta, m) in iproduct!(self.bath.omega_c.iter(), self.bath.beta.iter(), self.methods.iter()) {
            let window = WindowConfig {
                t_final: m.t_final.unwrap_or(self.window.t_final),
                ..self.window
            };
            if m.name.eq_ignore_ascii_case("HEOM") {
                for (&depth, &matsubara) in iproduct!(m.depths.iter(), m.matsubara.iter()) {
                    jobs.push(Job {
                        omega_c,
                        beta,
                        label: format!("HEOM_L-{}_K-{}", depth, matsubara),
                        kind: JobKind::Heom { depth, matsubara, terminator: m.terminator },
                        window,
                    });
                }
            } else {
                let method: Method = m.name.parse()?;
                jobs.push(Job {
                    omega_c,
                    beta,
                    label: m.name.clone(),
                    kind: JobKind::Redfield { method, secular: m.secular },
                    window,
                });
            }
        }
        Ok(jobs)
    }
}

/// Complex operator from rows of real numbers
pub fn matrix_from_rows(name: &str, rows: &[Vec<f64>]) -> std::result::Result<Op, ValidationError> {
    let n = rows.len();
    if let Some(bad) = rows.iter().find(|r| r.len() != n) {
        return Err(ValidationError::DimensionMismatch {
            name: name.to_string(),
            expected: format!("{} columns", n),
            actual: format!("{} columns", bad.len()),
        });
    }
    let flat: Vec<f64> = rows.iter().flatten().cloned().collect();
    Ok(qrho_core::op_from_real_rows(n, &flat))
}
