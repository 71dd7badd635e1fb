//! Linear absorption from the dipole correlation function
//!     C(t) = Tr[ mu rho(t) ],    rho(0) = mu rho_g
//!     I(w) = 1/pi Re int_0^T exp(i w t) C(t) D(t) dt
//! with D an optional damping window and the integral taken by the
//! trapezoid rule on the propagation grid.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::{debug, warn};
use ndarray::{Array1, Zip};
use num_complex::Complex64 as c64;
use num_traits::Zero;
use qrho_core::{qtrace, Op};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Result, ValidationError};
use crate::oqs::propagator::{Evolution, Propagator};

/// Window applied to C(t) before the transform
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Damping {
    Undamped,
    /// exp(-t / tau)
    Exponential { tau: f64 },
    /// exp(-t^2 / (2 sigma^2))
    Gaussian { sigma: f64 },
}

impl Default for Damping {
    fn default() -> Self {
        Damping::Undamped
    }
}

impl Damping {
    pub fn eval(&self, t: f64) -> f64 {
        match *self {
            Damping::Undamped => 1.0,
            Damping::Exponential { tau } => (-t / tau).exp(),
            Damping::Gaussian { sigma } => (-t * t / (2.0 * sigma * sigma)).exp(),
        }
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        match *self {
            Damping::Undamped => Ok(()),
            Damping::Exponential { tau: x } | Damping::Gaussian { sigma: x } => {
                if x.is_finite() && x > 0.0 {
                    Ok(())
                } else {
                    Err(ValidationError::positive("damping width", x))
                }
            }
        }
    }
}

/// Requested sampling that the time grid cannot honour.
/// The spectrum is still computed, on the grid actually used.
#[derive(Clone, Debug, PartialEq)]
pub enum SamplingWarning {
    /// t_final is not a multiple of dt
    IncommensurateSteps { requested: f64, effective: f64 },
    /// The frequency step is finer than 2 pi / T
    ResolutionTooFine { requested: f64, effective: f64 },
    /// The window extends past the Nyquist frequency pi / dt
    AboveNyquist { max_frequency: f64, nyquist: f64 },
}

impl fmt::Display for SamplingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingWarning::IncommensurateSteps { requested, effective } => write!(
                f,
                "t_final = {} is not a multiple of dt; propagating to t = {}",
                requested, effective
            ),
            SamplingWarning::ResolutionTooFine { requested, effective } => write!(
                f,
                "frequency step {} is finer than the resolution 2 pi / T = {}",
                requested, effective
            ),
            SamplingWarning::AboveNyquist { max_frequency, nyquist } => write!(
                f,
                "frequency window reaches |w| = {} beyond the Nyquist frequency {}",
                max_frequency, nyquist
            ),
        }
    }
}

/// Absorption spectrum on a uniform frequency grid
#[derive(Clone, Debug)]
pub struct Spectrum {
    pub frequencies: Array1<f64>,
    pub intensities: Array1<f64>,
    pub times: Array1<f64>,
    pub correlation: Array1<c64>,
    /// 2 pi / T of the time window actually propagated
    pub effective_resolution: f64,
    pub warnings: Vec<SamplingWarning>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// (frequency, intensity) pairs in ascending frequency
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies.iter().cloned().zip(self.intensities.iter().cloned())
    }

    /// Two whitespace-separated columns, frequency and intensity, one line per sample
    pub fn write_columns<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for (e, i) in self.iter() {
            writeln!(w, "{:.8} {:.8}", e, i)?;
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        self.write_columns(&mut w)?;
        w.flush()
    }
}

/// Upper bound on the number of frequencies of one spectrum
pub const MAX_FREQUENCIES: usize = 1_000_000;

/// Points emin + j de inside [emin, emax)
pub fn frequency_grid(emin: f64, emax: f64, de: f64) -> std::result::Result<Array1<f64>, ValidationError> {
    let r = (emax - emin) / de;
    let n = if (r - r.round()).abs() <= 1.0e-9 * r.max(1.0) {
        r.round()
    } else {
        r.ceil()
    };
    if n.is_nan() || n > MAX_FREQUENCIES as f64 {
        return Err(ValidationError::InvalidParameter {
            name: "number of frequencies (emax - emin) / de".to_string(),
            requirement: "at most 1000000",
            value: n,
        });
    }
    Ok(Array1::from_iter((0..n.max(0.0) as usize).map(|j| emin + j as f64 * de)))
}

/// Linear absorption driven by any [`Propagator`]
pub struct Spectroscopy<'p, P: Propagator + ?Sized> {
    dipole: Op,
    prop: &'p P,
    damping: Damping,
}

impl<'p, P: Propagator + ?Sized> Spectroscopy<'p, P> {
    pub fn new(dipole: &Op, prop: &'p P) -> Self {
        Self { dipole: dipole.clone(), prop, damping: Damping::default() }
    }

    pub fn with_window(mut self, damping: Damping) -> Self {
        self.damping = damping;
        self
    }

    fn check_operator(&self, name: &str, op: &Op) -> std::result::Result<(), ValidationError> {
        let n = self.prop.dim();
        if op.shape() != (n, n) {
            return Err(ValidationError::DimensionMismatch {
                name: name.to_string(),
                expected: format!("{}x{}", n, n),
                actual: format!("{}x{}", op.nrows(), op.ncols()),
            });
        }
        Ok(())
    }

    /// Sample C(t) = Tr[mu rho(t)] on t_k = k dt from rho(0) = mu rho_g
    pub fn correlation(&self, rho_g: &Op, t_final: f64, dt: f64) -> Result<(Array1<f64>, Array1<c64>)> {
        self.check_operator("dipole operator", &self.dipole)?;
        self.check_operator("ground state", rho_g)?;
        let rho0 = &self.dipole * rho_g;
        let evolution = Evolution::new(self.prop, &rho0, t_final, dt)?;
        let n = evolution.n_steps() + 1;
        let mut times = Vec::with_capacity(n);
        let mut corr = Vec::with_capacity(n);
        for sample in evolution {
            let (t, rho) = sample?;
            times.push(t);
            corr.push(qtrace(&(&self.dipole * rho)));
        }
        Ok((Array1::from(times), Array1::from(corr)))
    }

    /// Absorption spectrum on emin, emin + de, ... < emax
    pub fn absorption(
        &self,
        emin: f64,
        emax: f64,
        de: f64,
        rho_g: &Op,
        t_final: f64,
        dt: f64,
    ) -> Result<Spectrum> {
        if !(emin.is_finite() && emax.is_finite() && emax > emin) {
            return Err(ValidationError::InvalidParameter {
                name: "emax".to_string(),
                requirement: "finite and greater than emin",
                value: emax,
            }
            .into());
        }
        if !(de.is_finite() && de > 0.0) {
            return Err(ValidationError::positive("frequency step", de).into());
        }
        let frequencies = frequency_grid(emin, emax, de)?;
        self.damping.validate()?;

        let (times, corr) = self.correlation(rho_g, t_final, dt)?;
        let n_steps = times.len() - 1;
        let t_eff = n_steps as f64 * dt;
        let effective_resolution = 2.0 * PI / t_eff;

        let mut warnings = Vec::new();
        if (t_eff - t_final).abs() > 1.0e-9 * t_final {
            warnings.push(SamplingWarning::IncommensurateSteps { requested: t_final, effective: t_eff });
        }
        if de < effective_resolution {
            warnings.push(SamplingWarning::ResolutionTooFine { requested: de, effective: effective_resolution });
        }
        let nyquist = PI / dt;
        let max_frequency = emin.abs().max(emax.abs());
        if max_frequency > nyquist {
            warnings.push(SamplingWarning::AboveNyquist { max_frequency, nyquist });
        }
        for w in warnings.iter() {
            warn!("{}", w);
        }

        //  Trapezoid weights times the window
        let weighted: Array1<c64> = Array1::from_iter(times.iter().zip(corr.iter()).enumerate().map(
            |(i, (&t, &c))| {
                let w = if i == 0 || i == n_steps { dt / 2.0 } else { dt };
                c * (w * self.damping.eval(t))
            },
        ));

        let mut intensities = Array1::zeros(frequencies.len());
        Zip::from(&mut intensities).and(&frequencies).par_for_each(|i, &e| {
            let sum = times
                .iter()
                .zip(weighted.iter())
                .fold(c64::zero(), |acc, (&t, &c)| acc + c64::new(0.0, e * t).exp() * c);
            *i = sum.re / PI;
        });
        debug!(
            "Spectrum: {} frequencies, {} time samples, resolution {:.4}",
            frequencies.len(),
            times.len(),
            effective_resolution
        );

        Ok(Spectrum {
            frequencies,
            intensities,
            times,
            correlation: corr,
            effective_resolution,
            warnings,
        })
    }
}

/// Absorption spectrum of `dipole` under `prop` starting from `rho_g`
pub fn absorption<P: Propagator + ?Sized>(
    dipole: &Op,
    prop: &P,
    emin: f64,
    emax: f64,
    de: f64,
    rho_g: &Op,
    t_final: f64,
    dt: f64,
) -> Result<Spectrum> {
    Spectroscopy::new(dipole, prop).absorption(emin, emax, de, rho_g, t_final, dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::oqs::bath::SpectralForm;
    use crate::oqs::ham::Hamiltonian;
    use crate::oqs::redfield::{Method, RedfieldPropagator};
    use approx::assert_abs_diff_eq;
    use qrho_core::op_from_real_rows;

    /// Two-level system whose excited state is coupled diagonally to the bath
    fn dephasing_qubit() -> Hamiltonian {
        let h = op_from_real_rows(2, &[0.0, 0.0, 0.0, 1.0]);
        let a = op_from_real_rows(2, &[0.0, 0.0, 0.0, 1.0]);
        let form = SpectralForm::OhmicLorentz { lambda: 0.1, omega_c: 1.0 };
        Hamiltonian::build(h, vec![a], &[form], 1.0).unwrap()
    }

    fn sx() -> Op {
        op_from_real_rows(2, &[0.0, 1.0, 1.0, 0.0])
    }

    fn ground() -> Op {
        op_from_real_rows(2, &[1.0, 0.0, 0.0, 0.0])
    }

    #[test]
    fn test_frequency_grid() {
        let g = frequency_grid(-4.0, 4.0, 0.02).unwrap();
        assert_eq!(g.len(), 400);
        assert_abs_diff_eq!(g[0], -4.0);
        assert_abs_diff_eq!(g[399], 3.98, epsilon = 1e-12);
        assert_eq!(frequency_grid(0.0, 1.0, 0.3).unwrap().len(), 4);
        assert_eq!(frequency_grid(0.0, 0.9, 0.3).unwrap().len(), 3);

        assert_eq!(frequency_grid(0.0, 1.0, 1.0e-6).unwrap().len(), MAX_FREQUENCIES);
        assert!(matches!(
            frequency_grid(0.0, 1.0, 1.0e-7),
            Err(ValidationError::InvalidParameter { .. })
        ));
        assert!(frequency_grid(-1.0e300, 1.0e300, 1.0e-300).is_err());
    }

    #[test]
    fn test_pure_dephasing_line_is_positive() {
        let ham = dephasing_qubit();
        let prop = RedfieldPropagator::create(&ham, Method::TC2);
        let spec = absorption(&sx(), &prop, -1.0, 3.0, 0.01, &ground(), 200.0, 0.05).unwrap();
        assert_eq!(spec.len(), 400);
        let (imax, &max) = spec
            .intensities
            .iter()
            .enumerate()
            .fold((0, &f64::MIN), |acc, x| if x.1 > acc.1 { x } else { acc });
        assert!(max > 0.0);
        for &i in spec.intensities.iter() {
            assert!(i >= -1e-9 * max, "negative intensity {}", i);
        }
        // the line sits near the (reorganization-shifted) transition frequency
        assert!((spec.frequencies[imax] - 1.0).abs() < 0.3, "peak at {}", spec.frequencies[imax]);
        assert_abs_diff_eq!(spec.correlation[0].re, 1.0);
    }

    #[test]
    fn test_windows_and_warnings() {
        let ham = dephasing_qubit();
        let prop = RedfieldPropagator::create(&ham, Method::TC2);
        let spec = Spectroscopy::new(&sx(), &prop)
            .with_window(Damping::Gaussian { sigma: 5.0 })
            .absorption(-2.0, 2.0, 0.01, &ground(), 10.03, 0.1)
            .unwrap();
        assert!(spec
            .warnings
            .iter()
            .any(|w| matches!(w, SamplingWarning::IncommensurateSteps { .. })));
        assert!(spec
            .warnings
            .iter()
            .any(|w| matches!(w, SamplingWarning::ResolutionTooFine { .. })));
        assert_eq!(spec.times.len(), 101);

        let spec = absorption(&sx(), &prop, -40.0, 40.0, 1.0, &ground(), 10.0, 0.1).unwrap();
        assert_eq!(
            spec.warnings,
            vec![SamplingWarning::AboveNyquist { max_frequency: 40.0, nyquist: PI / 0.1 }]
        );

        assert_abs_diff_eq!(Damping::Exponential { tau: 2.0 }.eval(2.0), (-1.0_f64).exp());
        assert_abs_diff_eq!(Damping::Undamped.eval(100.0), 1.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        let ham = dephasing_qubit();
        let prop = RedfieldPropagator::create(&ham, Method::TC2);
        let r = absorption(&Op::identity(3, 3), &prop, -1.0, 1.0, 0.1, &ground(), 1.0, 0.1);
        assert!(matches!(r, Err(Error::Validation(ValidationError::DimensionMismatch { .. }))));
        let r = absorption(&sx(), &prop, 1.0, -1.0, 0.1, &ground(), 1.0, 0.1);
        assert!(matches!(r, Err(Error::Validation(_))));
        let r = absorption(&sx(), &prop, -1.0, 1.0, 0.0, &ground(), 1.0, 0.1);
        assert!(matches!(r, Err(Error::Validation(_))));
        // an oversized grid is refused before any propagation
        let r = absorption(&sx(), &prop, -1.0e6, 1.0e6, 1.0e-3, &ground(), 1.0, 0.1);
        assert!(matches!(r, Err(Error::Validation(ValidationError::InvalidParameter { .. }))));
        let r = Spectroscopy::new(&sx(), &prop)
            .with_window(Damping::Exponential { tau: -1.0 })
            .absorption(-1.0, 1.0, 0.1, &ground(), 1.0, 0.1);
        assert!(matches!(r, Err(Error::Validation(_))));
    }

    #[test]
    fn test_write_columns() {
        let ham = dephasing_qubit();
        let prop = RedfieldPropagator::create(&ham, Method::TC2);
        let spec = absorption(&sx(), &prop, -1.0, 1.0, 0.5, &ground(), 20.0, 0.1).unwrap();
        let mut buf = Vec::new();
        spec.write_columns(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("-1.00000000 "));
        assert_eq!(lines[1].split_whitespace().count(), 2);
    }
}
