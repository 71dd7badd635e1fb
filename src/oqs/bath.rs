use std::f64::consts::PI;

use num_complex::Complex64 as c64;
use num_traits::Zero;
use qrho_core::Op;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Phenomenological spectral densities with an exact exponential
/// (Matsubara) decomposition of their correlation function.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "kebab-case")]
pub enum SpectralForm {
    /// Drude-Lorentz (overdamped Brownian) density
    ///     J(w) = 2 lambda w omega_c / (w^2 + omega_c^2)
    OhmicLorentz { lambda: f64, omega_c: f64 },
    /// Underdamped Brownian oscillator
    ///     J(w) = 2 lambda gamma omega_0^2 w / ((omega_0^2 - w^2)^2 + gamma^2 w^2)
    Underdamped { lambda: f64, omega_0: f64, gamma: f64 },
}

impl SpectralForm {
    /// Parse a descriptor such as `("ohmic-lorentz", [lambda, omega_c])`
    pub fn from_descriptor(tag: &str, params: &[f64]) -> Result<Self, ValidationError> {
        let expect = |n: usize| {
            if params.len() == n {
                Ok(())
            } else {
                Err(ValidationError::ParameterCount {
                    form: tag.to_string(),
                    expected: n,
                    actual: params.len(),
                })
            }
        };
        let form = match tag.to_ascii_lowercase().as_str() {
            "ohmic-lorentz" | "drude" | "drude-lorentz" => {
                expect(2)?;
                SpectralForm::OhmicLorentz { lambda: params[0], omega_c: params[1] }
            }
            "underdamped" | "brownian" => {
                expect(3)?;
                SpectralForm::Underdamped { lambda: params[0], omega_0: params[1], gamma: params[2] }
            }
            _ => return Err(ValidationError::UnknownSpectralDensity(tag.to_string())),
        };
        form.validate()?;
        Ok(form)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            SpectralForm::OhmicLorentz { .. } => "ohmic-lorentz",
            SpectralForm::Underdamped { .. } => "underdamped",
        }
    }

    pub fn reorganization_energy(&self) -> f64 {
        match *self {
            SpectralForm::OhmicLorentz { lambda, .. } => lambda,
            SpectralForm::Underdamped { lambda, .. } => lambda,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let non_negative = |name: &str, x: f64| {
            if x.is_finite() && x >= 0.0 { Ok(()) } else { Err(ValidationError::non_negative(name, x)) }
        };
        let positive = |name: &str, x: f64| {
            if x.is_finite() && x > 0.0 { Ok(()) } else { Err(ValidationError::positive(name, x)) }
        };
        match *self {
            SpectralForm::OhmicLorentz { lambda, omega_c } => {
                non_negative("reorganization energy", lambda)?;
                positive("cutoff frequency", omega_c)?;
            }
            SpectralForm::Underdamped { lambda, omega_0, gamma } => {
                non_negative("reorganization energy", lambda)?;
                positive("oscillator frequency", omega_0)?;
                positive("damping", gamma)?;
                if omega_0 <= gamma / 2.0 {
                    return Err(ValidationError::InvalidParameter {
                        name: "oscillator frequency".to_string(),
                        requirement: "greater than damping/2 (underdamped)",
                        value: omega_0,
                    });
                }
            }
        }
        Ok(())
    }

    /// J(w), extended as an odd function to negative frequencies
    pub fn eval(&self, omega: f64) -> f64 {
        match *self {
            SpectralForm::OhmicLorentz { lambda, omega_c } => {
                2.0 * lambda * omega * omega_c / (omega * omega + omega_c * omega_c)
            }
            SpectralForm::Underdamped { lambda, omega_0, gamma } => {
                let w02 = omega_0 * omega_0;
                let d = w02 - omega * omega;
                2.0 * lambda * gamma * w02 * omega / (d * d + gamma * gamma * omega * omega)
            }
        }
    }

    /// lim_{w -> 0} J(w)/w
    fn slope_at_zero(&self) -> f64 {
        match *self {
            SpectralForm::OhmicLorentz { lambda, omega_c } => 2.0 * lambda / omega_c,
            SpectralForm::Underdamped { lambda, omega_0, gamma } => {
                2.0 * lambda * gamma / (omega_0 * omega_0)
            }
        }
    }
}

/// One exponential of the bath correlation function
///     C(t)  = sum_k amplitude_k      exp(-rate_k t)
///     C*(t) = sum_k conj_amplitude_k exp(-rate_k t)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BathCorrelationTerm {
    pub amplitude: c64,
    pub conj_amplitude: c64,
    pub rate: c64,
}

impl BathCorrelationTerm {
    pub fn eval(&self, t: f64) -> c64 {
        self.amplitude * (-self.rate * t).exp()
    }
}

/// A spectral density at a fixed bath temperature
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectralDensity {
    form: SpectralForm,
    temperature: f64,
}

impl SpectralDensity {
    pub fn new(form: SpectralForm, temperature: f64) -> Result<Self, ValidationError> {
        form.validate()?;
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ValidationError::positive("temperature", temperature));
        }
        // cot(beta omega_c / 2) diverges when a Matsubara frequency hits the Drude pole
        if let SpectralForm::OhmicLorentz { omega_c, .. } = form {
            let ratio = omega_c / (2.0 * PI * temperature);
            if ratio >= 0.5 && (ratio - ratio.round()).abs() < 1.0e-8 {
                return Err(ValidationError::MatsubaraResonance {
                    form: form.tag().to_string(),
                    nu: omega_c,
                });
            }
        }
        Ok(Self { form, temperature })
    }

    pub fn from_descriptor(tag: &str, params: &[f64], temperature: f64) -> Result<Self, ValidationError> {
        Self::new(SpectralForm::from_descriptor(tag, params)?, temperature)
    }

    pub fn form(&self) -> &SpectralForm {
        &self.form
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn beta(&self) -> f64 {
        self.temperature.recip()
    }

    /// J(w)
    pub fn spectral_density(&self, omega: f64) -> f64 {
        self.form.eval(omega)
    }

    /// Fourier transform of the correlation function
    ///                2 J(w)
    ///     g(w) =  ---------------
    ///             1 - exp(-beta w)
    /// As w -> 0
    ///     g = 2 J'(0) / beta
    pub fn gamma(&self, omega: f64) -> f64 {
        let beta = self.beta();
        if (beta * omega).abs() < 1.0e-8 {
            2.0 * self.form.slope_at_zero() / beta
        } else {
            2.0 * self.form.eval(omega) / (1.0 - (-beta * omega).exp())
        }
    }

    /// Re int_0^inf C(t) dt, the total weight of the correlation function
    pub fn zero_frequency_rate(&self) -> f64 {
        self.gamma(0.0) / 2.0
    }

    /// k-th bosonic Matsubara frequency 2 pi k / beta
    pub fn matsubara_frequency(&self, k: usize) -> f64 {
        2.0 * PI * (k as f64) * self.temperature
    }

    /// The pole terms of the density plus `k - 1` Matsubara terms.
    /// `k` is clamped to at least 1.
    pub fn correlation_terms(&self, k: usize) -> Vec<BathCorrelationTerm> {
        let beta = self.beta();
        let n_matsubara = k.max(1) - 1;
        let mut terms = Vec::with_capacity(n_matsubara + 2);

        match self.form {
            SpectralForm::OhmicLorentz { lambda, omega_c } => {
                let cot = (beta * omega_c / 2.0).tan().recip();
                let c0 = c64::new(lambda * omega_c * cot, -lambda * omega_c);
                terms.push(BathCorrelationTerm {
                    amplitude: c0,
                    conj_amplitude: c0.conj(),
                    rate: c64::new(omega_c, 0.0),
                });
                for m in 1..=n_matsubara {
                    let nu = self.matsubara_frequency(m);
                    let ck = 4.0 * lambda * omega_c / beta * nu / (nu * nu - omega_c * omega_c);
                    terms.push(BathCorrelationTerm {
                        amplitude: c64::new(ck, 0.0),
                        conj_amplitude: c64::new(ck, 0.0),
                        rate: c64::new(nu, 0.0),
                    });
                }
            }
            SpectralForm::Underdamped { lambda, omega_0, gamma } => {
                let coupling_sq = 2.0 * lambda * omega_0 * omega_0;
                let om = (omega_0 * omega_0 - gamma * gamma / 4.0).sqrt();
                let half_gamma = gamma / 2.0;
                let z = c64::new(beta * om, beta * half_gamma);
                let pre = coupling_sq / (4.0 * om);
                let coth = |w: c64| w.tanh().inv();
                let c_minus = (coth(z / 2.0) - 1.0) * pre;
                let c_plus = (coth(z.conj() / 2.0) + 1.0) * pre;
                // The pair of rates is complex conjugate, so C*(t) swaps their amplitudes
                terms.push(BathCorrelationTerm {
                    amplitude: c_minus,
                    conj_amplitude: c_plus.conj(),
                    rate: c64::new(half_gamma, -om),
                });
                terms.push(BathCorrelationTerm {
                    amplitude: c_plus,
                    conj_amplitude: c_minus.conj(),
                    rate: c64::new(half_gamma, om),
                });
                let pole = c64::new(om, half_gamma);
                for m in 1..=n_matsubara {
                    let nu = self.matsubara_frequency(m);
                    let denom = (pole * pole + nu * nu) * (pole.conj() * pole.conj() + nu * nu);
                    let ck = -2.0 * coupling_sq * gamma / beta * nu / denom.re;
                    terms.push(BathCorrelationTerm {
                        amplitude: c64::new(ck, 0.0),
                        conj_amplitude: c64::new(ck, 0.0),
                        rate: c64::new(nu, 0.0),
                    });
                }
            }
        }

        terms
    }

    /// Re sum_{k >= K} c_k / nu_k over the Matsubara terms left out of
    /// `correlation_terms(K)`. Those terms decay faster than any retained
    /// one and act as a white-noise contribution of this strength.
    pub fn matsubara_tail(&self, k: usize) -> f64 {
        let retained: f64 = self
            .correlation_terms(k)
            .iter()
            .map(|term| (term.amplitude / term.rate).re)
            .sum();
        self.zero_frequency_rate() - retained
    }

    /// C(t) from the first `k` terms
    pub fn correlation(&self, t: f64, k: usize) -> c64 {
        self.correlation_terms(k)
            .iter()
            .fold(c64::zero(), |acc, term| acc + term.eval(t))
    }

    /// Tabulate the one-sided transform of C(t) with `k` explicit terms
    pub fn half_fourier(&self, k: usize) -> HalfFourier {
        HalfFourier {
            terms: self.correlation_terms(k),
            tail: self.matsubara_tail(k),
            tail_rate: self.matsubara_frequency(k.max(1)),
        }
    }
}

/// One-sided Fourier transform of a bath correlation function
///     G(w, t) = int_0^t C(s) exp(i w s) ds
/// evaluated analytically term by term. The truncated Matsubara tail is
/// folded in as a single term decaying at the first omitted frequency.
#[derive(Clone, Debug)]
pub struct HalfFourier {
    terms: Vec<BathCorrelationTerm>,
    tail: f64,
    tail_rate: f64,
}

impl HalfFourier {
    /// G(w, infinity)
    pub fn markov(&self, omega: f64) -> c64 {
        let iw = c64::new(0.0, omega);
        self.terms
            .iter()
            .fold(c64::new(self.tail, 0.0), |acc, term| acc + term.amplitude / (term.rate - iw))
    }

    /// G(w, t); vanishes at t = 0 and tends to `markov(w)`
    pub fn at(&self, omega: f64, t: f64) -> c64 {
        let iw = c64::new(0.0, omega);
        let transient = self.terms.iter().fold(
            c64::new(self.tail * (-self.tail_rate * t).exp(), 0.0),
            |acc, term| {
                let z = term.rate - iw;
                acc + term.amplitude / z * (-z * t).exp()
            },
        );
        self.markov(omega) - transient
    }

    pub fn terms(&self) -> &[BathCorrelationTerm] {
        &self.terms
    }
}

/// A bath mode: the system operator it couples through and its spectral density
#[derive(Clone, Debug)]
pub struct BathModel {
    pub coupling: Op,
    pub density: SpectralDensity,
}

impl BathModel {
    pub fn new(coupling: Op, density: SpectralDensity) -> Self {
        Self { coupling, density }
    }
}
