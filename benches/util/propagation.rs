use criterion::{black_box, BenchmarkId, Criterion};
use qrho::oqs::{HEOMPropagator, Hamiltonian, Method, Propagator, RedfieldPropagator, SpectralForm};
use qrho::spec::absorption;
use qrho::Op;
use qrho_core::{basis_projector, op_from_real_rows};

fn trimer(omega_c: f64) -> Hamiltonian {
    let h = op_from_real_rows(3, &[
        0.0, 0.0, 0.0,
        0.0, 0.0, -1.0,
        0.0, -1.0, 0.0]);
    let form = SpectralForm::OhmicLorentz { lambda: 0.5, omega_c };
    Hamiltonian::build(h, vec![basis_projector(3, 1), basis_projector(3, 2)], &[form, form], 1.0).unwrap()
}

fn dipole() -> Op {
    op_from_real_rows(3, &[
        0.0, 1.0, 1.0,
        1.0, 0.0, 0.0,
        1.0, 0.0, 0.0])
}

/// One right-hand side evaluation over hierarchies of increasing depth
pub fn bench_heom_rhs(c: &mut Criterion) {
    let ham = trimer(1.0);
    let mut group = c.benchmark_group("HEOM rhs: trimer, K = 2");
    for depth in [2usize, 4, 6, 8].iter() {
        let prop = HEOMPropagator::create(&ham, *depth, 2).unwrap();
        let state = prop.pack(&(dipole() * basis_projector(3, 0)));
        let mut out = state.clone();
        group.bench_with_input(BenchmarkId::new("members", prop.n_members()), depth, |b, _| {
            b.iter(|| prop.rhs(0.0, black_box(&state), &mut out))
        });
    }
    group.finish();
}

/// Liouville-space Redfield generator, Markovian and time-dependent
pub fn bench_redfield_generator(c: &mut Criterion) {
    let ham = trimer(1.0);
    let mut group = c.benchmark_group("Redfield generator: trimer");
    for k in [1usize, 8, 64].iter() {
        let prop = RedfieldPropagator::create(&ham, Method::TCL2).with_matsubara_terms(*k);
        group.bench_with_input(BenchmarkId::new("TCL2, Matsubara terms", k), k, |b, _| {
            b.iter(|| prop.generator(black_box(1.5)))
        });
    }
    group.finish();
}

/// Full lineshape of the default sweep's fast-bath point
pub fn bench_trimer_absorption(c: &mut Criterion) {
    let ham = trimer(1.0);
    let mu = dipole();
    let rho_g = basis_projector(3, 0);
    let mut group = c.benchmark_group("Absorption: trimer, t_final = 50");
    let tc2 = RedfieldPropagator::create(&ham, Method::TC2);
    group.bench_function("TC2", |b| {
        b.iter(|| absorption(&mu, &tc2, -4.0, 4.0, 0.02, &rho_g, 50.0, 0.05).unwrap())
    });
    let heom = HEOMPropagator::create(&ham, 4, 1).unwrap();
    group.bench_function("HEOM L = 4, K = 1", |b| {
        b.iter(|| absorption(&mu, &heom, -4.0, 4.0, 0.02, &rho_g, 50.0, 0.05).unwrap())
    });
    group.finish();
}
