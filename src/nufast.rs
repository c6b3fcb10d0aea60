//! Three-flavour oscillation kernel used by the built-in engines.
//!
//! Implements the NuFast algorithm of P. Denton: vacuum probabilities from the
//! PMNS |U|² elements, and matter probabilities from the DMP approximation of
//! the largest eigenvalue with optional Newton refinement.
//!
//! The mixing-dependent part ([`PmnsSquares`]) is computed once per parameter
//! set and reused for every energy/baseline, which is how the engines evaluate
//! a full grid on every reweight.

#![allow(non_snake_case)]

use core::f64::consts::PI;

/// eV² × km → GeV conversion of the oscillation phase, divided by 4.
const EV_SQ_KM_TO_GEV_OVER4: f64 = 1e-9 / 1.97327e-7 * 1e3 / 4.0;

/// Y_e × ρ × E → matter potential A (eV² per g/cm³ per GeV).
const YE_RHO_E_TO_A: f64 = 1.52e-4;

/// `probs[α][β]` = P(ν_α → ν_β) with 0 = e, 1 = μ, 2 = τ.
pub type ProbabilityMatrix = [[f64; 3]; 3];

/// Vacuum mixing parameters. Angles as sin²θ, δ in radians, splittings in eV².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixingParameters {
    pub s12sq: f64,
    pub s13sq: f64,
    pub s23sq: f64,
    pub delta: f64,
    pub Dmsq21: f64,
    /// Positive for normal ordering, negative for inverted.
    pub Dmsq31: f64,
}

impl MixingParameters {
    /// NuFit 5.2 best fit, normal ordering.
    pub fn nufit52_no() -> Self {
        Self {
            s12sq: 0.307,
            s13sq: 0.02203,
            s23sq: 0.546,
            delta: 1.36 * PI,
            Dmsq21: 7.42e-5,
            Dmsq31: 2.517e-3,
        }
    }

    /// NuFit 5.2 best fit, inverted ordering.
    pub fn nufit52_io() -> Self {
        Self {
            s12sq: 0.307,
            s13sq: 0.02219,
            s23sq: 0.539,
            delta: 1.56 * PI,
            Dmsq21: 7.42e-5,
            Dmsq31: -2.498e-3,
        }
    }
}

/// Constant-density medium along the baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Medium {
    /// Density ρ in g/cm³.
    pub rho: f64,
    /// Electron fraction Y_e.
    pub Ye: f64,
    /// Newton iterations on the DMP eigenvalue (0 = plain DMP).
    pub N_Newton: u8,
}

/// PMNS |U|² rows plus the quantities the matter calculation needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmnsSquares {
    mixing: MixingParameters,
    /// |U_e1|², |U_e2|², |U_e3|²
    e: [f64; 3],
    /// |U_μ1|², |U_μ2|², |U_μ3|²
    mu: [f64; 3],
    /// 8 × Jarlskog invariant in vacuum
    J8: f64,
}

impl PmnsSquares {
    pub fn new(mixing: &MixingParameters) -> Self {
        let MixingParameters { s12sq, s13sq, s23sq, delta, .. } = *mixing;
        let c13sq = 1.0 - s13sq;

        let Ue3sq = s13sq;
        let Ue2sq = c13sq * s12sq;
        let Um3sq = c13sq * s23sq;

        let Ut2_part = s13sq * s12sq * s23sq;
        let Um2_part = (1.0 - s12sq) * (1.0 - s23sq);
        let Jrr = (Um2_part * Ut2_part).sqrt();
        let Um2sq = Um2_part + Ut2_part - 2.0 * Jrr * delta.cos();

        Self {
            mixing: *mixing,
            e: [1.0 - Ue3sq - Ue2sq, Ue2sq, Ue3sq],
            mu: [1.0 - Um3sq - Um2sq, Um2sq, Um3sq],
            J8: 8.0 * Jrr * c13sq * delta.sin(),
        }
    }

    pub fn mixing(&self) -> &MixingParameters {
        &self.mixing
    }

    /// Vacuum probabilities at baseline `L` (km) and energy `E` (GeV).
    ///
    /// A negative `E` evaluates the antineutrino probabilities.
    pub fn vacuum(&self, L: f64, E: f64) -> ProbabilityMatrix {
        let Lover4E = EV_SQ_KM_TO_GEV_OVER4 * L / E;
        let D21 = self.mixing.Dmsq21 * Lover4E;
        let D31 = self.mixing.Dmsq31 * Lover4E;

        let phases = Phases::new(D21.sin(), D31.sin(), (D31 - D21).sin());
        assemble(self.e, self.mu, self.J8, &phases)
    }

    /// Matter probabilities at baseline `L` (km) and energy `E` (GeV) in a
    /// constant-density medium. A negative `E` gives antineutrinos.
    pub fn matter(&self, L: f64, E: f64, medium: &Medium) -> ProbabilityMatrix {
        let MixingParameters { s12sq, s13sq, Dmsq21, Dmsq31, .. } = self.mixing;
        let [_, Ue2sq, Ue3sq] = self.e;
        let [_, Um2sq, Um3sq] = self.mu;

        let Amatter = medium.Ye * medium.rho * E * YE_RHO_E_TO_A;
        let Dmsqee = Dmsq31 - s12sq * Dmsq21;

        // Characteristic polynomial coefficients
        let A_sum = Dmsq21 + Dmsq31;
        let See = A_sum - Dmsq21 * Ue2sq - Dmsq31 * Ue3sq;
        let Tmm_base = Dmsq21 * Dmsq31;
        let Tee = Tmm_base * (1.0 - Ue3sq - Ue2sq);
        let C = Amatter * Tee;
        let A = A_sum + Amatter;
        let B = Tmm_base + Amatter * See;

        // lambda3 from the MP/DMP lambda+
        let xmat = Amatter / Dmsqee;
        let tmp = 1.0 - xmat;
        let mut lambda3 =
            Dmsq31 + 0.5 * Dmsqee * (xmat - 1.0 + (tmp * tmp + 4.0 * s13sq * xmat).sqrt());
        for _ in 0..medium.N_Newton {
            lambda3 = (lambda3 * lambda3 * (lambda3 - A) + C) / (lambda3 * (2.0 * lambda3 - A) + B);
        }

        let tmp = A - lambda3;
        let Dlambda21 = (tmp * tmp - 4.0 * C / lambda3).sqrt();
        let lambda2 = 0.5 * (A - lambda3 + Dlambda21);
        let Dlambda32 = lambda3 - lambda2;
        let Dlambda31 = Dlambda32 + Dlambda21;

        // Eigenvector-eigenvalue identity for the matter |V|²
        let PiDlambdaInv = 1.0 / (Dlambda31 * Dlambda32 * Dlambda21);
        let Xp3 = PiDlambdaInv * Dlambda21;
        let Xp2 = -PiDlambdaInv * Dlambda31;

        let Ve3sq = (lambda3 * (lambda3 - See) + Tee) * Xp3;
        let Ve2sq = (lambda2 * (lambda2 - See) + Tee) * Xp2;

        let Smm = A - Dmsq21 * Um2sq - Dmsq31 * Um3sq;
        let Tmm = Tmm_base * (1.0 - Um3sq - Um2sq) + Amatter * (See + Smm - A_sum);
        let Vm3sq = (lambda3 * (lambda3 - Smm) + Tmm) * Xp3;
        let Vm2sq = (lambda2 * (lambda2 - Smm) + Tmm) * Xp2;

        // Naumov-Harrison-Scott for the matter Jarlskog
        let J8matter = self.J8 * Dmsq21 * Dmsq31 * (Dmsq31 - Dmsq21) * PiDlambdaInv;

        let Lover4E = EV_SQ_KM_TO_GEV_OVER4 * L / E;
        let D21 = Dlambda21 * Lover4E;
        let D32 = Dlambda32 * Lover4E;
        let phases = Phases::new(D21.sin(), (D32 + D21).sin(), D32.sin());

        assemble(
            [1.0 - Ve3sq - Ve2sq, Ve2sq, Ve3sq],
            [1.0 - Vm3sq - Vm2sq, Vm2sq, Vm3sq],
            J8matter,
            &phases,
        )
    }
}

/// sin Δ_ij terms of one evaluation point.
struct Phases {
    triple_sin: f64,
    /// 2 sin²Δ21, 2 sin²Δ31, 2 sin²Δ32
    sinsq2: [f64; 3],
}

impl Phases {
    fn new(sinD21: f64, sinD31: f64, sinD32: f64) -> Self {
        Self {
            triple_sin: sinD21 * sinD31 * sinD32,
            sinsq2: [2.0 * sinD21 * sinD21, 2.0 * sinD31 * sinD31, 2.0 * sinD32 * sinD32],
        }
    }
}

/// Build the full matrix from the e and μ rows; the τ row and the remaining
/// entries follow from unitarity.
fn assemble(e: [f64; 3], mu: [f64; 3], J8: f64, phases: &Phases) -> ProbabilityMatrix {
    let [Ue1sq, Ue2sq, Ue3sq] = e;
    let [Um1sq, Um2sq, Um3sq] = mu;
    let Ut1sq = 1.0 - Um1sq - Ue1sq;
    let Ut2sq = 1.0 - Um2sq - Ue2sq;
    let Ut3sq = 1.0 - Um3sq - Ue3sq;
    let [s21, s31, s32] = phases.sinsq2;

    let Pme_CPC = (Ut3sq - Um2sq * Ue1sq - Um1sq * Ue2sq) * s21
        + (Ut2sq - Um3sq * Ue1sq - Um1sq * Ue3sq) * s31
        + (Ut1sq - Um3sq * Ue2sq - Um2sq * Ue3sq) * s32;
    let Pme_CPV = -J8 * phases.triple_sin;

    let Pmm = 1.0 - 2.0 * (Um2sq * Um1sq * s21 + Um3sq * Um1sq * s31 + Um3sq * Um2sq * s32);
    let Pee = 1.0 - 2.0 * (Ue2sq * Ue1sq * s21 + Ue3sq * Ue1sq * s31 + Ue3sq * Ue2sq * s32);

    let Pem = Pme_CPC - Pme_CPV;
    let Pme = Pme_CPC + Pme_CPV;
    let Pet = 1.0 - Pee - Pem;
    let Pmt = 1.0 - Pme - Pmm;

    [
        [Pee, Pem, Pet],
        [Pme, Pmm, Pmt],
        [1.0 - Pee - Pme, 1.0 - Pem - Pmm, 1.0 - Pet - Pmt],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f64 = 1e-10;

    fn earth_crust() -> Medium {
        Medium { rho: 2.6, Ye: 0.5, N_Newton: 0 }
    }

    #[test]
    fn test_vacuum_unitarity() {
        let pmns = PmnsSquares::new(&MixingParameters::nufit52_no());
        let probs = pmns.vacuum(1000.0, 2.0);

        for (i, row) in probs.iter().enumerate() {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < EPSILON, "Row {} sum = {}, expected 1.0", i, sum);
        }
        for col in 0..3 {
            let sum: f64 = probs.iter().map(|row| row[col]).sum();
            assert!((sum - 1.0).abs() < EPSILON, "Column {} sum = {}", col, sum);
        }
    }

    #[test]
    fn test_vacuum_zero_distance() {
        let pmns = PmnsSquares::new(&MixingParameters::nufit52_io());
        let probs = pmns.vacuum(0.0, 2.0);

        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (probs[i][j] - expected).abs() < EPSILON,
                    "probs[{}][{}] = {}, expected {}",
                    i,
                    j,
                    probs[i][j],
                    expected
                );
            }
        }
    }

    #[test]
    fn test_matter_unitarity() {
        let pmns = PmnsSquares::new(&MixingParameters::nufit52_no());
        let probs = pmns.matter(1300.0, 2.5, &Medium { N_Newton: 2, ..earth_crust() });

        for row in probs.iter() {
            assert_relative_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
            for &p in row {
                assert!((-1e-9..=1.0 + 1e-9).contains(&p));
            }
        }
    }

    #[test]
    fn test_matter_reduces_to_vacuum_at_zero_density() {
        let pmns = PmnsSquares::new(&MixingParameters::nufit52_no());
        let vac = pmns.vacuum(810.0, 1.9);
        let mat = pmns.matter(810.0, 1.9, &Medium { rho: 0.0, Ye: 0.5, N_Newton: 0 });
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(vac[i][j], mat[i][j], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_matter_enhances_appearance() {
        // For normal ordering, matter enhances νμ → νe at DUNE energies
        let pmns = PmnsSquares::new(&MixingParameters::nufit52_no());
        let vac = pmns.vacuum(1300.0, 2.5);
        let mat = pmns.matter(1300.0, 2.5, &earth_crust());

        assert!(
            (mat[1][0] - vac[1][0]).abs() > 0.001,
            "Matter effect should modify P(νμ → νe)"
        );
    }

    #[test]
    fn test_antineutrino_flips_cp_phase() {
        // In vacuum P(ν̄μ → ν̄e, δ) = P(νμ → νe, -δ)
        let mixing = MixingParameters::nufit52_no();
        let conjugate = MixingParameters { delta: -mixing.delta, ..mixing };

        let anti = PmnsSquares::new(&mixing).vacuum(1000.0, -2.0);
        let flipped = PmnsSquares::new(&conjugate).vacuum(1000.0, 2.0);

        assert_relative_eq!(anti[1][0], flipped[1][0], epsilon = 1e-12);
        assert!((anti[1][0] - PmnsSquares::new(&mixing).vacuum(1000.0, 2.0)[1][0]).abs() > 1e-6);
    }
}
