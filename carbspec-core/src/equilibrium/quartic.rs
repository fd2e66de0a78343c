//! Closed-form estimate of the charge-balance root.
//!
//! With activity coefficients held fixed, clearing denominators in the charge balance gives
//! a quartic in h = [H+]:
//!
//! $$ h^4 + (Na + K_1) h^3 + (K_1 K_2 + Na K_1 - C_T K_1 - K_w) h^2
//!    + (Na K_1 K_2 - 2 C_T K_1 K_2 - K_w K_1) h - K_w K_1 K_2 = 0 $$
//!
//! The roots are taken as eigenvalues of the companion matrix, polished with Newton steps
//! and filtered to the physical pH range.

use super::charge_balance::ChargeBalance;
use nalgebra::Matrix4;

/// Working scale for [H+], keeping the companion matrix entries moderate.
const HYDROGEN_SCALE: f64 = 1e-7;

const NEWTON_STEPS: usize = 50;

/// Quartic coefficients `[a0, a1, a2, a3]` of the monic polynomial in h.
pub fn coefficients(balance: &ChargeBalance) -> [f64; 4] {
    let k1 = balance.conditional.k1;
    let k2 = balance.conditional.k2;
    let kw = balance.conditional.kw;
    let na = balance.sodium_m;
    let ct = balance.total_carbon_m;

    [
        -kw * k1 * k2,
        na * k1 * k2 - 2.0 * ct * k1 * k2 - kw * k1,
        k1 * k2 + na * k1 - ct * k1 - kw,
        na + k1,
    ]
}

fn evaluate(a: &[f64; 4], h: f64) -> (f64, f64) {
    let value = (((h + a[3]) * h + a[2]) * h + a[1]) * h + a[0];
    let derivative = ((4.0 * h + 3.0 * a[3]) * h + 2.0 * a[2]) * h + a[1];
    (value, derivative)
}

fn polish(a: &[f64; 4], mut h: f64) -> f64 {
    for _ in 0..NEWTON_STEPS {
        let (value, derivative) = evaluate(a, h);
        if derivative == 0.0 || !derivative.is_finite() {
            break;
        }
        let next = h - value / derivative;
        if !(next.is_finite() && next > 0.0) {
            break;
        }
        let converged = ((next - h) / h).abs() < 1e-14;
        h = next;
        if converged {
            break;
        }
    }
    h
}

/// Candidate [H+] roots: real, positive and Newton-polished.
pub fn hydrogen_roots(balance: &ChargeBalance) -> Vec<f64> {
    let a = coefficients(balance);
    let s = HYDROGEN_SCALE;
    // Monic polynomial in x = h / s.
    let b = [
        a[0] / s.powi(4),
        a[1] / s.powi(3),
        a[2] / s.powi(2),
        a[3] / s,
    ];
    if !b.iter().all(|v| v.is_finite()) {
        return Vec::new();
    }

    #[rustfmt::skip]
    let companion = Matrix4::new(
        0.0, 0.0, 0.0, -b[0],
        1.0, 0.0, 0.0, -b[1],
        0.0, 1.0, 0.0, -b[2],
        0.0, 0.0, 1.0, -b[3],
    );

    companion
        .complex_eigenvalues()
        .iter()
        .filter(|z| z.re > 0.0 && z.im.abs() <= 1e-6 * z.re.abs().max(1.0))
        .map(|z| polish(&a, z.re * s))
        .filter(|h| h.is_finite() && *h > 0.0)
        .collect()
}

/// The in-domain root with the smallest charge-balance residual, as a pH.
pub fn closed_form_ph(balance: &ChargeBalance, ph_domain: (f64, f64)) -> Option<f64> {
    hydrogen_roots(balance)
        .into_iter()
        .map(|h| balance.ph_from_hydrogen(h))
        .filter(|ph| ph.is_finite() && *ph >= ph_domain.0 && *ph <= ph_domain.1)
        .map(|ph| (ph, balance.residual(ph).abs()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(ph, _)| ph)
}
