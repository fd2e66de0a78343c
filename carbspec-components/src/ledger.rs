//! Stoichiometric CO2 absorption ledger for sodium reagents.
//!
//! Absorbed CO2 is consumed in two stages:
//!
//! 1. `2 NaOH + CO2 -> Na2CO3`
//! 2. `Na2CO3 + CO2 -> 2 NaHCO3`
//!
//! CO2 left once both stages are exhausted is carried as excess.

use carbspec_core::{Dose, Reagent};
use serde::{Deserialize, Serialize};

/// Reagent inventory and cumulative CO2 accounting, all in moles.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LedgerState {
    pub sodium_hydroxide: f64,
    pub sodium_carbonate: f64,
    pub sodium_bicarbonate: f64,
    pub co2_to_carbonate: f64,
    pub co2_to_bicarbonate: f64,
    pub excess_co2: f64,
}

impl LedgerState {
    /// Inventory before any CO2 is absorbed.
    pub fn from_dose(dose: &Dose) -> Self {
        let moles = dose.total_moles();
        let mut state = Self::default();
        match dose.reagent {
            Reagent::SodiumHydroxide => state.sodium_hydroxide = moles,
            Reagent::SodiumCarbonate => state.sodium_carbonate = moles,
            Reagent::SodiumBicarbonate => state.sodium_bicarbonate = moles,
        }
        state
    }

    /// All CO2 absorbed so far, consumed or not.
    pub fn total_co2(&self) -> f64 {
        self.co2_to_carbonate + self.co2_to_bicarbonate + self.excess_co2
    }

    /// Absorb `co2_mol` and return the split of this step.
    pub fn absorb(&mut self, co2_mol: f64) -> LedgerStep {
        let mut remaining = co2_mol.max(0.0);

        let to_carbonate = remaining.min(0.5 * self.sodium_hydroxide);
        self.sodium_hydroxide -= 2.0 * to_carbonate;
        self.sodium_carbonate += to_carbonate;
        self.co2_to_carbonate += to_carbonate;
        remaining -= to_carbonate;

        let to_bicarbonate = remaining.min(self.sodium_carbonate);
        self.sodium_carbonate -= to_bicarbonate;
        self.sodium_bicarbonate += 2.0 * to_bicarbonate;
        self.co2_to_bicarbonate += to_bicarbonate;
        remaining -= to_bicarbonate;

        self.excess_co2 += remaining;

        LedgerStep {
            to_carbonate,
            to_bicarbonate,
            unconsumed: remaining,
        }
    }
}

/// How one absorption step was consumed (mol).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LedgerStep {
    pub to_carbonate: f64,
    pub to_bicarbonate: f64,
    pub unconsumed: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_two_stage_absorption() {
        let mut ledger = LedgerState::from_dose(&Dose::moles(Reagent::SodiumHydroxide, 2.0));

        let step = ledger.absorb(0.5);
        assert_eq!(step.to_carbonate, 0.5);
        assert_eq!(ledger.sodium_hydroxide, 1.0);
        assert_eq!(ledger.sodium_carbonate, 0.5);

        // Finishes stage one, then converts all carbonate to bicarbonate.
        let step = ledger.absorb(2.0);
        assert_eq!(step.to_carbonate, 0.5);
        assert_eq!(step.to_bicarbonate, 1.0);
        assert_eq!(step.unconsumed, 0.5);

        assert_eq!(ledger.sodium_hydroxide, 0.0);
        assert_eq!(ledger.sodium_carbonate, 0.0);
        assert_eq!(ledger.sodium_bicarbonate, 2.0);
        assert_relative_eq!(ledger.total_co2(), 2.5);
    }

    #[test]
    fn test_bicarbonate_absorbs_nothing() {
        let mut ledger = LedgerState::from_dose(&Dose::moles(Reagent::SodiumBicarbonate, 1.0));
        let step = ledger.absorb(0.3);
        assert_eq!(step.unconsumed, 0.3);
        assert_eq!(ledger.sodium_bicarbonate, 1.0);
    }
}
