//! Nested-loop equilibrium solve.
//!
//! The outer loop iterates ionic strength to self-consistency. Each outer iteration fixes
//! the activity coefficients and solves the charge balance for pH, first through the
//! quartic closed form where the model allows it and otherwise by bisection.

use super::charge_balance::{bisect, Bisection, ChargeBalance};
use super::constants::EquilibriumConstants;
use super::quartic;
use super::result::{
    DissolutionSummary, InnerPath, SolveDiagnostics, SolveStage, SpeciationResult,
};
use super::saturation::saturation_indices;
use crate::activity::{ActivityModel, ModelKind, ModelResources};
use crate::errors::{SolveError, SolveResult};
use crate::inputs::{Reagent, SolubilityInputs, SolverOptions, SolverSeed, SpeciationMode};
use crate::species::{Species, SpeciesValues};
use log::{debug, warn};

/// Carbon and counter-ion inventory of a solution, before speciation.
#[derive(Debug, Clone, PartialEq)]
struct Inventory {
    sodium_m: f64,
    total_carbon_m: f64,
    dissolution: DissolutionSummary,
    warnings: Vec<String>,
}

impl Inventory {
    fn from_inputs(inputs: &SolubilityInputs, model: &ActivityModel) -> SolveResult<Self> {
        let volume = inputs.volume_l()?;
        let reagent = inputs.dose.reagent;
        let dosed = inputs.dose.total_moles();
        let mut warnings = Vec::new();

        let cap_m = inputs.solubility_caps.and_then(|caps| match reagent {
            Reagent::SodiumBicarbonate => caps.bicarbonate_m,
            Reagent::SodiumCarbonate => caps.carbonate_m,
            Reagent::SodiumHydroxide => None,
        });
        let dissolved = match cap_m {
            Some(cap) => dosed.min(cap * volume),
            None => dosed,
        };
        if dissolved < dosed {
            warnings.push(format!(
                "Dose exceeds the solubility limit: {:.4} of {:.4} mol dissolved",
                dissolved, dosed
            ));
        }
        let dissolution = DissolutionSummary {
            dosed_mol: dosed,
            dissolved_mol: dissolved,
            undissolved_mol: dosed - dissolved,
            dissolved_fraction: if dosed > 0.0 { dissolved / dosed } else { 1.0 },
        };

        let sodium_m = if model.includes_counter_ion() {
            dissolved * reagent.sodium_per_mole() / volume
        } else {
            0.0
        };

        let carbon_mol = inputs.total_inorganic_carbon_mol.unwrap_or_else(|| {
            dissolved * reagent.carbon_per_mole() + inputs.co2_uptake_mol
        }) * (1.0 - inputs.degassed_fraction);
        let mut total_carbon_m = carbon_mol / volume;
        if inputs.mode == SpeciationMode::FixedPco2 {
            total_carbon_m += inputs.headspace_carbon_m().unwrap_or(0.0);
        }

        Ok(Self {
            sodium_m,
            total_carbon_m,
            dissolution,
            warnings,
        })
    }
}

/// Everything fixed for the duration of one solve.
struct SolveContext<'a> {
    model: ActivityModel,
    constants: EquilibriumConstants,
    inventory: Inventory,
    temperature_c: f64,
    options: &'a SolverOptions,
    warnings: Vec<String>,
}

impl SolveContext<'_> {
    fn balance(&self, gamma: &SpeciesValues) -> ChargeBalance {
        ChargeBalance::new(
            &self.constants,
            gamma,
            self.inventory.sodium_m,
            self.inventory.total_carbon_m,
        )
    }

    fn tolerance_at(&self, balance: &ChargeBalance, ph: f64) -> f64 {
        self.options.residual_tolerance
            + self.options.relative_charge_tolerance * balance.charge_magnitude(ph)
    }

    fn accepts(&self, balance: &ChargeBalance, ph: f64) -> bool {
        balance.residual(ph).abs() <= self.tolerance_at(balance, ph)
    }

    /// Assemble a result for `ph` under `balance`.
    fn result(
        &self,
        balance: &ChargeBalance,
        gamma: SpeciesValues,
        ph: f64,
        ionic_strength: f64,
        diagnostics: SolveDiagnostics,
    ) -> SpeciationResult {
        let concentrations = balance.species_at(ph);
        let total_carbon_m = concentrations.total_carbon();
        let alpha = if total_carbon_m > 0.0 {
            [
                concentrations[Species::CarbonicAcid] / total_carbon_m,
                concentrations[Species::Bicarbonate] / total_carbon_m,
                concentrations[Species::Carbonate] / total_carbon_m,
            ]
        } else {
            [0.0; 3]
        };
        let alkalinity_meq_per_l = 1000.0
            * (concentrations[Species::Bicarbonate]
                + 2.0 * concentrations[Species::Carbonate]
                + concentrations[Species::Hydroxide]
                - concentrations[Species::Hydrogen]);

        let mut warnings = self.inventory.warnings.clone();
        warnings.extend(self.warnings.iter().cloned());
        let ionic_strength_capped = match self.model.ionic_strength_cap() {
            Some(cap) if ionic_strength > cap => {
                warnings.push(format!(
                    "Ionic strength {ionic_strength:.3} mol/L exceeds the cap of {cap} mol/L; \
                     activity coefficients evaluated at the cap"
                ));
                true
            }
            _ => false,
        };
        if let Some(limit) = self.model.validity_limit() {
            if ionic_strength > limit {
                warnings.push(format!(
                    "Ionic strength {ionic_strength:.3} mol/L is above the {} validity limit of \
                     {limit} mol/L; extended Debye-Hückel used instead",
                    self.model.kind()
                ));
            }
        }

        let activities = concentrations.product(&gamma);
        SpeciationResult {
            ph,
            concentrations,
            activity_coefficients: gamma,
            ionic_strength,
            ionic_strength_capped,
            total_carbon_m,
            alpha,
            alkalinity_meq_per_l,
            charge_balance_residual: balance.residual(ph),
            titrant_m: balance.titrant_m,
            saturation_indices: saturation_indices(&activities),
            dissolution: self.inventory.dissolution,
            warnings,
            diagnostics,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InnerSolution {
    ph: f64,
    iterations: usize,
    path: InnerPath,
    quartic_ph: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
enum InnerFailure {
    NoSignChange { low: f64, high: f64, closest_ph: f64 },
    Exhausted { ph: f64, iterations: usize },
}

/// Equilibrium solver bound to a resolved activity model.
///
/// Holds no mutable state: the same solver may be shared between threads and every call
/// is a pure function of its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct EquilibriumSolver {
    requested: ModelKind,
    model: ActivityModel,
    fallback_warning: Option<String>,
}

impl EquilibriumSolver {
    pub fn new(model: ActivityModel) -> Self {
        Self {
            requested: model.kind(),
            model,
            fallback_warning: None,
        }
    }

    /// Solver for `kind`, failing with [`SolveError::ModelUnavailable`] if it cannot be
    /// resolved.
    pub fn resolve(kind: ModelKind, resources: &ModelResources) -> SolveResult<Self> {
        ActivityModel::resolve(kind, resources).map(Self::new)
    }

    /// Solver for `kind`, or for the default model if `kind` is unavailable.
    ///
    /// Results then carry the fallback warning and still accept inputs that request `kind`.
    pub fn resolve_or_fallback(kind: ModelKind, resources: &ModelResources) -> Self {
        let (model, fallback_warning) = ActivityModel::resolve_or_fallback(kind, resources);
        Self {
            requested: kind,
            model,
            fallback_warning,
        }
    }

    pub fn model(&self) -> &ActivityModel {
        &self.model
    }

    pub fn requested_model(&self) -> ModelKind {
        self.requested
    }

    pub fn fallback_warning(&self) -> Option<&str> {
        self.fallback_warning.as_deref()
    }

    fn context<'a>(&self, inputs: &'a SolubilityInputs) -> SolveResult<SolveContext<'a>> {
        inputs.validate()?;
        if inputs.model != self.requested {
            return Err(SolveError::invalid_input(
                "model",
                format!(
                    "inputs request {} but the solver was built for {}",
                    inputs.model, self.requested
                ),
            ));
        }

        let mut warnings: Vec<String> = self.fallback_warning.iter().cloned().collect();
        if inputs.ionic_strength_cap.is_some() && self.model.ionic_strength_cap().is_none() {
            warnings.push(format!(
                "ionic_strength_cap is ignored by the {} model",
                self.model.kind()
            ));
        }
        let model = self
            .model
            .clone()
            .with_ionic_strength_cap(inputs.ionic_strength_cap);
        let inventory = Inventory::from_inputs(inputs, &model)?;
        let constants = if inputs.use_temperature_adjusted_constants {
            EquilibriumConstants::at_temperature(inputs.temperature_c)
        } else {
            EquilibriumConstants::default()
        };

        Ok(SolveContext {
            model,
            constants,
            inventory,
            temperature_c: inputs.temperature_c,
            options: &inputs.solver,
            warnings,
        })
    }

    /// Solve from the inputs' own initial pH guess.
    pub fn solve(&self, inputs: &SolubilityInputs) -> SolveResult<SpeciationResult> {
        self.solve_seeded(inputs, None)
    }

    /// Solve starting from `seed`, typically a neighbouring converged result.
    ///
    /// Seeds outside the pH domain or with a negative ionic strength are ignored.
    pub fn solve_seeded(
        &self,
        inputs: &SolubilityInputs,
        seed: Option<SolverSeed>,
    ) -> SolveResult<SpeciationResult> {
        let ctx = self.context(inputs)?;
        let options = ctx.options;
        let (domain_low, domain_high) = options.ph_domain;
        let seed = seed.filter(|s| {
            s.ph.is_finite()
                && s.ph >= domain_low
                && s.ph <= domain_high
                && s.ionic_strength.is_finite()
                && s.ionic_strength >= 0.0
        });

        let mut prior_ph = seed.map(|s| s.ph);
        let start_ph = prior_ph.unwrap_or(inputs.initial_ph_guess);
        let mut composition = ctx.balance(&SpeciesValues::ideal()).species_at(start_ph);
        let mut ionic_strength =
            seed.map_or_else(|| composition.ionic_strength(), |s| s.ionic_strength);
        let mut last_step = 0.0;
        let mut inner_iterations = 0;
        let mut last = None;
        let mut bracket_failure = None;

        for outer in 1..=options.max_outer_iterations {
            let gamma = ctx
                .model
                .compute_gamma(ionic_strength, &composition, ctx.temperature_c);
            let balance = ctx.balance(&gamma);

            let (ph, inner) = match self.solve_inner(&ctx, &balance, prior_ph) {
                Ok(inner) => (inner.ph, Some(inner)),
                Err(failure @ InnerFailure::Exhausted { .. }) => {
                    return Err(self.inner_error(
                        &ctx,
                        &balance,
                        gamma,
                        ionic_strength,
                        outer,
                        inner_iterations,
                        failure,
                    ))
                }
                // Only final once ionic strength has settled; until then the root may still
                // move into the domain.
                Err(failure @ InnerFailure::NoSignChange { closest_ph, .. }) => {
                    bracket_failure = Some((balance, gamma, ionic_strength, outer, failure));
                    (closest_ph, None)
                }
            };

            let species = balance.species_at(ph);
            let next_ionic_strength = species.ionic_strength();
            let step = next_ionic_strength - ionic_strength;
            let converged = step.abs() < options.ionic_strength_tolerance;
            composition = species;
            prior_ph = Some(ph);

            let Some(inner) = inner else {
                if converged {
                    break;
                }
                ionic_strength = next_ionic_strength;
                last_step = step;
                continue;
            };
            bracket_failure = None;
            inner_iterations += inner.iterations;

            let diagnostics = SolveDiagnostics {
                model: ctx.model.kind(),
                outer_iterations: outer,
                inner_iterations,
                inner_path: inner.path,
                converged: true,
                quartic_ph: inner.quartic_ph,
            };

            if converged {
                return self.accept(&ctx, &balance, gamma, ph, next_ionic_strength, diagnostics);
            }
            // Halve the step when the update overshoots, so concentrated solutions do not
            // oscillate between two ionic strengths.
            ionic_strength = if step * last_step < 0.0 {
                ionic_strength + 0.5 * step
            } else {
                next_ionic_strength
            };
            last_step = step;
            last = Some((balance, gamma, ph, next_ionic_strength, diagnostics));
        }

        if let Some((balance, gamma, ionic_strength, outer, failure)) = bracket_failure {
            return Err(self.inner_error(
                &ctx,
                &balance,
                gamma,
                ionic_strength,
                outer,
                inner_iterations,
                failure,
            ));
        }

        let (balance, gamma, ph, ionic_strength, mut diagnostics) = match last {
            Some(last) => last,
            None => {
                return Err(SolveError::invalid_input(
                    "solver.max_outer_iterations",
                    "iteration caps must be at least 1",
                ))
            }
        };
        diagnostics.converged = false;
        warn!(
            "Ionic strength did not converge after {} outer iterations",
            options.max_outer_iterations
        );
        Err(SolveError::ConvergenceFailed {
            stage: SolveStage::OuterLoop,
            iterations: options.max_outer_iterations,
            estimate: Box::new(ctx.result(&balance, gamma, ph, ionic_strength, diagnostics)),
        })
    }

    /// Speciation at an imposed pH.
    ///
    /// Ionic strength is still iterated to self-consistency. The charge deficit is held by a
    /// strong acid or base, reported as `titrant_m`, so the titrant-inclusive balance is
    /// exact.
    pub fn solve_forced_ph(
        &self,
        inputs: &SolubilityInputs,
        ph: f64,
    ) -> SolveResult<SpeciationResult> {
        self.solve_forced_ph_seeded(inputs, ph, None)
    }

    /// [`solve_forced_ph`](Self::solve_forced_ph) with the outer loop started from the ionic
    /// strength of `seed`. The seed's pH is not used.
    pub fn solve_forced_ph_seeded(
        &self,
        inputs: &SolubilityInputs,
        ph: f64,
        seed: Option<SolverSeed>,
    ) -> SolveResult<SpeciationResult> {
        let ctx = self.context(inputs)?;
        let options = ctx.options;
        let (low, high) = options.ph_domain;
        if !(ph.is_finite() && ph >= low && ph <= high) {
            return Err(SolveError::invalid_input(
                "ph",
                format!("forced pH {ph} lies outside the pH domain [{low}, {high}]"),
            ));
        }

        let mut composition = ctx.balance(&SpeciesValues::ideal()).species_at(ph);
        let mut ionic_strength = seed
            .map(|s| s.ionic_strength)
            .filter(|i| i.is_finite() && *i >= 0.0)
            .unwrap_or_else(|| composition.ionic_strength());
        let mut last = None;

        for outer in 1..=options.max_outer_iterations {
            let gamma = ctx
                .model
                .compute_gamma(ionic_strength, &composition, ctx.temperature_c);
            let mut balance = ctx.balance(&gamma);
            let species = balance.species_at(ph);
            balance.titrant_m = -species.net_charge();

            let next_ionic_strength = species.ionic_strength() + 0.5 * balance.titrant_m.abs();
            let change = (next_ionic_strength - ionic_strength).abs();
            ionic_strength = next_ionic_strength;
            composition = species;

            let diagnostics = SolveDiagnostics {
                model: ctx.model.kind(),
                outer_iterations: outer,
                inner_iterations: 0,
                inner_path: InnerPath::ForcedPh,
                converged: true,
                quartic_ph: None,
            };
            if change < options.ionic_strength_tolerance {
                return self.accept(&ctx, &balance, gamma, ph, ionic_strength, diagnostics);
            }
            last = Some((balance, gamma, diagnostics));
        }

        match last {
            Some((balance, gamma, mut diagnostics)) => {
                diagnostics.converged = false;
                Err(SolveError::ConvergenceFailed {
                    stage: SolveStage::OuterLoop,
                    iterations: options.max_outer_iterations,
                    estimate: Box::new(ctx.result(&balance, gamma, ph, ionic_strength, diagnostics)),
                })
            }
            None => Err(SolveError::invalid_input(
                "solver.max_outer_iterations",
                "iteration caps must be at least 1",
            )),
        }
    }

    fn accept(
        &self,
        ctx: &SolveContext<'_>,
        balance: &ChargeBalance,
        gamma: SpeciesValues,
        ph: f64,
        ionic_strength: f64,
        mut diagnostics: SolveDiagnostics,
    ) -> SolveResult<SpeciationResult> {
        let concentrations = balance.species_at(ph);
        if ctx.accepts(balance, ph) && concentrations.is_physical() {
            let result = ctx.result(balance, gamma, ph, ionic_strength, diagnostics);
            debug!(
                "Solved pH {:.4} (I = {:.4e}) with {} in {} outer / {} inner iterations via {:?}",
                result.ph,
                result.ionic_strength,
                result.diagnostics.model,
                result.diagnostics.outer_iterations,
                result.diagnostics.inner_iterations,
                result.diagnostics.inner_path
            );
            return Ok(result);
        }

        diagnostics.converged = false;
        let iterations = diagnostics.outer_iterations;
        Err(SolveError::ConvergenceFailed {
            stage: SolveStage::Acceptance,
            iterations,
            estimate: Box::new(ctx.result(balance, gamma, ph, ionic_strength, diagnostics)),
        })
    }

    fn solve_inner(
        &self,
        ctx: &SolveContext<'_>,
        balance: &ChargeBalance,
        prior_ph: Option<f64>,
    ) -> Result<InnerSolution, InnerFailure> {
        let options = ctx.options;
        let (domain_low, domain_high) = options.ph_domain;
        let residual = |ph: f64| balance.residual(ph);

        let quartic_ph = if options.use_closed_form && ctx.model.supports_closed_form() {
            quartic::closed_form_ph(balance, options.ph_domain)
        } else {
            None
        };
        if let Some(ph) = quartic_ph {
            if ctx.accepts(balance, ph) {
                return Ok(InnerSolution {
                    ph,
                    iterations: 0,
                    path: InnerPath::ClosedForm,
                    quartic_ph,
                });
            }
        }

        let mut spent = 0;
        if let Some(center) = quartic_ph.or(prior_ph) {
            let bracket = (
                (center - options.seed_window).max(domain_low),
                (center + options.seed_window).min(domain_high),
            );
            match bisect(
                residual,
                bracket,
                options.ph_tolerance,
                options.residual_tolerance,
                options.max_inner_iterations,
            ) {
                Bisection::Converged { ph, iterations } => {
                    return Ok(InnerSolution {
                        ph,
                        iterations,
                        path: InnerPath::SeededBisection,
                        quartic_ph,
                    })
                }
                Bisection::Exhausted { ph, iterations } => {
                    return Err(InnerFailure::Exhausted { ph, iterations })
                }
                Bisection::NoSignChange { .. } => spent += 1,
            }
        }

        match bisect(
            residual,
            options.ph_domain,
            options.ph_tolerance,
            options.residual_tolerance,
            options.max_inner_iterations,
        ) {
            Bisection::Converged { ph, iterations } => Ok(InnerSolution {
                ph,
                iterations: iterations + spent,
                path: InnerPath::Bisection,
                quartic_ph,
            }),
            Bisection::Exhausted { ph, iterations } => Err(InnerFailure::Exhausted { ph, iterations }),
            Bisection::NoSignChange { f_low, f_high } => Err(InnerFailure::NoSignChange {
                low: domain_low,
                high: domain_high,
                closest_ph: if f_low.abs() <= f_high.abs() {
                    domain_low
                } else {
                    domain_high
                },
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn inner_error(
        &self,
        ctx: &SolveContext<'_>,
        balance: &ChargeBalance,
        gamma: SpeciesValues,
        ionic_strength: f64,
        outer: usize,
        inner_iterations: usize,
        failure: InnerFailure,
    ) -> SolveError {
        let (ph, path, iterations) = match failure {
            InnerFailure::NoSignChange { closest_ph, .. } => (closest_ph, InnerPath::Bisection, 0),
            InnerFailure::Exhausted { ph, iterations } => (ph, InnerPath::Bisection, iterations),
        };
        let diagnostics = SolveDiagnostics {
            model: ctx.model.kind(),
            outer_iterations: outer,
            inner_iterations: inner_iterations + iterations,
            inner_path: path,
            converged: false,
            quartic_ph: None,
        };
        let estimate = Box::new(ctx.result(balance, gamma, ph, ionic_strength, diagnostics));

        match failure {
            InnerFailure::NoSignChange { low, high, .. } => {
                warn!("No sign change in the charge balance over pH [{low}, {high}]");
                SolveError::BracketInvalid {
                    low,
                    high,
                    estimate,
                }
            }
            InnerFailure::Exhausted { iterations, .. } => {
                warn!("pH bisection hit the iteration cap of {iterations}");
                SolveError::ConvergenceFailed {
                    stage: SolveStage::InnerLoop,
                    iterations,
                    estimate,
                }
            }
        }
    }
}

/// Resolve the model named by `inputs` and solve.
pub fn solve(
    inputs: &SolubilityInputs,
    resources: &ModelResources,
) -> SolveResult<SpeciationResult> {
    EquilibriumSolver::resolve(inputs.model, resources)?.solve(inputs)
}
