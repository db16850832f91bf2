use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use super::{effect_size, DataGenerator, Draw, GenerationError};
use crate::dataset::Dataset;
use crate::point::ParameterPoint;

/// How the effect size modifies treated outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectMode {
    /// `y + effect`
    #[default]
    Additive,
    /// `y * (1 + effect)`
    Multiplicative,
}

/// Empirical panel generator: random block treatment assignment.
///
/// Every replicate draws `floor(entities * treated_portion)` entities without
/// replacement, marks their rows at or after `treatment_start` as treated in
/// `treatment_col`, and applies the effect to `outcome_col` for those rows.
#[derive(Debug, Clone)]
pub struct PanelBlockTreatment {
    base: Dataset,
    entity_col: String,
    time_col: String,
    treatment_col: String,
    outcome_col: String,
    treatment_start: f64,
    treated_portion: f64,
    mode: EffectMode,
    entities: Vec<f64>,
}

/// Column roles for [`PanelBlockTreatment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelColumns {
    pub entity: String,
    pub time: String,
    pub treatment: String,
    pub outcome: String,
}

impl Default for PanelColumns {
    fn default() -> Self {
        Self {
            entity: "entity".to_string(),
            time: "time".to_string(),
            treatment: "d".to_string(),
            outcome: "y".to_string(),
        }
    }
}

impl PanelBlockTreatment {
    pub fn new(
        base: Dataset,
        columns: PanelColumns,
        treatment_start: f64,
        treated_portion: f64,
        mode: EffectMode,
    ) -> Result<Self, GenerationError> {
        if !(0.0..=1.0).contains(&treated_portion) {
            return Err(GenerationError::invalid(
                "treated_portion",
                "must be between 0 and 1",
            ));
        }
        if !treatment_start.is_finite() {
            return Err(GenerationError::invalid("treatment_start", "must be finite"));
        }

        let mut entities = base.column(&columns.entity)?.to_vec();
        base.column(&columns.time)?;
        base.column(&columns.outcome)?;
        entities.sort_by(f64::total_cmp);
        entities.dedup();

        Ok(Self {
            base,
            entity_col: columns.entity,
            time_col: columns.time,
            treatment_col: columns.treatment,
            outcome_col: columns.outcome,
            treatment_start,
            treated_portion,
            mode,
            entities,
        })
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

impl DataGenerator for PanelBlockTreatment {
    fn name(&self) -> &str {
        "panel_block_treatment"
    }

    fn validate(&self, point: &ParameterPoint) -> Result<(), GenerationError> {
        if self.entities.is_empty() {
            return Err(GenerationError::invalid(
                &self.entity_col,
                "base panel has no entities",
            ));
        }
        let effect = effect_size(point)?;
        if self.mode == EffectMode::Multiplicative && effect <= -1.0 {
            return Err(GenerationError::invalid(
                super::EFFECT_SIZE,
                "multiplicative effects must exceed -1",
            ));
        }
        Ok(())
    }

    fn generate(&self, point: &ParameterPoint, rng: &mut StdRng) -> Result<Draw, GenerationError> {
        let effect = effect_size(point)?;
        let n_treated = (self.entities.len() as f64 * self.treated_portion).floor() as usize;
        let mut treated: Vec<f64> = index::sample(rng, self.entities.len(), n_treated)
            .into_iter()
            .map(|idx| self.entities[idx])
            .collect();
        treated.sort_by(f64::total_cmp);

        let mut dataset = self.base.clone();
        let mask: Vec<bool> = {
            let entity = dataset.column(&self.entity_col)?;
            let time = dataset.column(&self.time_col)?;
            entity
                .iter()
                .zip(time)
                .map(|(e, t)| {
                    *t >= self.treatment_start
                        && treated.binary_search_by(|probe| probe.total_cmp(e)).is_ok()
                })
                .collect()
        };

        let indicator = mask.iter().map(|&m| if m { 1.0 } else { 0.0 }).collect();
        dataset.set_column(self.treatment_col.clone(), indicator)?;

        for (value, &is_treated) in dataset.column_mut(&self.outcome_col)?.iter_mut().zip(&mask) {
            if is_treated {
                match self.mode {
                    EffectMode::Additive => *value += effect,
                    EffectMode::Multiplicative => *value *= 1.0 + effect,
                }
            }
        }

        Ok(Draw {
            dataset,
            truth: Some(effect),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::replicate_rng;

    fn base_panel() -> Dataset {
        let mut entity = Vec::new();
        let mut time = Vec::new();
        let mut y = Vec::new();
        for e in 0..4 {
            for t in 0..4 {
                entity.push(e as f64);
                time.push(t as f64);
                y.push(10.0);
            }
        }
        Dataset::from_columns([("entity", entity), ("time", time), ("y", y)]).unwrap()
    }

    #[test]
    fn test_additive_block_assignment() {
        let generator = PanelBlockTreatment::new(
            base_panel(),
            PanelColumns::default(),
            2.0,
            0.5,
            EffectMode::Additive,
        )
        .unwrap();
        let draw = generator
            .generate(&ParameterPoint::new().with("effect_size", 1.5), &mut replicate_rng(4, 0, 0))
            .unwrap();

        let d = draw.dataset.column("d").unwrap();
        let y = draw.dataset.column("y").unwrap();
        // 2 treated entities x 2 post-periods
        assert_eq!(d.iter().sum::<f64>(), 4.0);
        for (treatment, outcome) in d.iter().zip(y) {
            let expected = if *treatment == 1.0 { 11.5 } else { 10.0 };
            assert_eq!(*outcome, expected);
        }
    }

    #[test]
    fn test_multiplicative_mode() {
        let generator = PanelBlockTreatment::new(
            base_panel(),
            PanelColumns::default(),
            0.0,
            1.0,
            EffectMode::Multiplicative,
        )
        .unwrap();
        let draw = generator
            .generate(&ParameterPoint::new().with("effect_size", 0.1), &mut replicate_rng(4, 0, 1))
            .unwrap();
        for outcome in draw.dataset.column("y").unwrap() {
            assert!((outcome - 11.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_bad_portion() {
        let error = PanelBlockTreatment::new(
            base_panel(),
            PanelColumns::default(),
            0.0,
            1.2,
            EffectMode::Additive,
        )
        .unwrap_err();
        assert!(matches!(error, GenerationError::InvalidParameter { .. }));
    }
}
