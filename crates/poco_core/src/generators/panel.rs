use rand::rngs::StdRng;
use rand::seq::index;
use rand_distr::{Distribution, StandardNormal};

use super::{count_parameter, effect_size, real_parameter, share_parameter};
use super::{too_many_rows, MAX_ROWS};
use super::{DataGenerator, Draw, GenerationError};
use crate::dataset::Dataset;
use crate::point::ParameterPoint;

/// Parametric two-way fixed effects panel.
///
/// Outcome model: `y = alpha_i + gamma_t + effect * d + e`, where entity and
/// period effects are standard normal, a `treated_share` of entities is
/// treated from `common_start_time` onwards, and errors follow an AR(1)
/// process within entity with coefficient `serial_corr`.
///
/// Emits columns `entity`, `time`, `d`, `y` in entity-major order.
#[derive(Debug, Clone)]
pub struct PanelDataGenerator {
    pub n_entities: usize,
    pub n_periods: usize,
    pub common_start_time: usize,
    pub treated_share: f64,
    pub serial_corr: f64,
}

impl Default for PanelDataGenerator {
    fn default() -> Self {
        Self {
            n_entities: 100,
            n_periods: 10,
            common_start_time: 5,
            treated_share: 0.5,
            serial_corr: 0.0,
        }
    }
}

struct PanelShape {
    entities: usize,
    periods: usize,
    rows: usize,
    treated_share: f64,
    serial_corr: f64,
    effect: f64,
}

impl PanelDataGenerator {
    fn resolve(&self, point: &ParameterPoint) -> Result<PanelShape, GenerationError> {
        let entities = count_parameter(point, "n_entities", self.n_entities)?;
        let periods = count_parameter(point, "n_periods", self.n_periods)?;
        let rows = entities
            .checked_mul(periods)
            .filter(|rows| *rows <= MAX_ROWS)
            .ok_or_else(|| too_many_rows("n_entities", entities as f64 * periods as f64))?;

        Ok(PanelShape {
            entities,
            periods,
            rows,
            treated_share: share_parameter(point, "treated_share", self.treated_share)?,
            serial_corr: real_parameter(point, "serial_corr", self.serial_corr)?,
            effect: effect_size(point)?,
        })
    }
}

impl DataGenerator for PanelDataGenerator {
    fn name(&self) -> &str {
        "panel_data"
    }

    fn validate(&self, point: &ParameterPoint) -> Result<(), GenerationError> {
        self.resolve(point).map(|_| ())
    }

    fn generate(&self, point: &ParameterPoint, rng: &mut StdRng) -> Result<Draw, GenerationError> {
        let shape = self.resolve(point)?;
        let rows = shape.rows;

        let entity_effects: Vec<f64> = (0..shape.entities)
            .map(|_| StandardNormal.sample(rng))
            .collect();
        let time_effects: Vec<f64> = (0..shape.periods)
            .map(|_| StandardNormal.sample(rng))
            .collect();

        let n_treated = (shape.entities as f64 * shape.treated_share).floor() as usize;
        let mut treated = vec![false; shape.entities];
        for entity in index::sample(rng, shape.entities, n_treated) {
            treated[entity] = true;
        }

        let mut entity_col = Vec::with_capacity(rows);
        let mut time_col = Vec::with_capacity(rows);
        let mut d_col = Vec::with_capacity(rows);
        let mut y_col = Vec::with_capacity(rows);

        for entity in 0..shape.entities {
            let mut error = 0.0;
            for period in 0..shape.periods {
                let innovation: f64 = StandardNormal.sample(rng);
                error = if period == 0 {
                    innovation
                } else {
                    shape.serial_corr * error + innovation
                };

                let d = if treated[entity] && period >= self.common_start_time {
                    1.0
                } else {
                    0.0
                };

                entity_col.push(entity as f64);
                time_col.push(period as f64);
                d_col.push(d);
                y_col.push(
                    entity_effects[entity] + time_effects[period] + shape.effect * d + error,
                );
            }
        }

        let dataset = Dataset::from_columns([
            ("entity", entity_col),
            ("time", time_col),
            ("d", d_col),
            ("y", y_col),
        ])?;

        Ok(Draw {
            dataset,
            truth: Some(shape.effect),
        })
    }
}
