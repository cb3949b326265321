//! Partition a grid into fit groups, one per distinct base-parameter setting.
//!
//! Only the primary record of a group is ever fitted; its submodel thresholds
//! are evaluated against that one fitted model.
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::grid::{BaseParams, Grid, GridRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitGroup {
    /// Record carrying the largest threshold of the group.
    pub primary: GridRecord,
    /// Remaining thresholds of the group, in grid order.
    pub submodels: Vec<f64>,
}

impl FitGroup {
    pub fn base_params(&self) -> &BaseParams {
        &self.primary.base_params
    }

    /// All thresholds of the group, primary first.
    pub fn thresholds(&self) -> Vec<f64> {
        std::iter::once(self.primary.threshold)
            .chain(self.submodels.iter().copied())
            .collect()
    }

    /// Grid records of the group, in the order of `thresholds()`.
    pub fn records(&self) -> Vec<GridRecord> {
        self.thresholds()
            .into_iter()
            .map(|t| GridRecord::new(self.primary.base_params.clone(), t))
            .collect()
    }
}

/// Group grid records by base parameters, in order of first appearance.
pub fn partition(grid: &Grid) -> Vec<FitGroup> {
    let mut order: Vec<&BaseParams> = Vec::new();
    let mut thresholds: HashMap<&BaseParams, Vec<f64>> = HashMap::new();

    for record in grid.records() {
        let entry = thresholds.entry(&record.base_params).or_insert_with(|| {
            order.push(&record.base_params);
            Vec::new()
        });
        entry.push(record.threshold);
    }

    order
        .into_iter()
        .map(|params| {
            let mut ts = thresholds.remove(params).unwrap_or_default();
            let max_idx = ts
                .iter()
                .enumerate()
                .fold(0, |best, (i, &t)| if t > ts[best] { i } else { best });
            let primary = ts.remove(max_idx);
            log::trace!(
                "Fit group {}: primary threshold {:.4}, {} submodels",
                params,
                primary,
                ts.len()
            );
            FitGroup {
                primary: GridRecord::new(params.clone(), primary),
                submodels: ts,
            }
        })
        .collect()
}

/// Fitted models memoised by base parameters for one tuning run.
#[derive(Debug)]
pub struct FitCache<M> {
    models: HashMap<BaseParams, Arc<M>>,
}

impl<M> Default for FitCache<M> {
    fn default() -> Self {
        Self {
            models: HashMap::new(),
        }
    }
}

impl<M> FitCache<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, params: BaseParams, model: M) -> Arc<M> {
        let model = Arc::new(model);
        self.models.insert(params, Arc::clone(&model));
        model
    }

    pub fn get(&self, params: &BaseParams) -> Option<Arc<M>> {
        self.models.get(params).cloned()
    }

    /// Return the cached model for `params`, fitting it with `fit` on a miss.
    pub fn get_or_try_insert_with<E, F>(
        &mut self,
        params: &BaseParams,
        fit: F,
    ) -> Result<Arc<M>, E>
    where
        F: FnOnce() -> Result<M, E>,
    {
        if let Some(model) = self.get(params) {
            return Ok(model);
        }
        let model = fit()?;
        Ok(self.insert(params.clone(), model))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
