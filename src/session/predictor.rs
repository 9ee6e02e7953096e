//! Request path: source text → merged parameter type predictions

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use super::{LoadedModel, ModelSession};
use crate::cache::{CacheKey, PredictionCache};
use crate::error::{Error, Result};
use crate::inference::{
    aggregate, classify, parameter_masks, softmax, Classification, ClassificationSet,
    FunctionSignature, ModelInput,
};
use crate::tokenizer::EncodedSequence;

pub struct Predictor {
    session: Arc<ModelSession>,
    cache: Option<PredictionCache>,
    top_k: usize,
    pad_to_context: bool,
}

impl Predictor {
    /// Predictor using the session's `[inference]` settings.
    pub fn new(session: Arc<ModelSession>) -> Self {
        let inference = &session.config().inference;
        let cache = inference
            .cache_predictions
            .then(|| PredictionCache::with_capacity(inference.cache_capacity));
        let top_k = inference.top_k.max(1);
        let pad_to_context = inference.pad_to_context;
        Self {
            session,
            cache,
            top_k,
            pad_to_context,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn session(&self) -> &ModelSession {
        &self.session
    }

    pub fn cache(&self) -> Option<&PredictionCache> {
        self.cache.as_ref()
    }

    /// Predict types for the `parameter_count` parameters of the function
    /// in `source`.
    ///
    /// `Ok(None)` means there is nothing to predict. Any per-parameter
    /// failure fails the whole request and marks the session failed.
    pub fn predict(
        &self,
        source: &str,
        parameter_count: usize,
    ) -> Result<Option<Vec<Classification>>> {
        if parameter_count == 0 {
            return Ok(None);
        }

        let model = self.session.initialize()?;

        let key = CacheKey::new(model.generation(), source, parameter_count);
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            debug!("Prediction cache hit");
            return Ok(Some(hit.as_ref().clone()));
        }

        let sequence = self.encode(&model, source);
        let masks = self.masks(&model, source, &sequence, parameter_count);

        let results: Vec<Result<ClassificationSet>> = masks
            .par_iter()
            .enumerate()
            .map(|(parameter, mask)| classify_parameter(&model, &sequence, parameter, mask))
            .collect();

        // lowest failing parameter wins
        let sets = match results.into_iter().collect::<Result<Vec<_>>>() {
            Ok(sets) => sets,
            Err(e) => {
                self.session.mark_failed(&model, e.clone());
                return Err(e);
            }
        };

        let merged = aggregate(sets, self.top_k);
        if let (Some(cache), Some(merged)) = (&self.cache, &merged) {
            cache.insert(key, merged.clone());
        }
        Ok(merged)
    }

    /// Reload the model after a failure and drop cached results of older
    /// generations.
    pub fn recover(&self) -> Result<()> {
        let model = self.session.reinitialize()?;
        if let Some(cache) = &self.cache {
            cache.retain_generation(model.generation());
        }
        Ok(())
    }

    fn encode(&self, model: &LoadedModel, source: &str) -> EncodedSequence {
        let encoder = model.encoder();
        let mut sequence = encoder.encode_text(source);
        if self.pad_to_context {
            let pad = &model.pipeline().special().pad;
            sequence.pad_to(encoder.context_limit(), pad, encoder.pad_id());
        }
        sequence
    }

    fn masks(
        &self,
        model: &LoadedModel,
        source: &str,
        sequence: &EncodedSequence,
        parameter_count: usize,
    ) -> Vec<Vec<u32>> {
        let masks = FunctionSignature::parse(source).and_then(|signature| {
            parameter_masks(
                &signature,
                sequence,
                model.pipeline().normalizer(),
                model.continuation_prefix(),
                parameter_count,
            )
        });
        masks.unwrap_or_else(|| {
            debug!("No parameter positions for {} parameters", parameter_count);
            vec![vec![0; sequence.len()]; parameter_count]
        })
    }
}

fn classify_parameter(
    model: &LoadedModel,
    sequence: &EncodedSequence,
    parameter: usize,
    mask: &[u32],
) -> Result<ClassificationSet> {
    let input = ModelInput {
        sequence,
        parameter_index: parameter,
        parameter_mask: mask,
    };
    let scores = model
        .backend()
        .infer(&input)
        .map_err(|reason| Error::Inference { parameter, reason })?;

    if scores.len() != model.labels().len() {
        warn!(
            "Parameter {}: {} scores for {} labels",
            parameter,
            scores.len(),
            model.labels().len()
        );
        return Err(Error::Inference {
            parameter,
            reason: format!(
                "expected {} scores, got {}",
                model.labels().len(),
                scores.len()
            ),
        });
    }

    Ok(classify(model.labels(), &softmax(&scores)))
}
