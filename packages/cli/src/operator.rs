//! Terminal implementation of the pipeline's operator hooks.

use std::sync::Arc;

use dialoguer::Input;
use odsynth_cli_utils::{IndicatifProgress, MultiProgress};
use odsynth_pipeline::config::validate_sample_size;
use odsynth_pipeline::{Operator, PipelineError, Stage};
use odsynth_trip_models::progress::ProgressCallback;

/// Draws progress bars on the shared [`MultiProgress`] and prompts for
/// the routing sample size.
pub struct TerminalOperator {
    multi: MultiProgress,
}

impl TerminalOperator {
    pub const fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl Operator for TerminalOperator {
    fn progress(&self, stage: Stage) -> Arc<dyn ProgressCallback> {
        let label = stage.to_string();
        match stage {
            Stage::Origins => IndicatifProgress::records_bar(&self.multi, &label),
            Stage::Routes | Stage::FixedOrigins => {
                IndicatifProgress::requests_bar(&self.multi, &label)
            }
        }
    }

    fn sample_size(&self, available: usize, daily_cap: usize) -> Result<usize, PipelineError> {
        let default = available.min(daily_cap).max(1);
        self.multi
            .suspend(|| {
                Input::<usize>::new()
                    .with_prompt(format!(
                        "Records to route ({available} available, daily cap {daily_cap})"
                    ))
                    .default(default)
                    .validate_with(move |n: &usize| {
                        validate_sample_size(*n, available, daily_cap)
                            .map(|_| ())
                            .map_err(|e| e.to_string())
                    })
                    .interact_text()
            })
            .map_err(|e| PipelineError::Input {
                message: e.to_string(),
            })
    }
}
