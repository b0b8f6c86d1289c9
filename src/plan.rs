//! Human-readable explanation of a pipeline's stage chain.
//!
//! Nothing here executes the pipeline: the explanation is derived from the
//! [`StageInfo`] records each chain call appends.
//!
//! ```
//! use rowbeam::Pipeline;
//!
//! let p = Pipeline::from_vec(vec![3, 1, 2])
//!     .filter(|x| *x > 1)
//!     .order_by(|x| *x);
//! let explanation = p.explain();
//! assert_eq!(explanation.steps.len(), 3);
//! assert_eq!(explanation.barriers, 1);
//! println!("{explanation}");
//! ```

use crate::stage::StageInfo;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Explanation of a pipeline: one step per recorded stage, source first.
#[derive(Debug, Clone)]
pub struct ExecutionExplanation {
    pub steps: Vec<ExplainStep>,
    /// Stages that materialize their whole input.
    pub barriers: usize,
    /// Stages that fan out across a worker pool.
    pub parallel_stages: usize,
}

/// A single step in the explanation.
#[derive(Debug, Clone)]
pub struct ExplainStep {
    /// 1-based position in the chain.
    pub step: usize,
    pub name: String,
    pub detail: Option<String>,
    pub is_barrier: bool,
    pub is_parallel: bool,
}

impl ExecutionExplanation {
    pub(crate) fn from_stages(stages: &[StageInfo]) -> Self {
        let steps: Vec<ExplainStep> = stages
            .iter()
            .enumerate()
            .map(|(idx, info)| ExplainStep {
                step: idx + 1,
                name: info.kind.to_string(),
                detail: info.detail.clone(),
                is_barrier: info.kind.is_barrier(),
                is_parallel: info.kind.is_parallel(),
            })
            .collect();
        let barriers = steps.iter().filter(|s| s.is_barrier).count();
        let parallel_stages = steps.iter().filter(|s| s.is_parallel).count();
        Self {
            steps,
            barriers,
            parallel_stages,
        }
    }
}

impl Display for ExecutionExplanation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        writeln!(
            f,
            "┌─ PIPELINE ({} stages, {} barriers, {} parallel) ─",
            self.steps.len(),
            self.barriers,
            self.parallel_stages
        )?;
        for step in &self.steps {
            let mut markers = String::new();
            if step.is_barrier {
                markers.push_str(" [BARRIER]");
            }
            if step.is_parallel {
                markers.push_str(" [PARALLEL]");
            }
            write!(f, "│ Step {}: {}{}", step.step, step.name, markers)?;
            if let Some(detail) = &step.detail {
                write!(f, " - {detail}")?;
            }
            writeln!(f)?;
        }
        write!(f, "└─")
    }
}
