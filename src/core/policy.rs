use crate::core::job::Job;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Chooses which of the jobs that passed this tick's availability scan gets
/// launched. Implementations must be pure and return an element of
/// `candidates`; `None` only for an empty slice.
pub trait SelectionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn select<'a>(&self, candidates: &[&'a Job]) -> Option<&'a Job>;
}

/// Earliest submission wins. Candidates arrive in registry order, so equal
/// timestamps resolve to the job submitted first.
#[derive(Debug, Default, Clone, Copy)]
pub struct EarliestSubmitted;

impl SelectionPolicy for EarliestSubmitted {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn select<'a>(&self, candidates: &[&'a Job]) -> Option<&'a Job> {
        candidates.iter().copied().min_by_key(|job| job.submitted_at)
    }
}

/// Packs the widest job first; ties fall back to submission order.
#[derive(Debug, Default, Clone, Copy)]
pub struct MostGpusFirst;

impl SelectionPolicy for MostGpusFirst {
    fn name(&self) -> &'static str {
        "most-gpus"
    }

    fn select<'a>(&self, candidates: &[&'a Job]) -> Option<&'a Job> {
        candidates
            .iter()
            .copied()
            .min_by_key(|job| (std::cmp::Reverse(job.gpu_ids.len()), job.submitted_at))
    }
}

/// Policy selector as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    Greedy,
    MostGpus,
}

impl PolicyKind {
    pub fn build(self) -> Box<dyn SelectionPolicy> {
        match self {
            PolicyKind::Greedy => Box::new(EarliestSubmitted),
            PolicyKind::MostGpus => Box::new(MostGpusFirst),
        }
    }
}
