/// Per-run ceiling on newly accepted identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaBoundedCollector {
    quota: usize,
}

impl QuotaBoundedCollector {
    pub fn new(quota: usize) -> Self {
        Self { quota }
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Returns true while another candidate may be accepted
    pub fn should_continue(&self, accepted: usize) -> bool {
        accepted < self.quota
    }

    pub fn remaining(&self, accepted: usize) -> usize {
        self.quota.saturating_sub(accepted)
    }
}
