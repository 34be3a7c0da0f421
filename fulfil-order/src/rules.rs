use serde::{Deserialize, Serialize};

use crate::validation::ToleranceRule;

/// Tunables the engine is constructed with. Loaded from configuration by the
/// binary; the engine itself never reads configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineRules {
    pub tolerance: ToleranceRule,
    /// Minimum trimmed length for free-text reasons (rejections, returns,
    /// carrier changes, cancellations)
    pub min_reason_len: usize,
}

impl Default for EngineRules {
    fn default() -> Self {
        Self {
            tolerance: ToleranceRule::default(),
            min_reason_len: 5,
        }
    }
}

impl EngineRules {
    /// Trimmed reason, or a validation message naming the field.
    pub fn reason<'a>(&self, field: &str, raw: &'a str) -> Result<&'a str, String> {
        let trimmed = raw.trim();
        if trimmed.chars().count() < self.min_reason_len {
            return Err(format!(
                "{} must be at least {} characters",
                field, self.min_reason_len
            ));
        }
        Ok(trimmed)
    }
}
