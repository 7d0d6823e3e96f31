use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeritTerm {
    pub index: usize,
    pub operand: String,
    pub config_id: String,
    pub value: f64,
    pub target: f64,
    pub weight: f64,
    // value - target
    pub error: f64,
    // weight * error^2
    pub term: f64,
    // sqrt(max(0, weight)) * error, for least-squares solvers
    pub residual: f64,
    // Impact %
    pub contribution: f64,
}

impl MeritTerm {
    pub fn new(
        index: usize,
        operand: &str,
        config_id: &str,
        value: f64,
        target: f64,
        weight: f64,
    ) -> Self {
        let error = value - target;
        Self {
            index,
            operand: operand.to_string(),
            config_id: config_id.to_string(),
            value,
            target,
            weight,
            error,
            term: weight * error * error,
            residual: weight.max(0.0).sqrt() * error,
            contribution: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeritBreakdown {
    pub terms: Vec<MeritTerm>,
    pub total: f64,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

impl MeritBreakdown {
    /// Sums the terms and fills in each impact percentage.
    pub fn from_terms(mut terms: Vec<MeritTerm>, cache_hits: usize, cache_misses: usize) -> Self {
        let total: f64 = terms.iter().map(|t| t.term).sum();
        for t in &mut terms {
            t.contribution = if total > 0.0 {
                100.0 * t.term / total
            } else {
                0.0
            };
        }
        Self {
            terms,
            total,
            cache_hits,
            cache_misses,
        }
    }

    pub fn residuals(&self) -> Vec<f64> {
        self.terms.iter().map(|t| t.residual).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contributions_sum_to_hundred() {
        let b = MeritBreakdown::from_terms(
            vec![
                MeritTerm::new(0, "EFL", "", 102.0, 100.0, 1.0),
                MeritTerm::new(1, "BFL", "", 1.0, 0.0, 4.0),
            ],
            0,
            0,
        );
        assert_eq!(b.total, 8.0);
        assert_eq!(b.terms[0].contribution, 50.0);
        assert_eq!(b.residuals(), vec![2.0, 2.0]);
    }

    #[test]
    fn test_negative_weight_has_zero_residual_scale() {
        let t = MeritTerm::new(0, "EFL", "", 3.0, 1.0, -1.0);
        assert_eq!(t.term, -4.0);
        assert_eq!(t.residual, 0.0);
    }
}
