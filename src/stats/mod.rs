//! Descriptive statistics and claims analytics
//!
//! Aggregations are computed over plain column vectors extracted from
//! the frame. Every mean is coerced to a finite float (defaulting to 0)
//! and every count map is string-keyed, because the JSON serializer
//! rejects NaN and Infinity. Empty data produces zeroed structures, not
//! errors.

use crate::error::Result;
use crate::predict::PredictionRecord;
use crate::preprocessing::{numeric_column, string_column};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::collections::BTreeMap;

/// Age bin edges shared by all claims analyses.
const AGE_BIN_EDGES: [f64; 5] = [30.0, 40.0, 50.0, 60.0, 100.0];
const AGE_BIN_LABELS: [&str; 5] = ["<30", "30-40", "40-50", "50-60", "60+"];

/// Premium quantile bin labels, lowest to highest.
const PREMIUM_BIN_LABELS: [&str; 5] = ["Low", "Medium-Low", "Medium", "Medium-High", "High"];

/// Aggregate dataset statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetStats {
    pub total_policies: usize,
    pub avg_premium: f64,
    pub avg_claim: f64,
    pub avg_age: f64,
    pub avg_bmi: f64,
    pub smoker_percentage: f64,
    pub regions: BTreeMap<String, u64>,
    pub gender_distribution: BTreeMap<String, u64>,
}

/// Mean claim and premium for one group
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupMeans {
    pub avg_claim: f64,
    pub avg_premium: f64,
}

/// Per-region breakdown
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegionBreakdown {
    pub avg_claim: f64,
    pub policy_count: u64,
    pub avg_premium: f64,
}

/// Grouped claims analysis
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClaimsAnalysis {
    pub age_groups: BTreeMap<String, GroupMeans>,
    pub region_analysis: BTreeMap<String, RegionBreakdown>,
    pub smoker_analysis: BTreeMap<String, GroupMeans>,
    pub premium_vs_claims: BTreeMap<String, f64>,
}

/// Coerce a mean to a finite value; NaN/Inf and empty inputs become 0.
fn safe_mean(values: &[Option<f64>]) -> f64 {
    let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    if present.is_empty() {
        return 0.0;
    }
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    if mean.is_finite() {
        mean
    } else {
        0.0
    }
}

fn value_counts(values: &[Option<String>]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for value in values {
        let key = value.clone().unwrap_or_else(|| "Unknown".to_string());
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Compute aggregate statistics over a dataset frame.
pub fn global_stats(df: &DataFrame) -> Result<DatasetStats> {
    if df.height() == 0 {
        return Ok(DatasetStats::default());
    }

    let smokers = string_column(df, "smoker")?;
    let smoker_count = smokers
        .iter()
        .filter(|v| v.as_deref() == Some("Yes"))
        .count();
    let smoker_percentage = if smokers.is_empty() {
        0.0
    } else {
        smoker_count as f64 / smokers.len() as f64 * 100.0
    };

    Ok(DatasetStats {
        total_policies: df.height(),
        avg_premium: safe_mean(&numeric_column(df, "premium_annual_inr")?),
        avg_claim: safe_mean(&numeric_column(df, "claim_amount_inr")?),
        avg_age: safe_mean(&numeric_column(df, "age")?),
        avg_bmi: safe_mean(&numeric_column(df, "bmi")?),
        smoker_percentage,
        regions: value_counts(&string_column(df, "region")?),
        gender_distribution: value_counts(&string_column(df, "gender")?),
    })
}

/// Label for an age value, or None when it falls outside the bins.
fn age_bin(age: f64) -> Option<&'static str> {
    if age <= 0.0 {
        return None;
    }
    for (edge, label) in AGE_BIN_EDGES.iter().zip(AGE_BIN_LABELS.iter()) {
        if age <= *edge {
            return Some(label);
        }
    }
    None
}

/// Quantile bin edges over the distinct premium values. Degrades to
/// fewer bins when there are fewer than 5 distinct values.
fn premium_bin_edges(premiums: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = premiums.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted.dedup();
    if sorted.len() <= 1 {
        return Vec::new();
    }

    let n_bins = sorted.len().min(PREMIUM_BIN_LABELS.len());
    let mut edges = Vec::new();
    for k in 1..n_bins {
        let q = k as f64 / n_bins as f64;
        let pos = q * (sorted.len() - 1) as f64;
        let lower = pos.floor() as usize;
        let upper = pos.ceil() as usize;
        let edge = if lower == upper {
            sorted[lower]
        } else {
            sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
        };
        if edges.last().map_or(true, |last| edge > *last) {
            edges.push(edge);
        }
    }
    edges
}

fn premium_bin(value: f64, edges: &[f64]) -> usize {
    edges.iter().filter(|edge| value > **edge).count()
}

/// Compute grouped claims analytics over a dataset frame.
pub fn claims_analysis(df: &DataFrame) -> Result<ClaimsAnalysis> {
    if df.height() == 0 {
        return Ok(ClaimsAnalysis::default());
    }

    let ages = numeric_column(df, "age")?;
    let premiums = numeric_column(df, "premium_annual_inr")?;
    let claims = numeric_column(df, "claim_amount_inr")?;
    let regions = string_column(df, "region")?;
    let smokers = string_column(df, "smoker")?;

    // Age groups
    let mut age_acc: BTreeMap<String, (f64, f64, u64)> = BTreeMap::new();
    for i in 0..df.height() {
        let (Some(age), Some(claim), Some(premium)) = (ages[i], claims[i], premiums[i]) else {
            continue;
        };
        if let Some(label) = age_bin(age) {
            let entry = age_acc.entry(label.to_string()).or_insert((0.0, 0.0, 0));
            entry.0 += claim;
            entry.1 += premium;
            entry.2 += 1;
        }
    }
    let age_groups = age_acc
        .into_iter()
        .map(|(label, (claim_sum, premium_sum, count))| {
            (
                label,
                GroupMeans {
                    avg_claim: claim_sum / count as f64,
                    avg_premium: premium_sum / count as f64,
                },
            )
        })
        .collect();

    // Regions
    let mut region_acc: BTreeMap<String, (f64, f64, u64)> = BTreeMap::new();
    for i in 0..df.height() {
        let (Some(claim), Some(premium)) = (claims[i], premiums[i]) else {
            continue;
        };
        let region = regions[i].clone().unwrap_or_else(|| "Unknown".to_string());
        let entry = region_acc.entry(region).or_insert((0.0, 0.0, 0));
        entry.0 += claim;
        entry.1 += premium;
        entry.2 += 1;
    }
    let region_analysis = region_acc
        .into_iter()
        .map(|(region, (claim_sum, premium_sum, count))| {
            (
                region,
                RegionBreakdown {
                    avg_claim: claim_sum / count as f64,
                    policy_count: count,
                    avg_premium: premium_sum / count as f64,
                },
            )
        })
        .collect();

    // Smoker status
    let mut smoker_acc: BTreeMap<String, (f64, f64, u64)> = BTreeMap::new();
    for i in 0..df.height() {
        let (Some(claim), Some(premium)) = (claims[i], premiums[i]) else {
            continue;
        };
        let smoker = smokers[i].clone().unwrap_or_else(|| "Unknown".to_string());
        let entry = smoker_acc.entry(smoker).or_insert((0.0, 0.0, 0));
        entry.0 += claim;
        entry.1 += premium;
        entry.2 += 1;
    }
    let smoker_analysis = smoker_acc
        .into_iter()
        .map(|(smoker, (claim_sum, premium_sum, count))| {
            (
                smoker,
                GroupMeans {
                    avg_claim: claim_sum / count as f64,
                    avg_premium: premium_sum / count as f64,
                },
            )
        })
        .collect();

    // Premium quantile bins
    let present_premiums: Vec<f64> = premiums.iter().filter_map(|v| *v).collect();
    let edges = premium_bin_edges(&present_premiums);
    let mut bin_acc: Vec<(f64, u64)> = vec![(0.0, 0); edges.len() + 1];
    for i in 0..df.height() {
        let (Some(premium), Some(claim)) = (premiums[i], claims[i]) else {
            continue;
        };
        let bin = premium_bin(premium, &edges);
        bin_acc[bin].0 += claim;
        bin_acc[bin].1 += 1;
    }
    let premium_vs_claims = bin_acc
        .into_iter()
        .enumerate()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(bin, (claim_sum, count))| {
            (
                PREMIUM_BIN_LABELS[bin.min(PREMIUM_BIN_LABELS.len() - 1)].to_string(),
                claim_sum / count as f64,
            )
        })
        .collect();

    Ok(ClaimsAnalysis {
        age_groups,
        region_analysis,
        smoker_analysis,
        premium_vs_claims,
    })
}

/// Statistics over one user's prediction history. No history yields
/// the zeroed structure.
pub fn user_stats(records: &[PredictionRecord]) -> Result<DatasetStats> {
    if records.is_empty() {
        return Ok(DatasetStats::default());
    }
    let df = crate::data::predictions_frame(records)?;
    global_stats(&df)
}

/// Claims analysis over one user's prediction history.
pub fn user_claims_analysis(records: &[PredictionRecord]) -> Result<ClaimsAnalysis> {
    if records.is_empty() {
        return Ok(ClaimsAnalysis::default());
    }
    let df = crate::data::predictions_frame(records)?;
    claims_analysis(&df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn frame(
        ages: Vec<f64>,
        smokers: Vec<&str>,
        premiums: Vec<f64>,
        claims: Vec<f64>,
    ) -> DataFrame {
        let n = ages.len();
        DataFrame::new(vec![
            Column::new("age".into(), ages),
            Column::new("bmi".into(), vec![25.0; n]),
            Column::new("gender".into(), vec!["Male"; n]),
            Column::new("smoker".into(), smokers),
            Column::new("region".into(), vec!["North"; n]),
            Column::new("premium_annual_inr".into(), premiums),
            Column::new("claim_amount_inr".into(), claims),
        ])
        .unwrap()
    }

    #[test]
    fn test_half_smokers_is_exactly_fifty_percent() {
        let n = 100;
        let smokers: Vec<&str> = (0..n).map(|i| if i < 50 { "No" } else { "Yes" }).collect();
        let df = frame(
            vec![25.0; n],
            smokers,
            vec![15000.0; n],
            vec![12000.0; n],
        );

        let stats = global_stats(&df).unwrap();
        assert_eq!(stats.smoker_percentage, 50.0);
        assert_eq!(stats.total_policies, 100);
        assert_eq!(stats.avg_claim, 12000.0);
        assert_eq!(stats.avg_premium, 15000.0);
    }

    #[test]
    fn test_empty_frame_yields_zeroed_stats() {
        let df = frame(vec![], vec![], vec![], vec![]);
        let stats = global_stats(&df).unwrap();

        assert_eq!(stats.total_policies, 0);
        assert_eq!(stats.avg_claim, 0.0);
        assert!(stats.regions.is_empty());
    }

    #[test]
    fn test_stats_are_always_finite() {
        let df = frame(
            vec![f64::NAN, 30.0],
            vec!["No", "Yes"],
            vec![f64::INFINITY, 20000.0],
            vec![10000.0, 30000.0],
        );

        let stats = global_stats(&df).unwrap();
        assert!(stats.avg_age.is_finite());
        assert!(stats.avg_premium.is_finite());
        // Non-finite inputs are treated as missing, not propagated.
        assert_eq!(stats.avg_age, 30.0);
        assert_eq!(stats.avg_premium, 20000.0);
    }

    #[test]
    fn test_age_bins() {
        assert_eq!(age_bin(25.0), Some("<30"));
        assert_eq!(age_bin(30.0), Some("<30"));
        assert_eq!(age_bin(35.0), Some("30-40"));
        assert_eq!(age_bin(60.0), Some("50-60"));
        assert_eq!(age_bin(75.0), Some("60+"));
        assert_eq!(age_bin(150.0), None);
        assert_eq!(age_bin(0.0), None);
    }

    #[test]
    fn test_claims_analysis_groups() {
        let df = frame(
            vec![25.0, 35.0, 45.0, 65.0],
            vec!["No", "Yes", "No", "Yes"],
            vec![10000.0, 20000.0, 30000.0, 40000.0],
            vec![5000.0, 15000.0, 25000.0, 35000.0],
        );

        let analysis = claims_analysis(&df).unwrap();
        assert_eq!(analysis.age_groups.len(), 4);
        assert_eq!(analysis.age_groups["<30"].avg_claim, 5000.0);
        assert_eq!(analysis.smoker_analysis["Yes"].avg_claim, 25000.0);
        assert_eq!(analysis.region_analysis["North"].policy_count, 4);
    }

    #[test]
    fn test_premium_bins_degrade_below_five_distinct_values() {
        let df = frame(
            vec![25.0, 35.0, 45.0],
            vec!["No", "No", "No"],
            vec![10000.0, 10000.0, 20000.0],
            vec![5000.0, 6000.0, 9000.0],
        );

        // Two distinct premiums must not raise; they produce two bins.
        let analysis = claims_analysis(&df).unwrap();
        assert_eq!(analysis.premium_vs_claims.len(), 2);
        assert!(analysis.premium_vs_claims.contains_key("Low"));
    }

    #[test]
    fn test_single_premium_value_collapses_to_one_bin() {
        let df = frame(
            vec![25.0, 35.0],
            vec!["No", "No"],
            vec![15000.0, 15000.0],
            vec![5000.0, 7000.0],
        );

        let analysis = claims_analysis(&df).unwrap();
        assert_eq!(analysis.premium_vs_claims.len(), 1);
        assert_eq!(analysis.premium_vs_claims["Low"], 6000.0);
    }

    #[test]
    fn test_empty_user_history_yields_zeroed_stats() {
        let stats = user_stats(&[]).unwrap();
        assert_eq!(stats.total_policies, 0);

        let analysis = user_claims_analysis(&[]).unwrap();
        assert!(analysis.age_groups.is_empty());
    }
}
