use crate::model::errors::{FitError, FitResult};
use std::collections::{BTreeMap, BTreeSet};

/// split `<prefix>_<TG>~<TF>_<suffix>` into (TG, TF)
pub fn parse_pair_key(key: &str) -> FitResult<(String, String)> {
    let mut segments = key.split('_').filter(|s| s.contains('~'));
    let segment = segments
        .next()
        .ok_or_else(|| FitError::InvalidPairKey { key: key.to_string() })?;
    if segments.next().is_some() {
        return Err(FitError::InvalidPairKey { key: key.to_string() });
    }
    match segment.split_once('~') {
        Some((tg, tf)) if !tg.is_empty() && !tf.is_empty() && !tf.contains('~') => {
            Ok((tg.to_string(), tf.to_string()))
        }
        _ => Err(FitError::InvalidPairKey { key: key.to_string() }),
    }
}

/// one TF-TG pair: three aligned pseudotime series and the prior regulatory strength
#[derive(Debug, Clone, PartialEq)]
pub struct PairSeries {
    pub key: String,
    pub tg: String,
    pub tf: String,
    /// standard regulatory strength theta_s
    pub theta_s: f64,
    /// TF expression
    pub tfe: Vec<f64>,
    /// TG chromatin activity
    pub tga: Vec<f64>,
    /// TG expression
    pub tge: Vec<f64>,
}

impl PairSeries {
    pub fn new(
        key: &str,
        theta_s: f64,
        tfe: Vec<f64>,
        tga: Vec<f64>,
        tge: Vec<f64>,
    ) -> FitResult<Self> {
        let (tg, tf) = parse_pair_key(key)?;
        let len = tfe.len();
        if tga.len() != len || tge.len() != len {
            return Err(FitError::InvalidInput(format!(
                "pair {}: channel lengths differ (TFE {}, TGA {}, TGE {})",
                key,
                len,
                tga.len(),
                tge.len()
            )));
        }
        if len < 2 {
            return Err(FitError::DegenerateSeriesError {
                pair: key.to_string(),
                len,
            });
        }
        if !theta_s.is_finite()
            || tfe.iter().chain(tga.iter()).chain(tge.iter()).any(|v| !v.is_finite())
        {
            return Err(FitError::InvalidInput(format!(
                "pair {} contains non-finite values",
                key
            )));
        }
        Ok(PairSeries {
            key: key.to_string(),
            tg,
            tf,
            theta_s,
            tfe,
            tga,
            tge,
        })
    }

    pub fn len(&self) -> usize {
        self.tfe.len()
    }
}

/// read-only training table of one branch, rows kept in pair-key order
#[derive(Debug, Clone)]
pub struct TrainingData {
    rows: Vec<PairSeries>,
    series_len: usize,
}

impl TrainingData {
    pub fn new(rows: Vec<PairSeries>) -> FitResult<Self> {
        if rows.is_empty() {
            return Err(FitError::InvalidInput(
                "training data contains no TF-TG pairs".to_string(),
            ));
        }
        let series_len = rows[0].len();
        let mut by_key: BTreeMap<String, PairSeries> = BTreeMap::new();
        for row in rows {
            if row.len() < 2 {
                return Err(FitError::DegenerateSeriesError {
                    pair: row.key.clone(),
                    len: row.len(),
                });
            }
            if row.len() != series_len {
                return Err(FitError::InvalidInput(format!(
                    "pair {} has {} pseudotime points, branch has {}",
                    row.key,
                    row.len(),
                    series_len
                )));
            }
            if by_key.contains_key(&row.key) {
                return Err(FitError::InvalidInput(format!(
                    "duplicate pair key {}",
                    row.key
                )));
            }
            by_key.insert(row.key.clone(), row);
        }
        Ok(TrainingData {
            rows: by_key.into_values().collect(),
            series_len,
        })
    }

    pub fn rows(&self) -> &[PairSeries] {
        &self.rows
    }

    /// number of pseudotime points L shared by every pair
    pub fn series_len(&self) -> usize {
        self.series_len
    }

    /// number of transitions L-1 (= number of time slots of series parameters)
    pub fn n_slots(&self) -> usize {
        self.series_len - 1
    }

    pub fn tf_ids(&self) -> BTreeSet<String> {
        self.rows.iter().map(|r| r.tf.clone()).collect()
    }

    pub fn tg_ids(&self) -> BTreeSet<String> {
        self.rows.iter().map(|r| r.tg.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair_key() {
        assert_eq!(
            parse_pair_key("B1_Gata1~Spi1_7").unwrap(),
            ("Gata1".to_string(), "Spi1".to_string())
        );
        assert_eq!(
            parse_pair_key("Gata1~Spi1").unwrap(),
            ("Gata1".to_string(), "Spi1".to_string())
        );
        assert!(matches!(
            parse_pair_key("B1_Gata1-Spi1_7"),
            Err(FitError::InvalidPairKey { .. })
        ));
        assert!(parse_pair_key("B1_~Spi1_7").is_err());
        assert!(parse_pair_key("B1_Gata1~_7").is_err());
        assert!(parse_pair_key("A~B_C~D").is_err());
    }

    #[test]
    fn test_degenerate_series_rejected() {
        let res = PairSeries::new("b_X~Y_1", 0.5, vec![1.0], vec![1.0], vec![1.0]);
        assert_eq!(
            res,
            Err(FitError::DegenerateSeriesError {
                pair: "b_X~Y_1".to_string(),
                len: 1
            })
        );
    }

    #[test]
    fn test_channel_length_mismatch_rejected() {
        let res = PairSeries::new("b_X~Y_1", 0.5, vec![1.0, 2.0], vec![1.0], vec![1.0, 2.0]);
        assert!(matches!(res, Err(FitError::InvalidInput(_))));
    }

    #[test]
    fn test_training_data_orders_rows_and_collects_entities() {
        let s = vec![1.0, 2.0];
        let a = PairSeries::new("b_Klf1~Spi1_2", 0.3, s.clone(), s.clone(), s.clone()).unwrap();
        let b = PairSeries::new("b_Gata1~Spi1_1", 0.8, s.clone(), s.clone(), s).unwrap();
        let data = TrainingData::new(vec![a, b]).unwrap();
        assert_eq!(data.rows()[0].key, "b_Gata1~Spi1_1");
        assert_eq!(data.series_len(), 2);
        assert_eq!(data.n_slots(), 1);
        assert_eq!(data.tf_ids().into_iter().collect::<Vec<_>>(), vec!["Spi1"]);
        assert_eq!(
            data.tg_ids().into_iter().collect::<Vec<_>>(),
            vec!["Gata1", "Klf1"]
        );
    }

    #[test]
    fn test_training_data_rejects_duplicates_and_ragged_branches() {
        let two = vec![1.0, 2.0];
        let a = PairSeries::new("b_X~Y_1", 0.3, two.clone(), two.clone(), two).unwrap();
        assert!(TrainingData::new(vec![a.clone(), a.clone()]).is_err());
        let three = vec![1.0, 2.0, 3.0];
        let c = PairSeries::new("b_Z~Y_1", 0.3, three.clone(), three.clone(), three).unwrap();
        assert!(TrainingData::new(vec![a, c]).is_err());
        assert!(TrainingData::new(vec![]).is_err());
    }
}
