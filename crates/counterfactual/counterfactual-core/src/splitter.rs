//! Cross-validation splitters.

use std::collections::HashMap;

use counterfactual_spi::{CounterfactualError, Fold, FoldSplitter, Result};
use tracing::warn;

/// Contiguous, unshuffled K-fold splitter.
///
/// The first `n_rows % n_splits` folds hold one extra row.
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }
}

impl FoldSplitter for KFold {
    fn split(&self, n_rows: usize, _groups: Option<&[String]>) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(CounterfactualError::InvalidConfig(
                "n_splits must be >= 2".into(),
            ));
        }
        if n_rows < self.n_splits {
            return Err(CounterfactualError::InsufficientData {
                required: self.n_splits,
                actual: n_rows,
            });
        }

        let base = n_rows / self.n_splits;
        let extra = n_rows % self.n_splits;

        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let size = base + usize::from(i < extra);
            let end = start + size;
            let test: Vec<usize> = (start..end).collect();
            let train: Vec<usize> = (0..start).chain(end..n_rows).collect();
            folds.push(Fold::new(train, test));
            start = end;
        }

        Ok(folds)
    }

    fn n_splits(&self) -> usize {
        self.n_splits
    }
}

/// K-fold splitter that keeps every group on one side of each fold.
///
/// Groups are taken largest first (ties in order of first appearance) and
/// each is placed in the fold with the fewest rows so far. When there are
/// fewer groups than requested splits, each group becomes its own fold.
#[derive(Debug, Clone)]
pub struct GroupKFold {
    n_splits: usize,
}

impl GroupKFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// Fold index assigned to each distinct group, keyed by label.
    pub fn assign_groups(&self, groups: &[String]) -> Result<HashMap<String, usize>> {
        if self.n_splits < 2 {
            return Err(CounterfactualError::InvalidConfig(
                "n_splits must be >= 2".into(),
            ));
        }

        // label -> (first appearance, size)
        let mut stats: HashMap<&str, (usize, usize)> = HashMap::new();
        for (i, label) in groups.iter().enumerate() {
            stats.entry(label.as_str()).or_insert((i, 0)).1 += 1;
        }

        let n_groups = stats.len();
        if n_groups < 2 {
            return Err(CounterfactualError::InsufficientData {
                required: 2,
                actual: n_groups,
            });
        }

        let n_folds = if n_groups < self.n_splits {
            warn!(
                n_groups,
                n_splits = self.n_splits,
                "fewer spatial groups than folds; using one fold per group"
            );
            n_groups
        } else {
            self.n_splits
        };

        let mut ordered: Vec<(&str, usize, usize)> = stats
            .into_iter()
            .map(|(label, (first, size))| (label, first, size))
            .collect();
        ordered.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)));

        let mut fold_sizes = vec![0usize; n_folds];
        let mut assignment = HashMap::with_capacity(ordered.len());
        for (label, _, size) in ordered {
            let lightest = fold_sizes
                .iter()
                .enumerate()
                .min_by_key(|(i, s)| (**s, *i))
                .map(|(i, _)| i)
                .unwrap_or(0);
            fold_sizes[lightest] += size;
            assignment.insert(label.to_string(), lightest);
        }

        Ok(assignment)
    }
}

impl FoldSplitter for GroupKFold {
    fn split(&self, n_rows: usize, groups: Option<&[String]>) -> Result<Vec<Fold>> {
        let groups = groups.ok_or_else(|| {
            CounterfactualError::InvalidConfig("GroupKFold requires a group label per row".into())
        })?;
        if groups.len() != n_rows {
            return Err(CounterfactualError::ShapeMismatch {
                expected: n_rows,
                actual: groups.len(),
            });
        }

        let assignment = self.assign_groups(groups)?;
        let n_folds = assignment.values().copied().max().map_or(0, |m| m + 1);

        let mut folds = Vec::with_capacity(n_folds);
        for fold in 0..n_folds {
            let mut train = Vec::new();
            let mut test = Vec::new();
            for (i, label) in groups.iter().enumerate() {
                if assignment[label] == fold {
                    test.push(i);
                } else {
                    train.push(i);
                }
            }
            folds.push(Fold::new(train, test));
        }

        Ok(folds)
    }

    fn n_splits(&self) -> usize {
        self.n_splits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_kfold_sizes() {
        let folds = KFold::new(3).split(10, None).unwrap();
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].test, vec![0, 1, 2, 3]);
        assert_eq!(folds[1].test, vec![4, 5, 6]);
        assert_eq!(folds[2].test, vec![7, 8, 9]);
        assert_eq!(folds[1].train, vec![0, 1, 2, 3, 7, 8, 9]);
    }

    #[test]
    fn test_kfold_insufficient_rows() {
        assert!(matches!(
            KFold::new(3).split(2, None),
            Err(CounterfactualError::InsufficientData { required: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_group_kfold_never_splits_a_group() {
        let groups = labels(&["a", "a", "b", "c", "c", "c", "d", "e", "e", "f", "g", "g"]);
        let folds = GroupKFold::new(5).split(groups.len(), Some(groups.as_slice())).unwrap();
        assert_eq!(folds.len(), 5);

        for fold in &folds {
            let test_groups: HashSet<&String> = fold.test.iter().map(|&i| &groups[i]).collect();
            let train_groups: HashSet<&String> = fold.train.iter().map(|&i| &groups[i]).collect();
            assert!(test_groups.is_disjoint(&train_groups));
            assert_eq!(fold.test.len() + fold.train.len(), groups.len());
        }
    }

    #[test]
    fn test_group_kfold_covers_every_row_once() {
        let groups = labels(&["a", "b", "b", "c", "d", "d", "d", "e", "f"]);
        let folds = GroupKFold::new(3).split(groups.len(), Some(groups.as_slice())).unwrap();

        let mut seen = vec![0usize; groups.len()];
        for fold in &folds {
            for &i in &fold.test {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_group_kfold_balances_by_size() {
        // sizes: d=3, b=2, then singletons
        let groups = labels(&["a", "b", "b", "c", "d", "d", "d"]);
        let assignment = GroupKFold::new(2).assign_groups(&groups).unwrap();
        assert_eq!(assignment["d"], 0);
        assert_eq!(assignment["b"], 1);
        // fold sizes now 3 and 2: "a" goes to fold 1, then "c" to fold 0
        assert_eq!(assignment["a"], 1);
        assert_eq!(assignment["c"], 0);
    }

    #[test]
    fn test_group_kfold_fewer_groups_than_splits() {
        let groups = labels(&["a", "a", "a", "b", "b"]);
        let folds = GroupKFold::new(5).split(groups.len(), Some(groups.as_slice())).unwrap();
        assert_eq!(folds.len(), 2);
    }

    #[test]
    fn test_group_kfold_single_group_fails() {
        let groups = labels(&["a", "a", "a"]);
        assert!(GroupKFold::new(5).split(3, Some(groups.as_slice())).is_err());
    }

    #[test]
    fn test_group_kfold_requires_groups() {
        assert!(GroupKFold::new(5).split(3, None).is_err());
        let groups = labels(&["a", "b"]);
        assert!(GroupKFold::new(2).split(3, Some(groups.as_slice())).is_err());
    }
}
