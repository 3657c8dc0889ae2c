//! Deterministic train/validation/test splitting.
//!
//! Subset assignment must be a function of task identity, not of arrival
//! order: tasks are ordered by the SHA-256 digest of their instance id and
//! then sliced into fixed fractions, so re-running against the same corpus
//! snapshot yields byte-identical subsets and held-out tasks never leak
//! into training.

use sha2::{Digest, Sha256};

use super::Task;

/// Fraction of the corpus used for training.
pub const TRAIN_FRACTION: f64 = 0.67;
/// Fraction of the corpus used for validation.
pub const VAL_FRACTION: f64 = 0.17;

/// The three disjoint task subsets produced by [`split_tasks`].
#[derive(Debug, Clone, Default)]
pub struct TaskSplits {
    pub train: Vec<Task>,
    pub val: Vec<Task>,
    pub test: Vec<Task>,
}

impl TaskSplits {
    /// Total number of tasks across all subsets.
    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }
}

fn identity_digest(task: &Task) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(task.repo.as_bytes());
    hasher.update(b"/");
    hasher.update(task.instance_id.as_bytes());
    hasher.finalize().into()
}

/// Partition tasks into train/validation/test subsets (~67/17/16).
///
/// Sizes use nearest-integer rounding so small corpora still get a
/// non-degenerate train split. The subsets are disjoint and exhaustive.
pub fn split_tasks(mut tasks: Vec<Task>) -> TaskSplits {
    tasks.sort_by_cached_key(identity_digest);

    let n = tasks.len();
    let n_train = ((n as f64 * TRAIN_FRACTION).round() as usize).min(n);
    let n_val = ((n as f64 * VAL_FRACTION).round() as usize).min(n - n_train);

    let test = tasks.split_off(n_train + n_val);
    let val = tasks.split_off(n_train);

    TaskSplits {
        train: tasks,
        val,
        test,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> Task {
        Task {
            instance_id: id.to_string(),
            repo: "swesmith/pallets__jinja.ada0a9a6".to_string(),
            problem_statement: format!("bug {id}"),
            fail_to_pass: vec!["tests/test_x.py::test_a".to_string()],
            pass_to_pass: vec![],
            image_name: None,
            base_commit: "abc123".to_string(),
            patch: String::new(),
            created_at: None,
        }
    }

    fn corpus(n: usize) -> Vec<Task> {
        (0..n).map(|i| task(&format!("instance-{i:03}"))).collect()
    }

    #[test]
    fn splits_are_disjoint_and_exhaustive() {
        let splits = split_tasks(corpus(100));
        assert_eq!(splits.total(), 100);

        let mut ids: Vec<&str> = splits
            .train
            .iter()
            .chain(&splits.val)
            .chain(&splits.test)
            .map(|t| t.instance_id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 100, "subsets must not overlap");
    }

    #[test]
    fn split_ratios_approximate_67_17_16() {
        let splits = split_tasks(corpus(100));
        assert_eq!(splits.train.len(), 67);
        assert_eq!(splits.val.len(), 17);
        assert_eq!(splits.test.len(), 16);
    }

    #[test]
    fn small_corpus_gets_nearest_integer_split() {
        let splits = split_tasks(corpus(3));
        assert_eq!(splits.train.len(), 2);
        assert_eq!(splits.val.len(), 1);
        assert_eq!(splits.test.len(), 0);
        assert_eq!(splits.total(), 3);

        let one = split_tasks(corpus(1));
        assert_eq!(one.train.len(), 1);
        assert_eq!(one.total(), 1);
    }

    #[test]
    fn assignment_is_independent_of_arrival_order() {
        let forward = split_tasks(corpus(50));
        let mut reversed = corpus(50);
        reversed.reverse();
        let backward = split_tasks(reversed);

        let ids = |ts: &[Task]| -> Vec<String> {
            ts.iter().map(|t| t.instance_id.clone()).collect()
        };
        assert_eq!(ids(&forward.train), ids(&backward.train));
        assert_eq!(ids(&forward.val), ids(&backward.val));
        assert_eq!(ids(&forward.test), ids(&backward.test));
    }

    #[test]
    fn repeated_split_is_identical() {
        let a = split_tasks(corpus(30));
        let b = split_tasks(corpus(30));
        assert_eq!(
            a.train.iter().map(|t| &t.instance_id).collect::<Vec<_>>(),
            b.train.iter().map(|t| &t.instance_id).collect::<Vec<_>>()
        );
        assert_eq!(a.val.len(), b.val.len());
        assert_eq!(a.test.len(), b.test.len());
    }

    #[test]
    fn empty_corpus_splits_empty() {
        let splits = split_tasks(Vec::new());
        assert_eq!(splits.total(), 0);
    }
}
