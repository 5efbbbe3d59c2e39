use crate::model::DomainValue;

/// Per-variable candidate lists with liveness flags and an undo trail.
///
/// Values are never reordered: a variable's live values are always visited in
/// the order the candidate list was built. Every removal is pushed on the
/// trail, so restoring to a checkpoint revives exactly what was removed after it.
#[derive(Debug, Clone)]
pub struct Domains {
    candidates: Vec<Vec<DomainValue>>,
    live: Vec<Vec<bool>>,
    sizes: Vec<usize>,
    trail: Vec<(usize, usize)>,
}

impl Domains {
    pub fn new(candidates: Vec<Vec<DomainValue>>) -> Self {
        let live = candidates.iter().map(|c| vec![true; c.len()]).collect();
        let sizes = candidates.iter().map(Vec::len).collect();
        Self {
            candidates,
            live,
            sizes,
            trail: Vec::new(),
        }
    }

    /// Number of live values left for `var`.
    pub fn size(&self, var: usize) -> usize {
        self.sizes[var]
    }

    /// Length of the original candidate list of `var`, live or not.
    pub fn candidate_count(&self, var: usize) -> usize {
        self.candidates[var].len()
    }

    pub fn candidate(&self, var: usize, k: usize) -> DomainValue {
        self.candidates[var][k]
    }

    pub fn is_live(&self, var: usize, k: usize) -> bool {
        self.live[var][k]
    }

    /// Candidate positions still live for `var`.
    pub fn live_indices(&self, var: usize) -> impl Iterator<Item = usize> + '_ {
        self.live[var]
            .iter()
            .enumerate()
            .filter_map(|(k, alive)| alive.then_some(k))
    }

    pub fn live_values(&self, var: usize) -> impl Iterator<Item = DomainValue> + '_ {
        self.live_indices(var).map(move |k| self.candidates[var][k])
    }

    pub fn remove(&mut self, var: usize, k: usize) {
        if std::mem::replace(&mut self.live[var][k], false) {
            self.sizes[var] -= 1;
            self.trail.push((var, k));
        }
    }

    pub fn checkpoint(&self) -> usize {
        self.trail.len()
    }

    /// Revives every value removed since `checkpoint`, newest first.
    pub fn restore(&mut self, checkpoint: usize) {
        while self.trail.len() > checkpoint {
            if let Some((var, k)) = self.trail.pop() {
                self.live[var][k] = true;
                self.sizes[var] += 1;
            }
        }
    }

    /// Makes all removals so far permanent.
    pub fn commit(&mut self) {
        self.trail.clear();
    }

    /// Current live values of every variable.
    pub fn current(&self) -> Vec<Vec<DomainValue>> {
        (0..self.candidates.len())
            .map(|var| self.live_values(var).collect())
            .collect()
    }
}
