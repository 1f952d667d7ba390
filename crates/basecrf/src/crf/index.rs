use crate::error::{ConfigError, Result};

/// Largest edge count `C * NZ` [`TransitionIndex::new`] accepts.
///
/// The index keeps three tables of this length and every score tensor has it
/// as its last dimension.
pub const MAX_TRANSITIONS: usize = 1 << 24;

/// Compact transition graph of a CTC-CRF.
///
/// Row `c` lists the `NZ` edges entering state `c`: `source(c, z)` is the
/// state edge `(c, z)` leaves. Edge slot `0` is the stay edge, slots
/// `1..=n_base` are moves. Flattened edge `c * NZ + z` is the position of the
/// matching score in a `(.., C * NZ)` transition score tensor.
///
/// The table is validated once at construction and never mutated, so it can be
/// shared freely across scorers and threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionIndex {
    n_states: usize,
    out_degree: usize,
    sources: Vec<usize>,
    transposed: Vec<usize>,
    targets: Vec<usize>,
}

impl TransitionIndex {
    /// Build the index for an alphabet of `n_base` bases and states covering the
    /// last `state_len` emitted bases (`n_base^state_len` states, `n_base + 1`
    /// edges per state).
    pub fn new(n_base: usize, state_len: usize) -> Result<Self> {
        let invalid = |reason| ConfigError::InvalidModel {
            n_base,
            state_len,
            reason,
        };
        if n_base == 0 {
            return Err(invalid("alphabet has no bases").into());
        }
        if state_len == 0 {
            return Err(invalid("state length must be at least 1").into());
        }
        let n_states = u32::try_from(state_len)
            .ok()
            .and_then(|len| n_base.checked_pow(len))
            .ok_or_else(|| invalid("state space size overflows"))?;
        match n_states.checked_mul(n_base + 1) {
            Some(edges) if edges <= MAX_TRANSITIONS => {}
            _ => return Err(invalid("transition count exceeds MAX_TRANSITIONS").into()),
        }

        let rows = (0..n_states)
            .map(|c| {
                std::iter::once(c)
                    .chain((0..n_base).map(|k| (k * n_states + c) / n_base))
                    .collect()
            })
            .collect::<Vec<Vec<usize>>>();
        Self::from_table(&rows)
    }

    /// Build from an explicit table of source states, one row per state.
    ///
    /// Every entry must address a row of the table, all rows must have the same
    /// length, and every state must be the source of exactly as many edges as
    /// it has entering edges. The last condition is what makes the reversed
    /// (backward) graph expressible with the same shape.
    pub fn from_table(rows: &[Vec<usize>]) -> Result<Self> {
        let n_states = rows.len();
        let out_degree = rows.first().map(Vec::len).unwrap_or(0);
        if n_states == 0 || out_degree == 0 {
            return Err(ConfigError::IrregularIndex("empty transition table".to_string()).into());
        }

        let mut sources = Vec::with_capacity(n_states * out_degree);
        for (state, row) in rows.iter().enumerate() {
            if row.len() != out_degree {
                return Err(ConfigError::IrregularIndex(format!(
                    "state {state} has {} edges, expected {out_degree}",
                    row.len()
                ))
                .into());
            }
            for (slot, &source_state) in row.iter().enumerate() {
                if source_state >= n_states {
                    return Err(ConfigError::IndexOutOfRange {
                        state,
                        slot,
                        source_state,
                        n_states,
                    }
                    .into());
                }
                sources.push(source_state);
            }
        }

        let mut degree = vec![0usize; n_states];
        for &s in &sources {
            degree[s] += 1;
        }
        if let Some((state, &d)) = degree.iter().enumerate().find(|&(_, &d)| d != out_degree) {
            return Err(ConfigError::IrregularIndex(format!(
                "state {state} is the source of {d} edges, expected {out_degree}"
            ))
            .into());
        }

        // stable argsort: edges grouped by the state they leave
        let mut transposed: Vec<usize> = (0..sources.len()).collect();
        transposed.sort_by_key(|&edge| sources[edge]);
        let targets = transposed.iter().map(|&edge| edge / out_degree).collect();

        Ok(Self {
            n_states,
            out_degree,
            sources,
            transposed,
            targets,
        })
    }

    /// Number of states `C`.
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// Edges per state `NZ`.
    pub fn out_degree(&self) -> usize {
        self.out_degree
    }

    /// Total edge count `C * NZ`, the last dimension of a score tensor.
    pub fn n_transitions(&self) -> usize {
        self.sources.len()
    }

    /// The state edge `(state, slot)` leaves.
    ///
    /// # Parameters
    /// * `state` - The state the edge enters, below [`n_states`](Self::n_states)
    /// * `slot` - The edge's slot, below [`out_degree`](Self::out_degree)
    ///
    /// # Returns
    /// `None` if either argument is out of range
    pub fn source(&self, state: usize, slot: usize) -> Option<usize> {
        if state >= self.n_states || slot >= self.out_degree {
            return None;
        }
        self.sources.get(state * self.out_degree + slot).copied()
    }

    /// Flattened `(C, NZ)` source table.
    pub fn sources(&self) -> &[usize] {
        &self.sources
    }

    /// Flattened `(C, NZ)` table whose row `s` holds the flat positions of the
    /// edges leaving `s`.
    pub fn transposed(&self) -> &[usize] {
        &self.transposed
    }

    /// Flattened `(C, NZ)` table whose row `s` holds the states entered by the
    /// edges leaving `s`, aligned with [`transposed`](Self::transposed).
    pub fn transposed_targets(&self) -> &[usize] {
        &self.targets
    }
}
