//! Occupation-vector indexing of the auxiliary density operators.
//!
//! Every live index n = (n_1, ..., n_d) with n_1 + ... + n_d <= L is stored
//! once in an insertion-ordered arena, enumerated level by level. Neighbour
//! tables for n + e_j and n - e_j are built with the arena, so propagation
//! never does index arithmetic.

use std::fmt;
use std::ops::Range;

use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::error::ConfigurationError;

/// Occupation numbers of one hierarchy member, one entry per bath mode
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HierarchyIndex(SmallVec<[u8; 8]>);

impl HierarchyIndex {
    pub fn zero(modes: usize) -> Self {
        HierarchyIndex(SmallVec::from_elem(0, modes))
    }

    pub fn modes(&self) -> usize {
        self.0.len()
    }

    pub fn level(&self) -> usize {
        self.0.iter().map(|&x| x as usize).sum()
    }

    pub fn occupation(&self, j: usize) -> usize {
        self.0[j] as usize
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// n + e_j
    pub fn raised(&self, j: usize) -> Self {
        let mut next = self.clone();
        next.0[j] += 1;
        next
    }

    /// n - e_j, if n_j > 0
    pub fn lowered(&self, j: usize) -> Option<Self> {
        if self.0[j] == 0 {
            return None;
        }
        let mut prev = self.clone();
        prev.0[j] -= 1;
        Some(prev)
    }
}

impl fmt::Display for HierarchyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, n) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", n)?;
        }
        write!(f, "]")
    }
}

/// Number of occupation vectors over `modes` modes with level <= `depth`,
///     C(depth + modes, modes)
/// or None if it does not fit in a u128
pub fn hierarchy_size(depth: usize, modes: usize) -> Option<u128> {
    let mut size: u128 = 1;
    for i in 1..=depth as u128 {
        size = size.checked_mul(modes as u128 + i)? / i;
    }
    Some(size)
}

/// Arena of all hierarchy members up to a truncation depth
#[derive(Clone, Debug)]
pub struct Hierarchy {
    depth: usize,
    modes: usize,
    members: IndexSet<HierarchyIndex>,
    up: Vec<SmallVec<[Option<usize>; 8]>>,
    down: Vec<SmallVec<[Option<usize>; 8]>>,
    level_starts: Vec<usize>,
}

impl Hierarchy {
    /// Enumerate the hierarchy breadth-first. Sizes are the caller's to check,
    /// see [`hierarchy_size`]. The depth must fit an 8-bit occupation.
    pub fn new(depth: usize, modes: usize) -> Result<Self, ConfigurationError> {
        if depth > u8::MAX as usize {
            return Err(ConfigurationError::Truncation {
                name: "hierarchy depth L",
                value: depth,
                range: "0..=255",
            });
        }
        let mut members = IndexSet::new();
        let mut level_starts = vec![0];
        members.insert(HierarchyIndex::zero(modes));

        for _ in 0..depth {
            let start = *level_starts.last().unwrap_or(&0);
            let end = members.len();
            for m in start..end {
                for j in 0..modes {
                    let next = members[m].raised(j);
                    members.insert(next);
                }
            }
            level_starts.push(end);
            if members.len() == end {
                break;
            }
        }
        level_starts.push(members.len());

        let up = members
            .iter()
            .map(|idx| (0..modes).map(|j| members.get_index_of(&idx.raised(j))).collect())
            .collect();
        let down = members
            .iter()
            .map(|idx| {
                (0..modes)
                    .map(|j| idx.lowered(j).and_then(|prev| members.get_index_of(&prev)))
                    .collect()
            })
            .collect();

        Ok(Self { depth, modes, members, up, down, level_starts })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn modes(&self) -> usize {
        self.modes
    }

    pub fn index(&self, m: usize) -> &HierarchyIndex {
        &self.members[m]
    }

    pub fn position(&self, idx: &HierarchyIndex) -> Option<usize> {
        self.members.get_index_of(idx)
    }

    /// Arena position of n + e_j, None above the truncation depth
    pub fn raise(&self, m: usize, j: usize) -> Option<usize> {
        self.up[m][j]
    }

    /// Arena position of n - e_j, None if n_j = 0
    pub fn lower(&self, m: usize, j: usize) -> Option<usize> {
        self.down[m][j]
    }

    /// Arena positions of the members at a given level
    pub fn level_range(&self, level: usize) -> Range<usize> {
        if level + 1 >= self.level_starts.len() {
            return self.len()..self.len();
        }
        self.level_starts[level]..self.level_starts[level + 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &HierarchyIndex> {
        self.members.iter()
    }
}
