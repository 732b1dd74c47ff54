/// Words the model inserted (`added`) or dropped (`removed`) relative to the
/// source chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ChangeSet {
    pub fn exceeds(&self, added_tol: usize, removed_tol: usize) -> bool {
        self.added.len() > added_tol || self.removed.len() > removed_tol
    }

    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Two-line summary used by the change log.
    pub fn to_log_string(&self) -> String {
        format!(
            "{:3}   added: {}\n{:3} removed: {}",
            self.added.len(),
            self.added.join(" "),
            self.removed.len(),
            self.removed.join(" ")
        )
    }
}

/// Largest alignment table `diff` will build before callers should split input.
pub const MAX_ALIGNMENT_CELLS: usize = 64 * 1024 * 1024;

/// Word-level longest-common-subsequence alignment of `original` against
/// `reconstructed`.
pub fn diff(original: &str, reconstructed: &str) -> ChangeSet {
    let a = original.split_whitespace().collect::<Vec<_>>();
    let b = reconstructed.split_whitespace().collect::<Vec<_>>();

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a = &a[prefix..a.len() - suffix];
    let b = &b[prefix..b.len() - suffix];

    let mut changes = ChangeSet::default();
    if a.is_empty() || b.is_empty() {
        changes.removed.extend(a.iter().map(|w| w.to_string()));
        changes.added.extend(b.iter().map(|w| w.to_string()));
        return changes;
    }

    // lcs[i * width + j] = LCS length of a[i..] and b[j..]
    let width = b.len() + 1;
    let mut lcs = vec![0u32; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0usize, 0usize);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            changes.removed.push(a[i].to_string());
            i += 1;
        } else {
            changes.added.push(b[j].to_string());
            j += 1;
        }
    }
    changes.removed.extend(a[i..].iter().map(|w| w.to_string()));
    changes.added.extend(b[j..].iter().map(|w| w.to_string()));
    changes
}
