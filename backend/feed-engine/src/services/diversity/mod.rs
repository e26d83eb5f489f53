use std::collections::HashMap;

use crate::models::{ContentKind, ScoredItem};

/// Diversity Layer - 連續出現限制
///
/// Two passes over the score-ordered page: content kind first, then author.
/// Each pass walks the sequence once. At every position it takes the
/// best-scored remaining item that keeps the run under its limit and still
/// leaves the rest orderable under that limit, so a legal ordering is found
/// whenever one exists. When the input has none, the constraint is relaxed
/// step by step and the output is still a permutation of the input.
pub struct DiversityLayer {
    max_consecutive_kind: usize,   // 同一類型最多連續出現次數
    max_consecutive_author: usize, // 同一作者最多連續出現次數
}

impl Default for DiversityLayer {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

impl DiversityLayer {
    pub fn new(max_consecutive_kind: usize, max_consecutive_author: usize) -> Self {
        Self {
            max_consecutive_kind,
            max_consecutive_author,
        }
    }

    /// Kind pass followed by author pass
    pub fn apply(&self, items: Vec<ScoredItem>) -> Vec<ScoredItem> {
        self.rerank_by_author(self.rerank_by_kind(items))
    }

    pub fn rerank_by_kind(&self, items: Vec<ScoredItem>) -> Vec<ScoredItem> {
        let kind = [self.kind_limit()];
        rerank_with(
            items,
            &[
                Tier { admit: &kind, finish: &kind },
                Tier { admit: &kind, finish: &[] },
            ],
        )
    }

    /// Prefers candidates that keep the kind runs intact as well, so running
    /// this after `rerank_by_kind` does not undo its work when avoidable.
    pub fn rerank_by_author(&self, items: Vec<ScoredItem>) -> Vec<ScoredItem> {
        let author = [self.author_limit()];
        let both = [self.author_limit(), self.kind_limit()];
        rerank_with(
            items,
            &[
                Tier { admit: &both, finish: &both },
                Tier { admit: &both, finish: &author },
                Tier { admit: &author, finish: &author },
                Tier { admit: &author, finish: &[] },
            ],
        )
    }

    fn kind_limit(&self) -> RunLimit {
        RunLimit {
            max: self.max_consecutive_kind,
            key: kind_key,
        }
    }

    fn author_limit(&self) -> RunLimit {
        RunLimit {
            max: self.max_consecutive_author,
            key: author_key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RunKey<'a> {
    Kind(ContentKind),
    Author(&'a str),
}

fn kind_key(scored: &ScoredItem) -> Option<RunKey<'_>> {
    Some(RunKey::Kind(scored.item.kind))
}

/// Empty authors never count as the same author.
fn author_key(scored: &ScoredItem) -> Option<RunKey<'_>> {
    let author = scored.item.author_id.as_str();
    (!author.is_empty()).then_some(RunKey::Author(author))
}

/// At most `max` consecutive items may share a key; `max == 0` disables the
/// limit. Items without a key never form runs.
#[derive(Clone, Copy)]
struct RunLimit {
    max: usize,
    key: for<'a> fn(&'a ScoredItem) -> Option<RunKey<'a>>,
}

impl RunLimit {
    /// Length of the run `candidate` would end if appended to `selected`.
    fn run_with(&self, selected: &[ScoredItem], candidate: &ScoredItem) -> usize {
        match (self.key)(candidate) {
            None => 0,
            Some(key) => {
                1 + selected
                    .iter()
                    .rev()
                    .take_while(|scored| (self.key)(scored) == Some(key))
                    .count()
            }
        }
    }

    fn admits(&self, selected: &[ScoredItem], candidate: &ScoredItem) -> bool {
        self.max == 0 || self.run_with(selected, candidate) <= self.max
    }

    /// Whether `rest` can still be ordered once `candidate` is appended.
    ///
    /// A group of `m` items sharing a key fits iff
    /// `m + tail <= max * (others + 1)`, where `tail` is the run the group
    /// would continue and `others` counts the rest outside the group.
    fn can_finish<'a>(
        &self,
        selected: &[ScoredItem],
        candidate: &ScoredItem,
        rest: impl Iterator<Item = &'a ScoredItem>,
    ) -> bool {
        if self.max == 0 {
            return true;
        }
        let tail_key = (self.key)(candidate);
        let tail = self.run_with(selected, candidate).min(self.max);

        let mut total = 0usize;
        let mut groups: HashMap<RunKey<'a>, usize> = HashMap::new();
        for scored in rest {
            total += 1;
            if let Some(key) = (self.key)(scored) {
                *groups.entry(key).or_default() += 1;
            }
        }

        groups.iter().all(|(key, &count)| {
            let carried = if tail_key == Some(*key) { tail } else { 0 };
            count + carried <= self.max * (total - count + 1)
        })
    }
}

/// Candidate filter: every `admit` limit accepts the candidate and every
/// `finish` limit can still order the rest.
struct Tier<'a> {
    admit: &'a [RunLimit],
    finish: &'a [RunLimit],
}

impl Tier<'_> {
    fn accepts(&self, selected: &[ScoredItem], remaining: &[ScoredItem], idx: usize) -> bool {
        let candidate = &remaining[idx];
        self.admit
            .iter()
            .all(|limit| limit.admits(selected, candidate))
            && self.finish.iter().all(|limit| {
                let rest = remaining
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != idx)
                    .map(|(_, scored)| scored);
                limit.can_finish(selected, candidate, rest)
            })
    }
}

/// The earliest remaining item accepted by the first tier that accepts any,
/// else the head.
fn rerank_with(items: Vec<ScoredItem>, tiers: &[Tier<'_>]) -> Vec<ScoredItem> {
    let mut remaining = items;
    let mut selected: Vec<ScoredItem> = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let idx = tiers
            .iter()
            .find_map(|tier| (0..remaining.len()).find(|&idx| tier.accepts(&selected, &remaining, idx)))
            .unwrap_or(0);
        selected.push(remaining.remove(idx));
    }

    selected
}
