//! Vertical combs: groups of filaments crossed at a sample column with
//! interline spacing between neighbors.
//!
//! Combs reveal both the popular line count per staff and which filament
//! fragments belong to the same physical line.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::filament::{FilamentArena, FilamentId};
use crate::params::CombParams;

/// Filaments crossed by one sample column, neighbors one interline apart.
#[derive(Debug, Clone)]
pub struct Comb {
    /// Sample column number.
    pub col: i32,
    /// Sample abscissa in pixels.
    pub x: i32,
    /// Member filaments with their ordinate at `x`, top down.
    pub items: Vec<(FilamentId, f64)>,
    /// Set once a cluster has consumed this comb.
    pub processed: bool,
}

impl Comb {
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Position of the filament inside this comb, comparing ancestors so
    /// merged fragments are still found.
    pub fn index_of(&self, arena: &FilamentArena, fil: FilamentId) -> Option<usize> {
        let root = arena.ancestor(fil);
        self.items.iter().position(|&(f, _)| arena.ancestor(f) == root)
    }
}

/// All combs of a page plus the per-filament comb registry.
pub struct CombHarvest {
    pub combs: Vec<Comb>,
    /// Comb indices per filament, keyed by the id the filament had when
    /// the comb was sampled.
    by_filament: HashMap<FilamentId, Vec<u32>>,
    /// Most frequent comb length, the line count of the page staves.
    pub popular_length: usize,
}

impl CombHarvest {
    /// Combs registered for `fil` (by object id, not ancestor).
    pub fn combs_of(&self, fil: FilamentId) -> &[u32] {
        self.by_filament.get(&fil).map_or(&[], |v| v.as_slice())
    }

    pub fn has_combs(&self, fil: FilamentId) -> bool {
        self.by_filament.get(&fil).is_some_and(|v| !v.is_empty())
    }

    pub fn clear_combs(&mut self, fil: FilamentId) {
        self.by_filament.remove(&fil);
    }
}

/// Samples combs over the page and merges filaments that the comb
/// network proves to be fragments of the same line.
///
/// Returns `None` when the popular comb length does not look like a
/// staff, in which case the whole page is abandoned upstream.
pub fn harvest_combs(
    arena: &mut FilamentArena,
    filaments: &[FilamentId],
    width: i32,
    params: &CombParams,
) -> Option<CombHarvest> {
    let interline = arena.interline() as f64;
    let sampling_dx = interline * params.sampling_dx;
    let sample_count = ((width as f64 / sampling_dx).round() as i32) - 1;
    if sample_count < 1 {
        debug!("combs: page too narrow for sampling");
        return None;
    }
    let dx = width as f64 / (sample_count + 1) as f64;
    let min_dy = (interline * (1.0 - params.max_jitter)).floor() as i32;
    let max_dy = (interline * (1.0 + params.max_jitter)).ceil() as i32;

    let mut combs: Vec<Comb> = Vec::new();
    for col in 1..=sample_count {
        let x = (dx * col as f64).round() as i32;
        let mut hits: Vec<(FilamentId, f64)> = filaments
            .iter()
            .copied()
            .filter(|&fil| {
                let b = arena.bounds(fil);
                b.x <= x && x <= b.x + b.w - 1
            })
            .map(|fil| (fil, arena.y_at(fil, x as f64)))
            .collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        // Chain consecutive hits spaced about one interline apart.
        let mut current: Vec<(FilamentId, f64)> = Vec::new();
        for i in 1..hits.len() {
            let dy = (hits[i].1 - hits[i - 1].1).round() as i32;
            if dy >= min_dy && dy <= max_dy {
                if current.is_empty() {
                    current.push(hits[i - 1]);
                }
                current.push(hits[i]);
            } else if !current.is_empty() {
                combs.push(Comb { col, x, items: std::mem::take(&mut current), processed: false });
            }
        }
        if !current.is_empty() {
            combs.push(Comb { col, x, items: current, processed: false });
        }
    }

    // Histogram of comb lengths, weighted by length.
    let mut histo: BTreeMap<usize, usize> = BTreeMap::new();
    for comb in &combs {
        *histo.entry(comb.len()).or_default() += comb.len();
    }
    let popular = histo
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
        .map(|(&len, _)| len)?;
    debug!("combs: {} combs, popular length {popular}", combs.len());
    if popular < params.min_line_count || popular > params.max_line_count {
        debug!("combs: popular length {popular} is no staff, abandoning page");
        return None;
    }

    let mut by_filament: HashMap<FilamentId, Vec<u32>> = HashMap::new();
    for (i, comb) in combs.iter().enumerate() {
        for &(fil, _) in &comb.items {
            by_filament.entry(fil).or_default().push(i as u32);
        }
    }

    let merged = follow_network(arena, &combs, &mut by_filament);
    if merged > 0 {
        debug!("combs: network merged {merged} filament fragments");
    }

    Some(CombHarvest { combs, by_filament, popular_length: popular })
}

/// Walks the comb network of every filament: two neighbors seen at the
/// same relative line position in different combs are one physical line
/// and get merged, the longer fragment absorbing the shorter.
fn follow_network(
    arena: &mut FilamentArena,
    combs: &[Comb],
    by_filament: &mut HashMap<FilamentId, Vec<u32>>,
) -> usize {
    let mut merged = 0usize;
    let mut order: Vec<FilamentId> = by_filament.keys().copied().collect();
    order.sort();

    for fil in order {
        if !by_filament.contains_key(&fil) {
            continue;
        }
        let comb_ids = by_filament[&fil].clone();
        // Relative line position -> filament seen there.
        let mut lines: BTreeMap<i32, FilamentId> = BTreeMap::new();
        for &ci in &comb_ids {
            let comb = &combs[ci as usize];
            let Some(pivot) = comb.index_of(arena, fil) else {
                continue;
            };
            for (pos, &(member, _)) in comb.items.iter().enumerate() {
                let delta = pos as i32 - pivot as i32;
                if delta == 0 {
                    continue;
                }
                let member = arena.ancestor(member);
                match lines.get(&delta) {
                    None => {
                        lines.insert(delta, member);
                    }
                    Some(&seen) => {
                        let seen = arena.ancestor(seen);
                        if seen != member {
                            let winner = connect_ancestors(arena, by_filament, seen, member);
                            lines.insert(delta, winner);
                            merged += 1;
                        }
                    }
                }
            }
        }
    }
    merged
}

fn connect_ancestors(
    arena: &mut FilamentArena,
    by_filament: &mut HashMap<FilamentId, Vec<u32>>,
    one: FilamentId,
    two: FilamentId,
) -> FilamentId {
    let (winner, loser) = if (arena.length(one), two.0) > (arena.length(two), one.0) {
        (one, two)
    } else {
        (two, one)
    };
    arena.merge(winner, loser);
    let moved = by_filament.remove(&loser).unwrap_or_default();
    by_filament.entry(winner).or_default().extend(moved);
    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::Scale;
    use crate::section::{Run, Section, SectionId};

    fn line_section(id: u32, y: i32, x: i32, len: i32) -> Section {
        Section::new(SectionId(id), y, vec![Run { x, len }])
    }

    fn arena_of(sections: Vec<Section>) -> FilamentArena {
        let scale = Scale::from_interline(20);
        FilamentArena::new(sections, &scale, 2 * scale.interline)
    }

    fn wrap_all(arena: &mut FilamentArena, n: u32) -> Vec<FilamentId> {
        (0..n).map(|i| arena.add(vec![SectionId(i)])).collect()
    }

    #[test]
    fn five_lines_give_popular_length_five() {
        let sections = (0..5).map(|i| line_section(i, 20 + 20 * i as i32, 0, 300)).collect();
        let mut arena = arena_of(sections);
        let filaments = wrap_all(&mut arena, 5);
        let harvest =
            harvest_combs(&mut arena, &filaments, 300, &CombParams::default()).unwrap();
        assert_eq!(harvest.popular_length, 5);
        // Every sample column crosses all five lines.
        assert!(harvest.combs.iter().all(|c| c.len() == 5));
        for &fil in &filaments {
            assert!(harvest.has_combs(fil), "{fil:?} should sit in combs");
        }
    }

    #[test]
    fn three_lines_are_no_staff() {
        let sections = (0..3).map(|i| line_section(i, 20 + 20 * i as i32, 0, 300)).collect();
        let mut arena = arena_of(sections);
        let filaments = wrap_all(&mut arena, 3);
        assert!(harvest_combs(&mut arena, &filaments, 300, &CombParams::default()).is_none());
    }

    #[test]
    fn network_merges_split_line_fragments() {
        // Five lines, the middle one broken into two fragments.
        let mut sections: Vec<Section> = Vec::new();
        for i in 0..2 {
            sections.push(line_section(i, 20 + 20 * i as i32, 0, 301));
        }
        sections.push(line_section(2, 60, 0, 151));
        sections.push(line_section(3, 60, 170, 131));
        for i in 3..5 {
            sections.push(line_section(i as u32 + 1, 20 + 20 * i, 0, 301));
        }
        let mut arena = arena_of(sections);
        let filaments = wrap_all(&mut arena, 6);
        let left = filaments[2];
        let right = filaments[3];
        assert_ne!(arena.ancestor(left), arena.ancestor(right));

        let harvest =
            harvest_combs(&mut arena, &filaments, 301, &CombParams::default()).unwrap();
        assert_eq!(harvest.popular_length, 5);
        assert_eq!(
            arena.ancestor(left),
            arena.ancestor(right),
            "fragments seen at the same comb position must merge"
        );
        // The longer fragment wins.
        assert_eq!(arena.ancestor(right), left);
    }

    #[test]
    fn comb_index_resolves_merged_members() {
        let sections = vec![
            line_section(0, 20, 0, 100),
            line_section(1, 40, 0, 100),
        ];
        let mut arena = arena_of(sections);
        let a = arena.add(vec![SectionId(0)]);
        let b = arena.add(vec![SectionId(1)]);
        let comb = Comb { col: 1, x: 50, items: vec![(a, 20.0), (b, 40.0)], processed: false };
        assert_eq!(comb.index_of(&arena, b), Some(1));
        arena.merge(a, b);
        assert_eq!(comb.index_of(&arena, b), Some(0), "ancestor comparison finds the winner");
    }
}
