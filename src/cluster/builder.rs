//! Builds line clusters from combs, then expands, merges and trims them
//! until only staff-shaped clusters remain.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, VecDeque};

use log::debug;
use nalgebra::Point2;

use crate::cluster::LineCluster;
use crate::comb::CombHarvest;
use crate::filament::{FilamentArena, FilamentId};
use crate::geom::Rect;
use crate::params::ClusterParams;
use crate::scale::Scale;
use crate::skew::Skew;

/// Result of the clustering stage.
pub struct ClusterOutcome {
    /// Staff-shaped clusters, top down.
    pub clusters: Vec<LineCluster>,
    /// Filaments that ended up in no cluster line.
    pub discarded: Vec<FilamentId>,
}

/// Runs the whole clustering sequence over the comb harvest.
pub fn build_clusters(
    arena: &mut FilamentArena,
    harvest: &mut CombHarvest,
    filaments: &[FilamentId],
    skew: &Skew,
    params: &ClusterParams,
    scale: &Scale,
) -> ClusterOutcome {
    let mut builder = Builder::new(arena, harvest, *skew, params, scale);
    builder.create(filaments);
    builder.expand(filaments);
    builder.merge();
    builder.trim();
    builder.destroy_non_popular();
    builder.merge_pairs();
    builder.expand(filaments);
    builder.finish()
}

/// Pixel-resolved clustering thresholds.
struct Px {
    max_expand_dx: i32,
    max_expand_dy: f64,
    max_merge_dx: i32,
    max_merge_dy: f64,
    max_merge_center_dy: f64,
    cluster_y_margin: i32,
    min_length_ratio: f64,
    max_fore: f64,
    interline: i32,
    popular: usize,
}

#[derive(Default)]
struct Cluster {
    lines: BTreeMap<i32, FilamentId>,
}

struct Builder<'a> {
    arena: &'a mut FilamentArena,
    harvest: &'a mut CombHarvest,
    skew: Skew,
    px: Px,
    /// Slot map; a merged or destroyed cluster leaves a `None` behind.
    clusters: Vec<Option<Cluster>>,
    /// Line assignment per filament root: (cluster slot, line position).
    assignments: HashMap<FilamentId, (usize, i32)>,
}

impl<'a> Builder<'a> {
    fn new(
        arena: &'a mut FilamentArena,
        harvest: &'a mut CombHarvest,
        skew: Skew,
        params: &ClusterParams,
        scale: &Scale,
    ) -> Self {
        let px = Px {
            max_expand_dx: scale.to_pixels(params.max_expand_dx),
            max_expand_dy: scale.to_pixels_f(params.max_expand_dy),
            max_merge_dx: scale.to_pixels(params.max_merge_dx),
            max_merge_dy: scale.to_pixels_f(params.max_merge_dy),
            max_merge_center_dy: scale.to_pixels_f(params.max_merge_center_dy),
            cluster_y_margin: scale.to_pixels(params.cluster_y_margin),
            min_length_ratio: params.min_cluster_length_ratio,
            max_fore: scale.max_fore as f64,
            interline: scale.interline,
            popular: harvest.popular_length,
        };
        Self { arena, harvest, skew, px, clusters: Vec::new(), assignments: HashMap::new() }
    }

    // ----- creation -------------------------------------------------------

    /// Seeds one cluster per unassigned comb-bearing filament and lets it
    /// spread through the comb network.
    fn create(&mut self, filaments: &[FilamentId]) {
        let mut seeds: Vec<FilamentId> =
            filaments.iter().map(|&f| self.arena.ancestor(f)).collect();
        seeds.sort();
        seeds.dedup();
        seeds.sort_by_key(|&id| (Reverse(self.arena.length(id)), id.0));

        for seed in seeds {
            let seed = self.arena.ancestor(seed);
            if self.assignments.contains_key(&seed) || !self.harvest.has_combs(seed) {
                continue;
            }
            let cidx = self.clusters.len();
            self.clusters.push(Some(Cluster::default()));
            self.drain(cidx, seed);
        }
        for slot in &mut self.clusters {
            if slot.as_ref().is_some_and(|c| c.lines.is_empty()) {
                *slot = None;
            }
        }
        debug!("clusters: {} created", self.live().len());
    }

    /// Work-list propagation from one seed: every unprocessed comb of a
    /// queued filament contributes its members at their relative position.
    fn drain(&mut self, cidx: usize, seed: FilamentId) {
        let mut current = cidx;
        let mut queue: VecDeque<(FilamentId, i32)> = VecDeque::new();
        queue.push_back((seed, 0));

        while let Some((fil, mut pos)) = queue.pop_front() {
            let comb_ids = self.harvest.combs_of(fil).to_vec();
            for ci in comb_ids {
                {
                    let comb = &mut self.harvest.combs[ci as usize];
                    if comb.processed {
                        continue;
                    }
                    comb.processed = true;
                }
                let items = self.harvest.combs[ci as usize].items.clone();
                let root = self.arena.ancestor(fil);
                let Some(my_idx) =
                    items.iter().position(|&(f, _)| self.arena.ancestor(f) == root)
                else {
                    continue;
                };
                let mut delta = pos - my_idx as i32;
                for (i, &(member, _)) in items.iter().enumerate() {
                    let pos_m = i as i32 + delta;
                    let m_root = self.arena.ancestor(member);
                    match self.assignments.get(&m_root).copied() {
                        None => {
                            self.add_line(current, pos_m, m_root);
                            queue.push_back((member, pos_m));
                        }
                        Some((c, _)) if c == current => {}
                        Some((other, other_pos)) => {
                            let (winner, shift) =
                                self.absorb_pair(current, other, pos_m, other_pos);
                            if winner != current {
                                // Our frame moved; shift everything pending.
                                delta += shift;
                                pos += shift;
                                for item in queue.iter_mut() {
                                    item.1 += shift;
                                }
                                current = winner;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Inserts a filament as cluster line `pos`; a collision makes the
    /// resident line absorb the incoming filament.
    fn add_line(&mut self, cidx: usize, pos: i32, fil: FilamentId) {
        let root = self.arena.ancestor(fil);
        let existing = self.clusters[cidx].as_ref().unwrap().lines.get(&pos).copied();
        match existing {
            None => {
                self.clusters[cidx].as_mut().unwrap().lines.insert(pos, root);
                self.assignments.insert(root, (cidx, pos));
            }
            Some(line) => {
                let line_root = self.arena.ancestor(line);
                if line_root != root {
                    self.arena.merge(line_root, root);
                    self.assignments.remove(&root);
                }
                self.assignments.insert(line_root, (cidx, pos));
            }
        }
    }

    /// Two clusters claim the same filament: the bigger one absorbs the
    /// smaller, positions re-keyed through the shared filament. Returns the
    /// winner slot and the key shift applied to cluster `a` positions.
    fn absorb_pair(&mut self, a: usize, b: usize, pos_a: i32, pos_b: i32) -> (usize, i32) {
        let size_a = self.clusters[a].as_ref().unwrap().lines.len();
        let size_b = self.clusters[b].as_ref().unwrap().lines.len();
        let a_wins = size_a > size_b || (size_a == size_b && a < b);
        if a_wins {
            self.move_lines(b, a, pos_a - pos_b);
            (a, 0)
        } else {
            let shift = pos_b - pos_a;
            self.move_lines(a, b, shift);
            (b, shift)
        }
    }

    fn move_lines(&mut self, from: usize, to: usize, offset: i32) {
        let lines = self.clusters[from].take().unwrap().lines;
        for (k, fil) in lines {
            self.add_line(to, k + offset, fil);
        }
    }

    // ----- geometry helpers ----------------------------------------------

    fn live(&self) -> Vec<usize> {
        (0..self.clusters.len()).filter(|&i| self.clusters[i].is_some()).collect()
    }

    fn cluster_bounds(&self, cidx: usize) -> Rect {
        let cluster = self.clusters[cidx].as_ref().unwrap();
        let mut it = cluster.lines.values();
        let mut bounds = self.arena.bounds(*it.next().unwrap());
        for &fil in it {
            bounds = bounds.union(&self.arena.bounds(fil));
        }
        bounds
    }

    fn cluster_true_length(&self, cidx: usize) -> f64 {
        let cluster = self.clusters[cidx].as_ref().unwrap();
        let sum: i32 = cluster.lines.values().map(|&f| self.arena.true_length(f)).sum();
        sum as f64 / cluster.lines.len() as f64
    }

    fn cluster_ordinate(&self, cidx: usize) -> f64 {
        self.skew.deskewed(self.cluster_bounds(cidx).center()).y
    }

    fn deskewed_y(&self, x: f64, y: f64) -> f64 {
        self.skew.deskewed(Point2::new(x, y)).y
    }

    /// Expected line ordinates of a cluster at abscissa `x`.
    ///
    /// A line covering `x` answers with its curve; a line ending within
    /// `x_margin` is extended along the page slope; remaining holes are
    /// interpolated from their neighbors, or offset by one interline when
    /// only an adjacent line is known.
    fn points_at(&self, cidx: usize, x: f64, x_margin: i32) -> Vec<(i32, Option<f64>)> {
        let cluster = self.clusters[cidx].as_ref().unwrap();
        let slope = self.skew.slope;
        let mut pts: Vec<(i32, Option<f64>)> = Vec::with_capacity(cluster.lines.len());
        for (&key, &fil) in &cluster.lines {
            let geom = self.arena.geometry(fil);
            let b = geom.bounds;
            let right = (b.x + b.w - 1) as f64;
            let left = b.x as f64;
            let y = if x >= left && x <= right {
                Some(self.arena.y_at(fil, x))
            } else if x < left && left - x <= x_margin as f64 {
                Some(geom.start_point.y + (x - geom.start_point.x) * slope)
            } else if x > right && x - right <= x_margin as f64 {
                Some(geom.stop_point.y + (x - geom.stop_point.x) * slope)
            } else {
                None
            };
            pts.push((key, y));
        }

        for i in 0..pts.len() {
            if pts[i].1.is_some() {
                continue;
            }
            let key = pts[i].0;
            let prev = pts[..i].iter().rev().find_map(|&(k, y)| y.map(|y| (k, y)));
            let next = pts[i + 1..].iter().find_map(|&(k, y)| y.map(|y| (k, y)));
            pts[i].1 = match (prev, next) {
                (Some((kp, yp)), Some((kn, yn))) => {
                    Some(yp + (key - kp) as f64 * (yn - yp) / (kn - kp) as f64)
                }
                (Some((kp, yp)), None) if key - kp == 1 => Some(yp + self.px.interline as f64),
                (None, Some((kn, yn))) if kn - key == 1 => Some(yn - self.px.interline as f64),
                _ => None,
            };
        }
        pts
    }

    // ----- expansion ------------------------------------------------------

    /// Offers every unassigned filament to the clusters, in two sweeps
    /// sorted on the ending and then the starting abscissa.
    fn expand(&mut self, filaments: &[FilamentId]) {
        let mut absorbed = 0usize;
        for pass in 0..2 {
            let mut cands: Vec<FilamentId> =
                filaments.iter().map(|&f| self.arena.ancestor(f)).collect();
            cands.sort();
            cands.dedup();
            cands.retain(|id| !self.assignments.contains_key(id));
            if pass == 0 {
                cands.sort_by_key(|&id| {
                    let b = self.arena.bounds(id);
                    (b.x + b.w - 1, id.0)
                });
            } else {
                cands.sort_by_key(|&id| (self.arena.bounds(id).x, id.0));
            }
            for fil in cands {
                if self.assignments.contains_key(&self.arena.ancestor(fil)) {
                    continue;
                }
                if self.try_expand_one(fil) {
                    absorbed += 1;
                }
            }
        }
        if absorbed > 0 {
            debug!("clusters: expansion absorbed {absorbed} filaments");
        }
    }

    fn try_expand_one(&mut self, fil: FilamentId) -> bool {
        let b = self.arena.bounds(fil);
        let x_mid = b.x as f64 + b.w as f64 / 2.0;
        let y_mid = self.arena.y_at(fil, x_mid);

        let mut order = self.live();
        order.sort_by(|&a, &c| {
            self.cluster_true_length(c)
                .partial_cmp(&self.cluster_true_length(a))
                .unwrap()
                .then(a.cmp(&c))
        });
        for cidx in order {
            let cbox =
                self.cluster_bounds(cidx).grow(self.px.max_merge_dx, self.px.cluster_y_margin);
            if !cbox.contains(x_mid, y_mid) {
                continue;
            }
            for (key, y) in self.points_at(cidx, x_mid, self.px.max_expand_dx) {
                let Some(y) = y else { continue };
                if (y_mid - y).abs() > self.px.max_expand_dy {
                    continue;
                }
                let line = *self.clusters[cidx].as_ref().unwrap().lines.get(&key).unwrap();
                let line_root = self.arena.ancestor(line);
                let fil_root = self.arena.ancestor(fil);
                if line_root == fil_root {
                    return false;
                }
                // No room on a line the filament would overlap.
                if self.arena.bounds(line_root).x_overlap(&b) > 0 {
                    continue;
                }
                self.arena.merge(line_root, fil_root);
                self.assignments.insert(line_root, (cidx, key));
                return true;
            }
        }
        false
    }

    // ----- cluster-to-cluster merging ------------------------------------

    /// Merges overlapping or abutting clusters, scanning top down; each
    /// cluster absorbs compatible clusters seen above it.
    fn merge(&mut self) {
        let mut order = self.live();
        order.sort_by(|&a, &b| {
            self.cluster_ordinate(a)
                .partial_cmp(&self.cluster_ordinate(b))
                .unwrap()
                .then(a.cmp(&b))
        });
        for ci in 0..order.len() {
            let current = order[ci];
            if self.clusters[current].is_none() {
                continue;
            }
            'again: loop {
                let cbox = self
                    .cluster_bounds(current)
                    .grow(self.px.max_merge_dx, self.px.cluster_y_margin);
                for &head in &order[..ci] {
                    if head == current || self.clusters[head].is_none() {
                        continue;
                    }
                    if self.cluster_bounds(head).intersects(&cbox) {
                        if let Some(delta) = self.can_merge_clusters(head, current) {
                            self.merge_with(current, head, delta);
                            continue 'again;
                        }
                    }
                }
                break;
            }
        }
        debug!("clusters: {} after merging", self.live().len());
    }

    /// `this` absorbs `that`, translating keys through `list_delta` and the
    /// first-key offset. Key collisions merge the underlying filaments.
    fn merge_with(&mut self, this: usize, that: usize, list_delta: i32) {
        let that_lines = self.clusters[that].take().unwrap().lines;
        let this_first = *self.clusters[this].as_ref().unwrap().lines.keys().next().unwrap();
        let that_first = *that_lines.keys().next().unwrap();
        for (k, fil) in that_lines {
            self.add_line(this, k + list_delta + this_first - that_first, fil);
        }
    }

    /// Index delta aligning `one` under `two` if the clusters fit together.
    fn can_merge_clusters(&self, one: usize, two: usize) -> Option<i32> {
        let b1 = self.cluster_bounds(one);
        let b2 = self.cluster_bounds(two);
        let max_left = b1.x.max(b2.x);
        let min_right = (b1.x + b1.w - 1).min(b2.x + b2.w - 1);
        let gap = max_left - min_right;
        if gap > self.px.max_merge_dx {
            return None;
        }

        if gap <= 0 {
            // Abscissa overlap: compare expected ordinates in the middle.
            let x_mid = ((max_left + min_right) / 2) as f64;
            let p1 = self.deskewed_points(one, x_mid);
            let p2 = self.deskewed_points(two, x_mid);
            let (delta, _) = best_match(&p1, &p2, self.px.max_merge_dy)?;
            if self.collides(one, two, delta) {
                return None;
            }
            Some(delta)
        } else {
            // True gap: facing line ends must match.
            let (p1, p2) = if b1.x + b1.w - 1 < b2.x {
                (self.line_ends(one, false), self.line_ends(two, true))
            } else {
                (self.line_ends(one, true), self.line_ends(two, false))
            };
            best_match(&p1, &p2, self.px.max_merge_dy).map(|(d, _)| d)
        }
    }

    fn deskewed_points(&self, cidx: usize, x: f64) -> Vec<Option<f64>> {
        self.points_at(cidx, x, self.px.max_expand_dx)
            .into_iter()
            .map(|(_, y)| y.map(|y| self.deskewed_y(x, y)))
            .collect()
    }

    /// Deskewed ordinates of the line start (or stop) points.
    fn line_ends(&self, cidx: usize, start: bool) -> Vec<Option<f64>> {
        self.clusters[cidx]
            .as_ref()
            .unwrap()
            .lines
            .values()
            .map(|&fil| {
                let p = if start {
                    self.arena.start_point(fil)
                } else {
                    self.arena.stop_point(fil)
                };
                Some(self.deskewed_y(p.x, p.y))
            })
            .collect()
    }

    /// True when aligned lines of the two clusters overlap with too much
    /// combined ink, which means they are separate staves, not fragments.
    fn collides(&self, one: usize, two: usize, delta: i32) -> bool {
        let l1: Vec<FilamentId> =
            self.clusters[one].as_ref().unwrap().lines.values().copied().collect();
        let l2: Vec<FilamentId> =
            self.clusters[two].as_ref().unwrap().lines.values().copied().collect();
        for (i, &f1) in l1.iter().enumerate() {
            let j = i as i32 + delta;
            if j < 0 || j >= l2.len() as i32 {
                continue;
            }
            let f2 = l2[j as usize];
            let b1 = self.arena.bounds(f1);
            let b2 = self.arena.bounds(f2);
            if b1.x_overlap(&b2) >= 0 {
                let xm = (b1.x.max(b2.x) + (b1.x + b1.w - 1).min(b2.x + b2.w - 1)) / 2;
                let combined = self.arena.thickness_at(f1, xm) + self.arena.thickness_at(f2, xm);
                if combined > self.px.max_fore {
                    return true;
                }
            }
        }
        false
    }

    // ----- trimming and final merges -------------------------------------

    /// Cuts every oversized cluster down to the popular line count,
    /// dropping the weaker of its outer lines each time.
    fn trim(&mut self) {
        for cidx in self.live() {
            while self.clusters[cidx].as_ref().unwrap().lines.len() > self.px.popular {
                let lines = &self.clusters[cidx].as_ref().unwrap().lines;
                let (&top_key, &top_fil) = lines.first_key_value().unwrap();
                let (&bot_key, &bot_fil) = lines.last_key_value().unwrap();
                let (key, fil) =
                    if self.arena.true_length(top_fil) < self.arena.true_length(bot_fil) {
                        (top_key, top_fil)
                    } else {
                        (bot_key, bot_fil)
                    };
                self.clusters[cidx].as_mut().unwrap().lines.remove(&key);
                self.unassign(fil);
            }
            self.renumber(cidx);
        }
    }

    fn unassign(&mut self, fil: FilamentId) {
        let root = self.arena.ancestor(fil);
        self.assignments.remove(&root);
        self.harvest.clear_combs(fil);
        self.harvest.clear_combs(root);
    }

    fn renumber(&mut self, cidx: usize) {
        let old = std::mem::take(&mut self.clusters[cidx].as_mut().unwrap().lines);
        for (new_key, (_, fil)) in old.into_iter().enumerate() {
            let new_key = new_key as i32;
            self.clusters[cidx].as_mut().unwrap().lines.insert(new_key, fil);
            let root = self.arena.ancestor(fil);
            self.assignments.insert(root, (cidx, new_key));
        }
    }

    fn destroy(&mut self, cidx: usize) {
        let lines = self.clusters[cidx].take().unwrap().lines;
        for (_, fil) in lines {
            self.unassign(fil);
        }
    }

    fn destroy_non_popular(&mut self) {
        let mut destroyed = 0usize;
        for cidx in self.live() {
            if self.clusters[cidx].as_ref().unwrap().lines.len() != self.px.popular {
                self.destroy(cidx);
                destroyed += 1;
            }
        }
        if destroyed > 0 {
            debug!("clusters: {destroyed} non-standard destroyed");
        }
    }

    /// Absorbs vertically coincident duplicate clusters, then destroys
    /// clusters far shorter than the page median.
    fn merge_pairs(&mut self) {
        let mut list = self.live();
        list.sort_by(|&a, &b| {
            self.cluster_ordinate(a)
                .partial_cmp(&self.cluster_ordinate(b))
                .unwrap()
                .then(a.cmp(&b))
        });
        if list.is_empty() {
            return;
        }
        let mut lens: Vec<f64> = list.iter().map(|&c| self.cluster_true_length(c)).collect();
        lens.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let min_length = lens[lens.len() / 2] * self.px.min_length_ratio;

        let mut idx = 0;
        while idx < list.len() {
            let cl = list[idx];
            loop {
                let y_max = self.cluster_ordinate(cl) + self.px.max_merge_center_dy;
                let mut merged = false;
                let mut j = idx + 1;
                while j < list.len() {
                    let cl2 = list[j];
                    if self.cluster_ordinate(cl2) > y_max {
                        break;
                    }
                    if self.cluster_bounds(cl).x_gap(&self.cluster_bounds(cl2))
                        > self.px.max_merge_dx
                    {
                        j += 1;
                        continue;
                    }
                    self.merge_with(cl, cl2, 0);
                    list.remove(j);
                    merged = true;
                    break;
                }
                if !merged {
                    break;
                }
            }
            if self.cluster_true_length(cl) < min_length {
                self.destroy(cl);
                list.remove(idx);
            } else {
                idx += 1;
            }
        }
    }

    // ----- output ---------------------------------------------------------

    fn finish(self) -> ClusterOutcome {
        let mut list = self.live();
        list.sort_by(|&a, &b| {
            self.cluster_ordinate(a)
                .partial_cmp(&self.cluster_ordinate(b))
                .unwrap()
                .then(a.cmp(&b))
        });
        let clusters: Vec<LineCluster> = list
            .iter()
            .enumerate()
            .map(|(i, &cidx)| {
                let lines = self.clusters[cidx]
                    .as_ref()
                    .unwrap()
                    .lines
                    .iter()
                    .map(|(&k, &f)| (k, self.arena.ancestor(f)))
                    .collect();
                LineCluster { id: i as u32, interline: self.px.interline, lines }
            })
            .collect();

        let mut discarded: Vec<FilamentId> = self
            .arena
            .roots()
            .into_iter()
            .filter(|r| !self.assignments.contains_key(r))
            .collect();
        discarded.sort();
        debug!("clusters: {} final, {} filaments discarded", clusters.len(), discarded.len());
        ClusterOutcome { clusters, discarded }
    }
}

/// Best index delta aligning `two` under `one`, minimizing the mean
/// ordinate distance over defined pairs. `None` when no delta stays
/// within `max_dy`.
fn best_match(one: &[Option<f64>], two: &[Option<f64>], max_dy: f64) -> Option<(i32, f64)> {
    let max_len = one.len().max(two.len()) as i32;
    let mut best: Option<(i32, f64)> = None;
    for delta in -(max_len - 1)..=(max_len - 1) {
        let mut n = 0u32;
        let mut sum = 0.0;
        for (i, a) in one.iter().enumerate() {
            let j = i as i32 + delta;
            if j < 0 || j >= two.len() as i32 {
                continue;
            }
            if let (Some(a), Some(b)) = (a, two[j as usize]) {
                n += 1;
                sum += (a - b).abs();
            }
        }
        if n > 0 {
            let mean = sum / n as f64;
            if best.map_or(true, |(_, m)| mean < m) {
                best = Some((delta, mean));
            }
        }
    }
    best.filter(|&(_, mean)| mean <= max_dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comb::harvest_combs;
    use crate::params::{ClusterParams, CombParams};
    use crate::section::{Run, Section, SectionId};

    fn line_section(id: u32, y: i32, x: i32, len: i32) -> Section {
        Section::new(SectionId(id), y, vec![Run { x, len }])
    }

    struct Setup {
        arena: FilamentArena,
        harvest: CombHarvest,
        filaments: Vec<FilamentId>,
        scale: Scale,
    }

    fn setup(sections: Vec<Section>, width: i32) -> Setup {
        let scale = Scale::from_interline(20);
        let n = sections.len() as u32;
        let mut arena = FilamentArena::new(sections, &scale, 2 * scale.interline);
        let filaments: Vec<FilamentId> =
            (0..n).map(|i| arena.add(vec![SectionId(i)])).collect();
        let harvest = harvest_combs(&mut arena, &filaments, width, &CombParams::default())
            .expect("staff-like page");
        Setup { arena, harvest, filaments, scale }
    }

    fn run(setup: &mut Setup) -> ClusterOutcome {
        build_clusters(
            &mut setup.arena,
            &mut setup.harvest,
            &setup.filaments,
            &Skew::new(0.0),
            &ClusterParams::default(),
            &setup.scale,
        )
    }

    #[test]
    fn five_lines_build_one_cluster() {
        let sections = (0..5).map(|i| line_section(i, 20 + 20 * i as i32, 0, 301)).collect();
        let mut s = setup(sections, 301);
        let outcome = run(&mut s);
        assert_eq!(outcome.clusters.len(), 1);
        let cluster = &outcome.clusters[0];
        assert_eq!(cluster.size(), 5);
        assert_eq!(cluster.lines.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert!(outcome.discarded.is_empty());
    }

    #[test]
    fn short_sixth_line_is_trimmed_away() {
        let mut sections = vec![line_section(0, 20, 0, 91)];
        for i in 1..6 {
            sections.push(line_section(i, 20 + 20 * i as i32, 0, 301));
        }
        let mut s = setup(sections, 301);
        assert_eq!(s.harvest.popular_length, 5);
        let short = s.filaments[0];
        let outcome = run(&mut s);
        assert_eq!(outcome.clusters.len(), 1);
        assert_eq!(outcome.clusters[0].size(), 5);
        assert_eq!(
            outcome.clusters[0].lines.keys().copied().collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert!(
            outcome.discarded.contains(&s.arena.ancestor(short)),
            "the trimmed line must be discarded"
        );
    }

    #[test]
    fn two_staves_build_two_clusters_top_down() {
        let mut sections = Vec::new();
        for i in 0..5 {
            sections.push(line_section(i, 300 + 20 * i as i32, 0, 301));
        }
        for i in 5..10 {
            sections.push(line_section(i, 20 + 20 * (i as i32 - 5), 0, 301));
        }
        let mut s = setup(sections, 301);
        let outcome = run(&mut s);
        assert_eq!(outcome.clusters.len(), 2);
        let first = outcome.clusters[0].bounds(&s.arena);
        let second = outcome.clusters[1].bounds(&s.arena);
        assert!(first.y < second.y, "clusters must come out top down");
        assert!(outcome.discarded.is_empty());
    }

    #[test]
    fn staff_halves_merge_into_full_lines() {
        let mut sections = Vec::new();
        for i in 0..5 {
            sections.push(line_section(i, 20 + 20 * i as i32, 0, 141));
        }
        for i in 5..10 {
            sections.push(line_section(i, 20 + 20 * (i as i32 - 5), 160, 141));
        }
        let mut s = setup(sections, 301);
        let outcome = run(&mut s);
        assert_eq!(outcome.clusters.len(), 1, "halves must merge into one staff");
        let cluster = &outcome.clusters[0];
        assert_eq!(cluster.size(), 5);
        for &fil in cluster.lines.values() {
            let b = s.arena.bounds(fil);
            assert_eq!((b.x, b.w), (0, 301), "every line must span both halves");
        }
        assert!(outcome.discarded.is_empty());
    }

    #[test]
    fn points_at_interpolates_holes() {
        // Middle line only present on the right side.
        let mut sections = Vec::new();
        for i in 0..5 {
            let (x, len) = if i == 2 { (150, 151) } else { (0, 301) };
            sections.push(line_section(i, 20 + 20 * i as i32, x, len));
        }
        let mut s = setup(sections, 301);
        let params = ClusterParams::default();
        let mut builder =
            Builder::new(&mut s.arena, &mut s.harvest, Skew::new(0.0), &params, &s.scale);
        builder.create(&s.filaments);
        assert_eq!(builder.live().len(), 1);
        let cidx = builder.live()[0];

        let pts = builder.points_at(cidx, 80.0, builder.px.max_expand_dx);
        assert_eq!(pts.len(), 5);
        let hole = pts[2].1.expect("hole must be interpolated");
        assert!((hole - 60.0).abs() < 1e-6, "interpolated ordinate, got {hole}");
        // Covered lines answer with their curve.
        assert!((pts[0].1.unwrap() - 20.0).abs() < 1e-6);
        assert!((pts[4].1.unwrap() - 100.0).abs() < 1e-6);
    }
}
