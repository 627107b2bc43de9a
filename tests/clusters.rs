mod common;

use common::synthetic_page::PageBuilder;
use pretty_assertions::assert_eq;
use staff_grid::filament::FilamentId;
use staff_grid::params::GridParams;
use staff_grid::section::{Run, Section, SectionId};
use staff_grid::sections_from_image;
use staff_grid::skew::Skew;
use staff_grid::stages::{
    build_clusters, build_line_filaments, global_slope, harvest_combs, purge_curved,
    purge_sloped, FilamentArena,
};
use staff_grid::Scale;

fn filament_stage(
    builder: &PageBuilder,
    params: &GridParams,
) -> (FilamentArena, Vec<FilamentId>, f64) {
    let page = builder.render();
    let scale = builder.scale();
    let img = page.as_view();
    let probe_spacing = scale.to_pixels(params.filament.probe_spacing);
    let mut arena = FilamentArena::new(sections_from_image(&img), &scale, probe_spacing);
    let mut filaments = build_line_filaments(&mut arena, &params.filament, &scale);
    purge_curved(&arena, &mut filaments, &params.filament);
    let slope = global_slope(&arena, &filaments, &params.filament);
    purge_sloped(&arena, &mut filaments, slope, &params.filament, &scale);
    (arena, filaments, slope)
}

#[test]
fn ancestor_resolution_is_idempotent_after_merges() {
    let scale = Scale::from_interline(20);
    let sections: Vec<Section> = (0..4)
        .map(|i| Section::new(SectionId(i), 20 * (i as i32 + 1), vec![Run { x: 0, len: 100 }]))
        .collect();
    let mut arena = FilamentArena::new(sections, &scale, 2 * scale.interline);
    let ids: Vec<FilamentId> = (0..4).map(|i| arena.add(vec![SectionId(i)])).collect();
    let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);

    arena.merge(a, b);
    arena.merge(c, d);
    arena.merge(a, c);

    for &id in &[a, b, c, d] {
        assert_eq!(arena.ancestor(id), a, "{id:?} must resolve to the final winner");
        assert_eq!(arena.ancestor(arena.ancestor(id)), arena.ancestor(id));
    }
    assert!(arena.is_root(a));
    assert!(!arena.is_root(d));
}

#[test]
fn dashed_lines_merge_back_into_full_lines() {
    // A 16 px hole through all five lines, below the chaining gap limit.
    let builder = PageBuilder::new(400, 160).staff(20, 379, 30).hole(180, 195, 20, 150);
    let params = GridParams::default();
    let (arena, filaments, _) = filament_stage(&builder, &params);

    assert_eq!(filaments.len(), 5, "dash halves must chain back into whole lines");
    for &fil in &filaments {
        let b = arena.bounds(fil);
        assert_eq!((b.x, b.x + b.w - 1), (20, 379), "{fil:?} must span the full staff");
    }
}

#[test]
fn surviving_clusters_carry_exactly_the_popular_size() {
    // Two real staves plus one stray line that belongs to no staff.
    let builder = PageBuilder::new(800, 560)
        .staff(40, 759, 60)
        .staff(40, 759, 240)
        .staff_lines(40, 200, 500, 1);
    let params = GridParams::default();
    let (mut arena, filaments, slope) = filament_stage(&builder, &params);

    let mut harvest = harvest_combs(&mut arena, &filaments, 800, &params.comb)
        .expect("five-line staves must yield a harvest");
    assert_eq!(harvest.popular_length, 5);

    let outcome = build_clusters(
        &mut arena,
        &mut harvest,
        &filaments,
        &Skew::new(slope),
        &params.cluster,
        &builder.scale(),
    );
    assert_eq!(outcome.clusters.len(), 2);
    for cluster in &outcome.clusters {
        assert_eq!(cluster.lines.len(), 5, "cluster {} line count", cluster.id);
    }
    assert!(!outcome.discarded.is_empty(), "the stray line must end up discarded");
}

#[test]
fn three_line_page_abandons_at_the_comb_stage() {
    let builder = PageBuilder::new(600, 300)
        .staff_lines(40, 559, 60, 3)
        .staff_lines(40, 559, 190, 3);
    let params = GridParams::default();
    let (mut arena, filaments, _) = filament_stage(&builder, &params);

    assert!(harvest_combs(&mut arena, &filaments, 600, &params.comb).is_none());
}
