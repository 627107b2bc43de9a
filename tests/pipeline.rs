mod common;

use common::synthetic_page::PageBuilder;
use pretty_assertions::assert_eq;
use staff_grid::{sections_from_image, GridEngine, GridError, GridParams};

#[test]
fn two_connected_staves_build_one_system() {
    let builder = PageBuilder::new(800, 400)
        .staff(40, 759, 60)
        .staff(40, 759, 240)
        .bar(40, 2, 60, 321)
        .bar(758, 2, 60, 321);
    let page = builder.render();
    let scale = builder.scale();

    let engine = GridEngine::new(GridParams::default());
    let img = page.as_view();
    let model = engine
        .process(&img, &scale, sections_from_image(&img))
        .expect("grid on a clean two-staff page");

    assert_eq!(model.staves.len(), 2);
    let spans: Vec<(u32, u32)> =
        model.systems.iter().map(|s| (s.first_staff, s.last_staff)).collect();
    assert_eq!(spans, vec![(0, 1)], "both staves must share one system");

    for staff in &model.staves {
        assert_eq!(staff.lines.len(), 5, "staff {} line count", staff.id);
        let interline = staff.mean_interline();
        assert!(
            (interline / 20.0 - 1.0).abs() < 0.01,
            "staff {} interline {interline:.3} must be within 1% of 20",
            staff.id
        );
        assert_eq!(staff.left, 40, "staff {} left end pinned to the bar", staff.id);
        assert!(staff.left_bar.is_some() && staff.right_bar.is_some());
        assert!((757..=759).contains(&staff.right), "staff {} right end", staff.id);
    }

    assert!(model.skew.slope.abs() < 0.003, "flat page, got slope {}", model.skew.slope);
    assert_eq!(model.peaks.len(), 4, "two bar peaks per staff");
    let connections = model.connections.iter().filter(|c| c.connection).count();
    assert_eq!(connections, 2, "one pixel-verified connection per bar pair");
}

#[test]
fn four_staves_split_into_two_systems() {
    let builder = PageBuilder::new(800, 720)
        .staff(40, 759, 60)
        .staff(40, 759, 220)
        .staff(40, 759, 420)
        .staff(40, 759, 580)
        .bar(40, 2, 60, 301)
        .bar(758, 2, 60, 301)
        .bar(40, 2, 420, 661)
        .bar(758, 2, 420, 661);
    let page = builder.render();
    let scale = builder.scale();

    let engine = GridEngine::new(GridParams::default());
    let img = page.as_view();
    let model = engine
        .process(&img, &scale, sections_from_image(&img))
        .expect("grid on a four-staff page");

    assert_eq!(model.staves.len(), 4);
    let spans: Vec<(u32, u32)> =
        model.systems.iter().map(|s| (s.first_staff, s.last_staff)).collect();
    assert_eq!(spans, vec![(0, 1), (2, 3)], "two two-staff systems");

    // No surviving edge may tie staves of different systems together.
    for link in &model.connections {
        let same = model
            .systems
            .iter()
            .any(|s| s.contains(link.top_staff) && s.contains(link.bottom_staff));
        assert!(same, "link {} -> {} crosses systems", link.top_staff, link.bottom_staff);
    }
}

#[test]
fn sheet_skew_is_recovered() {
    let builder = PageBuilder::new(900, 420)
        .slope(0.02)
        .staff(40, 839, 60)
        .staff(40, 839, 240);
    let page = builder.render();
    let scale = builder.scale();

    let engine = GridEngine::new(GridParams::default());
    let img = page.as_view();
    let model = engine
        .process(&img, &scale, sections_from_image(&img))
        .expect("grid on a slightly rotated page");

    assert!(
        (model.skew.slope - 0.02).abs() < 0.005,
        "recovered slope {} too far from 0.02",
        model.skew.slope
    );
    assert_eq!(model.staves.len(), 2);
    for staff in &model.staves {
        assert_eq!(staff.lines.len(), 5);
    }
}

#[test]
fn blank_page_reports_no_system() {
    let builder = PageBuilder::new(400, 300);
    let page = builder.render();
    let scale = builder.scale();

    let engine = GridEngine::new(GridParams::default());
    let img = page.as_view();
    let result = engine.process(&img, &scale, sections_from_image(&img));

    assert!(matches!(result, Err(GridError::NoSystemFound)));
}

#[test]
fn three_line_staves_are_abandoned() {
    // Popular comb length 3 is no plausible staff size.
    let builder = PageBuilder::new(800, 400)
        .staff_lines(40, 759, 60, 3)
        .staff_lines(40, 759, 240, 3);
    let page = builder.render();
    let scale = builder.scale();

    let engine = GridEngine::new(GridParams::default());
    let img = page.as_view();
    let result = engine.process(&img, &scale, sections_from_image(&img));

    assert!(matches!(result, Err(GridError::NoSystemFound)));
}
