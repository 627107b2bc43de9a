use staff_grid::image::BitImage;
use staff_grid::{sections_from_image, GridEngine, GridParams, Scale};

fn main() {
    // Demo stub: runs the engine over an empty synthetic page
    let w = 1200usize;
    let h = 800usize;
    let stride = w; // tightly packed
    let pixels = vec![0u8; w * h];
    let img = BitImage {
        w,
        h,
        stride,
        data: &pixels,
    };

    let engine = GridEngine::new(GridParams::default());
    let scale = Scale::from_interline(20);
    let sections = sections_from_image(&img);
    match engine.process(&img, &scale, sections) {
        Ok(model) => println!(
            "staves={} systems={} elapsed_ms={:.3}",
            model.staves.len(),
            model.systems.len(),
            model.elapsed_ms
        ),
        Err(err) => println!("no grid: {err}"),
    }
}
