use anyhow::{Context, Result};

use crate::data::SketchItem;

pub fn get_env(key: &str) -> Result<String> {
    std::env::var(key).context(format!("getting env variable `{key}`"))
}

/// Wall-clock stamp used in run file names, e.g. `2024-03-01 14-05-09`.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H-%M-%S").to_string()
}

const PALETTE: [(u8, u8, u8); 8] = [
    (230, 25, 75),
    (60, 180, 75),
    (255, 225, 25),
    (0, 130, 200),
    (245, 130, 48),
    (145, 30, 180),
    (70, 240, 240),
    (240, 50, 230),
];

/// Rasterizes the real points of `item` into a `width x height` character grid
/// holding the label of the last point drawn into each cell.
pub fn rasterize(item: &SketchItem, width: usize, height: usize) -> Vec<Vec<Option<usize>>> {
    let mut grid = vec![vec![None; width]; height];
    if width == 0 || height == 0 {
        return grid;
    }
    let to_cell = |v: f32, n: usize| (((v + 1.0) / 2.0 * (n - 1) as f32).round() as usize).min(n - 1);

    for ((p, &m), &label) in item.points.iter().zip(&item.mask).zip(&item.target) {
        if m < 0.5 {
            continue;
        }
        let j = to_cell(p[0].clamp(-1.0, 1.0), width);
        // sketch y grows downwards like terminal rows
        let i = to_cell(p[1].clamp(-1.0, 1.0), height);
        grid[i][j] = Some(label);
    }
    grid
}

pub fn show_sketch_terminal(item: &SketchItem, width: usize, height: usize) {
    for row in rasterize(item, width, height) {
        for cell in row {
            match cell {
                Some(label) => {
                    let (r, g, b) = PALETTE[label % PALETTE.len()];
                    print!("{}●", termion::color::Fg(termion::color::Rgb(r, g, b)));
                }
                None => print!(" "),
            }
        }
        println!("{}", termion::color::Fg(termion::color::Reset));
    }
}
