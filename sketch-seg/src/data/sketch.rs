use std::{
    fmt,
    path::{Path, PathBuf},
};

use burn::data::dataset::Dataset;
use itertools::Itertools;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use walkdir::WalkDir;

use super::{N_PNT, N_STK, N_STK_PNT, POINT_CHANNELS};

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("reading `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing `{path}`")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("dataset directory `{0}` does not exist")]
    MissingRoot(PathBuf),
    #[error("no sketch files under `{0}`")]
    Empty(PathBuf),
}

#[derive(Debug, thiserror::Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SketchPoint {
    pub x: f32,
    pub y: f32,
    pub label: usize,
}

/// A labeled sketch as stored on disk.
///
/// One point per line, `x y s label`, separated by whitespace or commas.
/// `s = 1` marks the last point of a stroke. Blank lines and lines starting
/// with `#` are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct SketchFile {
    pub strokes: Vec<Vec<SketchPoint>>,
}

impl SketchFile {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut strokes = Vec::new();
        let mut stroke = Vec::new();

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect_vec();
            let [x, y, s, label] = fields[..] else {
                return Err(ParseError::new(
                    line_no,
                    format!("expected 4 fields, found {}", fields.len()),
                ));
            };

            let coord = |v: &str| {
                v.parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ParseError::new(line_no, format!("bad coordinate `{v}`")))
            };
            let pen_up = s
                .parse::<f32>()
                .map_err(|_| ParseError::new(line_no, format!("bad pen state `{s}`")))?
                != 0.0;
            let label = label
                .parse::<usize>()
                .map_err(|_| ParseError::new(line_no, format!("bad label `{label}`")))?;

            stroke.push(SketchPoint {
                x: coord(x)?,
                y: coord(y)?,
                label,
            });
            if pen_up {
                strokes.push(std::mem::take(&mut stroke));
            }
        }
        if !stroke.is_empty() {
            strokes.push(stroke);
        }

        if strokes.is_empty() {
            return Err(ParseError::new(text.lines().count(), "sketch has no points"));
        }
        Ok(Self { strokes })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| DataError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn max_label(&self) -> usize {
        self.strokes
            .iter()
            .flatten()
            .map(|p| p.label)
            .max()
            .unwrap_or(0)
    }
}

/// A sketch laid out as `N_STK` strokes of `N_STK_PNT` point slots.
#[derive(Debug, Clone)]
pub struct SketchItem {
    /// `(x, y, pen_up)` per slot, coordinates normalized into `[-1, 1]`.
    pub points: Vec<[f32; POINT_CHANNELS]>,
    /// `1.0` for a real point, `0.0` for padding.
    pub mask: Vec<f32>,
    /// Class per slot; padding slots hold `0`.
    pub target: Vec<usize>,
    pub path: PathBuf,
}

impl SketchItem {
    /// Keeps the first `N_STK` strokes, resamples longer strokes down to
    /// `N_STK_PNT` points and pads the rest.
    pub fn from_sketch(sketch: &SketchFile, path: impl Into<PathBuf>) -> Self {
        let strokes = &sketch.strokes[..sketch.strokes.len().min(N_STK)];

        let (min_x, max_x) = strokes
            .iter()
            .flatten()
            .map(|p| p.x)
            .minmax()
            .into_option()
            .unwrap_or((0.0, 0.0));
        let (min_y, max_y) = strokes
            .iter()
            .flatten()
            .map(|p| p.y)
            .minmax()
            .into_option()
            .unwrap_or((0.0, 0.0));
        let center = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
        let half_extent = ((max_x - min_x).max(max_y - min_y)) / 2.0;
        let scale = if half_extent > f32::EPSILON {
            half_extent
        } else {
            1.0
        };

        let mut points = vec![[0.0; POINT_CHANNELS]; N_PNT];
        let mut mask = vec![0.0; N_PNT];
        let mut target = vec![0; N_PNT];

        for (s, stroke) in strokes.iter().enumerate() {
            let kept = resample_indices(stroke.len(), N_STK_PNT);
            let last = kept.len().saturating_sub(1);
            for (j, &k) in kept.iter().enumerate() {
                let p = stroke[k];
                let slot = s * N_STK_PNT + j;
                points[slot] = [
                    (p.x - center.0) / scale,
                    (p.y - center.1) / scale,
                    if j == last { 1.0 } else { 0.0 },
                ];
                mask[slot] = 1.0;
                target[slot] = p.label;
            }
        }

        Self {
            points,
            mask,
            target,
            path: path.into(),
        }
    }

    pub fn num_points(&self) -> usize {
        self.mask.iter().filter(|m| **m > 0.5).count()
    }

    pub fn num_strokes(&self) -> usize {
        self.points
            .iter()
            .zip(&self.mask)
            .filter(|(p, m)| **m > 0.5 && p[2] > 0.5)
            .count()
    }
}

/// Evenly spaced indices into a stroke of `len` points, at most `max` of them.
fn resample_indices(len: usize, max: usize) -> Vec<usize> {
    if len <= max {
        return (0..len).collect();
    }
    (0..max)
        .map(|i| ((i * (len - 1)) as f32 / (max - 1) as f32).round() as usize)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Sketches of one category split into a train and a test part.
///
/// `train()` / `eval()` switch which split [`Dataset::get`] and
/// [`Dataset::len`] read from.
pub struct SketchDatasetSeg {
    train: Vec<SketchItem>,
    test: Vec<SketchItem>,
    n_classes: usize,
    mode: Mode,
}

impl SketchDatasetSeg {
    /// Loads every `*.txt` sketch under `root/category`.
    pub fn load(
        root: impl AsRef<Path>,
        category: &str,
        test_ratio: f64,
        seed: u64,
    ) -> Result<Self, DataError> {
        let dir = root.as_ref().join(category);
        if !dir.is_dir() {
            return Err(DataError::MissingRoot(dir));
        }

        let mut sketches = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|err| DataError::Io {
                path: dir.clone(),
                source: err.into(),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "txt") {
                continue;
            }
            sketches.push((SketchFile::load(path)?, path.to_path_buf()));
        }

        if sketches.is_empty() {
            return Err(DataError::Empty(dir));
        }

        let n_classes = sketches
            .iter()
            .map(|(sketch, _)| sketch.max_label() + 1)
            .max()
            .unwrap_or(1);
        let items = sketches
            .iter()
            .map(|(sketch, path)| SketchItem::from_sketch(sketch, path.clone()))
            .collect();

        let dataset = Self::from_items(items, n_classes, test_ratio, seed);
        log::info!(
            "loaded {} sketches from {} ({} train / {} test, {} classes)",
            sketches.len(),
            dir.display(),
            dataset.train.len(),
            dataset.test.len(),
            n_classes
        );
        Ok(dataset)
    }

    /// Shuffles `items` with `seed` and holds out `test_ratio` of them.
    ///
    /// With two or more items the test split is never empty, and neither is
    /// the train split.
    pub fn from_items(
        mut items: Vec<SketchItem>,
        n_classes: usize,
        test_ratio: f64,
        seed: u64,
    ) -> Self {
        items.shuffle(&mut StdRng::seed_from_u64(seed));

        let n = items.len();
        let n_test = if n < 2 {
            0
        } else {
            ((n as f64 * test_ratio).round() as usize).clamp(1, n - 1)
        };
        let train = items.split_off(n_test);

        Self {
            train,
            test: items,
            n_classes: n_classes.max(1),
            mode: Mode::Train,
        }
    }

    pub fn train(&mut self) {
        self.mode = Mode::Train;
    }

    pub fn eval(&mut self) {
        self.mode = Mode::Eval;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_train(&self) -> bool {
        self.mode == Mode::Train
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Items of the active split.
    pub fn items(&self) -> &[SketchItem] {
        match self.mode {
            Mode::Train => &self.train,
            Mode::Eval => &self.test,
        }
    }

    /// Clones the items at `indices` of the active split.
    pub fn get_many(&self, indices: &[usize]) -> Vec<SketchItem> {
        let items = self.items();
        indices.iter().map(|&i| items[i].clone()).collect()
    }

    pub fn split_lens(&self) -> (usize, usize) {
        (self.train.len(), self.test.len())
    }
}

impl Dataset<SketchItem> for SketchDatasetSeg {
    fn get(&self, index: usize) -> Option<SketchItem> {
        self.items().get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items().len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub sketches: usize,
    pub strokes: usize,
    pub points: usize,
    /// Real points per class.
    pub class_points: Vec<usize>,
}

impl DatasetStats {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a SketchItem>, n_classes: usize) -> Self {
        let mut stats = Self {
            sketches: 0,
            strokes: 0,
            points: 0,
            class_points: vec![0; n_classes],
        };
        for item in items {
            stats.sketches += 1;
            stats.strokes += item.num_strokes();
            for (&label, &m) in item.target.iter().zip(&item.mask) {
                if m > 0.5 {
                    stats.points += 1;
                    if let Some(count) = stats.class_points.get_mut(label) {
                        *count += 1;
                    }
                }
            }
        }
        stats
    }
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sketches: {}", self.sketches)?;
        writeln!(f, "strokes:  {}", self.strokes)?;
        writeln!(f, "points:   {}", self.points)?;
        for (class, count) in self.class_points.iter().enumerate() {
            let share = if self.points == 0 {
                0.0
            } else {
                *count as f64 / self.points as f64 * 100.0
            };
            writeln!(f, "  class {class:>2}: {count:>8} ({share:5.1}%)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_STROKES: &str = "\
# plane
0 0 0 1
10 0 0 1
10 10 1 1
0,10,0,2
5,5,1,2
";

    #[test]
    fn parses_strokes_and_labels() {
        let sketch = SketchFile::parse(TWO_STROKES).unwrap();
        assert_eq!(sketch.strokes.len(), 2);
        assert_eq!(sketch.strokes[0].len(), 3);
        assert_eq!(sketch.strokes[1][1], SketchPoint { x: 5.0, y: 5.0, label: 2 });
        assert_eq!(sketch.max_label(), 2);
    }

    #[test]
    fn trailing_points_form_a_stroke() {
        let sketch = SketchFile::parse("0 0 0 0\n1 1 0 0\n").unwrap();
        assert_eq!(sketch.strokes, vec![vec![
            SketchPoint { x: 0.0, y: 0.0, label: 0 },
            SketchPoint { x: 1.0, y: 1.0, label: 0 },
        ]]);
    }

    #[test]
    fn parse_errors_carry_line_numbers() {
        let err = SketchFile::parse("0 0 0 1\n0 0 1\n").unwrap_err();
        assert_eq!(err.line, 2);

        let err = SketchFile::parse("0 0 0 one\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.reason.contains("label"));

        assert!(SketchFile::parse("# only a comment\n").is_err());
    }

    #[test]
    fn item_is_normalized_and_padded() {
        let sketch = SketchFile::parse(TWO_STROKES).unwrap();
        let item = SketchItem::from_sketch(&sketch, "a.txt");

        assert_eq!(item.points.len(), N_PNT);
        assert_eq!(item.num_points(), 5);
        assert_eq!(item.num_strokes(), 2);

        // bounding box [0, 10]^2 maps onto [-1, 1]^2
        assert_eq!(item.points[0], [-1.0, -1.0, 0.0]);
        assert_eq!(item.points[2], [1.0, 1.0, 1.0]);
        // second stroke starts at its own slot block
        assert_eq!(item.points[N_STK_PNT], [-1.0, 1.0, 0.0]);
        assert_eq!(item.points[N_STK_PNT + 1], [0.0, 0.0, 1.0]);
        assert_eq!(item.target[N_STK_PNT], 2);

        assert_eq!(item.mask[3], 0.0);
        assert_eq!(item.points[3], [0.0, 0.0, 0.0]);
        assert_eq!(item.target[3], 0);
    }

    #[test]
    fn long_strokes_are_resampled() {
        let text = (0..100)
            .map(|i| format!("{i} 0 {} 3", u8::from(i == 99)))
            .join("\n");
        let sketch = SketchFile::parse(&text).unwrap();
        let item = SketchItem::from_sketch(&sketch, "long.txt");

        assert_eq!(item.num_points(), N_STK_PNT);
        assert_eq!(item.points[0][0], -1.0);
        assert_eq!(item.points[N_STK_PNT - 1], [1.0, 0.0, 1.0]);
        assert_eq!(item.mask[N_STK_PNT], 0.0);
    }

    #[test]
    fn extra_strokes_are_dropped() {
        let text = (0..N_STK + 4).map(|i| format!("{i} {i} 1 0")).join("\n");
        let sketch = SketchFile::parse(&text).unwrap();
        let item = SketchItem::from_sketch(&sketch, "many.txt");
        assert_eq!(item.num_strokes(), N_STK);
    }

    fn items(n: usize) -> Vec<SketchItem> {
        let sketch = SketchFile::parse(TWO_STROKES).unwrap();
        (0..n)
            .map(|i| SketchItem::from_sketch(&sketch, format!("{i}.txt")))
            .collect()
    }

    #[test]
    fn split_and_mode_switch() {
        let mut dataset = SketchDatasetSeg::from_items(items(10), 3, 0.2, 7);
        assert_eq!(dataset.split_lens(), (8, 2));
        assert!(dataset.is_train());
        assert_eq!(dataset.len(), 8);

        dataset.eval();
        assert_eq!(dataset.mode(), Mode::Eval);
        assert_eq!(dataset.len(), 2);
        assert!(dataset.get(1).is_some());
        assert!(dataset.get(2).is_none());

        dataset.train();
        assert_eq!(dataset.len(), 8);
        assert_eq!(dataset.n_classes(), 3);
    }

    #[test]
    fn tiny_datasets_keep_both_splits_usable() {
        let dataset = SketchDatasetSeg::from_items(items(2), 3, 0.0, 0);
        assert_eq!(dataset.split_lens(), (1, 1));

        let dataset = SketchDatasetSeg::from_items(items(1), 3, 0.5, 0);
        assert_eq!(dataset.split_lens(), (1, 0));
    }

    #[test]
    fn stats_count_real_points() {
        let stats = DatasetStats::from_items(&items(2), 3);
        assert_eq!(stats.sketches, 2);
        assert_eq!(stats.strokes, 4);
        assert_eq!(stats.points, 10);
        assert_eq!(stats.class_points, vec![0, 6, 4]);
    }

    #[test]
    fn load_walks_category_directory() {
        let dir = tempfile::tempdir().unwrap();
        let category = dir.path().join("plane").join("nested");
        std::fs::create_dir_all(&category).unwrap();
        std::fs::write(category.join("a.txt"), TWO_STROKES).unwrap();
        std::fs::write(category.join("b.txt"), "0 0 1 4\n").unwrap();
        std::fs::write(category.join("notes.md"), "ignored").unwrap();

        let dataset = SketchDatasetSeg::load(dir.path(), "plane", 0.5, 1).unwrap();
        assert_eq!(dataset.split_lens(), (1, 1));
        assert_eq!(dataset.n_classes(), 5);

        assert!(matches!(
            SketchDatasetSeg::load(dir.path(), "car", 0.5, 1),
            Err(DataError::MissingRoot(_))
        ));

        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        assert!(matches!(
            SketchDatasetSeg::load(dir.path(), "empty", 0.5, 1),
            Err(DataError::Empty(_))
        ));
    }
}
