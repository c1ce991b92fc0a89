//! Line assembly: fragments sharing a baseline become a visual line.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::fragment::{BBox, Fragment, TextFragment};
use super::options::LineConfig;

/// A visual line: fragments on one baseline, ordered left to right.
///
/// An image fragment always forms a line of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Fragments, left to right
    pub fragments: Vec<Fragment>,
    /// Whether a space is inserted before each fragment (false for the first)
    pub space_before: Vec<bool>,
    /// Union of fragment boxes
    pub bbox: BBox,
    /// Concatenated text
    pub text: String,
    /// Plurality font size of the text fragments
    pub font_size: f32,
}

impl Line {
    fn from_fragments(fragments: Vec<Fragment>, config: &LineConfig) -> Option<Self> {
        let first = fragments.first()?;
        let mut bbox = *first.bbox();
        let mut space_before = Vec::with_capacity(fragments.len());
        let mut text = String::new();

        for (i, fragment) in fragments.iter().enumerate() {
            bbox = bbox.union(fragment.bbox());
            let piece = fragment.text().unwrap_or_default();
            let space = i > 0 && needs_space(&fragments[i - 1], fragment, config);
            if space {
                text.push(' ');
            }
            text.push_str(piece);
            space_before.push(space);
        }

        let font_size = dominant_size(
            fragments
                .iter()
                .filter_map(Fragment::as_text)
                .map(|t| t.font_size),
        )
        .unwrap_or(bbox.height());

        Some(Self {
            fragments,
            space_before,
            bbox,
            text,
            font_size,
        })
    }

    /// Line height in points.
    pub fn height(&self) -> f32 {
        self.bbox.height()
    }

    /// Whether this line holds an image.
    pub fn is_image(&self) -> bool {
        self.fragments.iter().any(Fragment::is_image)
    }

    /// Text fragments of the line.
    pub fn text_fragments(&self) -> impl Iterator<Item = &TextFragment> {
        self.fragments.iter().filter_map(Fragment::as_text)
    }

    /// Whether more than half of the line's characters are bold.
    pub fn is_bold(&self) -> bool {
        let (bold, total) = self.text_fragments().fold((0, 0), |(b, t), f| {
            let n = f.text.chars().count();
            (if f.style.bold { b + n } else { b }, t + n)
        });
        total > 0 && bold * 2 > total
    }

    /// Deterministic total order: geometry, then text.
    pub fn reading_cmp(&self, other: &Line) -> Ordering {
        self.bbox
            .reading_cmp(&other.bbox)
            .then_with(|| self.text.cmp(&other.text))
            .then_with(|| self.fragments.len().cmp(&other.fragments.len()))
    }
}

/// A row under construction: fragments within baseline tolerance.
struct Row {
    fragments: Vec<Fragment>,
    baseline_sum: f32,
    top: f32,
    bottom: f32,
    height: f32,
}

impl Row {
    fn new(fragment: Fragment) -> Self {
        let bbox = *fragment.bbox();
        Self {
            fragments: vec![fragment],
            baseline_sum: bbox.center_y(),
            top: bbox.y0,
            bottom: bbox.y1,
            height: bbox.height(),
        }
    }

    fn baseline(&self) -> f32 {
        self.baseline_sum / self.fragments.len() as f32
    }

    fn tolerance(&self, config: &LineConfig) -> f32 {
        config
            .baseline_floor
            .max(config.baseline_factor * self.height)
    }

    fn accepts(&self, fragment: &Fragment, config: &LineConfig) -> bool {
        (fragment.bbox().center_y() - self.baseline()).abs() <= self.tolerance(config)
    }

    fn push(&mut self, fragment: Fragment) {
        let bbox = *fragment.bbox();
        self.baseline_sum += bbox.center_y();
        self.top = self.top.min(bbox.y0);
        self.bottom = self.bottom.max(bbox.y1);
        self.height = self.bottom - self.top;
        self.fragments.push(fragment);
    }
}

/// Group one page's fragments into lines.
///
/// Text fragments are clustered into rows by vertical midpoint against an
/// adaptive tolerance; each row is then ordered left to right and split at
/// horizontal gaps wider than `word_gap_factor` line heights, so text in
/// separate columns or table cells never shares a line.
pub fn assemble_lines(fragments: &[Fragment], config: &LineConfig) -> Vec<Line> {
    let mut sorted: Vec<Fragment> = fragments.to_vec();
    sorted.sort_by(|a, b| a.reading_cmp(b));

    let mut rows: Vec<Row> = Vec::new();
    let mut lines: Vec<Line> = Vec::new();

    for fragment in sorted {
        if fragment.is_image() {
            if let Some(line) = Line::from_fragments(vec![fragment], config) {
                lines.push(line);
            }
            continue;
        }

        let top = fragment.bbox().y0;
        let target = rows
            .iter()
            .rposition(|row| row.bottom > top && row.accepts(&fragment, config))
            .or_else(|| {
                rows.last()
                    .filter(|row| row.accepts(&fragment, config))
                    .map(|_| rows.len() - 1)
            });

        match target {
            Some(idx) => rows[idx].push(fragment),
            None => rows.push(Row::new(fragment)),
        }
    }

    for row in rows {
        let split_gap = config.word_gap_factor * row.height;
        let mut fragments = row.fragments;
        fragments.sort_by(|a, b| {
            a.bbox()
                .x0
                .total_cmp(&b.bbox().x0)
                .then_with(|| a.reading_cmp(b))
        });

        let mut segment: Vec<Fragment> = Vec::new();
        let mut segment_right = f32::NEG_INFINITY;
        for fragment in fragments {
            let bbox = *fragment.bbox();
            if !segment.is_empty() && bbox.x0 - segment_right > split_gap {
                if let Some(line) = Line::from_fragments(std::mem::take(&mut segment), config) {
                    lines.push(line);
                }
                segment_right = f32::NEG_INFINITY;
            }
            segment_right = segment_right.max(bbox.x1);
            segment.push(fragment);
        }
        if let Some(line) = Line::from_fragments(segment, config) {
            lines.push(line);
        }
    }

    lines.sort_by(|a, b| a.reading_cmp(b));
    lines
}

/// Plurality font size, keyed to 0.1pt; ties go to the larger size.
pub(crate) fn dominant_size(sizes: impl Iterator<Item = f32>) -> Option<f32> {
    let mut histogram: BTreeMap<i32, usize> = BTreeMap::new();
    for size in sizes {
        *histogram.entry((size * 10.0).round() as i32).or_insert(0) += 1;
    }
    histogram
        .into_iter()
        .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then(ka.cmp(kb)))
        .map(|(key, _)| key as f32 / 10.0)
}

/// Median height of the text lines; `fallback` when there are none.
pub(crate) fn median_line_height<'a>(lines: impl Iterator<Item = &'a Line>, fallback: f32) -> f32 {
    let mut heights: Vec<f32> = lines
        .filter(|l| !l.is_image())
        .map(Line::height)
        .filter(|h| *h > 0.0)
        .collect();
    if heights.is_empty() {
        return fallback;
    }
    heights.sort_by(|a, b| a.total_cmp(b));
    let n = heights.len();
    if n % 2 == 1 {
        heights[n / 2]
    } else {
        (heights[n / 2 - 1] + heights[n / 2]) / 2.0
    }
}

fn needs_space(prev: &Fragment, curr: &Fragment, config: &LineConfig) -> bool {
    // Overlapping boxes are stacked text, not one word
    let gap = curr.bbox().x0 - prev.bbox().x1;
    if gap.abs() < config.abut_epsilon {
        return false;
    }
    let prev_last = prev.text().and_then(|t| t.chars().last());
    let curr_first = curr.text().and_then(|t| t.chars().next());
    match (prev_last, curr_first) {
        (Some(a), Some(b)) => !(is_spaceless_script_char(a) && is_spaceless_script_char(b)),
        _ => true,
    }
}

/// Check if a character belongs to a script written without word spaces.
///
/// Chinese and Japanese do not use spaces between words; Korean does.
pub(crate) fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs
    (0x4E00..=0x9FFF).contains(&code)
    // Extension A
    || (0x3400..=0x4DBF).contains(&code)
    // Extensions B-F
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana
    || (0x3040..=0x309F).contains(&code)
    // Katakana
    || (0x30A0..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::provider::StyleFlags;

    fn text(x0: f32, y0: f32, x1: f32, y1: f32, s: &str) -> Fragment {
        Fragment::Text(TextFragment {
            page: 0,
            bbox: BBox::new(x0, y0, x1, y1),
            text: s.to_string(),
            font_family: None,
            font_size: y1 - y0,
            style: StyleFlags::default(),
        })
    }

    #[test]
    fn test_fragments_on_one_baseline_form_a_line() {
        let fragments = vec![
            text(130.0, 101.0, 170.0, 113.0, "world"),
            text(72.0, 100.0, 126.0, 112.0, "Hello"),
        ];
        let lines = assemble_lines(&fragments, &LineConfig::default());

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Hello world");
        assert_eq!(lines[0].space_before, vec![false, true]);
    }

    #[test]
    fn test_abutting_fragments_join_without_space() {
        let fragments = vec![
            text(72.0, 100.0, 90.0, 112.0, "recon"),
            text(90.2, 100.0, 120.0, 112.0, "struct"),
        ];
        let lines = assemble_lines(&fragments, &LineConfig::default());
        assert_eq!(lines[0].text, "reconstruct");
    }

    #[test]
    fn test_overlapping_fragments_keep_a_space() {
        let fragments = vec![
            text(72.0, 10.0, 400.0, 20.0, "one"),
            text(72.0, 12.0, 400.0, 22.0, "two"),
            text(72.0, 14.0, 400.0, 24.0, "three"),
        ];
        let lines = assemble_lines(&fragments, &LineConfig::default());

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "one two three");
        assert_eq!(lines[0].space_before, vec![false, true, true]);
    }

    #[test]
    fn test_slight_kerning_overlap_still_abuts() {
        let fragments = vec![
            text(72.0, 100.0, 90.0, 112.0, "recon"),
            text(89.8, 100.0, 120.0, 112.0, "struct"),
        ];
        let lines = assemble_lines(&fragments, &LineConfig::default());
        assert_eq!(lines[0].text, "reconstruct");
    }

    #[test]
    fn test_cjk_fragments_join_without_space() {
        let fragments = vec![
            text(72.0, 100.0, 96.0, 112.0, "文書"),
            text(98.0, 100.0, 122.0, 112.0, "変換"),
        ];
        let lines = assemble_lines(&fragments, &LineConfig::default());
        assert_eq!(lines[0].text, "文書変換");
    }

    #[test]
    fn test_separate_baselines_form_separate_lines() {
        let fragments = vec![
            text(72.0, 100.0, 200.0, 112.0, "first"),
            text(72.0, 114.0, 200.0, 126.0, "second"),
        ];
        let lines = assemble_lines(&fragments, &LineConfig::default());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "first");
        assert_eq!(lines[1].text, "second");
    }

    #[test]
    fn test_tolerance_scales_with_line_height() {
        // 4pt offset: same line at 24pt, different lines at 6pt.
        let large = vec![
            text(72.0, 100.0, 150.0, 124.0, "Big"),
            text(155.0, 104.0, 230.0, 128.0, "Title"),
        ];
        assert_eq!(assemble_lines(&large, &LineConfig::default()).len(), 1);

        let small = vec![
            text(72.0, 100.0, 100.0, 106.0, "tiny"),
            text(102.0, 104.0, 130.0, 110.0, "print"),
        ];
        assert_eq!(assemble_lines(&small, &LineConfig::default()).len(), 2);
    }

    #[test]
    fn test_wide_gap_splits_row() {
        let fragments = vec![
            text(40.0, 100.0, 250.0, 112.0, "left column"),
            text(340.0, 100.0, 550.0, 112.0, "right column"),
        ];
        let lines = assemble_lines(&fragments, &LineConfig::default());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "left column");
        assert_eq!(lines[1].text, "right column");
    }

    #[test]
    fn test_dominant_size_prefers_plurality_then_larger() {
        assert_eq!(dominant_size([10.0, 12.0, 12.0, 18.0].into_iter()), Some(12.0));
        assert_eq!(dominant_size([10.0, 12.0].into_iter()), Some(12.0));
        assert_eq!(dominant_size(std::iter::empty()), None);
    }

    #[test]
    fn test_is_spaceless_script_char() {
        assert!(is_spaceless_script_char('中'));
        assert!(is_spaceless_script_char('あ'));
        assert!(!is_spaceless_script_char('한'));
        assert!(!is_spaceless_script_char('a'));
    }
}
