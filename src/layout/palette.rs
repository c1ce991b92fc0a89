//! Document-wide style palette construction.
//!
//! Pass one of the pipeline feeds every text fragment of the document into a
//! [`PaletteBuilder`]; the resulting [`StylePalette`] is then shared
//! read-only by all page workers.

use std::collections::BTreeMap;

use log::debug;

use super::fragment::Fragment;
use super::options::ClassifierConfig;
use crate::model::{SizeBand, StylePalette};

/// Font-size histogram with 0.1pt resolution.
#[derive(Debug, Clone, Default)]
pub struct PaletteBuilder {
    sizes: BTreeMap<i32, usize>,
    families: BTreeMap<(i32, String), usize>,
}

impl PaletteBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one fragment. Images are ignored.
    pub fn add_fragment(&mut self, fragment: &Fragment) {
        let Some(text) = fragment.as_text() else {
            return;
        };
        let key = size_key(text.font_size);
        *self.sizes.entry(key).or_insert(0) += 1;
        if let Some(family) = &text.font_family {
            *self.families.entry((key, family.clone())).or_insert(0) += 1;
        }
    }

    /// Record a batch of fragments.
    pub fn add_fragments<'a>(&mut self, fragments: impl IntoIterator<Item = &'a Fragment>) {
        for fragment in fragments {
            self.add_fragment(fragment);
        }
    }

    /// Number of text fragments recorded.
    pub fn fragment_count(&self) -> usize {
        self.sizes.values().sum()
    }

    /// Build the palette.
    ///
    /// Adjacent sizes within `band_tolerance` of a band's smallest size share
    /// the band. The band with the most fragments is body text; bands at least
    /// `max(heading_min_delta, heading_ratio × body)` above body become heading
    /// levels, largest first.
    pub fn build(&self, config: &ClassifierConfig) -> StylePalette {
        let mut palette = StylePalette {
            max_heading_levels: config.max_heading_levels,
            ..Default::default()
        };

        let bands = self.bands(config.band_tolerance);
        let Some(body_index) = bands
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.band
                    .fragment_count
                    .cmp(&b.band.fragment_count)
                    .then(ib.cmp(ia))
            })
            .map(|(i, _)| i)
        else {
            return palette;
        };

        let body = &bands[body_index];
        palette.body = body.band;
        palette.body_font = self.dominant_family(&body.keys);

        let threshold =
            body.band.max + config.heading_min_delta.max(config.heading_ratio * body.band.size);
        let mut headings: Vec<SizeBand> = bands
            .iter()
            .map(|b| b.band)
            .filter(|b| b.min >= threshold)
            .collect();
        headings.sort_by(|a, b| b.size.total_cmp(&a.size));
        headings.truncate(config.max_heading_levels as usize);
        palette.headings = headings;

        debug!(
            "Style palette: body {:.1}pt ({} fragments), headings {:?}",
            palette.body.size,
            palette.body.fragment_count,
            palette.headings.iter().map(|b| b.size).collect::<Vec<_>>()
        );
        palette
    }

    fn bands(&self, tolerance: f32) -> Vec<KeyedBand> {
        let mut bands: Vec<KeyedBand> = Vec::new();
        for (&key, &count) in &self.sizes {
            let size = key as f32 / 10.0;
            match bands.last_mut() {
                Some(last) if size - last.band.min <= tolerance + 1e-3 => {
                    last.band.max = size;
                    last.band.fragment_count += count;
                    if count > last.peak {
                        last.peak = count;
                        last.band.size = size;
                    }
                    last.keys.push(key);
                }
                _ => bands.push(KeyedBand {
                    band: SizeBand::single(size, count),
                    peak: count,
                    keys: vec![key],
                }),
            }
        }
        bands
    }

    fn dominant_family(&self, keys: &[i32]) -> Option<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for ((key, family), count) in &self.families {
            if keys.contains(key) {
                *counts.entry(family.as_str()).or_insert(0) += count;
            }
        }
        counts
            .into_iter()
            .max_by(|(fa, ca), (fb, cb)| ca.cmp(cb).then(fb.cmp(fa)))
            .map(|(family, _)| family.to_string())
    }
}

struct KeyedBand {
    band: SizeBand,
    peak: usize,
    keys: Vec<i32>,
}

fn size_key(size: f32) -> i32 {
    (size * 10.0).round() as i32
}
