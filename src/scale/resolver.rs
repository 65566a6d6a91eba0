//! Pairing of scale objects and subfigure calibration.
//!
//! Detection yields bar lines and decoded labels independently. The
//! resolver pairs each label with its nearest bar, lets subfigures claim
//! the bars their geometry contains, and derives a pixel-to-nanometre
//! calibration when the claimed readings agree. Conflicting readings are
//! never averaged; the subfigure is simply left uncalibrated.

use crate::domain::figure::{ScaleBar, ScaleLabel, Subfigure};
use tracing::{debug, warn};

/// Scale objects left over after resolution, reported to the caller
/// rather than discarded.
#[derive(Debug, Clone, Default)]
pub struct ScaleResolution {
    /// Bars no subfigure contained.
    pub unassigned_bars: Vec<ScaleBar>,
    /// Labels left without a bar to pair with.
    pub unassigned_labels: Vec<ScaleLabel>,
}

/// Pairs each label with its geometrically nearest unpaired bar.
///
/// Labels are visited in detection order; each claims the unpaired bar
/// with the smallest center distance. Distance ties keep the earlier
/// bar. Labels that find no free bar are returned unpaired.
pub fn pair_labels_to_bars(
    mut bars: Vec<ScaleBar>,
    labels: Vec<ScaleLabel>,
) -> (Vec<ScaleBar>, Vec<ScaleLabel>) {
    let mut unpaired = Vec::new();
    for label in labels {
        let nearest = bars
            .iter_mut()
            .filter(|bar| bar.label.is_none())
            .min_by(|a, b| {
                let da = a.geometry.center_distance(&label.geometry);
                let db = b.geometry.center_distance(&label.geometry);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            });
        match nearest {
            Some(bar) => bar.label = Some(label),
            None => unpaired.push(label),
        }
    }
    (bars, unpaired)
}

/// Derives the calibration of one subfigure from its claimed bars.
///
/// The labeled bars' readings must agree on exactly one distinct
/// nanometre value; the conversion factor then comes from the last
/// labeled bar. Zero or conflicting readings leave the subfigure
/// uncalibrated.
fn calibrate(subfigure: &mut Subfigure) {
    let mut nm_to_pixel = 0.0f32;
    let mut label_text = String::new();
    let mut readings: Vec<f32> = Vec::new();

    for bar in &subfigure.scale_bars {
        let Some(label) = &bar.label else { continue };
        if bar.length <= 0.0 {
            warn!(
                subfigure = %subfigure.subfigure_label.text,
                "skipping zero-length scale bar"
            );
            continue;
        }
        if !readings.contains(&label.nm) {
            readings.push(label.nm);
        }
        nm_to_pixel = label.nm / bar.length;
        label_text = label.text.clone();
    }

    if readings.len() != 1 {
        if readings.len() > 1 {
            debug!(
                subfigure = %subfigure.subfigure_label.text,
                readings = readings.len(),
                "conflicting scale readings, leaving subfigure uncalibrated"
            );
        }
        return;
    }

    subfigure.nm_height = Some((nm_to_pixel * subfigure.height * 10.0).trunc() / 10.0);
    subfigure.nm_width = Some((nm_to_pixel * subfigure.width * 10.0).trunc() / 10.0);
    subfigure.scale_label = Some(label_text);
}

/// Attaches scale objects to subfigures and calibrates them.
///
/// Labels pair with bars first. Subfigures then claim bars by strict
/// geometric containment, visited in detection order so the first
/// claimant wins. Each subfigure with exactly one distinct claimed
/// reading gets `nm_height`, `nm_width` and `scale_label` set.
pub fn resolve(
    subfigures: &mut [Subfigure],
    bars: Vec<ScaleBar>,
    labels: Vec<ScaleLabel>,
) -> ScaleResolution {
    let (paired, unassigned_labels) = pair_labels_to_bars(bars, labels);

    let mut pool = paired;
    for subfigure in subfigures.iter_mut() {
        let (claimed, rest): (Vec<ScaleBar>, Vec<ScaleBar>) = pool
            .into_iter()
            .partition(|bar| bar.geometry.is_contained_in(&subfigure.geometry, 0.0));
        subfigure.scale_bars = claimed;
        pool = rest;
        calibrate(subfigure);
    }

    ScaleResolution {
        unassigned_bars: pool,
        unassigned_labels,
    }
}
