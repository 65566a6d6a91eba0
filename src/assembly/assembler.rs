//! The per-figure assembly orchestrator.
//!
//! [`FigureAssembler`] owns the injected model capabilities and the
//! decoder's language model, and runs the full pipeline for one figure:
//! boundary detection, label recognition, classification, scale
//! detection and decoding, scale resolution and caption assignment.
//! Every stage is a deterministic function of its numeric inputs, so
//! identical inputs always produce an identical [`Figure`].

use crate::assembly::captions::assign_captions;
use crate::assembly::classification::{resolve_labeled_subfigure, resolve_whole_figure};
use crate::assembly::labels::{assemble_labels, LabelCandidate, ResolvedLabel};
use crate::core::config::SeparationConfig;
use crate::core::errors::{AssemblyStage, SeparationError, SeparationResult};
use crate::core::traits::{Classifier, Detector, LabelRecognizer, ScaleTextRecognizer};
use crate::domain::figure::{CaptionFragment, Figure, ScaleBar, ScaleLabel, Subfigure, Unassigned};
use crate::processors::geometry::BoundingBox;
use crate::processors::letterbox::Letterbox;
use crate::processors::suppression::{class_aware_nms, nms};
use crate::scale::ctc::decode_scale_text;
use crate::scale::lm::LanguageModel;
use crate::scale::resolver::resolve;
use image::RgbImage;
use rayon::prelude::*;
use tracing::{debug, warn};

/// Detector class index of a scale bar line.
const SCALE_BAR_CLASS: usize = 1;
/// Detector class index of a scale label.
const SCALE_LABEL_CLASS: usize = 2;

/// One figure to assemble, with its externally split caption fragments.
#[derive(Debug, Clone)]
pub struct FigureTask {
    /// Name of the figure, used to tag failures.
    pub name: String,
    /// The full figure image.
    pub image: RgbImage,
    /// Caption fragments produced by the caption-splitting collaborator.
    pub captions: Vec<CaptionFragment>,
}

/// Assembles raw model outputs into consistent [`Figure`] records.
///
/// The assembler never executes a network itself. Both detectors, the
/// glyph recognizer, the grid classifier and the scale-text recognizer
/// are injected behind their capability traits; the assembler supplies
/// the deterministic glue. It holds no per-figure state, so one
/// instance can serve many figures concurrently.
pub struct FigureAssembler {
    boundary_detector: Box<dyn Detector>,
    scale_detector: Box<dyn Detector>,
    label_recognizer: Box<dyn LabelRecognizer>,
    classifier: Box<dyn Classifier>,
    scale_text_recognizer: Box<dyn ScaleTextRecognizer>,
    language_model: LanguageModel,
    config: SeparationConfig,
}

impl FigureAssembler {
    /// Creates an assembler from its injected capabilities.
    ///
    /// # Arguments
    ///
    /// * `boundary_detector` - Detector for subfigure boundary candidates
    /// * `scale_detector` - Detector for scale bar lines and scale labels
    /// * `label_recognizer` - Glyph recognizer for cropped candidates
    /// * `classifier` - Grid classifier for subfigure geometry and class
    /// * `scale_text_recognizer` - CTC matrix producer for scale labels
    /// * `language_model` - Bigram model biasing the scale-text decoder
    /// * `config` - Engine configuration, validated here
    ///
    /// # Errors
    ///
    /// Returns a configuration error when any tunable is out of range.
    pub fn new(
        boundary_detector: Box<dyn Detector>,
        scale_detector: Box<dyn Detector>,
        label_recognizer: Box<dyn LabelRecognizer>,
        classifier: Box<dyn Classifier>,
        scale_text_recognizer: Box<dyn ScaleTextRecognizer>,
        language_model: LanguageModel,
        config: SeparationConfig,
    ) -> SeparationResult<Self> {
        config.validate()?;
        Ok(Self {
            boundary_detector,
            scale_detector,
            label_recognizer,
            classifier,
            scale_text_recognizer,
            language_model,
            config,
        })
    }

    /// Assembles one figure into its final record.
    ///
    /// Stages run in a fixed order: boundary candidates are detected,
    /// suppressed and mapped back to image coordinates; each survivor is
    /// cropped and read as a label glyph; resolved labels seed the
    /// classifier grid lookup that produces provisional subfigures (or
    /// the whole-figure fallback when no label survives); scale objects
    /// are detected and decoded, then attached and calibrated; caption
    /// fragments are matched last.
    ///
    /// # Errors
    ///
    /// Any stage failure is returned as [`SeparationError::Assembly`]
    /// tagged with the figure name and stage. The failure is scoped to
    /// this figure only.
    pub fn assemble(
        &self,
        name: &str,
        image: &RgbImage,
        captions: Vec<CaptionFragment>,
    ) -> SeparationResult<Figure> {
        let candidates = self
            .detect_boundaries(image)
            .map_err(|err| SeparationError::assembly(name, AssemblyStage::BoundaryDetection, err))?;

        let labels = self
            .recognize_labels(image, &candidates)
            .map_err(|err| SeparationError::assembly(name, AssemblyStage::LabelRecognition, err))?;

        let mut subfigures = self
            .classify(image, &labels)
            .map_err(|err| SeparationError::assembly(name, AssemblyStage::Classification, err))?;

        let (bars, scale_labels) = self
            .detect_scale_objects(image)
            .map_err(|err| SeparationError::assembly(name, AssemblyStage::ScaleDetection, err))?;

        let resolution = resolve(&mut subfigures, bars, scale_labels);
        let unassigned_captions = assign_captions(&mut subfigures, captions);

        Ok(Figure {
            name: name.to_string(),
            width: image.width(),
            height: image.height(),
            subfigures,
            unassigned: Unassigned {
                scale_bars: resolution.unassigned_bars,
                scale_labels: resolution.unassigned_labels,
                captions: unassigned_captions,
            },
        })
    }

    /// Assembles a batch of figures in parallel.
    ///
    /// Figures are independent, so the batch fans out on the rayon
    /// thread pool. A failed figure is logged and reported in its slot;
    /// it never aborts the rest of the batch.
    pub fn assemble_batch(&self, tasks: &[FigureTask]) -> Vec<SeparationResult<Figure>> {
        tasks
            .par_iter()
            .map(|task| {
                self.assemble(&task.name, &task.image, task.captions.clone())
                    .inspect_err(|err| warn!(figure = %task.name, %err, "figure assembly failed"))
            })
            .collect()
    }

    /// Detects, suppresses and filters subfigure boundary candidates,
    /// returning each surviving box with its class confidence.
    fn detect_boundaries(&self, image: &RgbImage) -> SeparationResult<Vec<(BoundingBox, f32)>> {
        let letterbox = Letterbox::new(
            image.width(),
            image.height(),
            self.boundary_detector.input_size(),
        )?;
        let detections = self.boundary_detector.detect(image)?;
        let kept = class_aware_nms(
            &detections,
            self.config.detection.confidence_threshold,
            self.config.detection.nms_iou_threshold,
        );

        let mut candidates = Vec::with_capacity(kept.len());
        for index in kept {
            let detection = &detections[index];
            let mapped = match letterbox.to_original_space(&detection.bbox) {
                Ok(bbox) => bbox,
                Err(err) => {
                    debug!(%err, "dropping unmappable boundary box");
                    continue;
                }
            };
            let truncated = match BoundingBox::new(
                mapped.x1().trunc(),
                mapped.y1().trunc(),
                mapped.x2().trunc(),
                mapped.y2().trunc(),
            ) {
                Ok(bbox) => bbox,
                Err(err) => {
                    debug!(%err, "dropping degenerate boundary box");
                    continue;
                }
            };
            let min = self.config.detection.min_box_side;
            if truncated.width() > min && truncated.height() > min {
                candidates.push((truncated, detection.class_confidence));
            }
        }
        Ok(candidates)
    }

    /// Crops each boundary candidate, reads its glyph and resolves the
    /// stream into unique subfigure labels.
    fn recognize_labels(
        &self,
        image: &RgbImage,
        candidates: &[(BoundingBox, f32)],
    ) -> SeparationResult<Vec<ResolvedLabel>> {
        let mut predicted = Vec::with_capacity(candidates.len());
        for (bbox, box_confidence) in candidates {
            let crop = crop_region(image, bbox);
            let glyph = self.label_recognizer.recognize(&crop)?;
            predicted.push(LabelCandidate {
                bbox: bbox.clone(),
                box_confidence: *box_confidence,
                glyph,
            });
        }
        Ok(assemble_labels(
            &predicted,
            self.label_recognizer.reject_sentinel(),
            &self.config.detection,
        ))
    }

    /// Resolves provisional subfigures from the classifier grid, one per
    /// label, or the whole-figure fallback when no label survived.
    fn classify(
        &self,
        image: &RgbImage,
        labels: &[ResolvedLabel],
    ) -> SeparationResult<Vec<Subfigure>> {
        let label_boxes: Vec<BoundingBox> = labels.iter().map(|label| label.bbox.clone()).collect();
        let grid = self.classifier.classify(image, &label_boxes)?;

        if labels.is_empty() {
            debug!("no subfigure labels survived, falling back to the whole figure");
            let whole = resolve_whole_figure(
                &grid,
                image.width(),
                image.height(),
                &self.config.detection,
            )?;
            return Ok(vec![whole]);
        }

        let letterbox = Letterbox::new(
            image.width(),
            image.height(),
            self.config.detection.canvas_size,
        )?;
        labels
            .iter()
            .map(|label| resolve_labeled_subfigure(&grid, label, &letterbox, &self.config.detection))
            .collect()
    }

    /// Detects scale objects, decodes label crops and splits the result
    /// into bar lines and usable readings.
    fn detect_scale_objects(
        &self,
        image: &RgbImage,
    ) -> SeparationResult<(Vec<ScaleBar>, Vec<ScaleLabel>)> {
        let letterbox = Letterbox::new(
            image.width(),
            image.height(),
            self.scale_detector.input_size(),
        )?;
        let detections = self.scale_detector.detect(image)?;

        // Scale suppression is class agnostic: a bar and a label drawn
        // over the same pixels cannot both be right.
        let confident: Vec<usize> = (0..detections.len())
            .filter(|&index| {
                detections[index].score() > self.config.scale.confidence_threshold
            })
            .collect();
        let scored: Vec<BoundingBox> = confident
            .iter()
            .map(|&index| detections[index].bbox.scored(detections[index].score()))
            .collect();
        let kept = nms(&scored, self.config.scale.nms_iou_threshold, None);

        let mut bars = Vec::new();
        let mut labels = Vec::new();
        for local in kept {
            let detection = &detections[confident[local]];
            let geometry = match letterbox.to_original_space(&detection.bbox) {
                Ok(bbox) => bbox,
                Err(err) => {
                    debug!(%err, "dropping unmappable scale box");
                    continue;
                }
            };
            match detection.class_index {
                SCALE_BAR_CLASS => bars.push(ScaleBar {
                    length: geometry.width().trunc(),
                    geometry,
                    confidence: detection.score(),
                    label: None,
                }),
                SCALE_LABEL_CLASS => {
                    let crop = crop_region(image, &geometry);
                    let matrix = self.scale_text_recognizer.read(&crop)?;
                    let reading = decode_scale_text(
                        &matrix,
                        Some(&self.language_model),
                        &self.config.decoder,
                    )?;
                    if !reading.is_usable() {
                        debug!("scale label crop decoded to no usable reading, dropping");
                        continue;
                    }
                    labels.push(ScaleLabel {
                        geometry,
                        text: reading.text(),
                        nm: reading.nanometres(),
                        label_confidence: reading.confidence,
                        box_confidence: detection.score(),
                    });
                }
                other => {
                    debug!(class = other, "ignoring scale detection of unhandled class");
                }
            }
        }
        Ok((bars, labels))
    }
}

/// Crops the region under `bbox`, clamped to the image bounds and at
/// least one pixel on each side.
fn crop_region(image: &RgbImage, bbox: &BoundingBox) -> RgbImage {
    let x = (bbox.x1().max(0.0) as u32).min(image.width().saturating_sub(1));
    let y = (bbox.y1().max(0.0) as u32).min(image.height().saturating_sub(1));
    let width = ((bbox.x2().max(0.0) as u32).min(image.width()) - x).max(1);
    let height = ((bbox.y2().max(0.0) as u32).min(image.height()) - y).max(1);
    image::imageops::crop_imm(image, x, y, width, height).to_image()
}
