//! Scale-bar reading: text decoding and subfigure calibration.

pub mod ctc;
pub mod lm;
pub mod resolver;

pub use ctc::{beam_search, decode_scale_text, interpret, ScaleReading};
pub use lm::{LanguageModel, VOCABULARY};
pub use resolver::{pair_labels_to_bars, resolve, ScaleResolution};
