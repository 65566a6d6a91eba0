//! Subfigure assembly: labels, classification, captions and the
//! per-figure orchestrator.

pub mod assembler;
pub mod captions;
pub mod classification;
pub mod labels;

pub use assembler::{FigureAssembler, FigureTask};
pub use captions::assign_captions;
pub use classification::{resolve_labeled_subfigure, resolve_whole_figure, CLASS_NAMES};
pub use labels::{assemble_labels, LabelCandidate, ResolvedLabel};
