//! Figure decomposition and assembly engine.
//!
//! This crate turns raw, noisy per-figure model outputs (subfigure boundary
//! boxes, per-box label-glyph predictions, classifier grid predictions,
//! scale-bar and scale-label boxes, and character-probability matrices for
//! scale text) into one consistent, cross-referenced record: a set of
//! uniquely labeled subfigures, each with a classification, an optional
//! pixel-to-physical-length calibration, and an optional caption.
//!
//! Models are never executed here. They are injected behind the capability
//! traits in [`core::traits`], so the deterministic assembly stages stay
//! testable without any model runtime.
//!
//! # Main APIs
//!
//! - [`FigureAssembler`] - per-figure orchestration and batch fan-out
//! - [`processors`] - box algebra, letterbox transforms, non-max suppression
//! - [`scale`] - CTC beam search with a bigram language model, calibration
//!
//! # Example
//!
//! ```rust,ignore
//! use figsep::assembly::FigureAssembler;
//! use figsep::core::config::SeparationConfig;
//!
//! let assembler = FigureAssembler::new(
//!     subfigure_detector,
//!     scale_detector,
//!     label_recognizer,
//!     classifier,
//!     scale_text_recognizer,
//!     language_model,
//!     SeparationConfig::default(),
//! )?;
//! let figure = assembler.assemble("fig1.png", &image, caption_fragments)?;
//! println!("{}", serde_json::to_string_pretty(&figure)?);
//! ```

pub mod assembly;
pub mod core;
pub mod domain;
pub mod processors;
pub mod scale;

pub use assembly::FigureAssembler;
pub use core::errors::SeparationError;
pub use domain::Figure;
