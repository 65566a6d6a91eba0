//! Core error types for the figure assembly engine.
//!
//! This module defines the error taxonomy used throughout the engine.
//! Two recovery policies are deliberately *not* errors: a scale reading
//! that fails to parse is reported through a sentinel value, and a
//! subfigure with conflicting scale readings is left uncalibrated. Both
//! are ordinary return values handled by the stages that produce them.

use thiserror::Error;

/// Enum representing the stages of per-figure assembly.
///
/// This enum identifies which stage of the assembly an error occurred in,
/// providing context for debugging and error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStage {
    /// Detecting and filtering subfigure boundary boxes.
    BoundaryDetection,
    /// Recognizing label glyphs on candidate boxes.
    LabelRecognition,
    /// Resolving classifier grid predictions.
    Classification,
    /// Detecting scale bars and labels, decoding label text.
    ScaleDetection,
    /// Pairing scale objects and computing calibration.
    ScaleResolution,
    /// Matching caption fragments to subfigures.
    CaptionAssignment,
}

impl std::fmt::Display for AssemblyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssemblyStage::BoundaryDetection => write!(f, "boundary detection"),
            AssemblyStage::LabelRecognition => write!(f, "label recognition"),
            AssemblyStage::Classification => write!(f, "classification"),
            AssemblyStage::ScaleDetection => write!(f, "scale detection"),
            AssemblyStage::ScaleResolution => write!(f, "scale resolution"),
            AssemblyStage::CaptionAssignment => write!(f, "caption assignment"),
        }
    }
}

/// Enum representing the errors that can occur during figure assembly.
#[derive(Error, Debug)]
pub enum SeparationError {
    /// A box is malformed (NaN or inverted coordinates). Callers recover
    /// by dropping the offending box, never the whole figure.
    #[error("malformed geometry: {message}")]
    Geometry {
        /// A message describing the malformed box.
        message: String,
    },

    /// Assembly of a single figure failed. This is the only fatal
    /// condition and it is scoped to one figure: batch callers skip the
    /// figure, log, and continue.
    #[error("figure '{figure}' failed during {stage}")]
    Assembly {
        /// The name of the figure that failed.
        figure: String,
        /// The stage of assembly where the failure occurred.
        stage: AssemblyStage,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input, such as a classifier grid whose
    /// shape does not match the configured anchor layout.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    Config {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error raised by an injected model capability.
    #[error("inference failed in model '{model_name}': {context}")]
    Inference {
        /// The name of the model where inference failed.
        model_name: String,
        /// Additional context about the inference error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SeparationError {
    /// Creates a geometry error for a malformed box.
    pub fn geometry(message: impl Into<String>) -> Self {
        Self::Geometry {
            message: message.into(),
        }
    }

    /// Creates an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a configuration error with context and details.
    pub fn config_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Config {
            message: format!("{}: {}", context.into(), details.into()),
        }
    }

    /// Creates a configuration error for invalid field values.
    pub fn invalid_field(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Config {
            message: format!(
                "invalid value for field '{}': expected {}, got {}",
                field.into(),
                expected.into(),
                actual.into()
            ),
        }
    }

    /// Wraps an error raised by an injected model capability.
    pub fn inference(
        model_name: impl Into<String>,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.into(),
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Tags an error with the figure it occurred in and the stage that
    /// produced it, making it a per-figure fatal failure.
    pub fn assembly(
        figure: impl Into<String>,
        stage: AssemblyStage,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Assembly {
            figure: figure.into(),
            stage,
            source: Box::new(source),
        }
    }
}
