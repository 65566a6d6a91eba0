//! Output data model of the figure assembly engine.

pub mod figure;

pub use figure::{
    CaptionFragment, Figure, ScaleBar, ScaleLabel, Subfigure, SubfigureLabel, Unassigned,
};
