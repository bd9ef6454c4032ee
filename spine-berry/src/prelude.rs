//! 🦴欢迎光临🦴
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};
pub use crate::{SpineError, SpineResult};

pub use crate::data::{CtVolume, ImgWriteVis, OwnedScanSlice, ScanSlice};

pub use crate::consts::{Vertebra, VERTEBRAE};

pub use crate::transform::{enhance_edges, equalize_contrast, wavelet_round_trip, Wavelet};

pub use crate::pipeline::{StageConfig, VolumeProcessor};

pub use crate::table::{DetectionRow, DetectionTable, VertebraSet};

pub use crate::detect::{Thresholds, VertebraClassifier};

pub use crate::sequence::{extract_sequences, SequenceMap};

#[cfg(feature = "rayon")]
pub use crate::sequence::par_extract_sequences;

#[cfg(feature = "serde")]
pub use crate::output::{save_detection_results, save_sequences};
