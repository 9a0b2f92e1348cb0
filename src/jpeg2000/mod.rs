//! JPEG 2000 encoder control plane (Part 1, ISO/IEC 15444-1)
//!
//! This module holds everything between the numeric transform stages and the
//! file on disk:
//!
//! - `spec_grid`: Per tile-component resolution of encoding parameters.
//! - `encoder_specs`: The parameter families built on `spec_grid`.
//! - `layers`: Quality layer targets for rate allocation.
//! - `bit_io`: Bit-stuffed raw output of entropy coded segments.
//! - `roi_mask`: Subband tree routing ROI rectangles to coefficients.
//! - `jp2`: JP2 container writer and reader.

pub mod bit_io;
pub mod encoder_specs;
pub mod jp2;
pub mod layers;
pub mod roi_mask;
pub mod spec_grid;
