//! Control plane and bitstream assembly for a JPEG 2000 encoder.
//!
//! Parameters are resolved per tile-component by [`SpecGrid`], quality layers
//! are planned by [`LayerPlan`], entropy coded bits go out through
//! [`BitPacker`], ROI masks are looked up in a [`SubbandMaskTree`], and the
//! finished codestream is wrapped in a JP2 container by [`write_jp2`].

pub mod constants;
pub mod error;
pub mod jpeg2000;

pub use error::{J2kError, J2kResult};
pub use jpeg2000::bit_io::{BitPacker, BitUnpacker};
pub use jpeg2000::encoder_specs::{
    CodeBlockSize, ComponentTransform, EncoderOptions, EncoderSpecs, QuantizationType,
    WaveletFilter,
};
pub use jpeg2000::jp2::{
    Jp2Header, Jp2Reader, Jp2Writer, wrap_codestream_file, write_jp2, write_jp2_file,
};
pub use jpeg2000::layers::{LayerPlan, LayerPoint};
pub use jpeg2000::roi_mask::{Rect, SubbandMaskTree};
pub use jpeg2000::spec_grid::{SpecGrid, SpecKind, SpecScope};
