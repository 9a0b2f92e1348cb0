// JP2 file format constants as defined in ISO/IEC 15444-1, Annex I.

/// Content of the JP2 signature box: <CR><LF><0x87><LF>.
pub const JP2_SIGNATURE_CONTENT: u32 = 0x0D0A_870A;

/// Brand and compatibility entry of the file type box: 'jp2\040'.
pub const FILE_TYPE_BRAND: u32 = 0x6A70_3220;
pub const FILE_TYPE_MINOR_VERSION: u32 = 0;

// Box lengths, header (LBox + TBox) included.
pub const BOX_HEADER_LENGTH: usize = 8;
pub const SIGNATURE_BOX_LENGTH: usize = 12;
pub const FILE_TYPE_BOX_LENGTH: usize = 20;
pub const IMAGE_HEADER_BOX_LENGTH: usize = 22;
pub const COLOUR_SPECIFICATION_BOX_LENGTH: usize = 15;

/// Fixed part of a bits per component box; one byte per component follows.
pub const BITS_PER_COMPONENT_BOX_BASE_LENGTH: usize = 8;

/// Compression type of the image header box; 7 is the only value allowed by Part 1.
pub const IMAGE_HEADER_COMPRESSION_TYPE: u8 = 7;
/// 0 when the colourspace is known and signalled by a colour specification box.
pub const IMAGE_HEADER_UNKNOWN_COLOURSPACE: u8 = 0;
/// 0 when no intellectual property box is present.
pub const IMAGE_HEADER_IPR: u8 = 0;

/// Value of the bits per component field when the depth differs between components.
pub const BITS_PER_COMPONENT_VARIES: u8 = 0xFF;

/// Colour specification method 1: enumerated colourspace.
pub const COLOUR_SPECIFICATION_METHOD: u8 = 1;
pub const COLOUR_SPECIFICATION_PRECEDENCE: u8 = 0;
pub const COLOUR_SPECIFICATION_APPROXIMATION: u8 = 0;

pub const MINIMUM_COMPONENT_COUNT: usize = 1;
pub const MAXIMUM_COMPONENT_COUNT: usize = 16384;
pub const MINIMUM_BITS_PER_COMPONENT: u8 = 1;
pub const MAXIMUM_BITS_PER_COMPONENT: u8 = 38;

/// Alternating 0/1 pattern used to pad the last byte of an entropy coded segment.
pub const PAD_SEQUENCE: u8 = 0x2A;

// Parameter family limits (guard bits are signalled in 3 bits of Sqcd).
pub const MAXIMUM_GUARD_BITS: u8 = 7;
pub const MAXIMUM_DECOMPOSITION_LEVELS: u8 = 32;
pub const DEFAULT_GUARD_BITS: u8 = 2;
pub const DEFAULT_DECOMPOSITION_LEVELS: u8 = 5;

// Code-block dimensions are powers of two (Annex A.6.1, xcb and ycb).
pub const MINIMUM_CODE_BLOCK_DIMENSION: u32 = 4;
pub const MAXIMUM_CODE_BLOCK_DIMENSION: u32 = 1024;
pub const MAXIMUM_CODE_BLOCK_AREA: u32 = 4096;
pub const DEFAULT_CODE_BLOCK_DIMENSION: u32 = 64;

/// A multiple component transform applies to the first three components.
pub const COMPONENT_TRANSFORM_COMPONENTS: usize = 3;
