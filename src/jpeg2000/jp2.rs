//! JP2 Box structure implementation (ISO/IEC 15444-1 Annex I).
//!
//! The writer wraps a finished codestream in the minimal box sequence of a
//! conforming JP2 file: signature, file type, JP2 header (image header,
//! colour specification and, for mixed depths, bits per component) and the
//! contiguous codestream box. The reader walks the same boxes back.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::debug;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::constants::{
    BITS_PER_COMPONENT_BOX_BASE_LENGTH, BITS_PER_COMPONENT_VARIES, BOX_HEADER_LENGTH,
    COLOUR_SPECIFICATION_APPROXIMATION, COLOUR_SPECIFICATION_BOX_LENGTH,
    COLOUR_SPECIFICATION_METHOD, COLOUR_SPECIFICATION_PRECEDENCE, FILE_TYPE_BOX_LENGTH,
    FILE_TYPE_BRAND, FILE_TYPE_MINOR_VERSION, IMAGE_HEADER_BOX_LENGTH,
    IMAGE_HEADER_COMPRESSION_TYPE, IMAGE_HEADER_IPR, IMAGE_HEADER_UNKNOWN_COLOURSPACE,
    JP2_SIGNATURE_CONTENT, MAXIMUM_BITS_PER_COMPONENT, MAXIMUM_COMPONENT_COUNT,
    MINIMUM_BITS_PER_COMPONENT, MINIMUM_COMPONENT_COUNT, SIGNATURE_BOX_LENGTH,
};
use crate::error::{J2kError, J2kResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum BoxType {
    /// 'jP\040\040'
    Signature = 0x6A50_2020,
    /// 'ftyp'
    FileType = 0x6674_7970,
    /// 'jp2h', a superbox.
    Jp2Header = 0x6A70_3268,
    /// 'ihdr'
    ImageHeader = 0x6968_6472,
    /// 'bpcc'
    BitsPerComponent = 0x6270_6363,
    /// 'colr'
    ColourSpecification = 0x636F_6C72,
    /// 'jp2c'
    ContiguousCodestream = 0x6A70_3263,
}

/// Enumerated colourspaces of the colour specification box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum EnumColourSpace {
    Srgb = 16,
    Greyscale = 17,
}

/// Image properties recorded in the JP2 header box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jp2Header {
    pub width: u32,
    pub height: u32,
    /// Bit depth of every component; its length is the component count.
    pub bits_per_component: Vec<u8>,
}

impl Jp2Header {
    pub fn new(width: u32, height: u32, bits_per_component: Vec<u8>) -> J2kResult<Self> {
        let header = Self {
            width,
            height,
            bits_per_component,
        };
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> J2kResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(J2kError::config(format!(
                "image size {}x{} is empty",
                self.width, self.height
            )));
        }
        let nc = self.bits_per_component.len();
        if !(MINIMUM_COMPONENT_COUNT..=MAXIMUM_COMPONENT_COUNT).contains(&nc) {
            return Err(J2kError::config(format!(
                "{nc} components, expected {MINIMUM_COMPONENT_COUNT} to {MAXIMUM_COMPONENT_COUNT}"
            )));
        }
        if let Some(bpc) = self
            .bits_per_component
            .iter()
            .find(|&&b| !(MINIMUM_BITS_PER_COMPONENT..=MAXIMUM_BITS_PER_COMPONENT).contains(&b))
        {
            return Err(J2kError::config(format!(
                "{bpc} bits per component, expected {MINIMUM_BITS_PER_COMPONENT} to {MAXIMUM_BITS_PER_COMPONENT}"
            )));
        }
        Ok(())
    }

    pub fn num_components(&self) -> u16 {
        // Bounded by MAXIMUM_COMPONENT_COUNT once validated.
        self.bits_per_component.len() as u16
    }

    pub fn bits_per_component_varies(&self) -> bool {
        self.bits_per_component
            .iter()
            .any(|&b| b != self.bits_per_component[0])
    }

    pub fn colour_space(&self) -> EnumColourSpace {
        if self.bits_per_component.len() > 1 {
            EnumColourSpace::Srgb
        } else {
            EnumColourSpace::Greyscale
        }
    }

    fn bits_per_component_box_length(&self) -> usize {
        BITS_PER_COMPONENT_BOX_BASE_LENGTH + self.bits_per_component.len()
    }

    fn header_box_length(&self) -> usize {
        let mut length =
            BOX_HEADER_LENGTH + IMAGE_HEADER_BOX_LENGTH + COLOUR_SPECIFICATION_BOX_LENGTH;
        if self.bits_per_component_varies() {
            length += self.bits_per_component_box_length();
        }
        length
    }

    /// Number of bytes the container adds around the codestream.
    pub fn overhead(&self) -> usize {
        SIGNATURE_BOX_LENGTH + FILE_TYPE_BOX_LENGTH + self.header_box_length() + BOX_HEADER_LENGTH
    }
}

fn codestream_box_length(codestream_len: usize) -> J2kResult<u32> {
    codestream_len
        .checked_add(BOX_HEADER_LENGTH)
        .and_then(|l| u32::try_from(l).ok())
        .ok_or_else(|| {
            J2kError::config(format!(
                "codestream of {codestream_len} bytes does not fit in a contiguous codestream box"
            ))
        })
}

/// Writes JP2 boxes to a byte sink, counting the bytes written.
pub struct Jp2Writer<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> Jp2Writer<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    fn write_all(&mut self, bytes: &[u8]) -> J2kResult<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len();
        Ok(())
    }

    fn write_u8(&mut self, value: u8) -> J2kResult<()> {
        self.write_all(&[value])
    }

    fn write_u16(&mut self, value: u16) -> J2kResult<()> {
        self.write_all(&value.to_be_bytes())
    }

    fn write_u32(&mut self, value: u32) -> J2kResult<()> {
        self.write_all(&value.to_be_bytes())
    }

    fn write_box_header(&mut self, length: usize, box_type: BoxType) -> J2kResult<()> {
        let length = u32::try_from(length)
            .map_err(|_| J2kError::config(format!("box length {length} exceeds 32 bits")))?;
        self.write_u32(length)?;
        self.write_u32(box_type.into())
    }

    pub fn write_signature_box(&mut self) -> J2kResult<()> {
        self.write_box_header(SIGNATURE_BOX_LENGTH, BoxType::Signature)?;
        self.write_u32(JP2_SIGNATURE_CONTENT)
    }

    pub fn write_file_type_box(&mut self) -> J2kResult<()> {
        self.write_box_header(FILE_TYPE_BOX_LENGTH, BoxType::FileType)?;
        self.write_u32(FILE_TYPE_BRAND)?;
        self.write_u32(FILE_TYPE_MINOR_VERSION)?;
        // Compatibility list
        self.write_u32(FILE_TYPE_BRAND)
    }

    /// Writes the JP2 header superbox with its nested boxes.
    ///
    /// Every header box checks the header first and writes nothing for an
    /// invalid one.
    pub fn write_header_box(&mut self, header: &Jp2Header) -> J2kResult<()> {
        header.validate()?;
        self.write_box_header(header.header_box_length(), BoxType::Jp2Header)?;
        self.write_image_header_box(header)?;
        self.write_colour_specification_box(header)?;
        if header.bits_per_component_varies() {
            self.write_bits_per_component_box(header)?;
        }
        Ok(())
    }

    pub fn write_image_header_box(&mut self, header: &Jp2Header) -> J2kResult<()> {
        header.validate()?;
        self.write_box_header(IMAGE_HEADER_BOX_LENGTH, BoxType::ImageHeader)?;
        self.write_u32(header.height)?;
        self.write_u32(header.width)?;
        self.write_u16(header.num_components())?;
        let bpc = if header.bits_per_component_varies() {
            BITS_PER_COMPONENT_VARIES
        } else {
            header.bits_per_component[0] - 1
        };
        self.write_u8(bpc)?;
        self.write_u8(IMAGE_HEADER_COMPRESSION_TYPE)?;
        self.write_u8(IMAGE_HEADER_UNKNOWN_COLOURSPACE)?;
        self.write_u8(IMAGE_HEADER_IPR)
    }

    pub fn write_colour_specification_box(&mut self, header: &Jp2Header) -> J2kResult<()> {
        header.validate()?;
        self.write_box_header(COLOUR_SPECIFICATION_BOX_LENGTH, BoxType::ColourSpecification)?;
        self.write_u8(COLOUR_SPECIFICATION_METHOD)?;
        self.write_u8(COLOUR_SPECIFICATION_PRECEDENCE)?;
        self.write_u8(COLOUR_SPECIFICATION_APPROXIMATION)?;
        self.write_u32(header.colour_space().into())
    }

    pub fn write_bits_per_component_box(&mut self, header: &Jp2Header) -> J2kResult<()> {
        header.validate()?;
        self.write_box_header(
            header.bits_per_component_box_length(),
            BoxType::BitsPerComponent,
        )?;
        for &bpc in &header.bits_per_component {
            self.write_u8(bpc - 1)?;
        }
        Ok(())
    }

    pub fn write_codestream_box(&mut self, codestream: &[u8]) -> J2kResult<()> {
        let length = codestream_box_length(codestream.len())?;
        self.write_u32(length)?;
        self.write_u32(BoxType::ContiguousCodestream.into())?;
        self.write_all(codestream)
    }

    pub fn bytes_written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Writes a complete JP2 file and returns its size in bytes.
pub fn write_jp2<W: Write>(sink: W, codestream: &[u8], header: &Jp2Header) -> J2kResult<usize> {
    header.validate()?;
    // Fail before writing anything.
    codestream_box_length(codestream.len())?;

    let mut writer = Jp2Writer::new(sink);
    writer.write_signature_box()?;
    writer.write_file_type_box()?;
    writer.write_header_box(header)?;
    writer.write_codestream_box(codestream)?;
    writer.inner.flush()?;

    debug!(
        "JP2 container: {}x{}, {} components, {} bytes of codestream, {} bytes total",
        header.width,
        header.height,
        header.bits_per_component.len(),
        codestream.len(),
        writer.bytes_written()
    );
    Ok(writer.bytes_written())
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.jp2-tmp"))
}

/// Writes a JP2 file next to `path` and renames it over `path` once it is
/// complete, so that `path` is either untouched or fully written.
pub fn write_jp2_file(path: &Path, codestream: &[u8], header: &Jp2Header) -> J2kResult<usize> {
    let temporary = temporary_sibling(path);
    let result = File::create(&temporary)
        .map_err(J2kError::from)
        .and_then(|file| {
            let mut sink = BufWriter::new(file);
            let written = write_jp2(&mut sink, codestream, header)?;
            let file = sink.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            Ok(written)
        })
        .and_then(|written| {
            fs::rename(&temporary, path)?;
            Ok(written)
        });

    if result.is_err() {
        let _ = fs::remove_file(&temporary);
    }
    result
}

/// Replaces the raw codestream stored at `path` with its JP2 wrapping.
pub fn wrap_codestream_file(path: &Path, header: &Jp2Header) -> J2kResult<usize> {
    // The whole codestream is read before the file is replaced.
    let codestream = fs::read(path)?;
    write_jp2_file(path, &codestream, header)
}

const SIGNATURE_BOX: [u8; 12] = *b"\x00\x00\x00\x0CjP  \r\n\x87\n";

pub fn is_jp2(data: &[u8]) -> bool {
    data.starts_with(&SIGNATURE_BOX)
}

pub struct Jp2Box {
    pub length: u64,
    pub box_type: [u8; 4],
    pub data_range: Range<usize>,
}

impl Jp2Box {
    /// The box type, if it is one this crate knows.
    pub fn kind(&self) -> Option<BoxType> {
        BoxType::try_from(u32::from_be_bytes(self.box_type)).ok()
    }
}

fn read_u16(data: &[u8], at: usize) -> J2kResult<u16> {
    data.get(at..at + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_be_bytes)
        .ok_or(J2kError::InvalidData("truncated box"))
}

fn read_u32(data: &[u8], at: usize) -> J2kResult<u32> {
    data.get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or(J2kError::InvalidData("truncated box"))
}

fn read_u64(data: &[u8], at: usize) -> J2kResult<u64> {
    data.get(at..at + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_be_bytes)
        .ok_or(J2kError::InvalidData("truncated box"))
}

pub struct Jp2Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Jp2Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn find_codestream(&mut self) -> J2kResult<Option<&'a [u8]>> {
        self.rewind();
        if !is_jp2(self.data) {
            return Ok(None);
        }

        while let Some(b) = self.read_box()? {
            if b.kind() == Some(BoxType::ContiguousCodestream) {
                return Ok(Some(&self.data[b.data_range]));
            }
        }
        Ok(None)
    }

    /// Reads the image header, colour specification and bits per component
    /// boxes back into a [`Jp2Header`].
    pub fn read_header(&mut self) -> J2kResult<Option<Jp2Header>> {
        self.rewind();
        if !is_jp2(self.data) {
            return Ok(None);
        }

        while let Some(b) = self.read_box()? {
            if b.kind() == Some(BoxType::Jp2Header) {
                return parse_header_box(&self.data[b.data_range]).map(Some);
            }
        }
        Err(J2kError::InvalidData("missing JP2 header box"))
    }

    pub fn read_box(&mut self) -> J2kResult<Option<Jp2Box>> {
        if self.position + BOX_HEADER_LENGTH > self.data.len() {
            return Ok(None);
        }

        let start_pos = self.position;
        let mut length = u64::from(read_u32(self.data, start_pos)?);
        let box_type = self.data[start_pos + 4..start_pos + 8]
            .try_into()
            .map_err(|_| J2kError::InvalidData("truncated box"))?;
        let mut header_size = BOX_HEADER_LENGTH;

        if length == 1 {
            // XLBox follows the type
            length = read_u64(self.data, start_pos + BOX_HEADER_LENGTH)?;
            header_size += 8;
        } else if length == 0 {
            length = (self.data.len() - start_pos) as u64;
        }

        if length < header_size as u64 {
            return Err(J2kError::InvalidData("box shorter than its header"));
        }
        let data_end = usize::try_from(length)
            .ok()
            .and_then(|l| start_pos.checked_add(l))
            .filter(|&end| end <= self.data.len())
            .ok_or(J2kError::InvalidData("box extends past the end of data"))?;

        self.position = data_end;

        Ok(Some(Jp2Box {
            length,
            box_type,
            data_range: start_pos + header_size..data_end,
        }))
    }
}

fn parse_header_box(data: &[u8]) -> J2kResult<Jp2Header> {
    let mut reader = Jp2Reader::new(data);
    let mut image_header = None;
    let mut colour_space = None;
    let mut depths = None;

    while let Some(b) = reader.read_box()? {
        let payload = &data[b.data_range.clone()];
        match b.kind() {
            Some(BoxType::ImageHeader) => {
                let height = read_u32(payload, 0)?;
                let width = read_u32(payload, 4)?;
                let nc = read_u16(payload, 8)?;
                let bpc = *payload
                    .get(10)
                    .ok_or(J2kError::InvalidData("truncated image header box"))?;
                if payload.get(11) != Some(&IMAGE_HEADER_COMPRESSION_TYPE) {
                    return Err(J2kError::InvalidData("unsupported compression type"));
                }
                image_header = Some((height, width, nc, bpc));
            }
            Some(BoxType::ColourSpecification) => {
                if payload.first() != Some(&COLOUR_SPECIFICATION_METHOD) {
                    return Err(J2kError::InvalidData("colour specification is not enumerated"));
                }
                let value = read_u32(payload, 3)?;
                colour_space = Some(
                    EnumColourSpace::try_from(value)
                        .map_err(|_| J2kError::InvalidData("unsupported enumerated colourspace"))?,
                );
            }
            Some(BoxType::BitsPerComponent) => {
                depths = Some(payload.iter().map(|&b| (b & 0x7F) + 1).collect::<Vec<u8>>());
            }
            _ => {}
        }
    }

    let (height, width, nc, bpc) =
        image_header.ok_or(J2kError::InvalidData("missing image header box"))?;
    if colour_space.is_none() {
        return Err(J2kError::InvalidData("missing colour specification box"));
    }
    let bits_per_component = if bpc == BITS_PER_COMPONENT_VARIES {
        let depths = depths.ok_or(J2kError::InvalidData("missing bits per component box"))?;
        if depths.len() != usize::from(nc) {
            return Err(J2kError::InvalidData(
                "bits per component box does not match the component count",
            ));
        }
        depths
    } else {
        vec![(bpc & 0x7F) + 1; usize::from(nc)]
    };

    let header = Jp2Header {
        width,
        height,
        bits_per_component,
    };
    header
        .validate()
        .map_err(|_| J2kError::InvalidData("invalid image header box"))?;
    Ok(header)
}
