//! Center-window reader for Cloud Optimized GeoTIFF bands.
//!
//! Reads only the bytes needed for a window at the center of the full
//! resolution image: the header and first IFD from a prefix fetch, then
//! each tile or strip intersecting the sampled rows and columns, each
//! fetched once.
//!
//! # Window
//!
//! ```text
//! win  = min(height, width, resolution × oversample)
//! top  = (height - win) / 2,  left = (width - win) / 2
//! step = max(1, win / resolution)
//! rows = top, top + step, ...   (at most `resolution`, inside the window)
//! ```
//!
//! Supported layouts: classic TIFF (not BigTIFF), tiled or stripped,
//! uncompressed or DEFLATE, horizontal predictor, integer or float samples.
//! Only the first sample of each pixel is read.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};
use ndarray::Array2;
use tracing::debug;

use crate::provider::{HttpClient, ProviderError};

/// Bytes fetched up front; enough for the header and IFD of a typical COG.
const PREFIX_BYTES: u64 = 64 * 1024;

/// TIFF tag IDs used by the reader.
mod tags {
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const STRIP_OFFSETS: u16 = 273;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const ROWS_PER_STRIP: u16 = 278;
    pub const STRIP_BYTE_COUNTS: u16 = 279;
    pub const PLANAR_CONFIG: u16 = 284;
    pub const PREDICTOR: u16 = 317;
    pub const TILE_WIDTH: u16 = 322;
    pub const TILE_LENGTH: u16 = 323;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;
    pub const SAMPLE_FORMAT: u16 = 339;
}

mod compression {
    pub const NONE: u16 = 1;
    pub const DEFLATE: u16 = 8;
    pub const ADOBE_DEFLATE: u16 = 32946;
}

mod sample_format {
    pub const SIGNED_INT: u16 = 2;
    pub const FLOAT: u16 = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, b: &[u8]) -> u16 {
        let b = [b[0], b[1]];
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        let b = [b[0], b[1], b[2], b[3]];
        match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }

    fn u64(self, b: &[u8]) -> u64 {
        let mut a = [0u8; 8];
        a.copy_from_slice(&b[..8]);
        match self {
            ByteOrder::Little => u64::from_le_bytes(a),
            ByteOrder::Big => u64::from_be_bytes(a),
        }
    }

    /// Reads an unsigned integer of `size` bytes (1, 2, 4 or 8).
    fn uint(self, b: &[u8], size: usize) -> u64 {
        match size {
            1 => b[0] as u64,
            2 => self.u16(b) as u64,
            4 => self.u32(b) as u64,
            _ => self.u64(b),
        }
    }
}

/// Byte size of a TIFF field type, for the integer types the reader uses.
fn type_size(type_id: u16) -> Option<usize> {
    match type_id {
        1 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 => Some(4),
        16 => Some(8),
        _ => None,
    }
}

/// One IFD entry with its raw 4-byte value field.
#[derive(Debug, Clone)]
struct TagEntry {
    type_id: u16,
    count: u32,
    field: [u8; 4],
}

/// Remote file with a cached prefix.
struct RangeSource<'a, C: HttpClient> {
    http: &'a C,
    url: &'a str,
    prefix: Vec<u8>,
}

impl<'a, C: HttpClient> RangeSource<'a, C> {
    fn open(http: &'a C, url: &'a str) -> Result<Self, ProviderError> {
        let prefix = http.get_range(url, 0, PREFIX_BYTES)?;
        Ok(Self { http, url, prefix })
    }

    /// Returns `len` bytes at `offset`, from the prefix when it covers them.
    fn read(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>, ProviderError> {
        let end = offset as usize + len;
        if end <= self.prefix.len() {
            return Ok(Cow::Borrowed(&self.prefix[offset as usize..end]));
        }
        let bytes = self.http.get_range(self.url, offset, len as u64)?;
        if bytes.len() < len {
            return Err(ProviderError::InvalidResponse(format!(
                "{}: expected {} bytes at offset {}, got {}",
                self.url,
                len,
                offset,
                bytes.len()
            )));
        }
        Ok(Cow::Owned(bytes))
    }
}

/// How the image is cut into independently compressed chunks.
#[derive(Debug, Clone, PartialEq)]
struct ChunkGrid {
    chunk_width: u32,
    chunk_height: u32,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    /// Strips end at the image edge; tiles are always full size.
    tiled: bool,
}

/// Everything needed to decode samples from the first IFD.
#[derive(Debug, Clone, PartialEq)]
struct RasterLayout {
    order: ByteOrder,
    width: u32,
    height: u32,
    bits_per_sample: u16,
    sample_format: u16,
    compression: u16,
    predictor: u16,
    samples_per_pixel: u16,
    grid: ChunkGrid,
}

impl RasterLayout {
    fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample / 8) as usize
    }

    fn chunks_across(&self) -> u32 {
        self.width.div_ceil(self.grid.chunk_width)
    }

    /// Rows actually stored in chunk row `chunk_row`.
    fn rows_in_chunk(&self, chunk_row: u32) -> u32 {
        if self.grid.tiled {
            return self.grid.chunk_height;
        }
        let start = chunk_row * self.grid.chunk_height;
        self.grid.chunk_height.min(self.height - start)
    }
}

/// Parses the TIFF header and first IFD.
fn read_layout<C: HttpClient>(source: &RangeSource<'_, C>) -> Result<RasterLayout, ProviderError> {
    let header = source.read(0, 8)?;
    let order = match (header[0], header[1]) {
        (b'I', b'I') => ByteOrder::Little,
        (b'M', b'M') => ByteOrder::Big,
        _ => {
            return Err(ProviderError::UnsupportedRaster(
                "not a TIFF file".to_string(),
            ))
        }
    };
    match order.u16(&header[2..4]) {
        42 => {}
        43 => {
            return Err(ProviderError::UnsupportedRaster(
                "BigTIFF is not supported".to_string(),
            ))
        }
        magic => {
            return Err(ProviderError::UnsupportedRaster(format!(
                "unexpected TIFF magic {}",
                magic
            )))
        }
    }
    let ifd_offset = order.u32(&header[4..8]) as u64;

    let count = order.u16(&source.read(ifd_offset, 2)?) as usize;
    let ifd = source.read(ifd_offset + 2, count * 12)?;
    let mut entries = HashMap::with_capacity(count);
    for raw in ifd.chunks_exact(12) {
        let mut field = [0u8; 4];
        field.copy_from_slice(&raw[8..12]);
        entries.insert(
            order.u16(&raw[0..2]),
            TagEntry {
                type_id: order.u16(&raw[2..4]),
                count: order.u32(&raw[4..8]),
                field,
            },
        );
    }

    let values = |tag: u16| -> Result<Option<Vec<u64>>, ProviderError> {
        entries
            .get(&tag)
            .map(|entry| tag_values(source, order, tag, entry))
            .transpose()
    };
    let scalar = |tag: u16, default: Option<u64>| -> Result<u64, ProviderError> {
        match values(tag)?.and_then(|v| v.first().copied()).or(default) {
            Some(v) => Ok(v),
            None => Err(ProviderError::UnsupportedRaster(format!(
                "missing required tag {}",
                tag
            ))),
        }
    };

    let width = scalar(tags::IMAGE_WIDTH, None)? as u32;
    let height = scalar(tags::IMAGE_LENGTH, None)? as u32;
    let bits_per_sample = scalar(tags::BITS_PER_SAMPLE, Some(1))? as u16;
    let sample_format = scalar(tags::SAMPLE_FORMAT, Some(1))? as u16;
    let compression = scalar(tags::COMPRESSION, Some(1))? as u16;
    let predictor = scalar(tags::PREDICTOR, Some(1))? as u16;
    let samples_per_pixel = scalar(tags::SAMPLES_PER_PIXEL, Some(1))? as u16;
    let planar = scalar(tags::PLANAR_CONFIG, Some(1))? as u16;

    let grid = if entries.contains_key(&tags::TILE_OFFSETS) {
        ChunkGrid {
            chunk_width: scalar(tags::TILE_WIDTH, None)? as u32,
            chunk_height: scalar(tags::TILE_LENGTH, None)? as u32,
            offsets: values(tags::TILE_OFFSETS)?.unwrap_or_default(),
            byte_counts: values(tags::TILE_BYTE_COUNTS)?.unwrap_or_default(),
            tiled: true,
        }
    } else {
        ChunkGrid {
            chunk_width: width,
            chunk_height: (scalar(tags::ROWS_PER_STRIP, Some(height as u64))? as u32)
                .min(height),
            offsets: values(tags::STRIP_OFFSETS)?.unwrap_or_default(),
            byte_counts: values(tags::STRIP_BYTE_COUNTS)?.unwrap_or_default(),
            tiled: false,
        }
    };

    if width == 0 || height == 0 || grid.chunk_width == 0 || grid.chunk_height == 0 {
        return Err(ProviderError::UnsupportedRaster(
            "zero-sized image or chunk".to_string(),
        ));
    }
    if !matches!(bits_per_sample, 8 | 16 | 32 | 64) {
        return Err(ProviderError::UnsupportedRaster(format!(
            "{} bits per sample",
            bits_per_sample
        )));
    }
    if sample_format == sample_format::FLOAT && !matches!(bits_per_sample, 32 | 64) {
        return Err(ProviderError::UnsupportedRaster(format!(
            "{}-bit floating point samples",
            bits_per_sample
        )));
    }
    if !matches!(
        compression,
        compression::NONE | compression::DEFLATE | compression::ADOBE_DEFLATE
    ) {
        return Err(ProviderError::UnsupportedRaster(format!(
            "compression {}",
            compression
        )));
    }
    if predictor > 2 || (predictor == 2 && sample_format == sample_format::FLOAT) {
        return Err(ProviderError::UnsupportedRaster(format!(
            "predictor {}",
            predictor
        )));
    }
    if grid.offsets.is_empty() || grid.offsets.len() != grid.byte_counts.len() {
        return Err(ProviderError::UnsupportedRaster(
            "chunk offsets and byte counts disagree".to_string(),
        ));
    }

    // With separate planes the first plane's chunks come first.
    let samples_per_pixel = if planar == 2 { 1 } else { samples_per_pixel.max(1) };

    Ok(RasterLayout {
        order,
        width,
        height,
        bits_per_sample,
        sample_format,
        compression,
        predictor,
        samples_per_pixel,
        grid,
    })
}

/// Resolves an entry's values, inline or out of line.
fn tag_values<C: HttpClient>(
    source: &RangeSource<'_, C>,
    order: ByteOrder,
    tag: u16,
    entry: &TagEntry,
) -> Result<Vec<u64>, ProviderError> {
    let size = type_size(entry.type_id).ok_or_else(|| {
        ProviderError::UnsupportedRaster(format!("tag {} has field type {}", tag, entry.type_id))
    })?;
    let total = size * entry.count as usize;
    let bytes: Cow<'_, [u8]> = if total <= 4 {
        Cow::Borrowed(&entry.field[..total])
    } else {
        source.read(order.u32(&entry.field) as u64, total)?
    };
    Ok(bytes.chunks_exact(size).map(|b| order.uint(b, size)).collect())
}

/// Inflates a DEFLATE chunk, accepting zlib-wrapped or raw streams.
fn inflate(data: &[u8], expected: usize) -> Result<Vec<u8>, ProviderError> {
    let mut out = Vec::with_capacity(expected);
    if ZlibDecoder::new(data).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }
    out.clear();
    DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| ProviderError::Decode(format!("DEFLATE: {}", e)))?;
    Ok(out)
}

/// Reverses horizontal differencing on one row of integer samples.
fn undo_predictor(row: &mut [u64], samples_per_pixel: usize, bits: u16) {
    let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    for i in samples_per_pixel..row.len() {
        row[i] = row[i].wrapping_add(row[i - samples_per_pixel]) & mask;
    }
}

/// Converts the raw bits of one sample to `f32`.
fn sample_to_f32(raw: u64, bits: u16, format: u16) -> f32 {
    match (format, bits) {
        (sample_format::FLOAT, 32) => f32::from_bits(raw as u32),
        (sample_format::FLOAT, _) => f64::from_bits(raw) as f32,
        (sample_format::SIGNED_INT, 8) => raw as u8 as i8 as f32,
        (sample_format::SIGNED_INT, 16) => raw as u16 as i16 as f32,
        (sample_format::SIGNED_INT, 32) => raw as u32 as i32 as f32,
        (sample_format::SIGNED_INT, _) => raw as i64 as f32,
        _ => raw as f32,
    }
}

/// First-sample values of one decoded chunk, row-major.
struct DecodedChunk {
    width: usize,
    values: Vec<f32>,
}

fn decode_chunk<C: HttpClient>(
    source: &RangeSource<'_, C>,
    layout: &RasterLayout,
    index: usize,
    chunk_row: u32,
) -> Result<DecodedChunk, ProviderError> {
    let offset = layout.grid.offsets[index];
    let length = layout.grid.byte_counts[index] as usize;
    let spp = layout.samples_per_pixel as usize;
    let bps = layout.bytes_per_sample();
    let width = layout.grid.chunk_width as usize;
    let rows = layout.rows_in_chunk(chunk_row) as usize;
    let row_bytes = width * spp * bps;
    let expected = row_bytes * rows;

    let stored = source.read(offset, length)?;
    let raw: Cow<'_, [u8]> = match layout.compression {
        compression::NONE => stored,
        _ => Cow::Owned(inflate(&stored, expected)?),
    };
    if raw.len() < expected {
        return Err(ProviderError::Decode(format!(
            "chunk {} holds {} bytes, expected {}",
            index,
            raw.len(),
            expected
        )));
    }

    let mut values = Vec::with_capacity(width * rows);
    let mut row = vec![0u64; width * spp];
    for r in 0..rows {
        let bytes = &raw[r * row_bytes..(r + 1) * row_bytes];
        for (slot, b) in row.iter_mut().zip(bytes.chunks_exact(bps)) {
            *slot = layout.order.uint(b, bps);
        }
        if layout.predictor == 2 {
            undo_predictor(&mut row, spp, layout.bits_per_sample);
        }
        values.extend(
            row.iter()
                .step_by(spp)
                .map(|&v| sample_to_f32(v, layout.bits_per_sample, layout.sample_format)),
        );
    }

    Ok(DecodedChunk { width, values })
}

/// Reads a strided center window of the band at `url`.
///
/// Returns at most `resolution × resolution` samples; fewer when the image
/// is smaller than the requested resolution.
pub fn read_center_window<C: HttpClient>(
    http: &C,
    url: &str,
    resolution: u32,
    oversample: u32,
) -> Result<Array2<f32>, ProviderError> {
    let source = RangeSource::open(http, url)?;
    let layout = read_layout(&source)?;

    let win = layout
        .height
        .min(layout.width)
        .min(resolution.saturating_mul(oversample.max(1)));
    let top = (layout.height - win) / 2;
    let left = (layout.width - win) / 2;
    let step = (win / resolution.max(1)).max(1);
    let count = win.div_ceil(step).min(resolution) as usize;

    debug!(
        url,
        width = layout.width,
        height = layout.height,
        win,
        step,
        "Reading COG center window"
    );

    let mut chunks: HashMap<usize, DecodedChunk> = HashMap::new();
    let mut out = Array2::<f32>::zeros((count, count));
    for i in 0..count {
        let y = top + i as u32 * step;
        let chunk_row = y / layout.grid.chunk_height;
        let local_y = (y % layout.grid.chunk_height) as usize;
        for j in 0..count {
            let x = left + j as u32 * step;
            let chunk_col = x / layout.grid.chunk_width;
            let index = (chunk_row * layout.chunks_across() + chunk_col) as usize;
            if index >= layout.grid.offsets.len() {
                return Err(ProviderError::UnsupportedRaster(format!(
                    "chunk {} beyond the {} listed",
                    index,
                    layout.grid.offsets.len()
                )));
            }
            if !chunks.contains_key(&index) {
                let decoded = decode_chunk(&source, &layout, index, chunk_row)?;
                chunks.insert(index, decoded);
            }
            let chunk = &chunks[&index];
            let local_x = (x % layout.grid.chunk_width) as usize;
            out[[i, j]] = chunk.values[local_y * chunk.width + local_x];
        }
    }

    Ok(out)
}
