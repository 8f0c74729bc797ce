//! ASVI (Assay Vector Index) binary format and exact top-k search.
//!
//! Format overview (little-endian):
//!
//! Header (variable size):
//!   Magic: "ASVI" (4 bytes)
//!   Version: u16
//!   EmbedderID length: u16
//!   EmbedderID: bytes
//!   EmbedderRevision length: u16
//!   EmbedderRevision: bytes
//!   Dimension: u32
//!   Quantization: u8 (0=f32, 1=f16)
//!   Count: u32
//!   HeaderCRC32: u32 (CRC32 of header bytes before this field)
//!
//! Vector slab:
//!   Count × Dimension × bytes_per_quant, contiguous, 32-byte aligned.
//!
//! The index is positional: vector `i` of the slab belongs to catalog
//! position `i` in the metadata table. There is no per-vector record block;
//! the position itself is the identity, and breaking the alignment between
//! the two artifacts silently returns wrong results, which is why loaders
//! cross-check counts before serving queries.
//!
//! Search is an exact scan: inner product against every stored vector with a
//! bounded min-heap for top-k selection. SIMD (`wide`) and a Rayon-parallel
//! path keep this fast well past catalog scale.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use half::f16;
use memmap2::Mmap;
use rayon::prelude::*;

pub const ASVI_MAGIC: [u8; 4] = *b"ASVI";
pub const ASVI_VERSION: u16 = 1;
pub const VECTOR_ALIGN_BYTES: usize = 32;
pub const VECTOR_INDEX_DIR: &str = "vector_index";

/// Minimum vector count for parallel search. Below this threshold, Rayon
/// overhead outweighs the parallelism benefit.
const PARALLEL_THRESHOLD: usize = 10_000;

/// Positions per parallel chunk. Smaller chunks balance load better but add
/// scheduling overhead.
const PARALLEL_CHUNK_SIZE: usize = 1024;

/// Cached parallel search enable flag (checked once at first use).
/// Set ASSAY_PARALLEL_SEARCH=0 to disable parallel search.
static PARALLEL_SEARCH_ENABLED: once_cell::sync::Lazy<bool> = once_cell::sync::Lazy::new(|| {
    dotenvy::var("ASSAY_PARALLEL_SEARCH")
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(true)
});

pub fn vector_index_path(data_dir: &Path, embedder_id: &str) -> PathBuf {
    data_dir
        .join(VECTOR_INDEX_DIR)
        .join(format!("index-{embedder_id}.asvi"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantization {
    F32,
    F16,
}

impl Quantization {
    pub fn to_u8(self) -> u8 {
        match self {
            Quantization::F32 => 0,
            Quantization::F16 => 1,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Quantization::F32),
            1 => Ok(Quantization::F16),
            other => bail!("unknown quantization value: {other}"),
        }
    }

    pub fn bytes_per_component(self) -> usize {
        match self {
            Quantization::F32 => 4,
            Quantization::F16 => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsviHeader {
    pub version: u16,
    pub embedder_id: String,
    pub embedder_revision: String,
    pub dimension: u32,
    pub quantization: Quantization,
    pub count: u32,
}

impl AsviHeader {
    pub fn new(
        embedder_id: impl Into<String>,
        embedder_revision: impl Into<String>,
        dimension: u32,
        quantization: Quantization,
        count: u32,
    ) -> Result<Self> {
        let header = Self {
            version: ASVI_VERSION,
            embedder_id: embedder_id.into(),
            embedder_revision: embedder_revision.into(),
            dimension,
            quantization,
            count,
        };
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedder_id.len() > u16::MAX as usize {
            bail!("embedder_id is too long: {}", self.embedder_id.len());
        }
        if self.embedder_revision.len() > u16::MAX as usize {
            bail!(
                "embedder_revision is too long: {}",
                self.embedder_revision.len()
            );
        }
        if self.dimension == 0 {
            bail!("dimension must be non-zero");
        }
        Ok(())
    }

    pub fn header_len_bytes(&self) -> Result<usize> {
        self.validate()?;
        Ok(4 + 2 + 2 + self.embedder_id.len() + 2 + self.embedder_revision.len() + 4 + 1 + 4 + 4)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        self.validate()?;
        let mut buf = Vec::new();

        buf.extend_from_slice(&ASVI_MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());

        let id_bytes = self.embedder_id.as_bytes();
        let id_len =
            u16::try_from(id_bytes.len()).map_err(|_| anyhow!("embedder_id length out of range"))?;
        buf.extend_from_slice(&id_len.to_le_bytes());
        buf.extend_from_slice(id_bytes);

        let rev_bytes = self.embedder_revision.as_bytes();
        let rev_len = u16::try_from(rev_bytes.len())
            .map_err(|_| anyhow!("embedder_revision length out of range"))?;
        buf.extend_from_slice(&rev_len.to_le_bytes());
        buf.extend_from_slice(rev_bytes);

        buf.extend_from_slice(&self.dimension.to_le_bytes());
        buf.push(self.quantization.to_u8());
        buf.extend_from_slice(&self.count.to_le_bytes());

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&buf);
        let crc = hasher.finalize();

        writer.write_all(&buf)?;
        writer.write_all(&crc.to_le_bytes())?;
        Ok(buf.len() + 4)
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut header_bytes = Vec::new();

        let magic =
            read_exact_array::<4, _>(&mut reader, &mut header_bytes).context("read ASVI magic")?;
        if magic != ASVI_MAGIC {
            bail!("invalid ASVI magic: {:?}", magic);
        }

        let version = read_u16_le(&mut reader, &mut header_bytes).context("read ASVI version")?;
        if version != ASVI_VERSION {
            bail!("unsupported ASVI version: {version}");
        }

        let id_len =
            read_u16_le(&mut reader, &mut header_bytes).context("read embedder id length")? as usize;
        let id_bytes =
            read_exact_vec(&mut reader, id_len, &mut header_bytes).context("read embedder id")?;
        let embedder_id = String::from_utf8(id_bytes).context("embedder id is not valid UTF-8")?;

        let rev_len = read_u16_le(&mut reader, &mut header_bytes)
            .context("read embedder revision length")? as usize;
        let rev_bytes = read_exact_vec(&mut reader, rev_len, &mut header_bytes)
            .context("read embedder revision")?;
        let embedder_revision =
            String::from_utf8(rev_bytes).context("embedder revision is not valid UTF-8")?;

        let dimension = read_u32_le(&mut reader, &mut header_bytes).context("read dimension")?;
        let quantization_raw =
            read_u8(&mut reader, &mut header_bytes).context("read quantization")?;
        let quantization = Quantization::from_u8(quantization_raw)?;
        let count = read_u32_le(&mut reader, &mut header_bytes).context("read count")?;

        let crc_expected = read_u32_le_no_accum(&mut reader).context("read header crc")?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header_bytes);
        let crc_actual = hasher.finalize();
        if crc_actual != crc_expected {
            bail!("header CRC mismatch (expected {crc_expected:#010x}, got {crc_actual:#010x})");
        }

        let header = Self {
            version,
            embedder_id,
            embedder_revision,
            dimension,
            quantization,
            count,
        };
        header.validate()?;
        Ok(header)
    }
}

/// One nearest-neighbor hit: a catalog position and its similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub position: usize,
    pub score: f32,
}

#[derive(Debug)]
pub struct VectorIndex {
    header: AsviHeader,
    vectors: VectorStorage,
}

#[derive(Debug)]
enum VectorStorage {
    F32(Vec<f32>),
    F16(Vec<f16>),
    /// F32 data pre-converted from F16 at load time, trading memory for the
    /// per-query conversion cost.
    PreconvertedF32(Vec<f32>),
    Mmap {
        mmap: Mmap,
        offset: usize,
        len: usize,
    },
}

impl VectorIndex {
    /// Build an index from positionally-ordered vectors. Vector `i` must
    /// describe the same catalog item as position `i` of the metadata table.
    pub fn build<I>(
        embedder_id: impl Into<String>,
        embedder_revision: impl Into<String>,
        dimension: usize,
        quantization: Quantization,
        vectors: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<f32>>,
    {
        if dimension == 0 {
            bail!("dimension must be non-zero");
        }
        let dimension_u32 =
            u32::try_from(dimension).map_err(|_| anyhow!("dimension out of range"))?;

        let vectors: Vec<Vec<f32>> = vectors.into_iter().collect();
        let count_u32 =
            u32::try_from(vectors.len()).map_err(|_| anyhow!("vector count out of range"))?;

        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                bail!(
                    "vector {position} dimension mismatch: expected {dimension}, got {}",
                    vector.len()
                );
            }
        }

        let storage = match quantization {
            Quantization::F32 => {
                let mut slab = Vec::with_capacity(vectors.len() * dimension);
                for vector in &vectors {
                    slab.extend(vector.iter().copied());
                }
                VectorStorage::F32(slab)
            }
            Quantization::F16 => {
                let mut slab = Vec::with_capacity(vectors.len() * dimension);
                for vector in &vectors {
                    slab.extend(vector.iter().map(|v| f16::from_f32(*v)));
                }
                VectorStorage::F16(slab)
            }
        };

        let header = AsviHeader::new(
            embedder_id,
            embedder_revision,
            dimension_u32,
            quantization,
            count_u32,
        )?;

        let index = Self {
            header,
            vectors: storage,
        };
        index.validate()?;
        Ok(index)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if cfg!(target_endian = "big") {
            bail!("ASVI load is only supported on little-endian targets");
        }

        let file = File::open(path).with_context(|| format!("open ASVI file {path:?}"))?;
        let metadata = file.metadata().context("read ASVI metadata")?;
        let file_len = metadata.len();
        if file_len == 0 {
            bail!("ASVI file is empty");
        }

        let mmap = unsafe { Mmap::map(&file).context("mmap ASVI file")? };
        let mut cursor = Cursor::new(&mmap[..]);
        let header = AsviHeader::read_from(&mut cursor).context("read ASVI header")?;
        let header_len = header.header_len_bytes()?;
        let slab_offset = vector_slab_offset_bytes(header_len);
        let slab_size =
            vector_slab_size_bytes(header.count, header.dimension, header.quantization)?;

        let expected_len = slab_offset
            .checked_add(slab_size)
            .ok_or_else(|| anyhow!("ASVI file size overflow"))?;
        if file_len != expected_len as u64 {
            bail!(
                "ASVI file size mismatch (expected {}, got {})",
                expected_len,
                file_len
            );
        }

        // Pre-convert F16→F32 at load time to eliminate per-query conversion.
        // Set ASSAY_F16_PRECONVERT=0 to keep the mmap + lazy conversion.
        let f16_preconvert_enabled = dotenvy::var("ASSAY_F16_PRECONVERT")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true);

        let vectors = if f16_preconvert_enabled && header.quantization == Quantization::F16 {
            let slab_end = slab_offset
                .checked_add(slab_size)
                .ok_or_else(|| anyhow!("slab offset overflow"))?;
            let slab_bytes = mmap
                .get(slab_offset..slab_end)
                .ok_or_else(|| anyhow!("slab out of bounds"))?;
            let f16_slice = bytes_as_f16(slab_bytes)?;
            let f32_slab: Vec<f32> = f16_slice.iter().map(|v| f32::from(*v)).collect();
            VectorStorage::PreconvertedF32(f32_slab)
        } else {
            VectorStorage::Mmap {
                mmap,
                offset: slab_offset,
                len: slab_size,
            }
        };

        let index = Self { header, vectors };
        index.validate()?;
        Ok(index)
    }

    /// Save atomically: temp file, fsync, rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let temp_path = path.with_extension("asvi.tmp");
        let mut file = File::create(&temp_path)
            .with_context(|| format!("create temp ASVI file {temp_path:?}"))?;
        self.write_to(&mut file)?;
        file.sync_all().context("fsync ASVI temp file")?;
        sync_dir(parent).context("fsync ASVI directory")?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("rename ASVI temp file {temp_path:?}"))?;
        sync_dir(parent).context("fsync ASVI directory post-rename")?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        self.validate()?;
        let header_len = self.header.header_len_bytes()?;
        let written = self.header.write_to(&mut writer)?;
        if written != header_len {
            bail!("header length mismatch: expected {header_len}, wrote {written}");
        }

        let slab_offset = vector_slab_offset_bytes(header_len);
        let padding_len = slab_offset
            .checked_sub(header_len)
            .ok_or_else(|| anyhow!("padding length underflow"))?;
        if padding_len > 0 {
            writer.write_all(&vec![0u8; padding_len])?;
        }

        self.write_vectors_to(&mut writer)?;
        Ok(())
    }

    /// Exact k-nearest search by inner product.
    ///
    /// Returns up to `k` hits ordered by descending score, ties broken by
    /// ascending position for determinism. When `k` exceeds the stored count,
    /// every position is returned.
    pub fn search_top_k(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query_vec.len() != self.header.dimension as usize {
            bail!(
                "query dimension mismatch: expected {}, got {}",
                self.header.dimension,
                query_vec.len()
            );
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let count = self.header.count as usize;
        if *PARALLEL_SEARCH_ENABLED && count >= PARALLEL_THRESHOLD {
            return self.search_top_k_parallel(query_vec, k);
        }
        self.search_top_k_sequential(query_vec, k)
    }

    fn search_top_k_sequential(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let mut heap = BinaryHeap::with_capacity(k + 1);
        for position in 0..self.header.count as usize {
            let score = self.dot_product_at(position, query_vec)?;
            heap.push(std::cmp::Reverse(ScoredEntry { score, position }));
            if heap.len() > k {
                heap.pop();
            }
        }
        Ok(drain_heap(heap))
    }

    /// Parallel scan with thread-local heaps, merged into a final top-k.
    fn search_top_k_parallel(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let count = self.header.count as usize;
        let num_chunks = count.div_ceil(PARALLEL_CHUNK_SIZE);

        let partial_results: Result<Vec<Vec<ScoredEntry>>> = (0..num_chunks)
            .into_par_iter()
            .map(|chunk| {
                let start = chunk * PARALLEL_CHUNK_SIZE;
                let end = (start + PARALLEL_CHUNK_SIZE).min(count);
                let mut local_heap = BinaryHeap::with_capacity(k + 1);
                for position in start..end {
                    let score = self.dot_product_at(position, query_vec)?;
                    local_heap.push(std::cmp::Reverse(ScoredEntry { score, position }));
                    if local_heap.len() > k {
                        local_heap.pop();
                    }
                }
                Ok(local_heap.into_iter().map(|r| r.0).collect())
            })
            .collect();

        let mut final_heap = BinaryHeap::with_capacity(k + 1);
        for entries in partial_results? {
            for entry in entries {
                final_heap.push(std::cmp::Reverse(entry));
                if final_heap.len() > k {
                    final_heap.pop();
                }
            }
        }
        Ok(drain_heap(final_heap))
    }

    /// Read one stored vector back as f32 (tests and diagnostics).
    pub fn vector_at_f32(&self, position: usize) -> Result<Vec<f32>> {
        let dimension = self.header.dimension as usize;
        if position >= self.header.count as usize {
            bail!(
                "position {position} out of bounds (count {})",
                self.header.count
            );
        }
        let start = position * dimension;
        match &self.vectors {
            VectorStorage::F32(values) | VectorStorage::PreconvertedF32(values) => {
                Ok(values[start..start + dimension].to_vec())
            }
            VectorStorage::F16(values) => Ok(values[start..start + dimension]
                .iter()
                .map(|v| f32::from(*v))
                .collect()),
            VectorStorage::Mmap { mmap, offset, .. } => {
                let bytes_per = self.header.quantization.bytes_per_component();
                let base = offset + start * bytes_per;
                let bytes = mmap
                    .get(base..base + dimension * bytes_per)
                    .ok_or_else(|| anyhow!("vector slice out of bounds"))?;
                match self.header.quantization {
                    Quantization::F32 => Ok(bytes_as_f32(bytes)?.to_vec()),
                    Quantization::F16 => {
                        Ok(bytes_as_f16(bytes)?.iter().map(|v| f32::from(*v)).collect())
                    }
                }
            }
        }
    }

    pub fn header(&self) -> &AsviHeader {
        &self.header
    }

    pub fn count(&self) -> usize {
        self.header.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    fn validate(&self) -> Result<()> {
        self.header.validate()?;
        let expected_slab = vector_slab_size_bytes(
            self.header.count,
            self.header.dimension,
            self.header.quantization,
        )?;
        let actual_slab = self.vectors.len_bytes(self.header.quantization)?;
        if expected_slab != actual_slab {
            bail!(
                "vector slab size mismatch: expected {}, got {}",
                expected_slab,
                actual_slab
            );
        }
        Ok(())
    }

    fn write_vectors_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        if cfg!(target_endian = "big") {
            bail!("ASVI write is only supported on little-endian targets");
        }
        match &self.vectors {
            VectorStorage::F32(values) => {
                writer.write_all(f32_as_bytes(values))?;
            }
            VectorStorage::F16(values) => {
                writer.write_all(f16_as_bytes(values))?;
            }
            VectorStorage::PreconvertedF32(values) => {
                // Convert back to F16 for storage (header.quantization == F16).
                let f16_slab: Vec<f16> = values.iter().map(|v| f16::from_f32(*v)).collect();
                writer.write_all(f16_as_bytes(&f16_slab))?;
            }
            VectorStorage::Mmap { mmap, offset, len } => {
                let bytes = mmap
                    .get(*offset..offset + len)
                    .ok_or_else(|| anyhow!("vector slab out of bounds"))?;
                writer.write_all(bytes)?;
            }
        }
        Ok(())
    }

    fn dot_product_at(&self, position: usize, query: &[f32]) -> Result<f32> {
        let start = position * query.len();
        match &self.vectors {
            VectorStorage::F32(values) | VectorStorage::PreconvertedF32(values) => {
                let slice = values
                    .get(start..start + query.len())
                    .ok_or_else(|| anyhow!("vector slice out of bounds"))?;
                Ok(dot_product(slice, query))
            }
            VectorStorage::F16(values) => {
                let slice = values
                    .get(start..start + query.len())
                    .ok_or_else(|| anyhow!("vector slice out of bounds"))?;
                Ok(dot_product_f16(slice, query))
            }
            VectorStorage::Mmap { mmap, offset, len } => {
                let bytes_per = self.header.quantization.bytes_per_component();
                let base = offset + start * bytes_per;
                let byte_len = query.len() * bytes_per;
                if base + byte_len > offset + len {
                    bail!("vector slice out of bounds");
                }
                let bytes = mmap
                    .get(base..base + byte_len)
                    .ok_or_else(|| anyhow!("vector slice out of bounds"))?;
                match self.header.quantization {
                    Quantization::F32 => Ok(dot_product(bytes_as_f32(bytes)?, query)),
                    Quantization::F16 => Ok(dot_product_f16(bytes_as_f16(bytes)?, query)),
                }
            }
        }
    }
}

pub fn vector_slab_offset_bytes(header_len: usize) -> usize {
    align_up(header_len, VECTOR_ALIGN_BYTES)
}

pub fn vector_slab_size_bytes(
    count: u32,
    dimension: u32,
    quantization: Quantization,
) -> Result<usize> {
    let components = (count as usize)
        .checked_mul(dimension as usize)
        .ok_or_else(|| anyhow!("vector slab size overflow"))?;
    components
        .checked_mul(quantization.bytes_per_component())
        .ok_or_else(|| anyhow!("vector slab size overflow"))
}

fn align_up(value: usize, align: usize) -> usize {
    if align == 0 {
        return value;
    }
    let rem = value % align;
    if rem == 0 { value } else { value + (align - rem) }
}

fn drain_heap(heap: BinaryHeap<std::cmp::Reverse<ScoredEntry>>) -> Vec<SearchHit> {
    let mut results: Vec<SearchHit> = heap
        .into_iter()
        .map(|entry| SearchHit {
            position: entry.0.position,
            score: entry.0.score,
        })
        .collect();
    // Deterministic ordering: score desc, then ascending position on ties.
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.position.cmp(&b.position))
    });
    results
}

#[derive(Debug, Clone, Copy)]
struct ScoredEntry {
    score: f32,
    position: usize,
}

impl PartialEq for ScoredEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score.total_cmp(&other.score) == Ordering::Equal && self.position == other.position
    }
}

impl Eq for ScoredEntry {}

impl PartialOrd for ScoredEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // On score ties the larger position orders first for eviction, so the
        // surviving top-k prefers earlier catalog positions.
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.position.cmp(&self.position))
    }
}

impl VectorStorage {
    fn len_bytes(&self, quantization: Quantization) -> Result<usize> {
        match self {
            VectorStorage::F32(values) => {
                if quantization != Quantization::F32 {
                    bail!("vector storage quantization mismatch (expected f32)");
                }
                values
                    .len()
                    .checked_mul(4)
                    .ok_or_else(|| anyhow!("vector slab size overflow"))
            }
            VectorStorage::F16(values) => {
                if quantization != Quantization::F16 {
                    bail!("vector storage quantization mismatch (expected f16)");
                }
                values
                    .len()
                    .checked_mul(2)
                    .ok_or_else(|| anyhow!("vector slab size overflow"))
            }
            VectorStorage::PreconvertedF32(values) => {
                // Pre-converted from F16; report the equivalent F16 byte size.
                if quantization != Quantization::F16 {
                    bail!("vector storage quantization mismatch (expected f16 for preconverted)");
                }
                values
                    .len()
                    .checked_mul(2)
                    .ok_or_else(|| anyhow!("vector slab size overflow"))
            }
            VectorStorage::Mmap { len, .. } => Ok(*len),
        }
    }
}

fn bytes_as_f32(bytes: &[u8]) -> Result<&[f32]> {
    if !bytes.len().is_multiple_of(4) {
        bail!("f32 byte slice length is not a multiple of 4");
    }
    // SAFETY: we validate length and alignment before using the slice as f32.
    let (prefix, aligned, suffix) = unsafe { bytes.align_to::<f32>() };
    if !prefix.is_empty() || !suffix.is_empty() {
        bail!("f32 byte slice is not aligned");
    }
    Ok(aligned)
}

fn bytes_as_f16(bytes: &[u8]) -> Result<&[f16]> {
    if !bytes.len().is_multiple_of(2) {
        bail!("f16 byte slice length is not a multiple of 2");
    }
    // SAFETY: we validate length and alignment before using the slice as f16.
    let (prefix, aligned, suffix) = unsafe { bytes.align_to::<f16>() };
    if !prefix.is_empty() || !suffix.is_empty() {
        bail!("f16 byte slice is not aligned");
    }
    Ok(aligned)
}

fn f32_as_bytes(values: &[f32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(values.as_ptr() as *const u8, values.len() * 4) }
}

fn f16_as_bytes(values: &[f16]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(values.as_ptr() as *const u8, values.len() * 2) }
}

/// Scalar dot product (fallback when SIMD is disabled).
#[inline]
fn dot_product_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// SIMD dot product using the wide crate, 8 floats per iteration.
/// SIMD reorders FP operations, causing ~1e-7 relative error vs scalar;
/// acceptable as it doesn't change ranking order.
#[inline]
fn dot_product_simd(a: &[f32], b: &[f32]) -> f32 {
    use wide::f32x8;

    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let remainder_a = chunks_a.remainder();
    let remainder_b = chunks_b.remainder();

    let mut sum = f32x8::ZERO;
    for (ca, cb) in chunks_a.zip(chunks_b) {
        // SAFETY: chunks_exact guarantees exactly 8 elements.
        let arr_a: [f32; 8] = ca.try_into().unwrap();
        let arr_b: [f32; 8] = cb.try_into().unwrap();
        sum += f32x8::from(arr_a) * f32x8::from(arr_b);
    }

    let mut scalar_sum: f32 = sum.reduce_add();
    for (a, b) in remainder_a.iter().zip(remainder_b) {
        scalar_sum += a * b;
    }
    scalar_sum
}

/// Cached SIMD enable flag (checked once at first use).
/// Set ASSAY_SIMD_DOT=0 to disable.
static SIMD_DOT_ENABLED: once_cell::sync::Lazy<bool> = once_cell::sync::Lazy::new(|| {
    dotenvy::var("ASSAY_SIMD_DOT")
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(true)
});

#[inline]
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if *SIMD_DOT_ENABLED {
        dot_product_simd(a, b)
    } else {
        dot_product_scalar(a, b)
    }
}

#[inline]
fn dot_product_f16(a: &[f16], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| f32::from(*x) * y).sum()
}

/// Bench-only wrapper for the scalar dot product.
#[doc(hidden)]
pub fn dot_product_scalar_bench(a: &[f32], b: &[f32]) -> f32 {
    dot_product_scalar(a, b)
}

/// Bench-only wrapper for the SIMD dot product.
#[doc(hidden)]
pub fn dot_product_simd_bench(a: &[f32], b: &[f32]) -> f32 {
    dot_product_simd(a, b)
}

fn sync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

fn read_u8<R: Read>(reader: &mut R, header_bytes: &mut Vec<u8>) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    header_bytes.extend_from_slice(&buf);
    Ok(buf[0])
}

fn read_u16_le<R: Read>(reader: &mut R, header_bytes: &mut Vec<u8>) -> Result<u16> {
    let buf = read_exact_array::<2, _>(reader, header_bytes)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32_le<R: Read>(reader: &mut R, header_bytes: &mut Vec<u8>) -> Result<u32> {
    let buf = read_exact_array::<4, _>(reader, header_bytes)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u32_le_no_accum<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_exact_vec<R: Read>(
    reader: &mut R,
    len: usize,
    header_bytes: &mut Vec<u8>,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    header_bytes.extend_from_slice(&buf);
    Ok(buf)
}

fn read_exact_array<const N: usize, R: Read>(
    reader: &mut R,
    header_bytes: &mut Vec<u8>,
) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    header_bytes.extend_from_slice(&buf);
    Ok(buf)
}
