//! On-disk `.skm` format: header + raw super-k-mer records.
//! All integers are little-endian; the payload is 8-byte aligned so the
//! mmap reader can view it as `u64` limbs in place.
//!
//! One record is `2*W` limbs: the compacted tail, then the seed strand.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;

use crate::superkmer::EncodedSuperKmer;
use crate::wide::Wide;

pub const SKM_MAGIC: u32 = 0x534B_4D31; // "SKM1"
pub const SKM_VERSION: u32 = 1;

const HEADER_BYTES: usize = 24;

/// Errors of the `.skm` reader/writer.
#[derive(Debug, Error)]
pub enum SkmError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid file format.
    #[error("invalid SKM file: {0}")]
    Format(String),
    /// Payload cast failed.
    #[error("cast error: {0}")]
    Cast(String),
}

/// Fixed-size file header.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    /// K-mer size of the encoded runs.
    pub k: u16,
    /// Minimizer size the runs were split with.
    pub m: u16,
    /// Limbs per value; must match the reader's width.
    pub limbs: u8,
    pub reserved0: u8,
    pub reserved1: u16,
    pub n_records: u64,
}

impl FileHeader {
    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u32::<LE>(self.magic)?;
        w.write_u32::<LE>(self.version)?;
        w.write_u16::<LE>(self.k)?;
        w.write_u16::<LE>(self.m)?;
        w.write_u8(self.limbs)?;
        w.write_u8(self.reserved0)?;
        w.write_u16::<LE>(self.reserved1)?;
        w.write_u64::<LE>(self.n_records)?;
        Ok(())
    }

    pub fn read_from<R: std::io::Read>(r: &mut R) -> std::io::Result<Self> {
        Ok(FileHeader {
            magic: r.read_u32::<LE>()?,
            version: r.read_u32::<LE>()?,
            k: r.read_u16::<LE>()?,
            m: r.read_u16::<LE>()?,
            limbs: r.read_u8()?,
            reserved0: r.read_u8()?,
            reserved1: r.read_u16::<LE>()?,
            n_records: r.read_u64::<LE>()?,
        })
    }

    fn validate<const W: usize>(&self) -> Result<(), SkmError> {
        if self.magic != SKM_MAGIC {
            return Err(SkmError::Format("bad magic".into()));
        }
        if self.version != SKM_VERSION {
            return Err(SkmError::Format("unsupported version".into()));
        }
        if self.limbs as usize != W {
            return Err(SkmError::Format(format!(
                "width mismatch: file has {} limbs, reader expects {}",
                self.limbs, W
            )));
        }
        if self.k as usize >= 32 * W || self.m >= self.k {
            return Err(SkmError::Format(format!(
                "inconsistent sizes: k={}, m={}, limbs={}",
                self.k, self.m, self.limbs
            )));
        }
        Ok(())
    }
}

/// Buffered writer for `.skm` files. The record count is patched into the
/// header on [`finish`].
///
/// [`finish`]: SuperKmerWriter::finish
pub struct SuperKmerWriter<const W: usize> {
    out: BufWriter<File>,
    header: FileHeader,
}

impl<const W: usize> SuperKmerWriter<W> {
    pub fn create(path: &Path, k: usize, m: usize) -> Result<Self, SkmError> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        let header = FileHeader {
            magic: SKM_MAGIC,
            version: SKM_VERSION,
            k: k as u16,
            m: m as u16,
            limbs: W as u8,
            reserved0: 0,
            reserved1: 0,
            n_records: 0,
        };
        header.write_to(&mut out)?;
        Ok(Self { out, header })
    }

    pub fn push(&mut self, record: &EncodedSuperKmer<W>) -> Result<(), SkmError> {
        for &limb in record.compacted.limbs() {
            self.out.write_u64::<LE>(limb)?;
        }
        for &limb in record.seed.limbs() {
            self.out.write_u64::<LE>(limb)?;
        }
        self.header.n_records += 1;
        Ok(())
    }

    /// Flush, patch the record count and close. Returns the count written.
    pub fn finish(self) -> Result<u64, SkmError> {
        let mut file = self
            .out
            .into_inner()
            .map_err(|e| SkmError::Io(e.into_error()))?;
        file.seek(SeekFrom::Start(0))?;
        self.header.write_to(&mut file)?;
        file.sync_all()?;
        Ok(self.header.n_records)
    }
}

/// Read a whole `.skm` file through a buffered stream.
pub fn read_superkmers<const W: usize>(
    path: &Path,
) -> Result<(FileHeader, Vec<EncodedSuperKmer<W>>), SkmError> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = FileHeader::read_from(&mut reader)?;
    header.validate::<W>()?;
    let mut records = Vec::with_capacity(header.n_records as usize);
    let mut limbs = [0u64; W];
    for _ in 0..header.n_records {
        for limb in limbs.iter_mut() {
            *limb = reader.read_u64::<LE>()?;
        }
        let compacted = Wide::from_limbs(limbs);
        for limb in limbs.iter_mut() {
            *limb = reader.read_u64::<LE>()?;
        }
        records.push(EncodedSuperKmer {
            compacted,
            seed: Wide::from_limbs(limbs),
        });
    }
    Ok((header, records))
}

/// Mmap-backed `.skm` file; records are materialized from the mapped
/// payload without an intermediate read pass.
pub struct SuperKmerFile<const W: usize> {
    map: memmap2::Mmap,
    header: FileHeader,
}

impl<const W: usize> SuperKmerFile<W> {
    pub fn open_mmap(path: &Path) -> Result<Self, SkmError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let header = FileHeader::read_from(&mut reader)?;
        header.validate::<W>()?;

        let file = reader.into_inner();
        let map = unsafe { memmap2::MmapOptions::new().map(&file)? };

        let needed = HEADER_BYTES + header.n_records as usize * 2 * W * 8;
        if map.len() < needed {
            return Err(SkmError::Format(format!(
                "truncated payload: {} bytes, {needed} needed",
                map.len()
            )));
        }
        Ok(Self { map, header })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.header.n_records as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.n_records == 0
    }

    fn payload(&self) -> Result<&[u64], SkmError> {
        let end = HEADER_BYTES + self.len() * 2 * W * 8;
        bytemuck::try_cast_slice(&self.map[HEADER_BYTES..end])
            .map_err(|e| SkmError::Cast(format!("{e:?}")))
    }

    /// Iterate the records in file order.
    pub fn iter(&self) -> Result<impl Iterator<Item = EncodedSuperKmer<W>> + '_, SkmError> {
        let limbs = self.payload()?;
        Ok(limbs.chunks_exact(2 * W).map(|chunk| EncodedSuperKmer {
            compacted: Wide::from_limb_slice(&chunk[..W]),
            seed: Wide::from_limb_slice(&chunk[W..]),
        }))
    }
}
