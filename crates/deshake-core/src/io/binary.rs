//! Binary transforms file.
//!
//! Little-endian, packed:
//!
//! ```text
//! file   := "GBLF0001" u16:width u16:height block*
//! block  := "BL" u16:cnt cell{cnt}
//! cell   := "CL" u16:x u16:y dir{5}
//! dir    := i16:meas.x i16:meas.y i16:esti.x i16:esti.y i16:val.x i16:val.y
//!           u16:contrast u16:dist u16:flags
//! ```
//!
//! A block is appended per frame and lists only cells with at least one
//! valid layer; each listed cell bundles all five layer records in the
//! order FAST, SLOW_A, SLOW_B, STATIC_A, STATIC_B.

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;

use crate::detect::cells::{CellGrid, DirVal, LAYER_COUNT};
use crate::error::{DeshakeError, Result};
use crate::geometry::Vec2;

const FILE_MAGIC: &[u8; 8] = b"GBLF0001";
const BLOCK_MAGIC: &[u8; 2] = b"BL";
const CELL_MAGIC: &[u8; 2] = b"CL";

/// One deserialized layer record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirRecord {
    pub value: DirVal,
    pub flags: u16,
}

impl DirRecord {
    pub fn is_valid(&self) -> bool {
        self.flags == 0
    }
}

/// One deserialized cell with its five layer records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellRecord {
    pub position: Vec2<u32>,
    pub directions: [DirRecord; LAYER_COUNT],
}

/// A fully deserialized transforms file.
#[derive(Clone, Debug)]
pub struct MotionFile {
    pub dim: Vec2<u32>,
    pub frames: Vec<Vec<CellRecord>>,
}

/// Streaming writer of the transforms file.
pub struct Serializer<W: Write> {
    w: W,
}

impl Serializer<BufWriter<File>> {
    /// Creates the file and writes the header.
    pub fn create<P: AsRef<Path>>(path: P, dim: Vec2<u32>) -> Result<Self> {
        Self::new(BufWriter::new(File::create(path)?), dim)
    }
}

impl<W: Write> Serializer<W> {
    pub fn new(mut w: W, dim: Vec2<u32>) -> Result<Self> {
        w.write_all(FILE_MAGIC)?;
        w.write_u16::<LittleEndian>(dim.x as u16)?;
        w.write_u16::<LittleEndian>(dim.y as u16)?;
        w.flush()?;
        Ok(Self { w })
    }

    /// Appends one frame block for history slot `slot`.
    pub fn write_frame(&mut self, grid: &CellGrid, slot: usize) -> Result<()> {
        let cnt = grid.valid_count();
        self.w.write_all(BLOCK_MAGIC)?;
        self.w.write_u16::<LittleEndian>(cnt as u16)?;

        if cnt > 0 {
            for cell in &grid.cells {
                if !cell.directions.iter().any(|d| d.is_valid()) {
                    continue;
                }
                self.w.write_all(CELL_MAGIC)?;
                self.w
                    .write_u16::<LittleEndian>(cell.position.x.clamp(0, u16::MAX as i32) as u16)?;
                self.w
                    .write_u16::<LittleEndian>(cell.position.y.clamp(0, u16::MAX as i32) as u16)?;
                for dir in &cell.directions {
                    let v = &dir.velo[slot];
                    write_vec(&mut self.w, v.meas)?;
                    write_vec(&mut self.w, v.esti)?;
                    write_vec(&mut self.w, v.val)?;
                    self.w
                        .write_u16::<LittleEndian>(v.contrast.min(u16::MAX as u32) as u16)?;
                    self.w
                        .write_u16::<LittleEndian>(v.dist.min(u16::MAX as u32) as u16)?;
                    self.w.write_u16::<LittleEndian>(dir.flags())?;
                }
            }
        }
        self.w.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

fn write_vec<W: Write>(w: &mut W, v: Vec2<i32>) -> Result<()> {
    w.write_i16::<LittleEndian>(v.x.clamp(i16::MIN as i32, i16::MAX as i32) as i16)?;
    w.write_i16::<LittleEndian>(v.y.clamp(i16::MIN as i32, i16::MAX as i32) as i16)?;
    Ok(())
}

/// Memory-mapped transforms file reader.
pub struct Deserializer;

impl Deserializer {
    /// Maps and parses a whole transforms file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MotionFile> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::parse(&mmap)
    }

    /// Parses transforms data from a byte buffer.
    pub fn parse(bytes: &[u8]) -> Result<MotionFile> {
        let mut cur = Cursor::new(bytes);

        let mut magic = [0u8; 8];
        cur.read_exact(&mut magic)
            .map_err(|_| truncated("file header"))?;
        if &magic != FILE_MAGIC {
            return Err(DeshakeError::SerializationMismatch(format!(
                "incompatible detector version (expected {:?}, got {:?})",
                String::from_utf8_lossy(FILE_MAGIC),
                String::from_utf8_lossy(&magic)
            )));
        }
        let width = cur
            .read_u16::<LittleEndian>()
            .map_err(|_| truncated("frame size"))? as u32;
        let height = cur
            .read_u16::<LittleEndian>()
            .map_err(|_| truncated("frame size"))? as u32;

        let mut frames = Vec::new();
        loop {
            let mut block_magic = [0u8; 2];
            match cur.read_exact(&mut block_magic) {
                Ok(()) => {}
                // A clean end of file falls exactly on a block boundary.
                Err(_) => break,
            }
            if &block_magic != BLOCK_MAGIC {
                return Err(DeshakeError::SerializationMismatch(format!(
                    "bad block magic at offset {}",
                    cur.position() - 2
                )));
            }
            let cnt = cur
                .read_u16::<LittleEndian>()
                .map_err(|_| truncated("block header"))?;

            let mut cells = Vec::with_capacity(cnt as usize);
            for _ in 0..cnt {
                cells.push(read_cell(&mut cur)?);
            }
            frames.push(cells);
        }

        Ok(MotionFile {
            dim: Vec2::new(width, height),
            frames,
        })
    }
}

fn read_cell(cur: &mut Cursor<&[u8]>) -> Result<CellRecord> {
    let mut magic = [0u8; 2];
    cur.read_exact(&mut magic).map_err(|_| truncated("cell"))?;
    if &magic != CELL_MAGIC {
        return Err(DeshakeError::SerializationMismatch(format!(
            "bad cell magic at offset {}",
            cur.position() - 2
        )));
    }
    let x = cur.read_u16::<LittleEndian>().map_err(|_| truncated("cell"))? as u32;
    let y = cur.read_u16::<LittleEndian>().map_err(|_| truncated("cell"))? as u32;

    let mut cell = CellRecord {
        position: Vec2::new(x, y),
        ..Default::default()
    };
    for dir in &mut cell.directions {
        let meas = read_vec(cur)?;
        let esti = read_vec(cur)?;
        let val = read_vec(cur)?;
        let contrast = cur.read_u16::<LittleEndian>().map_err(|_| truncated("dir"))? as u32;
        let dist = cur.read_u16::<LittleEndian>().map_err(|_| truncated("dir"))? as u32;
        let flags = cur.read_u16::<LittleEndian>().map_err(|_| truncated("dir"))?;
        *dir = DirRecord {
            value: DirVal {
                meas,
                esti,
                val,
                contrast,
                dist,
            },
            flags,
        };
    }
    Ok(cell)
}

fn read_vec(cur: &mut Cursor<&[u8]>) -> Result<Vec2<i32>> {
    let x = cur.read_i16::<LittleEndian>().map_err(|_| truncated("vector"))?;
    let y = cur.read_i16::<LittleEndian>().map_err(|_| truncated("vector"))?;
    Ok(Vec2::new(x as i32, y as i32))
}

fn truncated(what: &str) -> DeshakeError {
    DeshakeError::SerializationMismatch(format!("truncated {what}"))
}
