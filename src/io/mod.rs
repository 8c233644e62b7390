//! Binary matrix files.
//!
//! Layout, native byte order:
//!
//! ```text
//! data file   i32 rows | i32 cols | rows*cols f64 (row-major)
//! trace file  i32 rows | i32 cols | (iterations + 1) * rows*cols f64
//! ```
//!
//! A trace holds the initial state followed by every iteration.

use crate::engine::SnapshotSink;
use crate::grid::{Grid, GridView, try_alloc};
use crate::stencil_error::StencilError;
use bytemuck::{Pod, Zeroable};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

const STREAM: &str = "<stream>";

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
struct FileHeader {
    rows: i32,
    cols: i32,
}

impl FileHeader {
    const BYTES: usize = std::mem::size_of::<FileHeader>();

    fn new(rows: usize, cols: usize) -> Result<Self, StencilError> {
        let narrow = |v: usize| {
            i32::try_from(v).map_err(|_| {
                StencilError::Configuration(format!("extent {v} does not fit the file header"))
            })
        };
        Ok(Self {
            rows: narrow(rows)?,
            cols: narrow(cols)?,
        })
    }

    fn extents(&self) -> Result<(usize, usize), StencilError> {
        match (usize::try_from(self.rows), usize::try_from(self.cols)) {
            (Ok(r), Ok(c)) => Ok((r, c)),
            _ => Err(StencilError::Configuration(format!(
                "bad header matrix[{}x{}]",
                self.rows, self.cols
            ))),
        }
    }
}

/// Read until `buf` is full or the stream ends; returns bytes read.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        match reader.read(&mut buf[done..]) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(done)
}

/// Read exactly `out.len()` elements of `T`.
fn read_elements<T: Pod>(
    reader: &mut impl Read,
    out: &mut [T],
    location: &'static str,
    path: &Path,
) -> Result<(), StencilError> {
    let bytes = bytemuck::cast_slice_mut::<T, u8>(out);
    let got = fill(reader, bytes).map_err(|e| StencilError::io(location, path, e))?;
    if got != bytes.len() {
        return Err(StencilError::ShortTransfer {
            location,
            count: got / std::mem::size_of::<T>(),
            expected: out.len(),
        });
    }
    Ok(())
}

fn read_header(reader: &mut impl Read, path: &Path) -> Result<(usize, usize), StencilError> {
    let mut header = [FileHeader::default()];
    read_elements(reader, &mut header, "io::read_header", path)?;
    header[0].extents()
}

fn read_body(
    reader: &mut impl Read,
    rows: usize,
    cols: usize,
    path: &Path,
) -> Result<Grid, StencilError> {
    let len = rows
        .checked_mul(cols)
        .ok_or_else(|| StencilError::Configuration(format!("matrix[{rows}x{cols}] overflows")))?;
    let mut data = try_alloc(len, "matrix")?;
    read_elements(reader, &mut data, "io::read_body", path)?;
    Grid::from_vec(rows, cols, data)
}

fn write_header(w: &mut impl Write, view: &GridView<'_>, path: &Path) -> Result<(), StencilError> {
    let header = FileHeader::new(view.rows, view.cols)?;
    w.write_all(bytemuck::bytes_of(&header))
        .map_err(|e| StencilError::io("io::write_header", path, e))
}

fn write_body(w: &mut impl Write, view: &GridView<'_>, path: &Path) -> Result<(), StencilError> {
    w.write_all(bytemuck::cast_slice(view.data))
        .map_err(|e| StencilError::io("io::write_body", path, e))
}

/// Load a data file.
pub fn read_matrix(path: impl AsRef<Path>) -> Result<Grid, StencilError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| StencilError::io("io::read_matrix", path, e))?;
    let mut reader = BufReader::new(file);
    let (rows, cols) = read_header(&mut reader, path)?;
    read_body(&mut reader, rows, cols, path)
}

/// Decode a data file from any reader.
pub fn read_matrix_from<R: Read>(mut reader: R) -> Result<Grid, StencilError> {
    let path = Path::new(STREAM);
    let (rows, cols) = read_header(&mut reader, path)?;
    read_body(&mut reader, rows, cols, path)
}

/// Write `view` as a data file, replacing any existing file.
pub fn write_matrix(path: impl AsRef<Path>, view: GridView<'_>) -> Result<(), StencilError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| StencilError::io("io::write_matrix", path, e))?;
    let mut w = BufWriter::new(file);
    write_header(&mut w, &view, path)?;
    write_body(&mut w, &view, path)?;
    w.flush()
        .map_err(|e| StencilError::io("io::write_matrix", path, e))
}

/// Encode `view` as a data file into any writer.
pub fn write_matrix_to<W: Write>(mut w: W, view: GridView<'_>) -> Result<(), StencilError> {
    let path = Path::new(STREAM);
    write_header(&mut w, &view, path)?;
    write_body(&mut w, &view, path)
}

/// Bytes one `rows × cols` frame occupies, `None` on overflow.
fn frame_bytes(rows: usize, cols: usize) -> Option<u64> {
    (rows as u64)
        .checked_mul(cols as u64)?
        .checked_mul(std::mem::size_of::<f64>() as u64)
}

/// Bytes a data file for a `rows × cols` matrix occupies; saturates.
pub fn data_file_size(rows: usize, cols: usize) -> u64 {
    frame_bytes(rows, cols)
        .and_then(|b| b.checked_add(FileHeader::BYTES as u64))
        .unwrap_or(u64::MAX)
}

/// Bytes a trace of `iterations` occupies; saturates.
pub fn trace_file_size(rows: usize, cols: usize, iterations: usize) -> u64 {
    frame_bytes(rows, cols)
        .and_then(|b| b.checked_mul(iterations as u64 + 1))
        .and_then(|b| b.checked_add(FileHeader::BYTES as u64))
        .unwrap_or(u64::MAX)
}

/// Streams snapshots into a trace file.
#[derive(Debug)]
pub struct TraceWriter {
    path: PathBuf,
    out: BufWriter<File>,
    rows: usize,
    cols: usize,
    frames: usize,
}

impl TraceWriter {
    /// Create (truncate) `path` and write the header.
    pub fn create(path: impl AsRef<Path>, rows: usize, cols: usize) -> Result<Self, StencilError> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::create(&path).map_err(|e| StencilError::io("TraceWriter::create", &path, e))?;
        let mut out = BufWriter::new(file);
        let header = FileHeader::new(rows, cols)?;
        out.write_all(bytemuck::bytes_of(&header))
            .map_err(|e| StencilError::io("TraceWriter::create", &path, e))?;
        Ok(Self {
            path,
            out,
            rows,
            cols,
            frames: 0,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close; returns the number of frames written.
    pub fn finish(mut self) -> Result<usize, StencilError> {
        self.out
            .flush()
            .map_err(|e| StencilError::io("TraceWriter::finish", &self.path, e))?;
        log::debug!("wrote {} frames to '{}'", self.frames, self.path.display());
        Ok(self.frames)
    }
}

impl SnapshotSink for TraceWriter {
    fn record(&mut self, iteration: usize, view: GridView<'_>) -> Result<(), StencilError> {
        if (view.rows, view.cols) != (self.rows, self.cols) {
            return Err(StencilError::Configuration(format!(
                "snapshot matrix[{}x{}] does not match trace matrix[{}x{}]",
                view.rows, view.cols, self.rows, self.cols
            )));
        }
        if iteration != self.frames {
            log::warn!(
                "trace '{}' got iteration {iteration} as frame {}",
                self.path.display(),
                self.frames
            );
        }
        write_body(&mut self.out, &view, &self.path)?;
        self.frames += 1;
        Ok(())
    }
}

/// A trace file loaded back into memory.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    pub rows: usize,
    pub cols: usize,
    pub frames: Vec<Grid>,
}

/// Load every frame of a trace file.
pub fn read_trace(path: impl AsRef<Path>) -> Result<Trace, StencilError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| StencilError::io("io::read_trace", path, e))?;
    let total = file
        .metadata()
        .map_err(|e| StencilError::io("io::read_trace", path, e))?
        .len();
    let mut reader = BufReader::new(file);
    let (rows, cols) = read_header(&mut reader, path)?;

    let frame = frame_bytes(rows, cols)
        .filter(|&b| b > 0)
        .ok_or_else(|| StencilError::Configuration(format!("bad trace matrix[{rows}x{cols}]")))?;
    let body = total.saturating_sub(FileHeader::BYTES as u64);
    if body % frame != 0 {
        let elements = |bytes: u64| {
            usize::try_from(bytes / std::mem::size_of::<f64>() as u64).unwrap_or(usize::MAX)
        };
        return Err(StencilError::ShortTransfer {
            location: "io::read_trace",
            count: elements(body),
            expected: elements((body / frame + 1).saturating_mul(frame)),
        });
    }
    let frames = (0..body / frame)
        .map(|_| read_body(&mut reader, rows, cols, path))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Trace { rows, cols, frames })
}
