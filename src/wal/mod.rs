//! Write-ahead log: 32 KiB block framing with fragmented, CRC-protected
//! records (component F).
//!
//! Every logical record appended to the log is split into one or more
//! *physical* records so that no physical record ever crosses a 32 KiB
//! block boundary. Each physical record carries its own masked CRC32 and
//! a type tag identifying whether it is the whole logical record
//! ([`RecordType::Full`]) or one fragment of a larger one ([`RecordType::First`],
//! [`RecordType::Middle`], [`RecordType::Last`]). Grounded on
//! `db/log_format.h`, `db/log_writer.h`, `db/log_reader.h`.
//!
//! The reader tolerates corruption: a bad fragment is reported to an
//! injected [`Reporter`] and scanning resumes at the next physical record,
//! matching the failure semantics in §4.F/§7 — only end-of-file stops the
//! reader for good.

#[cfg(test)]
mod tests;

use std::io::{self, Read, Write};

use crc32fast::Hasher as Crc32;
use thiserror::Error;
use tracing::warn;

use crate::error::Error as CrateError;

/// Size of one on-disk WAL block.
pub const BLOCK_SIZE: usize = 32768;

/// `crc32(4) ‖ length_le16(2) ‖ type(1)`.
pub const HEADER_SIZE: usize = 7;

/// Largest fragment payload a single physical record can carry: the
/// block size minus the header, since a fragment never spans a block.
pub const MAX_FRAGMENT_SIZE: usize = BLOCK_SIZE - HEADER_SIZE;

/// Errors surfaced by WAL reads and writes.
#[derive(Debug, Error)]
pub enum WalError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A payload was too large to be framed as length-prefixed fragments
    /// (a single fragment's length must fit in 16 bits).
    #[error("record fragment exceeds 16-bit length limit ({0} bytes)")]
    RecordTooLarge(usize),
}

impl From<WalError> for CrateError {
    fn from(err: WalError) -> Self {
        match err {
            WalError::Io(e) => CrateError::Io(e),
            WalError::RecordTooLarge(n) => {
                CrateError::invalid_argument(format!("record fragment exceeds 16-bit length limit ({n} bytes)"))
            }
        }
    }
}

/// Physical record type tag, stored as the header's final byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Zero-padding at the tail of a block; never a real record.
    Zero = 0,
    /// The entire logical record fits in one physical record.
    Full = 1,
    /// The first fragment of a logical record split across blocks.
    First = 2,
    /// An interior fragment (neither first nor last).
    Middle = 3,
    /// The final fragment of a logical record.
    Last = 4,
}

impl RecordType {
    fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(RecordType::Zero),
            1 => Some(RecordType::Full),
            2 => Some(RecordType::First),
            3 => Some(RecordType::Middle),
            4 => Some(RecordType::Last),
            _ => None,
        }
    }
}

/// Masks a raw CRC32 so that in-flight corruption of the stored value
/// itself does not false-negative against plausible all-zero data.
/// Grounded on `util/crc32c.h`'s `Mask`/`Unmask`. This port computes the
/// checksum with `crc32fast` (standard CRC-32), the hashing crate this
/// workspace already depends on, rather than pulling in a separate
/// CRC-32C implementation purely for bit-for-bit fidelity with the
/// original's hardware-accelerated Castagnoli variant — the masking
/// arithmetic and round-trip invariants are identical either way.
pub(crate) fn mask_crc(crc: u32) -> u32 {
    ((crc >> 15) | (crc << 17)).wrapping_add(0xa282ead8)
}

pub(crate) fn unmask_crc(masked: u32) -> u32 {
    let rot = masked.wrapping_sub(0xa282ead8);
    (rot >> 17) | (rot << 15)
}

/// Observer for corrupted physical records encountered while reading.
///
/// Mirrors `log::Reader::Reporter`: the reader never fails outright on
/// corruption, it reports and resumes scanning at the next record.
pub trait Reporter {
    /// Called when `bytes` worth of data starting some distance back was
    /// dropped for `reason` (one of the specific messages in §7).
    fn corruption(&self, bytes: usize, reason: &str);
}

/// A [`Reporter`] that logs dropped bytes at `warn` level via `tracing`.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn corruption(&self, bytes: usize, reason: &str) {
        warn!(bytes, reason, "WAL corruption");
    }
}

// ------------------------------------------------------------------------------------------------
// Writer
// ------------------------------------------------------------------------------------------------

/// Appends logical records to a WAL, fragmenting each across 32 KiB block
/// boundaries as needed. Not internally synchronized: per §5, writers are
/// serialized by an external mutex.
pub struct Writer<W: Write> {
    dest: W,
    /// Byte offset within the current 32 KiB block.
    block_offset: usize,
}

impl<W: Write> Writer<W> {
    /// Wrap `dest`, starting at the beginning of a fresh block.
    pub fn new(dest: W) -> Self {
        Writer { dest, block_offset: 0 }
    }

    /// Resume writing to `dest`, which already contains `dest_length`
    /// bytes — used when reopening a WAL file for append, so fragment
    /// framing continues to respect the existing block boundary.
    pub fn with_length(dest: W, dest_length: u64) -> Self {
        Writer {
            dest,
            block_offset: (dest_length as usize) % BLOCK_SIZE,
        }
    }

    /// Append one logical record, fragmenting it across block boundaries
    /// as needed. Returns once every fragment has been written and
    /// flushed.
    pub fn add_record(&mut self, payload: &[u8]) -> Result<(), WalError> {
        let mut ptr = payload;
        let mut begin = true;

        loop {
            let leftover = BLOCK_SIZE - self.block_offset;
            debug_assert!(leftover <= BLOCK_SIZE);

            if leftover < HEADER_SIZE {
                // Not enough room for even a header: zero-pad the tail
                // and roll over to a new block.
                if leftover > 0 {
                    let padding = [0u8; HEADER_SIZE];
                    self.dest.write_all(&padding[..leftover])?;
                }
                self.block_offset = 0;
            }

            let avail = BLOCK_SIZE - self.block_offset - HEADER_SIZE;
            let fragment_len = ptr.len().min(avail);
            let end = fragment_len == ptr.len();

            let record_type = match (begin, end) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, true) => RecordType::Last,
                (false, false) => RecordType::Middle,
            };

            self.emit_physical_record(record_type, &ptr[..fragment_len])?;
            ptr = &ptr[fragment_len..];
            begin = false;

            if ptr.is_empty() {
                return Ok(());
            }
        }
    }

    fn emit_physical_record(&mut self, record_type: RecordType, fragment: &[u8]) -> Result<(), WalError> {
        let length = u16::try_from(fragment.len()).map_err(|_| WalError::RecordTooLarge(fragment.len()))?;
        debug_assert!(self.block_offset + HEADER_SIZE + fragment.len() <= BLOCK_SIZE);

        let mut hasher = Crc32::new();
        hasher.update(&[record_type as u8]);
        hasher.update(fragment);
        let crc = mask_crc(hasher.finalize());

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&crc.to_le_bytes());
        header[4..6].copy_from_slice(&length.to_le_bytes());
        header[6] = record_type as u8;

        self.dest.write_all(&header)?;
        self.dest.write_all(fragment)?;
        self.dest.flush()?;

        self.block_offset += HEADER_SIZE + fragment.len();
        Ok(())
    }

    /// Flush the underlying writer without appending a record.
    pub fn flush(&mut self) -> Result<(), WalError> {
        self.dest.flush()?;
        Ok(())
    }

    /// Consume the writer, returning the underlying destination.
    pub fn into_inner(self) -> W {
        self.dest
    }
}

// ------------------------------------------------------------------------------------------------
// Reader
// ------------------------------------------------------------------------------------------------

/// Internal outcome of reading one physical record, extending
/// [`RecordType`] with the two sentinel states the state machine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhysicalRecord {
    Full,
    First,
    Middle,
    Last,
    Eof,
    BadRecord,
}

/// Reads logical records back out of a WAL, reassembling fragments and
/// tolerating corruption by reporting and resyncing at the next record.
pub struct Reader<'r, R: Read> {
    file: R,
    reporter: &'r dyn Reporter,
    checksum: bool,
    buffer: Vec<u8>,
    /// Cursor into `buffer`: bytes before this index have been consumed.
    buf_pos: usize,
    eof: bool,
    last_record_offset: u64,
    end_of_buffer_offset: u64,
    initial_offset: u64,
    resyncing: bool,
}

impl<'r, R: Read> Reader<'r, R> {
    /// Create a reader starting at `initial_offset` bytes into the
    /// logical stream, verifying checksums if `checksum` is set.
    pub fn new(file: R, reporter: &'r dyn Reporter, checksum: bool, initial_offset: u64) -> Self {
        Reader {
            file,
            reporter,
            checksum,
            buffer: Vec::new(),
            buf_pos: 0,
            eof: false,
            last_record_offset: 0,
            end_of_buffer_offset: 0,
            initial_offset,
            resyncing: initial_offset > 0,
        }
    }

    fn remaining_buffer(&self) -> &[u8] {
        &self.buffer[self.buf_pos..]
    }

    /// Skip forward to the block containing `initial_offset`, per the
    /// rule in §4.F: if the offset lands within 6 bytes of the block's
    /// end (where no header could fit), advance to the next block start.
    fn skip_to_initial_block(&mut self) -> io::Result<bool> {
        let offset_in_block = (self.initial_offset as usize) % BLOCK_SIZE;
        let mut block_start = self.initial_offset - offset_in_block as u64;

        if offset_in_block > BLOCK_SIZE - 6 {
            block_start += BLOCK_SIZE as u64;
        }

        self.end_of_buffer_offset = block_start;

        if block_start > 0 {
            let mut remaining = block_start;
            let mut sink = [0u8; 4096];
            while remaining > 0 {
                let want = remaining.min(sink.len() as u64) as usize;
                match self.file.read(&mut sink[..want]) {
                    Ok(0) => break,
                    Ok(n) => remaining -= n as u64,
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(true)
    }

    /// Read and return the next logical record, or `None` at end of file.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>, WalError> {
        if self.last_record_offset < self.initial_offset {
            self.skip_to_initial_block()?;
        }

        let mut scratch: Vec<u8> = Vec::new();
        let mut in_fragmented_record = false;
        let mut prospective_record_offset: u64 = 0;

        loop {
            let (record_type, fragment) = self.read_physical_record()?;
            let physical_record_offset =
                self.end_of_buffer_offset - self.remaining_buffer().len() as u64 - HEADER_SIZE as u64 - fragment.len() as u64;

            if self.resyncing {
                match record_type {
                    PhysicalRecord::Middle => continue,
                    PhysicalRecord::Last => {
                        self.resyncing = false;
                        continue;
                    }
                    _ => self.resyncing = false,
                }
            }

            match record_type {
                PhysicalRecord::Full => {
                    if in_fragmented_record && !scratch.is_empty() {
                        self.report_corruption(scratch.len(), "partial record without end(1)");
                    }
                    prospective_record_offset = physical_record_offset;
                    scratch.clear();
                    self.last_record_offset = prospective_record_offset;
                    return Ok(Some(fragment));
                }
                PhysicalRecord::First => {
                    if in_fragmented_record && !scratch.is_empty() {
                        self.report_corruption(scratch.len(), "partial record without end(1)");
                    }
                    prospective_record_offset = physical_record_offset;
                    scratch.clear();
                    scratch.extend_from_slice(&fragment);
                    in_fragmented_record = true;
                }
                PhysicalRecord::Middle => {
                    if !in_fragmented_record {
                        self.report_corruption(fragment.len(), "missing start of fragmented record(1)");
                    } else {
                        scratch.extend_from_slice(&fragment);
                    }
                }
                PhysicalRecord::Last => {
                    if !in_fragmented_record {
                        self.report_corruption(fragment.len(), "missing start of fragmented record(2)");
                    } else {
                        scratch.extend_from_slice(&fragment);
                        self.last_record_offset = prospective_record_offset;
                        return Ok(Some(scratch));
                    }
                }
                PhysicalRecord::Eof => {
                    if in_fragmented_record {
                        scratch.clear();
                    }
                    return Ok(None);
                }
                PhysicalRecord::BadRecord => {
                    if in_fragmented_record {
                        self.report_corruption(scratch.len(), "error in middle of record");
                        in_fragmented_record = false;
                        scratch.clear();
                    }
                }
            }
        }
    }

    fn report_corruption(&self, bytes: usize, reason: &str) {
        // Suppress reports for bytes that lie entirely before
        // `initial_offset`: they're from a region the caller never asked
        // to see, not genuine corruption in the requested range.
        let remaining = self.remaining_buffer().len() as u64;
        let drop_start = self.end_of_buffer_offset.saturating_sub(remaining).saturating_sub(bytes as u64);
        if drop_start >= self.initial_offset {
            self.reporter.corruption(bytes, reason);
        }
    }

    fn fill_buffer(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.buf_pos = 0;
        let mut block = vec![0u8; BLOCK_SIZE];
        let mut filled = 0;
        loop {
            match self.file.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => {
                    filled += n;
                    if filled == BLOCK_SIZE {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        block.truncate(filled);
        self.end_of_buffer_offset += filled as u64;
        if filled < BLOCK_SIZE {
            self.eof = true;
        }
        self.buffer = block;
        Ok(())
    }

    fn read_physical_record(&mut self) -> Result<(PhysicalRecord, Vec<u8>), WalError> {
        loop {
            if self.remaining_buffer().len() < HEADER_SIZE {
                if !self.eof {
                    self.fill_buffer()?;
                    continue;
                }
                self.buffer.clear();
                self.buf_pos = 0;
                return Ok((PhysicalRecord::Eof, Vec::new()));
            }

            let header = self.remaining_buffer();
            let crc_masked = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let length = u16::from_le_bytes([header[4], header[5]]) as usize;
            let Some(record_type) = RecordType::from_u8(header[6]) else {
                let drop_size = self.remaining_buffer().len();
                self.buffer.clear();
                self.buf_pos = 0;
                self.report_corruption(drop_size, "unknown record type");
                return Ok((PhysicalRecord::BadRecord, Vec::new()));
            };

            if HEADER_SIZE + length > self.remaining_buffer().len() {
                let drop_size = self.remaining_buffer().len();
                self.buffer.clear();
                self.buf_pos = 0;
                if !self.eof {
                    self.report_corruption(drop_size, "bad record length");
                    return Ok((PhysicalRecord::BadRecord, Vec::new()));
                }
                return Ok((PhysicalRecord::Eof, Vec::new()));
            }

            if record_type == RecordType::Zero && length == 0 {
                self.buffer.clear();
                self.buf_pos = 0;
                return Ok((PhysicalRecord::BadRecord, Vec::new()));
            }

            if self.checksum {
                let expected = unmask_crc(crc_masked);
                let mut hasher = Crc32::new();
                hasher.update(&header[6..6 + 1 + length]);
                let actual = hasher.finalize();
                if actual != expected {
                    let drop_size = HEADER_SIZE + length;
                    self.buf_pos += drop_size;
                    self.report_corruption(drop_size, "checksum mismatch");
                    return Ok((PhysicalRecord::BadRecord, Vec::new()));
                }
            }

            let fragment = header[HEADER_SIZE..HEADER_SIZE + length].to_vec();
            self.buf_pos += HEADER_SIZE + length;

            if self.end_of_buffer_offset - self.remaining_buffer().len() as u64 - HEADER_SIZE as u64 - length as u64
                < self.initial_offset
            {
                return Ok((PhysicalRecord::BadRecord, Vec::new()));
            }

            let physical = match record_type {
                RecordType::Full => PhysicalRecord::Full,
                RecordType::First => PhysicalRecord::First,
                RecordType::Middle => PhysicalRecord::Middle,
                RecordType::Last => PhysicalRecord::Last,
                RecordType::Zero => unreachable!("zero-length zero records handled above"),
            };
            return Ok((physical, fragment));
        }
    }

    /// The offset of the most recently returned logical record.
    pub fn last_record_offset(&self) -> u64 {
        self.last_record_offset
    }
}
