use std::io::Read;

use zip::read::ZipFile;

use crate::error::{DrawingError, Result};

/// Tracks the total number of bytes inflated across a multi-part ZIP read.
pub(crate) struct ZipInflateBudget {
    max_total_bytes: u64,
    used_bytes: u64,
}

impl ZipInflateBudget {
    pub(crate) fn new(max_total_bytes: u64) -> Self {
        Self {
            max_total_bytes,
            used_bytes: 0,
        }
    }

    fn remaining_bytes(&self) -> u64 {
        self.max_total_bytes.saturating_sub(self.used_bytes)
    }

    fn consume(&mut self, bytes: u64) -> Result<()> {
        self.used_bytes = self.used_bytes.checked_add(bytes).unwrap_or(u64::MAX);
        if self.used_bytes > self.max_total_bytes {
            return Err(DrawingError::PackageTooLarge {
                total: self.used_bytes,
                max: self.max_total_bytes,
            });
        }
        Ok(())
    }
}

/// Read a ZIP entry into memory with a per-part limit and a shared total budget.
///
/// The declared uncompressed size is only a fast-path check; the read itself is capped at
/// `limit + 1` bytes so forged size fields can't bypass the limit.
pub(crate) fn read_zip_file_bytes_with_budget<R: Read>(
    file: &mut ZipFile<'_, R>,
    part: &str,
    max_part_bytes: u64,
    budget: &mut ZipInflateBudget,
) -> Result<Vec<u8>> {
    let declared_size = file.size();
    if declared_size > max_part_bytes {
        return Err(DrawingError::PartTooLarge {
            part: part.to_string(),
            size: declared_size,
            max: max_part_bytes,
        });
    }

    let effective_max = max_part_bytes.min(budget.remaining_bytes());
    let mut buf = Vec::with_capacity(declared_size.min(effective_max) as usize);
    file.take(effective_max.saturating_add(1))
        .read_to_end(&mut buf)?;

    let read = buf.len() as u64;
    if read > max_part_bytes {
        return Err(DrawingError::PartTooLarge {
            part: part.to_string(),
            size: read,
            max: max_part_bytes,
        });
    }
    budget.consume(read)?;
    Ok(buf)
}
