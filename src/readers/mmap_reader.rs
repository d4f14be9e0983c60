use crate::error::Result;
use crate::utils::constants::LINE_TERMINATOR;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Read-only view of a whole input file through a memory map
pub struct MappedInput {
    mmap: Option<Mmap>,
}

impl MappedInput {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Zero-length files cannot be mapped on every platform
        if file.metadata()?.len() == 0 {
            return Ok(Self { mmap: None });
        }
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap: Some(mmap) })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Cut `data` into at most roughly `count` line-aligned segments.
///
/// Each nominal cut point is pushed forward to just past the next newline, so
/// every segment but possibly the last ends with a newline.
pub fn split_segments(data: &[u8], count: usize) -> Vec<&[u8]> {
    let target = (data.len() / count.max(1)).max(1);
    let mut segments = Vec::with_capacity(count);
    let mut start = 0;

    while start < data.len() {
        let nominal = start + target;
        if nominal >= data.len() {
            segments.push(&data[start..]);
            break;
        }
        let end = match data[nominal..].iter().position(|&b| b == LINE_TERMINATOR) {
            Some(index) => nominal + index + 1,
            None => data.len(),
        };
        segments.push(&data[start..end]);
        start = end;
    }

    segments
}
