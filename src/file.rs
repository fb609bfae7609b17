// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Positioned (`pread`-style) file I/O, used by the table reader so
//! concurrent readers of the same file handle never race over a shared
//! cursor.

use crate::Slice;
use std::{fs::File, os::unix::fs::FileExt, path::Path};

/// Reads exactly `size` bytes at `offset`, independent of the file's cursor.
pub fn read_exact_at(file: &File, offset: u64, size: usize) -> std::io::Result<Slice> {
    let mut buf = vec![0u8; size];
    file.read_exact_at(&mut buf, offset)?;
    Ok(buf.into())
}

/// Atomically rewrites a file's contents via a temp-file-then-rename dance.
pub fn rewrite_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    #[allow(clippy::expect_used)]
    let folder = path.parent().expect("table paths always have a parent");

    let mut temp_file = tempfile::NamedTempFile::new_in(folder)?;
    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file_mut().sync_all()?;
    temp_file.persist(path)?;

    let file = File::open(path)?;
    file.sync_all()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_log::test;

    #[test]
    fn read_exact_at_ignores_cursor() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("data.bin");

        {
            let mut file = File::create(&path)?;
            file.write_all(b"hello world")?;
        }

        let file = File::open(&path)?;
        let slice = read_exact_at(&file, 6, 5)?;
        assert_eq!(slice.as_ref(), b"world");

        Ok(())
    }

    #[test]
    fn atomic_rewrite_replaces_contents() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test.txt");

        std::fs::write(&path, b"asdasdasdasdasd")?;
        rewrite_atomic(&path, b"newcontent")?;

        assert_eq!(std::fs::read(&path)?, b"newcontent");

        Ok(())
    }
}
