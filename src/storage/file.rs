//! File-based storage implementation.
//!
//! Reads go through a shared memory map when [`StorageConfig::use_mmap`] is
//! set, so cloned inputs only copy a reference-counted handle. Otherwise each
//! input owns a buffered file handle and clones reopen the file.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{BlockTreeError, Result};
use crate::storage::traits::{Storage, StorageConfig, StorageError, StorageInput, StorageOutput};

/// A file-based storage implementation.
#[derive(Debug)]
pub struct FileStorage {
    /// The root directory for storage.
    directory: PathBuf,
    /// Storage configuration.
    config: StorageConfig,
}

impl FileStorage {
    /// Create a new file storage in the given directory.
    pub fn new<P: AsRef<Path>>(directory: P, config: StorageConfig) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        // Create directory if it doesn't exist
        if !directory.exists() {
            std::fs::create_dir_all(&directory).map_err(|e| {
                BlockTreeError::storage(format!("Failed to create directory: {e}"))
            })?;
        }

        // Verify it's a directory
        if !directory.is_dir() {
            return Err(BlockTreeError::storage(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        Ok(FileStorage { directory, config })
    }

    /// Get the full path for a file name.
    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

fn open_error(name: &str, e: io::Error) -> BlockTreeError {
    if e.kind() == io::ErrorKind::NotFound {
        StorageError::FileNotFound(name.to_string()).into()
    } else {
        StorageError::IoError(e.to_string()).into()
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let path = self.file_path(name);
        let file = File::open(&path).map_err(|e| open_error(name, e))?;

        let input = if self.config.use_mmap {
            FileInput::mapped(&file)?
        } else {
            FileInput::buffered(path, file, self.config.buffer_size)?
        };

        Ok(Box::new(input))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let path = self.file_path(name);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| StorageError::IoError(e.to_string()))?;

        Ok(Box::new(FileOutput::new(
            file,
            self.config.buffer_size,
            self.config.sync_writes,
        )))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).exists()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        std::fs::remove_file(self.file_path(name)).map_err(|e| open_error(name, e))
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.directory)
            .map_err(|e| StorageError::IoError(e.to_string()))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::IoError(e.to_string()))?;
            if entry.path().is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    files.push(name.to_string());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        let metadata = std::fs::metadata(self.file_path(name)).map_err(|e| open_error(name, e))?;
        Ok(metadata.len())
    }

    fn sync(&self) -> Result<()> {
        // Outputs sync themselves on close when configured to.
        Ok(())
    }
}

#[derive(Debug)]
enum FileSource {
    Mapped(Arc<Mmap>),
    Buffered {
        path: PathBuf,
        reader: BufReader<File>,
        buffer_size: usize,
    },
}

/// A file input implementation.
#[derive(Debug)]
pub struct FileInput {
    source: FileSource,
    position: u64,
    size: u64,
}

impl FileInput {
    fn mapped(file: &File) -> Result<Self> {
        // SAFETY: dictionary files are written once and never modified while open.
        let mmap = unsafe { Mmap::map(file) }
            .map_err(|e| BlockTreeError::storage(format!("Failed to map file: {e}")))?;
        let size = mmap.len() as u64;

        Ok(FileInput {
            source: FileSource::Mapped(Arc::new(mmap)),
            position: 0,
            size,
        })
    }

    fn buffered(path: PathBuf, file: File, buffer_size: usize) -> Result<Self> {
        let metadata = file
            .metadata()
            .map_err(|e| BlockTreeError::storage(format!("Failed to get file metadata: {e}")))?;

        Ok(FileInput {
            source: FileSource::Buffered {
                path,
                reader: BufReader::with_capacity(buffer_size, file),
                buffer_size,
            },
            position: 0,
            size: metadata.len(),
        })
    }
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.source {
            FileSource::Mapped(mmap) => {
                let start = (self.position as usize).min(mmap.len());
                let n = buf.len().min(mmap.len() - start);
                buf[..n].copy_from_slice(&mmap[start..start + n]);
                n
            }
            FileSource::Buffered { reader, .. } => reader.read(buf)?,
        };
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for FileInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => self.size.checked_add_signed(offset),
            SeekFrom::Current(offset) => self.position.checked_add_signed(offset),
        }
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid seek position"))?;

        if let FileSource::Buffered { reader, .. } = &mut self.source {
            // Relative seeks keep the read buffer when the target is close by.
            let delta = target as i64 - self.position as i64;
            reader.seek_relative(delta)?;
        }
        self.position = target;
        Ok(target)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }

    fn clone_input(&self) -> Result<Box<dyn StorageInput>> {
        let source = match &self.source {
            FileSource::Mapped(mmap) => FileSource::Mapped(Arc::clone(mmap)),
            FileSource::Buffered {
                path, buffer_size, ..
            } => {
                let mut file = File::open(path).map_err(|e| StorageError::IoError(e.to_string()))?;
                file.seek(SeekFrom::Start(self.position))?;
                FileSource::Buffered {
                    path: path.clone(),
                    reader: BufReader::with_capacity(*buffer_size, file),
                    buffer_size: *buffer_size,
                }
            }
        };

        Ok(Box::new(FileInput {
            source,
            position: self.position,
            size: self.size,
        }))
    }

    fn close(&mut self) -> Result<()> {
        // The file or mapping is released when the input is dropped
        Ok(())
    }
}

/// A file output implementation.
#[derive(Debug)]
pub struct FileOutput {
    writer: BufWriter<File>,
    sync_writes: bool,
    position: u64,
    closed: bool,
}

impl FileOutput {
    fn new(file: File, buffer_size: usize, sync_writes: bool) -> Self {
        FileOutput {
            writer: BufWriter::with_capacity(buffer_size, file),
            sync_writes,
            position: 0,
            closed: false,
        }
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other("Output is closed"));
        }

        let bytes_written = self.writer.write(buf)?;
        self.position += bytes_written as u64;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Seek for FileOutput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = self.writer.seek(pos)?;
        self.position = new_pos;
        Ok(new_pos)
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| BlockTreeError::storage(format!("Failed to flush: {e}")))?;

        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| BlockTreeError::storage(format!("Failed to sync: {e}")))?;

        Ok(())
    }

    fn position(&self) -> Result<u64> {
        Ok(self.position)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.sync_writes {
            self.flush_and_sync()?;
        } else {
            self.writer.flush()?;
        }
        self.closed = true;
        Ok(())
    }
}
