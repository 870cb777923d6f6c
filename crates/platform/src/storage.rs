//! Storage abstraction for the minimal file layer

/// Storage trait for file system access
pub trait Storage {
    /// Error type
    type Error: core::fmt::Debug;
    /// File type
    type File: File;

    /// Open file for reading
    fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error>;

    /// Check if path exists
    fn exists(&mut self, path: &str) -> Result<bool, Self::Error>;
}

/// File trait for reading files
///
/// `read` fills as much of `buf` as the file can supply from the current
/// position and returns the count; fewer bytes than requested means the end
/// of the file was reached. Callers decide whether that is a failure.
pub trait File {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read from current position
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Seek to absolute byte position
    fn seek(&mut self, pos: u64) -> Result<u64, Self::Error>;

    /// Get file size
    fn size(&self) -> u64;

    /// Release the handle.
    fn close(self) -> Result<(), Self::Error>
    where
        Self: Sized,
    {
        Ok(())
    }
}
