use std::{io, io::SeekFrom, path::Path};

use tokio::{
    fs::File,
    io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt},
};
use tracing::debug;

const FALLBACK_FILE_NAME: &str = "attachment";

/// The image sent with every place.
///
/// It is opened once per run. Each submission reads it from the cursor to the
/// end, so the cursor has to be rewound before the next record.
pub(crate) struct Attachment<F = File> {
    file: F,
    file_name: String,
}

impl Attachment<File> {
    pub(crate) async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());
        debug!("Attachment opened: {}", path.display());
        Ok(Self::new(file, file_name))
    }
}

impl<F: AsyncRead + AsyncSeek + Unpin> Attachment<F> {
    pub(crate) fn new(file: F, file_name: impl Into<String>) -> Self {
        Self {
            file,
            file_name: file_name.into(),
        }
    }

    /// File name reported in the multipart part.
    pub(crate) fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Reads everything from the current cursor position to the end.
    pub(crate) async fn read_contents(&mut self) -> io::Result<Vec<u8>> {
        let mut contents = Vec::new();
        self.file.read_to_end(&mut contents).await?;
        Ok(contents)
    }

    pub(crate) async fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }

    /// Releases the underlying handle.
    pub(crate) fn close(self) {
        debug!("Attachment closed: {}", self.file_name);
        drop(self.file);
    }
}
