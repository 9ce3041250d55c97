// FAT-backed file operations under the CLICKER/ app directory, and the
// `Storage` implementation the portable crates run against. Every
// operation opens volume -> root -> app dir fresh; the card is the only
// writer and handles are cheap.

use alloc::vec;
use alloc::vec::Vec;

use clicker_core::{Storage, StorageError};
use embedded_sdmmc::{Mode, VolumeIdx};

use crate::drivers::sdcard::SdStorage;

// all app data lives under this directory on the SD root
pub const APP_DIR: &str = "CLICKER";

const COPY_CHUNK: usize = 4096;

fn map_err<E>(label: &'static str) -> impl Fn(embedded_sdmmc::Error<E>) -> StorageError {
    move |e| match e {
        embedded_sdmmc::Error::DiskFull => StorageError::OutOfSpace,
        _ => StorageError::Io(label),
    }
}

// open volume -> root -> CLICKER/, execute body with the dir handle
macro_rules! with_appdir {
    ($sd:expr, |$dir:ident| $body:expr) => {{
        let volume = $sd
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(map_err("open volume failed"))?;
        let root = volume
            .open_root_dir()
            .map_err(map_err("open root dir failed"))?;
        let $dir = root
            .open_dir(APP_DIR)
            .map_err(map_err("open app dir failed"))?;
        $body
    }};
}

// create CLICKER/ in root if it doesn't already exist
pub fn ensure_app_dir<SPI>(sd: &SdStorage<SPI>) -> Result<(), StorageError>
where
    SPI: embedded_hal::spi::SpiDevice,
{
    let volume = sd
        .volume_mgr
        .open_volume(VolumeIdx(0))
        .map_err(map_err("open volume failed"))?;
    let root = volume
        .open_root_dir()
        .map_err(map_err("open root dir failed"))?;

    if root.open_dir(APP_DIR).is_ok() {
        return Ok(());
    }
    root.make_dir_in_dir(APP_DIR)
        .map_err(map_err("make app dir failed"))?;
    Ok(())
}

/// Size of a file in CLICKER/; `None` if it doesn't exist.
pub fn file_size<SPI>(sd: &SdStorage<SPI>, name: &str) -> Result<Option<u32>, StorageError>
where
    SPI: embedded_hal::spi::SpiDevice,
{
    with_appdir!(sd, |dir| {
        match dir.open_file_in_dir(name, Mode::ReadOnly) {
            Ok(file) => Ok(Some(file.length())),
            Err(embedded_sdmmc::Error::NotFound) => Ok(None),
            Err(e) => Err(map_err("open file for size failed")(e)),
        }
    })
}

/// Read up to `buf.len()` bytes from a file in CLICKER/ at `offset`.
/// `None` when the file does not exist, including one that vanished
/// after a size probe.
pub fn read_chunk<SPI>(
    sd: &SdStorage<SPI>,
    name: &str,
    offset: u32,
    buf: &mut [u8],
) -> Result<Option<usize>, StorageError>
where
    SPI: embedded_hal::spi::SpiDevice,
{
    with_appdir!(sd, |dir| {
        let file = match dir.open_file_in_dir(name, Mode::ReadOnly) {
            Ok(file) => file,
            Err(embedded_sdmmc::Error::NotFound) => return Ok(None),
            Err(e) => return Err(map_err("open file failed")(e)),
        };
        file.seek_from_start(offset)
            .map_err(map_err("seek failed"))?;
        let mut total = 0;
        while !file.is_eof() && total < buf.len() {
            let n = file
                .read(&mut buf[total..])
                .map_err(map_err("read failed"))?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(Some(total))
    })
}

/// Create-or-truncate write of the full contents in CLICKER/.
pub fn write_file<SPI>(sd: &SdStorage<SPI>, name: &str, data: &[u8]) -> Result<(), StorageError>
where
    SPI: embedded_hal::spi::SpiDevice,
{
    with_appdir!(sd, |dir| {
        let file = dir
            .open_file_in_dir(name, Mode::ReadWriteCreateOrTruncate)
            .map_err(map_err("open file for write failed"))?;
        if !data.is_empty() {
            file.write(data).map_err(map_err("write failed"))?;
        }
        file.flush().map_err(map_err("flush failed"))?;
        Ok(())
    })
}

/// Append a chunk to a file in CLICKER/, creating it if absent.
pub fn append_file<SPI>(sd: &SdStorage<SPI>, name: &str, data: &[u8]) -> Result<(), StorageError>
where
    SPI: embedded_hal::spi::SpiDevice,
{
    with_appdir!(sd, |dir| {
        let file = dir
            .open_file_in_dir(name, Mode::ReadWriteCreateOrAppend)
            .map_err(map_err("open file for append failed"))?;
        if !data.is_empty() {
            file.write(data).map_err(map_err("append write failed"))?;
        }
        file.flush().map_err(map_err("append flush failed"))?;
        Ok(())
    })
}

/// Delete a file in CLICKER/; missing is not an error.
pub fn delete_file<SPI>(sd: &SdStorage<SPI>, name: &str) -> Result<(), StorageError>
where
    SPI: embedded_hal::spi::SpiDevice,
{
    with_appdir!(sd, |dir| {
        match dir.delete_file_in_dir(name) {
            Ok(()) | Err(embedded_sdmmc::Error::NotFound) => Ok(()),
            Err(e) => Err(map_err("delete failed")(e)),
        }
    })
}

/// `Storage` over the CLICKER/ directory. FAT has no rename, so moves
/// are copy-then-delete; callers already treat the temp-file dance as
/// best-effort atomic.
pub struct CardStore<SPI>
where
    SPI: embedded_hal::spi::SpiDevice + 'static,
{
    sd: &'static SdStorage<SPI>,
}

impl<SPI> CardStore<SPI>
where
    SPI: embedded_hal::spi::SpiDevice,
{
    pub fn new(sd: &'static SdStorage<SPI>) -> Self {
        Self { sd }
    }

    /// Append outside the `Storage` trait; the HTTP client uses this to
    /// stream a raw frame to disk chunk by chunk.
    pub fn append(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        append_file(self.sd, name, data)
    }
}

impl<SPI> Storage for CardStore<SPI>
where
    SPI: embedded_hal::spi::SpiDevice,
{
    fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let Some(size) = file_size(self.sd, name)? else {
            return Ok(None);
        };
        let mut data = Vec::new();
        data.try_reserve_exact(size as usize)
            .map_err(|_| StorageError::Io("file too large for memory"))?;
        data.resize(size as usize, 0);

        let mut total = 0;
        while total < data.len() {
            let Some(n) = read_chunk(self.sd, name, total as u32, &mut data[total..])? else {
                // vanished between the size probe and the read
                return Ok(None);
            };
            if n == 0 {
                break;
            }
            total += n;
        }
        data.truncate(total);
        Ok(Some(data))
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        write_file(self.sd, name, data)
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        delete_file(self.sd, name)
    }

    fn rename(&mut self, old: &str, new: &str) -> Result<(), StorageError> {
        let size = file_size(self.sd, old)?.ok_or(StorageError::Io("rename source missing"))?;

        let mut buf = vec![0u8; COPY_CHUNK.min(size.max(1) as usize)];
        let mut offset: u32 = 0;
        let mut first = true;
        loop {
            let n = read_chunk(self.sd, old, offset, &mut buf)?
                .ok_or(StorageError::Io("rename source missing"))?;
            if n == 0 && !first {
                break;
            }
            if first {
                write_file(self.sd, new, &buf[..n])?;
                first = false;
            } else {
                append_file(self.sd, new, &buf[..n])?;
            }
            offset += n as u32;
            if offset >= size {
                break;
            }
        }
        delete_file(self.sd, old)
    }

    fn len(&mut self, name: &str) -> Result<Option<usize>, StorageError> {
        Ok(file_size(self.sd, name)?.map(|s| s as usize))
    }
}
