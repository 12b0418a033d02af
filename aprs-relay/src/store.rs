use std::{
    ffi::OsStr,
    fs::{remove_dir_all, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
};

use chrono::{DateTime, Utc};
use flate2::{write::GzEncoder, Compression};

/// Appends published records to hourly JSON-lines files, one directory per day.
///
/// Finished day directories are packed into `<day>.tar.gz` on a background
/// thread.
#[derive(Debug)]
pub struct Archive {
    root_dir: PathBuf,
    current_dir: PathBuf,
    last_date: Option<String>,
    last_hour: Option<String>,
    writer: Option<File>,
    compress_tx: Option<mpsc::Sender<Option<PathBuf>>>,
    compress_hdl: Option<thread::JoinHandle<()>>,
}

impl Drop for Archive {
    fn drop(&mut self) {
        if let Some(tx) = self.compress_tx.take() {
            let _ = tx.send(None);
        }
        if let Some(hdl) = self.compress_hdl.take() {
            let _ = hdl.join();
        }
    }
}

fn compress_dir(day_dir: &Path) {
    let mut outfile = day_dir.to_path_buf();
    outfile.set_extension("tar.gz");
    log::info!("Compressing {day_dir:?} to {outfile:?}...");
    let res = File::create(&outfile).and_then(|outfile| {
        let mut tar = tar::Builder::new(GzEncoder::new(outfile, Compression::default()));
        let root = day_dir.file_name().unwrap_or(OsStr::new("."));
        tar.append_dir_all(root, day_dir)?;
        tar.into_inner()?.finish()?;
        Ok(())
    });
    match res {
        Ok(()) => match remove_dir_all(day_dir) {
            Ok(()) => log::info!("Compression successful! Deleted {day_dir:?}"),
            Err(e) => log::warn!("Error deleting directory {day_dir:?}: {e:?}"),
        },
        Err(e) => log::warn!("Compression error {e:?}: {day_dir:?}"),
    }
}

impl Archive {
    pub fn new(root_dir: PathBuf, compress: bool) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root_dir)?;
        let (compress_tx, compress_hdl) = if compress {
            let (tx, rx) = mpsc::channel::<Option<PathBuf>>();
            let hdl = thread::spawn(move || {
                log::info!("Compression thread started");
                while let Ok(Some(day_dir)) = rx.recv() {
                    compress_dir(&day_dir);
                }
                log::info!("Compression thread exiting");
            });
            (Some(tx), Some(hdl))
        } else {
            (None, None)
        };
        Ok(Self {
            root_dir,
            current_dir: PathBuf::new(),
            last_date: None,
            last_hour: None,
            writer: None,
            compress_tx,
            compress_hdl,
        })
    }

    /// Append one record, filed under the hour of `tstamp`
    pub fn store(&mut self, tstamp: DateTime<Utc>, data: &[u8]) -> Result<(), std::io::Error> {
        let date = tstamp.format("%Y%m%d").to_string();
        let hour = tstamp.format("%H").to_string();
        if self.last_date.as_deref() != Some(&date) {
            if self.last_date.is_some() {
                self.writer = None;
                if let Some(tx) = &self.compress_tx {
                    let _ = tx.send(Some(self.current_dir.clone()));
                }
            }
            self.current_dir = self.root_dir.join(&date);
            std::fs::create_dir_all(&self.current_dir)?;
            self.last_date = Some(date.clone());
            self.last_hour = None;
        }
        if self.last_hour.as_deref() != Some(&hour) {
            let filename = self.current_dir.join(format!("{}{}0000.json", &date, &hour));
            self.writer = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(filename)?,
            );
            self.last_hour = Some(hour);
        }
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data)?;
                writer.write_all(b"\n")?;
                writer.flush()
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "No file writer",
            )),
        }
    }
}
