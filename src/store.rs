//! Record and histogram files on disk
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::data::{JetRecord, RunSummary};
use crate::error::Error;
use crate::reader::Reader;
use crate::tags::VERSION;
use crate::writer::Writer;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Jet record file that is assembled once the run is complete
///
/// Events are collected in an anonymous temporary file, because the
/// run statistics have to precede them but are only known at the end.
/// Nothing appears at the target path before [RecordSink::finish].
#[derive(Debug)]
pub struct RecordSink {
    path: PathBuf,
    header: Option<String>,
    spool: Writer<BufWriter<File>>,
    n_records: u64,
}

impl RecordSink {
    /// Prepare a record file at `path`
    ///
    /// A `.gz` extension selects gzip compression.
    pub fn create<P: Into<PathBuf>>(path: P) -> Result<Self, Error> {
        let spool = tempfile::tempfile()?;
        Ok(Self {
            path: path.into(),
            header: None,
            spool: Writer::events_only(BufWriter::new(spool)),
            n_records: 0,
        })
    }

    /// Set the comment describing the run
    pub fn header(&mut self, text: &str) {
        self.header = Some(text.to_owned());
    }

    pub fn push(&mut self, record: &JetRecord) -> Result<(), Error> {
        self.spool.write_event(record)?;
        self.n_records += 1;
        Ok(())
    }

    pub fn n_records(&self) -> u64 {
        self.n_records
    }

    /// Write the complete file and return its path
    pub fn finish(self, summary: &RunSummary) -> Result<PathBuf, Error> {
        let Self {
            path,
            header,
            mut spool,
            n_records,
        } = self;
        spool.finish()?;
        let mut events = spool.into_inner().into_inner().map_err(|err| err.into_error())?;
        events.seek(SeekFrom::Start(0))?;
        write_atomically(&path, |stream| {
            let mut writer = Writer::new(stream, VERSION)?;
            if let Some(header) = &header {
                writer.write_header(header)?;
            }
            writer.write_stats(summary)?;
            writer.copy_events(BufReader::new(events))?;
            writer.finish()
        })?;
        debug!("Wrote {n_records} records to {}", path.display());
        Ok(path)
    }
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

/// Create `path` such that it either has the complete content or is untouched
///
/// The content goes to a temporary file in the same directory, which
/// replaces `path` once `write` has succeeded. Gzip compression is
/// applied if `path` ends in `.gz`.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<(), Error>
where
    F: FnOnce(&mut dyn Write) -> Result<(), Error>,
{
    let persist_err = |source| Error::Persist {
        path: path.to_owned(),
        source,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(persist_err)?;
    {
        let out = BufWriter::new(tmp.as_file());
        if is_gzip_path(path) {
            let mut out = GzEncoder::new(out, Compression::default());
            write(&mut out)?;
            out.finish()?.flush()?;
        } else {
            let mut out = out;
            write(&mut out)?;
            out.flush()?;
        }
    }
    tmp.persist(path).map_err(|err| persist_err(err.error))?;
    Ok(())
}

/// Open a file for reading, decompressing it if it starts with the gzip magic bytes
pub(crate) fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>, Error> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_owned(),
        source,
    })?;
    let mut file = BufReader::new(file);
    if file.fill_buf()?.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(file))
    }
}

/// Open a jet record file
///
/// Fails if the file cannot be opened or lacks the run statistics.
///
/// # Example
///
/// ```rust,no_run
/// let mut reader = dijet::open_records("jets_ptHat_30_50_jetR0.4.jets").unwrap();
/// while let Some(record) = reader.record().unwrap() {
///     println!("{} jets", record.n_jets());
/// }
/// ```
pub fn open_records<P: AsRef<Path>>(path: P) -> Result<Reader<Box<dyn BufRead>>, Error> {
    let stream = open_maybe_gz(path.as_ref())?;
    Reader::new(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Jet;

    fn records() -> Vec<JetRecord> {
        let dijet = JetRecord::from_sorted(vec![
            Jet { pt: 40., eta: 0.5, phi: 1., area: 0.49 },
            Jet { pt: 20., eta: -0.25, phi: -2.5, area: 0.51 },
        ])
        .unwrap();
        vec![dijet, JetRecord::empty()]
    }

    fn summary() -> RunSummary {
        RunSummary {
            n_events: 3,
            sigma_gen_mb: 0.1,
            sigma_err_mb: 0.01,
            pt_hat_min: 30.,
            pt_hat_max: None,
            n_accepted: 2,
            n_skipped: 1,
            n_jets_dropped: 0,
        }
    }

    fn round_trip(name: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut sink = RecordSink::create(&path).unwrap();
        sink.header("test run");
        for record in &records() {
            sink.push(record).unwrap();
        }
        assert_eq!(sink.n_records(), 2);
        assert!(!path.exists());
        assert_eq!(sink.finish(&summary()).unwrap(), path);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let reader = open_records(&path).unwrap();
        assert_eq!(reader.header(), "test run");
        assert_eq!(reader.run_summary(), &summary());
        let read: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(read, records());
    }

    #[test]
    fn plain_round_trip() {
        round_trip("jets.jets");
    }

    #[test]
    fn gzip_round_trip() {
        round_trip("jets.jets.gz");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jets.jets.gz");
        RecordSink::create(&path).unwrap().finish(&summary()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes[..2], GZIP_MAGIC);
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_records(dir.path().join("missing.jets")).err().unwrap();
        assert!(matches!(err, Error::Open { .. }));
        assert!(err.to_string().starts_with("Cannot open input file"));
    }

    #[test]
    fn failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xml");
        let res = write_atomically(&path, |stream| {
            stream.write_all(b"partial")?;
            Err(Error::Xml("failed".to_owned()))
        });
        assert!(res.is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
