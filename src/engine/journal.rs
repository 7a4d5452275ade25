use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// File magic + format version. A file that does not open with this header
/// is refused at load time rather than mis-decoded record by record.
const MAGIC: [u8; 4] = *b"INKJ";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 5;

/// Durable event journal: the room registry and booking ledger are rebuilt
/// from it on startup.
///
/// Layout: a 5-byte header (`INKJ` + version byte), then one record per
/// event: `[u32: crc32 of payload][u32: payload len][bincode: Event]`.
/// A torn tail (crash mid-append) fails the prefix read or the checksum and
/// is dropped at load time; every record before it is kept.
pub struct Journal {
    writer: BufWriter<File>,
    path: PathBuf,
    entries_since_compact: u64,
}

fn write_header(out: &mut impl Write) -> io::Result<()> {
    out.write_all(&MAGIC)?;
    out.write_all(&[FORMAT_VERSION])
}

fn write_record(out: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    out.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    out.write_all(&(payload.len() as u32).to_le_bytes())?;
    out.write_all(&payload)
}

/// Read one record. `Ok(None)` ends the load: clean EOF, a torn tail and a
/// checksum or decode failure all stop replay at the last good record.
fn read_record(reader: &mut impl Read) -> io::Result<Option<Event>> {
    let mut prefix = [0u8; 8];
    match reader.read_exact(&mut prefix) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let stored_crc = u32::from_le_bytes(prefix[..4].try_into().expect("4-byte slice"));
    let len = u32::from_le_bytes(prefix[4..].try_into().expect("4-byte slice")) as usize;

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    if crc32fast::hash(&payload) != stored_crc {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload).ok())
}

impl Journal {
    /// Open for appending, stamping the header on a brand-new file.
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() == 0 {
            write_header(&mut file)?;
            file.sync_all()?;
        }
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            entries_since_compact: 0,
        })
    }

    /// Rebuild the event history. A missing file (or one cut off inside the
    /// header) is an empty journal; a file carrying some other header is
    /// refused.
    pub fn load(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);

        let mut header = [0u8; HEADER_LEN];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }
        if header[..4] != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not an innkeep journal",
            ));
        }
        if header[4] != FORMAT_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported journal version {}", header[4]),
            ));
        }

        let mut events = Vec::new();
        while let Some(event) = read_record(&mut reader)? {
            events.push(event);
        }
        Ok(events)
    }

    /// Buffer one event. Nothing is durable until `commit`.
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        write_record(&mut self.writer, event)?;
        self.entries_since_compact += 1;
        Ok(())
    }

    /// Flush buffered records and fsync — the group-commit point.
    pub fn commit(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    /// Replace the journal with a snapshot of the current state: write a
    /// fresh file beside the old one, fsync it, then atomically rename it
    /// into place and continue appending there. The writer task owns the
    /// journal exclusively, so no cross-phase locking is involved.
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        let tmp = self.path.with_extension("journal.tmp");
        let mut out = BufWriter::new(File::create(&tmp)?);
        write_header(&mut out)?;
        for event in events {
            write_record(&mut out, event)?;
        }
        out.flush()?;
        out.get_ref().sync_all()?;

        fs::rename(&tmp, &self.path)?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.entries_since_compact = 0;
        Ok(())
    }

    /// Appends buffered or committed since the last compaction.
    pub fn entries_since_compact(&self) -> u64 {
        self.entries_since_compact
    }
}
