use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Append-only write-ahead log holding the full history of the engine.
///
/// Entry framing: `[u32: len][bincode: Event][u32: crc32]`, all
/// little-endian. `len` counts the bincode payload only. A crash can leave
/// at most one truncated entry at the tail; replay drops it via the
/// length-prefix and CRC check.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

fn write_entry(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

impl Wal {
    /// Open (or create) the log file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    /// Buffer one event without flushing. Call `flush_sync` after the batch
    /// to durably commit everything buffered — the group-commit path.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        write_entry(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Flush buffered entries and fsync the file.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    /// Append one event and fsync immediately. Test convenience; production
    /// goes through the group-commit writer.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Phase one of compaction: write the replacement event set to a temp
    /// file and fsync it. Slow I/O — runs outside any lock on the live log.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let tmp_path = path.with_extension("wal.tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for event in events {
            write_entry(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Phase two: atomically rename the temp file over the log and reopen.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Both compaction phases back to back. Used by tests.
    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    /// Read every valid event back from disk. A missing file is an empty
    /// history; a truncated or corrupt tail entry ends the replay silently.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            let mut payload = vec![0u8; u32::from_le_bytes(len_buf) as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                break; // corrupt entry — stop replaying
            }

            match bincode::deserialize::<Event>(&payload) {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
        }

        Ok(events)
    }
}
