use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{EmittedInterval, SequenceDictionary};

/// Failure to write the finalized intervals.
#[derive(Debug, Error)]
#[error("failed to write intervals to {}: {source}", path.display())]
pub struct IntervalWriteError {
    /// Destination that could not be written.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

/// On-disk layout of an interval file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalFormat {
    /// Picard interval list: SAM-style header, then tab-separated rows.
    IntervalList,
    /// One `contig:start-end` per line.
    Plain,
}

impl IntervalFormat {
    /// `.interval_list` selects [`IntervalFormat::IntervalList`]; anything else is plain.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("interval_list") => IntervalFormat::IntervalList,
            _ => IntervalFormat::Plain,
        }
    }
}

fn plain_line(interval: &EmittedInterval) -> String {
    if interval.length() == 1 {
        format!("{}:{}", interval.contig, interval.start)
    } else {
        interval.to_string()
    }
}

/// Write `intervals` in `format`.
pub fn write_intervals<W: Write>(
    writer: &mut W,
    format: IntervalFormat,
    intervals: &[EmittedInterval],
    dictionary: &SequenceDictionary,
) -> io::Result<()> {
    match format {
        IntervalFormat::IntervalList => {
            writeln!(writer, "@HD\tVN:1.6\tSO:coordinate")?;
            for contig in dictionary.iter() {
                writeln!(writer, "@SQ\tSN:{}\tLN:{}", contig.name, contig.length)?;
            }
            for interval in intervals {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t+\t.",
                    interval.contig, interval.start, interval.end
                )?;
            }
        }
        IntervalFormat::Plain => {
            for interval in intervals {
                writeln!(writer, "{}", plain_line(interval))?;
            }
        }
    }
    writer.flush()
}

/// Render intervals to a string.
pub fn render_intervals(
    format: IntervalFormat,
    intervals: &[EmittedInterval],
    dictionary: &SequenceDictionary,
) -> io::Result<String> {
    let mut buffer = Vec::new();
    write_intervals(&mut buffer, format, intervals, dictionary)?;
    String::from_utf8(buffer).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Create `path` and write the intervals, picking the format from its extension.
pub fn write_intervals_to_path(
    path: &Path,
    intervals: &[EmittedInterval],
    dictionary: &SequenceDictionary,
) -> Result<(), IntervalWriteError> {
    let wrap = |source| IntervalWriteError {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(wrap)?);
    write_intervals(&mut writer, IntervalFormat::from_path(path), intervals, dictionary)
        .map_err(wrap)
}
