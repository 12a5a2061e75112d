use anyhow::Result;
use clap::ValueEnum;
use crossover::CrossoverRecord;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

const COLUMNS: [&str; 12] = [
    "lon",
    "lat",
    "value1",
    "value2",
    "time1",
    "time2",
    "delta_value",
    "delta_time",
    "track_id1",
    "track_id2",
    "mission_id1",
    "mission_id2",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Tab separated columns with a header line.
    Tsv,
    /// Comma separated columns with a header line.
    Csv,
    /// A JSON array of records.
    Json,
}

/// Opens `path`, or stdout if absent.
pub fn open(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

pub fn write_records(records: &[CrossoverRecord], format: Format, out: &mut dyn Write) -> Result<()> {
    match format {
        Format::Tsv => write_delimited(records, '\t', out)?,
        Format::Csv => write_delimited(records, ',', out)?,
        Format::Json => {
            serde_json::to_writer(&mut *out, records)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn write_delimited(records: &[CrossoverRecord], sep: char, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{}", COLUMNS.join(&sep.to_string()))?;
    for r in records {
        writeln!(
            out,
            "{lon}{sep}{lat}{sep}{v1}{sep}{v2}{sep}{t1}{sep}{t2}{sep}{dv}{sep}{dt}{sep}{tr1}{sep}{tr2}{sep}{m1}{sep}{m2}",
            lon = r.lon,
            lat = r.lat,
            v1 = r.value1,
            v2 = r.value2,
            t1 = r.time1,
            t2 = r.time2,
            dv = r.delta_value,
            dt = r.delta_time,
            tr1 = r.track_id1,
            tr2 = r.track_id2,
            m1 = r.mission_id1,
            m2 = r.mission_id2,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{write_records, Format};
    use crossover::CrossoverRecord;

    fn record() -> CrossoverRecord {
        CrossoverRecord {
            lon: -70.5,
            lat: 44.25,
            value1: 10.0,
            value2: 12.5,
            time1: 2004.0,
            time2: 2003.0,
            delta_value: -2.5,
            delta_time: 1.0,
            track_id1: 7,
            track_id2: 8,
            mission_id1: 0,
            mission_id2: 1,
        }
    }

    #[test]
    fn test_tsv() {
        let mut out = Vec::new();
        write_records(&[record()], Format::Tsv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("lon\tlat\tvalue1"));
        assert_eq!(lines[1], "-70.5\t44.25\t10\t12.5\t2004\t2003\t-2.5\t1\t7\t8\t0\t1");
    }

    #[test]
    fn test_csv() {
        let mut out = Vec::new();
        write_records(&[record()], Format::Csv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1), Some("-70.5,44.25,10,12.5,2004,2003,-2.5,1,7,8,0,1"));
    }

    #[test]
    fn test_json() {
        let mut out = Vec::new();
        write_records(&[record()], Format::Json, &mut out).unwrap();
        let parsed: Vec<CrossoverRecord> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, vec![record()]);
    }
}
