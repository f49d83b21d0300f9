use std::collections::HashMap;
use std::io::BufRead;
use std::str;

use thiserror::Error;

use crate::data::{Jet, JetRecord, RecordError, RunSummary, MAX_JETS};
use crate::error::Error;
use crate::tags::*;
use crate::XmlTree;

type XmlAttr = HashMap<String, String>;

/// Reader for jet record files
#[derive(Debug)]
pub struct Reader<T> {
    stream: T,
    version: &'static str,
    header: String,
    summary: RunSummary,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("First line '{0}' in input does not start with '{RECORDS_TAG_OPEN}'")]
    BadFirstLine(String),
    #[error(
        "Encountered unrecognized line '{0}', expected a comment starting with \
         '{COMMENT_START}' or the run statistics starting with '{STATS_START}'"
    )]
    BadHeaderStart(String),
    #[error("Run statistics missing, found '{0}' instead")]
    MissingStats(String),
    #[error("Malformed run statistics: {0}")]
    BadStats(String),
    #[error("Encountered malformed xml tag: '{0}'")]
    BadXmlTag(String),
    #[error("Encountered unrecognized line '{0}', expected an event starting with '{EVENT_START}'")]
    BadEventStart(String),
    #[error("Missing entry '{0}'")]
    MissingEntry(String),
    #[error("Failed to convert to number: '{0}'")]
    ConversionError(String),
    #[error("Unexpected entry '{0}' after jet properties")]
    TrailingEntry(String),
    #[error("Event announces {expected} jets, but contains {found}")]
    JetCountMismatch { expected: usize, found: usize },
    #[error("Unsupported version {0}, only {VERSION} is supported")]
    UnsupportedVersion(String),
    #[error("Version information missing")]
    MissingVersion,
    #[error("Encountered '{0}' block without closing tag")]
    EndOfFile(&'static str),
}

impl<T: BufRead> Reader<T> {
    /// Create a new jet record reader
    ///
    /// Fails if the run statistics are missing.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// let file = std::fs::File::open("jets_ptHat_30_50_jetR0.4.jets").unwrap();
    /// let file = std::io::BufReader::new(file);
    /// let reader = dijet::Reader::new(file).unwrap();
    /// println!("{} events requested", reader.run_summary().n_events);
    /// ```
    pub fn new(mut stream: T) -> Result<Reader<T>, Error> {
        let version = parse_version(&mut stream)?;
        let (header, stats_start) = parse_header(&mut stream)?;
        let summary = parse_stats(&stats_start, &mut stream)?;
        Ok(Reader {
            stream,
            version,
            header,
            summary,
        })
    }

    /// Get the format version
    pub fn version(&self) -> &str {
        self.version
    }

    /// Get the comment describing the run
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Get the run statistics
    pub fn run_summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Get the jets of the next event
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// let file = std::fs::File::open("jets_ptHat_30_50_jetR0.4.jets").unwrap();
    /// let file = std::io::BufReader::new(file);
    /// let mut reader = dijet::Reader::new(file).unwrap();
    ///
    /// match reader.record().unwrap() {
    ///    Some(record) => println!("Found an event with {} jets.", record.n_jets()),
    ///    None => println!("Reached end of jet record file."),
    /// }
    /// ```
    pub fn record(&mut self) -> Result<Option<JetRecord>, Error> {
        let mut line = String::new();
        if self.stream.read_line(&mut line)? == 0 {
            return Err(ParseError::EndOfFile("JetRecords").into());
        }
        if line.starts_with(EVENT_START) {
            Ok(Some(parse_event(&line, &mut self.stream)?))
        } else if line.trim() == RECORDS_LAST_LINE {
            Ok(None)
        } else {
            Err(ParseError::BadEventStart(line).into())
        }
    }
}

impl<T: BufRead> Iterator for Reader<T> {
    type Item = Result<JetRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.record().transpose()
    }
}

fn parse_version<T: BufRead>(stream: &mut T) -> Result<&'static str, Error> {
    let mut first_line = String::new();
    stream.read_line(&mut first_line)?;
    if !first_line.trim_start().starts_with(RECORDS_TAG_OPEN) {
        return Err(ParseError::BadFirstLine(first_line).into());
    }
    let attr = extract_xml_attr(&first_line)?;
    match attr.get("version").map(|v| v.as_str()) {
        Some(VERSION) => Ok(VERSION),
        Some(version) => Err(ParseError::UnsupportedVersion(version.to_owned()).into()),
        None => Err(ParseError::MissingVersion.into()),
    }
}

fn parse_header<T: BufRead>(stream: &mut T) -> Result<(String, String), Error> {
    let mut header = String::new();
    loop {
        let mut text = String::new();
        if stream.read_line(&mut text)? == 0 {
            return Err(ParseError::MissingStats(text).into());
        }
        let line = text.trim();
        if line.starts_with(COMMENT_START) {
            if line != COMMENT_START {
                return Err(ParseError::BadHeaderStart(text).into());
            }
            let mut comment = String::new();
            read_lines_until(stream, &mut comment, COMMENT_END, "comment")?;
            pop_line(&mut comment);
            header.push_str(&comment);
        } else if line == STATS_START {
            return Ok((header, text));
        } else if line.starts_with(EVENT_START) || line == RECORDS_LAST_LINE {
            return Err(ParseError::MissingStats(text).into());
        } else {
            return Err(ParseError::BadHeaderStart(text).into());
        }
    }
}

// Remove the last line, including the preceding newline
fn pop_line(s: &mut String) {
    s.pop();
    while !s.is_empty() && !s.ends_with('\n') {
        s.pop();
    }
    if s.ends_with('\n') {
        s.pop();
    }
}

fn read_lines_until<T: BufRead>(
    stream: &mut T,
    text: &mut String,
    end: &str,
    block: &'static str,
) -> Result<(), Error> {
    loop {
        let start = text.len();
        if stream.read_line(text)? == 0 {
            return Err(ParseError::EndOfFile(block).into());
        }
        if text[start..].trim() == end {
            return Ok(());
        }
    }
}

fn parse<T: str::FromStr>(name: &str, text: Option<&str>) -> Result<T, ParseError> {
    let text = text.ok_or_else(|| ParseError::MissingEntry(name.to_owned()))?;
    text.trim()
        .parse::<T>()
        .map_err(|_| ParseError::ConversionError(text.to_owned()))
}

fn parse_float(name: &str, text: Option<&str>) -> Result<f64, ParseError> {
    let text = text.ok_or_else(|| ParseError::MissingEntry(name.to_owned()))?;
    fast_float::parse(text.trim()).map_err(|_| ParseError::ConversionError(text.to_owned()))
}

fn extract_xml_attr_str(xml_tag: &str) -> Result<&str, ParseError> {
    let tag = xml_tag.trim();
    let Some(tag) = tag.strip_suffix('>') else {
        return Err(ParseError::BadXmlTag(xml_tag.to_owned()));
    };
    match tag.find(char::is_whitespace) {
        None => Ok(""),
        Some(idx) => Ok(tag[idx + 1..].trim_start()),
    }
}

struct Attr<'a> {
    name: &'a str,
    value: &'a str,
}

fn next_attr(attr_str: &str) -> Result<(Option<Attr>, &str), ParseError> {
    let bad_tag = || ParseError::BadXmlTag(attr_str.to_owned());
    let mut rem = attr_str;
    let name = match rem.find(|c: char| c.is_whitespace() || c == '=') {
        None => return Ok((None, rem)),
        Some(idx) => &rem[..idx],
    };
    rem = rem[name.len()..].trim_start();
    rem = rem.strip_prefix('=').ok_or_else(bad_tag)?.trim_start();
    let quote = match rem.chars().next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Err(bad_tag()),
    };
    rem = &rem[1..];
    let value = match rem.find(quote) {
        Some(idx) => &rem[..idx],
        None => return Err(bad_tag()),
    };
    rem = rem[value.len() + 1..].trim_start();
    Ok((Some(Attr { name, value }), rem))
}

fn extract_xml_attr(xml_tag: &str) -> Result<XmlAttr, ParseError> {
    let mut attr_str = extract_xml_attr_str(xml_tag)?;
    let mut attr = XmlAttr::new();
    loop {
        let (parsed, rem) = next_attr(attr_str)?;
        match parsed {
            None => return Ok(attr),
            Some(next_attr) => {
                attr.insert(next_attr.name.to_owned(), next_attr.value.to_owned());
            }
        };
        attr_str = rem;
    }
}

fn stats_text(stats: &XmlTree, name: &str) -> Option<String> {
    stats
        .get_child(name)
        .and_then(|entry| entry.get_text())
        .map(|text| text.into_owned())
}

fn parse_stats<T: BufRead>(stats_open: &str, stream: &mut T) -> Result<RunSummary, Error> {
    let mut text = stats_open.to_owned();
    read_lines_until(stream, &mut text, STATS_END, "stats")?;
    let stats =
        XmlTree::parse(text.as_bytes()).map_err(|err| ParseError::BadStats(err.to_string()))?;

    let entry = |name: &str| stats_text(&stats, name);
    let optional_count = |name: &str| -> Result<u64, ParseError> {
        match entry(name) {
            Some(text) => parse(name, Some(text.as_str())),
            None => Ok(0),
        }
    };
    let sigma = stats
        .get_child(SIGMA_GEN)
        .ok_or_else(|| ParseError::MissingEntry(SIGMA_GEN.to_owned()))?;
    let sigma_gen_mb = parse_float(SIGMA_GEN, sigma.get_text().as_deref())?;
    let sigma_err_mb = match sigma.attributes.get(SIGMA_ERR_ATTR) {
        Some(err) => parse_float(SIGMA_ERR_ATTR, Some(err.as_str()))?,
        None => 0.,
    };
    let pt_hat_max = parse_float(PT_HAT_MAX, entry(PT_HAT_MAX).as_deref())?;
    Ok(RunSummary {
        n_events: parse(N_EVENTS, entry(N_EVENTS).as_deref())?,
        sigma_gen_mb,
        sigma_err_mb,
        pt_hat_min: parse_float(PT_HAT_MIN, entry(PT_HAT_MIN).as_deref())?,
        pt_hat_max: (pt_hat_max >= 0.).then_some(pt_hat_max),
        n_accepted: optional_count(N_ACCEPTED)?,
        n_skipped: optional_count(N_SKIPPED)?,
        n_jets_dropped: optional_count(N_JETS_DROPPED)?,
    })
}

fn parse_jet(line: &str) -> Result<Jet, ParseError> {
    let mut entries = line.split_whitespace();
    let jet = Jet {
        pt: parse_float("pt", entries.next())?,
        eta: parse_float("eta", entries.next())?,
        phi: parse_float("phi", entries.next())?,
        area: parse_float("area", entries.next())?,
    };
    if let Some(extra) = entries.next() {
        return Err(ParseError::TrailingEntry(extra.to_owned()));
    }
    Ok(jet)
}

fn parse_event<T: BufRead>(event_open: &str, stream: &mut T) -> Result<JetRecord, Error> {
    let attr = extract_xml_attr(event_open)?;
    let n_jets: usize = parse(N_JETS_ATTR, attr.get(N_JETS_ATTR).map(|s| s.as_str()))?;
    if n_jets > MAX_JETS {
        return Err(RecordError::CapacityExceeded(n_jets).into());
    }
    let mut jets = Vec::with_capacity(n_jets);
    loop {
        let mut line = String::new();
        if stream.read_line(&mut line)? == 0 {
            return Err(ParseError::EndOfFile("event").into());
        }
        if line.trim() == EVENT_END {
            break;
        }
        jets.push(parse_jet(&line)?);
    }
    if jets.len() != n_jets {
        return Err(ParseError::JetCountMismatch {
            expected: n_jets,
            found: jets.len(),
        }
        .into());
    }
    Ok(JetRecord::from_sorted(jets)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    const STATS: &str = "<stats>
<nEvents>10</nEvents>
<sigmaGen_mb err=\"0.0001\">0.002</sigmaGen_mb>
<ptHatMin>30.0</ptHatMin>
<ptHatMax>-1.0</ptHatMax>
</stats>
";

    fn file(body: &str) -> String {
        format!("<JetRecords version=\"1.0\">\n{body}")
    }

    #[test]
    fn read_correct() {
        let text = file(&format!(
            "<!--\nanti-kt R = 0.4\n-->\n{STATS}<event nJets=\"2\">\n40 0.5 1.0 0.49\n20 -0.25 -2.5 0.51\n</event>\n<event nJets=\"0\">\n</event>\n</JetRecords>\n"
        ));
        let mut reader = Reader::new(Cursor::new(text)).unwrap();
        assert_eq!(reader.version(), "1.0");
        assert_eq!(reader.header(), "anti-kt R = 0.4");
        let summary = reader.run_summary().clone();
        assert_eq!(summary.n_events, 10);
        assert_eq!(summary.sigma_gen_mb, 0.002);
        assert_eq!(summary.sigma_err_mb, 0.0001);
        assert_eq!(summary.pt_hat_min, 30.);
        assert_eq!(summary.pt_hat_max, None);
        assert_eq!(summary.n_accepted, 0);

        let first = reader.record().unwrap().unwrap();
        assert_eq!(first.n_jets(), 2);
        assert_eq!(first.jets()[1], Jet { pt: 20., eta: -0.25, phi: -2.5, area: 0.51 });
        let second = reader.record().unwrap().unwrap();
        assert!(second.is_empty());
        assert!(reader.record().unwrap().is_none());
    }

    #[test]
    fn missing_stats() {
        let text = file("<event nJets=\"0\">\n</event>\n</JetRecords>\n");
        assert!(matches!(
            Reader::new(Cursor::new(text)),
            Err(Error::Parse(ParseError::MissingStats(_)))
        ));
        assert!(matches!(
            Reader::new(Cursor::new(file(""))),
            Err(Error::Parse(ParseError::MissingStats(_)))
        ));
    }

    #[test]
    fn incomplete_stats() {
        let text = file("<stats>\n<nEvents>10</nEvents>\n</stats>\n</JetRecords>\n");
        assert!(matches!(
            Reader::new(Cursor::new(text)),
            Err(Error::Parse(ParseError::MissingEntry(_)))
        ));
    }

    #[test]
    fn bad_version() {
        let text = format!("<JetRecords version=\"2.0\">\n{STATS}</JetRecords>\n");
        assert!(matches!(
            Reader::new(Cursor::new(text)),
            Err(Error::Parse(ParseError::UnsupportedVersion(_)))
        ));
        assert!(matches!(
            Reader::new(Cursor::new("<histograms version=\"1.0\">\n")),
            Err(Error::Parse(ParseError::BadFirstLine(_)))
        ));
    }

    #[test]
    fn bad_events() {
        let read_first = |body: &str| {
            let text = file(&format!("{STATS}{body}</JetRecords>\n"));
            Reader::new(Cursor::new(text)).unwrap().record()
        };
        assert!(matches!(
            read_first("<event nJets=\"2\">\n40 0.5 1.0 0.49\n</event>\n"),
            Err(Error::Parse(ParseError::JetCountMismatch { expected: 2, found: 1 }))
        ));
        assert!(matches!(
            read_first("<event nJets=\"101\">\n</event>\n"),
            Err(Error::Record(RecordError::CapacityExceeded(101)))
        ));
        assert!(matches!(
            read_first("<event nJets=\"2\">\n20 0.5 1.0 0.49\n40 0.5 1.0 0.49\n</event>\n"),
            Err(Error::Record(RecordError::Unsorted(1)))
        ));
        assert!(matches!(
            read_first("<event nJets=\"1\">\n20 0.5 1.0\n</event>\n"),
            Err(Error::Parse(ParseError::MissingEntry(_)))
        ));
        assert!(matches!(
            read_first("<event nJets=\"1\">\n20 0.5 1.0 0.4 7\n</event>\n"),
            Err(Error::Parse(ParseError::TrailingEntry(_)))
        ));
        assert!(matches!(
            read_first("<event nJets=\"1\">\n20 0.5 x 0.4\n</event>\n"),
            Err(Error::Parse(ParseError::ConversionError(_)))
        ));
        assert!(matches!(
            read_first("<event>\n</event>\n"),
            Err(Error::Parse(ParseError::MissingEntry(_)))
        ));
        assert!(matches!(
            read_first("<jets nJets=\"0\">\n"),
            Err(Error::Parse(ParseError::BadEventStart(_)))
        ));
    }

    #[test]
    fn truncated_file() {
        let text = file(&format!("{STATS}<event nJets=\"0\">\n</event>\n"));
        let mut reader = Reader::new(Cursor::new(text)).unwrap();
        assert!(reader.record().unwrap().is_some());
        assert!(matches!(
            reader.record(),
            Err(Error::Parse(ParseError::EndOfFile(_)))
        ));
    }

    #[test]
    fn attributes() {
        let attr = extract_xml_attr("<event nJets=\"2\" weight = '0.5'>").unwrap();
        assert_eq!(attr.get("nJets").unwrap(), "2");
        assert_eq!(attr.get("weight").unwrap(), "0.5");
        assert!(extract_xml_attr("<event>").unwrap().is_empty());
        assert!(extract_xml_attr("<event nJets=2>").is_err());
        assert!(extract_xml_attr("<event nJets=\"2\"").is_err());
    }
}
