use std::io::{self, Read, Write};

use thiserror::Error;

use crate::data::{JetRecord, RunSummary};
use crate::error::Error;
use crate::tags::*;

/// Writer for jet record files
///
/// The run statistics have to be written exactly once, before the
/// first event.
#[derive(Debug)]
pub struct Writer<Stream: Write> {
    stream: Stream,
    state: State,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Header,
    Events,
    EventsOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("Run statistics have to be written before the first event")]
    MissingStats,
    #[error("Run statistics written twice or after an event")]
    MisplacedStats,
    #[error("Header has to be written before the run statistics")]
    MisplacedHeader,
}

/// Format a floating point number such that it is read back exactly
pub(crate) fn fmt_float(x: f64) -> String {
    ryu::Buffer::new().format(x).to_owned()
}

impl<Stream: Write> Writer<Stream> {
    /// Start a new jet record file
    ///
    /// # Example
    ///
    /// ```rust
    /// let mut writer = dijet::Writer::new(Vec::new(), dijet::VERSION).unwrap();
    /// writer.write_stats(&dijet::RunSummary::default()).unwrap();
    /// writer.write_event(&dijet::JetRecord::empty()).unwrap();
    /// writer.finish().unwrap();
    /// ```
    pub fn new(mut stream: Stream, version: &str) -> Result<Writer<Stream>, Error> {
        let output = [RECORDS_TAG_OPEN, "\"", version, "\">\n"];
        for text in &output {
            stream.write_all(text.as_bytes())?;
        }
        Ok(Writer {
            stream,
            state: State::Header,
        })
    }

    /// Writer that only emits event blocks
    ///
    /// The output can later be inserted into a complete file with
    /// [Writer::copy_events].
    pub fn events_only(stream: Stream) -> Writer<Stream> {
        Writer {
            stream,
            state: State::EventsOnly,
        }
    }

    fn write<T: std::fmt::Display + ?Sized>(&mut self, expr: &T) -> Result<(), io::Error> {
        write!(self.stream, "{expr}")
    }

    fn write_entry(&mut self, name: &str, value: &str) -> Result<(), io::Error> {
        writeln!(self.stream, "<{name}>{value}</{name}>")
    }

    /// Free-form comment describing the run
    pub fn write_header(&mut self, header: &str) -> Result<(), Error> {
        if self.state != State::Header {
            return Err(WriteError::MisplacedHeader.into());
        }
        let output = [COMMENT_START, "\n", header, "\n", COMMENT_END, "\n"];
        for text in &output {
            self.write(text)?;
        }
        Ok(())
    }

    pub fn write_stats(&mut self, summary: &RunSummary) -> Result<(), Error> {
        if self.state != State::Header {
            return Err(WriteError::MisplacedStats.into());
        }
        self.write(STATS_START)?;
        self.write("\n")?;
        self.write_entry(N_EVENTS, &summary.n_events.to_string())?;
        writeln!(
            self.stream,
            "<{SIGMA_GEN} {SIGMA_ERR_ATTR}=\"{}\">{}</{SIGMA_GEN}>",
            fmt_float(summary.sigma_err_mb),
            fmt_float(summary.sigma_gen_mb)
        )?;
        self.write_entry(PT_HAT_MIN, &fmt_float(summary.pt_hat_min))?;
        // an open window is stored as a negative upper bound
        let pt_hat_max = summary.pt_hat_max.unwrap_or(-1.);
        self.write_entry(PT_HAT_MAX, &fmt_float(pt_hat_max))?;
        self.write_entry(N_ACCEPTED, &summary.n_accepted.to_string())?;
        self.write_entry(N_SKIPPED, &summary.n_skipped.to_string())?;
        self.write_entry(N_JETS_DROPPED, &summary.n_jets_dropped.to_string())?;
        self.write(STATS_END)?;
        self.write("\n")?;
        self.state = State::Events;
        Ok(())
    }

    pub fn write_event(&mut self, event: &JetRecord) -> Result<(), Error> {
        if self.state == State::Header {
            return Err(WriteError::MissingStats.into());
        }
        writeln!(self.stream, "{EVENT_START} {N_JETS_ATTR}=\"{}\">", event.n_jets())?;
        let mut buf = ryu::Buffer::new();
        for jet in event.jets() {
            for (i, x) in [jet.pt, jet.eta, jet.phi, jet.area].into_iter().enumerate() {
                if i > 0 {
                    self.stream.write_all(b" ")?;
                }
                self.stream.write_all(buf.format(x).as_bytes())?;
            }
            self.stream.write_all(b"\n")?;
        }
        self.write(EVENT_END)?;
        self.write("\n")?;
        Ok(())
    }

    /// Append event blocks produced by a [Writer::events_only] writer
    pub fn copy_events<R: Read>(&mut self, mut events: R) -> Result<u64, Error> {
        if self.state != State::Events {
            return Err(WriteError::MissingStats.into());
        }
        Ok(io::copy(&mut events, &mut self.stream)?)
    }

    /// Close the file and flush the output
    pub fn finish(&mut self) -> Result<(), Error> {
        match self.state {
            State::Header => return Err(WriteError::MissingStats.into()),
            State::Events => {
                self.write(RECORDS_LAST_LINE)?;
                self.write("\n")?;
            }
            State::EventsOnly => {}
        }
        self.stream.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Stream {
        self.stream
    }
}
