//! Fixed-binning one-dimensional histograms
use std::io::Write;
use std::path::Path;

use itertools::Itertools;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;
use xmltree::{EmitterConfig, XMLNode};

use crate::error::Error;
use crate::store::{open_maybe_gz, write_atomically};
use crate::writer::fmt_float;
use crate::XmlTree;

const HISTOGRAMS_TAG: &str = "histograms";
const HISTOGRAM_TAG: &str = "histogram";
const CONTENTS_TAG: &str = "contents";
const ERRORS_TAG: &str = "errors";
const HISTOGRAM_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistogramError {
    #[error("Expected root element '{HISTOGRAMS_TAG}', found '{0}'")]
    BadRoot(String),
    #[error("Histogram is missing '{0}'")]
    MissingEntry(&'static str),
    #[error("Failed to convert to number: '{0}'")]
    ConversionError(String),
    #[error("Histogram '{name}' has {found} values, expected {expected}")]
    BinMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Invalid binning: {n_bins} bins in [{low}, {high})")]
    BadBinning { n_bins: usize, low: f64, high: f64 },
}

/// Histogram with equal-width bins over `[low, high)`
///
/// Bin 0 is the underflow and bin `n_bins + 1` the overflow. Values
/// at or above `high` as well as NaN go to the overflow. Every fill
/// counts as an entry, no matter which bin it lands in.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Hist1D {
    name: String,
    title: String,
    low: f64,
    high: f64,
    contents: Vec<f64>,
    sumw2: Vec<f64>,
    entries: u64,
}

impl Hist1D {
    pub fn new(
        name: &str,
        title: &str,
        n_bins: usize,
        low: f64,
        high: f64,
    ) -> Result<Self, HistogramError> {
        if n_bins == 0 || !low.is_finite() || !high.is_finite() || low >= high {
            return Err(HistogramError::BadBinning { n_bins, low, high });
        }
        Ok(Self {
            name: name.to_owned(),
            title: title.to_owned(),
            low,
            high,
            contents: vec![0.; n_bins + 2],
            sumw2: vec![0.; n_bins + 2],
            entries: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn n_bins(&self) -> usize {
        self.contents.len() - 2
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.n_bins() as f64
    }

    /// Lower edge of bin `bin`, counting the underflow as bin 0
    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        self.low + (bin as f64 - 1.) * self.bin_width()
    }

    /// Index of the bin `x` falls into
    pub fn find_bin(&self, x: f64) -> usize {
        let n = self.n_bins();
        if x.is_nan() || x >= self.high {
            n + 1
        } else if x < self.low {
            0
        } else {
            let bin = ((x - self.low) / self.bin_width()) as usize;
            1 + bin.min(n - 1)
        }
    }

    pub fn fill(&mut self, x: f64) -> usize {
        self.fill_weighted(x, 1.)
    }

    /// Add `weight` to the bin `x` falls into and return that bin
    pub fn fill_weighted(&mut self, x: f64, weight: f64) -> usize {
        let bin = self.find_bin(x);
        self.contents[bin] += weight;
        self.sumw2[bin] += weight * weight;
        self.entries += 1;
        bin
    }

    /// Number of fills, including under- and overflow
    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn bin_content(&self, bin: usize) -> f64 {
        self.contents[bin]
    }

    /// Statistical uncertainty, the square root of the summed squared weights
    pub fn bin_error(&self, bin: usize) -> f64 {
        self.sumw2[bin].sqrt()
    }

    pub fn underflow(&self) -> f64 {
        self.contents[0]
    }

    pub fn overflow(&self) -> f64 {
        self.contents[self.n_bins() + 1]
    }

    /// Sum of the contents of all regular bins
    pub fn integral(&self) -> f64 {
        self.contents[1..=self.n_bins()].iter().sum()
    }

    /// Sum of the contents of all bins, including under- and overflow
    pub fn total(&self) -> f64 {
        self.contents.iter().sum()
    }

    pub fn to_xml(&self) -> XmlTree {
        let mut hist = XmlTree::new(HISTOGRAM_TAG);
        let attr = [
            ("name", self.name.clone()),
            ("title", self.title.clone()),
            ("bins", self.n_bins().to_string()),
            ("low", fmt_float(self.low)),
            ("high", fmt_float(self.high)),
            ("entries", self.entries.to_string()),
        ];
        for (key, value) in attr {
            hist.attributes.insert(key.to_owned(), value);
        }
        let errors = self.sumw2.iter().map(|w2| w2.sqrt());
        for (tag, values) in [
            (CONTENTS_TAG, self.contents.iter().copied().map(fmt_float).join(" ")),
            (ERRORS_TAG, errors.map(fmt_float).join(" ")),
        ] {
            let mut child = XmlTree::new(tag);
            child.children.push(XMLNode::Text(values));
            hist.children.push(XMLNode::Element(child));
        }
        hist
    }

    pub fn from_xml(hist: &XmlTree) -> Result<Self, HistogramError> {
        use HistogramError::*;
        let attr = |key: &'static str| {
            hist.attributes
                .get(key)
                .map(|value| value.as_str())
                .ok_or(MissingEntry(key))
        };
        let float = |text: &str| -> Result<f64, HistogramError> {
            fast_float::parse(text).map_err(|_| ConversionError(text.to_owned()))
        };
        let n_bins: usize = {
            let bins = attr("bins")?;
            bins.parse().map_err(|_| ConversionError(bins.to_owned()))?
        };
        let mut res = Self::new(
            attr("name")?,
            attr("title")?,
            n_bins,
            float(attr("low")?)?,
            float(attr("high")?)?,
        )?;
        let entries = attr("entries")?;
        res.entries = entries
            .parse()
            .map_err(|_| ConversionError(entries.to_owned()))?;

        let values = |tag: &'static str| -> Result<Vec<f64>, HistogramError> {
            let text = hist
                .get_child(tag)
                .and_then(|child| child.get_text())
                .ok_or(MissingEntry(tag))?;
            let values = text
                .split_whitespace()
                .map(float)
                .collect::<Result<Vec<_>, _>>()?;
            if values.len() != n_bins + 2 {
                return Err(BinMismatch {
                    name: histogram_name(hist),
                    expected: n_bins + 2,
                    found: values.len(),
                });
            }
            Ok(values)
        };
        res.contents = values(CONTENTS_TAG)?;
        res.sumw2 = values(ERRORS_TAG)?.into_iter().map(|e| e * e).collect();
        Ok(res)
    }
}

fn histogram_name(hist: &XmlTree) -> String {
    hist.attributes.get("name").cloned().unwrap_or_default()
}

/// Write all histograms to a single XML file
///
/// The file at `path` is only replaced once everything has been written.
pub fn write_histograms<P: AsRef<Path>>(path: P, histograms: &[Hist1D]) -> Result<(), Error> {
    let mut root = XmlTree::new(HISTOGRAMS_TAG);
    root.attributes
        .insert("version".to_owned(), HISTOGRAM_VERSION.to_owned());
    root.children
        .extend(histograms.iter().map(|h| XMLNode::Element(h.to_xml())));
    write_atomically(path.as_ref(), |stream| {
        let config = EmitterConfig::new().perform_indent(true);
        root.write_with_config(&mut *stream, config)
            .map_err(|err| Error::Xml(err.to_string()))?;
        stream.write_all(b"\n")?;
        Ok(())
    })
}

/// Read all histograms from an XML file
pub fn read_histograms<P: AsRef<Path>>(path: P) -> Result<Vec<Hist1D>, Error> {
    let stream = open_maybe_gz(path.as_ref())?;
    let root = XmlTree::parse(stream).map_err(|err| Error::Xml(err.to_string()))?;
    if root.name != HISTOGRAMS_TAG {
        return Err(HistogramError::BadRoot(root.name).into());
    }
    let histograms = root
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .filter(|el| el.name == HISTOGRAM_TAG)
        .map(Hist1D::from_xml)
        .collect::<Result<_, _>>()?;
    Ok(histograms)
}
