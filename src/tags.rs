pub(crate) const RECORDS_TAG_OPEN: &str = "<JetRecords version=";
pub(crate) const RECORDS_LAST_LINE: &str = "</JetRecords>";
pub(crate) const COMMENT_START: &str = "<!--";
pub(crate) const COMMENT_END: &str = "-->";
pub(crate) const STATS_START: &str = "<stats>";
pub(crate) const STATS_END: &str = "</stats>";
pub(crate) const EVENT_START: &str = "<event";
pub(crate) const EVENT_END: &str = "</event>";

pub(crate) const N_EVENTS: &str = "nEvents";
pub(crate) const SIGMA_GEN: &str = "sigmaGen_mb";
pub(crate) const SIGMA_ERR_ATTR: &str = "err";
pub(crate) const PT_HAT_MIN: &str = "ptHatMin";
pub(crate) const PT_HAT_MAX: &str = "ptHatMax";
pub(crate) const N_ACCEPTED: &str = "nAccepted";
pub(crate) const N_SKIPPED: &str = "nSkipped";
pub(crate) const N_JETS_DROPPED: &str = "nJetsDropped";
pub(crate) const N_JETS_ATTR: &str = "nJets";

/// Current version of the jet record format
pub const VERSION: &str = "1.0";
