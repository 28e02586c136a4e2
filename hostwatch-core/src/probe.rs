use crate::error::Result;
use crate::metrics::{InterfaceCounters, RawSnapshot, Volume};

/// Platform-specific source of raw counters.
///
/// Implementations only read the operating system; every derived value
/// (CPU percent, rates) is computed by the callers.
pub trait MetricsProbe: Send + Sync {
    fn snapshot(&self) -> Result<RawSnapshot>;

    fn volumes(&self) -> Result<Vec<Volume>>;

    fn interfaces(&self) -> Result<Vec<InterfaceCounters>>;
}
