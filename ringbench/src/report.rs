//! CSV rendering of benchmark summaries.

use std::fmt;
use std::io::Write;

use crate::error::Result;
use crate::stats::BenchmarkSummary;

/// Column contract of the CSV stream
pub struct CsvReport;

impl CsvReport {
    pub const HEADER: &'static str =
        "name,vendor,ring_buffer_sz,iteration_n,msg_n,msg_type,producer_n,consumer_n,min,max,p50,p75,p90,p99";

    pub fn header() -> &'static str {
        Self::HEADER
    }

    pub fn write_header<W: Write>(writer: &mut W) -> Result<()> {
        writeln!(writer, "{}", Self::HEADER)?;
        Ok(())
    }

    /// One row per summary.
    pub fn write_all<W: Write>(writer: &mut W, summaries: &[BenchmarkSummary]) -> Result<()> {
        for summary in summaries {
            writeln!(writer, "{summary}")?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for BenchmarkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{},{:.5},{:.5},{:.5},{:.5},{:.5},{:.5}",
            self.key.name,
            self.key.vendor,
            self.key.capacity,
            self.iteration_num,
            self.total_msg_num,
            self.key.msg_type,
            self.key.producers,
            self.key.consumers,
            self.min,
            self.max,
            self.p50,
            self.p75,
            self.p90,
            self.p99
        )
    }
}
