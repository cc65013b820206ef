use std::path::Path;

use tracing::{debug, info};

use crate::{
    context::create_context, diagnostics::Result, exception::ExceptionRecord, execute::execute,
    platform::Platform, report::report_exception, source::SourceUnit, streams::Streams,
};

/// Reads the script at `path` and runs it as the top-level program of a fresh
/// context. Returns whether it compiled and ran; failures have already been
/// reported on the error stream.
pub fn run_file(platform: &Platform, path: &Path, mut streams: Streams) -> Result<bool> {
    let source = match SourceUnit::read(path) {
        Ok(source) => source,
        Err(error) => {
            debug!(path = %path.display(), %error, "entry script is unreadable");
            report_exception(&ExceptionRecord::bare(error.to_string()), streams.err());
            streams.flush()?;
            return Ok(false);
        }
    };

    let mut interp = create_context(platform, streams);
    let succeeded = execute(&mut interp, &source, true, true).succeeded();
    info!(origin = %source.origin, succeeded, "script finished");
    interp.streams_mut().flush()?;
    Ok(succeeded)
}
