use super::ExportError;
use crate::results::SimulationResults;

pub(crate) fn export_to_json_impl(
    results: &SimulationResults,
    file: std::fs::File,
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}

pub(crate) fn import_from_json_impl(file: std::fs::File) -> Result<SimulationResults, ExportError> {
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}
