//! JSON-lines step stream.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use edep_types::StepRecord;

use crate::error::EngineError;

/// Iterates the step records of a JSON-lines stream, one per line.
///
/// Blank lines are skipped. A line that fails to decode ends the stream
/// with [`EngineError::Input`].
#[derive(Debug)]
pub struct StepReader<R> {
    path: PathBuf,
    lines: std::io::Lines<R>,
    line: usize,
}

impl<R: BufRead> StepReader<R> {
    /// Read steps from `reader`; `path` is used in error messages.
    pub fn new(path: &Path, reader: R) -> Self {
        Self {
            path: path.to_path_buf(),
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for StepReader<R> {
    type Item = Result<StepRecord, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(source) => {
                    return Some(Err(EngineError::Io {
                        path: self.path.clone(),
                        source,
                    }));
                }
            };
            self.line = self.line.saturating_add(1);
            if text.trim().is_empty() {
                continue;
            }
            return Some(StepRecord::from_json(&text).map_err(|source| EngineError::Input {
                path: self.path.clone(),
                line: self.line,
                source,
            }));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use edep_types::{EventId, TrackId};

    use super::*;

    const LINE: &str = r#"{"event_id":4,"track_id":1,"particle_name":"gamma","current_volume":"World.Target","pre_step_position":[0,0,0],"post_step_position":[0,0,1],"momentum_direction":[0,0,1],"pre_step_kinetic_energy":1.0,"post_step_kinetic_energy":1.0,"energy_deposit":0.0,"global_time":0.0}"#;

    #[test]
    fn skips_blank_lines() {
        let text = format!("\n{LINE}\n   \n{LINE}\n");
        let steps: Vec<StepRecord> = StepReader::new(Path::new("steps.jsonl"), text.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].event_id, EventId(4));
        assert_eq!(steps[1].parent_id, TrackId::NONE);
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let text = format!("{LINE}\n\n{{\"event_id\": 4}}\n{LINE}\n");
        let mut reader = StepReader::new(Path::new("steps.jsonl"), text.as_bytes());
        assert!(reader.next().unwrap().is_ok());
        match reader.next().unwrap() {
            Err(EngineError::Input { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected an input error, got {other:?}"),
        }
    }
}
