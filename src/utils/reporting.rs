use std::io::Write;
use std::path::Path;

use csv::Writer;

use crate::analyzers::duplicate::{compare_audio_properties, DuplicateGroup};
use crate::Result;

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_duplicate_report(&self, groups: &[DuplicateGroup], output_path: impl AsRef<Path>) -> Result<()> {
        let output_path_ref = output_path.as_ref();
        let writer = Writer::from_path(output_path_ref)?;
        self.write_duplicate_report(groups, writer)?;
        log::info!("Duplicate report generated: {}", output_path_ref.display());
        Ok(())
    }

    /// One row per group member. The duration difference is measured
    /// against the group's original.
    pub fn write_duplicate_report<W: Write>(&self, groups: &[DuplicateGroup], mut writer: Writer<W>) -> Result<()> {
        writer.write_record([
            "Group",
            "Match Type",
            "Confidence",
            "Path",
            "Title",
            "Artist",
            "Duration Difference (s)",
        ])?;

        for (index, group) in groups.iter().enumerate() {
            let original = &group.original().track;
            for member in group.members() {
                let duration_diff = compare_audio_properties(original, &member.track)
                    .duration_diff
                    .map_or_else(String::new, |d| format!("{:.2}", d));

                writer.write_record([
                    (index + 1).to_string(),
                    member.match_type.to_string(),
                    format!("{:.3}", member.confidence),
                    member.path.display().to_string(),
                    member.track.display_title(),
                    member.track.metadata.artist.clone().unwrap_or_default(),
                    duration_diff,
                ])?;
            }
        }

        writer.flush()?;
        Ok(())
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
