//! Pure filtering and name computation.
//!
//! Selection and naming are deterministic so they can be tested without any
//! network or filesystem access: the engine feeds records in listing order
//! and receives plans in the same order with a strictly increasing counter.

use crate::model::{AttachmentRecord, RenamePlan};

/// Case-insensitive display-name prefix that selects a record for renaming.
pub const MATCH_PREFIX: &str = "image";

/// Split a file name into `(base, extension)`.
///
/// The extension starts at the last dot, except that a run of leading dots
/// never begins an extension (`.hidden` has no extension). The dot stays
/// with the extension so concatenating the parts restores the input.
#[must_use]
pub fn split_file_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|ch| ch != '.') => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Build the ordered rename plans for the matching records.
///
/// Records whose display name does not start with [`MATCH_PREFIX`]
/// (case-insensitively) are dropped; order is preserved and the counter
/// increments only for matches, starting at `start_index`. The base name and
/// extension are split from the stored filename when present, otherwise from
/// the display name with [`RenamePlan::name_split_fallback`] set so the
/// caller can warn once per such record.
#[must_use]
pub fn plan_renames(
    records: &[AttachmentRecord],
    prefix: &str,
    start_index: u32,
) -> Vec<RenamePlan> {
    let mut counter = start_index;
    let mut plans = Vec::new();

    for record in records {
        if !record.name.to_lowercase().starts_with(MATCH_PREFIX) {
            continue;
        }

        let (source, fallback) = record
            .filename
            .as_deref()
            .map_or((record.name.as_str(), true), |filename| (filename, false));
        let (base, extension) = split_file_name(source);

        plans.push(RenamePlan {
            attachment_id: record.id,
            original_name: record.name.clone(),
            new_name: format!("{prefix}{base}_{counter:05}{extension}"),
            item_id: record.item_id,
            local_path: None,
            name_split_fallback: fallback,
        });
        counter += 1;
    }

    plans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str, filename: Option<&str>) -> AttachmentRecord {
        AttachmentRecord {
            id,
            name: name.to_string(),
            filename: filename.map(str::to_string),
            item_id: Some(id * 10),
            item_type: Some(23),
        }
    }

    #[test]
    fn filter_matches_any_casing_of_the_prefix() {
        let records = vec![
            record(1, "Image.png", Some("Image.png")),
            record(2, "IMAGE.PNG", Some("IMAGE.PNG")),
            record(3, "imaGe.png", Some("imaGe.png")),
            record(4, "diagram.png", Some("diagram.png")),
            record(5, "my-image.png", Some("my-image.png")),
        ];

        let plans = plan_renames(&records, "", 1);
        let ids: Vec<i64> = plans.iter().map(|plan| plan.attachment_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn counters_are_consecutive_and_unique_from_the_seed() {
        let records: Vec<AttachmentRecord> = (0..4)
            .map(|idx| record(idx, "image.png", Some("image.png")))
            .collect();

        let plans = plan_renames(&records, "X_", 7);
        let names: Vec<&str> = plans.iter().map(|plan| plan.new_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "X_image_00007.png",
                "X_image_00008.png",
                "X_image_00009.png",
                "X_image_00010.png",
            ]
        );
    }

    #[test]
    fn counter_skips_non_matching_records() {
        let records = vec![
            record(1, "image-a.png", Some("image-a.png")),
            record(2, "readme.md", Some("readme.md")),
            record(3, "image-b.png", Some("image-b.png")),
        ];

        let plans = plan_renames(&records, "", 1);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].new_name, "image-a_00001.png");
        assert_eq!(plans[1].new_name, "image-b_00002.png");
    }

    #[test]
    fn known_rename_round_trip() {
        let records = vec![record(1, "image 3", Some("photo.jpg"))];
        let plans = plan_renames(&records, "PK_", 7);
        assert_eq!(plans[0].new_name, "PK_photo_00007.jpg");
        assert!(!plans[0].name_split_fallback);
    }

    #[test]
    fn missing_filename_falls_back_to_display_name_and_flags_it() {
        let records = vec![record(9, "image-capture.png", None)];
        let plans = plan_renames(&records, "", 3);
        assert_eq!(plans[0].new_name, "image-capture_00003.png");
        assert!(plans[0].name_split_fallback);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(plan_renames(&[], "PK_", 1).is_empty());
    }

    #[test]
    fn split_handles_edge_cases() {
        assert_eq!(split_file_name("photo.jpg"), ("photo", ".jpg"));
        assert_eq!(split_file_name("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_file_name("noext"), ("noext", ""));
        assert_eq!(split_file_name(".hidden"), (".hidden", ""));
        assert_eq!(split_file_name("..config"), ("..config", ""));
        assert_eq!(split_file_name("..a.b"), ("..a", ".b"));
        assert_eq!(split_file_name("trailing."), ("trailing", "."));
        assert_eq!(split_file_name(""), ("", ""));
    }

    #[test]
    fn counter_widens_past_five_digits_without_truncation() {
        let records = vec![record(1, "image.png", Some("image.png"))];
        let plans = plan_renames(&records, "", 123_456);
        assert_eq!(plans[0].new_name, "image_123456.png");
    }
}
